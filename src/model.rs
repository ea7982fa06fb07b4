//! Typed model-document structures
//!
//! These types mirror the XML model document inside a 3MF-style container:
//! resource objects (meshes and assemblies), build items, base material
//! groups, and model-level metadata. A `ModelDocument` is constructed fresh
//! from the container at the start of a rewrite, mutated in place, serialized
//! once, and discarded.

/// 3MF core specification namespace
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// A 3D vertex with x, y, z coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A triangle defined by three vertex indices
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    /// Index of first vertex
    pub v1: usize,
    /// Index of second vertex
    pub v2: usize,
    /// Index of third vertex
    pub v3: usize,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v1: usize, v2: usize, v3: usize) -> Self {
        Self { v1, v2, v3 }
    }
}

/// Componentwise min/max bounds of a vertex list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBounds {
    /// Minimum x, y, z
    pub min: [f64; 3],
    /// Maximum x, y, z
    pub max: [f64; 3],
}

/// Mesh geometry of a resource object
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// List of vertices
    pub vertices: Vec<Vertex>,
    /// List of triangles
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Componentwise min/max over the vertex list
    ///
    /// Computed by a single reduction scan. A mesh with no vertices has
    /// undefined bounds and returns `None`; callers exclude it from bounds
    /// aggregation rather than treating it as an error.
    pub fn bounds(&self) -> Option<VertexBounds> {
        let first = self.vertices.first()?;
        let mut bounds = VertexBounds {
            min: [first.x, first.y, first.z],
            max: [first.x, first.y, first.z],
        };
        for v in &self.vertices[1..] {
            for (axis, value) in [v.x, v.y, v.z].into_iter().enumerate() {
                bounds.min[axis] = bounds.min[axis].min(value);
                bounds.max[axis] = bounds.max[axis].max(value);
            }
        }
        Some(bounds)
    }
}

/// A reference from an assembly object to another object plus a placement
/// transform
///
/// The transform is the 3MF 4x3 affine layout: 12 floats in row-major order,
/// `[m00 m01 m02 m10 m11 m12 m20 m21 m22 tx ty tz]`. Absence means identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRef {
    /// ID of the referenced object
    pub objectid: usize,
    /// Optional 4x3 transformation matrix (12 floats)
    pub transform: Option<[f64; 12]>,
}

impl ComponentRef {
    /// Create a new component reference
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
        }
    }

    /// Create a new component reference with a transformation matrix
    pub fn with_transform(objectid: usize, transform: [f64; 12]) -> Self {
        Self {
            objectid,
            transform: Some(transform),
        }
    }
}

/// A named, identified resource entity: raw mesh geometry or a composed
/// assembly of components
#[derive(Debug, Clone)]
pub struct ResourceObject {
    /// Object ID, unique within the document
    pub id: usize,
    /// Object name (optional)
    pub name: Option<String>,
    /// Object type attribute, preserved verbatim when present
    pub object_type: Option<String>,
    /// Part number, preserved vendor field
    pub partnumber: Option<String>,
    /// Optional material group reference (property ID)
    pub pid: Option<usize>,
    /// Optional material index within the group referenced by `pid`
    pub pindex: Option<usize>,
    /// Mesh geometry, present for mesh-kind objects
    pub mesh: Option<Mesh>,
    /// Component references, present for assembly-kind objects
    pub components: Vec<ComponentRef>,
}

impl ResourceObject {
    /// Create a new resource object
    pub fn new(id: usize) -> Self {
        Self {
            id,
            name: None,
            object_type: None,
            partnumber: None,
            pid: None,
            pindex: None,
            mesh: None,
            components: Vec::new(),
        }
    }

    /// Whether this object is an assembly (composed of components)
    pub fn is_assembly(&self) -> bool {
        !self.components.is_empty()
    }
}

/// A single material entry inside a base material group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseMaterial {
    /// Display name
    pub name: String,
    /// Display color, `#RRGGBB`
    pub displaycolor: String,
}

/// A base materials resource, referenced by `pid`/`pindex` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseMaterialGroup {
    /// Resource ID, sharing the object ID namespace
    pub id: usize,
    /// Material entries, indexed by `pindex`
    pub materials: Vec<BaseMaterial>,
}

/// A top-level placement of a resource object into the printable scene
#[derive(Debug, Clone, PartialEq)]
pub struct BuildItem {
    /// Reference to an object ID; must resolve
    pub objectid: usize,
    /// Optional 4x3 transformation matrix (12 floats); absence is identity
    pub transform: Option<[f64; 12]>,
    /// Printable flag, preserved when present
    pub printable: Option<bool>,
}

impl BuildItem {
    /// Create a new build item
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
            printable: None,
        }
    }
}

/// Build section specifying which objects to manufacture
#[derive(Debug, Clone, Default)]
pub struct Build {
    /// List of items to build, in document order
    pub items: Vec<BuildItem>,
}

impl Build {
    /// Create a new empty build section
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resources section containing material groups and objects
#[derive(Debug, Clone, Default)]
pub struct Resources {
    /// Base material groups, in document order
    pub base_material_groups: Vec<BaseMaterialGroup>,
    /// Objects, in document order
    pub objects: Vec<ResourceObject>,
}

impl Resources {
    /// Create a new empty resources section
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an object by ID
    pub fn object(&self, id: usize) -> Option<&ResourceObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Look up an object by ID, mutably
    pub fn object_mut(&mut self, id: usize) -> Option<&mut ResourceObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Maximum object ID in use, 0 when there are no objects
    pub fn max_object_id(&self) -> usize {
        self.objects.iter().map(|o| o.id).max().unwrap_or(0)
    }

    /// Maximum resource ID in use across objects and material groups
    pub fn max_resource_id(&self) -> usize {
        let group_max = self
            .base_material_groups
            .iter()
            .map(|g| g.id)
            .max()
            .unwrap_or(0);
        self.max_object_id().max(group_max)
    }
}

/// Metadata entry: a name attribute plus text content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// Name of the metadata entry
    pub name: String,
    /// Value of the metadata entry
    pub value: String,
}

impl MetadataEntry {
    /// Create a new metadata entry
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parsed model document: resources, build items, and model-level metadata
///
/// Owned exclusively by one rewrite pass; mutated in place, serialized, then
/// discarded. Nothing is cached across invocations.
#[derive(Debug, Clone)]
pub struct ModelDocument {
    /// Unit of measurement (e.g., "millimeter")
    pub unit: String,
    /// Default XML namespace
    pub xmlns: String,
    /// Remaining model-element attributes preserved in document order
    /// (xml:lang, vendor namespace declarations, ...)
    pub extra_attributes: Vec<(String, String)>,
    /// Metadata entries, in document order, serialized before the resources
    pub metadata: Vec<MetadataEntry>,
    /// Resources section
    pub resources: Resources,
    /// Build section
    pub build: Build,
}

impl ModelDocument {
    /// Create a new empty model document with core defaults
    pub fn new() -> Self {
        Self {
            unit: "millimeter".to_string(),
            xmlns: CORE_NAMESPACE.to_string(),
            extra_attributes: Vec::new(),
            metadata: Vec::new(),
            resources: Resources::new(),
            build: Build::new(),
        }
    }

    /// Update a metadata entry in place, or append it when absent
    ///
    /// Appended entries serialize immediately before the resources element
    /// along with the rest of the metadata list.
    pub fn upsert_metadata(&mut self, name: &str, value: &str) {
        match self.metadata.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value = value.to_string(),
            None => self.metadata.push(MetadataEntry::new(name, value)),
        }
    }

    /// Declare a model-element attribute (e.g. a vendor namespace) unless it
    /// is already present
    pub fn ensure_attribute(&mut self, name: &str, value: &str) {
        if !self.extra_attributes.iter().any(|(k, _)| k == name) {
            self.extra_attributes
                .push((name.to_string(), value.to_string()));
        }
    }
}

impl Default for ModelDocument {
    fn default() -> Self {
        Self::new()
    }
}
