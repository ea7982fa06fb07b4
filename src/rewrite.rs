//! Material and assembly rewriting
//!
//! The central transformation: build items are split into an ordered
//! base-group/content-group pair, a two-entry base-materials resource is
//! synthesized, the mesh objects are flattened into a single assembly object
//! of transformed components, a global bed-margin shift is computed and
//! applied to the sole remaining build item, and every surviving resource is
//! renumbered to a contiguous ID range with the assembly last.
//!
//! All cross-references (build item -> object, component -> object, material
//! `pid` -> group) are resolved through one [`IdMap`]-style mapping built
//! once per rewrite; the serialized text is never patched ad hoc.

use crate::model::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Clearance kept between the model's minimum X/Y extent and the bed origin
pub const BED_MARGIN: f64 = 5.0;

/// Extruder feeding the base group
pub const BASE_EXTRUDER: &str = "1";
/// Extruder feeding the content group
pub const CONTENT_EXTRUDER: &str = "2";

const BASE_MATERIAL_NAME: &str = "Base_Black";
const BASE_MATERIAL_COLOR: &str = "#000000";
const CONTENT_MATERIAL_NAME: &str = "Content_White";
const CONTENT_MATERIAL_COLOR: &str = "#FFFFFF";

const IDENTITY_TRANSFORM: [f64; 12] =
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

/// Per-component description of the rewritten assembly, consumed by the
/// vendor metadata synthesizer
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Display name of the part (the renamed object, or a generated fallback)
    pub part_name: String,
    /// Post-renumber ID of the referenced mesh object
    pub object_id: usize,
    /// Row-major 4x4 expansion of the component transform: translation in
    /// the rightmost column of rows 0-2, fixed last row `0 0 0 1`
    pub matrix16: [f64; 16],
    /// Translation components of the component transform
    pub translation: [f64; 3],
    /// Extruder index, strictly group-determined: "1" base, "2" content
    pub extruder: &'static str,
    /// Zero-based object index used by vendor metadata
    pub source_object_id: usize,
}

/// Result of a successful rewrite: the renumbered assembly ID plus one
/// [`ComponentInfo`] per component, in base-then-content order
#[derive(Debug, Clone)]
pub struct AssemblyPlan {
    /// Post-renumber ID of the assembly object
    pub assembly_id: usize,
    /// Component descriptions in assembly order
    pub components: Vec<ComponentInfo>,
}

/// Rewrite the document into a two-material single-assembly package
///
/// `base_count` and `content_count` give how many build items, in document
/// order, belong to the base and content groups. When their sum exceeds the
/// item list the rewrite is a deliberate no-op: the document is left
/// untouched and `None` is returned, letting the caller pass the original
/// container through unmodified. Items beyond the two groups are excluded
/// from the assembly; their objects become unreachable and are pruned.
pub fn rewrite_assembly(
    doc: &mut ModelDocument,
    base_count: usize,
    content_count: usize,
) -> Option<AssemblyPlan> {
    let total = base_count + content_count;
    if total > doc.build.items.len() {
        warn!(
            base_count,
            content_count,
            items = doc.build.items.len(),
            "group counts exceed build items, passing document through"
        );
        return None;
    }

    let grouped: Vec<BuildItem> = doc.build.items[..total].to_vec();

    // Material synthesis: one group, two entries, inserted at the front of
    // the resources. Referenced objects pick up pid/pindex and a group name.
    let material_id = doc.resources.max_resource_id() + 1;
    doc.resources.base_material_groups.insert(
        0,
        BaseMaterialGroup {
            id: material_id,
            materials: vec![
                BaseMaterial {
                    name: BASE_MATERIAL_NAME.to_string(),
                    displaycolor: BASE_MATERIAL_COLOR.to_string(),
                },
                BaseMaterial {
                    name: CONTENT_MATERIAL_NAME.to_string(),
                    displaycolor: CONTENT_MATERIAL_COLOR.to_string(),
                },
            ],
        },
    );
    for (k, item) in grouped[..base_count].iter().enumerate() {
        if let Some(obj) = doc.resources.object_mut(item.objectid) {
            obj.pid = Some(material_id);
            obj.pindex = Some(0);
            obj.name = Some(format!("{}_{}", BASE_MATERIAL_NAME, k + 1));
        }
    }
    for (k, item) in grouped[base_count..].iter().enumerate() {
        if let Some(obj) = doc.resources.object_mut(item.objectid) {
            obj.pid = Some(material_id);
            obj.pindex = Some(1);
            obj.name = Some(format!("{}_{}", CONTENT_MATERIAL_NAME, k + 1));
        }
    }

    // Assembly synthesis: components copy each grouped item's object
    // reference and transform verbatim, base group first.
    let assembly_id = doc.resources.max_resource_id() + 1;
    let mut assembly = ResourceObject::new(assembly_id);
    assembly.object_type = Some("model".to_string());
    for item in &grouped {
        assembly.components.push(ComponentRef {
            objectid: item.objectid,
            transform: item.transform,
        });
    }

    // Global bounding-box minimum across components: each object's vertex
    // bounds translated by its component placement. Objects without geometry
    // have undefined bounds and are excluded from the reduction.
    let mut global_min: Option<[f64; 3]> = None;
    for comp in &assembly.components {
        let Some(bounds) = doc
            .resources
            .object(comp.objectid)
            .and_then(|o| o.mesh.as_ref())
            .and_then(|m| m.bounds())
        else {
            continue;
        };
        let t = translation_of(comp.transform.as_ref());
        let shifted = [
            bounds.min[0] + t[0],
            bounds.min[1] + t[1],
            bounds.min[2] + t[2],
        ];
        global_min = Some(match global_min {
            None => shifted,
            Some(g) => [
                g[0].min(shifted[0]),
                g[1].min(shifted[1]),
                g[2].min(shifted[2]),
            ],
        });
    }

    // X/Y are lifted to the bed margin; Z is lifted to exactly zero.
    let shift = match global_min {
        Some(gmin) => [
            if gmin[0] < BED_MARGIN { BED_MARGIN - gmin[0] } else { 0.0 },
            if gmin[1] < BED_MARGIN { BED_MARGIN - gmin[1] } else { 0.0 },
            if gmin[2] < 0.0 { -gmin[2] } else { 0.0 },
        ],
        None => [0.0; 3],
    };

    doc.resources.objects.push(assembly);

    // The shift lands on the single remaining build item, never on the
    // components; a zero shift writes no transform at all.
    let mut item = BuildItem::new(assembly_id);
    item.printable = Some(true);
    if shift.iter().any(|&s| s != 0.0) {
        let mut transform = IDENTITY_TRANSFORM;
        transform[9] = shift[0];
        transform[10] = shift[1];
        transform[11] = shift[2];
        item.transform = Some(transform);
    }
    doc.build.items = vec![item];

    // Prune everything the assembly does not reach.
    let reachable: HashSet<usize> = doc
        .resources
        .object(assembly_id)
        .map(|a| a.components.iter().map(|c| c.objectid).collect())
        .unwrap_or_default();
    doc.resources
        .objects
        .retain(|o| o.id == assembly_id || reachable.contains(&o.id));

    // Every surviving object references the synthesized group, so any
    // pre-existing group is now unreferenced. Groups share the resource ID
    // namespace with objects; a stale group kept past renumbering could
    // collide with a renumbered mesh ID.
    doc.resources
        .base_material_groups
        .retain(|g| g.id == material_id);

    // Renumber: surviving meshes get 1..=N in component order, the assembly
    // N+1. The material group moves to N+2 since resource IDs share one
    // namespace and the group must not collide with the assembly; pid
    // references follow the same map.
    let mut id_map: HashMap<usize, usize> = HashMap::new();
    if let Some(assembly) = doc.resources.object(assembly_id) {
        for comp in &assembly.components {
            if !id_map.contains_key(&comp.objectid) {
                let next = id_map.len() + 1;
                id_map.insert(comp.objectid, next);
            }
        }
    }
    let mesh_count = id_map.len();
    id_map.insert(assembly_id, mesh_count + 1);
    id_map.insert(material_id, mesh_count + 2);

    for obj in &mut doc.resources.objects {
        if let Some(&new_id) = id_map.get(&obj.id) {
            obj.id = new_id;
        }
        if let Some(pid) = obj.pid
            && let Some(&new_pid) = id_map.get(&pid)
        {
            obj.pid = Some(new_pid);
        }
        for comp in &mut obj.components {
            if let Some(&new_id) = id_map.get(&comp.objectid) {
                comp.objectid = new_id;
            }
        }
    }
    for group in &mut doc.resources.base_material_groups {
        if let Some(&new_id) = id_map.get(&group.id) {
            group.id = new_id;
        }
    }
    for item in &mut doc.build.items {
        if let Some(&new_id) = id_map.get(&item.objectid) {
            item.objectid = new_id;
        }
    }

    let new_assembly_id = mesh_count + 1;
    let assembly = doc.resources.object(new_assembly_id)?;
    let mut components = Vec::with_capacity(assembly.components.len());
    for (idx, comp) in assembly.components.iter().enumerate() {
        let part_name = doc
            .resources
            .object(comp.objectid)
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| format!("Part_{}", idx + 1));
        components.push(ComponentInfo {
            part_name,
            object_id: comp.objectid,
            matrix16: expand_matrix(comp.transform.as_ref()),
            translation: translation_of(comp.transform.as_ref()),
            extruder: if idx < base_count {
                BASE_EXTRUDER
            } else {
                CONTENT_EXTRUDER
            },
            source_object_id: comp.objectid - 1,
        });
    }

    debug!(
        assembly_id = new_assembly_id,
        mesh_count,
        shift_x = shift[0],
        shift_y = shift[1],
        shift_z = shift[2],
        "rewrote package into single assembly"
    );

    Some(AssemblyPlan {
        assembly_id: new_assembly_id,
        components,
    })
}

/// Expand a 4x3 affine transform to a row-major 4x4 matrix
///
/// Translation lands in the rightmost column of rows 0-2; the last row is
/// fixed at `0 0 0 1`. An absent transform expands to identity.
fn expand_matrix(transform: Option<&[f64; 12]>) -> [f64; 16] {
    let t = transform.copied().unwrap_or(IDENTITY_TRANSFORM);
    [
        t[0], t[1], t[2], t[9],
        t[3], t[4], t[5], t[10],
        t[6], t[7], t[8], t[11],
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Translation components of an optional 4x3 transform (identity when absent)
fn translation_of(transform: Option<&[f64; 12]>) -> [f64; 3] {
    transform.map(|t| [t[9], t[10], t[11]]).unwrap_or([0.0; 3])
}
