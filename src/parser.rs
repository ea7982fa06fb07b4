//! XML parsing for the model document
//!
//! Event-driven parsing of the container's model entry into a
//! [`ModelDocument`]. Unrecognized vendor attributes on the model element are
//! preserved rather than rejected so the rewrite never silently drops data it
//! does not touch.

use crate::error::{Error, Result};
use crate::model::*;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Size of a 3MF transformation matrix (4x3 affine transform, row-major)
pub(crate) const TRANSFORM_MATRIX_SIZE: usize = 12;

/// Default buffer capacity for XML parsing (4KB)
const XML_BUFFER_CAPACITY: usize = 4096;

/// Parse the model document XML content
pub fn parse_model_document(xml: &str) -> Result<ModelDocument> {
    // DTD declarations can lead to XXE attacks; reject them up front.
    // DOCTYPE declarations appear near the start of the document.
    let check_len = xml.len().min(2000);
    if xml[..check_len].to_lowercase().contains("<!doctype") {
        return Err(Error::InvalidXml(
            "DTD declarations are not allowed in model documents for security reasons".to_string(),
        ));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ModelDocument::new();
    let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);

    let mut seen_model = false;
    let mut resources_count = 0usize;
    let mut build_count = 0usize;
    let mut in_resources = false;
    let mut in_build = false;
    let mut current_object: Option<ResourceObject> = None;
    let mut current_mesh: Option<Mesh> = None;
    let mut current_group: Option<BaseMaterialGroup> = None;
    let mut current_metadata: Option<MetadataEntry> = None;

    loop {
        let event_result = reader.read_event_into(&mut buf);
        let is_empty_element = matches!(&event_result, Ok(Event::Empty(_)));

        match event_result {
            Ok(Event::Decl(_)) => {}
            Ok(Event::DocType(_)) => {
                return Err(Error::InvalidXml(
                    "DTD declarations are not allowed in model documents for security reasons"
                        .to_string(),
                ));
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let name_str = std::str::from_utf8(name.as_ref())
                    .map_err(|e| Error::InvalidXml(e.to_string()))?;

                match get_local_name(name_str) {
                    "model" => {
                        seen_model = true;
                        parse_model_attributes(e, &mut doc)?;
                    }
                    "metadata" if !in_resources && !in_build => {
                        let attrs = parse_attributes(e)?;
                        let name = attrs
                            .get("name")
                            .ok_or_else(|| Error::missing_attribute("metadata", "name"))?
                            .clone();
                        let entry = MetadataEntry::new(name, String::new());
                        if is_empty_element {
                            doc.metadata.push(entry);
                        } else {
                            current_metadata = Some(entry);
                        }
                    }
                    "resources" => {
                        in_resources = true;
                        resources_count += 1;
                    }
                    "build" => {
                        in_build = true;
                        build_count += 1;
                    }
                    "basematerials" if in_resources => {
                        let attrs = parse_attributes(e)?;
                        let id = attrs
                            .get("id")
                            .ok_or_else(|| Error::missing_attribute("basematerials", "id"))?
                            .parse::<usize>()?;
                        let group = BaseMaterialGroup {
                            id,
                            materials: Vec::new(),
                        };
                        if is_empty_element {
                            doc.resources.base_material_groups.push(group);
                        } else {
                            current_group = Some(group);
                        }
                    }
                    "base" => {
                        if let Some(group) = current_group.as_mut() {
                            group.materials.push(parse_base(e)?);
                        }
                    }
                    "object" if in_resources => {
                        let object = parse_object(e)?;
                        if is_empty_element {
                            doc.resources.objects.push(object);
                        } else {
                            current_object = Some(object);
                        }
                    }
                    "mesh" => {
                        let mesh = Mesh::new();
                        if is_empty_element {
                            if let Some(obj) = current_object.as_mut() {
                                obj.mesh = Some(mesh);
                            }
                        } else {
                            current_mesh = Some(mesh);
                        }
                    }
                    "vertex" => {
                        if let Some(mesh) = current_mesh.as_mut() {
                            mesh.vertices.push(parse_vertex(e)?);
                        }
                    }
                    "triangle" => {
                        if let Some(mesh) = current_mesh.as_mut() {
                            mesh.triangles.push(parse_triangle(e)?);
                        }
                    }
                    "component" => {
                        if let Some(obj) = current_object.as_mut() {
                            obj.components.push(parse_component(e)?);
                        }
                    }
                    "item" if in_build => {
                        doc.build.items.push(parse_build_item(e)?);
                    }
                    // vertices, triangles, components wrappers and any vendor
                    // elements not rewritten by this pipeline
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let name_str = std::str::from_utf8(name.as_ref())
                    .map_err(|e| Error::InvalidXml(e.to_string()))?;

                match get_local_name(name_str) {
                    "metadata" => {
                        if let Some(entry) = current_metadata.take() {
                            doc.metadata.push(entry);
                        }
                    }
                    "resources" => in_resources = false,
                    "build" => in_build = false,
                    "basematerials" => {
                        if let Some(group) = current_group.take() {
                            doc.resources.base_material_groups.push(group);
                        }
                    }
                    "mesh" => {
                        if let (Some(obj), Some(mesh)) =
                            (current_object.as_mut(), current_mesh.take())
                        {
                            obj.mesh = Some(mesh);
                        }
                    }
                    "object" => {
                        if let Some(obj) = current_object.take() {
                            doc.resources.objects.push(obj);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(entry) = current_metadata.as_mut() {
                    entry.value = t
                        .xml_content()
                        .map_err(|e| Error::InvalidXml(e.to_string()))?
                        .into_owned();
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(e)),
        }

        buf.clear();
    }

    if !seen_model {
        return Err(Error::InvalidXml(
            "Missing required <model> root element".to_string(),
        ));
    }
    if resources_count == 0 {
        return Err(Error::InvalidXml(
            "Model must contain a <resources> element".to_string(),
        ));
    }
    if build_count == 0 {
        return Err(Error::InvalidXml(
            "Model must contain a <build> element".to_string(),
        ));
    }

    Ok(doc)
}

/// Parse model element attributes, preserving everything the pipeline does
/// not interpret
fn parse_model_attributes(e: &quick_xml::events::BytesStart, doc: &mut ModelDocument) -> Result<()> {
    for attr in e.attributes() {
        let attr = attr?;
        let key =
            std::str::from_utf8(attr.key.as_ref()).map_err(|e| Error::InvalidXml(e.to_string()))?;
        let value =
            std::str::from_utf8(&attr.value).map_err(|e| Error::InvalidXml(e.to_string()))?;

        match key {
            "unit" => match value {
                "micron" | "millimeter" | "centimeter" | "inch" | "foot" | "meter" => {
                    doc.unit = value.to_string();
                }
                _ => {
                    return Err(Error::InvalidXml(format!(
                        "Invalid unit '{}'. Must be one of: micron, millimeter, centimeter, inch, foot, meter",
                        value
                    )));
                }
            },
            "xmlns" => doc.xmlns = value.to_string(),
            _ => doc
                .extra_attributes
                .push((key.to_string(), value.to_string())),
        }
    }
    Ok(())
}

/// Parse object element attributes
fn parse_object(e: &quick_xml::events::BytesStart) -> Result<ResourceObject> {
    let attrs = parse_attributes(e)?;

    let id = attrs
        .get("id")
        .ok_or_else(|| Error::missing_attribute("object", "id"))?
        .parse::<usize>()?;

    let mut object = ResourceObject::new(id);
    object.name = attrs.get("name").cloned();
    object.object_type = attrs.get("type").cloned();
    object.partnumber = attrs.get("partnumber").cloned();

    if let Some(pid) = attrs.get("pid") {
        object.pid = Some(pid.parse::<usize>()?);
    }
    if let Some(pindex) = attrs.get("pindex") {
        object.pindex = Some(pindex.parse::<usize>()?);
    }

    Ok(object)
}

/// Parse vertex element attributes
fn parse_vertex(e: &quick_xml::events::BytesStart) -> Result<Vertex> {
    let mut x_opt: Option<f64> = None;
    let mut y_opt: Option<f64> = None;
    let mut z_opt: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let key = attr.key.as_ref();

        match key {
            b"x" | b"y" | b"z" => {
                let value_str = std::str::from_utf8(&attr.value)
                    .map_err(|e| Error::InvalidXml(e.to_string()))?;
                let value = value_str.parse::<f64>()?;
                match key {
                    b"x" => x_opt = Some(value),
                    b"y" => y_opt = Some(value),
                    b"z" => z_opt = Some(value),
                    _ => unreachable!(),
                }
            }
            _ => {}
        }
    }

    let x = x_opt.ok_or_else(|| Error::missing_attribute("vertex", "x"))?;
    let y = y_opt.ok_or_else(|| Error::missing_attribute("vertex", "y"))?;
    let z = z_opt.ok_or_else(|| Error::missing_attribute("vertex", "z"))?;

    for (axis, value) in [("x", x), ("y", y), ("z", z)] {
        if !value.is_finite() {
            return Err(Error::InvalidXml(format!(
                "Vertex {} coordinate must be finite (got {})",
                axis, value
            )));
        }
    }

    Ok(Vertex::new(x, y, z))
}

/// Parse triangle element attributes
fn parse_triangle(e: &quick_xml::events::BytesStart) -> Result<Triangle> {
    let mut v1_opt: Option<usize> = None;
    let mut v2_opt: Option<usize> = None;
    let mut v3_opt: Option<usize> = None;

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let key = attr.key.as_ref();

        match key {
            b"v1" | b"v2" | b"v3" => {
                let value_str = std::str::from_utf8(&attr.value)
                    .map_err(|e| Error::InvalidXml(e.to_string()))?;
                let value = value_str.parse::<usize>()?;
                match key {
                    b"v1" => v1_opt = Some(value),
                    b"v2" => v2_opt = Some(value),
                    b"v3" => v3_opt = Some(value),
                    _ => unreachable!(),
                }
            }
            _ => {}
        }
    }

    let v1 = v1_opt.ok_or_else(|| Error::missing_attribute("triangle", "v1"))?;
    let v2 = v2_opt.ok_or_else(|| Error::missing_attribute("triangle", "v2"))?;
    let v3 = v3_opt.ok_or_else(|| Error::missing_attribute("triangle", "v3"))?;

    Ok(Triangle::new(v1, v2, v3))
}

/// Parse component element attributes
fn parse_component(e: &quick_xml::events::BytesStart) -> Result<ComponentRef> {
    let attrs = parse_attributes(e)?;

    let objectid = attrs
        .get("objectid")
        .ok_or_else(|| Error::missing_attribute("component", "objectid"))?
        .parse::<usize>()?;

    let mut component = ComponentRef::new(objectid);
    if let Some(transform_str) = attrs.get("transform") {
        component.transform = Some(parse_transform(transform_str, "component")?);
    }

    Ok(component)
}

/// Parse build item element attributes
fn parse_build_item(e: &quick_xml::events::BytesStart) -> Result<BuildItem> {
    let attrs = parse_attributes(e)?;

    let objectid = attrs
        .get("objectid")
        .ok_or_else(|| Error::missing_attribute("item", "objectid"))?
        .parse::<usize>()?;

    let mut item = BuildItem::new(objectid);

    if let Some(transform_str) = attrs.get("transform") {
        item.transform = Some(parse_transform(transform_str, "item")?);
    }

    if let Some(printable) = attrs.get("printable") {
        item.printable = match printable.as_str() {
            "0" | "false" => Some(false),
            "1" | "true" => Some(true),
            _ => {
                return Err(Error::InvalidXml(format!(
                    "Invalid printable attribute value '{}'. Must be '0', '1', 'false', or 'true'",
                    printable
                )));
            }
        };
    }

    Ok(item)
}

/// Parse base material element attributes
fn parse_base(e: &quick_xml::events::BytesStart) -> Result<BaseMaterial> {
    let attrs = parse_attributes(e)?;

    let name = attrs
        .get("name")
        .ok_or_else(|| Error::missing_attribute("base", "name"))?
        .clone();
    let displaycolor = attrs
        .get("displaycolor")
        .ok_or_else(|| Error::missing_attribute("base", "displaycolor"))?
        .clone();

    Ok(BaseMaterial { name, displaycolor })
}

/// Parse a 4x3 affine transform attribute (12 space-separated floats)
pub(crate) fn parse_transform(transform_str: &str, element: &str) -> Result<[f64; 12]> {
    let values: Result<Vec<f64>> = transform_str
        .split_whitespace()
        .map(|s| s.parse::<f64>().map_err(Error::from))
        .collect();
    let values = values?;

    if values.len() != TRANSFORM_MATRIX_SIZE {
        return Err(Error::InvalidXml(format!(
            "Transform matrix on <{}> must have exactly {} values (got {})",
            element,
            TRANSFORM_MATRIX_SIZE,
            values.len()
        )));
    }

    for (idx, &val) in values.iter().enumerate() {
        if !val.is_finite() {
            return Err(Error::InvalidXml(format!(
                "Transform matrix value at index {} must be finite (got {})",
                idx, val
            )));
        }
    }

    let mut transform = [0.0; TRANSFORM_MATRIX_SIZE];
    transform.copy_from_slice(&values);
    Ok(transform)
}

/// Given a possibly-prefixed XML name like `m:colorgroup`, return the local
/// element name without the namespace prefix
pub(crate) fn get_local_name(name_str: &str) -> &str {
    if let Some(pos) = name_str.rfind(':') {
        &name_str[pos + 1..]
    } else {
        name_str
    }
}

/// Parse attributes from an XML element into a map
pub(crate) fn parse_attributes(e: &quick_xml::events::BytesStart) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::with_capacity(8);

    for attr in e.attributes() {
        let attr = attr?;
        let key =
            std::str::from_utf8(attr.key.as_ref()).map_err(|e| Error::InvalidXml(e.to_string()))?;
        let value =
            std::str::from_utf8(&attr.value).map_err(|e| Error::InvalidXml(e.to_string()))?;
        attrs.insert(key.to_string(), value.to_string());
    }

    Ok(attrs)
}
