//! XML serialization for the model document
//!
//! The output must be deterministic: identical documents serialize to
//! byte-identical XML. Floats use the shortest round-trip decimal
//! representation (never scientific notation) so values survive
//! parse/serialize cycles exactly and repeated runs stay stable.

use crate::model::*;

/// Serialize a model document to XML
pub fn write_model_xml(doc: &ModelDocument) -> String {
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');

    xml.push_str("<model unit=\"");
    xml.push_str(&escape_xml(&doc.unit));
    xml.push_str("\" xmlns=\"");
    xml.push_str(&escape_xml(&doc.xmlns));
    xml.push('"');
    for (key, value) in &doc.extra_attributes {
        xml.push(' ');
        xml.push_str(key);
        xml.push_str("=\"");
        xml.push_str(&escape_xml(value));
        xml.push('"');
    }
    xml.push_str(">\n");

    for entry in &doc.metadata {
        xml.push_str("  <metadata name=\"");
        xml.push_str(&escape_xml(&entry.name));
        xml.push_str("\">");
        xml.push_str(&escape_xml(&entry.value));
        xml.push_str("</metadata>\n");
    }

    xml.push_str("  <resources>\n");

    for group in &doc.resources.base_material_groups {
        xml.push_str("    <basematerials id=\"");
        xml.push_str(&group.id.to_string());
        xml.push_str("\">\n");
        for material in &group.materials {
            xml.push_str("      <base name=\"");
            xml.push_str(&escape_xml(&material.name));
            xml.push_str("\" displaycolor=\"");
            xml.push_str(&escape_xml(&material.displaycolor));
            xml.push_str("\"/>\n");
        }
        xml.push_str("    </basematerials>\n");
    }

    for object in &doc.resources.objects {
        write_object(&mut xml, object);
    }

    xml.push_str("  </resources>\n");

    xml.push_str("  <build>\n");
    for item in &doc.build.items {
        xml.push_str("    <item objectid=\"");
        xml.push_str(&item.objectid.to_string());
        xml.push('"');

        if let Some(ref transform) = item.transform {
            xml.push_str(" transform=\"");
            xml.push_str(&format_transform(transform));
            xml.push('"');
        }
        if let Some(printable) = item.printable {
            xml.push_str(" printable=\"");
            xml.push_str(if printable { "1" } else { "0" });
            xml.push('"');
        }

        xml.push_str("/>\n");
    }
    xml.push_str("  </build>\n");

    xml.push_str("</model>\n");

    xml
}

fn write_object(xml: &mut String, object: &ResourceObject) {
    xml.push_str("    <object id=\"");
    xml.push_str(&object.id.to_string());
    xml.push('"');

    if let Some(ref object_type) = object.object_type {
        xml.push_str(" type=\"");
        xml.push_str(&escape_xml(object_type));
        xml.push('"');
    }
    if let Some(ref name) = object.name {
        xml.push_str(" name=\"");
        xml.push_str(&escape_xml(name));
        xml.push('"');
    }
    if let Some(ref partnumber) = object.partnumber {
        xml.push_str(" partnumber=\"");
        xml.push_str(&escape_xml(partnumber));
        xml.push('"');
    }
    if let Some(pid) = object.pid {
        xml.push_str(" pid=\"");
        xml.push_str(&pid.to_string());
        xml.push('"');
    }
    if let Some(pindex) = object.pindex {
        xml.push_str(" pindex=\"");
        xml.push_str(&pindex.to_string());
        xml.push('"');
    }

    xml.push_str(">\n");

    if let Some(ref mesh) = object.mesh {
        xml.push_str("      <mesh>\n");

        xml.push_str("        <vertices>\n");
        for vertex in &mesh.vertices {
            xml.push_str("          <vertex x=\"");
            xml.push_str(&format_float(vertex.x));
            xml.push_str("\" y=\"");
            xml.push_str(&format_float(vertex.y));
            xml.push_str("\" z=\"");
            xml.push_str(&format_float(vertex.z));
            xml.push_str("\"/>\n");
        }
        xml.push_str("        </vertices>\n");

        xml.push_str("        <triangles>\n");
        for triangle in &mesh.triangles {
            xml.push_str("          <triangle v1=\"");
            xml.push_str(&triangle.v1.to_string());
            xml.push_str("\" v2=\"");
            xml.push_str(&triangle.v2.to_string());
            xml.push_str("\" v3=\"");
            xml.push_str(&triangle.v3.to_string());
            xml.push_str("\"/>\n");
        }
        xml.push_str("        </triangles>\n");

        xml.push_str("      </mesh>\n");
    }

    if !object.components.is_empty() {
        xml.push_str("      <components>\n");
        for component in &object.components {
            xml.push_str("        <component objectid=\"");
            xml.push_str(&component.objectid.to_string());
            xml.push('"');
            if let Some(ref transform) = component.transform {
                xml.push_str(" transform=\"");
                xml.push_str(&format_transform(transform));
                xml.push('"');
            }
            xml.push_str("/>\n");
        }
        xml.push_str("      </components>\n");
    }

    xml.push_str("    </object>\n");
}

/// Format a float with a minimal, lossless decimal representation
///
/// Integral values print without a fractional part; fractional values use the
/// shortest decimal form that round-trips to the same `f64`, so no precision
/// is lost through serialization. `f64` `Display` never emits an exponent, so
/// tiny and huge magnitudes stay in plain decimal form.
pub(crate) fn format_float(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Format a 12-value affine transform as the space-separated attribute form
pub(crate) fn format_transform(transform: &[f64; 12]) -> String {
    transform
        .iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a row-major 4x4 matrix as a space-separated string
pub(crate) fn format_matrix16(matrix: &[f64; 16]) -> String {
    matrix
        .iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape special XML characters
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_model_document;

    #[test]
    fn test_format_float_minimal_decimal() {
        assert_eq!(format_float(5.0), "5");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(10.7), "10.7");
        assert_eq!(format_float(10.75), "10.75");
        assert_eq!(format_float(-5.7), "-5.7");
        assert_eq!(format_float(0.125), "0.125");
        // 5.0 + 5.7 rounds to the double nearest 10.7, whose shortest form
        // is exactly "10.7"
        assert_eq!(format_float(5.0 + 5.7), "10.7");
    }

    #[test]
    fn test_format_float_is_lossless() {
        // tiny magnitudes are not flushed to zero
        assert_eq!(format_float(1e-9), "0.000000001");
        // values needing more than 8 decimals keep their full form
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        // round-trips exactly for arbitrary coordinates
        for value in [-5.7, 1e-12, 123.456789012345, -0.000001234] {
            assert_eq!(format_float(value).parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn test_format_float_never_scientific() {
        for value in [1e-10, -1e-10, 1.5e18, 2.5e-7] {
            let s = format_float(value);
            assert!(!s.contains('e') && !s.contains('E'), "got {s}");
        }
    }

    #[test]
    fn test_format_transform() {
        let t = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 10.7, 10.75, 0.0];
        assert_eq!(format_transform(&t), "1 0 0 0 1 0 0 0 1 10.7 10.75 0");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("normal text"), "normal text");
        assert_eq!(escape_xml("a&b"), "a&amp;b");
        assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_xml("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_write_minimal_model() {
        let mut doc = ModelDocument::new();
        doc.metadata.push(MetadataEntry::new("Title", "Test Label"));

        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(10.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(5.0, 10.0, 0.0));
        mesh.triangles.push(Triangle::new(0, 1, 2));

        let mut object = ResourceObject::new(1);
        object.mesh = Some(mesh);
        doc.resources.objects.push(object);
        doc.build.items.push(BuildItem::new(1));

        let xml = write_model_xml(&doc);

        assert!(xml.contains("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<model unit=\"millimeter\""));
        assert!(xml.contains("<metadata name=\"Title\">Test Label</metadata>"));
        assert!(xml.contains("<object id=\"1\">"));
        assert!(xml.contains("<vertex x=\"0\" y=\"0\" z=\"0\"/>"));
        assert!(xml.contains("<triangle v1=\"0\" v2=\"1\" v3=\"2\"/>"));
        assert!(xml.contains("<item objectid=\"1\"/>"));
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let mut doc = ModelDocument::new();
        doc.extra_attributes
            .push(("xml:lang".to_string(), "en-US".to_string()));

        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(-5.7, -5.75, 0.0));
        mesh.vertices.push(Vertex::new(1.0, 2.0, 3.0));
        mesh.vertices.push(Vertex::new(0.5, 0.5, 0.5));
        mesh.triangles.push(Triangle::new(0, 1, 2));

        let mut object = ResourceObject::new(1);
        object.name = Some("base".to_string());
        object.mesh = Some(mesh);
        doc.resources.objects.push(object);

        let mut assembly = ResourceObject::new(2);
        assembly.components.push(ComponentRef::with_transform(
            1,
            [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0],
        ));
        doc.resources.objects.push(assembly);

        let mut item = BuildItem::new(2);
        item.printable = Some(true);
        doc.build.items.push(item);

        let xml = write_model_xml(&doc);
        let parsed = parse_model_document(&xml).unwrap();

        assert_eq!(parsed.resources.objects.len(), 2);
        let parsed_assembly = parsed.resources.object(2).unwrap();
        assert_eq!(parsed_assembly.components.len(), 1);
        assert_eq!(
            parsed_assembly.components[0].transform.unwrap(),
            [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(parsed.build.items[0].printable, Some(true));
        let mesh = parsed.resources.object(1).unwrap().mesh.as_ref().unwrap();
        assert_eq!(mesh.bounds().unwrap().min, [-5.7, -5.75, 0.0]);

        // serialization is deterministic
        assert_eq!(xml, write_model_xml(&parsed));
    }

    #[test]
    fn test_identity_transform_not_written() {
        let mut doc = ModelDocument::new();
        doc.resources.objects.push(ResourceObject::new(1));
        doc.build.items.push(BuildItem::new(1));
        let xml = write_model_xml(&doc);
        assert!(!xml.contains("transform"));
    }
}
