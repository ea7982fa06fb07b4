//! End-to-end pipeline tests: container in, container out

use label3mf::{finalize_label_package, PackageEntries};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel-1" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

fn build_container(model_xml: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", RELS),
        ("3D/3dmodel.model", model_xml),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A two-object model whose global minimum is (-5.7, -5.75, 0)
fn two_object_model() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <metadata name="Application">LabelExporter</metadata>
  <resources>
    <object id="1">
      <mesh>
        <vertices>
          <vertex x="-5.7" y="-5.75" z="0"/>
          <vertex x="4" y="4" z="0"/>
          <vertex x="0" y="4" z="2"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
    <object id="2">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="3" y="3" z="0"/>
          <vertex x="0" y="3" z="1"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="1"/>
    <item objectid="2"/>
  </build>
</model>"#
        .to_string()
}

fn entry_str<'a>(entries: &'a PackageEntries, name: &str) -> &'a str {
    let (_, bytes) = entries
        .entries()
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("missing entry {name}"));
    std::str::from_utf8(bytes).unwrap()
}

#[test]
fn test_rewrite_two_object_package() {
    let input = build_container(&two_object_model());
    let outcome = finalize_label_package(&input, 1, 1).unwrap();
    assert!(outcome.was_rewritten());

    let output = PackageEntries::read(&outcome.into_bytes()).unwrap();
    let model = entry_str(&output, "3D/3dmodel.model");

    // synthesized material group, renumbered past the assembly
    assert!(model.contains("<basematerials id=\"4\">"));
    assert!(model.contains("<base name=\"Base_Black\" displaycolor=\"#000000\"/>"));
    assert!(model.contains("<base name=\"Content_White\" displaycolor=\"#FFFFFF\"/>"));

    // renamed mesh objects with material references
    assert!(model.contains("name=\"Base_Black_1\""));
    assert!(model.contains("name=\"Content_White_1\""));
    assert!(model.contains("pid=\"4\" pindex=\"0\""));
    assert!(model.contains("pid=\"4\" pindex=\"1\""));

    // assembly object referencing both meshes
    assert!(model.contains("<object id=\"3\" type=\"model\">"));
    assert!(model.contains("<component objectid=\"1\"/>"));
    assert!(model.contains("<component objectid=\"2\"/>"));

    // single build item carrying the margin shift
    assert!(model.contains(
        "<item objectid=\"3\" transform=\"1 0 0 0 1 0 0 0 1 10.7 10.75 0\" printable=\"1\"/>"
    ));

    // slicer identification metadata upserted, exporter value replaced
    assert!(model.contains("<metadata name=\"Application\">BambuStudio-01.00.00.00</metadata>"));
    assert!(model.contains("<metadata name=\"BambuStudio:3mfVersion\">1</metadata>"));
    assert!(model.contains("xmlns:BambuStudio="));
    assert!(!model.contains("LabelExporter"));
}

#[test]
fn test_sidecars_present_and_consistent() {
    let input = build_container(&two_object_model());
    let output_bytes = finalize_label_package(&input, 1, 1).unwrap().into_bytes();
    let output = PackageEntries::read(&output_bytes).unwrap();

    let names: Vec<&str> = output.entries().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        [
            "[Content_Types].xml",
            "_rels/.rels",
            "3D/3dmodel.model",
            "Metadata/model_settings.config",
            "Metadata/project_settings.config",
            "Metadata/slice_info.config",
        ]
    );

    let model_settings = entry_str(&output, "Metadata/model_settings.config");
    assert!(model_settings.contains("<object id=\"3\">"));
    assert!(model_settings.contains("<metadata key=\"name\" value=\"Label\"/>"));
    assert!(model_settings.contains("<part id=\"1\" subtype=\"normal_part\">"));
    assert!(model_settings.contains("<part id=\"2\" subtype=\"normal_part\">"));
    assert!(model_settings.contains("<metadata key=\"source_object_id\" value=\"0\"/>"));
    assert!(model_settings.contains("<metadata key=\"source_object_id\" value=\"1\"/>"));
    assert!(model_settings.contains("<metadata key=\"extruder\" value=\"2\"/>"));
    assert!(model_settings
        .contains("<metadata key=\"matrix\" value=\"1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1\"/>"));

    let project: serde_json::Value =
        serde_json::from_str(entry_str(&output, "Metadata/project_settings.config")).unwrap();
    assert_eq!(project["filament_map"], serde_json::json!(["1", "2"]));
    assert_eq!(project["filament_map_mode"], "Auto For Flush");

    let slice_info = entry_str(&output, "Metadata/slice_info.config");
    assert!(slice_info.contains("X-BBL-Client-Type"));
}

/// A two-object model already clear of the bed margin: global minimum (6, 6, 0)
fn inside_margin_model() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <object id="1">
      <mesh>
        <vertices>
          <vertex x="6" y="6" z="0"/>
          <vertex x="9" y="6" z="0"/>
          <vertex x="6" y="9" z="2"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
    <object id="2">
      <mesh>
        <vertices>
          <vertex x="7" y="7" z="0"/>
          <vertex x="8" y="8" z="0"/>
          <vertex x="7" y="8" z="1"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="1"/>
    <item objectid="2"/>
  </build>
</model>"#
        .to_string()
}

#[test]
fn test_no_shift_when_inside_margin() {
    let input = build_container(&inside_margin_model());
    let output_bytes = finalize_label_package(&input, 1, 1).unwrap().into_bytes();
    let output = PackageEntries::read(&output_bytes).unwrap();

    let model = entry_str(&output, "3D/3dmodel.model");
    assert!(model.contains("<item objectid=\"3\" printable=\"1\"/>"));
}

#[test]
fn test_guard_passes_input_through_byte_identical() {
    let input = build_container(&two_object_model());
    let outcome = finalize_label_package(&input, 5, 5).unwrap();

    assert!(!outcome.was_rewritten());
    assert_eq!(outcome.into_bytes(), input);
}

#[test]
fn test_stale_sidecar_overwritten() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in [
        ("3D/3dmodel.model", two_object_model().as_str()),
        ("Metadata/model_settings.config", "<config>stale</config>"),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    let input = zip.finish().unwrap().into_inner();

    let output_bytes = finalize_label_package(&input, 1, 1).unwrap().into_bytes();
    let output = PackageEntries::read(&output_bytes).unwrap();

    let names: Vec<&str> = output.entries().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        [
            "3D/3dmodel.model",
            "Metadata/model_settings.config",
            "Metadata/project_settings.config",
            "Metadata/slice_info.config",
        ]
    );
    assert!(!entry_str(&output, "Metadata/model_settings.config").contains("stale"));
}

#[test]
fn test_output_survives_disk_roundtrip() {
    let input = build_container(&two_object_model());
    let output_bytes = finalize_label_package(&input, 1, 1).unwrap().into_bytes();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label_out.3mf");
    std::fs::write(&path, &output_bytes).unwrap();

    let reloaded = std::fs::read(&path).unwrap();
    let entries = PackageEntries::read(&reloaded).unwrap();
    let (name, _) = entries.model_entry().unwrap();
    assert_eq!(name, "3D/3dmodel.model");
}

#[test]
fn test_missing_model_entry_is_error() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("readme.txt", options).unwrap();
    zip.write_all(b"no model here").unwrap();
    let input = zip.finish().unwrap().into_inner();

    let err = finalize_label_package(&input, 1, 1).unwrap_err();
    assert!(err.to_string().contains("[E1003]"));
}

#[test]
fn test_not_a_zip_is_error() {
    assert!(finalize_label_package(b"plain text", 1, 1).is_err());
}

#[test]
fn test_output_is_reparseable_and_stable() {
    let input = build_container(&two_object_model());
    let first = finalize_label_package(&input, 1, 1).unwrap().into_bytes();
    let second = finalize_label_package(&input, 1, 1).unwrap().into_bytes();

    // same input bytes give the same output model document
    let first_model = {
        let entries = PackageEntries::read(&first).unwrap();
        entry_str(&entries, "3D/3dmodel.model").to_string()
    };
    let second_model = {
        let entries = PackageEntries::read(&second).unwrap();
        entry_str(&entries, "3D/3dmodel.model").to_string()
    };
    assert_eq!(first_model, second_model);

    // and the rewritten document parses back cleanly
    let doc = label3mf::parse_model_document(&first_model).unwrap();
    assert_eq!(doc.build.items.len(), 1);
    assert_eq!(doc.resources.objects.len(), 3);
    let ids: Vec<usize> = {
        let mut ids: Vec<usize> = doc.resources.objects.iter().map(|o| o.id).collect();
        ids.sort_unstable();
        ids
    };
    assert_eq!(ids, vec![1, 2, 3]);
}
