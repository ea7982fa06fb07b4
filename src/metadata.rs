//! Vendor metadata synthesis
//!
//! After the assembly rewrite, slicer-oriented metadata is produced in two
//! places: upserted `<metadata>` entries on the model document itself, and
//! three sidecar documents written under `Metadata/` in the output container.
//! The sidecars are regenerated from the rewritten model on every run; stale
//! copies in the source container are overwritten, never merged.

use crate::error::Result;
use crate::model::ModelDocument;
use crate::rewrite::ComponentInfo;
use crate::writer::{escape_xml, format_float, format_matrix16};
use serde::Serialize;

/// Container path of the object/part map sidecar
pub const MODEL_SETTINGS_PATH: &str = "Metadata/model_settings.config";
/// Container path of the print profile sidecar
pub const PROJECT_SETTINGS_PATH: &str = "Metadata/project_settings.config";
/// Container path of the slice summary sidecar
pub const SLICE_INFO_PATH: &str = "Metadata/slice_info.config";

/// Display name of the assembly in the slicer object list
pub const ASSEMBLY_DISPLAY_NAME: &str = "Label";
/// Source file label recorded per part
const SOURCE_FILE_LABEL: &str = "label.3mf";

const APPLICATION_NAME: &str = "BambuStudio-01.00.00.00";
const VENDOR_3MF_VERSION: &str = "1";
const VENDOR_NAMESPACE_ATTR: &str = "xmlns:BambuStudio";
const VENDOR_NAMESPACE: &str = "http://schemas.bambulab.com/package/2021";

/// Upsert the slicer identification metadata onto the model document
///
/// Declares the vendor namespace on the model element and upserts the
/// `Application` and `BambuStudio:3mfVersion` entries. Existing entries are
/// updated in place so the document never accumulates duplicates.
pub fn apply_slicer_metadata(doc: &mut ModelDocument) {
    doc.ensure_attribute(VENDOR_NAMESPACE_ATTR, VENDOR_NAMESPACE);
    doc.upsert_metadata("Application", APPLICATION_NAME);
    doc.upsert_metadata("BambuStudio:3mfVersion", VENDOR_3MF_VERSION);
}

/// Synthesize the three sidecar documents for the rewritten assembly
///
/// Returns `(container path, bytes)` pairs ready for the package writer.
pub fn synthesize_sidecars(
    assembly_id: usize,
    components: &[ComponentInfo],
) -> Result<Vec<(String, Vec<u8>)>> {
    Ok(vec![
        (
            MODEL_SETTINGS_PATH.to_string(),
            model_settings_xml(assembly_id, components).into_bytes(),
        ),
        (
            PROJECT_SETTINGS_PATH.to_string(),
            project_settings_json()?,
        ),
        (SLICE_INFO_PATH.to_string(), slice_info_xml().into_bytes()),
    ])
}

/// Object/part map: one `<object>` for the assembly with a `<part>` per
/// component carrying its name, placement matrix, provenance, and extruder
fn model_settings_xml(assembly_id: usize, components: &[ComponentInfo]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<config>\n");
    xml.push_str(&format!("  <object id=\"{}\">\n", assembly_id));
    xml.push_str(&format!(
        "    <metadata key=\"name\" value=\"{}\"/>\n",
        escape_xml(ASSEMBLY_DISPLAY_NAME)
    ));
    xml.push_str("    <metadata key=\"extruder\" value=\"1\"/>\n");

    for component in components {
        xml.push_str(&format!(
            "    <part id=\"{}\" subtype=\"normal_part\">\n",
            component.object_id
        ));
        xml.push_str(&format!(
            "      <metadata key=\"name\" value=\"{}\"/>\n",
            escape_xml(&component.part_name)
        ));
        xml.push_str(&format!(
            "      <metadata key=\"matrix\" value=\"{}\"/>\n",
            format_matrix16(&component.matrix16)
        ));
        xml.push_str(&format!(
            "      <metadata key=\"source_file\" value=\"{}\"/>\n",
            SOURCE_FILE_LABEL
        ));
        xml.push_str(&format!(
            "      <metadata key=\"source_object_id\" value=\"{}\"/>\n",
            component.source_object_id
        ));
        xml.push_str("      <metadata key=\"source_volume_id\" value=\"0\"/>\n");
        for (axis, value) in ["x", "y", "z"].into_iter().zip(component.translation) {
            xml.push_str(&format!(
                "      <metadata key=\"source_offset_{}\" value=\"{}\"/>\n",
                axis,
                format_float(value)
            ));
        }
        xml.push_str(&format!(
            "      <metadata key=\"extruder\" value=\"{}\"/>\n",
            component.extruder
        ));
        xml.push_str("    </part>\n");
    }

    xml.push_str("  </object>\n");
    xml.push_str("</config>\n");
    xml
}

/// Print profile: fixed two-filament mapping with automatic flush handling
#[derive(Debug, Serialize)]
struct ProjectSettings {
    filament_map: Vec<String>,
    filament_map_mode: String,
    filament_colour: Vec<String>,
    print_sequence: String,
    plate_settings: Vec<PlateSettings>,
}

#[derive(Debug, Serialize)]
struct PlateSettings {
    plate_index: usize,
    locked: bool,
}

fn project_settings_json() -> Result<Vec<u8>> {
    let settings = ProjectSettings {
        filament_map: vec!["1".to_string(), "2".to_string()],
        filament_map_mode: "Auto For Flush".to_string(),
        filament_colour: vec!["#000000".to_string(), "#FFFFFF".to_string()],
        print_sequence: "by layer".to_string(),
        plate_settings: vec![PlateSettings {
            plate_index: 1,
            locked: false,
        }],
    };
    Ok(serde_json::to_vec_pretty(&settings)?)
}

/// Slice summary header: identifies the producing client, no per-plate slice
/// data (the package has not been sliced)
fn slice_info_xml() -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<config>\n");
    xml.push_str("  <header>\n");
    xml.push_str("    <header_item key=\"X-BBL-Client-Type\" value=\"slicer\"/>\n");
    xml.push_str("    <header_item key=\"X-BBL-Client-Version\" value=\"01.00.00.00\"/>\n");
    xml.push_str("  </header>\n");
    xml.push_str("</config>\n");
    xml
}
