//! Label package post-processor for 3MF-style containers
//!
//! Takes a single-material multi-object package as produced by a label
//! exporter and rewrites it into a two-material, single-assembly package a
//! slicer can open directly:
//!
//! - reads the container and parses its model document into typed structures
//! - splits the build items into a base group and a content group, attaches
//!   a synthesized two-entry material resource, and flattens everything into
//!   one assembly object
//! - shifts the assembly so it sits inside the bed margin with its floor at
//!   Z zero
//! - renumbers all surviving resources to a contiguous range
//! - synthesizes vendor sidecar documents and slicer metadata
//! - writes a new container, preserving every untouched entry in order
//!
//! The whole pipeline is pure: input bytes in, output bytes out, no
//! filesystem access. When the requested group counts do not fit the package
//! the input is passed through byte-identical instead of failing.
//!
//! ```no_run
//! use label3mf::{finalize_label_package, RewriteOutcome};
//!
//! # fn main() -> label3mf::Result<()> {
//! let input = std::fs::read("label.3mf")?;
//! match finalize_label_package(&input, 1, 1)? {
//!     RewriteOutcome::Rewritten(bytes) => std::fs::write("out.3mf", bytes)?,
//!     RewriteOutcome::Skipped(bytes) => std::fs::write("out.3mf", bytes)?,
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod metadata;
pub mod model;
pub mod package;
pub mod parser;
pub mod rewrite;
mod writer;

pub use error::{Error, Result};
pub use model::ModelDocument;
pub use package::PackageEntries;
pub use parser::parse_model_document;
pub use rewrite::{rewrite_assembly, AssemblyPlan, ComponentInfo, BED_MARGIN};

use tracing::debug;

/// Outcome of a finalize run
#[derive(Debug, Clone)]
pub enum RewriteOutcome {
    /// The package was rewritten into a two-material assembly
    Rewritten(Vec<u8>),
    /// The group counts did not fit the package; the input was passed
    /// through unchanged
    Skipped(Vec<u8>),
}

impl RewriteOutcome {
    /// The output container bytes, whichever path produced them
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Rewritten(bytes) | Self::Skipped(bytes) => bytes,
        }
    }

    /// Whether the rewrite actually ran
    pub fn was_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten(_))
    }
}

/// Run the full post-processing pipeline on a container
///
/// `base_count` build items (in document order) form the base group and the
/// following `content_count` items form the content group. When the counts
/// exceed the available build items the input bytes are returned unchanged
/// as [`RewriteOutcome::Skipped`]. Malformed containers or model documents
/// are errors; the input is never partially rewritten.
pub fn finalize_label_package(
    input: &[u8],
    base_count: usize,
    content_count: usize,
) -> Result<RewriteOutcome> {
    let entries = PackageEntries::read(input)?;
    let (model_path, model_bytes) = entries.model_entry()?;
    let model_path = model_path.to_string();
    debug!(model_path = %model_path, entries = entries.entries().len(), "read container");

    let xml = std::str::from_utf8(model_bytes)
        .map_err(|e| Error::invalid_format_context("model document", &format!("not UTF-8: {e}")))?;
    let mut doc = parse_model_document(xml)?;

    let Some(plan) = rewrite_assembly(&mut doc, base_count, content_count) else {
        return Ok(RewriteOutcome::Skipped(input.to_vec()));
    };

    metadata::apply_slicer_metadata(&mut doc);
    let sidecars = metadata::synthesize_sidecars(plan.assembly_id, &plan.components)?;

    let model_xml = writer::write_model_xml(&doc);
    let output = entries.write(&model_path, model_xml.as_bytes(), &sidecars)?;
    debug!(
        assembly_id = plan.assembly_id,
        components = plan.components.len(),
        "wrote rewritten container"
    );

    Ok(RewriteOutcome::Rewritten(output))
}
