//! Container (zip package) reading and writing
//!
//! The whole archive is loaded into memory before any output is produced
//! (read-then-write): the source container is never mutated in place, and a
//! failure at any point leaves it untouched. Output entries keep the original
//! archive order for diff-friendliness.

use crate::error::{Error, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extension of the model document entry inside the container
const MODEL_ENTRY_SUFFIX: &str = ".model";

/// All entries of a container, fully loaded, in archive order
#[derive(Debug, Clone)]
pub struct PackageEntries {
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageEntries {
    /// Read every entry of a container into memory
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            entries.push((file.name().to_string(), content));
        }

        Ok(Self { entries })
    }

    /// All entries in archive order
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    /// Locate the model document entry (name ends in `.model`,
    /// case-insensitive)
    ///
    /// Returns the entry name and its bytes; a container without a model
    /// entry is malformed.
    pub fn model_entry(&self) -> Result<(&str, &[u8])> {
        self.entries
            .iter()
            .find(|(name, _)| name.to_lowercase().ends_with(MODEL_ENTRY_SUFFIX))
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
            .ok_or_else(|| Error::MissingFile(format!("*{}", MODEL_ENTRY_SUFFIX)))
    }

    /// Serialize a new container: original entries unchanged and in order,
    /// the model entry replaced, sidecar documents overwritten in place or
    /// appended
    pub fn write(
        &self,
        model_path: &str,
        model_bytes: &[u8],
        sidecars: &[(String, Vec<u8>)],
    ) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut written_sidecars = vec![false; sidecars.len()];

        for (name, content) in &self.entries {
            zip.start_file(name.as_str(), options)?;
            if name == model_path {
                zip.write_all(model_bytes)?;
            } else if let Some(pos) = sidecars.iter().position(|(path, _)| path == name) {
                zip.write_all(&sidecars[pos].1)?;
                written_sidecars[pos] = true;
            } else {
                zip.write_all(content)?;
            }
        }

        for (pos, (path, content)) in sidecars.iter().enumerate() {
            if !written_sidecars[pos] {
                zip.start_file(path.as_str(), options)?;
                zip.write_all(content)?;
            }
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
