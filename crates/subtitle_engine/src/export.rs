use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::json;
use subtitle_core::{EntryId, EntryStatus, FileRegistry};
use subtitle_logging::subtitle_info;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::DEFAULT_CONVERTER;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub manifest_filename: Option<String>,
    /// Converter profile the entries were converted with, for the manifest.
    pub converter: String,
    /// Recorded in the manifest; tests pass a fixed value.
    pub exported_utc: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            manifest_filename: Some("manifest.json".to_string()),
            converter: DEFAULT_CONVERTER.to_string(),
            exported_utc: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Writes every successfully converted entry into `output_dir`.
///
/// Entries whose last attempt failed are skipped even if they still hold
/// content from an earlier success. Clashing output names get the entry id
/// prepended, plus a counter if that name is taken too.
pub fn export_converted(
    registry: &FileRegistry,
    output_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let mut used = HashSet::new();
    if let Some(manifest) = &options.manifest_filename {
        used.insert(manifest.clone());
    }
    let mut written = Vec::new();
    let mut files = Vec::new();

    for entry in registry.files() {
        if entry.status() != EntryStatus::Success {
            continue;
        }
        let (Some(content), Some(name)) = (entry.converted_content(), entry.converted_filename())
        else {
            continue;
        };
        let filename = claim_filename(&mut used, entry.id(), name);

        let path = writer.write(&filename, content)?;
        subtitle_info!("Wrote {:?} ({} bytes)", path, content.len());
        files.push(json!({
            "filename": filename,
            "source": entry.original_file().name(),
            "source_bytes": entry.original_file().size(),
        }));
        written.push(path);
    }

    let manifest_path = match &options.manifest_filename {
        Some(name) => {
            let manifest = json!({
                "file_count": files.len(),
                "converter": options.converter,
                "exported_utc": options.exported_utc,
                "files": files,
            });
            Some(writer.write(name, &manifest.to_string())?)
        }
        None => None,
    };

    Ok(ExportSummary {
        written,
        manifest_path,
    })
}

/// Reserves a name no earlier output uses: `name`, `{id}-name`, `{id}-2-name`, ...
fn claim_filename(used: &mut HashSet<String>, id: EntryId, name: &str) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = match counter {
            1 => format!("{id}-{name}"),
            n => format!("{id}-{n}-{name}"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
