use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use subtitle_core::ThemePreference;
use subtitle_engine::{AtomicFileWriter, PersistError};
use subtitle_logging::{subtitle_info, subtitle_warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    theme: Option<String>,
}

/// Reads the stored theme. Missing, unreadable or unknown values yield `System`.
pub(crate) fn load_theme(path: &Path) -> ThemePreference {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return ThemePreference::System;
        }
        Err(err) => {
            subtitle_warn!("Failed to read preferences from {:?}: {}", path, err);
            return ThemePreference::System;
        }
    };

    let stored: StoredPreferences = match ron::from_str(&content) {
        Ok(stored) => stored,
        Err(err) => {
            subtitle_warn!("Failed to parse preferences from {:?}: {}", path, err);
            return ThemePreference::System;
        }
    };

    ThemePreference::from_stored(stored.theme.as_deref())
}

pub(crate) fn save_theme(path: &Path, theme: ThemePreference) -> Result<PathBuf, PersistError> {
    let stored = StoredPreferences {
        theme: Some(theme.as_str().to_string()),
    };
    let content = ron::ser::to_string_pretty(&stored, ron::ser::PrettyConfig::new())
        .map_err(|err| PersistError::Io(std::io::Error::other(err)))?;

    let (dir, filename) = split_path(path)?;
    let written = AtomicFileWriter::new(dir).write(&filename, &content)?;
    subtitle_info!("Saved theme {} to {:?}", theme, written);
    Ok(written)
}

fn split_path(path: &Path) -> Result<(PathBuf, String), PersistError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::InvalidFilename(path.display().to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, filename.to_string()))
}
