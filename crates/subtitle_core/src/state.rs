use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::view_model::{AppViewModel, EntryRowView};

pub type EntryId = u64;

/// Lifecycle of one entry. `Idle` is initial; no state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl EntryStatus {
    /// Allowed edges: idle→pending, pending→success, pending→error,
    /// success→pending, error→pending.
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Idle, EntryStatus::Pending)
                | (EntryStatus::Pending, EntryStatus::Success)
                | (EntryStatus::Pending, EntryStatus::Error)
                | (EntryStatus::Success, EntryStatus::Pending)
                | (EntryStatus::Error, EntryStatus::Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Idle => "idle",
            EntryStatus::Pending => "pending",
            EntryStatus::Success => "success",
            EntryStatus::Error => "error",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("entry {id}: {from} -> {to} is not a valid status transition")]
    Invalid {
        id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },
}

/// Immutable uploaded file: name plus raw bytes. Size is the byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    id: EntryId,
    original_file: Arc<SourceFile>,
    original_content: Arc<str>,
    converted_content: Option<String>,
    converted_filename: Option<String>,
    status: EntryStatus,
    selected: bool,
    error_message: Option<String>,
    progress: Option<u8>,
}

impl SubtitleEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn original_file(&self) -> &Arc<SourceFile> {
        &self.original_file
    }

    pub fn original_content(&self) -> &Arc<str> {
        &self.original_content
    }

    pub fn converted_content(&self) -> Option<&str> {
        self.converted_content.as_deref()
    }

    pub fn converted_filename(&self) -> Option<&str> {
        self.converted_filename.as_deref()
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Present only while `status == Error`.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    fn matches_file(&self, name: &str, size: u64) -> bool {
        self.original_file.name() == name && self.original_file.size() == size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddFilesStats {
    pub added: Vec<EntryId>,
    pub skipped: usize,
}

/// A file could not be decoded. Files accepted earlier in the same call stay
/// in the registry and are listed in `accepted`.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {file}: {source}")]
pub struct IngestError<E>
where
    E: std::error::Error + 'static,
{
    pub file: String,
    #[source]
    pub source: E,
    pub accepted: Vec<EntryId>,
}

/// Ordered collection of uploaded subtitle entries.
///
/// Entries are keyed by their monotonically allocated id, so iteration order
/// is acceptance order. One registry per session; nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileRegistry {
    entries: BTreeMap<EntryId, SubtitleEntry>,
    next_id: EntryId,
    dirty: bool,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and ingests `files` in order.
    ///
    /// A file whose `(name, size)` is already registered (including one added
    /// earlier in this same call) is skipped without being decoded. Decoding
    /// happens before the entry is inserted, so a file is either fully present
    /// or absent. The first decode failure stops ingestion.
    pub fn add_files<I, F, E>(
        &mut self,
        files: I,
        mut decode: F,
    ) -> Result<AddFilesStats, IngestError<E>>
    where
        I: IntoIterator<Item = SourceFile>,
        F: FnMut(&SourceFile) -> Result<String, E>,
        E: std::error::Error + 'static,
    {
        let mut stats = AddFilesStats::default();
        for file in files {
            if self.contains_file(file.name(), file.size()) {
                stats.skipped += 1;
                continue;
            }
            let content = match decode(&file) {
                Ok(content) => content,
                Err(source) => {
                    return Err(IngestError {
                        file: file.name().to_string(),
                        source,
                        accepted: stats.added,
                    });
                }
            };
            match self.add_decoded(file, content) {
                Some(id) => stats.added.push(id),
                None => stats.skipped += 1,
            }
        }
        Ok(stats)
    }

    /// Inserts an already-decoded file. Returns `None` for a duplicate.
    pub fn add_decoded(&mut self, file: SourceFile, content: String) -> Option<EntryId> {
        if self.contains_file(file.name(), file.size()) {
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            SubtitleEntry {
                id,
                original_file: Arc::new(file),
                original_content: Arc::from(content),
                converted_content: None,
                converted_filename: None,
                status: EntryStatus::Idle,
                selected: true,
                error_message: None,
                progress: None,
            },
        );
        self.dirty = true;
        Some(id)
    }

    pub fn contains_file(&self, name: &str, size: u64) -> bool {
        self.entries
            .values()
            .any(|entry| entry.matches_file(name, size))
    }

    /// Removes the entry; absent ids are a no-op.
    pub fn remove_file(&mut self, id: EntryId) -> Option<SubtitleEntry> {
        let removed = self.entries.remove(&id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// The only place `status` and `error_message` change.
    ///
    /// Returns `Ok(false)` when the id is unknown. `error` is recorded only
    /// when moving to `Error`; leaving `Error` clears the message.
    pub fn update_file_status(
        &mut self,
        id: EntryId,
        status: EntryStatus,
        error: Option<String>,
    ) -> Result<bool, TransitionError> {
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        if !entry.status.can_transition_to(status) {
            return Err(TransitionError::Invalid {
                id,
                from: entry.status,
                to: status,
            });
        }
        entry.status = status;
        entry.error_message = match status {
            EntryStatus::Error => Some(error.unwrap_or_else(|| "Unknown error".to_string())),
            _ => None,
        };
        self.dirty = true;
        Ok(true)
    }

    /// Stores converted output and moves the entry `pending → success`.
    pub fn record_conversion(
        &mut self,
        id: EntryId,
        content: String,
        filename: String,
    ) -> Result<bool, TransitionError> {
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        if !entry.status.can_transition_to(EntryStatus::Success) {
            return Err(TransitionError::Invalid {
                id,
                from: entry.status,
                to: EntryStatus::Success,
            });
        }
        entry.converted_content = Some(content);
        entry.converted_filename = Some(filename);
        self.update_file_status(id, EntryStatus::Success, None)
    }

    /// Flips `selected`; returns the new value, or `None` for unknown ids.
    pub fn toggle_selection(&mut self, id: EntryId) -> Option<bool> {
        let entry = self.entries.get_mut(&id)?;
        entry.selected = !entry.selected;
        self.dirty = true;
        Some(entry.selected)
    }

    pub fn toggle_all_selection(&mut self, selected: bool) {
        for entry in self.entries.values_mut() {
            entry.selected = selected;
        }
        if !self.entries.is_empty() {
            self.dirty = true;
        }
    }

    pub fn set_progress(&mut self, id: EntryId, progress: Option<u8>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.progress = progress.map(|p| p.min(100));
            self.dirty = true;
        }
    }

    pub fn get(&self, id: EntryId) -> Option<&SubtitleEntry> {
        self.entries.get(&id)
    }

    pub fn files(&self) -> impl Iterator<Item = &SubtitleEntry> {
        self.entries.values()
    }

    pub fn selected_files(&self) -> impl Iterator<Item = &SubtitleEntry> {
        self.entries.values().filter(|entry| entry.selected)
    }

    pub fn has_files(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> AppViewModel {
        let entries: Vec<EntryRowView> = self
            .entries
            .values()
            .map(|entry| EntryRowView {
                id: entry.id,
                name: entry.original_file.name().to_string(),
                size: entry.original_file.size(),
                status: entry.status,
                selected: entry.selected,
                converted_filename: entry.converted_filename.clone(),
                error_message: entry.error_message.clone(),
                progress: entry.progress,
            })
            .collect();
        let count = |status: EntryStatus| entries.iter().filter(|row| row.status == status).count();

        AppViewModel {
            file_count: entries.len(),
            selected_count: entries.iter().filter(|row| row.selected).count(),
            idle_count: count(EntryStatus::Idle),
            pending_count: count(EntryStatus::Pending),
            success_count: count(EntryStatus::Success),
            error_count: count(EntryStatus::Error),
            has_files: !entries.is_empty(),
            dirty: self.dirty,
            entries,
        }
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_edge_is_accepted() {
        use EntryStatus::*;
        let allowed = [
            (Idle, Pending),
            (Pending, Success),
            (Pending, Error),
            (Success, Pending),
            (Error, Pending),
        ];
        for from in [Idle, Pending, Success, Error] {
            for to in [Idle, Pending, Success, Error] {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = FileRegistry::new();
        let first = registry
            .add_decoded(SourceFile::new("a.srt", "1"), "1".into())
            .unwrap();
        registry.remove_file(first);
        let second = registry
            .add_decoded(SourceFile::new("a.srt", "1"), "1".into())
            .unwrap();
        assert_ne!(first, second);
    }
}
