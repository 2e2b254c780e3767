use crate::{EntryId, EntryStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub entries: Vec<EntryRowView>,
    pub file_count: usize,
    pub selected_count: usize,
    pub idle_count: usize,
    pub pending_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub has_files: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRowView {
    pub id: EntryId,
    pub name: String,
    pub size: u64,
    pub status: EntryStatus,
    pub selected: bool,
    pub converted_filename: Option<String>,
    pub error_message: Option<String>,
    pub progress: Option<u8>,
}
