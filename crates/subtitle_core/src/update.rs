use std::sync::Arc;

use crate::{Effect, EntryId, EntryStatus, FileRegistry, Msg};

/// Error message recorded on an entry whose attempt was cancelled.
pub const CANCELLED_MESSAGE: &str = "Conversion cancelled";

/// Pure update function: applies a message to the registry and returns any effects.
///
/// Completions for entries that are no longer `pending` (removed, cancelled
/// or already finished) are dropped, so a late reply never overwrites a
/// newer state.
pub fn update(mut state: FileRegistry, msg: Msg) -> (FileRegistry, Vec<Effect>) {
    let effects = match msg {
        Msg::ToggleSelection(id) => {
            state.toggle_selection(id);
            Vec::new()
        }
        Msg::ToggleAll(selected) => {
            state.toggle_all_selection(selected);
            Vec::new()
        }
        Msg::RemoveFile(id) => {
            let was_pending = state
                .get(id)
                .is_some_and(|entry| entry.status() == EntryStatus::Pending);
            state.remove_file(id);
            if was_pending {
                vec![Effect::CancelConversion { id }]
            } else {
                Vec::new()
            }
        }
        Msg::ConvertSelected => {
            let targets: Vec<EntryId> = state
                .selected_files()
                .filter(|entry| {
                    matches!(entry.status(), EntryStatus::Idle | EntryStatus::Error)
                })
                .map(|entry| entry.id())
                .collect();
            targets
                .into_iter()
                .filter_map(|id| begin_attempt(&mut state, id))
                .collect()
        }
        Msg::Retry(id) => begin_attempt(&mut state, id).into_iter().collect(),
        Msg::CancelConversion(id) => {
            match state.update_file_status(id, EntryStatus::Error, Some(CANCELLED_MESSAGE.into())) {
                Ok(true) => vec![Effect::CancelConversion { id }],
                Ok(false) | Err(_) => Vec::new(),
            }
        }
        Msg::ConversionSucceeded {
            id,
            content,
            filename,
        } => {
            // Stale completion: the entry left `pending` meanwhile.
            let _ = state.record_conversion(id, content, filename);
            Vec::new()
        }
        Msg::ConversionFailed { id, message } => {
            let _ = state.update_file_status(id, EntryStatus::Error, Some(message));
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn begin_attempt(state: &mut FileRegistry, id: EntryId) -> Option<Effect> {
    let text = Arc::clone(state.get(id)?.original_content());
    match state.update_file_status(id, EntryStatus::Pending, None) {
        Ok(true) => Some(Effect::StartConversion { id, text }),
        Ok(false) | Err(_) => None,
    }
}
