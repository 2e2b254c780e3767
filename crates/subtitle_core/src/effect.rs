use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The entry is now `pending`; convert `text` and report back.
    StartConversion { id: crate::EntryId, text: Arc<str> },
    /// Abort whatever call is in flight for the entry.
    CancelConversion { id: crate::EntryId },
}
