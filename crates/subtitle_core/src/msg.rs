use crate::EntryId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User flipped the checkbox of one entry.
    ToggleSelection(EntryId),
    /// User clicked select-all / select-none.
    ToggleAll(bool),
    /// User removed an entry from the list.
    RemoveFile(EntryId),
    /// User started a batch conversion of the selected entries.
    ConvertSelected,
    /// User asked to convert one entry again, whatever its last outcome.
    Retry(EntryId),
    /// User abandoned an in-flight conversion.
    CancelConversion(EntryId),
    /// Engine returned converted text for an entry.
    ConversionSucceeded {
        id: EntryId,
        content: String,
        filename: String,
    },
    /// Engine reported a failed attempt for an entry.
    ConversionFailed { id: EntryId, message: String },
    /// Fallback for placeholder wiring.
    NoOp,
}
