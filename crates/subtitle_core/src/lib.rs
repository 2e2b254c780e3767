//! Subtitle core: file registry, per-entry state machine and view-model helpers.
//!
//! Everything here is synchronous and IO-free. Decoding, network calls and
//! scheduling live in `subtitle_engine`; front ends drive this crate either
//! through [`FileRegistry`] directly or through [`update`].
mod effect;
mod msg;
mod state;
mod theme;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    AddFilesStats, EntryId, EntryStatus, FileRegistry, IngestError, SourceFile, SubtitleEntry,
    TransitionError,
};
pub use theme::{ParseThemeError, ThemePreference};
pub use update::{update, CANCELLED_MESSAGE};
pub use view_model::{AppViewModel, EntryRowView};
