use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use subtitle_core::{
    update, AddFilesStats, AppViewModel, Effect, EntryId, EntryStatus, FileRegistry, IngestError,
    Msg, SourceFile, CANCELLED_MESSAGE,
};
use subtitle_logging::{excerpt, subtitle_debug, subtitle_info, subtitle_warn};
use tokio_util::sync::CancellationToken;

use crate::client::SubtitleConverter;
use crate::decode::{decode_source, DecodeError};
use crate::filename::converted_filename;
use crate::{ConversionError, ConvertOptions, FailureKind};

/// One registry per session, shared by every in-flight attempt.
pub type SharedRegistry = Arc<Mutex<FileRegistry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Attempts cancelled or superseded before they could report.
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

enum AttemptOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

struct Attempt {
    generation: u64,
    token: CancellationToken,
}

struct StartedAttempt {
    id: EntryId,
    name: String,
    text: Arc<str>,
    generation: u64,
    token: CancellationToken,
}

/// Drives registry entries through a [`SubtitleConverter`].
///
/// Every attempt owns a cancellation token and a generation number. Only the
/// attempt whose generation is current for its entry may report back, so a
/// cancelled or superseded call can never overwrite a newer outcome.
pub struct BatchOrchestrator {
    registry: SharedRegistry,
    converter: Arc<dyn SubtitleConverter>,
    options: ConvertOptions,
    attempts: Mutex<HashMap<EntryId, Attempt>>,
    next_generation: AtomicU64,
}

impl BatchOrchestrator {
    pub fn new(converter: Arc<dyn SubtitleConverter>, options: ConvertOptions) -> Self {
        Self::with_registry(Arc::new(Mutex::new(FileRegistry::new())), converter, options)
    }

    pub fn with_registry(
        registry: SharedRegistry,
        converter: Arc<dyn SubtitleConverter>,
        options: ConvertOptions,
    ) -> Self {
        Self {
            registry,
            converter,
            options,
            attempts: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn view(&self) -> AppViewModel {
        self.lock_registry().view()
    }

    /// Decodes and registers `files`; duplicates by name and size are skipped.
    pub fn add_files(
        &self,
        files: Vec<SourceFile>,
    ) -> Result<AddFilesStats, IngestError<DecodeError>> {
        let result = self.lock_registry().add_files(files, decode_source);
        match &result {
            Ok(stats) => subtitle_info!(
                "Registered {} file(s), skipped {} duplicate(s)",
                stats.added.len(),
                stats.skipped
            ),
            Err(err) => subtitle_warn!("Ingestion stopped at {}: {}", err.file, err.source),
        }
        result
    }

    /// Applies `msg` to the registry, executes the resulting effects and
    /// waits for every conversion it started.
    pub async fn dispatch(&self, msg: Msg) -> BatchSummary {
        let started = self.apply(msg);
        if !started.is_empty() {
            subtitle_info!("Starting {} conversion(s)", started.len());
        }
        self.run_attempts(started).await
    }

    /// Converts every selected entry that is idle or failed, concurrently.
    pub async fn convert_selected(&self) -> BatchSummary {
        self.dispatch(Msg::ConvertSelected).await
    }

    /// Converts one entry again, whatever its last outcome. Pending entries are left alone.
    pub async fn retry(&self, id: EntryId) -> BatchSummary {
        self.dispatch(Msg::Retry(id)).await
    }

    /// Abandons the in-flight call for `id`; the entry ends in `error`.
    pub fn cancel(&self, id: EntryId) {
        self.apply(Msg::CancelConversion(id));
    }

    /// Removes the entry and cancels its in-flight call, if any.
    pub fn remove_file(&self, id: EntryId) {
        self.apply(Msg::RemoveFile(id));
    }

    pub fn toggle_selection(&self, id: EntryId) {
        self.apply(Msg::ToggleSelection(id));
    }

    pub fn toggle_all_selection(&self, selected: bool) {
        self.apply(Msg::ToggleAll(selected));
    }

    /// Side-by-side diff of the entry's original text. Does not touch its status.
    pub async fn diff(&self, id: EntryId) -> Result<String, ConversionError> {
        let text = {
            let registry = self.lock_registry();
            match registry.get(id) {
                Some(entry) => Arc::clone(entry.original_content()),
                None => {
                    return Err(ConversionError::new(
                        FailureKind::InvalidRequest,
                        format!("no entry with id {id}"),
                    ));
                }
            }
        };
        self.converter.get_diff(&text, &self.options).await
    }

    fn apply(&self, msg: Msg) -> Vec<StartedAttempt> {
        let mut registry = self.lock_registry();
        let state = std::mem::take(&mut *registry);
        let (state, effects) = update(state, msg);
        *registry = state;

        let mut started = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartConversion { id, text } => {
                    let name = registry
                        .get(id)
                        .map(|entry| entry.original_file().name().to_string())
                        .unwrap_or_default();
                    let (generation, token) = self.register_attempt(id);
                    started.push(StartedAttempt {
                        id,
                        name,
                        text,
                        generation,
                        token,
                    });
                }
                Effect::CancelConversion { id } => {
                    if let Some(attempt) = self.lock_attempts().remove(&id) {
                        subtitle_debug!("Cancelling attempt {} for entry {}", attempt.generation, id);
                        attempt.token.cancel();
                    }
                }
            }
        }
        started
    }

    fn register_attempt(&self, id: EntryId) -> (u64, CancellationToken) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.lock_attempts().insert(
            id,
            Attempt {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Retires the attempt if it is still the current one for its entry.
    fn finish_attempt(&self, id: EntryId, generation: u64) -> bool {
        let mut attempts = self.lock_attempts();
        match attempts.get(&id) {
            Some(current) if current.generation == generation => {
                attempts.remove(&id);
                true
            }
            _ => false,
        }
    }

    async fn run_attempts(&self, started: Vec<StartedAttempt>) -> BatchSummary {
        let outcomes = join_all(started.into_iter().map(|attempt| self.run_attempt(attempt))).await;
        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match outcome {
                AttemptOutcome::Succeeded => summary.succeeded += 1,
                AttemptOutcome::Failed => summary.failed += 1,
                AttemptOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    async fn run_attempt(&self, attempt: StartedAttempt) -> AttemptOutcome {
        subtitle_debug!(
            "Converting entry {} ({}) text={:?}",
            attempt.id,
            attempt.name,
            excerpt(&attempt.text, 40)
        );
        let result = tokio::select! {
            _ = attempt.token.cancelled() => Err(ConversionError::new(
                FailureKind::Cancelled,
                CANCELLED_MESSAGE,
            )),
            result = self.converter.convert_subtitle(&attempt.text, &self.options) => result,
        };

        if !self.finish_attempt(attempt.id, attempt.generation) {
            subtitle_debug!("Dropping stale result for entry {}", attempt.id);
            return AttemptOutcome::Cancelled;
        }

        match result {
            Ok(content) => {
                let filename = converted_filename(&attempt.name, &self.options.converter);
                let applied = self.complete(
                    attempt.id,
                    Msg::ConversionSucceeded {
                        id: attempt.id,
                        content,
                        filename: filename.clone(),
                    },
                );
                if !applied {
                    subtitle_debug!("Entry {} left pending before its reply landed", attempt.id);
                    return AttemptOutcome::Cancelled;
                }
                subtitle_info!("Converted {} -> {}", attempt.name, filename);
                AttemptOutcome::Succeeded
            }
            Err(err) => {
                let applied = self.complete(
                    attempt.id,
                    Msg::ConversionFailed {
                        id: attempt.id,
                        message: err.message.clone(),
                    },
                );
                if !applied {
                    subtitle_debug!("Entry {} left pending before its reply landed", attempt.id);
                    return AttemptOutcome::Cancelled;
                }
                subtitle_warn!("Conversion of {} failed: {} ({})", attempt.name, err, err.kind);
                AttemptOutcome::Failed
            }
        }
    }

    /// Applies a completion only while the entry is still pending.
    fn complete(&self, id: EntryId, msg: Msg) -> bool {
        let mut registry = self.lock_registry();
        if registry.get(id).map(|entry| entry.status()) != Some(EntryStatus::Pending) {
            return false;
        }
        let state = std::mem::take(&mut *registry);
        let (state, _) = update(state, msg);
        *registry = state;
        true
    }

    fn lock_registry(&self) -> MutexGuard<'_, FileRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_attempts(&self) -> MutexGuard<'_, HashMap<EntryId, Attempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
