//! Shared update entrypoint used by the CLI.

use prmirror_core::RecordStore;

use crate::context::SyncContext;
use crate::event_log::EventLog;
use crate::export::{ExportOutcome, Exporter};
use crate::feed::SourceFeed;
use crate::lock::UpdateLock;
use crate::queue::{QueueConsumer, QueueReport};
use crate::reconcile::{FullReconciler, ReconcileReport};
use crate::SyncError;

/// Which engine an update runs before exporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Recompute the mirror from a complete remote snapshot.
    Full,
    /// Replay events after the stored cursor.
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReport {
    Full(ReconcileReport),
    Queue(QueueReport),
}

/// Outcome of one [`update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub engine: EngineReport,
    pub export: ExportOutcome,
}

impl UpdateReport {
    /// Event the queue consumer stopped in front of, if any.
    pub fn halted_at(&self) -> Option<prmirror_core::EventId> {
        match &self.engine {
            EngineReport::Queue(report) => report.halted_at,
            EngineReport::Full(_) => None,
        }
    }
}

/// Run one engine under the data directory lock, then export.
///
/// The export always reflects committed state: if the engine fails, nothing
/// is exported and the error is returned.
pub fn update<S, F, L>(
    ctx: &SyncContext,
    store: &S,
    feed: &F,
    log: &L,
    mode: UpdateMode,
) -> Result<UpdateReport, SyncError>
where
    S: RecordStore,
    F: SourceFeed,
    L: EventLog,
{
    let _lock = UpdateLock::acquire(&ctx.data_dir)?;

    let engine = match mode {
        UpdateMode::Full => EngineReport::Full(FullReconciler::new(ctx, feed, log).run(store)?),
        UpdateMode::Queue => EngineReport::Queue(QueueConsumer::new(ctx, log).run(store)?),
    };
    let export = Exporter::new(ctx).write(store)?;
    Ok(UpdateReport { engine, export })
}
