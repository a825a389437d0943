pub mod core_dataset;
pub mod meva;
pub mod pathtrack;
pub mod pixabay;
pub mod virat;

use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{Source, Uid};
use crate::error::DatasetError;
use crate::media::MediaTool;
use crate::store::Store;

/// One source's way of turning a source identifier into a canonical video.
pub trait Acquirer {
    fn source(&self) -> Source;

    /// `(source_id, uid)` pairs this acquirer is responsible for.
    fn entries(&self) -> Vec<(String, Uid)>;

    /// Work shared by every pending entry. Only runs when at least one entry
    /// still needs acquiring; an error here aborts the whole source.
    fn prepare(&self) -> Result<(), DatasetError> {
        Ok(())
    }

    /// Fetches, transforms and installs one entry. Every intermediate file is
    /// reused when already staged.
    fn acquire(&self, source_id: &str, uid: Uid) -> Result<(), DatasetError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Installed,
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub source_id: String,
    pub uid: Uid,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: Source,
    pub items: Vec<ItemReport>,
    /// Set when a fatal error stopped the source early.
    pub aborted: Option<String>,
}

impl SourceReport {
    pub fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| predicate(&item.outcome))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Failed { .. }))
    }
}

/// Drives one acquirer over all of its entries. Per-entry failures are
/// recorded and the loop moves on; fatal errors fail the remaining entries.
pub fn run_source(
    acquirer: &dyn Acquirer,
    store: &Store,
    media: &dyn MediaTool,
    sink: &dyn ProgressSink,
) -> SourceReport {
    let source = acquirer.source();
    let mut report = SourceReport {
        source,
        items: Vec::new(),
        aborted: None,
    };

    let mut pending = Vec::new();
    for (source_id, uid) in acquirer.entries() {
        if store.is_installed(media, uid) {
            report.items.push(ItemReport {
                source_id,
                uid,
                outcome: ItemOutcome::Skipped,
            });
        } else {
            pending.push((source_id, uid));
        }
    }

    sink.event(ProgressEvent {
        message: format!(
            "source={source}; {} pending, {} already installed",
            pending.len(),
            report.items.len()
        ),
        elapsed: None,
    });
    if pending.is_empty() {
        return report;
    }

    if let Err(err) = acquirer.prepare() {
        error!(%source, error = %err, "source preparation failed");
        abort(&mut report, pending, &err);
        return report;
    }

    let mut remaining = pending.into_iter();
    while let Some((source_id, uid)) = remaining.next() {
        let start = Instant::now();
        match acquirer.acquire(&source_id, uid) {
            Ok(()) => {
                info!(%source, source_id = %source_id, %uid, "installed");
                sink.event(ProgressEvent {
                    message: format!("source={source}; installed {source_id} as {uid}"),
                    elapsed: Some(start.elapsed()),
                });
                report.items.push(ItemReport {
                    source_id,
                    uid,
                    outcome: ItemOutcome::Installed,
                });
            }
            Err(err) if err.is_fatal() => {
                error!(
                    %source, source_id = %source_id, %uid, error = %err,
                    "fatal error, stopping source"
                );
                report.items.push(ItemReport {
                    source_id,
                    uid,
                    outcome: ItemOutcome::Failed {
                        reason: err.to_string(),
                    },
                });
                abort(&mut report, remaining.by_ref().collect(), &err);
                break;
            }
            Err(err) => {
                warn!(
                    %source, source_id = %source_id, %uid, error = %err,
                    "failed to process video"
                );
                report.items.push(ItemReport {
                    source_id,
                    uid,
                    outcome: ItemOutcome::Failed {
                        reason: err.to_string(),
                    },
                });
            }
        }
    }
    report
}

fn abort(report: &mut SourceReport, pending: Vec<(String, Uid)>, err: &DatasetError) {
    let reason = err.to_string();
    report.aborted = Some(reason.clone());
    report
        .items
        .extend(pending.into_iter().map(|(source_id, uid)| ItemReport {
            source_id,
            uid,
            outcome: ItemOutcome::Failed {
                reason: format!("not attempted: {reason}"),
            },
        }));
}
