use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunReport};
use crate::audit::AuditReport;
use crate::domain::Uid;
use crate::providers::ItemOutcome;
use crate::store::Store;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_audit(result: &AuditReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-per-event progress on stdout.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_run(result: &RunReport, store: &Store) {
        if let Some(core) = &result.core {
            println!(
                "core: {} fetched, {} already present, {} extracted",
                core.fetched.len(),
                core.present.len(),
                core.extracted.len()
            );
        }
        if let Some(err) = &result.core_error {
            eprintln!("core: sync failed: {err}");
        }
        for source in &result.sources {
            println!(
                "{}: {} installed, {} skipped, {} failed",
                source.source,
                source.count(|o| matches!(o, ItemOutcome::Installed)),
                source.count(|o| matches!(o, ItemOutcome::Skipped)),
                source.count(|o| matches!(o, ItemOutcome::Failed { .. })),
            );
            for item in source.failed() {
                if let ItemOutcome::Failed { reason } = &item.outcome {
                    eprintln!(
                        "  failed to process {} video {} for {}: {reason}",
                        source.source, item.source_id, item.uid
                    );
                }
            }
        }
        if let Some(audit) = &result.audit {
            Self::print_audit(audit, store);
        }
    }

    pub fn print_audit(audit: &AuditReport, store: &Store) {
        if audit.is_clean() {
            println!(
                "Check successful: all {} videos are present and readable. The staging folders \
                 under {} (pixabay, virat, meva, pathtrack) can be removed.",
                audit.checked,
                store.videos_root()
            );
            return;
        }
        let join = |set: &BTreeSet<Uid>| {
            set.iter()
                .map(|uid| uid.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        eprintln!(
            "Warning: missing and/or corrupt videos under {}. missing: [{}], corrupt: [{}]. \
             See the errors above for the cause of each.",
            store.videos_root(),
            join(&audit.missing),
            join(&audit.corrupt)
        );
    }
}
