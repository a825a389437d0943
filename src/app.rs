use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::audit::{AuditReport, audit_collection};
use crate::config::ResolvedConfig;
use crate::domain::Source;
use crate::fetch::{Downloader, ObjectStore};
use crate::media::MediaTool;
use crate::providers::core_dataset::{CoreReport, sync_core_dataset};
use crate::providers::meva::MevaAcquirer;
use crate::providers::pathtrack::PathtrackAcquirer;
use crate::providers::pixabay::PixabayAcquirer;
use crate::providers::virat::ViratAcquirer;
use crate::providers::{Acquirer, SourceReport, run_source};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub sources: Vec<Source>,
    pub sync_core: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            sources: Source::ALL.to_vec(),
            sync_core: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub core: Option<CoreReport>,
    pub core_error: Option<String>,
    pub sources: Vec<SourceReport>,
    pub audit: Option<AuditReport>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<M: MediaTool, D: Downloader, O: ObjectStore> {
    store: Store,
    config: ResolvedConfig,
    media: M,
    http: D,
    objects: O,
}

impl<M: MediaTool, D: Downloader, O: ObjectStore> App<M, D, O> {
    pub fn new(store: Store, config: ResolvedConfig, media: M, http: D, objects: O) -> Self {
        Self {
            store,
            config,
            media,
            http,
            objects,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Runs the core sync and the requested acquirers one after another, then
    /// audits the collection. Never stops early on item failures.
    pub fn fetch(&self, options: &FetchOptions, sink: &dyn ProgressSink) -> RunReport {
        let mut report = RunReport::default();

        if options.sync_core {
            sink.event(ProgressEvent {
                message: "phase=Core; syncing dataset archives".to_string(),
                elapsed: None,
            });
            match sync_core_dataset(&self.store, &self.objects, &self.config.endpoints.core_prefix)
            {
                Ok(core) => report.core = Some(core),
                Err(err) => {
                    error!(error = %err, "core dataset sync failed");
                    report.core_error = Some(err.to_string());
                }
            }
        }

        for &source in &options.sources {
            if self.config.entry_count(source) == 0 {
                continue;
            }
            info!(%source, "acquiring");
            let acquirer = self.acquirer(source);
            report
                .sources
                .push(run_source(acquirer.as_ref(), &self.store, &self.media, sink));
        }

        report.audit = Some(self.audit(sink));
        report
    }

    pub fn audit(&self, sink: &dyn ProgressSink) -> AuditReport {
        sink.event(ProgressEvent {
            message: "phase=Audit; checking videos".to_string(),
            elapsed: None,
        });
        let expected = self.config.audit.expected_uids();
        audit_collection(&self.store, &self.media, &expected)
    }

    fn acquirer(&self, source: Source) -> Box<dyn Acquirer + '_> {
        let endpoints = &self.config.endpoints;
        match source {
            Source::Pixabay => Box::new(PixabayAcquirer::new(
                &self.store,
                &self.media,
                &self.http,
                &self.config.pixabay,
                endpoints,
            )),
            Source::Virat => Box::new(ViratAcquirer::new(
                &self.store,
                &self.media,
                &self.http,
                &self.config.virat,
                endpoints,
            )),
            Source::Meva => Box::new(MevaAcquirer::new(
                &self.store,
                &self.media,
                &self.objects,
                &self.config.meva,
                endpoints,
            )),
            Source::Pathtrack => Box::new(PathtrackAcquirer::new(
                &self.store,
                &self.media,
                &self.http,
                &self.config.pathtrack,
                endpoints,
            )),
        }
    }
}
