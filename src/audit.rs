use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::domain::Uid;
use crate::media::MediaTool;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub checked: usize,
    pub missing: BTreeSet<Uid>,
    pub corrupt: BTreeSet<Uid>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty()
    }
}

/// Checks that every expected canonical file exists and probes. Reports only;
/// nothing is repaired.
pub fn audit_collection(
    store: &Store,
    media: &dyn MediaTool,
    expected: &BTreeSet<Uid>,
) -> AuditReport {
    let mut report = AuditReport {
        checked: expected.len(),
        ..AuditReport::default()
    };
    for &uid in expected {
        let path = store.canonical_path(uid);
        if !path.as_std_path().exists() {
            report.missing.insert(uid);
            continue;
        }
        if let Err(err) = media.probe_fps(path.as_std_path()) {
            debug!(%uid, error = %err, "corrupt video");
            report.corrupt.insert(uid);
        }
    }
    report
}
