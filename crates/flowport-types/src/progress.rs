//! Progress snapshots for import jobs.

use serde::{Deserialize, Serialize};

/// Outcome marker of a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgressKind {
    /// Running or finished successfully.
    #[default]
    #[serde(rename = "")]
    Normal,
    /// Cancelled because of a failure.
    #[serde(rename = "danger")]
    Danger,
}

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    /// Completed units.
    pub events_count: u64,
    /// Expected units. Grows while a streamed document is being discovered.
    pub events_total: u64,
    pub finished: bool,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub text: String,
}

impl ProgressData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion in percent.
    ///
    /// Capped at 99 until the job is marked finished, since the total of a
    /// streamed import is only known once the stream is exhausted.
    pub fn percent(&self) -> u8 {
        if self.finished {
            return 100;
        }
        if self.events_total == 0 {
            return 0;
        }
        let pct = self.events_count.saturating_mul(100) / self.events_total;
        pct.min(99) as u8
    }

    /// Finished with every expected unit accounted for.
    pub fn is_complete(&self) -> bool {
        self.finished && self.events_count == self.events_total
    }

    pub fn is_failed(&self) -> bool {
        self.kind == ProgressKind::Danger
    }
}
