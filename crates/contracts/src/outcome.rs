//! Dispatcher submit outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AssignmentInfo, RecordId};

/// Successful result of a dispatcher submission
///
/// Rejections (permanent request errors, read-path unavailability) travel
/// through the `Err` arm as [`crate::RelayError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Write delivered directly to the datastore
    Stored { storage_id: u64 },

    /// Write acknowledged by the remote API
    Accepted { response: Value },

    /// Upstream unreachable; write preserved in the durable queue
    QueuedOffline { queue_id: RecordId },

    /// Assignment lookup answered (directly or via storage fallback)
    Assignment { info: Option<AssignmentInfo> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serde_tag() {
        let json = serde_json::to_value(SubmitOutcome::QueuedOffline { queue_id: 42 }).unwrap();
        assert_eq!(json["status"], "queued_offline");
        assert_eq!(json["queue_id"], 42);
    }
}
