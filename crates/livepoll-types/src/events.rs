use serde::{Deserialize, Serialize};

use crate::models::PollSnapshot;

/// Frames pushed to observers over the WebSocket.
///
/// Serializes with the snapshot at the top level next to the tag:
/// `{"type":"poll_update","poll":{...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollFrame {
    /// One-time payload sent immediately after a subscription forms.
    InitialData { poll: PollSnapshot },

    /// Pushed to every subscribed observer after a vote lands.
    PollUpdate { poll: PollSnapshot },
}
