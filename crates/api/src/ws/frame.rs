use relay_events::BusMessage;
use serde::{Deserialize, Serialize};

/// A client-bound frame: the bus channel and the payload exactly as it was
/// published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub channel: String,
    pub payload: String,
}

impl Frame {
    /// JSON text sent over the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<BusMessage> for Frame {
    fn from(msg: BusMessage) -> Self {
        Self {
            channel: msg.channel,
            payload: msg.payload,
        }
    }
}
