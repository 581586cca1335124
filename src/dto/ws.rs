use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from realtime clients.
#[serde(tag = "type")]
pub enum RealtimeInbound {
    /// Subscribe this connection to a room, leaving any previous one.
    #[serde(rename = "join")]
    Join { room_id: Uuid },
    #[serde(rename = "leave")]
    Leave,
}

impl RealtimeInbound {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Control messages sent to a realtime client, besides room events.
#[serde(tag = "type")]
pub enum RealtimeControl {
    /// First frame of every connection. Echo `connection_id` in `X-Connection-Id` to
    /// suppress your own events.
    #[serde(rename = "connected")]
    Connected { connection_id: Uuid },
    #[serde(rename = "joined")]
    Joined { room_id: Uuid },
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "error")]
    Error { message: String },
}
