//! Messages exchanged with clients.
//!
//! Every message is an envelope `{"type": ..., "data": ...}`. Broadcast
//! events use the same envelope (see `CanvasEvent`); the types here are the
//! direct replies to one client and the requests it can send.

use emojiplace_core::error::{remaining_secs, PlaceError, PlaceResult};
use emojiplace_core::types::Pixel;
use emojiplace_runtime::cooldown::CooldownStatus;
use emojiplace_runtime::pipeline::{PlaceRequest, Placement};
use serde::{Deserialize, Serialize};

/// A request from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    PlacePixel(PlaceRequest),
    GetCooldown,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, alias = "payload")]
    data: Option<serde_json::Value>,
}

impl ClientMessage {
    /// Parse a text frame. The body may be under `data` or `payload`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|_| "Invalid message format".to_string())?;

        match envelope.kind.as_str() {
            "place_pixel" => {
                let data = envelope
                    .data
                    .ok_or_else(|| "place_pixel needs x, y and mark".to_string())?;
                let mut request: PlaceRequest = serde_json::from_value(data)
                    .map_err(|e| format!("Invalid place_pixel: {}", e))?;
                // Identity comes from the connection, never from the client.
                request.identity.clear();
                Ok(ClientMessage::PlacePixel(request))
            }
            "get_cooldown" => Ok(ClientMessage::GetCooldown),
            other => Err(format!("Unknown message type: {}", other)),
        }
    }
}

/// A direct reply to one client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    PlaceSuccess {
        pixel: Pixel,
        cooldown: CooldownStatus,
    },
    PlaceError(PlaceFailure),
    CooldownStatus(CooldownStatus),
    Error {
        message: String,
    },
}

/// Body of a rejected placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceFailure {
    pub reason: &'static str,
    pub message: String,
    /// Seconds of cooldown left, for cooldown rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
}

impl From<&PlaceError> for PlaceFailure {
    fn from(e: &PlaceError) -> Self {
        Self {
            reason: e.reason(),
            message: match e {
                PlaceError::StoreUnavailable(_) => "Canvas unavailable, try again".to_string(),
                other => other.to_string(),
            },
            remaining: e.remaining().map(|r| remaining_secs(&r)),
        }
    }
}

impl ServerMessage {
    pub fn placed(result: &PlaceResult<Placement>) -> Self {
        match result {
            Ok(placement) => ServerMessage::PlaceSuccess {
                pixel: placement.pixel.clone(),
                cooldown: placement.cooldown,
            },
            Err(e) => ServerMessage::PlaceError(e.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
