//! Events fanned out to live observers.

use crate::types::{AgentMessage, Pixel};
use serde::{Deserialize, Serialize};

/// An event pushed to every registered connection.
///
/// Serialized as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CanvasEvent {
    PixelPlaced(Pixel),
    AgentMessage(AgentMessage),
}

impl CanvasEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CanvasEvent::PixelPlaced(_) => "pixel_placed",
            CanvasEvent::AgentMessage(_) => "agent_message",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_placed_envelope() {
        let event = CanvasEvent::PixelPlaced(Pixel {
            x: 3,
            y: 4,
            mark: "🤖".into(),
            placed_by: "a1".into(),
            display_name: Some("Robo".into()),
            written_at: 42,
        });
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "pixel_placed");
        assert_eq!(json["data"]["mark"], "🤖");
        assert_eq!(json["data"]["displayName"], "Robo");
        assert_eq!(event.kind(), "pixel_placed");
    }

    #[test]
    fn test_agent_message_envelope() {
        let event = CanvasEvent::AgentMessage(AgentMessage::new("a1", "a2", "hi", 7));
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "agent_message");
        assert_eq!(json["data"]["from"], "a1");
        assert_eq!(json["data"]["sentAt"], 7);
    }
}
