use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Frames sent by clients. The `event` tag names the logical channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat message")]
    ChatMessage(String),
}

/// Frames sent by the relay. Chat content and presence announcements travel
/// on separate channels so clients can tell them apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "chat message")]
    ChatMessage(String),
    #[serde(rename = "user status")]
    UserStatus(String),
}

impl ServerEvent {
    pub fn status(notice: StatusNotice) -> Self {
        ServerEvent::UserStatus(notice.text().to_string())
    }

    pub fn chat(text: impl Into<String>) -> Self {
        ServerEvent::ChatMessage(text.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusNotice {
    /// Sent to the first participant to connect.
    SoleParticipant,
    /// Sent to existing participants when someone connects.
    Joined,
    /// Sent to a newcomer who finds others already connected.
    OthersPresent,
    /// Sent to a participant who chats while alone.
    Waiting,
    Left,
    Empty,
}

impl StatusNotice {
    pub fn text(self) -> &'static str {
        match self {
            StatusNotice::SoleParticipant => {
                "You are the only one here. Waiting for others to join..."
            }
            StatusNotice::Joined => "A new user has joined the chat",
            StatusNotice::OthersPresent => "Another user is connected",
            StatusNotice::Waiting => {
                "You are the only one in the chat. Waiting for others to join..."
            }
            StatusNotice::Left => "A user has left the chat",
            StatusNotice::Empty => "You are the only one left in the chat",
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

pub fn decode<T: DeserializeOwned>(frame: &str) -> serde_json::Result<T> {
    serde_json::from_str(frame.trim_end_matches(['\n', '\r']))
}
