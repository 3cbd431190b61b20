//! Topic naming

/// Logical topic names for chat traffic
///
/// Topics are owned by the transport; clients only ever hold the name.
pub struct Topics;

impl Topics {
    /// Direct messages addressed to one participant: `chat.user.bob`
    pub fn inbox(participant: &str) -> String {
        format!("chat.user.{}", participant)
    }

    /// Shared room traffic: `chat.room.general`
    pub fn room(room: &str) -> String {
        format!("chat.room.{}", room)
    }

    /// Participant presence announcements
    pub const PRESENCE: &'static str = "chat.presence";

    /// A topic name is usable if it is non-empty and has no whitespace
    pub fn is_valid(topic: &str) -> bool {
        !topic.is_empty() && !topic.chars().any(char::is_whitespace)
    }
}
