//! Core types shared across Glyphgate components.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group (chat) identifier, opaque to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

/// User identifier, opaque to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Handle to a message delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry key: at most one challenge per (group, user)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeKey {
    pub group: GroupId,
    pub user: UserId,
}

impl ChallengeKey {
    pub fn new(group: GroupId, user: UserId) -> Self {
        Self { group, user }
    }
}

impl fmt::Display for ChallengeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.user)
    }
}

/// Lifecycle state of a challenge
///
/// - Pending: buttons generated, artifact not delivered yet
/// - AwaitingInput: artifact delivered, accepting presses
/// - Solved / Failed / Expired: terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    #[default]
    Pending,
    AwaitingInput,
    Solved,
    Failed,
    Expired,
}

impl ChallengeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Solved | Self::Failed | Self::Expired)
    }
}

/// Short answer shown to the user who pressed a button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonReply {
    pub text: String,
    /// Show as a modal alert instead of a toast
    #[serde(default)]
    pub show_alert: bool,
}

impl ButtonReply {
    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_alert: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_alert: true,
        }
    }
}

/// Read-only view of an active challenge, for admin listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub state: ChallengeState,
    pub errors_made: u32,
    pub error_budget: u32,
    pub correct_selected: usize,
    pub required_correct: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ChallengeState::Pending.is_terminal());
        assert!(!ChallengeState::AwaitingInput.is_terminal());
        assert!(ChallengeState::Solved.is_terminal());
        assert!(ChallengeState::Failed.is_terminal());
        assert!(ChallengeState::Expired.is_terminal());
    }

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(ChallengeState::default(), ChallengeState::Pending);
    }

    #[test]
    fn test_ids_serialize_transparent() {
        let key = ChallengeKey::new(GroupId(-100123), UserId(42));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"group":-100123,"user":42}"#);
        assert_eq!(key.to_string(), "-100123/42");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ChallengeState::AwaitingInput).unwrap();
        assert_eq!(json, r#""awaiting_input""#);
    }
}
