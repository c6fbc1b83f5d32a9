//! Outbox transport: queues commands for a chat adapter to collect.
//!
//! The adapter drains the queue over HTTP (`GET /commands`) and performs the
//! actual network calls. Message handles are allocated here so the engine
//! can refer to a challenge message before the adapter has sent it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use glyphgate_common::{GateError, GroupId, MessageRef, UserId};
use serde::Serialize;
use tokio::sync::Mutex;

use super::Transport;
use crate::captcha::Keyboard;

/// A command for the chat adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    DeliverChallenge {
        group_id: GroupId,
        user_id: UserId,
        message_id: MessageRef,
        /// Base64-encoded PNG
        image_png: String,
        keyboard: Keyboard,
        caption: String,
    },
    EditChallenge {
        group_id: GroupId,
        message_id: MessageRef,
        keyboard: Keyboard,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    DeleteChallenge {
        group_id: GroupId,
        message_id: MessageRef,
    },
    BanUser {
        group_id: GroupId,
        user_id: UserId,
    },
    RestrictUser {
        group_id: GroupId,
        user_id: UserId,
    },
    UnlockUser {
        group_id: GroupId,
        user_id: UserId,
    },
    NotifyGroup {
        group_id: GroupId,
        text: String,
    },
    LeaveGroup {
        group_id: GroupId,
    },
}

/// Bounded in-memory command queue
pub struct OutboxTransport {
    queue: Mutex<VecDeque<Command>>,
    capacity: usize,
    next_message: AtomicI64,
}

impl OutboxTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_message: AtomicI64::new(1),
        }
    }

    /// Take up to `max` queued commands, oldest first
    pub async fn drain(&self, max: usize) -> Vec<Command> {
        let mut queue = self.queue.lock().await;
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    async fn push(&self, command: Command) -> Result<(), GateError> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            return Err(GateError::Transport(format!(
                "outbox full ({} commands pending)",
                queue.len()
            )));
        }
        queue.push_back(command);
        Ok(())
    }
}

#[async_trait]
impl Transport for OutboxTransport {
    async fn deliver_challenge(
        &self,
        group: GroupId,
        user: UserId,
        image_png: Vec<u8>,
        keyboard: &Keyboard,
        caption: &str,
    ) -> Result<MessageRef, GateError> {
        let message = MessageRef(self.next_message.fetch_add(1, Ordering::Relaxed));
        self.push(Command::DeliverChallenge {
            group_id: group,
            user_id: user,
            message_id: message,
            image_png: STANDARD.encode(&image_png),
            keyboard: keyboard.clone(),
            caption: caption.to_string(),
        })
        .await?;
        Ok(message)
    }

    async fn edit_challenge(
        &self,
        group: GroupId,
        message: MessageRef,
        keyboard: &Keyboard,
        text: Option<&str>,
    ) -> Result<(), GateError> {
        self.push(Command::EditChallenge {
            group_id: group,
            message_id: message,
            keyboard: keyboard.clone(),
            text: text.map(str::to_string),
        })
        .await
    }

    async fn delete_challenge(&self, group: GroupId, message: MessageRef) -> Result<(), GateError> {
        self.push(Command::DeleteChallenge {
            group_id: group,
            message_id: message,
        })
        .await
    }

    async fn ban_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.push(Command::BanUser {
            group_id: group,
            user_id: user,
        })
        .await
    }

    async fn restrict_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.push(Command::RestrictUser {
            group_id: group,
            user_id: user,
        })
        .await
    }

    async fn unlock_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.push(Command::UnlockUser {
            group_id: group,
            user_id: user,
        })
        .await
    }

    async fn notify_group(&self, group: GroupId, text: &str) -> Result<(), GateError> {
        self.push(Command::NotifyGroup {
            group_id: group,
            text: text.to_string(),
        })
        .await
    }

    async fn leave_group(&self, group: GroupId) -> Result<(), GateError> {
        self.push(Command::LeaveGroup { group_id: group }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_allocates_message_ids() {
        let outbox = OutboxTransport::new(10);
        let keyboard = Keyboard::default();

        let first = outbox
            .deliver_challenge(GroupId(1), UserId(2), vec![1, 2, 3], &keyboard, "hi")
            .await
            .unwrap();
        let second = outbox
            .deliver_challenge(GroupId(1), UserId(3), vec![], &keyboard, "hi")
            .await
            .unwrap();
        assert_ne!(first, second);

        let commands = outbox.drain(10).await;
        assert_eq!(commands.len(), 2);
        match &commands[0] {
            Command::DeliverChallenge { message_id, image_png, .. } => {
                assert_eq!(*message_id, first);
                assert_eq!(image_png, "AQID");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(outbox.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_and_partial_drain() {
        let outbox = OutboxTransport::new(2);
        outbox.ban_user(GroupId(1), UserId(1)).await.unwrap();
        outbox.unlock_user(GroupId(1), UserId(2)).await.unwrap();

        let err = outbox.notify_group(GroupId(1), "full").await.unwrap_err();
        assert!(matches!(err, GateError::Transport(_)));

        let first = outbox.drain(1).await;
        assert_eq!(first, vec![Command::BanUser { group_id: GroupId(1), user_id: UserId(1) }]);
        assert_eq!(outbox.len().await, 1);
        outbox.notify_group(GroupId(1), "room again").await.unwrap();
        assert_eq!(outbox.len().await, 2);
    }

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_value(Command::DeleteChallenge {
            group_id: GroupId(-100),
            message_id: MessageRef(9),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "delete_challenge", "group_id": -100, "message_id": 9})
        );

        let json = serde_json::to_value(Command::LeaveGroup { group_id: GroupId(-7) }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "leave_group", "group_id": -7}));
    }
}
