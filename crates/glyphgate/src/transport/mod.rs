//! Messaging transport boundary.
//!
//! The engine never talks to a chat network directly. It emits commands
//! through [`Transport`]; every call goes through [`Boundary`], which bounds
//! it with a timeout and logs failures so they never leak into challenge
//! state.

mod outbox;

pub use outbox::{Command, OutboxTransport};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glyphgate_common::{GateError, GroupId, MessageRef, UserId};

use crate::captcha::Keyboard;

/// Commands the engine can issue to the messaging side
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the challenge image with its keyboard
    async fn deliver_challenge(
        &self,
        group: GroupId,
        user: UserId,
        image_png: Vec<u8>,
        keyboard: &Keyboard,
        caption: &str,
    ) -> Result<MessageRef, GateError>;

    /// Replace the keyboard (and optionally the caption) of a challenge
    async fn edit_challenge(
        &self,
        group: GroupId,
        message: MessageRef,
        keyboard: &Keyboard,
        text: Option<&str>,
    ) -> Result<(), GateError>;

    async fn delete_challenge(&self, group: GroupId, message: MessageRef) -> Result<(), GateError>;

    async fn ban_user(&self, group: GroupId, user: UserId) -> Result<(), GateError>;

    /// Mute a user (no messages)
    async fn restrict_user(&self, group: GroupId, user: UserId) -> Result<(), GateError>;

    /// Lift every restriction
    async fn unlock_user(&self, group: GroupId, user: UserId) -> Result<(), GateError>;

    async fn notify_group(&self, group: GroupId, text: &str) -> Result<(), GateError>;

    /// Make the bot leave the group
    async fn leave_group(&self, group: GroupId) -> Result<(), GateError>;
}

/// Timeout-and-log wrapper around a [`Transport`]
#[derive(Clone)]
pub struct Boundary {
    transport: Arc<dyn Transport>,
    call_timeout: Duration,
}

impl Boundary {
    pub fn new(transport: Arc<dyn Transport>, call_timeout: Duration) -> Self {
        Self {
            transport,
            call_timeout,
        }
    }

    /// Run one transport call. Failures and timeouts are logged here; the
    /// error is handed back for callers that need to branch on it.
    async fn call<T>(
        &self,
        operation: &'static str,
        group: GroupId,
        fut: impl Future<Output = Result<T, GateError>>,
    ) -> Result<T, GateError> {
        let result = match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GateError::Transport(format!(
                "{operation} timed out after {:?}",
                self.call_timeout
            ))),
        };

        if let Err(e) = &result {
            tracing::error!(operation, group_id = %group, error = %e, "Transport call failed");
        }

        result
    }

    pub async fn deliver_challenge(
        &self,
        group: GroupId,
        user: UserId,
        image_png: Vec<u8>,
        keyboard: &Keyboard,
        caption: &str,
    ) -> Result<MessageRef, GateError> {
        self.call(
            "deliver_challenge",
            group,
            self.transport.deliver_challenge(group, user, image_png, keyboard, caption),
        )
        .await
    }

    pub async fn edit_challenge(
        &self,
        group: GroupId,
        message: MessageRef,
        keyboard: &Keyboard,
        text: Option<&str>,
    ) -> Result<(), GateError> {
        self.call(
            "edit_challenge",
            group,
            self.transport.edit_challenge(group, message, keyboard, text),
        )
        .await
    }

    pub async fn delete_challenge(&self, group: GroupId, message: MessageRef) -> Result<(), GateError> {
        self.call("delete_challenge", group, self.transport.delete_challenge(group, message))
            .await
    }

    pub async fn ban_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.call("ban_user", group, self.transport.ban_user(group, user)).await
    }

    pub async fn restrict_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.call("restrict_user", group, self.transport.restrict_user(group, user))
            .await
    }

    pub async fn unlock_user(&self, group: GroupId, user: UserId) -> Result<(), GateError> {
        self.call("unlock_user", group, self.transport.unlock_user(group, user)).await
    }

    pub async fn notify_group(&self, group: GroupId, text: &str) -> Result<(), GateError> {
        self.call("notify_group", group, self.transport.notify_group(group, text))
            .await
    }

    pub async fn leave_group(&self, group: GroupId) -> Result<(), GateError> {
        self.call("leave_group", group, self.transport.leave_group(group)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Transport whose every call fails, or hangs when `hang` is set
    pub(crate) struct BrokenTransport {
        pub hang: bool,
    }

    impl BrokenTransport {
        async fn fail<T>(&self) -> Result<T, GateError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Err(GateError::Transport("network unreachable".into()))
        }
    }

    #[async_trait]
    impl Transport for BrokenTransport {
        async fn deliver_challenge(
            &self,
            _group: GroupId,
            _user: UserId,
            _image_png: Vec<u8>,
            _keyboard: &Keyboard,
            _caption: &str,
        ) -> Result<MessageRef, GateError> {
            self.fail().await
        }

        async fn edit_challenge(
            &self,
            _group: GroupId,
            _message: MessageRef,
            _keyboard: &Keyboard,
            _text: Option<&str>,
        ) -> Result<(), GateError> {
            self.fail().await
        }

        async fn delete_challenge(&self, _group: GroupId, _message: MessageRef) -> Result<(), GateError> {
            self.fail().await
        }

        async fn ban_user(&self, _group: GroupId, _user: UserId) -> Result<(), GateError> {
            self.fail().await
        }

        async fn restrict_user(&self, _group: GroupId, _user: UserId) -> Result<(), GateError> {
            self.fail().await
        }

        async fn unlock_user(&self, _group: GroupId, _user: UserId) -> Result<(), GateError> {
            self.fail().await
        }

        async fn notify_group(&self, _group: GroupId, _text: &str) -> Result<(), GateError> {
            self.fail().await
        }

        async fn leave_group(&self, _group: GroupId) -> Result<(), GateError> {
            self.fail().await
        }
    }

    #[tokio::test]
    async fn test_boundary_passes_errors_through() {
        let boundary = Boundary::new(Arc::new(BrokenTransport { hang: false }), Duration::from_secs(1));
        let err = boundary.ban_user(GroupId(1), UserId(2)).await.unwrap_err();
        assert_eq!(err, GateError::Transport("network unreachable".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_times_out_hanging_calls() {
        let boundary = Boundary::new(Arc::new(BrokenTransport { hang: true }), Duration::from_secs(5));
        let err = boundary.delete_challenge(GroupId(1), MessageRef(3)).await.unwrap_err();
        assert!(matches!(err, GateError::Transport(msg) if msg.contains("timed out")));
    }
}
