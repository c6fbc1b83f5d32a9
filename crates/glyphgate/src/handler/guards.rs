//! Preconditions checked before an event touches challenge state.

use glyphgate_common::{ButtonReply, ChallengeKey, UserId};

use super::text;
use super::JoinEvent;
use crate::captcha::CallbackData;
use crate::registry::{ChallengeHandle, ChallengeRegistry};

/// Result of a guard: carry on with a value, or stop with a reason
#[derive(Debug)]
pub enum Verdict<T> {
    Continue(T),
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Member was added by someone else, not a self join
    AddedByOther,
    /// Button pressed by a user other than the one being tested
    WrongUser,
    /// No live challenge under the key
    NoActiveChallenge,
    NotGroupAdmin,
    NotSuperAdmin,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AddedByOther => "added_by_other",
            Self::WrongUser => "wrong_user",
            Self::NoActiveChallenge => "no_active_challenge",
            Self::NotGroupAdmin => "not_group_admin",
            Self::NotSuperAdmin => "not_super_admin",
        }
    }

    /// What the presser sees when a button press is rejected
    pub fn reply(&self) -> ButtonReply {
        match self {
            Self::WrongUser => ButtonReply::toast(text::WRONG_USER),
            Self::NoActiveChallenge => ButtonReply::toast(text::STALE_CHALLENGE),
            Self::AddedByOther | Self::NotGroupAdmin | Self::NotSuperAdmin => ButtonReply::toast(text::NOT_ALLOWED),
        }
    }
}

/// Only members who joined on their own are challenged
pub fn self_join(event: &JoinEvent) -> Verdict<()> {
    match event.added_by {
        Some(adder) if adder != event.user_id => Verdict::Reject(Rejection::AddedByOther),
        _ => Verdict::Continue(()),
    }
}

/// The presser must be the user the keyboard was issued to
pub fn intended_user(data: &CallbackData, presser: UserId) -> Verdict<UserId> {
    let target = data.target_user();
    if target == presser {
        Verdict::Continue(target)
    } else {
        Verdict::Reject(Rejection::WrongUser)
    }
}

pub fn active_challenge(registry: &ChallengeRegistry, key: &ChallengeKey) -> Verdict<ChallengeHandle> {
    match registry.get(key) {
        Some(handle) => Verdict::Continue(handle),
        None => Verdict::Reject(Rejection::NoActiveChallenge),
    }
}

/// Actor must be one of the configured super admins
pub fn super_admin(admins: &[UserId], actor: UserId) -> Verdict<()> {
    if admins.contains(&actor) {
        Verdict::Continue(())
    } else {
        Verdict::Reject(Rejection::NotSuperAdmin)
    }
}

/// Admin status is asserted by the chat adapter
pub fn group_admin(is_admin: bool) -> Verdict<()> {
    if is_admin {
        Verdict::Continue(())
    } else {
        Verdict::Reject(Rejection::NotGroupAdmin)
    }
}
