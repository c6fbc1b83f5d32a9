//! Event handling: turns chat events into challenge transitions and
//! transport commands.
//!
//! Each handler runs its guards first, then performs the state transition
//! while holding the challenge lock, then issues transport commands with the
//! lock released. Transport failures are logged by the boundary and never
//! roll back a transition.

pub mod guards;
pub mod text;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use glyphgate_common::{ButtonReply, ChallengeKey, GateError, GroupId, MessageRef, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::assets::AssetStore;
use crate::captcha::{ArtifactFile, CallbackData, ChallengeParams, Compositor, Keyboard, SelectOutcome};
use crate::catalog::{GlyphCatalog, GlyphRecord};
use crate::registry::{ChallengeHandle, ChallengeRegistry, Registered};
use crate::transport::Boundary;
use guards::Verdict;

/// A member joined, or an admin asked to test one
#[derive(Debug, Clone, Deserialize)]
pub struct JoinEvent {
    pub group_id: GroupId,
    pub user_id: UserId,
    #[serde(default)]
    pub display_name: String,
    /// The member is a group admin and is not muted while tested
    #[serde(default)]
    pub is_admin: bool,
    /// Who added the member, if not the member themselves
    #[serde(default)]
    pub added_by: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonEvent {
    pub group_id: GroupId,
    /// User who pressed the button
    pub user_id: UserId,
    pub callback_data: String,
    /// Message the keyboard is attached to
    #[serde(default)]
    pub message_id: Option<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaveEvent {
    pub group_id: GroupId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnrestrictEvent {
    pub group_id: GroupId,
    pub actor_id: UserId,
    pub target_id: UserId,
}

/// The bot itself was added to a group
#[derive(Debug, Clone, Deserialize)]
pub struct GroupAddedEvent {
    pub group_id: GroupId,
    pub added_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JoinOutcome {
    Issued { message_id: MessageRef },
    Ignored { reason: &'static str },
}

/// Outcome of an admin-only operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminOutcome {
    Done,
    Rejected { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    Stayed,
    Left { reason: &'static str },
}

/// Settings for issuing and resolving challenges
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub params: ChallengeParams,
    pub compositor: Compositor,
    /// Where rendered images are written before delivery
    pub artifact_dir: PathBuf,
    pub timeout: TimeDelta,
    pub notify_on_fail: bool,
    /// Ban instead of keeping the user muted after too many mistakes
    pub ban_on_fail: bool,
    /// Super admins
    pub admins: Vec<UserId>,
    pub leave_unknown_groups: bool,
}

pub struct Gatekeeper {
    catalog: Arc<GlyphCatalog>,
    registry: Arc<ChallengeRegistry>,
    assets: Arc<dyn AssetStore>,
    boundary: Boundary,
    settings: GateSettings,
}

impl Gatekeeper {
    pub fn new(
        catalog: Arc<GlyphCatalog>,
        registry: Arc<ChallengeRegistry>,
        assets: Arc<dyn AssetStore>,
        boundary: Boundary,
        settings: GateSettings,
    ) -> Self {
        Self {
            catalog,
            registry,
            assets,
            boundary,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ChallengeRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<GlyphCatalog> {
        &self.catalog
    }

    /// New member: challenge them unless someone else added them
    pub async fn on_join(&self, event: &JoinEvent) -> Result<JoinOutcome, GateError> {
        if let Verdict::Reject(rejection) = guards::self_join(event) {
            debug!(
                group_id = %event.group_id,
                user_id = %event.user_id,
                reason = rejection.reason(),
                "Join ignored"
            );
            return Ok(JoinOutcome::Ignored {
                reason: rejection.reason(),
            });
        }

        self.on_force_check(event).await
    }

    /// Challenge a member regardless of how they joined
    pub async fn on_force_check(&self, event: &JoinEvent) -> Result<JoinOutcome, GateError> {
        if !event.is_admin {
            // failure is logged by the boundary; the test goes ahead
            let _ = self.boundary.restrict_user(event.group_id, event.user_id).await;
        }

        self.issue(event).await
    }

    async fn issue(&self, event: &JoinEvent) -> Result<JoinOutcome, GateError> {
        let (group, user) = (event.group_id, event.user_id);
        let key = ChallengeKey::new(group, user);

        let Registered { handle, displaced } = self.registry.create(
            group,
            user,
            &self.settings.params,
            &self.catalog,
            &mut rand::rng(),
            Utc::now(),
        )?;

        if let Some(previous) = displaced {
            let message = previous.lock().await.message();
            if let Some(message) = message {
                let _ = self.boundary.delete_challenge(group, message).await;
            }
        }

        let (glyphs, keyboard, to_select) = {
            let challenge = handle.lock().await;
            (
                challenge.correct_glyphs(),
                Keyboard::for_challenge(&challenge),
                challenge.required_correct(),
            )
        };
        let caption = text::welcome_caption(
            &event.display_name,
            to_select,
            self.settings.params.error_budget,
            self.settings.timeout,
        );

        let message = match self.render_and_deliver(group, user, glyphs, &keyboard, &caption).await {
            Ok(message) => message,
            Err(e) => {
                warn!(key = %key, error = %e, "Challenge not delivered, discarding it");
                self.registry.remove_if_same(&key, &handle);
                return Err(e);
            }
        };

        // The registry check and the delivery share the challenge lock. A
        // replacement reads the displaced message under that same lock, so
        // exactly one side deletes it.
        let delivered = {
            let mut challenge = handle.lock().await;
            if self.registry.is_current(&key, &handle) {
                Some(challenge.deliver_artifact(message, Utc::now()))
            } else {
                None
            }
        };

        match delivered {
            Some(Ok(())) => {
                info!(group_id = %group, user_id = %user, message_id = %message, "Challenge issued");
                Ok(JoinOutcome::Issued { message_id: message })
            }
            Some(Err(e)) => {
                // finished while the image was in flight
                let _ = self.boundary.delete_challenge(group, message).await;
                self.registry.remove_if_same(&key, &handle);
                Err(e)
            }
            None => {
                debug!(key = %key, message_id = %message, "Challenge replaced while in flight, deleting it");
                let _ = self.boundary.delete_challenge(group, message).await;
                Ok(JoinOutcome::Ignored { reason: "superseded" })
            }
        }
    }

    async fn render_and_deliver(
        &self,
        group: GroupId,
        user: UserId,
        glyphs: Vec<GlyphRecord>,
        keyboard: &Keyboard,
        caption: &str,
    ) -> Result<MessageRef, GateError> {
        let artifact = self.render_artifact(group, user, glyphs).await?;
        let png = artifact.read_bytes()?;
        self.boundary
            .deliver_challenge(group, user, png, keyboard, caption)
            .await
        // artifact dropped here, removing the file whatever the outcome
    }

    async fn render_artifact(
        &self,
        group: GroupId,
        user: UserId,
        glyphs: Vec<GlyphRecord>,
    ) -> Result<ArtifactFile, GateError> {
        let assets = self.assets.clone();
        let compositor = self.settings.compositor;
        let dir = self.settings.artifact_dir.clone();
        let prefix = format!("{group}_{user}_");

        tokio::task::spawn_blocking(move || {
            let background = assets.open_asset(&assets.background_for(group))?;
            let images = glyphs
                .iter()
                .map(|glyph| assets.open_asset(glyph.asset()))
                .collect::<Result<Vec<_>, _>>()?;

            let image = compositor.render(&background, &images, &mut rand::rng());
            ArtifactFile::write(&dir, &prefix, &image)
        })
        .await
        .map_err(|e| GateError::Internal(format!("rendering task failed: {e}")))?
    }

    /// Button press. Always yields a reply for the presser.
    pub async fn on_button(&self, event: &ButtonEvent) -> ButtonReply {
        match self.handle_button(event).await {
            Ok(reply) => reply,
            Err(e) if e.is_benign() => {
                debug!(
                    group_id = %event.group_id,
                    user_id = %event.user_id,
                    error = %e,
                    "Button press ignored"
                );
                ButtonReply::toast(text::STALE_CHALLENGE)
            }
            Err(e) => {
                error!(
                    group_id = %event.group_id,
                    user_id = %event.user_id,
                    error = %e,
                    "Button press failed"
                );
                ButtonReply::toast(text::GENERIC_FAILURE)
            }
        }
    }

    async fn handle_button(&self, event: &ButtonEvent) -> Result<ButtonReply, GateError> {
        let group = event.group_id;
        let data = CallbackData::parse(&event.callback_data)
            .ok_or_else(|| GateError::NotFound(format!("unknown callback {:?}", event.callback_data)))?;

        let user = match guards::intended_user(&data, event.user_id) {
            Verdict::Continue(user) => user,
            Verdict::Reject(rejection) => return Ok(rejection.reply()),
        };

        let key = ChallengeKey::new(group, user);
        let handle = match guards::active_challenge(&self.registry, &key) {
            Verdict::Continue(handle) => handle,
            Verdict::Reject(rejection) => {
                if let Some(message) = event.message_id {
                    let _ = self.boundary.delete_challenge(group, message).await;
                }
                return Ok(rejection.reply());
            }
        };

        let glyph_id = match &data {
            CallbackData::Glyph { glyph_id, .. } => glyph_id.as_str(),
            CallbackData::AlreadySolved { .. } | CallbackData::AlreadyError { .. } => {
                return Ok(ButtonReply::toast(text::ALREADY_SELECTED));
            }
        };

        let (outcome, message, keyboard) = {
            let mut challenge = handle.lock().await;
            let outcome = challenge.select_button(glyph_id, Utc::now())?;
            (outcome, challenge.message(), Keyboard::for_challenge(&challenge))
        };

        debug!(key = %key, outcome = ?outcome, "Button selected");

        let reply = match outcome {
            SelectOutcome::AlreadySelected { .. } => ButtonReply::toast(text::ALREADY_SELECTED),
            SelectOutcome::Progress { remaining_correct } => {
                self.refresh_keyboard(group, message, &keyboard).await;
                text::progress(remaining_correct)
            }
            SelectOutcome::Mistake { remaining_attempts } => {
                self.refresh_keyboard(group, message, &keyboard).await;
                text::mistake(remaining_attempts)
            }
            SelectOutcome::Completed => {
                self.finish(&key, &handle, message).await;
                let _ = self.boundary.unlock_user(group, user).await;
                info!(group_id = %group, user_id = %user, "Challenge solved");
                ButtonReply::toast(text::SOLVED)
            }
            SelectOutcome::Exceeded { errors_made } => {
                self.finish(&key, &handle, message).await;
                let banned = self.settings.ban_on_fail && self.boundary.ban_user(group, user).await.is_ok();
                if !self.settings.ban_on_fail {
                    let _ = self.boundary.restrict_user(group, user).await;
                }
                if self.settings.notify_on_fail {
                    let notice = text::failure_notice(user, errors_made, banned);
                    let _ = self.boundary.notify_group(group, &notice).await;
                }
                info!(group_id = %group, user_id = %user, errors_made, banned, "Challenge failed");
                ButtonReply::alert(text::FAILED)
            }
        };

        Ok(reply)
    }

    async fn refresh_keyboard(&self, group: GroupId, message: Option<MessageRef>, keyboard: &Keyboard) {
        if let Some(message) = message {
            let _ = self.boundary.edit_challenge(group, message, keyboard, None).await;
        }
    }

    /// Drop a finished challenge and its message
    async fn finish(&self, key: &ChallengeKey, handle: &ChallengeHandle, message: Option<MessageRef>) {
        self.registry.remove_if_same(key, handle);
        if let Some(message) = message {
            let _ = self.boundary.delete_challenge(key.group, message).await;
        }
    }

    /// Member left: forget their challenge. Returns whether one was active.
    pub async fn on_leave(&self, event: &LeaveEvent) -> bool {
        let key = ChallengeKey::new(event.group_id, event.user_id);
        let Some(handle) = self.registry.remove(&key) else {
            return false;
        };

        let message = handle.lock().await.message();
        if let Some(message) = message {
            let _ = self.boundary.delete_challenge(event.group_id, message).await;
        }
        debug!(key = %key, "Member left during challenge");
        true
    }

    pub async fn on_unrestrict(&self, event: &UnrestrictEvent) -> Result<AdminOutcome, GateError> {
        if let Verdict::Reject(rejection) = guards::super_admin(&self.settings.admins, event.actor_id) {
            warn!(
                group_id = %event.group_id,
                actor_id = %event.actor_id,
                "Unrestrict refused"
            );
            return Ok(AdminOutcome::Rejected {
                reason: rejection.reason(),
            });
        }

        self.boundary.unlock_user(event.group_id, event.target_id).await?;
        info!(
            group_id = %event.group_id,
            actor_id = %event.actor_id,
            target_id = %event.target_id,
            "User unrestricted"
        );
        Ok(AdminOutcome::Done)
    }

    /// Bot added to a group: stay only if a super admin added it
    pub async fn on_group_added(&self, event: &GroupAddedEvent) -> Result<GroupOutcome, GateError> {
        if !self.settings.leave_unknown_groups {
            return Ok(GroupOutcome::Stayed);
        }

        if let Verdict::Reject(rejection) = guards::super_admin(&self.settings.admins, event.added_by) {
            warn!(
                group_id = %event.group_id,
                added_by = %event.added_by,
                "Added to group by unknown user, leaving"
            );
            self.boundary.leave_group(event.group_id).await?;
            return Ok(GroupOutcome::Left {
                reason: rejection.reason(),
            });
        }

        info!(group_id = %event.group_id, added_by = %event.added_by, "Added to group");
        Ok(GroupOutcome::Stayed)
    }

    /// Store a group's own challenge background
    pub async fn on_set_background(
        &self,
        group: GroupId,
        actor_is_admin: bool,
        bytes: Vec<u8>,
    ) -> Result<AdminOutcome, GateError> {
        if let Verdict::Reject(rejection) = guards::group_admin(actor_is_admin) {
            return Ok(AdminOutcome::Rejected {
                reason: rejection.reason(),
            });
        }

        let assets = self.assets.clone();
        tokio::task::spawn_blocking(move || assets.store_background(group, &bytes))
            .await
            .map_err(|e| GateError::Internal(format!("background task failed: {e}")))??;

        Ok(AdminOutcome::Done)
    }
}
