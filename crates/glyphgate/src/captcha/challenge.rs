//! Per-user challenge state machine.
//!
//! A challenge owns `total_buttons` glyph buttons, `correct_count` of which
//! were stamped into the artifact image. The user passes by selecting the
//! correct ones and fails after more than `error_budget` wrong selections.

use chrono::{DateTime, TimeDelta, Utc};
use glyphgate_common::constants::MIN_BUTTONS;
use glyphgate_common::{
    ChallengeKey, ChallengeState, ChallengeSummary, GateError, GroupId, MessageRef, UserId,
};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::catalog::{GlyphCatalog, GlyphRecord};

/// Construction parameters of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeParams {
    /// Glyphs shown in the image (marked correct on the keyboard)
    pub correct_count: usize,
    /// Keyboard buttons, must be even
    pub total_buttons: usize,
    /// Wrong selections tolerated before failing
    pub error_budget: u32,
    /// Correct selections needed to pass (defaults to `correct_count`)
    pub required_correct: Option<usize>,
}

impl ChallengeParams {
    pub fn new(correct_count: usize, total_buttons: usize, error_budget: u32) -> Self {
        Self {
            correct_count,
            total_buttons,
            error_budget,
            required_correct: None,
        }
    }

    pub fn with_required_correct(mut self, required: usize) -> Self {
        self.required_correct = Some(required);
        self
    }

    pub fn required_correct(&self) -> usize {
        self.required_correct.unwrap_or(self.correct_count)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.total_buttons < MIN_BUTTONS {
            return Err(GateError::InvalidConfiguration(format!(
                "a challenge needs at least {MIN_BUTTONS} buttons (got {})",
                self.total_buttons
            )));
        }
        if self.total_buttons % 2 != 0 {
            return Err(GateError::InvalidConfiguration(format!(
                "the number of buttons must be even (got {})",
                self.total_buttons
            )));
        }
        if self.correct_count > self.total_buttons {
            return Err(GateError::InvalidConfiguration(format!(
                "correct glyphs ({}) cannot exceed buttons ({})",
                self.correct_count, self.total_buttons
            )));
        }
        if self.required_correct() > self.correct_count {
            return Err(GateError::InvalidConfiguration(format!(
                "required correct selections ({}) cannot exceed correct glyphs ({})",
                self.required_correct(),
                self.correct_count
            )));
        }
        Ok(())
    }
}

/// A keyboard button: one glyph plus its answer state
#[derive(Debug, Clone)]
pub struct ChallengeButton {
    glyph: GlyphRecord,
    correct: bool,
    selected: bool,
}

impl ChallengeButton {
    pub fn glyph(&self) -> &GlyphRecord {
        &self.glyph
    }

    pub fn is_correct(&self) -> bool {
        self.correct
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }
}

/// Result of a button selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The button was selected before; nothing changed
    AlreadySelected { correct: bool },
    /// Correct pick, more to go
    Progress { remaining_correct: usize },
    /// Correct pick that solved the challenge
    Completed,
    /// Wrong pick within budget; 0 means the next mistake is fatal
    Mistake { remaining_attempts: u32 },
    /// Wrong pick that exhausted the budget
    Exceeded { errors_made: u32 },
}

/// One outstanding test for a user in a group
#[derive(Debug, Clone)]
pub struct Challenge {
    user: UserId,
    group: GroupId,
    message: Option<MessageRef>,
    buttons: Vec<ChallengeButton>,
    correct_count: usize,
    required_correct: usize,
    errors_made: u32,
    error_budget: u32,
    state: ChallengeState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Draw the buttons for a new challenge.
    ///
    /// The first `correct_count` sampled glyphs are marked correct before the
    /// keyboard is shuffled, so display order carries no hint.
    pub fn new<R: Rng + ?Sized>(
        user: UserId,
        group: GroupId,
        params: &ChallengeParams,
        catalog: &GlyphCatalog,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Self, GateError> {
        params.validate()?;

        let (min, max) = catalog.bounds();
        let glyphs = catalog.sample(rng, params.total_buttons, min, max)?;

        let mut buttons: Vec<ChallengeButton> = glyphs
            .into_iter()
            .enumerate()
            .map(|(i, glyph)| ChallengeButton {
                glyph,
                correct: i < params.correct_count,
                selected: false,
            })
            .collect();
        buttons.shuffle(rng);

        Ok(Self {
            user,
            group,
            message: None,
            buttons,
            correct_count: params.correct_count,
            required_correct: params.required_correct(),
            errors_made: 0,
            error_budget: params.error_budget,
            state: ChallengeState::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record the delivered challenge message and start accepting input
    pub fn deliver_artifact(&mut self, message: MessageRef, now: DateTime<Utc>) -> Result<(), GateError> {
        if self.state.is_terminal() {
            return Err(GateError::AlreadyTerminal(self.state));
        }
        self.message = Some(message);
        self.state = ChallengeState::AwaitingInput;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a button press
    pub fn select_button(&mut self, glyph_id: &str, now: DateTime<Utc>) -> Result<SelectOutcome, GateError> {
        if self.state.is_terminal() {
            return Err(GateError::AlreadyTerminal(self.state));
        }

        let button = self
            .buttons
            .iter_mut()
            .find(|b| b.glyph.id() == glyph_id)
            .ok_or_else(|| GateError::NotFound(format!("glyph {glyph_id} is not part of this challenge")))?;

        if button.selected {
            return Ok(SelectOutcome::AlreadySelected { correct: button.correct });
        }

        button.selected = true;
        let correct = button.correct;
        self.updated_at = now;

        if correct {
            let still_to_guess = self.still_to_guess();
            if still_to_guess == 0 {
                self.state = ChallengeState::Solved;
                return Ok(SelectOutcome::Completed);
            }
            return Ok(SelectOutcome::Progress {
                remaining_correct: still_to_guess,
            });
        }

        self.errors_made += 1;
        if self.errors_made > self.error_budget {
            self.state = ChallengeState::Failed;
            return Ok(SelectOutcome::Exceeded {
                errors_made: self.errors_made,
            });
        }

        Ok(SelectOutcome::Mistake {
            remaining_attempts: self.remaining_attempts(),
        })
    }

    /// Expire the challenge if it is older than `timeout`.
    ///
    /// Returns `Ok(true)` on the transition to `Expired`, `Ok(false)` when the
    /// challenge is still within its time.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: TimeDelta) -> Result<bool, GateError> {
        if self.state.is_terminal() {
            return Err(GateError::AlreadyTerminal(self.state));
        }
        if now - self.created_at <= timeout {
            return Ok(false);
        }
        self.state = ChallengeState::Expired;
        self.updated_at = now;
        Ok(true)
    }

    pub fn key(&self) -> ChallengeKey {
        ChallengeKey::new(self.group, self.user)
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn buttons(&self) -> &[ChallengeButton] {
        &self.buttons
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn required_correct(&self) -> usize {
        self.required_correct
    }

    pub fn errors_made(&self) -> u32 {
        self.errors_made
    }

    pub fn error_budget(&self) -> u32 {
        self.error_budget
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Mistakes still allowed; never increases
    pub fn remaining_attempts(&self) -> u32 {
        self.error_budget.saturating_sub(self.errors_made)
    }

    /// Glyphs stamped into the artifact, in keyboard order
    pub fn correct_glyphs(&self) -> Vec<GlyphRecord> {
        self.buttons
            .iter()
            .filter(|b| b.correct)
            .map(|b| b.glyph.clone())
            .collect()
    }

    pub fn correct_selected_count(&self) -> usize {
        self.buttons.iter().filter(|b| b.correct && b.selected).count()
    }

    pub fn still_to_guess(&self) -> usize {
        self.required_correct.saturating_sub(self.correct_selected_count())
    }

    pub fn summary(&self) -> ChallengeSummary {
        ChallengeSummary {
            group_id: self.group,
            user_id: self.user,
            state: self.state,
            errors_made: self.errors_made,
            error_budget: self.error_budget,
            correct_selected: self.correct_selected_count(),
            required_correct: self.required_correct,
            message: self.message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
