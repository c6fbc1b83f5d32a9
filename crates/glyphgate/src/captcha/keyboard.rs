//! Inline keyboard rendering and callback identifiers.
//!
//! Callback identifiers travel through the messaging transport as strings:
//!
//! ```text
//! button:<glyph id>:user<user id>       untouched button
//! button:already_solved:user<user id>   selected, was correct
//! button:already_error:user<user id>    selected, was wrong
//! ```
//!
//! Internally they are parsed into [`CallbackData`].

use glyphgate_common::UserId;
use glyphgate_common::constants::callback::{ALREADY_ERROR, ALREADY_SOLVED, BUTTON_PREFIX, USER_MARKER};
use glyphgate_common::constants::{CHECK_MARK_ID, CROSS_MARK_ID, MAX_SINGLE_ROW_BUTTONS};
use serde::{Deserialize, Serialize};

use super::challenge::{Challenge, ChallengeButton};
use crate::catalog::text_for_id;

/// Parsed button callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    Glyph { glyph_id: String, user: UserId },
    AlreadySolved { user: UserId },
    AlreadyError { user: UserId },
}

impl CallbackData {
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(BUTTON_PREFIX)?;
        let (body, user) = rest.rsplit_once(':')?;
        let user = UserId(user.strip_prefix(USER_MARKER)?.parse().ok()?);

        match body {
            "" => None,
            ALREADY_SOLVED => Some(Self::AlreadySolved { user }),
            ALREADY_ERROR => Some(Self::AlreadyError { user }),
            glyph_id => Some(Self::Glyph {
                glyph_id: glyph_id.to_string(),
                user,
            }),
        }
    }

    pub fn encode(&self) -> String {
        let (body, user) = match self {
            Self::Glyph { glyph_id, user } => (glyph_id.as_str(), user),
            Self::AlreadySolved { user } => (ALREADY_SOLVED, user),
            Self::AlreadyError { user } => (ALREADY_ERROR, user),
        };
        format!("{BUTTON_PREFIX}{body}:{USER_MARKER}{user}")
    }

    /// User the challenge (and so the button) belongs to
    pub fn target_user(&self) -> UserId {
        match self {
            Self::Glyph { user, .. } | Self::AlreadySolved { user } | Self::AlreadyError { user } => *user,
        }
    }

    pub fn is_already_selected(&self) -> bool {
        matches!(self, Self::AlreadySolved { .. } | Self::AlreadyError { .. })
    }

    fn for_button(button: &ChallengeButton, user: UserId) -> Self {
        match (button.is_selected(), button.is_correct()) {
            (true, true) => Self::AlreadySolved { user },
            (true, false) => Self::AlreadyError { user },
            (false, _) => Self::Glyph {
                glyph_id: button.glyph().id().to_string(),
                user,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub label: String,
    pub callback_data: String,
}

/// Rows of inline buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    /// Render the challenge keyboard: one row for small keyboards, otherwise
    /// two rows of equal length. Selected buttons show a check mark or cross.
    pub fn for_challenge(challenge: &Challenge) -> Self {
        let buttons = challenge.buttons();
        let per_row = if buttons.len() <= MAX_SINGLE_ROW_BUTTONS {
            buttons.len().max(1)
        } else {
            buttons.len().div_ceil(2)
        };

        let rows = buttons
            .chunks(per_row)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|button| KeyboardButton {
                        label: label_for(button),
                        callback_data: CallbackData::for_button(button, challenge.user()).encode(),
                    })
                    .collect()
            })
            .collect();

        Self { rows }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &KeyboardButton> {
        self.rows.iter().flatten()
    }
}

fn label_for(button: &ChallengeButton) -> String {
    let mark = match (button.is_selected(), button.is_correct()) {
        (true, true) => text_for_id(CHECK_MARK_ID),
        (true, false) => text_for_id(CROSS_MARK_ID),
        (false, _) => None,
    };
    mark.unwrap_or_else(|| button.glyph().text().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::challenge::ChallengeParams;
    use crate::captcha::challenge::tests::new_challenge;
    use chrono::Utc;

    #[test]
    fn test_parse_callbacks() {
        assert_eq!(
            CallbackData::parse("button:1f600:user42"),
            Some(CallbackData::Glyph {
                glyph_id: "1f600".into(),
                user: UserId(42)
            })
        );
        assert_eq!(
            CallbackData::parse("button:1f1ee.1f1f9:user7"),
            Some(CallbackData::Glyph {
                glyph_id: "1f1ee.1f1f9".into(),
                user: UserId(7)
            })
        );
        assert_eq!(
            CallbackData::parse("button:already_solved:user42"),
            Some(CallbackData::AlreadySolved { user: UserId(42) })
        );
        assert_eq!(
            CallbackData::parse("button:already_error:user42"),
            Some(CallbackData::AlreadyError { user: UserId(42) })
        );

        for bad in ["", "button:", "button:1f600", "button:1f600:42", "button::user1", "other:1f600:user1", "button:1f600:userX"] {
            assert_eq!(CallbackData::parse(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_encode_parse_agree() {
        let data = CallbackData::AlreadyError { user: UserId(-5) };
        assert_eq!(data.encode(), "button:already_error:user-5");
        assert_eq!(CallbackData::parse(&data.encode()), Some(data));
    }

    #[test]
    fn test_row_layout() {
        let small = new_challenge(ChallengeParams::new(1, 4, 1), 1);
        let keyboard = Keyboard::for_challenge(&small);
        assert_eq!(keyboard.rows.len(), 1);
        assert_eq!(keyboard.rows[0].len(), 4);

        let large = new_challenge(ChallengeParams::new(3, 10, 1), 2);
        let keyboard = Keyboard::for_challenge(&large);
        assert_eq!(keyboard.rows.len(), 2);
        assert!(keyboard.rows.iter().all(|row| row.len() == 5));
    }

    #[test]
    fn test_selected_buttons_change_label_and_callback() {
        let mut challenge = new_challenge(ChallengeParams::new(2, 6, 2), 3);
        let correct = challenge.buttons().iter().find(|b| b.is_correct()).unwrap().glyph().id().to_string();
        let wrong = challenge.buttons().iter().find(|b| !b.is_correct()).unwrap().glyph().id().to_string();

        challenge.select_button(&correct, Utc::now()).unwrap();
        challenge.select_button(&wrong, Utc::now()).unwrap();

        let keyboard = Keyboard::for_challenge(&challenge);
        let callbacks: Vec<_> = keyboard.buttons().map(|b| b.callback_data.as_str()).collect();
        let labels: Vec<_> = keyboard.buttons().map(|b| b.label.as_str()).collect();

        assert_eq!(callbacks.iter().filter(|c| **c == "button:already_solved:user42").count(), 1);
        assert_eq!(callbacks.iter().filter(|c| **c == "button:already_error:user42").count(), 1);
        assert_eq!(callbacks.iter().filter(|c| c.starts_with("button:1f")).count(), 4);
        assert!(labels.contains(&"✅"));
        assert!(labels.contains(&"❌"));
    }
}
