//! User-facing texts.

use chrono::TimeDelta;
use glyphgate_common::{ButtonReply, UserId};

pub const ALREADY_SELECTED: &str = "You already selected this emoji";
pub const STALE_CHALLENGE: &str = "This test is no longer valid";
pub const WRONG_USER: &str = "This test is meant for another user";
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again";
pub const SOLVED: &str = "Well done! You can now chat in this group";
pub const FAILED: &str = "Too many wrong emojis, the test is over";
pub const NOT_ALLOWED: &str = "You are not allowed to do this";

pub fn welcome_caption(name: &str, to_select: usize, allowed_errors: u32, timeout: TimeDelta) -> String {
    let name = if name.is_empty() { "there" } else { name };
    let glyphs = match to_select {
        1 => "one of the emojis".to_string(),
        n => format!("{n} of the emojis"),
    };
    format!(
        "Hi {name}, welcome!\n\
         To chat in this group you must prove you are not a bot. \
         Select {glyphs} you see in the image using the buttons below.\n\
         You can make {allowed_errors} mistake(s) and have {} minute(s).",
        minutes(timeout)
    )
}

pub fn progress(remaining: usize) -> ButtonReply {
    match remaining {
        1 => ButtonReply::toast("Good job! One left"),
        n => ButtonReply::toast(format!("Good job! {n} left")),
    }
}

/// Reply to a wrong pick; the last allowed mistakes are shown as alerts
pub fn mistake(remaining_attempts: u32) -> ButtonReply {
    match remaining_attempts {
        0 => ButtonReply::alert("\u{26a0}\u{fe0f} Wrong emoji! You cannot make any more mistakes"),
        1 => ButtonReply::alert("\u{26a0}\u{fe0f} Wrong emoji! You can make only one more mistake"),
        n => ButtonReply::toast(format!("Wrong emoji! You can make {n} more mistakes")),
    }
}

/// Group notice after a failed test
pub fn failure_notice(user: UserId, errors_made: u32, banned: bool) -> String {
    let (consequence, tag) = if banned {
        ("has been banned", "#ban")
    } else {
        ("is still a member of this group but cannot speak", "#mute")
    };
    format!(
        "User {user} failed the verification after too many mistakes ({errors_made}) and {consequence} [{tag} #u{user}]"
    )
}

/// Group notice after a timed-out test
pub fn timeout_notice(user: UserId, timeout: TimeDelta, correct_selected: usize, correct_count: usize) -> String {
    format!(
        "User {user} did not complete the test within {} minute(s) and has been banned, \
         {correct_selected} correct emojis out of {correct_count} [#ban #u{user}]",
        minutes(timeout)
    )
}

fn minutes(timeout: TimeDelta) -> i64 {
    // round up so a 90s timeout does not read as one minute
    (timeout.num_seconds() + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_caption() {
        let caption = welcome_caption("Ada", 3, 2, TimeDelta::seconds(600));
        assert!(caption.starts_with("Hi Ada, welcome!"));
        assert!(caption.contains("Select 3 of the emojis"));
        assert!(caption.contains("2 mistake(s) and have 10 minute(s)"));

        let caption = welcome_caption("", 1, 0, TimeDelta::seconds(90));
        assert!(caption.starts_with("Hi there"));
        assert!(caption.contains("one of the emojis"));
        assert!(caption.contains("2 minute(s)"));
    }

    #[test]
    fn test_mistake_escalates_to_alert() {
        assert!(mistake(0).show_alert);
        assert!(mistake(1).show_alert);
        assert!(!mistake(2).show_alert);
        assert!(mistake(3).text.contains("3 more"));
    }

    #[test]
    fn test_notices_carry_tags() {
        assert!(failure_notice(UserId(5), 3, false).ends_with("[#mute #u5]"));
        assert!(failure_notice(UserId(5), 3, true).ends_with("[#ban #u5]"));
        let notice = timeout_notice(UserId(9), TimeDelta::seconds(300), 1, 4);
        assert!(notice.contains("5 minute(s)"));
        assert!(notice.contains("1 correct emojis out of 4"));
    }
}
