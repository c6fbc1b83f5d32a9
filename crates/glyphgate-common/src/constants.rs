//! Shared constants for Glyphgate components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8899";

/// Separator between hex codepoints in a glyph id (`1f1ee.1f1f9`)
pub const GLYPH_ID_SEPARATOR: char = '.';

/// Separator between hex codepoints in a glyph asset file stem (`1f1ee-1f1f9.png`)
pub const GLYPH_FILE_SEPARATOR: char = '-';

/// Glyph asset file extension
pub const GLYPH_FILE_EXTENSION: &str = "png";

/// Success mark, shown on a correctly selected button
pub const CHECK_MARK_ID: &str = "2705";

/// Failure mark, shown on a wrongly selected button
pub const CROSS_MARK_ID: &str = "274c";

/// Warning sign, used in alert texts
pub const WARNING_ID: &str = "26a0.fe0f";

/// Glyph ids never handed out by catalog sampling
pub const RESERVED_GLYPH_IDS: [&str; 3] = [CHECK_MARK_ID, CROSS_MARK_ID, WARNING_ID];

/// Minimum number of keyboard buttons in a challenge
pub const MIN_BUTTONS: usize = 2;

/// Keyboards with more buttons than this are split over two rows
pub const MAX_SINGLE_ROW_BUTTONS: usize = 4;

/// Rotation ranges (degrees, inclusive) applied to stamped glyphs.
/// Both avoid near-upright orientations.
pub const ROTATION_RANGES: [(u32, u32); 2] = [(20, 90), (290, 360)];

/// Default challenge timeout (10 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default sweeper interval
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default upper bound for a single transport call
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;

/// Callback identifiers exchanged with the messaging transport
pub mod callback {
    /// Prefix of every button identifier: button:{id}:user{user_id}
    pub const BUTTON_PREFIX: &str = "button:";

    /// Marker placed before the target user id
    pub const USER_MARKER: &str = "user";

    /// Button already selected, was correct
    pub const ALREADY_SOLVED: &str = "already_solved";

    /// Button already selected, was wrong
    pub const ALREADY_ERROR: &str = "already_error";
}
