//! Glyph records: one selectable emoji, identified by its codepoints.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use glyphgate_common::GateError;
use glyphgate_common::constants::{GLYPH_FILE_SEPARATOR, GLYPH_ID_SEPARATOR};

/// An immutable glyph loaded from the asset store.
///
/// Equality and hashing only consider the codepoint sequence, so two records
/// pointing at different files for the same emoji compare equal.
#[derive(Debug, Clone)]
pub struct GlyphRecord {
    id: String,
    codepoints: Vec<u32>,
    text: String,
    asset: PathBuf,
}

impl GlyphRecord {
    /// Build a record from its codepoints
    pub fn from_codepoints(codepoints: Vec<u32>, asset: impl Into<PathBuf>) -> Result<Self, GateError> {
        if codepoints.is_empty() {
            return Err(GateError::Asset("glyph without codepoints".to_string()));
        }

        let text = render_codepoints(&codepoints).ok_or_else(|| {
            GateError::Asset(format!("glyph {:x?} contains a non-scalar codepoint", codepoints))
        })?;

        Ok(Self {
            id: encode_id(&codepoints),
            codepoints,
            text,
            asset: asset.into(),
        })
    }

    /// Parse an asset file stem such as `1F1EE-1f1f9` (case-insensitive)
    pub fn from_file_stem(stem: &str, asset: impl Into<PathBuf>) -> Result<Self, GateError> {
        let codepoints = stem
            .split(GLYPH_FILE_SEPARATOR)
            .map(|part| {
                u32::from_str_radix(part.trim(), 16)
                    .map_err(|_| GateError::Asset(format!("invalid hex codepoint {part:?} in {stem:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_codepoints(codepoints, asset)
    }

    /// Stable identifier: lowercase hex codepoints joined by `.`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn codepoints(&self) -> &[u32] {
        &self.codepoints
    }

    /// Display string (the emoji itself)
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Image resource of this glyph
    pub fn asset(&self) -> &Path {
        &self.asset
    }
}

impl PartialEq for GlyphRecord {
    fn eq(&self, other: &Self) -> bool {
        self.codepoints == other.codepoints
    }
}

impl Eq for GlyphRecord {}

impl Hash for GlyphRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.codepoints.hash(state);
    }
}

/// Order-preserving id encoding of a codepoint sequence
pub fn encode_id(codepoints: &[u32]) -> String {
    codepoints
        .iter()
        .map(|cp| format!("{cp:x}"))
        .collect::<Vec<_>>()
        .join(&GLYPH_ID_SEPARATOR.to_string())
}

/// Render a glyph id back to its display string (`2705` -> check mark)
pub fn text_for_id(id: &str) -> Option<String> {
    let codepoints = id
        .split(GLYPH_ID_SEPARATOR)
        .map(|part| u32::from_str_radix(part, 16).ok())
        .collect::<Option<Vec<_>>>()?;
    render_codepoints(&codepoints)
}

fn render_codepoints(codepoints: &[u32]) -> Option<String> {
    codepoints.iter().map(|cp| char::from_u32(*cp)).collect()
}
