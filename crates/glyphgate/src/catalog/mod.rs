//! Glyph catalog: the fixed pool of emojis challenges are drawn from.
//!
//! Built once at startup from the asset store and shared read-only
//! (`Arc<GlyphCatalog>`) between event handlers.

mod glyph;

pub use glyph::{GlyphRecord, encode_id, text_for_id};

use std::collections::HashSet;
use std::path::Path;

use glyphgate_common::GateError;
use glyphgate_common::constants::RESERVED_GLYPH_IDS;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::assets::AssetStore;

/// Read-only pool of glyph records
#[derive(Debug, Clone)]
pub struct GlyphCatalog {
    glyphs: Vec<GlyphRecord>,
    min_codepoints: usize,
    max_codepoints: usize,
}

impl GlyphCatalog {
    /// Build a catalog from records, keeping only those whose codepoint
    /// count lies in `[min_codepoints, max_codepoints]`. Duplicates are dropped.
    pub fn new(
        records: impl IntoIterator<Item = GlyphRecord>,
        min_codepoints: usize,
        max_codepoints: usize,
    ) -> Result<Self, GateError> {
        if min_codepoints == 0 || min_codepoints > max_codepoints {
            return Err(GateError::InvalidConfiguration(format!(
                "codepoint bounds must satisfy 1 <= min <= max (got {min_codepoints}..={max_codepoints})"
            )));
        }

        let mut seen = HashSet::new();
        let glyphs = records
            .into_iter()
            .filter(|g| (min_codepoints..=max_codepoints).contains(&g.codepoints().len()))
            .filter(|g| seen.insert(g.clone()))
            .collect();

        Ok(Self {
            glyphs,
            min_codepoints,
            max_codepoints,
        })
    }

    /// Load every glyph asset found in `dir`. Unparseable file names are
    /// skipped with a warning.
    pub fn load(
        store: &dyn AssetStore,
        dir: &Path,
        min_codepoints: usize,
        max_codepoints: usize,
    ) -> Result<Self, GateError> {
        let assets = store.list_glyph_assets(dir)?;
        let total = assets.len();

        let records = assets.into_iter().filter_map(|(stem, path)| {
            match GlyphRecord::from_file_stem(&stem, path) {
                Ok(glyph) => Some(glyph),
                Err(e) => {
                    tracing::warn!(file = %stem, error = %e, "Skipping glyph asset");
                    None
                }
            }
        });

        let catalog = Self::new(records, min_codepoints, max_codepoints)?;

        tracing::info!(
            dir = ?dir,
            files = total,
            glyphs = catalog.len(),
            min_codepoints,
            max_codepoints,
            "Glyph catalog loaded"
        );

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Configured codepoint-count bounds `(min, max)`
    pub fn bounds(&self) -> (usize, usize) {
        (self.min_codepoints, self.max_codepoints)
    }

    pub fn get(&self, id: &str) -> Option<&GlyphRecord> {
        self.glyphs.iter().find(|g| g.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlyphRecord> {
        self.glyphs.iter()
    }

    /// Draw `count` distinct glyphs in random order.
    ///
    /// Reserved glyphs (check mark, cross, warning) are never returned.
    /// `min_codepoints..=max_codepoints` may narrow the catalog bounds but
    /// never widen them.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        min_codepoints: usize,
        max_codepoints: usize,
    ) -> Result<Vec<GlyphRecord>, GateError> {
        if count > self.glyphs.len() {
            return Err(GateError::InsufficientPool {
                requested: count,
                available: self.glyphs.len(),
            });
        }

        if min_codepoints < self.min_codepoints
            || max_codepoints > self.max_codepoints
            || min_codepoints > max_codepoints
        {
            return Err(GateError::RangeViolation(format!(
                "requested {min_codepoints}..={max_codepoints}, catalog allows {}..={}",
                self.min_codepoints, self.max_codepoints
            )));
        }

        let eligible: Vec<&GlyphRecord> = self
            .glyphs
            .iter()
            .filter(|g| !RESERVED_GLYPH_IDS.contains(&g.id()))
            .filter(|g| (min_codepoints..=max_codepoints).contains(&g.codepoints().len()))
            .collect();

        if eligible.len() < count {
            return Err(GateError::InsufficientPool {
                requested: count,
                available: eligible.len(),
            });
        }

        // choose_multiple never repeats an index, so the draw always terminates
        let mut picked: Vec<GlyphRecord> = eligible
            .choose_multiple(rng, count)
            .map(|g| (*g).clone())
            .collect();
        picked.shuffle(rng);

        Ok(picked)
    }
}
