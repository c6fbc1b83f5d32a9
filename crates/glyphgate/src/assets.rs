//! Asset store: glyph images and challenge backgrounds on local disk.
//!
//! Glyph files are named after their codepoints (`1f600.png`,
//! `1f1ee-1f1f9.png`). Groups may upload their own background, stored as
//! `background_<group>.jpg`, which takes precedence over the default one.

use std::path::{Path, PathBuf};

use glyphgate_common::constants::GLYPH_FILE_EXTENSION;
use glyphgate_common::{GateError, GroupId};
use image::RgbaImage;

/// Boundary to wherever glyph and background images live
pub trait AssetStore: Send + Sync {
    /// List `(file stem, path)` for every glyph asset in `dir`
    fn list_glyph_assets(&self, dir: &Path) -> Result<Vec<(String, PathBuf)>, GateError>;

    /// Decode an image asset
    fn open_asset(&self, path: &Path) -> Result<RgbaImage, GateError>;

    /// Background to use for a group's challenges
    fn background_for(&self, group: GroupId) -> PathBuf;

    /// Store a group-specific background, returning where it was written
    fn store_background(&self, group: GroupId, bytes: &[u8]) -> Result<PathBuf, GateError>;
}

/// Filesystem-backed asset store
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    default_background: PathBuf,
    backgrounds_dir: PathBuf,
}

impl FsAssetStore {
    pub fn new(default_background: impl Into<PathBuf>, backgrounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_background: default_background.into(),
            backgrounds_dir: backgrounds_dir.into(),
        }
    }

    fn group_background_path(&self, group: GroupId) -> PathBuf {
        // supergroup ids carry a -100 prefix that is noise in a file name
        let id = group.0.to_string().replacen("-100", "", 1);
        self.backgrounds_dir.join(format!("background_{id}.jpg"))
    }
}

impl AssetStore for FsAssetStore {
    fn list_glyph_assets(&self, dir: &Path) -> Result<Vec<(String, PathBuf)>, GateError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| GateError::Asset(format!("cannot list {}: {e}", dir.display())))?;

        let mut assets = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| GateError::Asset(format!("cannot read entry in {}: {e}", dir.display())))?
                .path();

            if !path.extension().is_some_and(|ext| ext == GLYPH_FILE_EXTENSION) {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                assets.push((stem.to_string(), path.clone()));
            }
        }

        // stable order regardless of directory iteration order
        assets.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(assets)
    }

    fn open_asset(&self, path: &Path) -> Result<RgbaImage, GateError> {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| GateError::Asset(format!("cannot open {}: {e}", path.display())))
    }

    fn background_for(&self, group: GroupId) -> PathBuf {
        let custom = self.group_background_path(group);
        if custom.exists() {
            custom
        } else {
            self.default_background.clone()
        }
    }

    fn store_background(&self, group: GroupId, bytes: &[u8]) -> Result<PathBuf, GateError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| GateError::Asset(format!("uploaded background is not an image: {e}")))?;

        std::fs::create_dir_all(&self.backgrounds_dir).map_err(|e| {
            GateError::Asset(format!("cannot create {}: {e}", self.backgrounds_dir.display()))
        })?;

        let path = self.group_background_path(group);
        // JPEG has no alpha channel
        img.to_rgb8()
            .save(&path)
            .map_err(|e| GateError::Asset(format!("cannot write {}: {e}", path.display())))?;

        tracing::info!(group_id = %group, path = ?path, "Stored group background");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn write_png(path: &Path) {
        RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])).save(path).unwrap();
    }

    #[test]
    fn test_list_only_png_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("1f601.png"));
        write_png(&dir.path().join("1f600.png"));
        std::fs::write(dir.path().join("README.txt"), "not a glyph").unwrap();

        let store = FsAssetStore::new("bg.jpg", dir.path().join("backgrounds"));
        let assets = store.list_glyph_assets(dir.path()).unwrap();

        let stems: Vec<_> = assets.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(stems, vec!["1f600", "1f601"]);
    }

    #[test]
    fn test_list_missing_dir_is_asset_error() {
        let store = FsAssetStore::new("bg.jpg", "backgrounds");
        let err = store
            .list_glyph_assets(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, GateError::Asset(_)));
    }

    #[test]
    fn test_background_override() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new(dir.path().join("default.jpg"), dir.path().join("backgrounds"));
        let group = GroupId(-1001234);

        assert_eq!(store.background_for(group), dir.path().join("default.jpg"));

        let mut bytes = Vec::new();
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let stored = store.store_background(group, &bytes).unwrap();
        assert_eq!(stored, dir.path().join("backgrounds").join("background_1234.jpg"));
        assert_eq!(store.background_for(group), stored);

        let reopened = store.open_asset(&stored).unwrap();
        assert_eq!(reopened.dimensions(), (8, 8));
    }

    #[test]
    fn test_store_background_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new("bg.jpg", dir.path());
        assert!(store.store_background(GroupId(1), b"hello").is_err());
    }
}
