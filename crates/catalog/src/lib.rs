//! The fixed set of ambient tracks a session can play.
//!
//! A [`Catalog`] is built once at startup, either from [`Catalog::builtin`] or
//! from a catalog file, and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Stable identifier of a catalog track, e.g. `"rain"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for TrackId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Display color of a track, written as `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTag(pub String);

impl ColorTag {
    /// Parse the tag into its red, green and blue components.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.0.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Where a track's audio lives: a `file://` URI, a plain path, or an
/// `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator(pub String);

impl SourceLocator {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URI scheme, if the locator has one (`file`, `https`, ...).
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once("://")?;
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(scheme)
    }

    /// Filesystem path for `file://` URIs and scheme-less locators.
    pub fn to_path(&self) -> Option<PathBuf> {
        match self.scheme() {
            None => Some(PathBuf::from(&self.0)),
            Some("file") => self.0.strip_prefix("file://").map(PathBuf::from),
            Some(_) => None,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: ColorTag,
    pub source: SourceLocator,
}

impl Track {
    pub fn new(id: &str, name: &str, color: &str, source: &str) -> Self {
        Self {
            id: TrackId::new(id),
            name: name.to_string(),
            color: ColorTag(color.to_string()),
            source: SourceLocator(source.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Track id must not be empty")]
    EmptyId,

    #[error("Duplicate track id '{0}'")]
    DuplicateTrack(TrackId),

    #[error("Track '{track}' has invalid color '{color}', expected #rrggbb")]
    InvalidColor { track: TrackId, color: String },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tracks: Vec<Track>,
}

/// Ordered, immutable list of tracks.
#[derive(Debug, Clone)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Result<Self, CatalogError> {
        for (index, track) in tracks.iter().enumerate() {
            if track.id.as_str().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if tracks[..index].iter().any(|t| t.id == track.id) {
                return Err(CatalogError::DuplicateTrack(track.id.clone()));
            }
            if track.color.rgb().is_none() {
                return Err(CatalogError::InvalidColor {
                    track: track.id.clone(),
                    color: track.color.0.clone(),
                });
            }
        }
        Ok(Self { tracks })
    }

    /// The ambient sounds shipped with the application, read from `sounds/`.
    pub fn builtin() -> Self {
        Self {
            tracks: vec![
                Track::new("rain", "Rain", "#4a90e2", "sounds/rain.ogg"),
                Track::new("thunder", "Thunder", "#6c5ce7", "sounds/thunder.ogg"),
                Track::new("fire", "Fireplace", "#e17055", "sounds/fire.ogg"),
                Track::new("wind", "Wind", "#81ecec", "sounds/wind.ogg"),
                Track::new("waves", "Ocean Waves", "#0984e3", "sounds/waves.ogg"),
                Track::new("forest", "Forest", "#00b894", "sounds/forest.ogg"),
                Track::new("cafe", "Coffee Shop", "#a0522d", "sounds/cafe.ogg"),
                Track::new("white-noise", "White Noise", "#b2bec3", "sounds/white-noise.ogg"),
            ],
        }
    }

    /// Load a catalog file. JSON is tried first, then TOML.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&contents).or_else(|json_err| {
            toml::from_str(&contents).map_err(|toml_err| CatalogError::Parse {
                path: path.to_path_buf(),
                reason: format!("not JSON ({json_err}) and not TOML ({toml_err})"),
            })
        })?;
        Self::new(file.tracks)
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = Catalog::builtin();
        let rebuilt = Catalog::new(builtin.tracks().to_vec()).expect("builtin must validate");
        assert_eq!(rebuilt.len(), builtin.len());
        assert!(builtin.contains("rain"));
    }

    #[test]
    fn test_catalog_preserves_order() {
        let catalog = Catalog::new(vec![
            Track::new("b", "B", "#000000", "b.wav"),
            Track::new("a", "A", "#ffffff", "a.wav"),
        ])
        .expect("valid catalog");

        let ids: Vec<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Catalog::new(vec![
            Track::new("rain", "Rain", "#000000", "a.wav"),
            Track::new("rain", "More Rain", "#000000", "b.wav"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateTrack(id)) if id.as_str() == "rain"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = Catalog::new(vec![Track::new("", "Nameless", "#000000", "a.wav")]);
        assert!(matches!(result, Err(CatalogError::EmptyId)));
    }

    #[test]
    fn test_invalid_color_rejected() {
        let result = Catalog::new(vec![Track::new("fire", "Fire", "orange", "a.wav")]);
        assert!(matches!(result, Err(CatalogError::InvalidColor { .. })));
    }

    #[test]
    fn test_color_rgb() {
        assert_eq!(ColorTag("#ff8000".into()).rgb(), Some((255, 128, 0)));
        assert_eq!(ColorTag("ff8000".into()).rgb(), None);
        assert_eq!(ColorTag("#ff80".into()).rgb(), None);
    }

    #[test]
    fn test_locator_paths() {
        let file = SourceLocator("file:///tmp/rain.ogg".into());
        assert_eq!(file.scheme(), Some("file"));
        assert_eq!(file.to_path(), Some(PathBuf::from("/tmp/rain.ogg")));

        let bare = SourceLocator("sounds/rain.ogg".into());
        assert_eq!(bare.scheme(), None);
        assert_eq!(bare.to_path(), Some(PathBuf::from("sounds/rain.ogg")));

        let remote = SourceLocator("https://example.com/rain.mp3".into());
        assert_eq!(remote.scheme(), Some("https"));
        assert_eq!(remote.to_path(), None);
    }

    #[test]
    fn test_load_json_catalog() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r##"{"tracks":[{"id":"rain","name":"Rain","color":"#4a90e2","source":"rain.wav"}]}"##,
        )
        .expect("write catalog");

        let catalog = Catalog::load(&path).expect("load json");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("rain").map(|t| t.name.as_str()), Some("Rain"));
    }

    #[test]
    fn test_load_toml_catalog() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r##"
[[tracks]]
id = "fire"
name = "Fireplace"
color = "#e17055"
source = "file:///sounds/fire.ogg"

[[tracks]]
id = "wind"
name = "Wind"
color = "#81ecec"
source = "wind.ogg"
"##,
        )
        .expect("write catalog");

        let catalog = Catalog::load(&path).expect("load toml");
        let ids: Vec<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["fire", "wind"]);
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.txt");
        fs::write(&path, "this is neither").expect("write catalog");

        assert!(matches!(
            Catalog::load(&path),
            Err(CatalogError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Catalog::load(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }
}
