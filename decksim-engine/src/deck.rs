//! Deck configuration files.
//!
//! Full deck parsing and legality checking belong to the rules engine and are
//! out of scope here; the harness only needs named configurations with enough
//! shape to seed simulations and to group opponents by color identity.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Canonical color order used when normalizing identity codes.
const COLOR_ORDER: [char; 5] = ['W', 'U', 'B', 'R', 'G'];

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("deck file not found: {0}")]
    NotFound(String),
    #[error("failed to read deck file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse deck file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeckFormat {
    #[default]
    Standard,
    Commander,
}

impl DeckFormat {
    /// Starting life for a seat playing this format.
    #[must_use]
    pub const fn starting_life(self) -> i32 {
        match self {
            Self::Standard => 20,
            Self::Commander => 40,
        }
    }
}

/// A named deck configuration, the unit the harness tests and tests against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckConfig {
    pub name: String,
    #[serde(default)]
    pub format: DeckFormat,
    /// Raw color identity code, any order and case (for example "ubw").
    #[serde(default)]
    pub colors: String,
    /// Rough strength used by the built-in engine to scale damage.
    #[serde(default = "default_power")]
    pub power: u32,
    /// How quickly the deck comes online; higher closes games sooner.
    #[serde(default = "default_speed")]
    pub speed: u32,
}

const fn default_power() -> u32 {
    5
}

const fn default_speed() -> u32 {
    5
}

impl DeckConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, format: DeckFormat, colors: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format,
            colors: colors.into(),
            power: default_power(),
            speed: default_speed(),
        }
    }

    /// Normalized color identity in canonical WUBRG order, "C" for colorless.
    /// Used as the classification key for multi-party statistics.
    #[must_use]
    pub fn color_key(&self) -> String {
        let upper = self.colors.to_ascii_uppercase();
        let key: String = COLOR_ORDER
            .iter()
            .filter(|c| upper.contains(**c))
            .collect();
        if key.is_empty() { "C".to_string() } else { key }
    }

    /// Load a deck configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] when the file is missing, unreadable, or not a
    /// valid deck configuration.
    pub fn load(path: &Path) -> Result<Self, DeckError> {
        if !path.exists() {
            return Err(DeckError::NotFound(path.display().to_string()));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the configuration as JSON, creating or truncating `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] on serialization or I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), DeckError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Load every `.json` deck configuration under `dir`, skipping files that do
/// not parse. Returns decks in file-name order so runs are reproducible.
///
/// # Errors
///
/// Returns [`DeckError`] when the directory itself cannot be read.
pub fn load_decks_from_dir(dir: &Path) -> Result<Vec<DeckConfig>, DeckError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    let mut decks = Vec::new();
    for path in entries {
        match DeckConfig::load(&path) {
            Ok(deck) => decks.push(deck),
            Err(e) => log::warn!("skipping deck file {}: {e}", path.display()),
        }
    }
    Ok(decks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "decksim-deck-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn color_key_normalizes_order_and_case() {
        let deck = DeckConfig::new("Dimir Control", DeckFormat::Standard, "bu");
        assert_eq!(deck.color_key(), "UB");
    }

    #[test]
    fn color_key_is_c_for_colorless() {
        let deck = DeckConfig::new("Eggs", DeckFormat::Standard, "");
        assert_eq!(deck.color_key(), "C");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("deck.json");
        let deck = DeckConfig::new("Mono Red Burn", DeckFormat::Standard, "R");
        deck.save(&path).expect("save deck");
        let loaded = DeckConfig::load(&path).expect("load deck");
        assert_eq!(loaded, deck);
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = DeckConfig::load(Path::new("/nonexistent/deck.json")).unwrap_err();
        assert!(matches!(err, DeckError::NotFound(_)));
    }

    #[test]
    fn load_dir_skips_unparseable_files() {
        let dir = temp_dir("dir");
        DeckConfig::new("A Deck", DeckFormat::Standard, "W")
            .save(&dir.join("a.json"))
            .expect("save deck");
        fs::write(dir.join("b.json"), "not json").expect("write junk");
        fs::write(dir.join("notes.txt"), "ignored").expect("write notes");

        let decks = load_decks_from_dir(&dir).expect("load dir");
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].name, "A Deck");
    }

    #[test]
    fn format_defaults_apply_when_fields_missing() {
        let deck: DeckConfig = serde_json::from_str(r#"{"name":"Bare"}"#).expect("parse");
        assert_eq!(deck.format, DeckFormat::Standard);
        assert_eq!(deck.power, 5);
        assert_eq!(DeckFormat::Commander.starting_life(), 40);
    }
}
