//! Data Loading
//!
//! Reads the session's startup documents from a data directory:
//!
//! - `questions.json`: array of questions with `isCorrect` answer flags
//! - `state.json`: grid layout (`questionPosition`, `answersPositions`, `walls`)
//! - `laureates.json`: avatar catalogue handed to clients, opaque to the engine

use std::fs;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::game::engine::EngineError;
use crate::game::layout::Layout;
use crate::game::question::{validate_pool, Question};

/// File name of the question pool.
pub const QUESTIONS_FILE: &str = "questions.json";
/// File name of the layout.
pub const LAYOUT_FILE: &str = "state.json";
/// File name of the avatar catalogue.
pub const LAUREATES_FILE: &str = "laureates.json";

/// Data loading errors.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// File could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File is not the expected JSON.
    #[error("Failed to parse {}: {source}", .path.display())]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Documents parse but don't fit together.
    #[error("Invalid game data: {0}")]
    Invalid(#[from] EngineError),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a question pool.
pub fn load_questions(path: &Path) -> Result<Vec<Question>, DataError> {
    read_json(path)
}

/// Load a layout.
pub fn load_layout(path: &Path) -> Result<Layout, DataError> {
    read_json(path)
}

/// Load the avatar catalogue.
pub fn load_laureates(path: &Path) -> Result<Vec<serde_json::Value>, DataError> {
    read_json(path)
}

/// Everything a session needs at startup.
#[derive(Debug, Clone)]
pub struct GameData {
    /// Question pool.
    pub questions: Vec<Question>,
    /// Grid layout.
    pub layout: Layout,
    /// Avatar catalogue.
    pub laureates: Vec<serde_json::Value>,
}

impl GameData {
    /// Load and validate all three documents from `dir`.
    ///
    /// A missing `laureates.json` yields an empty catalogue; the other two
    /// files are required.
    pub fn load_dir(dir: &Path) -> Result<Self, DataError> {
        let questions = load_questions(&dir.join(QUESTIONS_FILE))?;
        let layout = load_layout(&dir.join(LAYOUT_FILE))?;

        let laureates_path = dir.join(LAUREATES_FILE);
        let laureates = if laureates_path.exists() {
            load_laureates(&laureates_path)?
        } else {
            Vec::new()
        };

        layout.validate()?;
        validate_pool(&questions, layout.answer_zones.len())?;

        info!(
            questions = questions.len(),
            laureates = laureates.len(),
            "Loaded game data from {}",
            dir.display()
        );

        Ok(Self { questions, layout, laureates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTIONS: &str = r#"[
        {"text": "Physics 1903?", "answers": [
            {"text": "Marie Curie", "isCorrect": true},
            {"text": "Niels Bohr", "isCorrect": false}
        ]},
        {"text": "Chemistry 1911?", "answers": [
            {"text": "Marie Curie", "isCorrect": true},
            {"text": "Linus Pauling"}
        ]}
    ]"#;

    const STATE: &str = r#"{
        "width": 12,
        "height": 8,
        "questionPosition": {"x": 4, "y": 0, "width": 3, "height": 1},
        "answersPositions": [
            {"x": 0, "y": 6, "width": 1, "height": 1},
            {"x": 10, "y": 6, "width": 1, "height": 1}
        ]
    }"#;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("trivia-grid-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn write(&self, name: &str, contents: &str) {
            fs::write(self.0.join(name), contents).unwrap();
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new();
        dir.write(QUESTIONS_FILE, QUESTIONS);
        dir.write(LAYOUT_FILE, STATE);
        dir.write(LAUREATES_FILE, r#"[{"firstname": "Marie", "surname": "Curie"}]"#);

        let data = GameData::load_dir(&dir.0).unwrap();
        assert_eq!(data.questions.len(), 2);
        assert_eq!(data.layout.width, 12);
        assert_eq!(data.laureates[0]["surname"], "Curie");
    }

    #[test]
    fn test_laureates_optional() {
        let dir = TempDir::new();
        dir.write(QUESTIONS_FILE, QUESTIONS);
        dir.write(LAYOUT_FILE, STATE);

        assert!(GameData::load_dir(&dir.0).unwrap().laureates.is_empty());
    }

    #[test]
    fn test_missing_questions_is_io_error() {
        let dir = TempDir::new();
        dir.write(LAYOUT_FILE, STATE);

        assert!(matches!(GameData::load_dir(&dir.0), Err(DataError::Io { .. })));
    }

    #[test]
    fn test_malformed_json() {
        let dir = TempDir::new();
        dir.write(QUESTIONS_FILE, "[{\"text\": ");
        dir.write(LAYOUT_FILE, STATE);

        assert!(matches!(GameData::load_dir(&dir.0), Err(DataError::Json { .. })));
    }

    #[test]
    fn test_zone_mismatch_rejected() {
        let dir = TempDir::new();
        dir.write(
            QUESTIONS_FILE,
            r#"[{"text": "Q", "answers": [{"text": "a", "isCorrect": true}]}]"#,
        );
        dir.write(LAYOUT_FILE, STATE);

        assert!(matches!(
            GameData::load_dir(&dir.0),
            Err(DataError::Invalid(EngineError::AnswerZoneMismatch { .. }))
        ));
    }
}
