use anyhow::{Context, Result};
use facegate_core::recognizer::FACENET_MODEL_FILE;
use facegate_core::{EmbedderOptions, MatchThresholds, TensorLayout};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CLI configuration.
///
/// Built from defaults, then an optional TOML file named by
/// `FACEGATE_CONFIG`, then `FACEGATE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite gallery database.
    pub db_path: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Embedding model file name inside `model_dir`.
    pub model_file: String,
    /// Side length of the square embedder input.
    pub input_size: u32,
    /// Expected embedding dimension.
    pub embedding_dim: usize,
    pub layout: TensorLayout,
    /// Accept a match at or below this L2 distance.
    pub max_l2_distance: f32,
    /// Accept a match at or above this cosine similarity.
    pub min_similarity: f32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        let embedder = EmbedderOptions::default();
        let thresholds = MatchThresholds::default();
        Self {
            db_path: data_dir.join("gallery.db"),
            model_dir: data_dir.join("models"),
            model_file: FACENET_MODEL_FILE.to_string(),
            input_size: embedder.input_size,
            embedding_dim: embedder.embedding_dim,
            layout: embedder.layout,
            max_l2_distance: thresholds.max_l2_distance,
            min_similarity: thresholds.min_similarity,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("FACEGATE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FACEGATE_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACEGATE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FACEGATE_MODEL_FILE") {
            self.model_file = v;
        }
        self.input_size = env_or("FACEGATE_INPUT_SIZE", self.input_size);
        self.embedding_dim = env_or("FACEGATE_EMBEDDING_DIM", self.embedding_dim);
        self.max_l2_distance = env_or("FACEGATE_MAX_L2_DISTANCE", self.max_l2_distance);
        self.min_similarity = env_or("FACEGATE_MIN_SIMILARITY", self.min_similarity);
    }

    /// Path to the embedding model.
    pub fn model_path(&self) -> String {
        self.model_dir
            .join(&self.model_file)
            .to_string_lossy()
            .into_owned()
    }

    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            max_l2_distance: self.max_l2_distance,
            min_similarity: self.min_similarity,
        }
    }

    pub fn embedder_options(&self) -> EmbedderOptions {
        EmbedderOptions {
            input_size: self.input_size,
            embedding_dim: self.embedding_dim,
            layout: self.layout,
            ..EmbedderOptions::default()
        }
    }
}

/// `$XDG_DATA_HOME/facegate`, falling back to `~/.local/share/facegate`.
fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparsable environment override");
            default
        }),
        Err(_) => default,
    }
}
