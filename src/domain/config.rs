use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Workspace configuration.
///
/// Read from `.shall/config.toml`. Every field has a default, so an empty
/// file (apart from the `_version` tag) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Units whose cleaned text is shorter than this are discarded as noise.
    pub min_chunk_chars: usize,

    /// Units longer than this are kept whole but reported as oversized.
    pub max_chunk_chars: usize,

    /// A numbered line is treated as a standalone header only if its title
    /// is at most this long.
    pub max_header_chars: usize,

    /// How chunk embeddings are produced.
    pub embedding: EmbeddingConfig,

    /// Optional external classification service.
    ///
    /// When absent, classification is purely rule-based.
    pub external_scorer: Option<ExternalScorerConfig>,

    /// Default number of items per review queue page.
    page_size: usize,
}

/// Embedding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// Do not compute embeddings.
    None,
    /// Deterministic local feature hashing.
    Hashing {
        /// Length of the embedding vector.
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },
    /// An OpenAI-compatible embeddings endpoint.
    #[serde(rename = "openai")]
    OpenAi {
        /// Base URL, e.g. `https://api.openai.com/v1`.
        base_url: String,
        /// Model name.
        model: String,
        /// Environment variable holding the API key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        /// Requested vector length, if the model supports choosing one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimensions: Option<usize>,
        /// Maximum inputs per request.
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        /// Request timeout in milliseconds.
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Hashing {
            dimensions: default_dimensions(),
        }
    }
}

/// Settings for an OpenAI-compatible chat completion classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalScorerConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_chunk_chars: default_min_chunk_chars(),
            max_chunk_chars: default_max_chunk_chars(),
            max_header_chars: default_max_header_chars(),
            embedding: EmbeddingConfig::default(),
            external_scorer: None,
            page_size: default_page_size(),
        }
    }
}

/// Failure to read or write `.shall/config.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config file {path}: {source}")]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid configuration.
    #[error("config file {path} is invalid: {source}")]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },

    /// The configuration could not be rendered as TOML.
    #[error("failed to serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable or not a valid versioned configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(io)?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the configuration, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default review queue page size, clamped to `1..=100`.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size.clamp(1, 100)
    }
}

const fn default_min_chunk_chars() -> usize {
    50
}

const fn default_max_chunk_chars() -> usize {
    2000
}

const fn default_max_header_chars() -> usize {
    100
}

const fn default_dimensions() -> usize {
    384
}

const fn default_batch_size() -> usize {
    64
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_page_size() -> usize {
    20
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// On-disk layouts of the configuration, tagged by `_version`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_min_chunk_chars")]
        min_chunk_chars: usize,

        #[serde(default = "default_max_chunk_chars")]
        max_chunk_chars: usize,

        #[serde(default = "default_max_header_chars")]
        max_header_chars: usize,

        #[serde(default = "default_page_size")]
        page_size: usize,

        #[serde(default)]
        embedding: EmbeddingConfig,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_scorer: Option<ExternalScorerConfig>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                min_chunk_chars,
                max_chunk_chars,
                max_header_chars,
                embedding,
                external_scorer,
                page_size,
            } => Self {
                min_chunk_chars,
                max_chunk_chars,
                max_header_chars,
                embedding,
                external_scorer,
                page_size,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            min_chunk_chars: config.min_chunk_chars,
            max_chunk_chars: config.max_chunk_chars,
            max_header_chars: config.max_header_chars,
            embedding: config.embedding,
            external_scorer: config.external_scorer,
            page_size: config.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nmin_chunk_chars = 30\npage_size = 50\n\n[embedding]\nkind = \
              \"none\"\n\n[external_scorer]\nbase_url = \"http://localhost:8080/v1\"\nmodel = \
              \"classifier\"\ntimeout_ms = 2500\n",
        )
        .unwrap();

        let loaded = Config::load(file.path()).unwrap();

        assert_eq!(loaded.min_chunk_chars, 30);
        assert_eq!(loaded.max_chunk_chars, 2000);
        assert_eq!(loaded.page_size(), 50);
        assert_eq!(loaded.embedding, EmbeddingConfig::None);
        let scorer = loaded.external_scorer.unwrap();
        assert_eq!(scorer.model, "classifier");
        assert_eq!(scorer.timeout_ms, 2500);
        assert_eq!(scorer.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("config.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Io { path, .. } if path == missing));
    }

    #[test]
    fn wrong_field_type_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmin_chunk_chars = \"fifty\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("min_chunk_chars"));
    }

    #[test]
    fn version_tag_alone_gives_defaults() {
        let config: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.page_size(), 20);
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(toml::from_str::<Config>(r#"_version = "2""#).is_err());
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.max_chunk_chars = 1500;
        config.external_scorer = Some(ExternalScorerConfig {
            base_url: "http://localhost:9000/v1".to_string(),
            model: "m".to_string(),
            api_key_env: "KEY".to_string(),
            timeout_ms: 500,
        });

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn page_size_is_clamped() {
        let config: Config = toml::from_str("_version = \"1\"\npage_size = 1000\n").unwrap();
        assert_eq!(config.page_size(), 100);
    }
}
