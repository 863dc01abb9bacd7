use crate::defaults::{
    DEFAULT_DIALECT, ENV_DIALECT, ENV_MAX_TOKENS, ENV_SEED, MAX_TOKENS, TRAIN_NUM_BUCKETS,
    TRAIN_SHUFFLE,
};
use crate::dialect::Dialect;
use crate::error::{KorspeechError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub batching: BatchingConfig,
    pub corpus: CorpusConfig,
    /// Custom dialects, keyed by name. A name shared with a built-in preset
    /// replaces that preset.
    pub dialects: BTreeMap<String, Dialect>,
}

/// Batch assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchingConfig {
    pub max_tokens: usize,
    /// Optional cap on the number of samples per batch.
    pub batch_size: Option<usize>,
    pub train_num_buckets: usize,
    /// Reshuffle the order of training batches every epoch.
    pub train_shuffle: bool,
    pub seed: Option<u64>,
}

/// Corpus selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    pub dialect: String,
    pub train_index: Vec<PathBuf>,
    pub valid_index: Vec<PathBuf>,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS,
            batch_size: None,
            train_num_buckets: TRAIN_NUM_BUCKETS,
            train_shuffle: TRAIN_SHUFFLE,
            seed: None,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dialect: DEFAULT_DIALECT.to_string(),
            train_index: Vec::new(),
            valid_index: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KorspeechError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                KorspeechError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(KorspeechError::ConfigFileNotFound { .. }) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - KORSPEECH_DIALECT → corpus.dialect
    /// - KORSPEECH_MAX_TOKENS → batching.max_tokens
    /// - KORSPEECH_SEED → batching.seed
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dialect) = std::env::var(ENV_DIALECT)
            && !dialect.is_empty()
        {
            self.corpus.dialect = dialect;
        }

        if let Some(max_tokens) = parse_env(ENV_MAX_TOKENS) {
            self.batching.max_tokens = max_tokens;
        }

        if let Some(seed) = parse_env(ENV_SEED) {
            self.batching.seed = Some(seed);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// `~/.config/korspeech/config.toml` on Linux, `None` when the platform
    /// has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("korspeech").join("config.toml"))
    }

    /// Look up a dialect by name, configured dialects first.
    pub fn resolve_dialect(&self, name: &str) -> Result<Dialect> {
        if let Some(dialect) = self.dialects.get(name) {
            let mut dialect = dialect.clone();
            if dialect.name.is_empty() {
                dialect.name = name.to_string();
            }
            return Ok(dialect);
        }
        Dialect::builtin(name).ok_or_else(|| KorspeechError::UnknownDialect {
            name: name.to_string(),
        })
    }

    /// Every resolvable dialect name: built-ins first, then configured ones.
    pub fn dialect_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Dialect::builtin_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        for name in self.dialects.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok().filter(|v| !v.is_empty())?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DualFormPolicy, GroupPolicy, TranscriptFormat};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_korspeech_env() {
        remove_env(ENV_DIALECT);
        remove_env(ENV_MAX_TOKENS);
        remove_env(ENV_SEED);
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.batching.max_tokens, 700);
        assert_eq!(config.batching.batch_size, None);
        assert_eq!(config.batching.train_num_buckets, 50);
        assert!(config.batching.train_shuffle);
        assert_eq!(config.batching.seed, None);

        assert_eq!(config.corpus.dialect, "solugate");
        assert!(config.corpus.train_index.is_empty());
        assert!(config.dialects.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [batching]
            max_tokens = 1200
            batch_size = 16
            train_num_buckets = 20
            train_shuffle = false
            seed = 7

            [corpus]
            dialect = "kspon"
            train_index = ["/data/train.trn"]
            valid_index = ["/data/dev.trn", "/data/eval.trn"]
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.batching.max_tokens, 1200);
        assert_eq!(config.batching.batch_size, Some(16));
        assert_eq!(config.batching.train_num_buckets, 20);
        assert!(!config.batching.train_shuffle);
        assert_eq!(config.batching.seed, Some(7));

        assert_eq!(config.corpus.dialect, "kspon");
        assert_eq!(config.corpus.train_index, vec![PathBuf::from("/data/train.trn")]);
        assert_eq!(config.corpus.valid_index.len(), 2);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [batching]
            max_tokens = 900
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.batching.max_tokens, 900);
        assert_eq!(config.batching.train_num_buckets, 50);
        assert_eq!(config.corpus, CorpusConfig::default());
    }

    #[test]
    fn test_load_custom_dialect_table() {
        let temp_file = write_config(
            r#"
            [dialects.callcenter]
            format = { kind = "delimited", separator = "\t" }
            dual_form = { policy = "first-segment" }
            groups = "strip"
            min_chars = 3
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();
        let dialect = config.resolve_dialect("callcenter").unwrap();

        assert_eq!(dialect.name, "callcenter");
        assert_eq!(dialect.min_chars, 3);
        assert_eq!(dialect.groups, GroupPolicy::Strip);
        assert_eq!(dialect.dual_form, DualFormPolicy::FirstSegment);
        assert!(matches!(
            dialect.format,
            TranscriptFormat::Delimited { ref separator, .. } if separator == "\t"
        ));
    }

    #[test]
    fn test_configured_dialect_shadows_builtin() {
        let mut custom = Dialect::solugate();
        custom.min_chars = 1;
        let mut config = Config::default();
        config.dialects.insert("solugate".to_string(), custom);

        assert_eq!(config.resolve_dialect("solugate").unwrap().min_chars, 1);
        assert_eq!(config.resolve_dialect("kspon").unwrap(), Dialect::kspon());
    }

    #[test]
    fn test_resolve_unknown_dialect() {
        let err = Config::default().resolve_dialect("nope").unwrap_err();
        assert!(matches!(err, KorspeechError::UnknownDialect { ref name } if name == "nope"));
    }

    #[test]
    fn test_dialect_names_lists_builtins_then_custom() {
        let mut config = Config::default();
        config.dialects.insert("zeroth".to_string(), Dialect::diquest());
        config.dialects.insert("kspon".to_string(), Dialect::kspon());

        assert_eq!(
            config.dialect_names(),
            vec!["solugate", "kspon", "diquest", "hallym", "zeroth"]
        );
    }

    #[test]
    fn test_env_override_dialect() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_korspeech_env();

        set_env(ENV_DIALECT, "diquest");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.corpus.dialect, "diquest");
        assert_eq!(config.batching.max_tokens, 700); // Not overridden

        clear_korspeech_env();
    }

    #[test]
    fn test_env_override_numbers() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_korspeech_env();

        set_env(ENV_MAX_TOKENS, "1500");
        set_env(ENV_SEED, "42");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.batching.max_tokens, 1500);
        assert_eq!(config.batching.seed, Some(42));

        clear_korspeech_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_korspeech_env();

        set_env(ENV_DIALECT, "");
        set_env(ENV_MAX_TOKENS, "lots");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.corpus.dialect, "solugate");
        assert_eq!(config.batching.max_tokens, 700);

        clear_korspeech_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [batching
            max_tokens = "broken
        "#,
        );

        let result = Config::load(temp_file.path());

        assert!(matches!(result, Err(KorspeechError::ConfigParse(_))));
    }

    #[test]
    fn test_default_path_ends_with_app_dir() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("korspeech/config.toml"));
        }
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let missing_path = Path::new("/tmp/nonexistent_korspeech_config_12345.toml");
        assert!(matches!(
            Config::load(missing_path),
            Err(KorspeechError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_korspeech_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let temp_file = write_config("[batching\nmax_tokens = ");

        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut config = Config::default();
        config.batching.seed = Some(3);
        config.corpus.train_index = vec![PathBuf::from("train.trn")];

        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
