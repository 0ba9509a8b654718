// Configuration management for phpindex

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::index::schema::DEFAULT_TABLE_PREFIX;

/// Name of the per-project configuration file
pub const CONFIG_FILE: &str = ".phpindex.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub source: SourceConfig,
    pub indexing: IndexingConfig,
    pub query: QueryConfig,
    pub schema: SchemaConfig,
    pub output: OutputConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Root of the PHP declaration tree, relative to the project directory
    pub source_root: String,
    /// Directory holding the SQL installation scripts
    pub schema_root: String,
}

/// Provenance overrides; when unset the git checkout is consulted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub commit: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub extensions: Vec<String>,
    pub schema_extensions: Vec<String>,
    pub schema_recursive: bool,
    pub batch_size: usize,
    pub concurrent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_ambiguous: usize,
    pub max_suggestions: usize,
    pub max_edit_distance: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub table_prefix: String,
    pub component_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub index_file: String,
    pub schema_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
            source_root: ".".to_string(),
            schema_root: "installation/sql/mysql".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "node_modules/".to_string(),
                ".git/".to_string(),
                ".phpindex/".to_string(),
                "**/tests/**".to_string(),
            ],
            include: vec![],
            extensions: vec!["php".to_string()],
            schema_extensions: vec!["sql".to_string()],
            schema_recursive: false,
            batch_size: 100,
            concurrent: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_ambiguous: 10,
            max_suggestions: 5,
            max_edit_distance: 3,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            component_prefix: "com_".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { max_chars: 24_000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_file: ".phpindex/index.json".to_string(),
            schema_file: ".phpindex/schema.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            source: SourceConfig::default(),
            indexing: IndexingConfig::default(),
            query: QueryConfig::default(),
            schema: SchemaConfig::default(),
            output: OutputConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load .phpindex.toml from the project root.
    ///
    /// `Ok(None)` when there is no file; a file that fails to parse or validate is an error.
    pub fn try_from_project_dir<P: AsRef<Path>>(project_dir: P) -> anyhow::Result<Option<Self>> {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(None);
        }

        Self::from_file(&config_path)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))
            .map(Some)
    }

    /// Load configuration from project directory, falling back to defaults
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        match Self::try_from_project_dir(&project_dir) {
            Ok(Some(config)) => {
                tracing::info!("Loaded configuration from {}", project_dir.as_ref().display());
                config
            }
            Ok(None) => {
                tracing::debug!("No {} found, using default configuration", CONFIG_FILE);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Check if a file path should be indexed based on include/exclude patterns
    pub fn should_index_file(&self, file_path: &str) -> bool {
        for pattern in &self.indexing.exclude {
            if self.matches_pattern(file_path, pattern) {
                return false;
            }
        }

        if !self.indexing.include.is_empty() {
            return self
                .indexing
                .include
                .iter()
                .any(|pattern| self.matches_pattern(file_path, pattern));
        }

        true
    }

    /// Simple glob-style matching: `dir/`, `*.ext`, `**/dir/**` and plain substrings
    fn matches_pattern(&self, file_path: &str, pattern: &str) -> bool {
        let file_path = file_path.replace('\\', "/");

        if pattern.ends_with('/') {
            let dir = pattern.trim_end_matches('/');
            file_path.starts_with(pattern) || file_path.contains(&format!("/{}/", dir))
        } else if let Some(suffix) = pattern.strip_prefix("*.") {
            file_path.contains(&format!(".{}", suffix))
        } else if let Some(inner) = pattern
            .strip_prefix("**/")
            .and_then(|p| p.strip_suffix("/**"))
        {
            file_path.contains(&format!("/{}/", inner)) || file_path.starts_with(&format!("{}/", inner))
        } else {
            file_path.contains(pattern)
        }
    }

    /// Resolve the PHP source root against the project directory
    pub fn source_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.source_root)
    }

    pub fn schema_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.schema_root)
    }

    pub fn index_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.storage.index_file)
    }

    pub fn schema_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.storage.schema_file)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }
        if self.project.source_root.is_empty() {
            return Err(anyhow::anyhow!("Source root cannot be empty"));
        }
        if self.project.schema_root.is_empty() {
            return Err(anyhow::anyhow!("Schema root cannot be empty"));
        }

        if self.indexing.extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one source extension is required"));
        }
        if self.indexing.schema_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one schema extension is required"));
        }
        if self.indexing.batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size must be greater than 0"));
        }

        if self.query.default_limit == 0 {
            return Err(anyhow::anyhow!("Default query limit must be greater than 0"));
        }
        if self.query.max_ambiguous == 0 {
            return Err(anyhow::anyhow!("Ambiguous candidate cap must be greater than 0"));
        }

        if self.output.max_chars == 0 {
            return Err(anyhow::anyhow!("Output budget must be greater than 0"));
        }

        if self.storage.index_file.is_empty() || self.storage.schema_file.is_empty() {
            return Err(anyhow::anyhow!("Storage paths cannot be empty"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Load configuration for a project before logging is up.
///
/// An unusable file yields defaults plus the error, to be reported once the
/// subscriber is installed.
pub fn load_config(project_dir: &str) -> (Config, Option<anyhow::Error>) {
    match Config::try_from_project_dir(project_dir) {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (Config::default(), Some(e)),
    }
}
