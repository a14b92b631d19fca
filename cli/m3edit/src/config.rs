//! `m3edit.toml` settings and their command-line overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// File looked up in the working directory.
pub const CONFIG_FILE: &str = "m3edit.toml";

/// Contents of `m3edit.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Path to the structure schema (`structures.xml`).
    #[serde(default)]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// How listings are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => bail!("unknown output format: '{other}'. Choose: text, json"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        })
    }
}

impl EditorConfig {
    /// Parse a config from TOML text.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing m3edit.toml")
    }

    /// Load `m3edit.toml` from `dir` if present. A relative schema path is
    /// taken relative to `dir`.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config =
            Self::from_str(&content).with_context(|| format!("loading {}", path.display()))?;
        config.schema = config
            .schema
            .map(|schema| if schema.is_relative() { dir.join(schema) } else { schema });
        Ok(Some(config))
    }
}

/// Effective settings after applying command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub schema: PathBuf,
    pub format: OutputFormat,
    pub log_level: String,
}

impl Settings {
    pub fn resolve(
        config: EditorConfig,
        schema: Option<PathBuf>,
        format: Option<&str>,
        verbose: bool,
    ) -> Result<Self> {
        let Some(schema) = schema.or(config.schema) else {
            bail!("no schema given; pass --schema or set `schema` in {CONFIG_FILE}")
        };
        let format = match format {
            Some(name) => name.parse()?,
            None => config.output.format,
        };
        let log_level = if verbose {
            "debug".to_string()
        } else {
            config.log.level
        };
        Ok(Self {
            schema,
            format,
            log_level,
        })
    }
}
