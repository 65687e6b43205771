//! Configuration for the Bruno MCP server
//!
//! Values come from (lowest to highest precedence) built-in defaults, a TOML
//! file, and `BRUNO_MCP_*` environment variables. The binary applies its
//! command-line flags on top of the result.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths::Paths;

/// Initial capacity of the transport's line buffer: 1 MiB
pub const DEFAULT_INITIAL_BUFFER_BYTES: usize = 1024 * 1024;

/// Hard limit on a single input line: 32 MiB
pub const DEFAULT_MAX_LINE_BYTES: usize = 32 * 1024 * 1024;

pub const ENV_MAX_LINE_BYTES: &str = "BRUNO_MCP_MAX_LINE_BYTES";
pub const ENV_INITIAL_BUFFER_BYTES: &str = "BRUNO_MCP_INITIAL_BUFFER_BYTES";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Initial read buffer capacity in bytes
    #[serde(default = "default_initial_buffer_bytes")]
    pub initial_buffer_bytes: usize,

    /// Maximum accepted line length in bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Directory names never treated as collections or walked into
    #[serde(default = "default_collection_ignore")]
    pub collection_ignore: Vec<String>,

    /// Extra directory names skipped when listing request files
    #[serde(default = "default_request_skip_dirs")]
    pub request_skip_dirs: Vec<String>,
}

fn default_initial_buffer_bytes() -> usize {
    DEFAULT_INITIAL_BUFFER_BYTES
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_collection_ignore() -> Vec<String> {
    vec![".git".to_string(), "node_modules".to_string()]
}

fn default_request_skip_dirs() -> Vec<String> {
    // environment files are .bru too
    vec!["environments".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_buffer_bytes: default_initial_buffer_bytes(),
            max_line_bytes: default_max_line_bytes(),
            collection_ignore: default_collection_ignore(),
            request_skip_dirs: default_request_skip_dirs(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`, then apply environment overrides.
    ///
    /// An explicitly given file must exist; a missing default file just
    /// means defaults. The result is not validated, so callers can layer
    /// more overrides first and then call [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Paths::new().config_file();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `BRUNO_MCP_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max = lookup(ENV_MAX_LINE_BYTES)
            .map(|value| parse_size(ENV_MAX_LINE_BYTES, &value))
            .transpose()?;
        let initial = lookup(ENV_INITIAL_BUFFER_BYTES)
            .map(|value| parse_size(ENV_INITIAL_BUFFER_BYTES, &value))
            .transpose()?;
        self.override_sizes(max, initial);
        Ok(())
    }

    /// Override the buffer sizes. Lowering only the line limit below the
    /// initial buffer shrinks the buffer with it; setting both is taken as
    /// given and left to [`Config::validate`].
    pub fn override_sizes(&mut self, max_line_bytes: Option<usize>, initial_buffer_bytes: Option<usize>) {
        if let Some(max) = max_line_bytes {
            self.max_line_bytes = max;
            if initial_buffer_bytes.is_none() {
                self.initial_buffer_bytes = self.initial_buffer_bytes.min(max);
            }
        }
        if let Some(initial) = initial_buffer_bytes {
            self.initial_buffer_bytes = initial;
        }
    }

    /// Check buffer sizes are usable together
    pub fn validate(&self) -> Result<()> {
        if self.max_line_bytes == 0 {
            bail!("max_line_bytes must be greater than zero");
        }
        if self.initial_buffer_bytes == 0 {
            bail!("initial_buffer_bytes must be greater than zero");
        }
        if self.initial_buffer_bytes > self.max_line_bytes {
            bail!(
                "initial_buffer_bytes ({}) exceeds max_line_bytes ({})",
                self.initial_buffer_bytes,
                self.max_line_bytes
            );
        }
        Ok(())
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a byte count, got {:?}", key, value))
}
