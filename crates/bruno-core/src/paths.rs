//! Standard paths used by the Bruno MCP server

use std::path::PathBuf;

const APP_DIR: &str = "bruno-mcp";

/// Standard Bruno MCP paths
pub struct Paths {
    /// Config directory (~/.config/bruno-mcp)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR);

        Self { config }
    }

    /// Default location of the TOML config file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }
}
