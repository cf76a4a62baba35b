//! Optional TOML configuration
//!
//! ```toml
//! pattern = "#\\d+\\{sid\\w{8}\\}"
//!
//! [highlight]
//! color = "#FFFF00"
//! opacity = 0.6
//! ```
//!
//! Command-line flags override file values, which override the defaults.

use std::fs;
use std::path::Path;

use anyhow::Context;
use mustermark_core::{HighlightStyle, DEFAULT_PATTERN};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Regular expression to highlight
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HighlightConfig {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_color() -> String {
    "#FFFF00".to_string()
}

fn default_opacity() -> f32 {
    1.0
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            opacity: default_opacity(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pattern: Option<String>,
    pub color: Option<String>,
    pub opacity: Option<f32>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load the file if one was given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if overrides.pattern.is_some() {
            self.pattern = overrides.pattern;
        }
        if let Some(color) = overrides.color {
            self.highlight.color = color;
        }
        if let Some(opacity) = overrides.opacity {
            self.highlight.opacity = opacity;
        }
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or(DEFAULT_PATTERN)
    }

    pub fn style(&self) -> anyhow::Result<HighlightStyle> {
        HighlightStyle::from_hex(&self.highlight.color, self.highlight.opacity)
            .context("Invalid highlight settings")
    }
}
