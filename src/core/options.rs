/// Compile options, loadable from RON.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Attach the offending line's text to every issue.
    pub include_line_in_issue: bool,
    /// Drop `//` comments instead of keeping them as nodes.
    pub strip_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            include_line_in_issue: true,
            strip_comments: true,
        }
    }
}

impl CompileOptions {
    pub fn include_line_in_issue(mut self, include: bool) -> Self {
        self.include_line_in_issue = include;
        self
    }

    pub fn strip_comments(mut self, strip: bool) -> Self {
        self.strip_comments = strip;
        self
    }

    /// Load options from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<CompileOptions, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse options from a RON string. Missing fields keep their defaults.
    pub fn parse_ron(input: &str) -> Result<CompileOptions, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}
