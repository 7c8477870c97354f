//! Card code normalization and format validation

use crate::error::VisionError;
use regex::Regex;

/// Expected shape of a card code
#[derive(Debug, Clone)]
pub struct CodeFormat {
    pattern: Regex,
}

impl CodeFormat {
    pub fn new(pattern: &str) -> Result<Self, VisionError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| VisionError::Config(format!("invalid code pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Drop all whitespace and uppercase; `None` when nothing is left
    pub fn normalize(raw: &str) -> Option<String> {
        let code: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_uppercase())
            .collect();
        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        self.pattern.is_match(code)
    }
}
