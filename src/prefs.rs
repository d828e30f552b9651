//! Persisted view preferences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Table,
    #[default]
    Board,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Table => "table",
            ViewMode::Board => "board",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(ViewMode::Table),
            "board" => Ok(ViewMode::Board),
            other => Err(Error::InvalidArgument(format!(
                "unknown view '{other}' (expected table or board)"
            ))),
        }
    }
}

/// Invalid stored values fall back to their defaults individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, deserialize_with = "lenient_view")]
    pub view: ViewMode,
    #[serde(default = "default_page_size", deserialize_with = "lenient_page_size")]
    pub page_size: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            view: ViewMode::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Preferences {
    pub fn validate_page_size(page_size: usize) -> Result<usize> {
        if page_size == 0 {
            return Err(Error::InvalidArgument(
                "page size must be greater than 0".to_string(),
            ));
        }
        Ok(page_size)
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn lenient_view<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<ViewMode, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}

fn lenient_page_size<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_board_and_ten_rows() {
        let prefs = Preferences::default();
        assert_eq!(prefs.view, ViewMode::Board);
        assert_eq!(prefs.page_size, 10);
    }

    #[test]
    fn garbage_values_fall_back_per_field() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"view":"grid","pageSize":25}"#).unwrap();
        assert_eq!(prefs.view, ViewMode::Board);
        assert_eq!(prefs.page_size, 25);

        let prefs: Preferences =
            serde_json::from_str(r#"{"view":"table","pageSize":0}"#).unwrap();
        assert_eq!(prefs.view, ViewMode::Table);
        assert_eq!(prefs.page_size, 10);

        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn zero_page_size_is_rejected_on_input() {
        assert!(Preferences::validate_page_size(0).is_err());
        assert_eq!(Preferences::validate_page_size(20).unwrap(), 20);
    }
}
