//! Category models

use serde::{Deserialize, Serialize};

/// Icon the backend assigns when none is given
pub const DEFAULT_CATEGORY_ICON: &str = "fa-tag";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    DEFAULT_CATEGORY_ICON.to_string()
}
