//! Judging categories a house can be voted on.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed judging criteria.
///
/// Serialized by its display label, which is also the wire format used by the
/// vote and note endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "mais criativa")]
    MaisCriativa,
    #[serde(rename = "mais assustadora")]
    MaisAssustadora,
    #[serde(rename = "melhores doces")]
    MelhoresDoces,
    #[serde(rename = "melhor fantasia")]
    MelhorFantasia,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 4] = [
        Category::MaisCriativa,
        Category::MaisAssustadora,
        Category::MelhoresDoces,
        Category::MelhorFantasia,
    ];

    /// Human-readable label (also the serialized form).
    pub fn label(self) -> &'static str {
        match self {
            Category::MaisCriativa => "mais criativa",
            Category::MaisAssustadora => "mais assustadora",
            Category::MelhoresDoces => "melhores doces",
            Category::MelhorFantasia => "melhor fantasia",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}
