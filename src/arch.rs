//! Architecture presets.
//!
//! An architecture contributes match-type strings in the architecture code
//! range on top of the core mapping. It never changes how a catalog is built.

use crate::error::{Result, TdiError};
use crate::mapper::{MapperExtension, MatchKind, MatchType, ranges};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MATCH_TYPE_RANGE: MatchType = MatchType::new(ranges::MATCH_TYPE_ARCH, MatchKind::Range);
pub const MATCH_TYPE_OPTIONAL: MatchType =
    MatchType::new(ranges::MATCH_TYPE_ARCH + 1, MatchKind::Optional);
/// Algorithmic TCAM; encoded like a ternary field.
pub const MATCH_TYPE_ATCAM: MatchType =
    MatchType::new(ranges::MATCH_TYPE_ARCH + 2, MatchKind::Ternary);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchType {
    Psa,
    Pna,
    Tna,
}

impl ArchType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchType::Psa => "psa",
            ArchType::Pna => "pna",
            ArchType::Tna => "tna",
        }
    }

    pub fn mapper_extension(self) -> MapperExtension {
        let common = MapperExtension::default()
            .match_type("Range", MATCH_TYPE_RANGE)
            .match_type("Optional", MATCH_TYPE_OPTIONAL);
        match self {
            ArchType::Psa | ArchType::Pna => common,
            ArchType::Tna => common.match_type("ATCAM", MATCH_TYPE_ATCAM),
        }
    }
}

impl fmt::Display for ArchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchType {
    type Err = TdiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "psa" => Ok(ArchType::Psa),
            "pna" => Ok(ArchType::Pna),
            "tna" => Ok(ArchType::Tna),
            other => Err(TdiError::invalid_argument(format!(
                "unknown architecture '{other}'"
            ))),
        }
    }
}
