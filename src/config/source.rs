//! Configuration origins and their precedence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a configuration came from.
///
/// Variants are declared in precedence order, so the derived `Ord` ranks a
/// YAML file above a JSON file above an XML file above programmatic defaults
/// above whatever the task catalog discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Discovered,
    Default,
    Xml,
    Json,
    Yaml,
}

impl Source {
    /// Every source, lowest precedence first.
    pub const ALL: [Source; 5] = [
        Source::Discovered,
        Source::Default,
        Source::Xml,
        Source::Json,
        Source::Yaml,
    ];

    /// Sources backed by a configuration file, lowest precedence first.
    pub const FILES: [Source; 3] = [Source::Xml, Source::Json, Source::Yaml];

    /// Numeric precedence; higher wins.
    pub fn precedence(&self) -> u8 {
        match self {
            Source::Discovered => 1,
            Source::Default => 2,
            Source::Xml => 3,
            Source::Json => 4,
            Source::Yaml => 5,
        }
    }

    /// Conventional file name for file-backed sources.
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            Source::Xml => Some("agents.xml"),
            Source::Json => Some("agents.json"),
            Source::Yaml => Some("agents.yaml"),
            Source::Discovered | Source::Default => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Discovered => "discovered",
            Source::Default => "default",
            Source::Xml => "xml",
            Source::Json => "json",
            Source::Yaml => "yaml",
        };
        f.write_str(name)
    }
}
