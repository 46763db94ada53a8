use std::path::PathBuf;

use anyhow::Context;

use super::ZoneSource;
use crate::models::ZoneDefinition;

/// Zone definitions read from a JSON file holding an array of definitions.
///
/// The file is re-read on every load, so edits show up on the next reload.
#[derive(Debug, Clone)]
pub struct JsonZoneFile {
    path: PathBuf,
}

impl JsonZoneFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ZoneSource for JsonZoneFile {
    fn load_zone_definitions(&self) -> anyhow::Result<Vec<ZoneDefinition>> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read zone file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse zone file {}", self.path.display()))
    }
}
