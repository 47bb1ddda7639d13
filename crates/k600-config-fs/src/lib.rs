// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for K600 tools (uses platform config dir).

use directories::ProjectDirs;
use k600_core::error::ConfigError;
use k600_core::ConfigStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store configs as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/k600`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("za.ac", "ithemba", "k600")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "loaded config");
                Ok(bytes)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        debug!(path = %path.display(), bytes = data.len(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k600_core::{ConfigService, DetectorConfig};

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsConfigStore::at(dir.path()).expect("store");
        assert!(matches!(store.load_raw("detector"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn detector_config_round_trips_through_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = ConfigService::new(FsConfigStore::at(dir.path().join("nested")).expect("store"));
        let mut cfg = DetectorConfig::default();
        cfg.leps.addback = false;
        cfg.vdc.hit_buffer_size = 12;
        svc.save("detector", &cfg).expect("save");

        let store = svc.into_inner();
        assert!(store.path_for("detector").is_file());
        let svc = ConfigService::new(store);
        assert_eq!(svc.load_detector("detector").expect("load"), cfg);
    }

    #[test]
    fn hand_edited_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsConfigStore::at(dir.path()).expect("store");
        fs::write(store.path_for("detector"), br#"{"nai":{"threshold":45.0}}"#).expect("write");
        let cfg = ConfigService::new(store).load_detector("detector").expect("load");
        assert_eq!(cfg.nai.threshold, 45.0);
        assert_eq!(cfg.tiara, DetectorConfig::default().tiara);
    }
}
