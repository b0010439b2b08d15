pub use crate::settings_types::*;
use crate::error::{Result, StorageError};
use crate::storage_dir;
use formats::{ClientFeatures, SPRITE_DATA_SIZE, SPRITE_SIZE, VersionRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

impl Settings {
    pub fn path() -> PathBuf {
        storage_dir().join("settings.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Reads settings from `path`. A missing file is created with defaults;
    /// an unreadable one is reported and replaced by defaults in memory only.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Settings>(&content) {
                    Ok(s) => {
                        info!("Loaded settings from {:?}", path);
                        s
                    }
                    Err(e) => {
                        error!("Failed to parse {:?}: {}", path, e);
                        Settings::default()
                    }
                },
                Err(e) => {
                    error!("Failed to read {:?}: {}", path, e);
                    Settings::default()
                }
            }
        } else {
            info!("Creating default settings at {:?}", path);
            let default_settings = Settings::default();
            if let Err(e) = default_settings.save_to(path) {
                error!("{}", e);
            }
            default_settings
        }
    }

    pub fn save(&self) {
        let path = Self::path();
        match self.save_to(&path) {
            Ok(()) => info!("Saved settings to {:?}", path),
            Err(e) => error!("{}", e),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StorageError::Settings(format!("failed to serialize settings: {e}")))?;
        fs::write(path, content).map_err(|e| {
            StorageError::Settings(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn registry(&self) -> VersionRegistry {
        VersionRegistry::new(self.versions.clone())
    }
}

impl ClientInfo {
    pub const EXTENSION: &'static str = "otfi";

    pub fn from_features(features: ClientFeatures) -> Self {
        Self {
            extended: features.extended,
            transparency: features.transparency,
            frame_durations: features.frame_durations,
            frame_groups: features.frame_groups,
            metadata_file: None,
            sprites_file: None,
            sprite_size: SPRITE_SIZE as u32,
            sprite_data_size: SPRITE_DATA_SIZE as u32,
        }
    }

    pub fn features(&self) -> ClientFeatures {
        ClientFeatures::new(
            self.extended,
            self.transparency,
            self.frame_durations,
            self.frame_groups,
        )
    }

    /// Sidecar location for a metadata file: same stem, `.otfi` extension.
    pub fn sidecar_path(metadata_path: &Path) -> PathBuf {
        metadata_path.with_extension(Self::EXTENSION)
    }

    /// `Ok(None)` when there is no sidecar file.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let info = toml::from_str(&content).map_err(|e| {
            StorageError::Settings(format!("failed to parse {}: {e}", path.display()))
        })?;
        info!("Loaded client info from {:?}", path);
        Ok(Some(info))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StorageError::Settings(format!("failed to serialize client info: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Flags for a metadata file: the sidecar when there is one, otherwise
    /// what a stock client of `version` uses.
    pub fn resolve_features(metadata_path: &Path, version: u32) -> Result<ClientFeatures> {
        Ok(Self::load(&Self::sidecar_path(metadata_path))?
            .map(|info| info.features())
            .unwrap_or_else(|| ClientFeatures::for_version(version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let created = Settings::load_from(&path);
        assert!(path.exists());
        assert_eq!(created, Settings::default());

        let mut settings = created;
        settings.durations.effect = 75;
        settings.optimize_before_merge = true;
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn broken_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "durations = 12").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "optimize_before_merge = true\n[durations]\noutfit = 250\n").unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.optimize_before_merge);
        assert_eq!(settings.durations.outfit, 250);
        assert_eq!(settings.durations.item, 500);
        assert!(!settings.versions.is_empty());
    }

    #[test]
    fn sidecar_uses_kebab_case_keys() {
        let info = ClientInfo::from_features(ClientFeatures::new(true, false, true, false));
        let text = toml::to_string_pretty(&info).unwrap();
        assert!(text.contains("frame-durations = true"));
        assert!(text.contains("sprite-data-size = 4096"));
        assert!(!text.contains("metadata-file"));
    }

    #[test]
    fn sidecar_overrides_version_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let dat = dir.path().join("Tibia.dat");
        assert_eq!(
            ClientInfo::resolve_features(&dat, 1098).unwrap(),
            ClientFeatures::for_version(1098)
        );

        let info = ClientInfo::from_features(ClientFeatures::new(false, true, false, false));
        info.save(&ClientInfo::sidecar_path(&dat)).unwrap();
        assert_eq!(
            ClientInfo::resolve_features(&dat, 1098).unwrap(),
            ClientFeatures::new(false, true, false, false)
        );
    }
}
