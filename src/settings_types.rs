use formats::{ClientFeatures, DefaultDurations, Version, VersionRegistry};

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Frame duration in milliseconds given to animations that carry none.
    pub durations: DefaultDurations,
    pub optimize_before_merge: bool,
    pub versions: Vec<Version>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            durations: DefaultDurations::default(),
            optimize_before_merge: false,
            versions: VersionRegistry::builtin().versions().to_vec(),
        }
    }
}

/// Sidecar descriptor stored next to a metadata file.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientInfo {
    pub extended: bool,
    pub transparency: bool,
    pub frame_durations: bool,
    pub frame_groups: bool,
    pub metadata_file: Option<String>,
    pub sprites_file: Option<String>,
    pub sprite_size: u32,
    pub sprite_data_size: u32,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::from_features(ClientFeatures::default())
    }
}
