use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::{CoreError, CoreErrorCode};
use crate::migrate::FieldPaths;

/// Map keys the codec cannot infer on its own; each is a struct-keyed map.
pub const DEFAULT_TYPE_HINTS: [&str; 6] = [
    ".worldSaveData.CharacterSaveParameterMap.Key=Struct",
    ".worldSaveData.FoliageGridSaveDataMap.Key=Struct",
    ".worldSaveData.FoliageGridSaveDataMap.ModelMap.InstanceDataMap.Key=Struct",
    ".worldSaveData.MapObjectSpawnerInStageSaveData.Key=Struct",
    ".worldSaveData.ItemContainerSaveData.Key=Struct",
    ".worldSaveData.CharacterContainerSaveData.Key=Struct",
];

pub const DEFAULT_SCRATCH_DIR_NAME: &str = ".host-fix-scratch";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    pub type_hints: Vec<String>,
    pub paths: FieldPathsConfig,
    pub scratch_dir_name: String,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            type_hints: DEFAULT_TYPE_HINTS.iter().map(|s| s.to_string()).collect(),
            paths: FieldPathsConfig::default(),
            scratch_dir_name: DEFAULT_SCRATCH_DIR_NAME.to_string(),
        }
    }
}

impl FixConfig {
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            CoreError::new(CoreErrorCode::InvalidConfig, format!("invalid config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_scratch_dir_name(&self.scratch_dir_name)?;
        self.field_paths()?;
        Ok(())
    }

    pub fn field_paths(&self) -> Result<FieldPaths, CoreError> {
        FieldPaths::from_config(&self.paths)
    }
}

/// The scratch dir is removed after a run, so it must be a single plain
/// directory name inside the save dir.
fn validate_scratch_dir_name(name: &str) -> Result<(), CoreError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(CoreError::new(
            CoreErrorCode::InvalidConfig,
            format!("scratch_dir_name '{name}' must be a single directory name"),
        )),
    }
}

/// Field paths in dotted text form. Map-key paths are relative to one key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldPathsConfig {
    pub player_uid: String,
    pub individual_player_uid: String,
    pub individual_instance_id: String,
    pub character_map: String,
    pub key_instance_id: String,
    pub key_player_uid: String,
}

impl Default for FieldPathsConfig {
    fn default() -> Self {
        Self {
            player_uid: "root.properties.SaveData.Struct.value.Struct.PlayerUId.Struct.value.Guid"
                .to_string(),
            individual_player_uid: "root.properties.SaveData.Struct.value.Struct.IndividualId.Struct.value.Struct.PlayerUId.Struct.value.Guid"
                .to_string(),
            individual_instance_id: "root.properties.SaveData.Struct.value.Struct.IndividualId.Struct.value.Struct.InstanceId.Struct.value.Guid"
                .to_string(),
            character_map: "root.properties.worldSaveData.Struct.value.Struct.CharacterSaveParameterMap.Map.value"
                .to_string(),
            key_instance_id: "Struct.Struct.InstanceId.Struct.value.Guid".to_string(),
            key_player_uid: "Struct.Struct.PlayerUId.Struct.value.Guid".to_string(),
        }
    }
}
