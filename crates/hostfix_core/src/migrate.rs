use crate::config::FieldPathsConfig;
use crate::error::CoreError;
use crate::guid::Guid;
use crate::tree::{PropertyPath, PropertyTree};

/// Parsed locations of every identity field the migration touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPaths {
    pub player_uid: PropertyPath,
    pub individual_player_uid: PropertyPath,
    pub individual_instance_id: PropertyPath,
    pub character_map: PropertyPath,
    /// Relative to one character map key.
    pub key_instance_id: PropertyPath,
    /// Relative to one character map key.
    pub key_player_uid: PropertyPath,
}

impl FieldPaths {
    pub fn from_config(config: &FieldPathsConfig) -> Result<Self, CoreError> {
        Ok(Self {
            player_uid: config.player_uid.parse()?,
            individual_player_uid: config.individual_player_uid.parse()?,
            individual_instance_id: config.individual_instance_id.parse()?,
            character_map: config.character_map.parse()?,
            key_instance_id: config.key_instance_id.parse()?,
            key_player_uid: config.key_player_uid.parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub previous_player_uid: Guid,
    pub host_instance_id: Guid,
    /// Position of the host's character in the world map, if one matched.
    pub world_entry_index: Option<usize>,
    pub world_previous_player_uid: Option<Guid>,
}

#[derive(Debug, Clone)]
pub struct Migrator {
    paths: FieldPaths,
}

impl Migrator {
    pub fn new(paths: FieldPaths) -> Self {
        Self { paths }
    }

    /// Points both documents at `target` as the owner of the host character.
    ///
    /// Every path is resolved before the first write, so an error leaves both
    /// trees untouched.
    pub fn migrate(
        &self,
        player: &mut PropertyTree,
        world: &mut PropertyTree,
        target: &Guid,
    ) -> Result<MigrationReport, CoreError> {
        let paths = &self.paths;
        let previous_player_uid = player.identifier(&paths.player_uid)?.clone();
        player.identifier(&paths.individual_player_uid)?;
        let host_instance_id = player.identifier(&paths.individual_instance_id)?.clone();

        if previous_player_uid != Guid::placeholder() {
            log::warn!(
                "player save belongs to {previous_player_uid}, not the placeholder {}",
                Guid::placeholder()
            );
        }

        let world_entry_index = self.find_host_entry(world, &host_instance_id)?;
        let world_player_path = world_entry_index.map(|index| {
            paths
                .character_map
                .clone()
                .map_key(index)
                .join(&paths.key_player_uid)
        });
        if let Some(path) = &world_player_path {
            world.identifier(path)?;
        }

        player.set_identifier(&paths.player_uid, target.clone())?;
        player.set_identifier(&paths.individual_player_uid, target.clone())?;

        let world_previous_player_uid = match &world_player_path {
            Some(path) => Some(world.set_identifier(path, target.clone())?),
            None => {
                log::warn!(
                    "no character in the world save has instance id {host_instance_id}; world save left unchanged"
                );
                None
            }
        };

        Ok(MigrationReport {
            previous_player_uid,
            host_instance_id,
            world_entry_index,
            world_previous_player_uid,
        })
    }

    /// First map entry whose key carries `instance_id`, scanning in stored order.
    pub fn find_host_entry(
        &self,
        world: &PropertyTree,
        instance_id: &Guid,
    ) -> Result<Option<usize>, CoreError> {
        let map = &self.paths.character_map;
        let len = world.map_length(map)?;
        for index in 0..len {
            let key = world.map_entry_key(map, index)?;
            let key_instance_id = key
                .identifier(&self.paths.key_instance_id)
                .map_err(|e| e.with_context(format!("character map entry {index}")))?;
            if key_instance_id == instance_id {
                log::debug!("host character is world map entry {index} of {len}");
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}
