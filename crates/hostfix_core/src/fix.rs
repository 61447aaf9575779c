use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{SCRATCH_FILE_NAMES, TreeCodec};
use crate::config::FixConfig;
use crate::container::{self, SaveType};
use crate::error::{CoreError, CoreErrorCode};
use crate::guid::{Guid, HostIdentity};
use crate::migrate::{MigrationReport, Migrator};
use crate::tree::PropertyTree;

pub const LEVEL_SAVE_NAME: &str = "Level.sav";
pub const PLAYERS_DIR_NAME: &str = "Players";
pub const SAVE_EXTENSION: &str = "sav";

/// Files of one dedicated-server world involved in the fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveLayout {
    pub save_dir: PathBuf,
    pub level_save: PathBuf,
    /// Player save the server wrote for the former co-op host.
    pub host_save: PathBuf,
    /// Player save the host got when joining the server; replaced by the fixed save.
    pub target_save: PathBuf,
}

impl SaveLayout {
    pub fn new(save_dir: &Path, host: &HostIdentity) -> Self {
        let players = save_dir.join(PLAYERS_DIR_NAME);
        Self {
            save_dir: save_dir.to_path_buf(),
            level_save: save_dir.join(LEVEL_SAVE_NAME),
            host_save: players
                .join(Guid::PLACEHOLDER_COMPACT)
                .with_extension(SAVE_EXTENSION),
            target_save: players.join(host.raw()).with_extension(SAVE_EXTENSION),
        }
    }

    pub fn locate(save_dir: &Path, host: &HostIdentity) -> Result<Self, CoreError> {
        if host.raw().eq_ignore_ascii_case(Guid::PLACEHOLDER_COMPACT) {
            return Err(CoreError::new(
                CoreErrorCode::PathArgumentInvalid,
                "host guid is the placeholder id itself; pass the host's own player id",
            ));
        }
        if !save_dir.is_dir() {
            return Err(CoreError::new(
                CoreErrorCode::PathArgumentInvalid,
                format!(
                    "save path {} does not exist; did you enter the correct path to your save folder?",
                    save_dir.display()
                ),
            ));
        }

        let layout = Self::new(save_dir, host);
        for (what, path) in [
            ("world save", &layout.level_save),
            ("placeholder player save", &layout.host_save),
        ] {
            if !path.is_file() {
                return Err(CoreError::new(
                    CoreErrorCode::PathArgumentInvalid,
                    format!("{what} {} does not exist", path.display()),
                ));
            }
        }
        if !layout.target_save.is_file() {
            return Err(CoreError::new(
                CoreErrorCode::PathArgumentInvalid,
                format!(
                    "the host's player save {} does not exist; the host must join the server and create a character first",
                    layout.target_save.display()
                ),
            ));
        }
        Ok(layout)
    }

    pub fn scratch_dir(&self, config: &FixConfig) -> PathBuf {
        self.save_dir.join(&config.scratch_dir_name)
    }
}

/// The codec must be given as the executable itself, not its directory.
pub fn validate_codec_path(path: &Path) -> Result<(), CoreError> {
    if path.is_file() {
        return Ok(());
    }
    Err(CoreError::new(
        CoreErrorCode::PathArgumentInvalid,
        format!(
            "uesave path {} is invalid; it must point directly to the executable",
            path.display()
        ),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    World,
    Player,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::World => f.write_str("world save"),
            Self::Player => f.write_str("player save"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoded(Document, SaveType),
    TreesExported,
    TreesParsed,
    Migrated,
    TreesImported,
    SavesWritten,
    ScratchRemoved,
    Renamed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded(doc, save_type) => write!(f, "Decompressed {doc} ({save_type})"),
            Self::TreesExported => f.write_str("Converted save files to JSON"),
            Self::TreesParsed => f.write_str("JSON files have been parsed"),
            Self::Migrated => f.write_str("Changes have been made"),
            Self::TreesImported => f.write_str("Converted JSON files back to save files"),
            Self::SavesWritten => f.write_str("Save files have been written"),
            Self::ScratchRemoved => f.write_str("Miscellaneous files removed"),
            Self::Renamed => f.write_str("Fix has been applied! Have fun!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub world_save_type: SaveType,
    pub player_save_type: SaveType,
    pub migration: MigrationReport,
    pub output: PathBuf,
}

/// Migrated container bytes for both documents, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedSaves {
    pub world: Vec<u8>,
    pub player: Vec<u8>,
    pub world_save_type: SaveType,
    pub player_save_type: SaveType,
    pub migration: MigrationReport,
}

pub struct HostFix<C> {
    codec: C,
    config: FixConfig,
    migrator: Migrator,
}

impl<C: TreeCodec> HostFix<C> {
    pub fn new(codec: C, config: FixConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let migrator = Migrator::new(config.field_paths()?);
        Ok(Self {
            codec,
            config,
            migrator,
        })
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    /// Decodes, migrates and re-encodes both saves entirely in memory.
    pub fn migrate_containers(
        &self,
        world_bytes: &[u8],
        player_bytes: &[u8],
        target: &Guid,
        progress: &mut impl FnMut(Stage),
    ) -> Result<MigratedSaves, CoreError> {
        let (world_raw, world_save_type) =
            container::decode(world_bytes).map_err(|e| e.with_context(Document::World))?;
        progress(Stage::Decoded(Document::World, world_save_type));
        let (player_raw, player_save_type) =
            container::decode(player_bytes).map_err(|e| e.with_context(Document::Player))?;
        progress(Stage::Decoded(Document::Player, player_save_type));

        let world_text = self
            .codec
            .to_tree(&world_raw, &self.config.type_hints)
            .map_err(|e| e.with_context(Document::World))?;
        let player_text = self
            .codec
            .to_tree(&player_raw, &self.config.type_hints)
            .map_err(|e| e.with_context(Document::Player))?;
        progress(Stage::TreesExported);

        let mut world =
            PropertyTree::from_json_str(&world_text).map_err(|e| e.with_context(Document::World))?;
        let mut player = PropertyTree::from_json_str(&player_text)
            .map_err(|e| e.with_context(Document::Player))?;
        progress(Stage::TreesParsed);

        let migration = self.migrator.migrate(&mut player, &mut world, target)?;
        progress(Stage::Migrated);

        let world_raw = self
            .codec
            .from_tree(&world.to_json_string()?)
            .map_err(|e| e.with_context(Document::World))?;
        let player_raw = self
            .codec
            .from_tree(&player.to_json_string()?)
            .map_err(|e| e.with_context(Document::Player))?;
        progress(Stage::TreesImported);

        Ok(MigratedSaves {
            world: container::encode(&world_raw, world_save_type)
                .map_err(|e| e.with_context(Document::World))?,
            player: container::encode(&player_raw, player_save_type)
                .map_err(|e| e.with_context(Document::Player))?,
            world_save_type,
            player_save_type,
            migration,
        })
    }

    /// Applies the fix to the files of `layout`. Nothing is written until both
    /// documents have been migrated and re-encoded.
    pub fn run(
        &self,
        layout: &SaveLayout,
        host: &HostIdentity,
        mut progress: impl FnMut(Stage),
    ) -> Result<FixReport, CoreError> {
        let world_bytes = read_file(&layout.level_save)?;
        let player_bytes = read_file(&layout.host_save)?;

        let saves =
            self.migrate_containers(&world_bytes, &player_bytes, host.guid(), &mut progress)?;

        write_both([
            (layout.level_save.as_path(), saves.world.as_slice()),
            (layout.host_save.as_path(), saves.player.as_slice()),
        ])?;
        progress(Stage::SavesWritten);

        remove_scratch_dir(&layout.scratch_dir(&self.config));
        progress(Stage::ScratchRemoved);

        if layout.target_save.exists() {
            fs::remove_file(&layout.target_save).map_err(|e| {
                CoreError::io(
                    format_args!("failed to remove {}", layout.target_save.display()),
                    e,
                )
            })?;
        }
        rename_file(&layout.host_save, &layout.target_save)?;
        progress(Stage::Renamed);

        Ok(FixReport {
            world_save_type: saves.world_save_type,
            player_save_type: saves.player_save_type,
            migration: saves.migration,
            output: layout.target_save.clone(),
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CoreError> {
    fs::read(path).map_err(|e| CoreError::io(format_args!("failed to read {}", path.display()), e))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    fs::write(path, bytes)
        .map_err(|e| CoreError::io(format_args!("failed to write {}", path.display()), e))
}

fn rename_file(from: &Path, to: &Path) -> Result<(), CoreError> {
    fs::rename(from, to).map_err(|e| {
        CoreError::io(
            format_args!("failed to rename {} to {}", from.display(), to.display()),
            e,
        )
    })
}

/// Sibling path a save is staged under before it replaces the original.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Stages both saves next to their targets, then moves them into place.
/// A failed write removes whatever was staged and leaves the originals alone.
fn write_both(saves: [(&Path, &[u8]); 2]) -> Result<(), CoreError> {
    let mut staged = Vec::with_capacity(saves.len());
    for (path, bytes) in saves {
        let tmp = staging_path(path);
        if let Err(e) = write_file(&tmp, bytes) {
            for written in &staged {
                let _ = fs::remove_file(written);
            }
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        staged.push(tmp);
    }
    for ((path, _), tmp) in saves.iter().zip(&staged) {
        rename_file(tmp, path)?;
    }
    Ok(())
}

/// Removes the codec's files and then the dir itself, only if it is empty.
fn remove_scratch_dir(scratch: &Path) {
    if !scratch.is_dir() {
        return;
    }
    for name in SCRATCH_FILE_NAMES {
        let file = scratch.join(name);
        if file.is_file() {
            if let Err(e) = fs::remove_file(&file) {
                log::warn!("failed to remove {}: {e}", file.display());
            }
        }
    }
    if let Err(e) = fs::remove_dir(scratch) {
        log::warn!("failed to remove {}: {e}", scratch.display());
    }
}
