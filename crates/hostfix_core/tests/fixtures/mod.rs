#![allow(dead_code)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use hostfix_core::codec::TreeCodec;
use hostfix_core::{CoreError, CoreErrorCode};
use serde_json::{Value, json};

pub const PLACEHOLDER: &str = "00000000-0000-0000-0000-000000000001";
pub const ZERO: &str = "00000000-0000-0000-0000-000000000000";
pub const HOST_INSTANCE: &str = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
pub const OTHER_INSTANCE: &str = "cccccccc-cccc-cccc-cccc-cccccccccccc";
pub const OTHER_PLAYER: &str = "dddddddd-dddd-dddd-dddd-dddddddddddd";
pub const TARGET: &str = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
pub const TARGET_COMPACT: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

fn guid_struct(guid: &str) -> Value {
    json!({
        "Struct": {
            "value": { "Guid": guid },
            "struct_type": "Guid",
            "struct_id": ZERO
        }
    })
}

pub fn player_json(player_uid: &str, instance_id: &str) -> Value {
    json!({
        "header": {
            "magic": 1396790855,
            "save_game_version": 3,
            "package_version": 522
        },
        "root": {
            "save_game_type": "/Script/Pal.PalWorldPlayerSaveGame",
            "properties": {
                "Version": { "Int": { "value": 0 } },
                "SaveData": {
                    "Struct": {
                        "value": {
                            "Struct": {
                                "PlayerUId": guid_struct(player_uid),
                                "IndividualId": {
                                    "Struct": {
                                        "value": {
                                            "Struct": {
                                                "PlayerUId": guid_struct(player_uid),
                                                "InstanceId": guid_struct(instance_id)
                                            }
                                        },
                                        "struct_type": { "Struct": "PalInstanceID" },
                                        "struct_id": ZERO
                                    }
                                },
                                "LastJumpedLocation": {
                                    "Struct": {
                                        "value": { "Vector": { "x": 1.5, "y": -20.25, "z": 3.0e2 } },
                                        "struct_type": "Vector",
                                        "struct_id": ZERO
                                    }
                                }
                            }
                        },
                        "struct_type": { "Struct": "PalPlayerSaveData" },
                        "struct_id": ZERO
                    }
                }
            }
        },
        "extra": [0, 0, 0, 0]
    })
}

pub fn character_entry(player_uid: &str, instance_id: &str, nickname: &str) -> Value {
    json!({
        "key": {
            "Struct": {
                "Struct": {
                    "PlayerUId": guid_struct(player_uid),
                    "InstanceId": guid_struct(instance_id),
                    "DebugName": { "Str": { "value": "" } }
                }
            }
        },
        "value": {
            "Struct": {
                "Struct": {
                    "RawData": {
                        "Array": {
                            "array_type": "ByteProperty",
                            "value": { "Base": { "Byte": { "Byte": [1, 2, 3] } } }
                        }
                    },
                    "NickName": { "Str": { "value": nickname } }
                }
            }
        }
    })
}

pub fn world_json(entries: Vec<Value>) -> Value {
    json!({
        "header": { "magic": 1396790855, "save_game_version": 3 },
        "root": {
            "save_game_type": "/Script/Pal.PalWorldSaveGame",
            "properties": {
                "worldSaveData": {
                    "Struct": {
                        "value": {
                            "Struct": {
                                "CharacterSaveParameterMap": {
                                    "Map": {
                                        "key_type": { "Struct": "StructProperty" },
                                        "value_type": { "Struct": "StructProperty" },
                                        "value": entries
                                    }
                                },
                                "GroupSaveDataMap": {
                                    "Map": {
                                        "key_type": { "Struct": "StructProperty" },
                                        "value_type": { "Struct": "StructProperty" },
                                        "value": [
                                            { "key": { "Struct": { "Guid": PLACEHOLDER } }, "value": { "Int": { "value": 7 } } }
                                        ]
                                    }
                                }
                            }
                        },
                        "struct_type": { "Struct": "PalWorldSaveData" },
                        "struct_id": ZERO
                    }
                }
            }
        },
        "extra": [0, 0, 0, 0]
    })
}

/// World with the host's character plus one other player's character.
pub fn world_with_host() -> Value {
    world_json(vec![
        character_entry(OTHER_PLAYER, OTHER_INSTANCE, "Guest"),
        character_entry(PLACEHOLDER, HOST_INSTANCE, "Host"),
    ])
}

pub fn at<'a>(value: &'a Value, keys: &[&str]) -> &'a Value {
    keys.iter().fold(value, |v, k| &v[*k])
}

pub fn player_uid(player: &Value) -> &str {
    at(
        player,
        &["root", "properties", "SaveData", "Struct", "value", "Struct", "PlayerUId", "Struct", "value", "Guid"],
    )
    .as_str()
    .expect("player uid should be a string")
}

pub fn individual_field<'a>(player: &'a Value, field: &str) -> &'a str {
    at(
        player,
        &[
            "root", "properties", "SaveData", "Struct", "value", "Struct", "IndividualId", "Struct",
            "value", "Struct", field, "Struct", "value", "Guid",
        ],
    )
    .as_str()
    .expect("individual id field should be a string")
}

pub fn world_entries(world: &Value) -> &Vec<Value> {
    at(
        world,
        &[
            "root", "properties", "worldSaveData", "Struct", "value", "Struct",
            "CharacterSaveParameterMap", "Map", "value",
        ],
    )
    .as_array()
    .expect("character map should be an array")
}

pub fn entry_key_field(entry: &Value, field: &str) -> String {
    at(entry, &["key", "Struct", "Struct", field, "Struct", "value", "Guid"])
        .as_str()
        .expect("key field should be a string")
        .to_string()
}

/// Stands in for the external codec: the raw payload is the tree text itself.
#[derive(Default)]
pub struct JsonBytesCodec {
    pub fail_import: bool,
    pub hints_seen: RefCell<Vec<Vec<String>>>,
}

impl TreeCodec for JsonBytesCodec {
    fn to_tree(&self, raw: &[u8], type_hints: &[String]) -> Result<String, CoreError> {
        self.hints_seen.borrow_mut().push(type_hints.to_vec());
        String::from_utf8(raw.to_vec())
            .map_err(|e| CoreError::new(CoreErrorCode::ExternalCodecFailure, e.to_string()))
    }

    fn from_tree(&self, tree_text: &str) -> Result<Vec<u8>, CoreError> {
        if self.fail_import {
            return Err(CoreError::new(
                CoreErrorCode::ExternalCodecFailure,
                "from-json failed (exit status: 1)",
            ));
        }
        Ok(tree_text.as_bytes().to_vec())
    }
}

pub fn pretty(value: &Value) -> Vec<u8> {
    serde_json::to_string_pretty(value)
        .expect("fixture should render")
        .into_bytes()
}

pub fn temp_test_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "host_fix_{}_{}_{}",
        prefix,
        std::process::id(),
        nanos
    ))
}
