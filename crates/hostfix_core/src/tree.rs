//! In-memory property tree for one save document.
//!
//! The external codec renders a save as JSON where every property is wrapped in
//! its type tag (`{"Struct": {"value": ...}}`, `{"Map": {"value": [...]}}`).
//! This module keeps that shape intact and only gives names to the parts the
//! migration needs: structs, map entries, arrays, GUIDs and everything else as
//! opaque scalars. Converting back emits the same JSON value that was read.

use std::fmt;
use std::str::FromStr;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreErrorCode};
use crate::guid::Guid;

const MAP_WRAPPER: &str = "Map";
const MAP_BODY_ENTRIES: &str = "value";
const ENTRY_KEY: &str = "key";
const ENTRY_VALUE: &str = "value";
const STRUCT_TYPE_FIELD: &str = "struct_type";

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyNode {
    Struct { fields: Vec<(String, PropertyNode)> },
    Map { entries: Vec<MapEntry> },
    Array(Vec<PropertyNode>),
    Identifier(Guid),
    Scalar(JsonValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: PropertyNode,
    pub value: PropertyNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Field(String),
    Index(usize),
    MapKey(usize),
    MapValue(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::MapKey(i) => write!(f, "{{key:{i}}}"),
            Self::MapValue(i) => write!(f, "{{value:{i}}}"),
        }
    }
}

/// A sequence of steps from some node down into its descendants.
///
/// Text form is dot separated: `a.b[2]` is not valid, write `a.b.[2]`.
/// `{key:N}` and `{value:N}` pick a side of map entry `N`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    steps: Vec<PathStep>,
}

impl PropertyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.steps.push(PathStep::Index(index));
        self
    }

    pub fn map_key(mut self, index: usize) -> Self {
        self.steps.push(PathStep::MapKey(index));
        self
    }

    pub fn map_value(mut self, index: usize) -> Self {
        self.steps.push(PathStep::MapValue(index));
        self
    }

    pub fn join(&self, tail: &PropertyPath) -> Self {
        let mut steps = self.steps.clone();
        steps.extend(tail.steps.iter().cloned());
        Self { steps }
    }

    fn prefix(&self, len: usize) -> Self {
        Self {
            steps: self.steps[..len].to_vec(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("<root>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for PropertyPath {
    type Err = CoreError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.strip_prefix('.').unwrap_or(text);
        if text.is_empty() {
            return Ok(Self::root());
        }

        let mut path = Self::root();
        for segment in text.split('.') {
            path.steps.push(parse_step(segment).ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::InvalidConfig,
                    format!("invalid path segment '{segment}' in '{text}'"),
                )
            })?);
        }
        Ok(path)
    }
}

fn parse_step(segment: &str) -> Option<PathStep> {
    if segment.is_empty() {
        return None;
    }
    if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return inner.parse().ok().map(PathStep::Index);
    }
    if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let (side, index) = inner.split_once(':')?;
        let index = index.parse().ok()?;
        return match side {
            ENTRY_KEY => Some(PathStep::MapKey(index)),
            ENTRY_VALUE => Some(PathStep::MapValue(index)),
            _ => None,
        };
    }
    if segment.contains(['[', ']', '{', '}']) {
        return None;
    }
    Some(PathStep::Field(segment.to_string()))
}

impl PropertyNode {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Struct { .. } => "struct",
            Self::Map { .. } => "map",
            Self::Array(_) => "array",
            Self::Identifier(_) => "identifier",
            Self::Scalar(_) => "scalar",
        }
    }

    /// The `struct_type` recorded next to a struct's fields, when it is a plain name.
    pub fn type_name(&self) -> Option<&str> {
        match self.field(STRUCT_TYPE_FIELD)? {
            Self::Scalar(JsonValue::String(name)) => Some(name),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&PropertyNode> {
        match self {
            Self::Struct { fields } => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn get(&self, path: &PropertyPath) -> Result<&PropertyNode, CoreError> {
        let mut node = self;
        for (depth, step) in path.steps.iter().enumerate() {
            node = node
                .child(step)
                .map_err(|miss| miss.into_error(path, depth))?;
        }
        Ok(node)
    }

    pub fn get_mut(&mut self, path: &PropertyPath) -> Result<&mut PropertyNode, CoreError> {
        let mut node = self;
        for (depth, step) in path.steps.iter().enumerate() {
            node = node
                .child_mut(step)
                .map_err(|miss| miss.into_error(path, depth))?;
        }
        Ok(node)
    }

    pub fn identifier(&self, path: &PropertyPath) -> Result<&Guid, CoreError> {
        match self.get(path)? {
            Self::Identifier(guid) => Ok(guid),
            other => Err(type_mismatch(path, "identifier", other)),
        }
    }

    /// Overwrites the GUID at `path`, returning the value it replaced.
    pub fn set_identifier(&mut self, path: &PropertyPath, guid: Guid) -> Result<Guid, CoreError> {
        match self.get_mut(path)? {
            Self::Identifier(current) => Ok(std::mem::replace(current, guid)),
            other => Err(type_mismatch(path, "identifier", other)),
        }
    }

    pub fn map_length(&self, path: &PropertyPath) -> Result<usize, CoreError> {
        match self.get(path)? {
            Self::Map { entries } => Ok(entries.len()),
            other => Err(type_mismatch(path, "map", other)),
        }
    }

    pub fn map_entry_key(
        &self,
        path: &PropertyPath,
        index: usize,
    ) -> Result<&PropertyNode, CoreError> {
        self.get(&path.clone().map_key(index))
    }

    fn child(&self, step: &PathStep) -> Result<&PropertyNode, Miss> {
        match (step, self) {
            (PathStep::Field(name), Self::Struct { fields }) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or(Miss::Absent),
            (PathStep::Index(i), Self::Array(items)) => items.get(*i).ok_or(Miss::Absent),
            (PathStep::MapKey(i), Self::Map { entries }) => {
                entries.get(*i).map(|e| &e.key).ok_or(Miss::Absent)
            }
            (PathStep::MapValue(i), Self::Map { entries }) => {
                entries.get(*i).map(|e| &e.value).ok_or(Miss::Absent)
            }
            _ => Err(Miss::WrongKind(self.kind())),
        }
    }

    fn child_mut(&mut self, step: &PathStep) -> Result<&mut PropertyNode, Miss> {
        let kind = self.kind();
        match (step, self) {
            (PathStep::Field(name), Self::Struct { fields }) => fields
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or(Miss::Absent),
            (PathStep::Index(i), Self::Array(items)) => items.get_mut(*i).ok_or(Miss::Absent),
            (PathStep::MapKey(i), Self::Map { entries }) => {
                entries.get_mut(*i).map(|e| &mut e.key).ok_or(Miss::Absent)
            }
            (PathStep::MapValue(i), Self::Map { entries }) => {
                entries.get_mut(*i).map(|e| &mut e.value).ok_or(Miss::Absent)
            }
            _ => Err(Miss::WrongKind(kind)),
        }
    }

    pub fn from_json(value: JsonValue) -> Self {
        decode(value, false)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Struct { fields } => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_json()))
                    .collect(),
            ),
            Self::Map { entries } => JsonValue::Array(
                entries
                    .iter()
                    .map(|entry| {
                        let mut obj = serde_json::Map::new();
                        obj.insert(ENTRY_KEY.to_string(), entry.key.to_json());
                        obj.insert(ENTRY_VALUE.to_string(), entry.value.to_json());
                        JsonValue::Object(obj)
                    })
                    .collect(),
            ),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Identifier(guid) => JsonValue::String(guid.as_str().to_string()),
            Self::Scalar(value) => value.clone(),
        }
    }
}

enum Miss {
    Absent,
    WrongKind(&'static str),
}

impl Miss {
    fn into_error(self, path: &PropertyPath, depth: usize) -> CoreError {
        let step = &path.steps[depth];
        let at = path.prefix(depth);
        match self {
            Miss::Absent => CoreError::new(
                CoreErrorCode::PathNotFound,
                format!("'{step}' not found under '{at}' (path '{path}')"),
            ),
            Miss::WrongKind(kind) => CoreError::new(
                CoreErrorCode::TypeMismatch,
                format!("cannot take '{step}' of {kind} at '{at}' (path '{path}')"),
            ),
        }
    }
}

fn type_mismatch(path: &PropertyPath, expected: &str, found: &PropertyNode) -> CoreError {
    CoreError::new(
        CoreErrorCode::TypeMismatch,
        format!("expected {expected} at '{path}', found {}", found.kind()),
    )
}

fn decode(value: JsonValue, map_body: bool) -> PropertyNode {
    match value {
        JsonValue::Object(obj) => PropertyNode::Struct {
            fields: obj
                .into_iter()
                .map(|(name, child)| {
                    let node = if map_body && name == MAP_BODY_ENTRIES {
                        decode_map_entries(child)
                    } else {
                        decode(child, name == MAP_WRAPPER)
                    };
                    (name, node)
                })
                .collect(),
        },
        JsonValue::Array(items) => {
            PropertyNode::Array(items.into_iter().map(|v| decode(v, false)).collect())
        }
        JsonValue::String(text) => match Guid::parse_canonical(&text) {
            Some(guid) => PropertyNode::Identifier(guid),
            None => PropertyNode::Scalar(JsonValue::String(text)),
        },
        other => PropertyNode::Scalar(other),
    }
}

fn decode_map_entries(value: JsonValue) -> PropertyNode {
    let JsonValue::Array(items) = value else {
        return decode(value, false);
    };
    if !items.iter().all(is_entry_object) {
        return decode(JsonValue::Array(items), false);
    }

    let entries = items
        .into_iter()
        .filter_map(|item| match item {
            JsonValue::Object(obj) => {
                let mut sides = obj.into_iter().map(|(_, v)| decode(v, false));
                Some(MapEntry {
                    key: sides.next()?,
                    value: sides.next()?,
                })
            }
            _ => None,
        })
        .collect();
    PropertyNode::Map { entries }
}

/// Only `{"key": .., "value": ..}` in that order is treated as an entry, so
/// re-emitting the entry reproduces the same text.
fn is_entry_object(item: &JsonValue) -> bool {
    let JsonValue::Object(obj) = item else {
        return false;
    };
    let mut names = obj.keys();
    obj.len() == 2
        && names.next().map(String::as_str) == Some(ENTRY_KEY)
        && names.next().map(String::as_str) == Some(ENTRY_VALUE)
}

impl Serialize for PropertyNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Struct { fields } => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, node) in fields {
                    map.serialize_entry(name, node)?;
                }
                map.end()
            }
            Self::Map { entries } => {
                let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                for entry in entries {
                    seq.serialize_element(entry)?;
                }
                seq.end()
            }
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Identifier(guid) => serializer.serialize_str(guid.as_str()),
            Self::Scalar(value) => value.serialize(serializer),
        }
    }
}

impl Serialize for MapEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(ENTRY_KEY, &self.key)?;
        map.serialize_entry(ENTRY_VALUE, &self.value)?;
        map.end()
    }
}

/// One save document, owned exclusively for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTree {
    root: PropertyNode,
}

impl PropertyTree {
    pub fn new(root: PropertyNode) -> Self {
        Self { root }
    }

    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: JsonValue = serde_json::from_str(text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::TreeParse,
                format!("tree text is not valid JSON: {e}"),
            )
        })?;
        Ok(Self::from_json_value(value))
    }

    pub fn from_json_value(value: JsonValue) -> Self {
        Self {
            root: PropertyNode::from_json(value),
        }
    }

    pub fn to_json_value(&self) -> JsonValue {
        self.root.to_json()
    }

    pub fn to_json_string(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.root).map_err(|e| {
            CoreError::new(
                CoreErrorCode::TreeParse,
                format!("failed to render tree text: {e}"),
            )
        })
    }

    pub fn root(&self) -> &PropertyNode {
        &self.root
    }

    pub fn get(&self, path: &PropertyPath) -> Result<&PropertyNode, CoreError> {
        self.root.get(path)
    }

    pub fn identifier(&self, path: &PropertyPath) -> Result<&Guid, CoreError> {
        self.root.identifier(path)
    }

    pub fn set_identifier(&mut self, path: &PropertyPath, guid: Guid) -> Result<Guid, CoreError> {
        self.root.set_identifier(path, guid)
    }

    pub fn map_length(&self, path: &PropertyPath) -> Result<usize, CoreError> {
        self.root.map_length(path)
    }

    pub fn map_entry_key(
        &self,
        path: &PropertyPath,
        index: usize,
    ) -> Result<&PropertyNode, CoreError> {
        self.root.map_entry_key(path, index)
    }
}
