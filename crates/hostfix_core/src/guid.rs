use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreErrorCode};

const GROUP_ENDS: [usize; 4] = [8, 12, 16, 20];
const CANONICAL_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// A GUID in its textual 8-4-4-4-12 form.
///
/// Values recognized inside a property tree are always canonical (lowercase,
/// hyphenated, 36 chars). A host identity supplied on the command line may be
/// shorter or longer than 32 hex digits; it is grouped the same way and kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(String);

impl Guid {
    /// Player id the dedicated server assigns to whoever hosted the co-op world.
    pub const PLACEHOLDER_COMPACT: &'static str = "00000000000000000000000000000001";

    pub fn placeholder() -> Self {
        Self("00000000-0000-0000-0000-000000000001".to_string())
    }

    pub fn parse_canonical(text: &str) -> Option<Self> {
        if text.len() != CANONICAL_LEN {
            return None;
        }
        let ok = text.bytes().enumerate().all(|(i, b)| {
            if HYPHEN_POSITIONS.contains(&i) {
                b == b'-'
            } else {
                b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
            }
        });
        ok.then(|| Self(text.to_string()))
    }

    /// Groups a compact hex id as 8-4-4-4-rest and lowercases it.
    pub fn from_compact(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::new(
                CoreErrorCode::InvalidIdentity,
                format!("'{raw}' is not a hexadecimal player id"),
            ));
        }
        if raw.len() != 32 {
            log::warn!("host guid '{raw}' is not of length 32");
        }

        let mut groups = Vec::with_capacity(GROUP_ENDS.len() + 1);
        let mut start = 0;
        for end in GROUP_ENDS {
            let end = end.min(raw.len());
            groups.push(&raw[start..end]);
            start = end;
        }
        groups.push(&raw[start..]);
        Ok(Self(groups.join("-").to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_canonical(&self) -> bool {
        Self::parse_canonical(&self.0).is_some()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The host's real player id, as typed by the user and as written into saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    raw: String,
    guid: Guid,
}

impl HostIdentity {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        Ok(Self {
            raw: raw.to_string(),
            guid: Guid::from_compact(raw)?,
        })
    }

    /// The id as given, used to name the host's player save file.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    pub fn has_standard_length(&self) -> bool {
        self.raw.len() == 32
    }
}

#[cfg(test)]
mod tests {
    use super::{Guid, HostIdentity};

    #[test]
    fn formats_compact_id_as_lowercase_groups() {
        let guid = Guid::from_compact("8E910AC2000000000000000000000000").expect("valid id");
        assert_eq!(guid.as_str(), "8e910ac2-0000-0000-0000-000000000000");
        assert!(guid.is_canonical());
    }

    #[test]
    fn short_id_is_grouped_without_failing() {
        let guid = Guid::from_compact("ABCDEF0123").expect("short ids are tolerated");
        assert_eq!(guid.as_str(), "abcdef01-23---");
        assert!(!guid.is_canonical());
    }

    #[test]
    fn rejects_non_hex_ids() {
        assert!(Guid::from_compact("../../etc/passwd").is_err());
        assert!(Guid::from_compact("").is_err());
    }

    #[test]
    fn canonical_parse_is_strict() {
        assert!(Guid::parse_canonical("00000000-0000-0000-0000-000000000001").is_some());
        assert!(Guid::parse_canonical("00000000-0000-0000-0000-00000000000A").is_none());
        assert!(Guid::parse_canonical("000000000000-0000-0000-000000000001").is_none());
        assert!(Guid::parse_canonical("PlayerUId").is_none());
    }

    #[test]
    fn placeholder_matches_compact_form() {
        assert_eq!(
            Guid::from_compact(Guid::PLACEHOLDER_COMPACT).expect("placeholder"),
            Guid::placeholder()
        );
    }

    #[test]
    fn host_identity_keeps_raw_text_for_file_names() {
        let host = HostIdentity::parse(" 8E910AC2000000000000000000000000 ").expect("valid");
        assert_eq!(host.raw(), "8E910AC2000000000000000000000000");
        assert!(host.has_standard_length());
        assert_eq!(host.guid().as_str(), "8e910ac2-0000-0000-0000-000000000000");
    }
}
