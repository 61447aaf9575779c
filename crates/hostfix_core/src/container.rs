use std::fmt;
use std::io::{Cursor, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreErrorCode};
use crate::reader::LittleEndianReader;

pub const MAGIC: [u8; 3] = *b"PlZ";
pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveType {
    Uncompressed,
    Zlib,
    DoubleZlib,
}

impl SaveType {
    pub const UNCOMPRESSED_RAW: u8 = 0x30;
    pub const ZLIB_RAW: u8 = 0x31;
    pub const DOUBLE_ZLIB_RAW: u8 = 0x32;

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            Self::UNCOMPRESSED_RAW => Some(Self::Uncompressed),
            Self::ZLIB_RAW => Some(Self::Zlib),
            Self::DOUBLE_ZLIB_RAW => Some(Self::DoubleZlib),
            _ => None,
        }
    }

    pub fn raw(&self) -> u8 {
        match *self {
            Self::Uncompressed => Self::UNCOMPRESSED_RAW,
            Self::Zlib => Self::ZLIB_RAW,
            Self::DoubleZlib => Self::DOUBLE_ZLIB_RAW,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Uncompressed => "uncompressed",
            Self::Zlib => "zlib",
            Self::DoubleZlib => "double zlib",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Uncompressed)
    }
}

impl fmt::Display for SaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.as_str(), self.raw())
    }
}

/// The fixed 12-byte prefix of every save container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub uncompressed_length: u32,
    /// For `Zlib` this is the stored payload length; for `DoubleZlib` it is the
    /// length of the intermediate layer after the outer inflate.
    pub compressed_length: u32,
    pub magic: [u8; 3],
    pub save_type: SaveType,
}

impl ContainerHeader {
    /// Parses and validates magic and save type. Does not reject unsupported
    /// save types so diagnostics can still report them.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::new(
                CoreErrorCode::FormatMismatch,
                format!(
                    "container is {} bytes, shorter than the {HEADER_LEN}-byte header",
                    bytes.len()
                ),
            ));
        }

        let mut r = LittleEndianReader::new(Cursor::new(bytes));
        let truncated =
            |e: std::io::Error| CoreError::new(CoreErrorCode::FormatMismatch, e.to_string());
        let uncompressed_length = r.read_u32().map_err(truncated)?;
        let compressed_length = r.read_u32().map_err(truncated)?;
        let magic = r.read_array::<3>().map_err(truncated)?;
        let raw_type = r.read_u8().map_err(truncated)?;

        if magic != MAGIC {
            return Err(CoreError::new(
                CoreErrorCode::FormatMismatch,
                format!(
                    "not a save container, found magic {:?} instead of {:?}",
                    String::from_utf8_lossy(&magic),
                    String::from_utf8_lossy(&MAGIC)
                ),
            ));
        }

        let save_type = SaveType::from_raw(raw_type).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::UnknownSaveType,
                format!("unknown save type 0x{raw_type:02x}"),
            )
        })?;

        Ok(Self {
            uncompressed_length,
            compressed_length,
            magic,
            save_type,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.uncompressed_length.to_le_bytes());
        out[4..8].copy_from_slice(&self.compressed_length.to_le_bytes());
        out[8..11].copy_from_slice(&self.magic);
        out[11] = self.save_type.raw();
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveContainer {
    pub header: ContainerHeader,
    /// Compressed bytes exactly as stored after the header.
    pub payload: Vec<u8>,
}

impl SaveContainer {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        let header = ContainerHeader::parse(bytes)?;
        if !header.save_type.is_supported() {
            return Err(unsupported(header.save_type));
        }
        Ok(Self {
            header,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    pub fn save_type(&self) -> SaveType {
        self.header.save_type
    }

    /// Inflates the payload, enforcing both declared lengths.
    pub fn decompress(&self) -> Result<Vec<u8>, CoreError> {
        let header = &self.header;
        let raw = match header.save_type {
            SaveType::Zlib => {
                if header.compressed_length as usize != self.payload.len() {
                    return Err(CoreError::new(
                        CoreErrorCode::LengthMismatch,
                        format!(
                            "incorrect compressed length: header says {}, payload is {} bytes",
                            header.compressed_length,
                            self.payload.len()
                        ),
                    ));
                }
                inflate(&self.payload, header.uncompressed_length, "payload")?
            }
            SaveType::DoubleZlib => {
                let outer = inflate(&self.payload, header.compressed_length, "outer layer")?;
                if header.compressed_length as usize != outer.len() {
                    return Err(CoreError::new(
                        CoreErrorCode::LengthMismatch,
                        format!(
                            "incorrect compressed length: header says {}, outer layer inflates to {}",
                            header.compressed_length,
                            inflated_size(outer.len(), header.compressed_length)
                        ),
                    ));
                }
                inflate(&outer, header.uncompressed_length, "inner layer")?
            }
            SaveType::Uncompressed => return Err(unsupported(header.save_type)),
        };

        if header.uncompressed_length as usize != raw.len() {
            return Err(CoreError::new(
                CoreErrorCode::UncompressedLengthMismatch,
                format!(
                    "incorrect uncompressed length: header says {}, payload inflates to {}",
                    header.uncompressed_length,
                    inflated_size(raw.len(), header.uncompressed_length)
                ),
            ));
        }

        log::debug!(
            "decoded {} container: {} stored bytes -> {} raw bytes",
            header.save_type,
            self.payload.len(),
            raw.len()
        );
        Ok(raw)
    }

    pub fn compress(raw: &[u8], save_type: SaveType) -> Result<Self, CoreError> {
        if !save_type.is_supported() {
            return Err(unsupported(save_type));
        }

        let once = deflate(raw)?;
        let compressed_length = length_field(once.len(), "compressed")?;
        let payload = match save_type {
            SaveType::DoubleZlib => deflate(&once)?,
            _ => once,
        };

        Ok(Self {
            header: ContainerHeader {
                uncompressed_length: length_field(raw.len(), "uncompressed")?,
                compressed_length,
                magic: MAGIC,
                save_type,
            },
            payload,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Decodes a container file into its raw payload and the save type it used.
pub fn decode(bytes: &[u8]) -> Result<(Vec<u8>, SaveType), CoreError> {
    let container = SaveContainer::parse(bytes)?;
    let raw = container.decompress()?;
    Ok((raw, container.save_type()))
}

/// Wraps a raw payload into container bytes using the given compression layering.
pub fn encode(raw: &[u8], save_type: SaveType) -> Result<Vec<u8>, CoreError> {
    Ok(SaveContainer::compress(raw, save_type)?.to_bytes())
}

fn unsupported(save_type: SaveType) -> CoreError {
    CoreError::new(
        CoreErrorCode::UnsupportedSaveType,
        format!("unhandled compression type {save_type}"),
    )
}

fn length_field(len: usize, what: &str) -> Result<u32, CoreError> {
    u32::try_from(len).map_err(|_| {
        CoreError::new(
            CoreErrorCode::LengthMismatch,
            format!("{what} length {len} does not fit the 32-bit header field"),
        )
    })
}

/// Inflates at most one byte past `declared`, enough to detect an overlong stream.
fn inflate(packed: &[u8], declared: u32, layer: &str) -> Result<Vec<u8>, CoreError> {
    let mut decoder = ZlibDecoder::new(packed).take(u64::from(declared) + 1);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| {
        CoreError::new(
            CoreErrorCode::CorruptPayload,
            format!("zlib decode of {layer} failed: {e}"),
        )
    })?;
    Ok(out)
}

fn inflated_size(len: usize, declared: u32) -> String {
    if len > declared as usize {
        format!("more than {declared} bytes")
    } else {
        format!("{len} bytes")
    }
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| CoreError::new(CoreErrorCode::Io, format!("zlib encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CoreError::new(CoreErrorCode::Io, format!("zlib encode failed: {e}")))
}
