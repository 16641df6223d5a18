use super::error::SaveError;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// File type tag marking a versioned container ("SAVC").
///
/// Files written before the container format existed start directly with the
/// class name, so the first four bytes of a legacy file will not match this.
pub const FILE_TYPE_TAG: u32 = 0x5341_5643;

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

/// Engine build version recorded in the envelope header.
///
/// Passed through unparsed to the object deserializer so it can make its own
/// compatibility decisions; the container itself only stores and returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub changelist: u32,
    pub branch: String,
}

impl EngineVersion {
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch, changelist: 0, branch: String::new() }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.changelist != 0 {
            write!(f, "-{}", self.changelist)?;
        }
        if !self.branch.is_empty() {
            write!(f, "+{}", self.branch)?;
        }
        Ok(())
    }
}

impl FromStr for EngineVersion {
    type Err = String;

    /// Parses a "major.minor.patch" string, e.g. "4.8.0".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = |what: &str| -> Result<u16, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {} in engine version '{}'", what, s))?
                .parse::<u16>()
                .map_err(|_| format!("invalid {} in engine version '{}'", what, s))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(format!("trailing fields in engine version '{}'", s));
        }
        Ok(Self::new(major, minor, patch))
    }
}

/// Opaque version metadata carried alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Package format version of the writer, opaque to the container.
    pub package_version: u32,
    /// Engine build version of the writer.
    pub engine: EngineVersion,
}

/// A parsed save container.
///
/// The two variants are discriminated by the leading file type tag: buffers
/// that start with [`FILE_TYPE_TAG`] carry the full versioned header, anything
/// else is treated as a legacy file whose class name starts at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Versioned {
        format_version: u32,
        versions: VersionInfo,
        class_name: String,
        payload: Vec<u8>,
    },
    Legacy {
        class_name: String,
        payload: Vec<u8>,
    },
}

impl Envelope {
    pub fn class_name(&self) -> &str {
        match self {
            Envelope::Versioned { class_name, .. } => class_name,
            Envelope::Legacy { class_name, .. } => class_name,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Envelope::Versioned { payload, .. } => payload,
            Envelope::Legacy { payload, .. } => payload,
        }
    }

    /// Legacy files predate the version field and are assumed to be version 1.
    pub fn format_version(&self) -> u32 {
        match self {
            Envelope::Versioned { format_version, .. } => *format_version,
            Envelope::Legacy { .. } => 1,
        }
    }

    /// Writer version metadata; `None` for legacy files, which never stored it.
    pub fn versions(&self) -> Option<&VersionInfo> {
        match self {
            Envelope::Versioned { versions, .. } => Some(versions),
            Envelope::Legacy { .. } => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Envelope::Legacy { .. })
    }
}

/// Encode a versioned container around an already-compressed payload.
///
/// Layout (all integers little-endian): file type tag, format version,
/// package version, engine version (major/minor/patch u16, changelist u32,
/// branch string), class name string, then the length-prefixed payload.
/// Strings are a u32 byte length followed by UTF-8 bytes.
pub fn encode(
    class_name: &str,
    versions: &VersionInfo,
    payload: &[u8],
) -> Result<Vec<u8>, SaveError> {
    if class_name.is_empty() {
        return Err(SaveError::InvalidInput { reason: "empty class name" });
    }
    if payload.len() > u32::MAX as usize {
        return Err(SaveError::InvalidInput { reason: "payload exceeds u32 length prefix" });
    }

    let mut out = Vec::with_capacity(4 * 7 + versions.engine.branch.len() + class_name.len() + payload.len());

    out.write_u32::<LE>(FILE_TYPE_TAG)?;
    out.write_u32::<LE>(FORMAT_VERSION)?;
    out.write_u32::<LE>(versions.package_version)?;

    out.write_u16::<LE>(versions.engine.major)?;
    out.write_u16::<LE>(versions.engine.minor)?;
    out.write_u16::<LE>(versions.engine.patch)?;
    out.write_u32::<LE>(versions.engine.changelist)?;
    write_string(&mut out, &versions.engine.branch)?;

    write_string(&mut out, class_name)?;

    out.write_u32::<LE>(payload.len() as u32)?;
    out.extend_from_slice(payload);

    Ok(out)
}

/// Decode a save container, picking the versioned or legacy path by tag.
///
/// Pure single-pass parse. Trailing bytes after a versioned payload are
/// ignored; the whole remainder of a legacy buffer is its payload, since the
/// legacy format never stored a payload length.
pub fn decode(bytes: &[u8]) -> Result<Envelope, SaveError> {
    let mut r = EnvelopeReader::new(bytes);

    let tag = r.read_u32()?;
    if tag != FILE_TYPE_TAG {
        // Pre-versioning file: back up to the start and parse the class name
        // from offset 0, assuming format version 1.
        r.rewind();
        let class_name = r.read_string()?;
        let payload = r.rest().to_vec();
        return Ok(Envelope::Legacy { class_name, payload });
    }

    let format_version = r.read_u32()?;
    let package_version = r.read_u32()?;

    let major = r.read_u16()?;
    let minor = r.read_u16()?;
    let patch = r.read_u16()?;
    let changelist = r.read_u32()?;
    let branch = r.read_string()?;

    let class_name = r.read_string()?;

    let payload_len = r.read_u32()? as usize;
    let payload = r.read_bytes(payload_len)?;

    Ok(Envelope::Versioned {
        format_version,
        versions: VersionInfo {
            package_version,
            engine: EngineVersion { major, minor, patch, changelist, branch },
        },
        class_name,
        payload,
    })
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), SaveError> {
    if s.len() > u32::MAX as usize {
        return Err(SaveError::InvalidInput { reason: "string exceeds u32 length prefix" });
    }
    out.write_u32::<LE>(s.len() as u32)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Bounds-checked cursor over the input buffer.
///
/// Every read verifies the remaining length first so a short buffer always
/// surfaces as [`SaveError::Truncated`] instead of a misaligned field read.
struct EnvelopeReader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> EnvelopeReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { cur: Cursor::new(bytes) }
    }

    fn remaining(&self) -> usize {
        self.cur.get_ref().len() - self.cur.position() as usize
    }

    fn ensure(&self, needed: usize) -> Result<(), SaveError> {
        let available = self.remaining();
        if available < needed {
            return Err(SaveError::Truncated { needed, available });
        }
        Ok(())
    }

    fn rewind(&mut self) {
        self.cur.set_position(0);
    }

    fn read_u16(&mut self) -> Result<u16, SaveError> {
        self.ensure(2)?;
        Ok(self.cur.read_u16::<LE>()?)
    }

    fn read_u32(&mut self) -> Result<u32, SaveError> {
        self.ensure(4)?;
        Ok(self.cur.read_u32::<LE>()?)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, SaveError> {
        self.ensure(len)?;
        let pos = self.cur.position() as usize;
        let bytes = self.cur.get_ref()[pos..pos + len].to_vec();
        self.cur.set_position((pos + len) as u64);
        Ok(bytes)
    }

    fn read_string(&mut self) -> Result<String, SaveError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| SaveError::Corrupted)
    }

    /// Everything from the cursor to the end of the buffer.
    fn rest(&mut self) -> &'a [u8] {
        let buf: &'a [u8] = *self.cur.get_ref();
        let pos = self.cur.position() as usize;
        self.cur.set_position(buf.len() as u64);
        &buf[pos..]
    }
}
