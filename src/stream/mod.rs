//! Binary tuning stream and session files
//!
//! A tuning is written as `color | projector | warp grid | blend mask`. The
//! versioned layout prefixes this with a magic and a version number; the
//! legacy layout has no header at all and is recognized by its first byte
//! (the color spec).

mod codec;

use crate::error::{StreamError, TuningError};
use crate::proj::Tuning;
use crate::session::{Mode, Session};
use bytes::{BufMut, Bytes, BytesMut};
use codec::Reader;
use std::path::Path;

pub const TUNING_MAGIC: &[u8; 4] = b"OTUN";
pub const SESSION_MAGIC: &[u8; 4] = b"OSES";
pub const FORMAT_VERSION: u32 = 1;

/// First byte of a legacy stream (color spec RGB)
const LEGACY_LEAD: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// Fixed field order without header
    Legacy,
    #[default]
    Versioned,
}

/// Write a tuning in the versioned layout
pub fn write_tuning(buf: &mut impl BufMut, tuning: &Tuning) {
    write_tuning_with(buf, tuning, StreamFormat::Versioned);
}

/// Write a tuning in the given layout
pub fn write_tuning_with(buf: &mut impl BufMut, tuning: &Tuning, format: StreamFormat) {
    if format == StreamFormat::Versioned {
        buf.put_slice(TUNING_MAGIC);
        buf.put_u32(FORMAT_VERSION);
    }
    codec::write_fields(buf, tuning);
}

/// Encode a tuning in the versioned layout
pub fn encode_tuning(tuning: &Tuning) -> Bytes {
    encode_tuning_with(tuning, StreamFormat::Versioned)
}

/// Encode a tuning in the given layout
pub fn encode_tuning_with(tuning: &Tuning, format: StreamFormat) -> Bytes {
    let mut buf = BytesMut::new();
    write_tuning_with(&mut buf, tuning, format);
    buf.freeze()
}

/// Guess the layout of a stream from its first bytes
pub fn detect_format(data: &[u8]) -> Result<StreamFormat, StreamError> {
    if data.starts_with(TUNING_MAGIC) {
        return Ok(StreamFormat::Versioned);
    }
    match data.first() {
        Some(&LEGACY_LEAD) => Ok(StreamFormat::Legacy),
        // A cut-off header is a truncation, not a foreign stream
        _ if TUNING_MAGIC.starts_with(data) => Err(StreamError::Truncated {
            field: "stream header",
            needed: TUNING_MAGIC.len(),
            remaining: data.len(),
        }),
        _ => Err(StreamError::BadMagic),
    }
}

/// Decode one tuning, accepting either layout
///
/// The data must hold exactly one tuning. The result never carries a setup
/// link.
pub fn decode_tuning(data: &[u8]) -> Result<Tuning, StreamError> {
    let mut r = Reader::new(data);
    let tuning = read_tuning(&mut r)?;
    expect_end(&r)?;
    Ok(tuning)
}

fn expect_end(r: &Reader) -> Result<(), StreamError> {
    match r.remaining() {
        0 => Ok(()),
        extra => Err(StreamError::TrailingBytes(extra)),
    }
}

fn read_tuning(r: &mut Reader) -> Result<Tuning, StreamError> {
    if detect_format(r.peek(TUNING_MAGIC.len()))? == StreamFormat::Versioned {
        r.bytes("stream header", TUNING_MAGIC.len())?;
        let version = r.u32("stream version")?;
        if version != FORMAT_VERSION {
            return Err(StreamError::UnsupportedVersion(version));
        }
    }
    codec::read_fields(r)
}

/// Encode the mode and all tunings of a session
pub fn encode_session(session: &Session) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(SESSION_MAGIC);
    buf.put_u32(FORMAT_VERSION);
    buf.put_u8(session.mode().tag());
    buf.put_u32(session.len() as u32);
    for tuning in session.tunings() {
        write_tuning(&mut buf, tuning);
    }
    buf.freeze()
}

/// Decode a session file into its mode and tunings
///
/// A failure inside a tuning record names the tuning index; nothing of a
/// partially read tuning is returned.
pub fn decode_session(data: &[u8]) -> Result<(Mode, Vec<Tuning>), TuningError> {
    let mut r = Reader::new(data);
    if r.bytes("session header", SESSION_MAGIC.len())? != SESSION_MAGIC {
        return Err(StreamError::BadMagic.into());
    }
    let version = r.u32("session version")?;
    if version != FORMAT_VERSION {
        return Err(StreamError::UnsupportedVersion(version).into());
    }
    let mode = Mode::try_from(r.u8("session mode")?)?;
    let count = r.u32("tuning count")? as usize;

    let mut tunings = Vec::with_capacity(count.min(64));
    for index in 0..count {
        let tuning = read_tuning(&mut r).map_err(|source| TuningError::Load { index, source })?;
        tunings.push(tuning);
    }
    expect_end(&r)?;
    Ok((mode, tunings))
}

impl Session {
    /// Write the session to a file
    pub fn save(&self, path: &Path) -> Result<(), TuningError> {
        std::fs::write(path, encode_session(self)).map_err(StreamError::from)?;
        log::info!("Saved {} tunings to {:?}", self.len(), path);
        Ok(())
    }

    /// Replace mode and tunings with the contents of a session file
    ///
    /// The session is left untouched if any tuning fails to load. Loaded
    /// screens are reconciled against the current display oracle.
    pub fn load(&mut self, path: &Path) -> Result<(), TuningError> {
        let data = std::fs::read(path).map_err(StreamError::from)?;
        let (mode, tunings) = decode_session(&data)?;
        log::info!("Loaded {} tunings from {:?}", tunings.len(), path);
        self.replace_tunings(tunings, mode);
        Ok(())
    }
}
