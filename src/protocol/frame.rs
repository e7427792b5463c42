//! Frame codec
//!
//! Encoding and decoding of the four frame primitives.
//!
//! ## Wire Format
//!
//! ```text
//! STRING  ┌──────────┬──────────────────────┐
//!         │ Len (2)  │  UTF-8 bytes         │
//!         └──────────┴──────────────────────┘
//! INT32   ┌──────────┐
//!         │  BE (4)  │
//!         └──────────┘
//! INT64   ┌──────────┐
//!         │  BE (8)  │
//!         └──────────┘
//! RAW     ┌──────────────────────────────────┐
//!         │ exactly N bytes (N sent before)  │
//!         └──────────────────────────────────┘
//! ```

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, ShardError};

/// Maximum encoded length of a STRING frame
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// SIZE value meaning "no such file"
pub const NOT_FOUND_SIZE: i64 = -1;

// =============================================================================
// Encoding
// =============================================================================

/// Append a STRING frame to `buf`
pub fn encode_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(ShardError::Protocol(format!(
            "String too long: {} bytes (max {})",
            bytes.len(),
            MAX_STRING_LEN
        )));
    }
    buf.reserve(2 + bytes.len());
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
    Ok(())
}

/// Write a STRING frame
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let mut buf = BytesMut::with_capacity(2 + value.len());
    encode_string(&mut buf, value)?;
    writer.write_all(&buf)?;
    Ok(())
}

/// Write an INT32 frame
pub fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Write an INT64 frame
pub fn write_i64<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Copy up to `len` raw bytes from `src` to `writer`
///
/// Returns how many bytes were copied; fewer than `len` means `src` ran dry.
pub fn write_raw<R: Read, W: Write>(writer: &mut W, src: &mut R, len: u64) -> Result<u64> {
    let copied = io::copy(&mut src.take(len), writer)?;
    Ok(copied)
}

// =============================================================================
// Decoding
// =============================================================================

/// Read a STRING frame
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    try_read_string(reader)?
        .ok_or_else(|| ShardError::Protocol("stream closed before string length".to_string()))
}

/// Read a STRING frame, or `None` if the peer closed before sending anything
pub fn try_read_string<R: Read>(reader: &mut R) -> Result<Option<String>> {
    let mut header = [0u8; 2];
    if !fill_or_eof(reader, &mut header)? {
        return Ok(None);
    }
    let len = (&header[..]).get_u16() as usize;

    let mut payload = vec![0u8; len];
    read_frame(reader, &mut payload, "string body")?;

    String::from_utf8(payload)
        .map(Some)
        .map_err(|e| ShardError::Protocol(format!("String is not valid UTF-8: {}", e)))
}

/// Read an INT32 frame
pub fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_frame(reader, &mut buf, "INT32")?;
    Ok((&buf[..]).get_i32())
}

/// Read an INT64 frame
pub fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    read_frame(reader, &mut buf, "INT64")?;
    Ok((&buf[..]).get_i64())
}

/// Read a SIZE frame that must not be negative
pub fn read_size<R: Read>(reader: &mut R) -> Result<u64> {
    let size = read_i64(reader)?;
    u64::try_from(size).map_err(|_| ShardError::Protocol(format!("Negative size: {}", size)))
}

/// Copy up to `len` raw bytes from `reader` into `dst`
///
/// Returns how many bytes arrived; the caller decides whether a short read
/// is a partial transfer.
pub fn read_raw<R: Read, W: Write>(reader: &mut R, dst: &mut W, len: u64) -> Result<u64> {
    let copied = io::copy(&mut reader.take(len), dst)?;
    Ok(copied)
}

/// Discard up to `len` raw bytes the receiver has no use for
pub fn skip_raw<R: Read>(reader: &mut R, len: u64) -> Result<u64> {
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    Ok(skipped)
}

/// Fill `buf` completely, mapping a mid-frame close to a protocol error
fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            ShardError::Protocol(format!("stream closed while reading {}", what))
        }
        _ => ShardError::Io(e),
    })
}

/// Fill `buf`; `Ok(false)` if the stream was already at EOF
fn fill_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(ShardError::Protocol(
                    "stream closed while reading string length".to_string(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
