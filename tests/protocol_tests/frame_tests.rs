//! Frame Tests
//!
//! Byte-level layout of the frame primitives and command verbs.

use std::io::Cursor;

use bytes::BytesMut;
use shardfs::protocol::{
    encode_string, read_command, read_i32, read_i64, read_raw, read_size, read_string,
    try_read_string, write_command, write_i32, write_i64, write_raw, write_string, Command,
    Incoming, MAX_STRING_LEN, NOT_FOUND_SIZE,
};
use shardfs::ShardError;

// =============================================================================
// Wire Layout Tests
// =============================================================================

#[test]
fn test_string_has_two_byte_big_endian_length() {
    let mut buf = Vec::new();
    write_string(&mut buf, "PUT").unwrap();

    assert_eq!(buf, vec![0x00, 0x03, b'P', b'U', b'T']);
}

#[test]
fn test_string_length_counts_utf8_bytes() {
    let mut buf = Vec::new();
    write_string(&mut buf, "héllo").unwrap();

    assert_eq!(&buf[..2], &[0x00, 0x06]);
    assert_eq!(read_string(&mut Cursor::new(buf)).unwrap(), "héllo");
}

#[test]
fn test_int_frames_are_big_endian() {
    let mut buf = Vec::new();
    write_i32(&mut buf, 258).unwrap();
    write_i64(&mut buf, NOT_FOUND_SIZE).unwrap();

    assert_eq!(&buf[..4], &[0, 0, 1, 2]);
    assert_eq!(&buf[4..], &[0xFF; 8]);
}

#[test]
fn test_encode_string_into_bytes_mut() {
    let mut buf = BytesMut::new();
    encode_string(&mut buf, "a").unwrap();
    encode_string(&mut buf, "").unwrap();

    assert_eq!(&buf[..], &[0, 1, b'a', 0, 0]);
}

#[test]
fn test_string_too_long_is_rejected() {
    let long = "x".repeat(MAX_STRING_LEN + 1);
    let mut buf = Vec::new();

    let result = write_string(&mut buf, &long);
    assert!(matches!(result, Err(ShardError::Protocol(_))));
    assert!(buf.is_empty());
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_sequence_of_frames() {
    let mut buf = Vec::new();
    write_string(&mut buf, "file.bin").unwrap();
    write_i64(&mut buf, 11).unwrap();
    write_i32(&mut buf, -7).unwrap();

    let mut cursor = Cursor::new(buf);
    assert_eq!(read_string(&mut cursor).unwrap(), "file.bin");
    assert_eq!(read_i64(&mut cursor).unwrap(), 11);
    assert_eq!(read_i32(&mut cursor).unwrap(), -7);
}

#[test]
fn test_try_read_string_clean_eof() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    assert_eq!(try_read_string(&mut cursor).unwrap(), None);
}

#[test]
fn test_read_string_on_empty_stream_is_protocol_error() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    assert!(matches!(read_string(&mut cursor), Err(ShardError::Protocol(_))));
}

#[test]
fn test_eof_inside_length_is_protocol_error() {
    let mut cursor = Cursor::new(vec![0x00]);
    assert!(matches!(try_read_string(&mut cursor), Err(ShardError::Protocol(_))));
}

#[test]
fn test_eof_inside_body_is_protocol_error() {
    let mut cursor = Cursor::new(vec![0x00, 0x05, b'a', b'b']);
    assert!(matches!(read_string(&mut cursor), Err(ShardError::Protocol(_))));
}

#[test]
fn test_eof_inside_int64_is_protocol_error() {
    let mut cursor = Cursor::new(vec![0, 0, 0, 1]);
    assert!(matches!(read_i64(&mut cursor), Err(ShardError::Protocol(_))));
}

#[test]
fn test_invalid_utf8_is_protocol_error() {
    let mut cursor = Cursor::new(vec![0x00, 0x02, 0xC3, 0x28]);
    assert!(matches!(read_string(&mut cursor), Err(ShardError::Protocol(_))));
}

#[test]
fn test_read_size_rejects_negative() {
    let mut buf = Vec::new();
    write_i64(&mut buf, -5).unwrap();

    assert!(matches!(read_size(&mut Cursor::new(buf)), Err(ShardError::Protocol(_))));
}

// =============================================================================
// Raw Payload Tests
// =============================================================================

#[test]
fn test_raw_copies_exactly_len_bytes() {
    let mut src = Cursor::new(b"abcdefgh".to_vec());
    let mut out = Vec::new();

    let copied = write_raw(&mut out, &mut src, 5).unwrap();
    assert_eq!(copied, 5);
    assert_eq!(out, b"abcde");

    // The rest stays in the source for the next frame
    let mut rest = Vec::new();
    read_raw(&mut src, &mut rest, 100).unwrap();
    assert_eq!(rest, b"fgh");
}

#[test]
fn test_raw_short_source_reports_count() {
    let mut src = Cursor::new(b"abc".to_vec());
    let mut out = Vec::new();

    let copied = read_raw(&mut src, &mut out, 10).unwrap();
    assert_eq!(copied, 3);
    assert_eq!(out, b"abc");
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_command_parse_ignores_case() {
    assert_eq!(Command::parse("put"), Some(Command::Put));
    assert_eq!(Command::parse("Get"), Some(Command::Get));
    assert_eq!(Command::parse("LS"), Some(Command::Ls));
    assert_eq!(Command::parse("rm"), Some(Command::Rm));
    assert_eq!(Command::parse("purge"), Some(Command::Purge));
    assert_eq!(Command::parse("DEL"), None);
}

#[test]
fn test_write_then_read_command() {
    let mut buf = Vec::new();
    write_command(&mut buf, Command::Ls).unwrap();

    assert_eq!(buf, vec![0, 2, b'L', b'S']);
    let incoming = read_command(&mut Cursor::new(buf)).unwrap();
    assert_eq!(incoming, Some(Incoming::Command(Command::Ls)));
}

#[test]
fn test_read_unknown_command() {
    let mut buf = Vec::new();
    write_string(&mut buf, "STAT").unwrap();

    let incoming = read_command(&mut Cursor::new(buf)).unwrap();
    assert_eq!(incoming, Some(Incoming::Unknown("STAT".to_string())));
}

#[test]
fn test_read_command_on_silent_peer() {
    let incoming = read_command(&mut Cursor::new(Vec::<u8>::new())).unwrap();
    assert_eq!(incoming, None);
}
