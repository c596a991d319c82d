//! LEB128 variable-length integers
//!
//! Small ids, lengths and tags dominate trace streams, so every integer on
//! the wire is an unsigned LEB128 varint. Signed values go through zigzag
//! mapping so small negative numbers stay short.

use crate::error::{DecodeError, Result, TraceError};
use std::io::{self, Read};

/// Longest encoding of a `u64`
pub const MAX_LEN: usize = 10;

/// Encode `value` into `buf`, returning the number of bytes used
pub fn encode(mut value: u64, buf: &mut [u8; MAX_LEN]) -> usize {
    let mut len = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            return len + 1;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
}

/// Decode one varint, failing on truncation or more than 64 bits of payload
pub fn decode<R: Read>(reader: &mut R) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = read_byte(reader)?;
        if shift == 63 && byte > 1 {
            return Err(DecodeError::VarintOverflow.into());
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub(crate) fn read_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).map_err(eof_aware)?;
    Ok(byte[0])
}

/// Map a short read to [`DecodeError::UnexpectedEof`]
pub(crate) fn eof_aware(err: io::Error) -> TraceError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::UnexpectedEof.into()
    } else {
        TraceError::Io(err)
    }
}
