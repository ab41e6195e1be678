//! Binary record format: `total_len | key_len | key | value_len | value |
//! tag_len | tag`, all length prefixes 4-byte little-endian. `total_len`
//! counts itself, so it equals the full byte length of the encoded record.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

use crate::error::{Error, Result};

const TEXT_TAG: &str = "string";
const INT64_TAG: &str = "int64";

/// Per-record type discriminator. `Int64` values are stored as their
/// decimal textual representation; the tag disambiguates on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Text,
    Int64,
}

impl TypeTag {
    fn as_str(self) -> &'static str {
        match self {
            TypeTag::Text => TEXT_TAG,
            TypeTag::Int64 => INT64_TAG,
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            TEXT_TAG => Ok(TypeTag::Text),
            INT64_TAG => Ok(TypeTag::Int64),
            other => Err(Error::Corrupt(format!("unknown type tag {other:?}"))),
        }
    }
}

/// One decoded `(key, value, tag)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
    pub tag: TypeTag,
}

/// Encodes a record per the on-disk layout.
pub fn encode(key: &str, value: &str, tag: TypeTag) -> Vec<u8> {
    let tag_str = tag.as_str();
    let body_len = 4 + key.len() + 4 + value.len() + 4 + tag_str.len();
    let total_len = 4 + body_len;

    let mut buf = Vec::with_capacity(total_len);
    buf.write_u32::<LittleEndian>(total_len as u32)
        .expect("writes to a Vec never fail");
    buf.write_u32::<LittleEndian>(key.len() as u32).unwrap();
    buf.extend_from_slice(key.as_bytes());
    buf.write_u32::<LittleEndian>(value.len() as u32).unwrap();
    buf.extend_from_slice(value.as_bytes());
    buf.write_u32::<LittleEndian>(tag_str.len() as u32).unwrap();
    buf.extend_from_slice(tag_str.as_bytes());
    buf
}

/// Decodes a single record out of `bytes`, which must contain *exactly*
/// one record (its `total_len` prefix must equal `bytes.len()`).
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let mut cur = Cursor::new(bytes);
    let total_len = read_u32(&mut cur)? as usize;
    if total_len != bytes.len() {
        return Err(Error::Corrupt(format!(
            "total_len {total_len} does not match buffer length {}",
            bytes.len()
        )));
    }
    let key = read_length_prefixed(&mut cur)?;
    let value = read_length_prefixed(&mut cur)?;
    let tag_str = read_length_prefixed(&mut cur)?;
    let tag = TypeTag::parse(&tag_str)?;
    Ok(Record { key, value, tag })
}

fn read_u32(cur: &mut Cursor<&[u8]>) -> Result<u32> {
    cur.read_u32::<LittleEndian>()
        .map_err(|e| Error::Corrupt(format!("truncated length prefix: {e}")))
}

fn read_length_prefixed(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let len = read_u32(cur)? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)
        .map_err(|e: io::Error| Error::Corrupt(format!("truncated field: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::Corrupt(format!("invalid utf8: {e}")))
}
