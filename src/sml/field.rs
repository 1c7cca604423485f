//! # SML Integer Field Decoder
//!
//! Reads a single integer from an SML message at a fixed byte offset. The byte
//! at the offset is an SML tag: the high nibble gives the type, the low nibble
//! the size of the whole field including the tag byte itself.
//!
//! | Tag    | Type             |
//! |--------|------------------|
//! | `0x5n` | signed integer   |
//! | `0x6n` | unsigned integer |
//!
//! Anything else (lists, octet strings, booleans, ...) is reported as absent.
//! This is not a general SML parser: meter readings sit at fixed offsets of a
//! meter's push message, so a fixed-width decode at a configured offset is
//! all that is needed.

use crate::constants::{
    SML_MIN_FIELD_LEN, SML_TAG_SIZE_MASK, SML_TAG_TYPE_MASK, SML_TYPE_SIGNED, SML_TYPE_UNSIGNED,
};
use chrono::{DateTime, Local};
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err as NomErr, IResult};
use serde::Serialize;
use std::ops::Range;

/// Parses one tagged integer field from the start of `input`.
pub fn parse_integer(input: &[u8]) -> IResult<&[u8], i128> {
    let (rest, tag) = be_u8(input)?;

    let signed = match tag & SML_TAG_TYPE_MASK {
        SML_TYPE_SIGNED => true,
        SML_TYPE_UNSIGNED => false,
        _ => return Err(NomErr::Error(Error::new(input, ErrorKind::Tag))),
    };

    let size = (tag & SML_TAG_SIZE_MASK) as usize;
    let (rest, value) = take(size.saturating_sub(1))(rest)?;

    Ok((rest, be_to_int(value, signed)))
}

/// Big-endian bytes to integer, two's complement when `signed`.
/// An empty slice is zero.
fn be_to_int(bytes: &[u8], signed: bool) -> i128 {
    let negative = signed && bytes.first().is_some_and(|b| b & 0x80 != 0);
    let init: i128 = if negative { -1 } else { 0 };

    bytes
        .iter()
        .fold(init, |acc, &b| (acc << 8) | i128::from(b))
}

/// Decodes the integer field at `offset`, or `None` when there is no integer
/// there: fewer than two bytes left, a tag other than signed/unsigned, or a
/// field that runs past the end of the buffer.
pub fn decode_field(buffer: &[u8], offset: usize) -> Option<i128> {
    let input = buffer.get(offset..)?;
    if input.len() < SML_MIN_FIELD_LEN {
        return None;
    }

    parse_integer(input).ok().map(|(_, value)| value)
}

/// Every offset in a range at which an integer decodes, with its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub captured_at: Option<DateTime<Local>>,
    pub offsets: Vec<usize>,
    pub values: Vec<i128>,
}

impl ScanRecord {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn value_at(&self, offset: usize) -> Option<i128> {
        self.offsets
            .iter()
            .position(|&o| o == offset)
            .map(|i| self.values[i])
    }
}

/// Tries `decode_field` at every offset of `range`. Comparing records taken a
/// few minutes apart shows which offsets carry the counters that move.
pub fn scan_fields(buffer: &[u8], range: Range<usize>) -> ScanRecord {
    let (offsets, values) = range
        .filter_map(|offset| decode_field(buffer, offset).map(|value| (offset, value)))
        .unzip();

    ScanRecord {
        captured_at: None,
        offsets,
        values,
    }
}
