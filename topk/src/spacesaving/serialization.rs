// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Field framing of serialized top-k sketches.
//!
//! A serialized sketch is a three byte preamble (serial version, family id, flags) followed by a
//! sequence of fields. Every field starts with a kind byte:
//!
//! | kind  | payload                                   |
//! |-------|-------------------------------------------|
//! | COUNT | u64, little-endian                        |
//! | BOOL  | one byte, 0 or 1                          |
//! | NIL   | none                                      |
//! | TYPE  | type descriptor written by the item serde |
//! | VALUE | item written by the item serde            |
//!
//! The sketch writes `capacity, num_elements, pruned, TYPE | NIL`, then for every bucket in
//! ascending count order `bucket_size, bucket_count` followed by `bucket_size` pairs of
//! `epsilon, VALUE`.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::family::Family;
use crate::error::Error;

pub(super) const SERIAL_VERSION: u8 = 1;
pub(super) const FLAGS_IS_EMPTY: u8 = 1 << 0;

const PREAMBLE_BYTES: usize = 3;

const FIELD_COUNT: u8 = 1;
const FIELD_BOOL: u8 = 2;
const FIELD_NIL: u8 = 3;
const FIELD_TYPE: u8 = 4;
const FIELD_VALUE: u8 = 5;

fn kind_name(kind: u8) -> &'static str {
    match kind {
        FIELD_COUNT => "COUNT",
        FIELD_BOOL => "BOOL",
        FIELD_NIL => "NIL",
        FIELD_TYPE => "TYPE",
        FIELD_VALUE => "VALUE",
        _ => "UNKNOWN",
    }
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

pub(super) struct FieldWriter {
    bytes: SketchBytes,
}

impl FieldWriter {
    /// Starts a buffer with the preamble already written.
    pub fn new(flags: u8, size_hint: usize) -> Self {
        let mut bytes = SketchBytes::with_capacity(PREAMBLE_BYTES + size_hint);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::TOPK.id);
        bytes.write_u8(flags);
        Self { bytes }
    }

    pub fn write_count(&mut self, n: u64) {
        self.bytes.write_u8(FIELD_COUNT);
        self.bytes.write_u64_le(n);
    }

    pub fn write_bool(&mut self, b: bool) {
        self.bytes.write_u8(FIELD_BOOL);
        self.bytes.write_u8(b as u8);
    }

    pub fn write_nil(&mut self) {
        self.bytes.write_u8(FIELD_NIL);
    }

    /// Opens a TYPE field; the caller writes the payload.
    pub fn begin_type(&mut self) -> &mut SketchBytes {
        self.bytes.write_u8(FIELD_TYPE);
        &mut self.bytes
    }

    /// Opens a VALUE field; the caller writes the payload.
    pub fn begin_value(&mut self) -> &mut SketchBytes {
        self.bytes.write_u8(FIELD_VALUE);
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_bytes()
    }
}

pub(super) struct FieldReader<'a> {
    slice: SketchSlice<'a>,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            slice: SketchSlice::new(bytes),
        }
    }

    /// Validates serial version and family, returning the flags byte.
    pub fn read_preamble(&mut self) -> Result<u8, Error> {
        let serial_version = self.slice.read_u8().map_err(make_error("serial_version"))?;
        let family_id = self.slice.read_u8().map_err(make_error("family_id"))?;
        let flags = self.slice.read_u8().map_err(make_error("flags"))?;
        Family::TOPK.validate_id(family_id)?;
        ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
        Ok(flags)
    }

    pub fn read_count(&mut self, tag: &'static str) -> Result<u64, Error> {
        self.expect_kind(FIELD_COUNT, tag)?;
        self.slice.read_u64_le().map_err(make_error(tag))
    }

    pub fn read_bool(&mut self, tag: &'static str) -> Result<bool, Error> {
        self.expect_kind(FIELD_BOOL, tag)?;
        match self.slice.read_u8().map_err(make_error(tag))? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::deserial(format!("invalid bool byte {other} for {tag}"))),
        }
    }

    /// Reads a NIL or TYPE field. For TYPE, returns the slice positioned at its payload.
    pub fn read_type_or_nil(
        &mut self,
        tag: &'static str,
    ) -> Result<Option<&mut SketchSlice<'a>>, Error> {
        match self.read_kind(tag)? {
            FIELD_NIL => Ok(None),
            FIELD_TYPE => Ok(Some(&mut self.slice)),
            other => Err(Error::deserial(format!(
                "expected TYPE or NIL field for {tag}, found {}",
                kind_name(other)
            ))),
        }
    }

    /// Reads the kind byte of a VALUE field, returning the slice positioned at its payload.
    pub fn begin_value(&mut self, tag: &'static str) -> Result<&mut SketchSlice<'a>, Error> {
        self.expect_kind(FIELD_VALUE, tag)?;
        Ok(&mut self.slice)
    }

    pub fn remaining(&self) -> usize {
        self.slice.remaining()
    }

    fn read_kind(&mut self, tag: &'static str) -> Result<u8, Error> {
        self.slice.read_u8().map_err(make_error(tag))
    }

    fn expect_kind(&mut self, expected: u8, tag: &'static str) -> Result<(), Error> {
        let kind = self.read_kind(tag)?;
        if kind == expected {
            Ok(())
        } else {
            Err(Error::deserial(format!(
                "expected {} field for {tag}, found {}",
                kind_name(expected),
                kind_name(kind)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fields_read_back_in_order() {
        let mut writer = FieldWriter::new(0, 32);
        writer.write_count(17);
        writer.write_bool(true);
        writer.write_nil();
        writer.begin_value().write_u8(9);
        let bytes = writer.into_bytes();

        let mut reader = FieldReader::new(&bytes);
        assert_eq!(reader.read_preamble().unwrap(), 0);
        assert_eq!(reader.read_count("a").unwrap(), 17);
        assert!(reader.read_bool("b").unwrap());
        assert!(reader.read_type_or_nil("c").unwrap().is_none());
        assert_eq!(reader.begin_value("d").unwrap().read_u8().unwrap(), 9);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_wrong_field_kind_is_malformed() {
        let mut writer = FieldWriter::new(0, 16);
        writer.write_bool(false);
        let bytes = writer.into_bytes();

        let mut reader = FieldReader::new(&bytes);
        reader.read_preamble().unwrap();
        let err = reader.read_count("capacity").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert_eq!(err.message(), "expected COUNT field for capacity, found BOOL");
    }

    #[test]
    fn test_foreign_family_is_rejected() {
        let bytes = [SERIAL_VERSION, 10, 0];
        let err = FieldReader::new(&bytes).read_preamble().unwrap_err();
        assert_eq!(err.message(), "invalid family: expected 26 (TOPK), got 10");
    }

    #[test]
    fn test_unknown_serial_version_is_rejected() {
        let bytes = [SERIAL_VERSION + 1, Family::TOPK.id, 0];
        let err = FieldReader::new(&bytes).read_preamble().unwrap_err();
        assert_eq!(err.message(), "unsupported serial version: expected 1, got 2");
    }
}
