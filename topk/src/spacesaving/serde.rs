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

//! Serialization helpers for items tracked by a top-k sketch.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::spacesaving::item::Item;
use crate::spacesaving::item::Value;
use crate::spacesaving::item::ValueType;

const ADDR_V4: u8 = 4;
const ADDR_V6: u8 = 6;

/// Serializer/deserializer for the type tag and the items of a top-k sketch.
///
/// The sketch frames every type descriptor and item as one field of its own serialized form;
/// implementations only write and read the payload of that field.
pub trait ItemSerde<T: Item> {
    /// Serializes the type tag the sketch is bound to.
    fn serialize_type(&self, item_type: &T::Type, bytes: &mut SketchBytes);

    /// Deserializes a type tag written by [`ItemSerde::serialize_type`].
    fn deserialize_type(&self, slice: &mut SketchSlice<'_>) -> Result<T::Type, Error>;

    /// Serializes one item.
    ///
    /// Fails with [`ErrorKind::ItemTooLarge`](crate::error::ErrorKind::ItemTooLarge) if the item
    /// does not fit its encoding.
    fn serialize_item(&self, item: &T, bytes: &mut SketchBytes) -> Result<(), Error>;

    /// Deserializes one item of type `item_type`.
    fn deserialize_item(
        &self,
        slice: &mut SketchSlice<'_>,
        item_type: &T::Type,
    ) -> Result<T, Error>;
}

/// Serializer for dynamically typed [`Value`] items.
///
/// Each item carries its own type tag, which must match the type the sketch is bound to.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueSerde;

impl ItemSerde<Value> for ValueSerde {
    fn serialize_type(&self, item_type: &ValueType, bytes: &mut SketchBytes) {
        bytes.write_u8(item_type.tag());
    }

    fn deserialize_type(&self, slice: &mut SketchSlice<'_>) -> Result<ValueType, Error> {
        read_value_type(slice)
    }

    fn serialize_item(&self, item: &Value, bytes: &mut SketchBytes) -> Result<(), Error> {
        bytes.write_u8(item.value_type().tag());
        match item {
            Value::Bool(v) => bytes.write_u8(*v as u8),
            Value::Int(v) => bytes.write_i64_le(*v),
            Value::Count(v) => bytes.write_u64_le(*v),
            Value::Double(v) => bytes.write_f64_le(*v),
            Value::String(v) => write_string(v, bytes)?,
            Value::Addr(v) => write_addr(v, bytes),
        }
        Ok(())
    }

    fn deserialize_item(
        &self,
        slice: &mut SketchSlice<'_>,
        item_type: &ValueType,
    ) -> Result<Value, Error> {
        let actual = read_value_type(slice)?;
        ensure_value_type(*item_type, actual)?;
        let value = match actual {
            ValueType::Bool => Value::Bool(read_bool(slice)?),
            ValueType::Int => Value::Int(slice.read_i64_le().map_err(make_error("int"))?),
            ValueType::Count => Value::Count(slice.read_u64_le().map_err(make_error("count"))?),
            ValueType::Double => Value::Double(slice.read_f64_le().map_err(make_error("double"))?),
            ValueType::String => Value::String(read_string(slice)?),
            ValueType::Addr => Value::Addr(read_addr(slice)?),
        };
        Ok(value)
    }
}

/// Serializer for `i64` items.
#[derive(Debug, Default, Clone, Copy)]
pub struct I64Serde;

impl ItemSerde<i64> for I64Serde {
    fn serialize_type(&self, item_type: &ValueType, bytes: &mut SketchBytes) {
        bytes.write_u8(item_type.tag());
    }

    fn deserialize_type(&self, slice: &mut SketchSlice<'_>) -> Result<ValueType, Error> {
        let actual = read_value_type(slice)?;
        ensure_value_type(ValueType::Int, actual)?;
        Ok(actual)
    }

    fn serialize_item(&self, item: &i64, bytes: &mut SketchBytes) -> Result<(), Error> {
        bytes.write_i64_le(*item);
        Ok(())
    }

    fn deserialize_item(&self, slice: &mut SketchSlice<'_>, _: &ValueType) -> Result<i64, Error> {
        slice.read_i64_le().map_err(make_error("int"))
    }
}

/// Serializer for `u64` items.
#[derive(Debug, Default, Clone, Copy)]
pub struct U64Serde;

impl ItemSerde<u64> for U64Serde {
    fn serialize_type(&self, item_type: &ValueType, bytes: &mut SketchBytes) {
        bytes.write_u8(item_type.tag());
    }

    fn deserialize_type(&self, slice: &mut SketchSlice<'_>) -> Result<ValueType, Error> {
        let actual = read_value_type(slice)?;
        ensure_value_type(ValueType::Count, actual)?;
        Ok(actual)
    }

    fn serialize_item(&self, item: &u64, bytes: &mut SketchBytes) -> Result<(), Error> {
        bytes.write_u64_le(*item);
        Ok(())
    }

    fn deserialize_item(&self, slice: &mut SketchSlice<'_>, _: &ValueType) -> Result<u64, Error> {
        slice.read_u64_le().map_err(make_error("count"))
    }
}

/// Serializer for UTF-8 strings, each prefixed by its byte length.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerde;

impl ItemSerde<String> for StringSerde {
    fn serialize_type(&self, item_type: &ValueType, bytes: &mut SketchBytes) {
        bytes.write_u8(item_type.tag());
    }

    fn deserialize_type(&self, slice: &mut SketchSlice<'_>) -> Result<ValueType, Error> {
        let actual = read_value_type(slice)?;
        ensure_value_type(ValueType::String, actual)?;
        Ok(actual)
    }

    fn serialize_item(&self, item: &String, bytes: &mut SketchBytes) -> Result<(), Error> {
        write_string(item, bytes)
    }

    fn deserialize_item(
        &self,
        slice: &mut SketchSlice<'_>,
        _: &ValueType,
    ) -> Result<String, Error> {
        read_string(slice)
    }
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

fn read_value_type(slice: &mut SketchSlice<'_>) -> Result<ValueType, Error> {
    let tag = slice.read_u8().map_err(make_error("type_tag"))?;
    ValueType::from_tag(tag).ok_or_else(|| Error::deserial(format!("unknown type tag {tag}")))
}

fn ensure_value_type(expected: ValueType, actual: ValueType) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::deserial(format!(
            "item of type {actual:?} in a sketch of type {expected:?}"
        )))
    }
}

fn read_bool(slice: &mut SketchSlice<'_>) -> Result<bool, Error> {
    match slice.read_u8().map_err(make_error("bool"))? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::deserial(format!("invalid bool byte {other}"))),
    }
}

fn write_string(value: &str, bytes: &mut SketchBytes) -> Result<(), Error> {
    bytes.write_u32_le(string_length(value.len())?);
    bytes.write(value.as_bytes());
    Ok(())
}

fn string_length(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| {
        Error::item_too_large("string payload exceeds the u32 length prefix")
            .with_context("len", len)
    })
}

fn read_string(slice: &mut SketchSlice<'_>) -> Result<String, Error> {
    let len = slice.read_u32_le().map_err(make_error("string_length"))? as usize;
    if len > slice.remaining() {
        return Err(Error::insufficient_data("string_payload"));
    }
    let mut buf = vec![0u8; len];
    slice
        .read_exact(&mut buf)
        .map_err(make_error("string_payload"))?;
    String::from_utf8(buf)
        .map_err(|err| Error::deserial("invalid UTF-8 string payload").set_source(err))
}

fn write_addr(value: &IpAddr, bytes: &mut SketchBytes) {
    match value {
        IpAddr::V4(v4) => {
            bytes.write_u8(ADDR_V4);
            bytes.write(&v4.octets());
        }
        IpAddr::V6(v6) => {
            bytes.write_u8(ADDR_V6);
            bytes.write(&v6.octets());
        }
    }
}

fn read_addr(slice: &mut SketchSlice<'_>) -> Result<IpAddr, Error> {
    match slice.read_u8().map_err(make_error("addr_family"))? {
        ADDR_V4 => {
            let mut octets = [0u8; 4];
            slice.read_exact(&mut octets).map_err(make_error("addr"))?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        ADDR_V6 => {
            let mut octets = [0u8; 16];
            slice.read_exact(&mut octets).map_err(make_error("addr"))?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(Error::deserial(format!("invalid address family {other}"))),
    }
}
