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

//! Identity and type capability of tracked items.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::net::IpAddr;

/// A value that can be tracked by a [`TopKSketch`](super::TopKSketch).
///
/// `Eq` and `Hash` are the key function of the sketch: two items are the same tracked value
/// exactly when they compare equal. [`Item::item_type`] is the type tag used to refuse mixing
/// incompatible values in one sketch, or merging sketches of different types.
pub trait Item: Clone + Eq + Hash {
    /// The type tag of an item.
    type Type: Clone + Eq + fmt::Debug;

    /// Returns the type tag of this item.
    fn item_type(&self) -> Self::Type;
}

/// Type tags of the built-in item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Bool = 1,
    Int = 2,
    Count = 3,
    Double = 4,
    String = 5,
    Addr = 6,
}

impl ValueType {
    /// Returns the tag byte of this type.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Returns the type with the given tag byte, if any.
    pub const fn from_tag(tag: u8) -> Option<ValueType> {
        match tag {
            1 => Some(ValueType::Bool),
            2 => Some(ValueType::Int),
            3 => Some(ValueType::Count),
            4 => Some(ValueType::Double),
            5 => Some(ValueType::String),
            6 => Some(ValueType::Addr),
            _ => None,
        }
    }
}

/// A dynamically typed item.
///
/// Streams that carry values of more than one type use `Value`; the sketch binds to the type
/// of the first value it sees and rejects the others with
/// [`ErrorKind::TypeMismatch`](crate::error::ErrorKind::TypeMismatch).
///
/// Doubles compare and hash by bit pattern, so `0.0` and `-0.0` are distinct items and a `NaN`
/// is equal to itself.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Count(u64),
    Double(f64),
    String(String),
    Addr(IpAddr),
}

impl Value {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Count(_) => ValueType::Count,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Addr(_) => ValueType::Addr,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Count(a), Value::Count(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Addr(a), Value::Addr(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value_type().hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Count(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Addr(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Count(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Value::Addr(v)
    }
}

impl Item for Value {
    type Type = ValueType;

    fn item_type(&self) -> ValueType {
        self.value_type()
    }
}

macro_rules! impl_static_item {
    ($($ty:ty => $tag:expr),* $(,)?) => {
        $(
            impl Item for $ty {
                type Type = ValueType;

                fn item_type(&self) -> ValueType {
                    $tag
                }
            }
        )*
    };
}

impl_static_item! {
    bool => ValueType::Bool,
    i64 => ValueType::Int,
    u64 => ValueType::Count,
    String => ValueType::String,
    IpAddr => ValueType::Addr,
}
