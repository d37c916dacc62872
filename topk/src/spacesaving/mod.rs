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

//! Space-Saving sketch for finding the heaviest items of a data stream.
//!
//! The sketch tracks at most `capacity` distinct items. Items with the same estimated count are
//! grouped in a bucket, and buckets are kept ordered by count, so counting an occurrence, finding
//! the least frequent item and listing the most frequent ones are all cheap. When a new item
//! arrives at a full sketch it replaces the oldest of the least frequent items and inherits its
//! count; that inherited count is remembered as the item's error bound (epsilon), so for every
//! tracked item `count - epsilon <= true frequency <= count`.
//!
//! Sketches built on separate streams can be merged; counts and error bounds of shared items add
//! up, and the result can be pruned back to capacity.
//!
//! For background, see Metwally, Agrawal and El Abbadi, "Efficient Computation of Frequent and
//! Top-k Elements in Data Streams" (ICDT 2005).
//!
//! # Usage
//!
//! ```rust
//! # use topk::spacesaving::TopKSketch;
//! let mut sketch = TopKSketch::<String>::new(2);
//! for word in ["a", "b", "a", "c"] {
//!     sketch.update(word.to_string()).unwrap();
//! }
//!
//! // "b" was evicted to make room for "c", which inherited its count as error bound.
//! assert_eq!(sketch.count(&"a".to_string()).unwrap(), 2);
//! assert_eq!(sketch.count(&"c".to_string()).unwrap(), 2);
//! assert_eq!(sketch.epsilon(&"c".to_string()).unwrap(), 1);
//! assert!(sketch.count(&"b".to_string()).is_err());
//!
//! // Ties are never split, so asking for one item returns both.
//! assert_eq!(sketch.top_k(1).unwrap().len(), 2);
//! ```
//!
//! # Typed values
//!
//! ```rust
//! # use topk::error::ErrorKind;
//! # use topk::spacesaving::{TopKSketch, Value};
//! let mut sketch = TopKSketch::<Value>::new(16);
//! sketch.update(Value::Count(80)).unwrap();
//!
//! let err = sketch.update(Value::from("http")).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::TypeMismatch);
//! assert_eq!(sketch.num_elements(), 1);
//! ```
//!
//! # Merging
//!
//! ```rust
//! # use topk::spacesaving::TopKSketch;
//! let mut left = TopKSketch::<u64>::new(4);
//! let mut right = TopKSketch::<u64>::new(4);
//! left.update(1).unwrap();
//! right.update(1).unwrap();
//! right.update(2).unwrap();
//!
//! left.merge_and_prune(&right).unwrap();
//! assert_eq!(left.count(&1).unwrap(), 2);
//! assert_eq!(left.sum(), 3);
//! ```
//!
//! # Serialization
//!
//! ```rust
//! # use topk::spacesaving::{I64Serde, TopKSketch};
//! let mut sketch = TopKSketch::<i64>::new(64);
//! sketch.update(42).unwrap();
//! sketch.update(42).unwrap();
//!
//! let bytes = sketch.serialize_with(&I64Serde).unwrap();
//! let decoded = TopKSketch::<i64>::deserialize_with(&bytes, &I64Serde).unwrap();
//! assert_eq!(decoded.count(&42).unwrap(), 2);
//! ```

mod arena;
mod chain;
mod item;
mod serde;
mod serialization;
mod sketch;

pub use self::item::Item;
pub use self::item::Value;
pub use self::item::ValueType;
pub use self::serde::I64Serde;
pub use self::serde::ItemSerde;
pub use self::serde::StringSerde;
pub use self::serde::U64Serde;
pub use self::serde::ValueSerde;
pub use self::sketch::Row;
pub use self::sketch::TopKSketch;
