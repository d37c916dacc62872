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

mod common;

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use common::RawSketch;
use common::skewed_stream;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use topk::error::ErrorKind;
use topk::spacesaving::I64Serde;
use topk::spacesaving::StringSerde;
use topk::spacesaving::TopKSketch;
use topk::spacesaving::U64Serde;
use topk::spacesaving::Value;
use topk::spacesaving::ValueSerde;
use topk::spacesaving::ValueType;

fn s(v: &str) -> String {
    v.to_string()
}

fn scenario() -> TopKSketch<String> {
    let mut sketch = TopKSketch::new(2);
    for item in ["A", "B", "A", "C"] {
        sketch.update(s(item)).unwrap();
    }
    sketch
}

fn decode_err(bytes: &[u8]) -> topk::error::Error {
    TopKSketch::<String>::deserialize_with(bytes, &StringSerde).unwrap_err()
}

#[test]
fn test_serialized_layout() {
    let expected = RawSketch::new(0)
        .count(2)
        .count(2)
        .bool(false)
        .string_type()
        .count(2)
        .count(2)
        .count(0)
        .string("A")
        .count(1)
        .string("C")
        .into_bytes();
    assert_eq!(scenario().serialize_with(&StringSerde).unwrap(), expected);
}

#[test]
fn test_empty_sketch_layout() {
    let sketch = TopKSketch::<String>::new(5);
    let bytes = sketch.serialize_with(&StringSerde).unwrap();
    assert_eq!(
        bytes,
        RawSketch::new(1).count(5).count(0).bool(false).nil().into_bytes()
    );

    let mut decoded = TopKSketch::<String>::deserialize_with(&bytes, &StringSerde).unwrap();
    assert_eq!(decoded.capacity(), 5);
    assert!(decoded.is_empty());
    assert_eq!(decoded.item_type(), None);
    assert!(!decoded.is_pruned());

    decoded.update(s("late")).unwrap();
    assert_eq!(decoded.item_type(), Some(&ValueType::String));
}

#[test]
fn test_decoded_sketch_behaves_like_original() {
    let mut original = scenario();
    let bytes = original.serialize_with(&StringSerde).unwrap();
    let mut decoded = TopKSketch::<String>::deserialize_with(&bytes, &StringSerde).unwrap();

    assert_eq!(decoded.serialize_with(&StringSerde).unwrap(), bytes);
    assert_eq!(
        decoded.iter().collect::<Vec<_>>(),
        original.iter().collect::<Vec<_>>()
    );
    assert_eq!(decoded.top_k(1).unwrap(), vec![s("A"), s("C")]);

    // the oldest element of the lowest bucket must be evicted first on both
    for item in ["D", "A", "E"] {
        original.update(s(item)).unwrap();
        decoded.update(s(item)).unwrap();
    }
    assert_eq!(
        decoded.serialize_with(&StringSerde).unwrap(),
        original.serialize_with(&StringSerde).unwrap()
    );
}

#[test]
fn test_value_sketch_round_trip() {
    let mut left = TopKSketch::<Value>::new(3);
    let mut right = TopKSketch::<Value>::new(3);
    let addrs = [
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
    ];
    for (i, addr) in addrs.iter().enumerate() {
        for _ in 0..=i {
            left.update(Value::from(*addr)).unwrap();
        }
        right.update(Value::from(*addr)).unwrap();
    }
    left.merge_and_prune(&right).unwrap();
    assert!(left.is_pruned());

    let bytes = left.serialize_with(&ValueSerde).unwrap();
    let decoded = TopKSketch::<Value>::deserialize_with(&bytes, &ValueSerde).unwrap();
    assert!(decoded.is_pruned());
    assert_eq!(decoded.item_type(), Some(&ValueType::Addr));
    assert_eq!(
        decoded.iter().collect::<Vec<_>>(),
        left.iter().collect::<Vec<_>>()
    );
    assert_eq!(decoded.serialize_with(&ValueSerde).unwrap(), bytes);
}

#[test]
fn test_merged_sketch_over_capacity_round_trip() {
    let mut left = TopKSketch::<i64>::new(2);
    let mut right = TopKSketch::<i64>::new(2);
    for item in [-1, -1, 2] {
        left.update(item).unwrap();
    }
    for item in [3, 4, 4, -1] {
        right.update(item).unwrap();
    }
    left.merge(&right).unwrap();
    assert_eq!(left.num_elements(), 3);

    let bytes = left.serialize_with(&I64Serde).unwrap();
    let decoded = TopKSketch::<i64>::deserialize_with(&bytes, &I64Serde).unwrap();
    assert_eq!(decoded.num_elements(), 3);
    assert_eq!(decoded.capacity(), 2);
    assert!(!decoded.is_pruned());
    assert_eq!(decoded.count(&-1).unwrap(), 4);
    assert_eq!(decoded.epsilon(&-1).unwrap(), 1);
    assert_eq!(decoded.sum(), left.sum());
}

#[test]
fn test_evicting_sketch_round_trip() {
    let mut sketch = TopKSketch::<u64>::new(32);
    for item in skewed_stream(5_000, 400, 5) {
        sketch.update(item).unwrap();
    }

    let bytes = sketch.serialize_with(&U64Serde).unwrap();
    let decoded = TopKSketch::<u64>::deserialize_with(&bytes, &U64Serde).unwrap();
    assert_eq!(decoded.sum(), 5_000);
    assert_eq!(decoded.top_k(5).unwrap(), sketch.top_k(5).unwrap());
    assert_eq!(decoded.serialize_with(&U64Serde).unwrap(), bytes);
}

#[test]
fn test_truncated_input_is_rejected() {
    let bytes = scenario().serialize_with(&StringSerde).unwrap();
    for len in 0..bytes.len() {
        let err = decode_err(&bytes[..len]);
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData, "prefix {len}");
    }
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let mut bytes = scenario().serialize_with(&StringSerde).unwrap();
    bytes.push(0);
    let err = decode_err(&bytes);
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("trailing"));
}

#[test]
fn test_preamble_is_validated() {
    let bytes = scenario().serialize_with(&StringSerde).unwrap();

    let mut wrong_family = bytes.clone();
    wrong_family[1] = 27;
    assert_that!(
        decode_err(&wrong_family).message(),
        contains_substring("invalid family")
    );

    let mut wrong_version = bytes.clone();
    wrong_version[0] = 2;
    assert_that!(
        decode_err(&wrong_version).message(),
        contains_substring("unsupported serial version")
    );
}

#[test]
fn test_serializer_type_must_match() {
    let bytes = scenario().serialize_with(&StringSerde).unwrap();
    let err = TopKSketch::<i64>::deserialize_with(&bytes, &I64Serde).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("in a sketch of type Int"));
}

#[test]
fn test_inconsistent_headers_are_rejected() {
    let zero_capacity = RawSketch::new(1).count(0).count(0).bool(false).nil();
    assert_that!(
        decode_err(&zero_capacity.into_bytes()).message(),
        contains_substring("capacity must be at least 1")
    );

    let flag_mismatch = RawSketch::new(1)
        .count(2)
        .count(1)
        .bool(false)
        .string_type()
        .count(1)
        .count(1)
        .count(0)
        .string("A");
    assert_that!(
        decode_err(&flag_mismatch.into_bytes()).message(),
        contains_substring("empty flag")
    );

    let untyped = RawSketch::new(0)
        .count(2)
        .count(1)
        .bool(false)
        .nil()
        .count(1)
        .count(1)
        .count(0)
        .string("A");
    assert_that!(
        decode_err(&untyped.into_bytes()).message(),
        contains_substring("untyped sketch with elements")
    );

    let wrong_kind = RawSketch::new(1).bool(true);
    assert_that!(
        decode_err(&wrong_kind.into_bytes()).message(),
        contains_substring("expected COUNT field for capacity, found BOOL")
    );
}

#[test]
fn test_inconsistent_buckets_are_rejected() {
    let header = || RawSketch::new(0).count(4).count(2).bool(false).string_type();

    let fewer_declared = header()
        .count(3)
        .count(1)
        .count(0)
        .string("A")
        .count(0)
        .string("B")
        .count(0)
        .string("C");
    assert_that!(
        decode_err(&fewer_declared.into_bytes()).message(),
        contains_substring("more elements than declared")
    );

    let empty_bucket = header().count(0).count(1);
    assert_that!(
        decode_err(&empty_bucket.into_bytes()).message(),
        contains_substring("empty bucket")
    );

    let descending = header()
        .count(1)
        .count(3)
        .count(0)
        .string("A")
        .count(1)
        .count(3)
        .count(0)
        .string("B");
    assert_that!(
        decode_err(&descending.into_bytes()).message(),
        contains_substring("does not exceed the previous bucket count")
    );

    let zero_count = header().count(2).count(0).count(0).string("A").count(0).string("B");
    assert_that!(
        decode_err(&zero_count.into_bytes()).message(),
        contains_substring("does not exceed")
    );

    let loose_epsilon = header()
        .count(2)
        .count(2)
        .count(3)
        .string("A")
        .count(0)
        .string("B");
    assert_that!(
        decode_err(&loose_epsilon.into_bytes()).message(),
        contains_substring("epsilon 3 exceeds bucket count 2")
    );

    let duplicate = header()
        .count(1)
        .count(1)
        .count(0)
        .string("A")
        .count(1)
        .count(2)
        .count(0)
        .string("A");
    assert_that!(
        decode_err(&duplicate.into_bytes()).message(),
        contains_substring("duplicate item")
    );
}

fn single_bucket(items: &[&str], count: u64) -> Vec<u8> {
    let mut raw = RawSketch::new(0)
        .count(4)
        .count(items.len() as u64)
        .bool(false)
        .string_type()
        .count(items.len() as u64)
        .count(count);
    for item in items {
        raw = raw.count(0).string(item);
    }
    raw.into_bytes()
}

fn decode(bytes: &[u8]) -> TopKSketch<String> {
    TopKSketch::<String>::deserialize_with(bytes, &StringSerde).unwrap()
}

#[test]
fn test_overflowing_total_count_is_rejected() {
    let err = decode_err(&single_bucket(&["a", "b"], 1 << 63));
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("overflows u64"));

    let err = decode_err(&single_bucket(&["a", "b", "c"], u64::MAX / 2));
    assert_that!(err.message(), contains_substring("overflows u64"));
}

#[test]
fn test_merge_refuses_to_overflow_counts() {
    let mut big = decode(&single_bucket(&["a"], 1 << 63));
    assert_eq!(big.sum(), 1 << 63);
    let before = big.serialize_with(&StringSerde).unwrap();

    let other = decode(&single_bucket(&["b"], 1 << 63));
    let err = big.merge(&other).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CountOverflow);
    assert!(!big.contains(&s("b")));
    assert_eq!(big.serialize_with(&StringSerde).unwrap(), before);

    let same = big.clone();
    let err = big.merge_and_prune(&same).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CountOverflow);
    assert_eq!(big.serialize_with(&StringSerde).unwrap(), before);

    // right at the limit still merges
    let mut half = decode(&single_bucket(&["a"], 1 << 62));
    let copy = half.clone();
    half.merge(&copy).unwrap();
    assert_eq!(half.count(&s("a")).unwrap(), 1 << 63);
    assert_eq!(half.sum(), 1 << 63);
}

#[test]
fn test_update_refuses_to_overflow_counts() {
    let mut full = decode(&single_bucket(&["a"], u64::MAX));
    assert_eq!(full.sum(), u64::MAX);

    let err = full.update(s("a")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CountOverflow);
    let err = full.update(s("b")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CountOverflow);

    assert_eq!(full.num_elements(), 1);
    assert_eq!(full.count(&s("a")).unwrap(), u64::MAX);
}
