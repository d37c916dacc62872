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

#![allow(dead_code)]

use std::collections::HashMap;
use std::hash::Hash;

/// Deterministic skewed stream: the minimum of two uniform draws favours small values.
pub fn skewed_stream(len: usize, distinct: u64, seed: u64) -> Vec<u64> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    (0..len)
        .map(|_| {
            let a = next() % distinct;
            let b = next() % distinct;
            a.min(b)
        })
        .collect()
}

pub fn exact_counts<T: Clone + Eq + Hash>(stream: &[T]) -> HashMap<T, u64> {
    let mut counts = HashMap::new();
    for item in stream {
        *counts.entry(item.clone()).or_insert(0) += 1;
    }
    counts
}

/// Builds serialized sketch bytes field by field.
pub struct RawSketch {
    bytes: Vec<u8>,
}

impl RawSketch {
    pub fn new(flags: u8) -> Self {
        Self {
            bytes: vec![1, 26, flags],
        }
    }

    pub fn count(mut self, n: u64) -> Self {
        self.bytes.push(1);
        self.bytes.extend_from_slice(&n.to_le_bytes());
        self
    }

    pub fn bool(mut self, b: bool) -> Self {
        self.bytes.push(2);
        self.bytes.push(b as u8);
        self
    }

    pub fn nil(mut self) -> Self {
        self.bytes.push(3);
        self
    }

    pub fn string_type(mut self) -> Self {
        self.bytes.push(4);
        self.bytes.push(5);
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.bytes.push(5);
        self.bytes
            .extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
