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

//! Space-Saving top-k sketch implementation.

use std::collections::HashMap;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::codec::assert::ensure_fully_consumed;
use crate::error::Error;
use crate::spacesaving::arena::ElementId;
use crate::spacesaving::chain::BucketChain;
use crate::spacesaving::chain::Element;
use crate::spacesaving::item::Item;
use crate::spacesaving::serde::ItemSerde;
use crate::spacesaving::serialization::FLAGS_IS_EMPTY;
use crate::spacesaving::serialization::FieldReader;
use crate::spacesaving::serialization::FieldWriter;

/// Result row for top-k queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    item: T,
    count: u64,
    epsilon: u64,
}

impl<T> Row<T> {
    /// Returns the item value.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Returns the estimated frequency, an upper bound of the true frequency.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the maximum overestimation of [`Row::count`].
    pub fn epsilon(&self) -> u64 {
        self.epsilon
    }

    /// Returns the guaranteed lower bound of the true frequency.
    pub fn lower_bound(&self) -> u64 {
        self.count.saturating_sub(self.epsilon)
    }
}

/// Space-Saving sketch tracking the most frequent items of a stream.
///
/// See the [module documentation](super) for more details.
#[derive(Debug, Clone)]
pub struct TopKSketch<T: Item> {
    capacity: usize,
    pruned: bool,
    // sum of all counts; no count or epsilon can exceed it
    total: u64,
    item_type: Option<T::Type>,
    index: HashMap<T, ElementId>,
    chain: BucketChain<T>,
}

impl<T: Item> TopKSketch<T> {
    /// Creates an empty, untyped sketch tracking at most `capacity` items.
    ///
    /// # Panics
    ///
    /// If capacity is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be at least 1");
        Self {
            capacity,
            pruned: false,
            total: 0,
            item_type: None,
            index: HashMap::new(),
            chain: BucketChain::new(),
        }
    }

    /// Returns the maximum number of tracked items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of tracked items.
    ///
    /// This may exceed [`TopKSketch::capacity`] after [`TopKSketch::merge`], until the sketch is
    /// pruned.
    pub fn num_elements(&self) -> usize {
        self.chain.len()
    }

    /// Returns true if the sketch tracks no items.
    pub fn is_empty(&self) -> bool {
        self.chain.len() == 0
    }

    /// Returns true if items were ever pruned to respect the capacity.
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    /// Returns the type the sketch is bound to, or `None` if it has not seen any item yet.
    pub fn item_type(&self) -> Option<&T::Type> {
        self.item_type.as_ref()
    }

    /// Returns true if `item` is tracked.
    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    /// Counts one occurrence of `item`.
    ///
    /// An untyped sketch binds to the type of `item`. When the sketch is full and `item` is not
    /// tracked, the oldest item with the lowest count is evicted; `item` takes over its count
    /// plus one and records that count as its error bound.
    ///
    /// Fails with [`ErrorKind::TypeMismatch`](crate::error::ErrorKind::TypeMismatch), leaving
    /// the sketch unchanged, if `item` has a different type than the tracked items, and with
    /// [`ErrorKind::CountOverflow`](crate::error::ErrorKind::CountOverflow) if the total count is
    /// already `u64::MAX`.
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        let total = self
            .total
            .checked_add(1)
            .ok_or_else(|| Error::count_overflow("update"))?;
        self.bind_type(item.item_type())?;
        self.total = total;

        if let Some(&id) = self.index.get(&item) {
            self.chain.increment(id, 1);
            return Ok(());
        }

        if self.chain.len() < self.capacity {
            let bucket = self.chain.head_bucket_for(1);
            let id = self.chain.append(bucket, item.clone(), 0);
            self.index.insert(item, id);
            return Ok(());
        }

        let Some((id, evicted)) = self.chain.replace_min(item.clone()) else {
            unreachable!("a full sketch always has a lowest bucket");
        };
        self.index.remove(&evicted);
        self.index.insert(item, id);
        trace!(epsilon = self.chain.element(id).epsilon, "evicted least frequent item");
        Ok(())
    }

    /// Merges another sketch into this one without pruning.
    ///
    /// Counts and error bounds of items tracked by both sketches are summed; items only tracked
    /// by `other` are added with the count and error bound they have there. The result may track
    /// more than [`TopKSketch::capacity`] items, which lets several sketches be accumulated
    /// before a single [`TopKSketch::prune`].
    ///
    /// Merging an untyped sketch is a no-op; an untyped sketch adopts the type of `other`. Fails
    /// with [`ErrorKind::TypeMismatch`](crate::error::ErrorKind::TypeMismatch) if the types
    /// differ, or with [`ErrorKind::CountOverflow`](crate::error::ErrorKind::CountOverflow) if the
    /// combined counts exceed `u64::MAX`; the sketch is left unchanged in both cases.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        self.merge_inner(other)
    }

    /// Merges another sketch into this one, then prunes back to capacity.
    pub fn merge_and_prune(&mut self, other: &Self) -> Result<(), Error> {
        self.merge_inner(other)?;
        self.prune();
        Ok(())
    }

    /// Evicts the least frequent items until at most [`TopKSketch::capacity`] remain.
    ///
    /// Items are evicted from the lowest count upward, oldest first among equal counts. Returns
    /// the number of evicted items; any eviction marks the sketch as pruned.
    pub fn prune(&mut self) -> usize {
        let mut evicted = 0;
        while self.chain.len() > self.capacity {
            let Some((item, count)) = self.chain.pop_min() else {
                break;
            };
            self.index.remove(&item);
            self.total -= count;
            self.pruned = true;
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "pruned top-k sketch");
        }
        evicted
    }

    /// Returns the most frequent items, highest count first.
    ///
    /// Items sharing a count are never split: every bucket reached is returned whole, so the
    /// result may hold more than `k` items. It holds fewer only if fewer items are tracked.
    ///
    /// Fails with [`ErrorKind::EmptyQuery`](crate::error::ErrorKind::EmptyQuery) if the sketch is
    /// empty.
    pub fn top_k(&self, k: usize) -> Result<Vec<T>, Error> {
        Ok(self
            .heaviest(k)?
            .map(|(element, _)| element.item.clone())
            .collect())
    }

    /// Same as [`TopKSketch::top_k`], with the count and error bound of every item.
    pub fn top_k_rows(&self, k: usize) -> Result<Vec<Row<T>>, Error> {
        Ok(self
            .heaviest(k)?
            .map(|(element, count)| Row {
                item: element.item.clone(),
                count,
                epsilon: element.epsilon,
            })
            .collect())
    }

    /// Returns the estimated frequency of `item`.
    ///
    /// Fails with [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) if `item` is not
    /// tracked.
    pub fn count(&self, item: &T) -> Result<u64, Error> {
        let id = self.index.get(item).ok_or_else(|| Error::not_found("count"))?;
        Ok(self.chain.count_of(*id))
    }

    /// Returns the maximum overestimation of the frequency of `item`.
    ///
    /// Fails with [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) if `item` is not
    /// tracked.
    pub fn epsilon(&self, item: &T) -> Result<u64, Error> {
        let id = self
            .index
            .get(item)
            .ok_or_else(|| Error::not_found("epsilon"))?;
        Ok(self.chain.element(*id).epsilon)
    }

    /// Returns the sum of the counts of all tracked items.
    ///
    /// Until the sketch is pruned this is the number of items observed. Afterwards it is only
    /// a lower estimate, and a warning is logged on every call.
    pub fn sum(&self) -> u64 {
        let sum = self.total;
        if self.pruned {
            warn!(
                sum,
                "sum() was used on a pruned top-k sketch; the result does not represent the total element count"
            );
        }
        sum
    }

    /// Returns the tracked items with their count and error bound, lowest count first.
    pub fn iter(&self) -> impl Iterator<Item = (&T, u64, u64)> {
        self.chain
            .iter()
            .map(|(element, count)| (&element.item, count, element.epsilon))
    }

    /// Resets the sketch to an empty, untyped state.
    pub fn reset(&mut self) {
        *self = Self::new(self.capacity);
    }

    /// Serializes this sketch into a byte vector using the provided serializer.
    ///
    /// Fails with [`ErrorKind::ItemTooLarge`](crate::error::ErrorKind::ItemTooLarge) if the
    /// serializer cannot encode a tracked item.
    pub fn serialize_with<S: ItemSerde<T>>(&self, serde: &S) -> Result<Vec<u8>, Error> {
        let flags = if self.is_empty() { FLAGS_IS_EMPTY } else { 0 };
        let size_hint = 4 * 9 + self.chain.num_buckets() * 18 + self.num_elements() * 18;
        let mut fields = FieldWriter::new(flags, size_hint);

        fields.write_count(self.capacity as u64);
        fields.write_count(self.num_elements() as u64);
        fields.write_bool(self.pruned);
        match &self.item_type {
            Some(item_type) => serde.serialize_type(item_type, fields.begin_type()),
            None => fields.write_nil(),
        }

        for bucket in self.chain.buckets() {
            fields.write_count(bucket.len() as u64);
            fields.write_count(bucket.count());
            for element in bucket.elements() {
                fields.write_count(element.epsilon);
                serde.serialize_item(&element.item, fields.begin_value())?;
            }
        }
        Ok(fields.into_bytes())
    }

    /// Deserializes a sketch from bytes using the provided serializer.
    ///
    /// Fails with
    /// [`ErrorKind::MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if the bytes do not describe exactly one valid sketch.
    pub fn deserialize_with<S: ItemSerde<T>>(bytes: &[u8], serde: &S) -> Result<Self, Error> {
        let mut fields = FieldReader::new(bytes);
        let flags = fields.read_preamble()?;
        let capacity = fields.read_count("capacity")?;
        let num_elements = fields.read_count("num_elements")?;
        let pruned = fields.read_bool("pruned")?;
        let item_type = match fields.read_type_or_nil("item_type")? {
            Some(slice) => Some(serde.deserialize_type(slice)?),
            None => None,
        };

        if capacity == 0 {
            return Err(Error::deserial("capacity must be at least 1"));
        }
        let capacity = usize::try_from(capacity)
            .map_err(|_| Error::deserial(format!("capacity {capacity} is too large")))?;
        let num_elements = usize::try_from(num_elements)
            .map_err(|_| Error::deserial(format!("num_elements {num_elements} is too large")))?;
        let is_empty = (flags & FLAGS_IS_EMPTY) != 0;
        if is_empty != (num_elements == 0) {
            return Err(Error::deserial(
                "empty flag disagrees with the number of elements",
            )
            .with_context("num_elements", num_elements));
        }

        let mut sketch = Self::new(capacity);
        sketch.pruned = pruned;
        sketch.item_type = item_type;
        if num_elements > 0 {
            let Some(item_type) = sketch.item_type.clone() else {
                return Err(Error::deserial("untyped sketch with elements"));
            };
            sketch.decode_buckets(&mut fields, serde, num_elements, &item_type)?;
        }

        ensure_fully_consumed(fields.remaining())?;
        Ok(sketch)
    }

    fn decode_buckets<S: ItemSerde<T>>(
        &mut self,
        fields: &mut FieldReader<'_>,
        serde: &S,
        num_elements: usize,
        item_type: &T::Type,
    ) -> Result<(), Error> {
        let mut decoded = 0usize;
        let mut prev_count = 0u64;
        while decoded < num_elements {
            let bucket_size = fields.read_count("bucket_size")?;
            let count = fields.read_count("bucket_count")?;
            if bucket_size == 0 {
                return Err(Error::deserial("empty bucket").with_context("count", count));
            }
            if bucket_size > (num_elements - decoded) as u64 {
                return Err(Error::deserial(
                    "buckets hold more elements than declared",
                )
                .with_context("num_elements", num_elements));
            }
            if count <= prev_count {
                return Err(Error::deserial(format!(
                    "bucket count {count} does not exceed the previous bucket count {prev_count}"
                )));
            }

            self.total = count
                .checked_mul(bucket_size)
                .and_then(|bucket_total| self.total.checked_add(bucket_total))
                .ok_or_else(|| {
                    Error::deserial("sum of bucket counts overflows u64")
                        .with_context("count", count)
                })?;

            let bucket = self.chain.push_back_bucket(count);
            for _ in 0..bucket_size {
                let epsilon = fields.read_count("epsilon")?;
                if epsilon > count {
                    return Err(Error::deserial(format!(
                        "epsilon {epsilon} exceeds bucket count {count}"
                    )));
                }
                let item = serde.deserialize_item(fields.begin_value("item")?, item_type)?;
                if item.item_type() != *item_type {
                    return Err(Error::deserial(format!(
                        "item of type {:?} in a sketch of type {item_type:?}",
                        item.item_type()
                    )));
                }
                if self.index.contains_key(&item) {
                    return Err(Error::deserial("duplicate item").with_context("count", count));
                }
                let id = self.chain.append(bucket, item.clone(), epsilon);
                self.index.insert(item, id);
            }

            decoded += bucket_size as usize;
            prev_count = count;
        }
        Ok(())
    }

    fn merge_inner(&mut self, other: &Self) -> Result<(), Error> {
        let Some(other_type) = &other.item_type else {
            debug_assert!(other.is_empty());
            return Ok(());
        };
        // every merged count and epsilon is bounded by the merged total
        let total = self
            .total
            .checked_add(other.total)
            .ok_or_else(|| Error::count_overflow("merge"))?;
        self.bind_type(other_type.clone())?;
        self.total = total;

        for (element, count) in other.chain.iter() {
            let id = match self.index.get(&element.item) {
                Some(&id) => id,
                None => {
                    let bucket = self.chain.head_bucket_for(0);
                    let id = self.chain.append(bucket, element.item.clone(), 0);
                    self.index.insert(element.item.clone(), id);
                    id
                }
            };
            self.chain.element_mut(id).epsilon += element.epsilon;
            self.chain.increment(id, count);
        }

        debug!(
            merged = other.num_elements(),
            num_elements = self.num_elements(),
            capacity = self.capacity,
            "merged top-k sketch"
        );
        Ok(())
    }

    fn bind_type(&mut self, item_type: T::Type) -> Result<(), Error> {
        match &self.item_type {
            None => {
                self.item_type = Some(item_type);
                Ok(())
            }
            Some(bound) if *bound == item_type => Ok(()),
            Some(bound) => Err(Error::type_mismatch(bound, item_type)),
        }
    }

    /// Elements of the highest buckets, whole buckets at a time, until `k` are covered.
    fn heaviest(&self, k: usize) -> Result<impl Iterator<Item = (&Element<T>, u64)>, Error> {
        if self.is_empty() {
            return Err(Error::empty_query());
        }
        let mut emitted = 0;
        Ok(self
            .chain
            .buckets_rev()
            .take_while(move |bucket| {
                let more = emitted < k;
                emitted += bucket.len();
                more
            })
            .flat_map(|bucket| {
                let count = bucket.count();
                bucket.elements().map(move |element| (element, count))
            }))
    }

    #[cfg(test)]
    pub(super) fn validate_invariants(&self) {
        self.chain.validate_invariants();
        assert_eq!(self.index.len(), self.chain.len());
        let total: u64 = self
            .chain
            .buckets()
            .map(|bucket| bucket.count() * bucket.len() as u64)
            .sum();
        assert_eq!(self.total, total);
        for (item, &id) in &self.index {
            assert!(self.chain.element(id).item == *item);
        }
        if self.item_type.is_none() {
            assert!(self.is_empty());
        }
    }
}
