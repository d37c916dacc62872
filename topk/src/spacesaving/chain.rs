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

//! The stream-summary structure: buckets of equal-count elements, ordered by count.
//!
//! Elements and buckets live in two arenas owned by the chain. An element records the handle of
//! its bucket and of its neighbours inside that bucket; a bucket records its first and last
//! element and its neighbours in the chain. The chain upholds:
//!
//! - bucket counts are strictly increasing from head to tail,
//! - every bucket holds at least one element,
//! - elements inside a bucket keep their insertion order (head is the oldest).

use crate::spacesaving::arena::Arena;
use crate::spacesaving::arena::BucketId;
use crate::spacesaving::arena::ElementId;

#[derive(Debug, Clone)]
pub(super) struct Element<T> {
    pub(super) item: T,
    pub(super) epsilon: u64,
    bucket: BucketId,
    prev: Option<ElementId>,
    next: Option<ElementId>,
}

#[derive(Debug, Clone)]
struct Bucket {
    count: u64,
    len: usize,
    head: Option<ElementId>,
    tail: Option<ElementId>,
    prev: Option<BucketId>,
    next: Option<BucketId>,
}

#[derive(Debug, Clone)]
pub(super) struct BucketChain<T> {
    elements: Arena<ElementId, Element<T>>,
    buckets: Arena<BucketId, Bucket>,
    head: Option<BucketId>,
    tail: Option<BucketId>,
}

impl<T> BucketChain<T> {
    pub fn new() -> Self {
        Self {
            elements: Arena::new(),
            buckets: Arena::new(),
            head: None,
            tail: None,
        }
    }

    /// Number of elements across all buckets.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn element(&self, id: ElementId) -> &Element<T> {
        &self.elements[id]
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut Element<T> {
        &mut self.elements[id]
    }

    /// Count of the bucket currently owning `id`.
    pub fn count_of(&self, id: ElementId) -> u64 {
        self.buckets[self.elements[id].bucket].count
    }

    /// Returns the head bucket if it holds `count`, otherwise splices a new bucket with `count`
    /// in front of it. `count` must not exceed the count of the current head.
    pub fn head_bucket_for(&mut self, count: u64) -> BucketId {
        if let Some(head) = self.head {
            let head_count = self.buckets[head].count;
            if head_count == count {
                return head;
            }
            debug_assert!(count < head_count, "{count} would precede bucket {head_count}");
        }
        self.link_bucket(count, None, self.head)
    }

    /// Appends a bucket after the current tail. `count` must exceed the count of the tail.
    pub fn push_back_bucket(&mut self, count: u64) -> BucketId {
        debug_assert!(self.tail.is_none_or(|tail| self.buckets[tail].count < count));
        self.link_bucket(count, self.tail, None)
    }

    /// Appends a new element at the end of `bucket`.
    pub fn append(&mut self, bucket: BucketId, item: T, epsilon: u64) -> ElementId {
        let id = self.elements.insert(Element {
            item,
            epsilon,
            bucket,
            prev: None,
            next: None,
        });
        self.attach(bucket, id);
        id
    }

    /// Moves `id` from its bucket (count `c`) to the bucket for `c + delta`.
    ///
    /// The target is searched forward from the current bucket only. When no bucket holds the
    /// target count, one is created right before the first bucket with a greater count. The
    /// source bucket is released once it runs empty.
    pub fn increment(&mut self, id: ElementId, delta: u64) {
        if delta == 0 {
            return;
        }
        let current = self.elements[id].bucket;
        let target_count = self.buckets[current].count + delta;

        let mut prev = current;
        let mut cursor = self.buckets[current].next;
        while let Some(bucket) = cursor {
            if self.buckets[bucket].count >= target_count {
                break;
            }
            prev = bucket;
            cursor = self.buckets[bucket].next;
        }
        let target = match cursor {
            Some(bucket) if self.buckets[bucket].count == target_count => bucket,
            _ => self.link_bucket(target_count, Some(prev), cursor),
        };

        self.detach(id);
        self.attach(target, id);
        self.release_if_empty(current);
    }

    /// Removes the oldest element of the lowest bucket, returning its item and count.
    pub fn pop_min(&mut self) -> Option<(T, u64)> {
        let head = self.head?;
        let victim = self.buckets[head].head?;
        let count = self.buckets[head].count;
        self.detach(victim);
        self.release_if_empty(head);
        let element = self.elements.remove(victim)?;
        Some((element.item, count))
    }

    /// Takes over the slot of the oldest element of the lowest bucket.
    ///
    /// The new element inherits the victim's count as its error bound and is then counted once.
    /// Returns the new element and the evicted item.
    pub fn replace_min(&mut self, item: T) -> Option<(ElementId, T)> {
        let head = self.head?;
        let victim = self.buckets[head].head?;
        let count = self.buckets[head].count;

        let id = self.append(head, item, count);
        self.detach(victim);
        let evicted = self.elements.remove(victim)?;
        self.increment(id, 1);
        Some((id, evicted.item))
    }

    /// Buckets from the lowest count to the highest.
    pub fn buckets(&self) -> Buckets<'_, T> {
        Buckets {
            chain: self,
            cursor: self.head,
            ascending: true,
        }
    }

    /// Buckets from the highest count to the lowest.
    pub fn buckets_rev(&self) -> Buckets<'_, T> {
        Buckets {
            chain: self,
            cursor: self.tail,
            ascending: false,
        }
    }

    /// All elements with their counts, in ascending bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&Element<T>, u64)> {
        self.buckets().flat_map(|bucket| {
            let count = bucket.count();
            bucket.elements().map(move |element| (element, count))
        })
    }

    fn link_bucket(
        &mut self,
        count: u64,
        prev: Option<BucketId>,
        next: Option<BucketId>,
    ) -> BucketId {
        let id = self.buckets.insert(Bucket {
            count,
            len: 0,
            head: None,
            tail: None,
            prev,
            next,
        });
        match prev {
            Some(prev) => self.buckets[prev].next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(next) => self.buckets[next].prev = Some(id),
            None => self.tail = Some(id),
        }
        id
    }

    fn release_if_empty(&mut self, id: BucketId) {
        if self.buckets[id].len > 0 {
            return;
        }
        let (prev, next) = {
            let bucket = &self.buckets[id];
            (bucket.prev, bucket.next)
        };
        match prev {
            Some(prev) => self.buckets[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.buckets[next].prev = prev,
            None => self.tail = prev,
        }
        self.buckets.remove(id);
    }

    fn attach(&mut self, bucket: BucketId, id: ElementId) {
        let tail = self.buckets[bucket].tail;
        {
            let element = &mut self.elements[id];
            element.bucket = bucket;
            element.prev = tail;
            element.next = None;
        }
        match tail {
            Some(tail) => self.elements[tail].next = Some(id),
            None => self.buckets[bucket].head = Some(id),
        }
        let bucket = &mut self.buckets[bucket];
        bucket.tail = Some(id);
        bucket.len += 1;
    }

    // Leaves the bucket in the chain even when it runs empty.
    fn detach(&mut self, id: ElementId) {
        let (bucket, prev, next) = {
            let element = &self.elements[id];
            (element.bucket, element.prev, element.next)
        };
        match prev {
            Some(prev) => self.elements[prev].next = next,
            None => self.buckets[bucket].head = next,
        }
        match next {
            Some(next) => self.elements[next].prev = prev,
            None => self.buckets[bucket].tail = prev,
        }
        self.buckets[bucket].len -= 1;
    }

    #[cfg(test)]
    pub fn validate_invariants(&self) {
        let mut seen_buckets = 0;
        let mut seen_elements = 0;
        let mut prev_bucket: Option<BucketId> = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let bucket = &self.buckets[id];
            assert_eq!(bucket.prev, prev_bucket);
            if let Some(prev) = prev_bucket {
                assert!(self.buckets[prev].count < bucket.count);
            }
            assert!(bucket.len > 0, "bucket {} is empty", bucket.count);

            let mut prev_element = None;
            let mut len = 0;
            let mut element_cursor = bucket.head;
            while let Some(element_id) = element_cursor {
                let element = &self.elements[element_id];
                assert_eq!(element.bucket, id);
                assert_eq!(element.prev, prev_element);
                prev_element = Some(element_id);
                element_cursor = element.next;
                len += 1;
            }
            assert_eq!(bucket.tail, prev_element);
            assert_eq!(bucket.len, len);

            seen_buckets += 1;
            seen_elements += len;
            prev_bucket = Some(id);
            cursor = bucket.next;
        }
        assert_eq!(self.tail, prev_bucket);
        assert_eq!(self.buckets.len(), seen_buckets);
        assert_eq!(self.elements.len(), seen_elements);
    }
}

pub(super) struct Buckets<'a, T> {
    chain: &'a BucketChain<T>,
    cursor: Option<BucketId>,
    ascending: bool,
}

impl<'a, T> Iterator for Buckets<'a, T> {
    type Item = BucketRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let bucket = &self.chain.buckets[id];
        self.cursor = if self.ascending {
            bucket.next
        } else {
            bucket.prev
        };
        Some(BucketRef {
            chain: self.chain,
            id,
        })
    }
}

pub(super) struct BucketRef<'a, T> {
    chain: &'a BucketChain<T>,
    id: BucketId,
}

impl<'a, T> BucketRef<'a, T> {
    pub fn count(&self) -> u64 {
        self.chain.buckets[self.id].count
    }

    pub fn len(&self) -> usize {
        self.chain.buckets[self.id].len
    }

    /// Elements of this bucket, oldest first.
    pub fn elements(&self) -> Elements<'a, T> {
        Elements {
            chain: self.chain,
            cursor: self.chain.buckets[self.id].head,
        }
    }
}

pub(super) struct Elements<'a, T> {
    chain: &'a BucketChain<T>,
    cursor: Option<ElementId>,
}

impl<'a, T> Iterator for Elements<'a, T> {
    type Item = &'a Element<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let element = &self.chain.elements[self.cursor?];
        self.cursor = element.next;
        Some(element)
    }
}
