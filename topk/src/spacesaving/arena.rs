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

//! Index-addressed slot storage for elements and buckets.

use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;

/// A typed index into an [`Arena`].
pub(super) trait Handle: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! define_handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub(super) struct $name(usize);

        impl Handle for $name {
            fn from_index(index: usize) -> Self {
                $name(index)
            }

            fn index(self) -> usize {
                self.0
            }
        }
    };
}

define_handle!(ElementId);
define_handle!(BucketId);

/// Slots are reused through a free list, so a handle stays valid until its value is removed.
#[derive(Debug, Clone)]
pub(super) struct Arena<H, T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Arena<H, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _handle: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                debug_assert!(self.slots[index].is_none());
                self.slots[index] = Some(value);
                H::from_index(index)
            }
            None => {
                self.slots.push(Some(value));
                H::from_index(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, handle: H) -> Option<T> {
        let value = self.slots.get_mut(handle.index())?.take()?;
        self.free.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    #[cfg(test)]
    pub fn get(&self, handle: H) -> Option<&T> {
        self.slots.get(handle.index())?.as_ref()
    }
}

impl<H: Handle, T> Index<H> for Arena<H, T> {
    type Output = T;

    fn index(&self, handle: H) -> &T {
        match self.slots.get(handle.index()) {
            Some(Some(value)) => value,
            _ => panic!("stale arena handle {}", handle.index()),
        }
    }
}

impl<H: Handle, T> IndexMut<H> for Arena<H, T> {
    fn index_mut(&mut self, handle: H) -> &mut T {
        match self.slots.get_mut(handle.index()) {
            Some(Some(value)) => value,
            _ => panic!("stale arena handle {}", handle.index()),
        }
    }
}
