// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-frame-in-flight slot rings.
//!
//! The pipeline keeps one copy of every per-frame resource per frame in
//! flight and indexes them with `frame_count % slot_count`:
//!
//! ```text
//! Frame N:     [Slot 0: GPU reads]  ← graphics consumes the filtered results
//! Frame N+1:   [Slot 1: CPU writes] → compute records the next filtering
//! Frame N+2:   [Slot 0: CPU writes] → reused once its fence completed
//! ```

/// A fixed ring of per-frame slots.
#[derive(Debug)]
pub struct FrameRing<T> {
    slots: Vec<T>,
    current_index: usize,
}

impl<T> FrameRing<T> {
    /// Builds `count` slots with `make(slot_index)`; `None` when `count` is 0.
    pub fn new(count: usize, make: impl FnMut(usize) -> T) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Some(Self {
            slots: (0..count).map(make).collect(),
            current_index: 0,
        })
    }

    /// Like [`FrameRing::new`] with a fallible constructor.
    pub fn try_new<E>(
        count: usize,
        mut make: impl FnMut(usize) -> Result<T, E>,
    ) -> Result<Option<Self>, E> {
        if count == 0 {
            return Ok(None);
        }
        let mut slots = Vec::with_capacity(count);
        for i in 0..count {
            slots.push(make(i)?);
        }
        Ok(Some(Self {
            slots,
            current_index: 0,
        }))
    }

    /// Moves to the next slot.
    pub fn advance(&mut self) {
        self.current_index = (self.current_index + 1) % self.slots.len();
    }

    /// Selects the slot of frame `frame_count` and returns its index.
    pub fn select(&mut self, frame_count: u64) -> usize {
        self.current_index = self.index_of(frame_count);
        self.current_index
    }

    /// Slot index used by frame `frame_count`.
    #[inline]
    pub fn index_of(&self, frame_count: u64) -> usize {
        (frame_count % self.slots.len() as u64) as usize
    }

    /// The current slot.
    pub fn current(&self) -> &T {
        &self.slots[self.current_index]
    }

    /// The current slot, mutably.
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current_index]
    }

    /// Slot by index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    /// Slot by index, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }

    /// Slot of frame `frame_count`.
    pub fn for_frame(&self, frame_count: u64) -> &T {
        &self.slots[self.index_of(frame_count)]
    }

    /// Index of the current slot.
    pub fn current_slot_index(&self) -> usize {
        self.current_index
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterates the slots in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_cycles() {
        let mut ring = FrameRing::new(3, |i| i * 10).unwrap();
        assert_eq!(*ring.current(), 0);
        ring.advance();
        ring.advance();
        assert_eq!(*ring.current(), 20);
        ring.advance();
        assert_eq!(ring.current_slot_index(), 0);

        assert_eq!(ring.select(7), 1);
        assert_eq!(*ring.current(), 10);
        assert_eq!(*ring.for_frame(5), 20);
        assert!(ring.get(3).is_none());
    }

    #[test]
    fn test_empty_ring_is_rejected() {
        assert!(FrameRing::new(0, |i| i).is_none());
        let built: Result<Option<FrameRing<usize>>, ()> = FrameRing::try_new(2, Ok);
        assert_eq!(built.unwrap().unwrap().slot_count(), 2);
        let failed: Result<Option<FrameRing<usize>>, &str> =
            FrameRing::try_new(2, |i| if i == 1 { Err("boom") } else { Ok(i) });
        assert_eq!(failed.unwrap_err(), "boom");
    }
}
