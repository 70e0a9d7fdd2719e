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

//! Resource states, barriers and state-tracked buffers.
//!
//! Every buffer shared between the compute and graphics queues is a
//! [`TrackedBuffer`]. Its element storage can only be borrowed while the
//! tracked [`ResourceState`] allows the access, and the state only changes
//! through a [`BufferBarrier`] whose `before` matches the tracked state.
//!
//! ```text
//! UNORDERED_ACCESS ──(barrier)──▶ SHADER_RESOURCE | INDIRECT_ARGUMENT
//!        ▲                                   │
//!        └────────────(barrier)──────────────┘
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::ResourceError;

crate::vbuffer_bitflags! {
    /// Usage a resource is currently transitioned to.
    pub struct ResourceState: u32 {
        /// Read/write access from compute kernels.
        const UNORDERED_ACCESS = 1 << 0;
        /// Read access from shaders.
        const SHADER_RESOURCE = 1 << 1;
        /// Read as indirect draw or dispatch arguments.
        const INDIRECT_ARGUMENT = 1 << 2;
        /// Read as the index buffer of draws.
        const INDEX_BUFFER = 1 << 3;
        /// Destination of CPU uploads and copies.
        const COPY_DEST = 1 << 4;
        /// Colour attachment of a render pass.
        const RENDER_TARGET = 1 << 5;
        /// Depth attachment of a render pass.
        const DEPTH_WRITE = 1 << 6;
        /// Handed to the presentation engine.
        const PRESENT = 1 << 7;
    }
}

impl ResourceState {
    /// States that allow writes.
    pub const WRITABLE: Self = Self(
        Self::UNORDERED_ACCESS.0 | Self::COPY_DEST.0 | Self::RENDER_TARGET.0 | Self::DEPTH_WRITE.0,
    );

    /// `true` when the state allows writes.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        self.intersects(Self::WRITABLE)
    }
}

/// A state transition of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    /// State the buffer must be in.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
}

impl BufferBarrier {
    /// Creates a transition.
    #[inline]
    pub const fn new(before: ResourceState, after: ResourceState) -> Self {
        Self { before, after }
    }

    /// The transition undoing this one.
    #[inline]
    pub const fn reversed(self) -> Self {
        Self {
            before: self.after,
            after: self.before,
        }
    }
}

/// A typed buffer with a tracked resource state.
#[derive(Debug)]
pub struct TrackedBuffer<T> {
    label: String,
    state: Mutex<ResourceState>,
    data: RwLock<Vec<T>>,
}

impl<T> TrackedBuffer<T> {
    /// Wraps `data` in a buffer starting in `state`.
    pub fn new(label: impl Into<String>, data: Vec<T>, state: ResourceState) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(state),
            data: RwLock::new(data),
        }
    }

    /// A buffer of `len` copies of `value`.
    pub fn filled(label: impl Into<String>, len: usize, value: T, state: ResourceState) -> Self
    where
        T: Clone,
    {
        Self::new(label, vec![value; len], state)
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Element count.
    pub fn len(&self) -> Result<usize, ResourceError> {
        Ok(self.data.read().map_err(|_| self.poisoned())?.len())
    }

    /// `true` for a zero-length buffer.
    pub fn is_empty(&self) -> Result<bool, ResourceError> {
        Ok(self.len()? == 0)
    }

    /// The tracked state.
    pub fn state(&self) -> Result<ResourceState, ResourceError> {
        Ok(*self.state.lock().map_err(|_| self.poisoned())?)
    }

    /// Applies a barrier.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidBarrier`] when `barrier.before` differs from
    /// the tracked state. The state is left untouched in that case.
    pub fn transition(&self, barrier: BufferBarrier) -> Result<(), ResourceError> {
        let mut state = self.state.lock().map_err(|_| self.poisoned())?;
        if *state != barrier.before {
            return Err(ResourceError::InvalidBarrier {
                label: self.label.clone(),
                before: barrier.before,
                actual: *state,
            });
        }
        *state = barrier.after;
        Ok(())
    }

    /// Borrows the elements for reading; the tracked state must intersect `usage`.
    pub fn read(&self, usage: ResourceState) -> Result<BufferReadGuard<'_, T>, ResourceError> {
        self.check_state(usage)?;
        let guard = self.data.read().map_err(|_| self.poisoned())?;
        Ok(BufferReadGuard { guard })
    }

    /// Borrows the elements for writing; the tracked state must be writable.
    pub fn write(&self) -> Result<BufferWriteGuard<'_, T>, ResourceError> {
        self.check_state(ResourceState::WRITABLE)?;
        let guard = self.data.write().map_err(|_| self.poisoned())?;
        Ok(BufferWriteGuard { guard })
    }

    /// CPU mapping of the storage, regardless of the tracked state.
    ///
    /// Only valid while no queue uses the buffer, i.e. after the fence of the
    /// last submission touching it has been waited on.
    pub fn map(&self) -> Result<BufferWriteGuard<'_, T>, ResourceError> {
        let guard = self.data.write().map_err(|_| self.poisoned())?;
        Ok(BufferWriteGuard { guard })
    }

    /// Copies the elements out, regardless of the tracked state.
    pub fn snapshot(&self) -> Result<Vec<T>, ResourceError>
    where
        T: Clone,
    {
        Ok(self.data.read().map_err(|_| self.poisoned())?.clone())
    }

    fn check_state(&self, required: ResourceState) -> Result<(), ResourceError> {
        let actual = self.state()?;
        if actual.intersects(required) {
            Ok(())
        } else {
            Err(ResourceError::StateMismatch {
                label: self.label.clone(),
                required,
                actual,
            })
        }
    }

    fn poisoned(&self) -> ResourceError {
        ResourceError::Poisoned(self.label.clone())
    }
}

/// Shared borrow of a [`TrackedBuffer`]'s elements.
pub struct BufferReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, Vec<T>>,
}

impl<T> Deref for BufferReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard
    }
}

/// Exclusive borrow of a [`TrackedBuffer`]'s elements.
pub struct BufferWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, Vec<T>>,
}

impl<T> Deref for BufferWriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard
    }
}

impl<T> DerefMut for BufferWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.guard
    }
}

impl<T> BufferWriteGuard<'_, T> {
    /// Replaces the whole content, resizing the storage.
    pub fn replace(&mut self, data: Vec<T>) {
        *self.guard = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_checks_before_state() {
        let buffer = TrackedBuffer::filled("args", 4, 0u32, ResourceState::SHADER_RESOURCE);
        let to_uav = BufferBarrier::new(
            ResourceState::SHADER_RESOURCE,
            ResourceState::UNORDERED_ACCESS,
        );
        buffer.transition(to_uav).unwrap();
        assert_eq!(buffer.state().unwrap(), ResourceState::UNORDERED_ACCESS);

        // Applying the same barrier twice is a mismatch.
        let err = buffer.transition(to_uav).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidBarrier { .. }));
        assert_eq!(buffer.state().unwrap(), ResourceState::UNORDERED_ACCESS);

        buffer.transition(to_uav.reversed()).unwrap();
        assert_eq!(buffer.state().unwrap(), ResourceState::SHADER_RESOURCE);
    }

    #[test]
    fn test_access_follows_state() {
        let buffer = TrackedBuffer::filled("indices", 3, 7u32, ResourceState::UNORDERED_ACCESS);
        buffer.write().unwrap()[1] = 9;
        assert!(buffer.read(ResourceState::INDEX_BUFFER).is_err());

        buffer
            .transition(BufferBarrier::new(
                ResourceState::UNORDERED_ACCESS,
                ResourceState::INDEX_BUFFER | ResourceState::SHADER_RESOURCE,
            ))
            .unwrap();
        assert_eq!(&*buffer.read(ResourceState::INDEX_BUFFER).unwrap(), &[7, 9, 7]);
        assert!(matches!(
            buffer.write(),
            Err(ResourceError::StateMismatch { .. })
        ));
        // CPU mapping ignores the state.
        buffer.map().unwrap()[0] = 1;
        assert_eq!(buffer.snapshot().unwrap(), vec![1, 9, 7]);
    }
}
