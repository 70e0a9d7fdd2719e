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

//! CPU/GPU and queue/queue synchronisation primitives.
//!
//! A [`Fence`] tells the CPU when a submission finished; a [`Semaphore`]
//! orders one queue's submission after another's. Both are shared through
//! `Arc` between the frame driver and the queue workers.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::error::{RenderError, ResourceError};

/// Progress of the last submission associated with a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The submission finished.
    Complete,
    /// The submission is queued or running.
    Incomplete,
    /// Nothing was ever submitted with this fence.
    NotSubmitted,
}

#[derive(Debug)]
struct FenceState {
    status: FenceStatus,
    failure: Option<(String, String)>,
}

/// Signalled by a queue when a submission completes.
#[derive(Debug)]
pub struct Fence {
    label: String,
    state: Mutex<FenceState>,
    cvar: Condvar,
}

impl Fence {
    /// A fence that was never submitted.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(FenceState {
                status: FenceStatus::NotSubmitted,
                failure: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current status.
    pub fn status(&self) -> Result<FenceStatus, ResourceError> {
        Ok(self.lock()?.status)
    }

    /// Marks the fence as pending a new submission.
    pub fn reset_for_submit(&self) -> Result<(), ResourceError> {
        self.lock()?.status = FenceStatus::Incomplete;
        Ok(())
    }

    /// Called by the queue once the submission ran.
    pub fn signal(&self) -> Result<(), ResourceError> {
        self.lock()?.status = FenceStatus::Complete;
        self.cvar.notify_all();
        Ok(())
    }

    /// Called by the queue when the submission failed; the failure is
    /// reported by the next [`Fence::wait`].
    pub fn signal_failed(
        &self,
        queue: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.status = FenceStatus::Complete;
        state.failure = Some((queue.into(), message.into()));
        self.cvar.notify_all();
        Ok(())
    }

    /// Blocks until the fence is not [`FenceStatus::Incomplete`].
    ///
    /// Returns immediately for a never-submitted fence.
    ///
    /// # Errors
    ///
    /// [`RenderError::QueueFailed`] when the submission failed.
    pub fn wait(&self) -> Result<(), RenderError> {
        let mut state = self.lock()?;
        while state.status == FenceStatus::Incomplete {
            state = self
                .cvar
                .wait(state)
                .map_err(|_| ResourceError::Poisoned(self.label.clone()))?;
        }
        Self::take_failure(&mut state)
    }

    /// Like [`Fence::wait`] with a deadline; returns `Ok(false)` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, RenderError> {
        let state = self.lock()?;
        let (mut state, result) = self
            .cvar
            .wait_timeout_while(state, timeout, |s| s.status == FenceStatus::Incomplete)
            .map_err(|_| ResourceError::Poisoned(self.label.clone()))?;
        if result.timed_out() {
            return Ok(false);
        }
        Self::take_failure(&mut state)?;
        Ok(true)
    }

    fn take_failure(state: &mut FenceState) -> Result<(), RenderError> {
        match state.failure.take() {
            Some((queue, message)) => Err(RenderError::QueueFailed { queue, message }),
            None => Ok(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FenceState>, ResourceError> {
        self.state
            .lock()
            .map_err(|_| ResourceError::Poisoned(self.label.clone()))
    }
}

/// A counting semaphore: each signal releases exactly one wait.
#[derive(Debug)]
pub struct Semaphore {
    label: String,
    count: Mutex<u64>,
    cvar: Condvar,
}

impl Semaphore {
    /// An unsignalled semaphore.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: Mutex::new(0),
            cvar: Condvar::new(),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Adds one signal.
    pub fn signal(&self) -> Result<(), ResourceError> {
        *self.lock()? += 1;
        self.cvar.notify_one();
        Ok(())
    }

    /// Blocks until a signal is available and consumes it.
    pub fn wait(&self) -> Result<(), ResourceError> {
        let mut count = self.lock()?;
        while *count == 0 {
            count = self
                .cvar
                .wait(count)
                .map_err(|_| ResourceError::Poisoned(self.label.clone()))?;
        }
        *count -= 1;
        Ok(())
    }

    /// Like [`Semaphore::wait`] with a deadline; returns `Ok(false)` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, ResourceError> {
        let count = self.lock()?;
        let (mut count, result) = self
            .cvar
            .wait_timeout_while(count, timeout, |c| *c == 0)
            .map_err(|_| ResourceError::Poisoned(self.label.clone()))?;
        if result.timed_out() {
            return Ok(false);
        }
        *count -= 1;
        Ok(true)
    }

    /// Signals not consumed yet.
    pub fn pending(&self) -> Result<u64, ResourceError> {
        Ok(*self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, u64>, ResourceError> {
        self.count
            .lock()
            .map_err(|_| ResourceError::Poisoned(self.label.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fence_lifecycle() {
        let fence = Arc::new(Fence::new("graphics[0]"));
        assert_eq!(fence.status().unwrap(), FenceStatus::NotSubmitted);
        fence.wait().unwrap();

        fence.reset_for_submit().unwrap();
        assert_eq!(fence.status().unwrap(), FenceStatus::Incomplete);
        assert!(!fence.wait_timeout(Duration::from_millis(5)).unwrap());

        let remote = Arc::clone(&fence);
        let worker = thread::spawn(move || remote.signal().unwrap());
        fence.wait().unwrap();
        worker.join().unwrap();
        assert_eq!(fence.status().unwrap(), FenceStatus::Complete);
    }

    #[test]
    fn test_fence_reports_failure_once() {
        let fence = Fence::new("compute[1]");
        fence.reset_for_submit().unwrap();
        fence.signal_failed("compute", "index out of range").unwrap();
        assert!(matches!(
            fence.wait(),
            Err(RenderError::QueueFailed { .. })
        ));
        fence.wait().unwrap();
    }

    #[test]
    fn test_semaphore_counts_signals() {
        let sem = Semaphore::new("compute-done");
        sem.signal().unwrap();
        sem.signal().unwrap();
        assert_eq!(sem.pending().unwrap(), 2);
        sem.wait().unwrap();
        assert!(sem.wait_timeout(Duration::from_millis(1)).unwrap());
        assert!(!sem.wait_timeout(Duration::from_millis(1)).unwrap());
    }
}
