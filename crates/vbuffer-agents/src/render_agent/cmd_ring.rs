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

//! Per-slot synchronisation of a queue: one fence and one semaphore per
//! frame slot.

use std::sync::Arc;
use std::time::Duration;

use vbuffer_core::renderer::{Fence, FrameRing, RenderError, Semaphore};
use vbuffer_core::telemetry::QueueKind;

/// Synchronisation objects of one slot.
#[derive(Debug, Clone)]
pub struct CmdRingElement {
    /// Signalled when the slot's last submission on the queue completed.
    pub fence: Arc<Fence>,
    /// Signalled once per submission, waited by the other queue.
    pub semaphore: Arc<Semaphore>,
}

/// The fences and semaphores of one queue, indexed by frame slot.
#[derive(Debug)]
pub struct CmdRing {
    queue: QueueKind,
    ring: FrameRing<CmdRingElement>,
}

impl CmdRing {
    /// Creates `slot_count` elements for `queue`.
    pub fn new(queue: QueueKind, slot_count: usize) -> Result<Self, RenderError> {
        let ring = FrameRing::new(slot_count, |slot| CmdRingElement {
            fence: Arc::new(Fence::new(format!("{queue} fence {slot}"))),
            semaphore: Arc::new(Semaphore::new(format!("{queue} semaphore {slot}"))),
        })
        .ok_or_else(|| RenderError::Internal(format!("{queue} cmd ring needs at least one slot")))?;
        Ok(Self { queue, ring })
    }

    /// Queue the ring belongs to.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Frame slots in the ring.
    pub fn slot_count(&self) -> usize {
        self.ring.slot_count()
    }

    /// Element of slot `slot`.
    pub fn element(&self, slot: usize) -> Result<&CmdRingElement, RenderError> {
        self.ring.get(slot).ok_or_else(|| {
            RenderError::Internal(format!(
                "{} cmd ring has no slot {slot} ({} slots)",
                self.queue,
                self.ring.slot_count()
            ))
        })
    }

    /// Element used by frame `frame_count`.
    pub fn for_frame(&self, frame_count: u64) -> &CmdRingElement {
        self.ring.for_frame(frame_count)
    }

    /// Waits on every fence of the ring.
    ///
    /// All fences are waited even when one reports a failure; the first
    /// failure is returned.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        let mut first_error = None;
        for element in self.ring.iter() {
            if let Err(e) = element.fence.wait() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Consumes every pending semaphore signal.
    ///
    /// Only valid once the queues are idle, when no submission can still
    /// wait on these signals.
    pub fn drain_semaphores(&self) -> Result<u64, RenderError> {
        let mut drained = 0;
        for element in self.ring.iter() {
            while element.semaphore.wait_timeout(Duration::ZERO)? {
                drained += 1;
            }
        }
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::FenceStatus;

    #[test]
    fn test_elements_are_labelled_per_queue_and_slot() {
        let ring = CmdRing::new(QueueKind::Compute, 3).unwrap();
        assert_eq!(ring.slot_count(), 3);
        assert_eq!(ring.element(2).unwrap().fence.label(), "compute fence 2");
        assert_eq!(ring.for_frame(4).semaphore.label(), "compute semaphore 1");
        assert!(ring.element(3).is_err());
        assert!(CmdRing::new(QueueKind::Graphics, 0).is_err());
    }

    #[test]
    fn test_wait_idle_reports_a_failed_fence_once() {
        let ring = CmdRing::new(QueueKind::Graphics, 2).unwrap();
        let fence = &ring.element(1).unwrap().fence;
        fence.reset_for_submit().unwrap();
        fence.signal_failed("graphics", "boom").unwrap();

        assert!(matches!(
            ring.wait_idle(),
            Err(RenderError::QueueFailed { message, .. }) if message == "boom"
        ));
        assert!(ring.wait_idle().is_ok());
        assert_eq!(
            ring.element(0).unwrap().fence.status().unwrap(),
            FenceStatus::NotSubmitted
        );
    }

    #[test]
    fn test_drain_consumes_leftover_signals() {
        let ring = CmdRing::new(QueueKind::Compute, 2).unwrap();
        ring.element(0).unwrap().semaphore.signal().unwrap();
        ring.element(1).unwrap().semaphore.signal().unwrap();
        ring.element(1).unwrap().semaphore.signal().unwrap();
        assert_eq!(ring.drain_semaphores().unwrap(), 3);
        assert_eq!(ring.element(1).unwrap().semaphore.pending().unwrap(), 0);
    }
}
