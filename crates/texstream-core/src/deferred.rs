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

//! Frame-tagged deferred destruction.
//!
//! GPU commands recorded during frame `N` may still be executing long after the
//! render thread has moved on. Resources they reference are therefore retired
//! into a [`DeferredDestructionQueue`] tagged with the frame in which they were
//! superseded, and only handed back for release once the host reports that
//! frame as complete (its "safe" frame number). No per-resource fence is used;
//! the host's frame watermark is the sole synchronization mechanism.

use std::collections::BTreeMap;

/// An ordered queue of retired resources keyed by the frame that retired them.
#[derive(Debug)]
pub struct DeferredDestructionQueue<T> {
    pending: BTreeMap<u64, Vec<T>>,
}

impl<T> DeferredDestructionQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Retires `item` as of `frame`. It will not be collected until the safe
    /// frame number reaches `frame`.
    pub fn retire(&mut self, frame: u64, item: T) {
        self.pending.entry(frame).or_default().push(item);
    }

    /// Removes and returns every item retired at or before `safe_frame`,
    /// oldest frame first.
    pub fn collect(&mut self, safe_frame: u64) -> Vec<T> {
        let retained = match safe_frame.checked_add(1) {
            Some(bound) => self.pending.split_off(&bound),
            None => BTreeMap::new(),
        };
        let expired = std::mem::replace(&mut self.pending, retained);
        expired.into_values().flatten().collect()
    }

    /// Removes and returns every item regardless of its frame.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.collect(u64::MAX)
    }

    /// The number of items waiting for release.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is waiting for release.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The oldest frame that still has items waiting.
    pub fn oldest_frame(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }
}

impl<T> Default for DeferredDestructionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_collected_before_safe() {
        let mut queue = DeferredDestructionQueue::new();
        queue.retire(5, "a");
        assert!(queue.collect(4).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_collected_once_frame_is_safe() {
        let mut queue = DeferredDestructionQueue::new();
        queue.retire(5, "a");
        assert_eq!(queue.collect(5), vec!["a"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_collect_is_a_watermark_sweep() {
        let mut queue = DeferredDestructionQueue::new();
        queue.retire(3, 3);
        queue.retire(7, 7);
        queue.retire(1, 1);
        queue.retire(3, 33);

        assert_eq!(queue.collect(3), vec![1, 3, 33]);
        assert_eq!(queue.oldest_frame(), Some(7));
        assert_eq!(queue.len(), 1);

        assert!(queue.collect(6).is_empty());
        assert_eq!(queue.collect(100), vec![7]);
    }

    #[test]
    fn test_drain_all_ignores_watermark() {
        let mut queue = DeferredDestructionQueue::new();
        queue.retire(10, 'x');
        queue.retire(u64::MAX, 'y');
        assert_eq!(queue.drain_all(), vec!['x', 'y']);
        assert!(queue.is_empty());
        assert_eq!(queue.oldest_frame(), None);
    }

    #[test]
    fn test_never_released_early_for_any_watermark() {
        for tag in 0..20u64 {
            for safe in 0..20u64 {
                let mut queue = DeferredDestructionQueue::new();
                queue.retire(tag, ());
                let released = queue.collect(safe).len();
                assert_eq!(released == 1, safe >= tag, "tag {tag}, safe {safe}");
            }
        }
    }
}
