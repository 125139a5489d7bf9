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

//! The table mapping caller-assigned texture IDs to backend handles.
//!
//! Creation is split in two: the game thread [`reserve`](TextureRegistry::reserve)s
//! an ID, and the render thread later [`populate`](TextureRegistry::populate)s it
//! once the backend has produced a handle. Between the two the slot is
//! [`TextureSlot::Pending`], and [`retrieve`](TextureRegistry::retrieve) reports
//! "not yet available" rather than an error.

use crate::error::{TextureError, TextureResult};
use crate::texture::{NativeTextureHandle, TextureId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The state of a registered texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    /// The ID is reserved but the backend has not created the texture yet.
    Pending,
    /// The texture exists and is referenced by this handle.
    Ready(NativeTextureHandle),
}

impl TextureSlot {
    /// The handle, if the texture has been created.
    pub fn handle(self) -> Option<NativeTextureHandle> {
        match self {
            TextureSlot::Pending => None,
            TextureSlot::Ready(handle) => Some(handle),
        }
    }
}

/// A thread-safe registry of textures, shared by the game and render threads.
///
/// The registry never touches GPU objects; it only records which handle the
/// active backend associated with each ID.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    slots: RwLock<HashMap<TextureId, TextureSlot>>,
}

impl TextureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TextureId, TextureSlot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TextureId, TextureSlot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves `id` with no handle yet.
    ///
    /// Fails with [`TextureError::DuplicateId`] if the ID is already live, in
    /// which case the existing entry is left untouched.
    pub fn reserve(&self, id: TextureId) -> TextureResult<()> {
        let mut slots = self.write();
        if slots.contains_key(&id) {
            return Err(TextureError::DuplicateId(id));
        }
        slots.insert(id, TextureSlot::Pending);
        Ok(())
    }

    /// Records the handle created for a reserved `id`.
    ///
    /// Fails with [`TextureError::UnknownId`] if the reservation was removed in
    /// the meantime; the caller then owns `handle` and must release it.
    pub fn populate(&self, id: TextureId, handle: NativeTextureHandle) -> TextureResult<()> {
        match self.write().get_mut(&id) {
            Some(slot) => {
                *slot = TextureSlot::Ready(handle);
                Ok(())
            }
            None => Err(TextureError::UnknownId(id)),
        }
    }

    /// Drops a reservation whose creation failed.
    pub fn release(&self, id: TextureId) {
        let mut slots = self.write();
        if slots.get(&id) == Some(&TextureSlot::Pending) {
            slots.remove(&id);
        }
    }

    /// Looks up the handle for `id`.
    ///
    /// Returns `Ok(None)` while the texture is still pending and
    /// [`TextureError::UnknownId`] if it was never created or has been removed.
    pub fn retrieve(&self, id: TextureId) -> TextureResult<Option<NativeTextureHandle>> {
        self.read()
            .get(&id)
            .map(|slot| slot.handle())
            .ok_or(TextureError::UnknownId(id))
    }

    /// Removes `id` and returns its last state.
    pub fn remove(&self, id: TextureId) -> TextureResult<TextureSlot> {
        self.write().remove(&id).ok_or(TextureError::UnknownId(id))
    }

    /// Removes every entry and returns them, in no particular order.
    pub fn drain(&self) -> Vec<(TextureId, TextureSlot)> {
        self.write().drain().collect()
    }

    /// Returns `true` if `id` is live (pending or ready).
    pub fn contains(&self, id: TextureId) -> bool {
        self.read().contains_key(&id)
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no texture is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn handle(raw: usize) -> NativeTextureHandle {
        NativeTextureHandle::new(raw).unwrap()
    }

    #[test]
    fn test_reserve_then_populate() {
        let registry = TextureRegistry::new();
        registry.reserve(TextureId(7)).unwrap();
        assert_eq!(registry.retrieve(TextureId(7)), Ok(None));

        registry.populate(TextureId(7), handle(0x40)).unwrap();
        assert_eq!(registry.retrieve(TextureId(7)), Ok(Some(handle(0x40))));
    }

    #[test]
    fn test_duplicate_reserve_keeps_first_entry() {
        let registry = TextureRegistry::new();
        registry.reserve(TextureId(7)).unwrap();
        registry.populate(TextureId(7), handle(1)).unwrap();

        assert_eq!(
            registry.reserve(TextureId(7)),
            Err(TextureError::DuplicateId(TextureId(7)))
        );
        assert_eq!(registry.retrieve(TextureId(7)), Ok(Some(handle(1))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let registry = TextureRegistry::new();
        assert_eq!(
            registry.retrieve(TextureId(3)),
            Err(TextureError::UnknownId(TextureId(3)))
        );
        assert_eq!(
            registry.remove(TextureId(3)),
            Err(TextureError::UnknownId(TextureId(3)))
        );
    }

    #[test]
    fn test_populate_after_removal_fails() {
        let registry = TextureRegistry::new();
        registry.reserve(TextureId(1)).unwrap();
        registry.remove(TextureId(1)).unwrap();
        assert_eq!(
            registry.populate(TextureId(1), handle(2)),
            Err(TextureError::UnknownId(TextureId(1)))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_only_drops_pending() {
        let registry = TextureRegistry::new();
        registry.reserve(TextureId(1)).unwrap();
        registry.reserve(TextureId(2)).unwrap();
        registry.populate(TextureId(2), handle(9)).unwrap();

        registry.release(TextureId(1));
        registry.release(TextureId(2));
        assert!(!registry.contains(TextureId(1)));
        assert!(registry.contains(TextureId(2)));
    }

    #[test]
    fn test_id_reusable_after_remove() {
        let registry = TextureRegistry::new();
        registry.reserve(TextureId(5)).unwrap();
        assert_eq!(registry.remove(TextureId(5)), Ok(TextureSlot::Pending));
        registry.reserve(TextureId(5)).unwrap();
    }

    #[test]
    fn test_drain() {
        let registry = TextureRegistry::new();
        for id in 0..4 {
            registry.reserve(TextureId(id)).unwrap();
        }
        registry.populate(TextureId(2), handle(0x20)).unwrap();
        let drained = registry.drain();
        assert_eq!(drained.len(), 4);
        assert_eq!(
            drained.iter().filter_map(|(_, slot)| slot.handle()).collect::<Vec<_>>(),
            vec![handle(0x20)]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        let registry = Arc::new(TextureRegistry::new());
        let winners: usize = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.reserve(TextureId(42)).is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
