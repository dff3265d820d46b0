use super::payload::SharedPayload;
use crate::atlas::Region;
use crate::sprite::SpriteLayout;
use glam::UVec2;
use serde::Serialize;
use std::fmt;

/// Stable identity of a sprite slot.
///
/// The generation changes whenever a slot is released, so an id kept by a
/// dropped handle never aliases the slot's next owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpriteId {
    index: u32,
    generation: u32,
}

impl SpriteId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Packing-relevant metadata of one registered sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub id: SpriteId,
    pub desired_size: UVec2,
}

impl Descriptor {
    pub fn area(&self) -> u64 {
        self.desired_size.x as u64 * self.desired_size.y as u64
    }
}

struct Entry {
    descriptor: Descriptor,
    /// `None` until the next repack assigns a region.
    region: Option<Region>,
    payload: SharedPayload,
    layout: SpriteLayout,
    sequence: u64,
    pending: bool,
}

enum SlotState {
    Vacant,
    Unregistered,
    Registered(Entry),
}

struct Slot {
    generation: u32,
    state: SlotState,
}

/// Everything needed to draw one pending sprite.
pub(crate) struct DrawTarget {
    pub region: Region,
    pub payload: SharedPayload,
    pub layout: SpriteLayout,
}

/// Arena of sprite slots plus the dirty flag and the per-frame pending set.
#[derive(Default)]
pub struct SpriteRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    registered: usize,
    next_sequence: u64,
    pending: Vec<SpriteId>,
    dirty: bool,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an unregistered slot.
    pub fn reserve(&mut self) -> SpriteId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Unregistered;
            return SpriteId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Unregistered,
        });
        SpriteId {
            index,
            generation: 0,
        }
    }

    /// Returns the slot to the free list. Returns false for stale ids.
    pub fn release(&mut self, id: SpriteId) -> bool {
        self.remove(id);
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.state = SlotState::Vacant;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    pub fn insert(
        &mut self,
        id: SpriteId,
        desired_size: UVec2,
        payload: SharedPayload,
        layout: SpriteLayout,
    ) -> bool {
        let sequence = self.next_sequence;
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        if !matches!(slot.state, SlotState::Unregistered) {
            return false;
        }

        slot.state = SlotState::Registered(Entry {
            descriptor: Descriptor { id, desired_size },
            region: None,
            payload,
            layout,
            sequence,
            pending: false,
        });
        self.next_sequence += 1;
        self.registered += 1;
        self.dirty = true;
        true
    }

    /// Drops the descriptor and region. The registry only turns dirty while
    /// other sprites remain to be repacked.
    pub fn remove(&mut self, id: SpriteId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        if !matches!(slot.state, SlotState::Registered(_)) {
            return false;
        }

        slot.state = SlotState::Unregistered;
        self.registered -= 1;
        self.pending.retain(|pending| *pending != id);
        if self.registered > 0 {
            self.dirty = true;
        }
        true
    }

    pub fn set_desired_size(&mut self, id: SpriteId, desired_size: UVec2) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        entry.descriptor.desired_size = desired_size;
        self.dirty = true;
        true
    }

    /// Queues a sprite for this frame's draw pass with its current layout.
    pub fn mark_pending(&mut self, id: SpriteId, layout: SpriteLayout) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        entry.layout = layout;
        if !entry.pending {
            entry.pending = true;
            self.pending.push(id);
        }
        true
    }

    pub fn is_registered(&self, id: SpriteId) -> bool {
        self.entry(id).is_some()
    }

    pub fn descriptor(&self, id: SpriteId) -> Option<Descriptor> {
        self.entry(id).map(|entry| entry.descriptor)
    }

    pub fn region(&self, id: SpriteId) -> Option<Region> {
        self.entry(id).and_then(|entry| entry.region)
    }

    /// All descriptors, largest area first, ties in registration order.
    pub fn descriptors_by_area(&self) -> Vec<Descriptor> {
        let mut entries: Vec<&Entry> = self
            .slots
            .iter()
            .filter_map(|slot| match &slot.state {
                SlotState::Registered(entry) => Some(entry),
                _ => None,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.descriptor
                .area()
                .cmp(&a.descriptor.area())
                .then(a.sequence.cmp(&b.sequence))
        });
        entries.into_iter().map(|entry| entry.descriptor).collect()
    }

    pub fn assign_region(&mut self, id: SpriteId, region: Region) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        entry.region = Some(region);
        true
    }

    pub(crate) fn draw_target(&self, id: SpriteId) -> Option<DrawTarget> {
        let entry = self.entry(id)?;
        Some(DrawTarget {
            region: entry.region?,
            payload: entry.payload.clone(),
            layout: entry.layout,
        })
    }

    /// Empties the pending set, returning the queued ids.
    pub fn take_pending(&mut self) -> Vec<SpriteId> {
        let pending = std::mem::take(&mut self.pending);
        for id in &pending {
            if let Some(entry) = self.entry_mut(*id) {
                entry.pending = false;
            }
        }
        pending
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Unregisters everything and invalidates every outstanding id.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !matches!(slot.state, SlotState::Vacant) {
                slot.state = SlotState::Vacant;
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        self.registered = 0;
        self.pending.clear();
        self.dirty = false;
    }

    fn slot_mut(&mut self, id: SpriteId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .filter(|slot| !matches!(slot.state, SlotState::Vacant))
    }

    fn entry(&self, id: SpriteId) -> Option<&Entry> {
        let slot = self.slots.get(id.index as usize)?;
        match &slot.state {
            SlotState::Registered(entry) if slot.generation == id.generation => Some(entry),
            _ => None,
        }
    }

    fn entry_mut(&mut self, id: SpriteId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        match &mut slot.state {
            SlotState::Registered(entry) if slot.generation == id.generation => Some(entry),
            _ => None,
        }
    }
}
