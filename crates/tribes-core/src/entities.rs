use tribes_protocol::{EntityId, StoreLayout};

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Deterministic, generational storage for units and cities.
///
/// - Stable iteration order: ascending slot index.
/// - Safe handles: a removed entity's id never resolves again.
#[derive(Clone, Debug)]
pub struct EntityStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> EntityStore<T> {
    pub fn insert(&mut self, value: T) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            EntityId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            EntityId::new(index, 0)
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(value)
    }

    pub fn get2_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut T, &mut T)> {
        if a.index == b.index {
            return None;
        }

        let (low, high, a_is_low) = if a.index < b.index {
            (a, b, true)
        } else {
            (b, a, false)
        };

        let high_index = high.index as usize;
        if high_index >= self.slots.len() {
            return None;
        }

        let (left, right) = self.slots.split_at_mut(high_index);
        let low_slot = left.get_mut(low.index as usize)?;
        let high_slot = right.get_mut(0)?;

        if low_slot.generation != low.generation || high_slot.generation != high.generation {
            return None;
        }

        let low_val = low_slot.value.as_mut()?;
        let high_val = high_slot.value.as_mut()?;

        if a_is_low {
            Some((low_val, high_val))
        } else {
            Some((high_val, low_val))
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((EntityId::new(index as u32, slot.generation), value))
        })
    }

    pub fn iter_ordered_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let value = slot.value.as_mut()?;
                Some((EntityId::new(index as u32, slot.generation), value))
            })
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.iter_ordered().map(|(id, _)| id).collect()
    }

    /// Slot generations and free list, for snapshots.
    pub fn layout(&self) -> StoreLayout {
        StoreLayout {
            generations: self.slots.iter().map(|s| s.generation).collect(),
            free: self.free.clone(),
        }
    }

    /// Rebuild a store from live entries plus the layout they were saved with.
    ///
    /// Returns `None` if two entries claim the same slot. An empty layout (older snapshots)
    /// is derived from the entries; vacant slots then start at generation 0.
    pub fn restore(entries: Vec<(EntityId, T)>, layout: &StoreLayout) -> Option<Self> {
        let needed = entries
            .iter()
            .map(|(id, _)| id.index as usize + 1)
            .max()
            .unwrap_or(0)
            .max(layout.generations.len());

        let mut slots: Vec<Slot<T>> = (0..needed)
            .map(|i| Slot {
                generation: layout.generations.get(i).copied().unwrap_or(0),
                value: None,
            })
            .collect();

        for (id, value) in entries {
            let slot = &mut slots[id.index as usize];
            if slot.value.is_some() {
                return None;
            }
            slot.generation = id.generation;
            slot.value = Some(value);
        }

        let free = if layout.generations.is_empty() {
            slots
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, s)| s.value.is_none())
                .map(|(i, _)| i as u32)
                .collect()
        } else {
            layout
                .free
                .iter()
                .copied()
                .filter(|&i| slots.get(i as usize).is_some_and(|s| s.value.is_none()))
                .collect()
        };

        Some(Self { slots, free })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut store = EntityStore::default();
        let a = store.insert("a");
        assert_eq!(store.remove(a), Some("a"));
        let b = store.insert("b");
        assert_eq!(a.index, b.index);
        assert!(store.get(a).is_none());
        assert_eq!(store.get(b), Some(&"b"));
    }

    #[test]
    fn restore_keeps_future_ids() {
        let mut store = EntityStore::default();
        let a = store.insert(1);
        let b = store.insert(2);
        let _c = store.insert(3);
        store.remove(a);
        store.remove(b);

        let entries = store.iter_ordered().map(|(id, v)| (id, *v)).collect();
        let mut restored = EntityStore::restore(entries, &store.layout()).unwrap();

        assert_eq!(store.insert(9), restored.insert(9));
        assert_eq!(store.insert(10), restored.insert(10));
    }

    #[test]
    fn restore_rejects_duplicate_slots() {
        let id = EntityId::new(0, 0);
        assert!(EntityStore::restore(vec![(id, 1), (id, 2)], &StoreLayout::default()).is_none());
    }
}
