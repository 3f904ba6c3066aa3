use crate::archetype::ArchetypeId;
use std::fmt;

/// A lightweight handle to an entity stored in a [`World`](crate::world::World).
///
/// The `index` addresses a slot that is recycled after despawn; the
/// `generation` is bumped every time that happens, so a handle kept from
/// before the recycle compares unequal to the new occupant and is rejected
/// by every world operation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Sentinel handle that is never allocated to a live entity.
    pub const NULL: Entity = Entity {
        index: u32::MAX,
        generation: 0,
    };

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index, self.generation)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: ArchetypeId,
    pub row: usize,
}

struct EntitySlot {
    generation: u32,
    location: Option<EntityLocation>,
}

/// Generational allocator and location table.
///
/// A slot is live exactly when it holds a location; freed slots keep their
/// bumped generation until they are handed out again.
pub(crate) struct Entities {
    slots: Vec<EntitySlot>,
    free_list: Vec<u32>,
    alive: usize,
}

impl Entities {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            alive: 0,
        }
    }

    /// Hands out a handle and records where its row lives.
    pub fn alloc(&mut self, location: EntityLocation) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.location = Some(location);
            return Entity::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&index| index != Entity::NULL.index)
            .unwrap_or_else(|| panic!("entity index space exhausted"));
        self.slots.push(EntitySlot {
            generation: 0,
            location: Some(location),
        });
        Entity::new(index, 0)
    }

    /// Frees the slot and bumps its generation. Returns the last location of
    /// the entity, or `None` if the handle was already stale.
    pub fn free(&mut self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.live_slot_mut(entity)?;
        let location = slot.location.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(entity.index);
        self.alive -= 1;
        location
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    pub fn get(&self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.slots.get(entity.index as usize)?;
        if slot.generation != entity.generation {
            return None;
        }
        slot.location
    }

    /// Repoints a live entity at a new row. Used by archetype transitions and
    /// by swap-remove fix-ups.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        if let Some(slot) = self.live_slot_mut(entity) {
            slot.location = Some(location);
        }
    }

    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.alive = 0;
    }

    fn live_slot_mut(&mut self, entity: Entity) -> Option<&mut EntitySlot> {
        let slot = self.slots.get_mut(entity.index as usize)?;
        if slot.generation != entity.generation || slot.location.is_none() {
            return None;
        }
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize) -> EntityLocation {
        EntityLocation {
            archetype_id: ArchetypeId::EMPTY,
            row,
        }
    }

    #[test]
    fn allocates_sequential_indices() {
        let mut entities = Entities::with_capacity(4);
        let a = entities.alloc(loc(0));
        let b = entities.alloc(loc(1));
        assert_eq!((a.index(), a.generation()), (0, 0));
        assert_eq!((b.index(), b.generation()), (1, 0));
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn recycled_index_gets_new_generation() {
        let mut entities = Entities::with_capacity(4);
        let a = entities.alloc(loc(0));
        assert_eq!(entities.free(a), Some(loc(0)));
        let b = entities.alloc(loc(3));
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(!entities.contains(a));
        assert_eq!(entities.get(b), Some(loc(3)));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut entities = Entities::with_capacity(1);
        let a = entities.alloc(loc(0));
        assert!(entities.free(a).is_some());
        assert!(entities.free(a).is_none());
        assert_eq!(entities.len(), 0);
    }

    #[test]
    fn null_is_never_alive() {
        let mut entities = Entities::with_capacity(1);
        entities.alloc(loc(0));
        assert!(!entities.contains(Entity::NULL));
        assert!(Entity::NULL.is_null());
    }

    #[test]
    fn stale_handle_cannot_move_live_occupant() {
        let mut entities = Entities::with_capacity(1);
        let a = entities.alloc(loc(0));
        entities.free(a);
        let b = entities.alloc(loc(5));
        entities.set_location(a, loc(9));
        assert_eq!(entities.get(b), Some(loc(5)));
    }
}
