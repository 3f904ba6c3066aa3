use crate::archetype::{Archetype, ArchetypeId};
use crate::archetype_graph::ArchetypeGraph;
use crate::component::{ComponentId, ComponentRegistry};
use crate::entity::{Entity, EntityLocation};
use log::debug;
use std::ops::{Index, IndexMut};

/// All archetypes of a world, in creation order. Archetypes are never
/// removed while the world lives, so an [`ArchetypeId`] stays valid and the
/// list only grows.
pub struct Archetypes {
    graph: ArchetypeGraph,
    storage: Vec<Archetype>,
    initial_capacity: usize,
}

impl Archetypes {
    pub(crate) fn new(initial_capacity: usize) -> Self {
        let mut archetypes = Self {
            graph: ArchetypeGraph::default(),
            storage: Vec::new(),
            initial_capacity,
        };
        archetypes.reset();
        archetypes
    }

    /// Drops every archetype and recreates the empty one.
    pub(crate) fn reset(&mut self) {
        self.graph.clear();
        self.storage.clear();
        self.storage
            .push(Archetype::new(ArchetypeId::EMPTY, &[], self.initial_capacity));
        self.graph.insert(Box::new([]), ArchetypeId::EMPTY);
    }

    /// Returns the archetype for `components`, creating it if needed.
    /// `components` may be in any order but must only hold registered ids.
    pub(crate) fn get_or_create(
        &mut self,
        components: &mut Vec<ComponentId>,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        components.sort_unstable();
        components.dedup();

        if let Some(id) = self.graph.get(components) {
            return id;
        }

        let id = ArchetypeId::new(self.storage.len());
        let infos: Vec<_> = components
            .iter()
            .map(|&component| {
                registry
                    .get_info(component)
                    .unwrap_or_else(|| panic!("component {component:?} is not registered"))
            })
            .collect();

        debug!(
            "created archetype {:?} for [{}]",
            id,
            infos.iter().map(|info| info.name()).collect::<Vec<_>>().join(", ")
        );

        self.storage
            .push(Archetype::new(id, &infos, self.initial_capacity));
        self.graph.insert(components.as_slice().into(), id);
        id
    }

    pub(crate) fn get_add_component_destination(
        &mut self,
        start_id: ArchetypeId,
        component_id: ComponentId,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        if let Some(id) = self.graph.get_add_edge(start_id, component_id) {
            return id;
        }

        let mut signature = self.storage[start_id.index()].signature().to_vec();
        signature.push(component_id);
        let target = self.get_or_create(&mut signature, registry);
        self.graph.insert_edge(start_id, component_id, target);
        target
    }

    pub(crate) fn get_remove_component_destination(
        &mut self,
        start_id: ArchetypeId,
        component_id: ComponentId,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        if let Some(id) = self.graph.get_remove_edge(start_id, component_id) {
            return id;
        }

        let mut signature: Vec<_> = self.storage[start_id.index()]
            .signature()
            .iter()
            .copied()
            .filter(|&id| id != component_id)
            .collect();
        let target = self.get_or_create(&mut signature, registry);
        self.graph.insert_edge(target, component_id, start_id);
        target
    }

    /// Moves the row at `location` into `target_archetype_id`. Returns the new
    /// location and the entity that was swapped into the vacated source row.
    pub(crate) fn move_entity(
        &mut self,
        location: EntityLocation,
        target_archetype_id: ArchetypeId,
    ) -> (EntityLocation, Option<Entity>) {
        let (source_archetype, target_archetype) =
            self.pair_mut(location.archetype_id, target_archetype_id);

        let (new_row, moved_entity_in_source) =
            source_archetype.move_row(location.row, target_archetype);

        let new_location = EntityLocation {
            archetype_id: target_archetype_id,
            row: new_row,
        };

        (new_location, moved_entity_in_source)
    }

    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.storage.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Archetype> {
        self.storage.iter()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Archetype] {
        &mut self.storage
    }

    fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "cannot move an entity into its own archetype");
        let split = a.index().max(b.index());
        let (left, right) = self.storage.split_at_mut(split);
        if a.index() < b.index() {
            (&mut left[a.index()], &mut right[0])
        } else {
            (&mut right[0], &mut left[b.index()])
        }
    }
}

impl Index<ArchetypeId> for Archetypes {
    type Output = Archetype;

    fn index(&self, id: ArchetypeId) -> &Archetype {
        &self.storage[id.index()]
    }
}

impl IndexMut<ArchetypeId> for Archetypes {
    fn index_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.storage[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    struct A;
    impl Component for A {}
    struct B;
    impl Component for B {}

    #[test]
    fn empty_archetype_exists_up_front() {
        let archetypes = Archetypes::new(8);
        assert_eq!(archetypes.len(), 1);
        assert!(archetypes.get(ArchetypeId::EMPTY).unwrap().signature().is_empty());
    }

    #[test]
    fn signature_order_does_not_matter() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>();
        let b = registry.register::<B>();
        let mut archetypes = Archetypes::new(8);

        let ab = archetypes.get_or_create(&mut vec![a, b], &registry);
        let ba = archetypes.get_or_create(&mut vec![b, a, b], &registry);
        assert_eq!(ab, ba);
        assert_eq!(archetypes.len(), 2);
    }

    #[test]
    fn add_then_remove_returns_to_start() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>();
        let b = registry.register::<B>();
        let mut archetypes = Archetypes::new(8);

        let with_a = archetypes.get_add_component_destination(ArchetypeId::EMPTY, a, &registry);
        let with_ab = archetypes.get_add_component_destination(with_a, b, &registry);
        assert_eq!(
            archetypes.get_remove_component_destination(with_ab, b, &registry),
            with_a
        );

        let with_b = archetypes.get_remove_component_destination(with_ab, a, &registry);
        assert_eq!(archetypes.get(with_b).unwrap().signature(), &[b]);
        assert_eq!(archetypes.len(), 4);
    }
}
