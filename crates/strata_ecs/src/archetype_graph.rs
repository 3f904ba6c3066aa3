use crate::archetype::ArchetypeId;
use crate::component::ComponentId;
use std::collections::HashMap;

pub(crate) type ArchetypeSignature = Box<[ComponentId]>;

/// Interns signatures and remembers add/remove transitions between
/// archetypes so repeated `add`/`remove` calls skip the signature lookup.
#[derive(Default)]
pub(crate) struct ArchetypeGraph {
    by_signature: HashMap<ArchetypeSignature, ArchetypeId>,
    add_component_edges: HashMap<(ArchetypeId, ComponentId), ArchetypeId>,
    remove_component_edges: HashMap<(ArchetypeId, ComponentId), ArchetypeId>,
}

impl ArchetypeGraph {
    /// `signature` must be sorted and free of duplicates.
    pub fn get(&self, signature: &[ComponentId]) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    pub fn insert(&mut self, signature: ArchetypeSignature, id: ArchetypeId) {
        self.by_signature.insert(signature, id);
    }

    pub fn get_add_edge(&self, start: ArchetypeId, component: ComponentId) -> Option<ArchetypeId> {
        self.add_component_edges.get(&(start, component)).copied()
    }

    pub fn get_remove_edge(
        &self,
        start: ArchetypeId,
        component: ComponentId,
    ) -> Option<ArchetypeId> {
        self.remove_component_edges.get(&(start, component)).copied()
    }

    /// Records `smaller + component = larger` in both directions.
    pub fn insert_edge(&mut self, smaller: ArchetypeId, component: ComponentId, larger: ArchetypeId) {
        self.add_component_edges.insert((smaller, component), larger);
        self.remove_component_edges.insert((larger, component), smaller);
    }

    pub fn clear(&mut self) {
        self.by_signature.clear();
        self.add_component_edges.clear();
        self.remove_component_edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_recorded_both_ways() {
        let mut graph = ArchetypeGraph::default();
        let small = ArchetypeId::new(1);
        let large = ArchetypeId::new(2);
        let component = ComponentId::new(3);

        graph.insert_edge(small, component, large);

        assert_eq!(graph.get_add_edge(small, component), Some(large));
        assert_eq!(graph.get_remove_edge(large, component), Some(small));
        assert_eq!(graph.get_add_edge(large, component), None);
    }

    #[test]
    fn signatures_are_interned() {
        let mut graph = ArchetypeGraph::default();
        let signature: ArchetypeSignature = vec![ComponentId::new(0), ComponentId::new(2)].into();
        graph.insert(signature.clone(), ArchetypeId::new(4));
        assert_eq!(graph.get(&signature), Some(ArchetypeId::new(4)));
        assert_eq!(graph.get(&[ComponentId::new(0)]), None);
    }
}
