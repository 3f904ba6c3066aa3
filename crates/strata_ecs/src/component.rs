use crate::archetype::{ComponentColumn, TypedColumn};
use log::debug;
use std::any::{TypeId, type_name};
use std::collections::HashMap;

pub use strata_macros::Component;

/// Plain data that can be attached to an entity.
///
/// Zero-sized components act as tags: they only take part in archetype
/// signatures and query filters.
pub trait Component: Send + Sync + 'static {}

/// Dense per-world component index. Ids are handed out by
/// [`World::register`](crate::world::World::register) and mean nothing in any
/// other world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Everything the storage needs to know about a component type, captured at
/// registration time.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    id: ComponentId,
    type_id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
    new_column: fn(usize) -> Box<dyn ComponentColumn>,
}

impl ComponentInfo {
    fn of<T: Component>(id: ComponentId) -> Self {
        Self {
            id,
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            new_column: TypedColumn::<T>::boxed,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn is_tag(&self) -> bool {
        self.size == 0
    }

    /// Builds an empty column for this component using the factory captured
    /// at registration.
    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn ComponentColumn> {
        (self.new_column)(capacity)
    }
}

/// Per-world table of registered component types.
#[derive(Default)]
pub struct ComponentRegistry {
    type_to_id: HashMap<TypeId, ComponentId>,
    components: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register<T: Component>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.type_to_id.get(&type_id) {
            return id;
        }

        let id = ComponentId::new(self.components.len());
        let info = ComponentInfo::of::<T>(id);
        debug!(
            "registered component {} as {:?} (size {}, align {})",
            info.name, id, info.size, info.align
        );

        self.type_to_id.insert(type_id, id);
        self.components.push(info);
        id
    }

    pub fn get_id<T: Component>(&self) -> Option<ComponentId> {
        self.get_id_by_type(TypeId::of::<T>())
    }

    pub fn get_id_by_type(&self, type_id: TypeId) -> Option<ComponentId> {
        self.type_to_id.get(&type_id).copied()
    }

    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentInfo> {
        self.components.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.type_to_id.clear();
        self.components.clear();
    }
}
