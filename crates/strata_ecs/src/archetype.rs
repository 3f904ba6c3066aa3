use crate::component::{Component, ComponentId, ComponentInfo};
use crate::entity::Entity;
use bitvec::vec::BitVec;
use std::any::Any;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(usize);

impl ArchetypeId {
    /// The archetype with no components. Every world creates it first.
    pub const EMPTY: ArchetypeId = ArchetypeId(0);

    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Bit set over component ids, used for query matching.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ComponentSet {
    bits: BitVec,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut set = Self::new();
        for &id in ids {
            set.insert(id);
        }
        set
    }

    pub fn insert(&mut self, id: ComponentId) {
        let index = id.index();
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        self.bits.set(index, true);
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.bits.get(id.index()).is_some_and(|bit| *bit)
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.bits
            .iter_ones()
            .all(|i| other.contains(ComponentId::new(i)))
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.bits
            .iter_ones()
            .all(|i| !other.contains(ComponentId::new(i)))
    }
}

/// A type-erased column. The concrete type is always a [`TypedColumn`]
/// created by the factory captured in [`ComponentInfo`].
pub(crate) trait ComponentColumn: Send + Sync + 'static {
    fn len(&self) -> usize;

    /// Appends a boxed value, handing it back if it is not of the column's
    /// element type.
    fn push_erased(&mut self, value: Box<dyn Any + Send>) -> Result<(), Box<dyn Any + Send>>;

    /// Swap-removes `row` and drops the value.
    fn swap_remove_drop(&mut self, row: usize);

    /// Swap-removes `row` and appends the value to `target`, which must be a
    /// column of the same component.
    fn swap_remove_into(&mut self, row: usize, target: &mut dyn ComponentColumn);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct TypedColumn<T: Component> {
    data: Vec<T>,
}

impl<T: Component> TypedColumn<T> {
    pub fn boxed(capacity: usize) -> Box<dyn ComponentColumn> {
        Box::new(Self {
            data: Vec::with_capacity(capacity),
        })
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }
}

impl<T: Component> ComponentColumn for TypedColumn<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn push_erased(&mut self, value: Box<dyn Any + Send>) -> Result<(), Box<dyn Any + Send>> {
        let value = value.downcast::<T>()?;
        self.data.push(*value);
        Ok(())
    }

    fn swap_remove_drop(&mut self, row: usize) {
        self.data.swap_remove(row);
    }

    fn swap_remove_into(&mut self, row: usize, target: &mut dyn ComponentColumn) {
        let value = self.data.swap_remove(row);
        let Some(target) = target.as_any_mut().downcast_mut::<Self>() else {
            panic!(
                "column for `{}` moved into a column of another type",
                std::any::type_name::<T>()
            );
        };
        target.data.push(value);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Rows of entities that share exactly one component set.
///
/// `columns[i]` stores the component `signature[i]`; every column and
/// `entities` always have the same length.
pub struct Archetype {
    id: ArchetypeId,
    signature: Box<[ComponentId]>,
    component_set: ComponentSet,
    columns: Vec<Box<dyn ComponentColumn>>,
    entities: Vec<Entity>,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, infos: &[&ComponentInfo], initial_capacity: usize) -> Self {
        let signature: Box<[ComponentId]> = infos.iter().map(|info| info.id()).collect();
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));

        Self {
            id,
            component_set: ComponentSet::from_ids(&signature),
            columns: infos
                .iter()
                .map(|info| info.new_column(initial_capacity))
                .collect(),
            entities: Vec::with_capacity(initial_capacity),
            signature,
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn signature(&self) -> &[ComponentId] {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.component_set.contains(id)
    }

    pub(crate) fn component_set(&self) -> &ComponentSet {
        &self.component_set
    }

    pub(crate) fn column_index(&self, id: ComponentId) -> Option<usize> {
        self.signature.binary_search(&id).ok()
    }

    pub(crate) fn column<T: Component>(&self, id: ComponentId) -> Option<&[T]> {
        let index = self.column_index(id)?;
        self.columns[index]
            .as_any()
            .downcast_ref::<TypedColumn<T>>()
            .map(TypedColumn::as_slice)
    }

    pub(crate) fn column_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut [T]> {
        let index = self.column_index(id)?;
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .map(TypedColumn::as_mut_slice)
    }

    /// Split borrow used by queries: the entity list, the signature and every
    /// column, mutably.
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&[Entity], &[ComponentId], &mut [Box<dyn ComponentColumn>]) {
        (&self.entities, &self.signature, &mut self.columns)
    }

    /// Appends a fully staged row. `values` must hold exactly one value per
    /// signature entry, in signature order.
    pub(crate) fn push_row(&mut self, entity: Entity, values: Vec<Box<dyn Any + Send>>) -> usize {
        assert_eq!(values.len(), self.columns.len(), "component count mismatch");
        for (column, value) in self.columns.iter_mut().zip(values) {
            if column.push_erased(value).is_err() {
                panic!("staged component does not match archetype column");
            }
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Removes `row` by swapping the last row into it, dropping every value.
    /// Returns the entity that now occupies `row`, if any moved.
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.finish_swap_remove(row)
    }

    /// Moves `row` into `target`. Columns the target lacks are dropped; the
    /// target must then be completed by pushing its remaining columns (at most
    /// the one component being added). Returns the new row in `target` and
    /// the entity relocated inside `self`.
    pub(crate) fn move_row(&mut self, row: usize, target: &mut Archetype) -> (usize, Option<Entity>) {
        let entity = self.entities[row];
        for (id, column) in self.signature.iter().zip(self.columns.iter_mut()) {
            match target.column_index(*id) {
                Some(index) => column.swap_remove_into(row, target.columns[index].as_mut()),
                None => column.swap_remove_drop(row),
            }
        }
        target.entities.push(entity);
        let moved = self.finish_swap_remove(row);
        (target.entities.len() - 1, moved)
    }

    /// Pushes the value of a component that the source archetype of a move
    /// did not have.
    pub(crate) fn push_component<T: Component>(&mut self, id: ComponentId, value: T) {
        let Some(index) = self.column_index(id) else {
            panic!("archetype {:?} has no column for {:?}", self.id, id);
        };
        match self.columns[index].as_any_mut().downcast_mut::<TypedColumn<T>>() {
            Some(column) => column.push(value),
            None => panic!("column {:?} is not a `{}` column", id, std::any::type_name::<T>()),
        }
    }

    fn finish_swap_remove(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);
        debug_assert!(self.columns.iter().all(|c| c.len() == self.entities.len()));
        self.entities.get(row).copied()
    }
}
