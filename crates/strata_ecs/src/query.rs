//! Typed queries over archetype columns.
//!
//! A query names the data it reads with a [`QueryData`] type (`&T`,
//! `&mut T`, `Option<&T>`, [`Entity`], or a tuple of those) and may narrow
//! the match with [`Query::with`] and [`Query::without`]. An archetype
//! matches when it holds every required component and none of the excluded
//! ones; iteration walks matching archetypes in creation order and their rows
//! in order, handing out references straight into the columns.
//!
//! ```ignore
//! let mut query = world.query::<(Entity, &Position, &mut Velocity)>().without::<Frozen>();
//! for (entity, position, velocity) in &mut query {
//!     velocity.x += position.x;
//! }
//! ```
//!
//! A [`Query`] borrows the world mutably, so no structural change can happen
//! while rows are being enumerated. Use a
//! [`CommandBuffer`](crate::commands::CommandBuffer) to record changes and
//! apply them afterwards.

use crate::archetype::{Archetype, ArchetypeId, ComponentColumn, ComponentSet, TypedColumn};
use crate::archetypes::Archetypes;
use crate::component::{Component, ComponentId, ComponentRegistry};
use crate::entity::Entity;
use crate::world::World;
use std::collections::HashMap;
use std::marker::PhantomData;
use variadics_please::all_tuples;

/// Something that can be fetched for every row of a matching archetype.
pub trait QueryData {
    type Item<'w>;
    type Fetch<'w>;

    /// Appends the components every matching archetype must hold. Returns
    /// `false` if one of them is not registered, in which case nothing can
    /// match.
    fn required(registry: &ComponentRegistry, out: &mut Vec<ComponentId>) -> bool;

    fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w>;

    fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>>;
}

/// The columns of one archetype, handed out at most once each.
pub struct FetchColumns<'w> {
    registry: &'w ComponentRegistry,
    entities: &'w [Entity],
    signature: &'w [ComponentId],
    slots: Vec<Option<&'w mut Box<dyn ComponentColumn>>>,
}

impl<'w> FetchColumns<'w> {
    fn new(registry: &'w ComponentRegistry, archetype: &'w mut Archetype) -> Self {
        let (entities, signature, columns) = archetype.parts_mut();
        Self {
            registry,
            entities,
            signature,
            slots: columns.iter_mut().map(Some).collect(),
        }
    }

    pub fn entities(&self) -> &'w [Entity] {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Takes the column of `T`, or `None` if the archetype lacks it.
    ///
    /// # Panics
    ///
    /// Panics if the column was already taken by another part of the same
    /// query.
    fn take<T: Component>(&mut self) -> Option<&'w mut [T]> {
        let id = self.registry.get_id::<T>()?;
        let index = self.signature.binary_search(&id).ok()?;
        let Some(slot) = self.slots[index].take() else {
            panic!(
                "query accesses `{}` more than once",
                std::any::type_name::<T>()
            );
        };
        let column: &'w mut dyn ComponentColumn = &mut **slot;
        column
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .map(TypedColumn::as_mut_slice)
    }
}

impl<T: Component> QueryData for &T {
    type Item<'w> = &'w T;
    type Fetch<'w> = std::slice::Iter<'w, T>;

    fn required(registry: &ComponentRegistry, out: &mut Vec<ComponentId>) -> bool {
        registry.get_id::<T>().map(|id| out.push(id)).is_some()
    }

    fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w> {
        let slice: &'w [T] = columns.take::<T>().unwrap_or_default();
        slice.iter()
    }

    fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>> {
        fetch.next()
    }
}

impl<T: Component> QueryData for &mut T {
    type Item<'w> = &'w mut T;
    type Fetch<'w> = std::slice::IterMut<'w, T>;

    fn required(registry: &ComponentRegistry, out: &mut Vec<ComponentId>) -> bool {
        registry.get_id::<T>().map(|id| out.push(id)).is_some()
    }

    fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w> {
        columns.take::<T>().unwrap_or_default().iter_mut()
    }

    fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>> {
        fetch.next()
    }
}

pub struct OptionFetch<'w, T> {
    column: Option<std::slice::Iter<'w, T>>,
    remaining: usize,
}

impl<T: Component> QueryData for Option<&T> {
    type Item<'w> = Option<&'w T>;
    type Fetch<'w> = OptionFetch<'w, T>;

    fn required(_: &ComponentRegistry, _: &mut Vec<ComponentId>) -> bool {
        true
    }

    fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w> {
        let remaining = columns.len();
        let column = columns.take::<T>().map(|slice| {
            let slice: &'w [T] = slice;
            slice.iter()
        });
        OptionFetch { column, remaining }
    }

    fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>> {
        if fetch.remaining == 0 {
            return None;
        }
        fetch.remaining -= 1;
        Some(fetch.column.as_mut().and_then(Iterator::next))
    }
}

impl QueryData for Entity {
    type Item<'w> = Entity;
    type Fetch<'w> = std::iter::Copied<std::slice::Iter<'w, Entity>>;

    fn required(_: &ComponentRegistry, _: &mut Vec<ComponentId>) -> bool {
        true
    }

    fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w> {
        columns.entities().iter().copied()
    }

    fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>> {
        fetch.next()
    }
}

macro_rules! impl_query_data_tuple {
    ($($name: ident),*) => {
        #[allow(non_snake_case)]
        impl<$($name: QueryData),*> QueryData for ($($name,)*) {
            type Item<'w> = ($($name::Item<'w>,)*);
            type Fetch<'w> = ($($name::Fetch<'w>,)*);

            fn required(registry: &ComponentRegistry, out: &mut Vec<ComponentId>) -> bool {
                true $(&& $name::required(registry, out))*
            }

            fn init_fetch<'w>(columns: &mut FetchColumns<'w>) -> Self::Fetch<'w> {
                ($($name::init_fetch(columns),)*)
            }

            fn fetch_next<'w>(fetch: &mut Self::Fetch<'w>) -> Option<Self::Item<'w>> {
                let ($($name,)*) = fetch;
                Some(($($name::fetch_next($name)?,)*))
            }
        }
    };
}

all_tuples!(impl_query_data_tuple, 1, 12, D);

/// Cache key: every component a match must hold, and every component it must
/// not hold. Both lists are sorted.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct QueryKey {
    all: Box<[ComponentId]>,
    none: Box<[ComponentId]>,
}

struct CachedMatches {
    all: ComponentSet,
    none: ComponentSet,
    archetypes: Vec<ArchetypeId>,
    seen: usize,
}

impl CachedMatches {
    fn new(key: &QueryKey) -> Self {
        Self {
            all: ComponentSet::from_ids(&key.all),
            none: ComponentSet::from_ids(&key.none),
            archetypes: Vec::new(),
            seen: 0,
        }
    }

    /// Archetypes are only ever appended, so refreshing means testing the
    /// ones created since the last visit.
    fn refresh(&mut self, archetypes: &Archetypes) {
        for archetype in archetypes.iter().skip(self.seen) {
            let set = archetype.component_set();
            if self.all.is_subset(set) && self.none.is_disjoint(set) {
                self.archetypes.push(archetype.id());
            }
        }
        self.seen = archetypes.len();
    }
}

/// Matching archetype lists per distinct filter, owned by the world.
#[derive(Default)]
pub(crate) struct QueryCache {
    entries: HashMap<QueryKey, CachedMatches>,
}

impl QueryCache {
    fn matches(&mut self, key: &QueryKey, archetypes: &Archetypes) -> &[ArchetypeId] {
        if !self.entries.contains_key(key) {
            self.entries.insert(key.clone(), CachedMatches::new(key));
        }
        let Some(cached) = self.entries.get_mut(key) else {
            return &[];
        };
        cached.refresh(archetypes);
        &cached.archetypes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A filtered, restartable view over every entity whose archetype matches.
pub struct Query<'w, D: QueryData> {
    world: &'w mut World,
    required: Vec<ComponentId>,
    with: Vec<ComponentId>,
    without: Vec<ComponentId>,
    matches_nothing: bool,
    _marker: PhantomData<fn() -> D>,
}

impl<'w, D: QueryData> Query<'w, D> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        let mut required = Vec::new();
        let matches_nothing = !D::required(&world.components, &mut required);

        let mut sorted = required.clone();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            let name = world
                .components
                .get_info(pair[0])
                .map_or("<unknown>", |info| info.name());
            panic!("query accesses `{name}` more than once");
        }

        Self {
            world,
            required: sorted,
            with: Vec::new(),
            without: Vec::new(),
            matches_nothing,
            _marker: PhantomData,
        }
    }

    /// Only match entities that also carry `T`. An unregistered `T` makes the
    /// query match nothing.
    pub fn with<T: Component>(mut self) -> Self {
        match self.world.components.get_id::<T>() {
            Some(id) => self.with.push(id),
            None => self.matches_nothing = true,
        }
        self
    }

    /// Skip entities that carry `T`. An unregistered `T` excludes nothing.
    pub fn without<T: Component>(mut self) -> Self {
        if let Some(id) = self.world.components.get_id::<T>() {
            self.without.push(id);
        }
        self
    }

    /// Starts a fresh pass over the current matches.
    pub fn iter(&mut self) -> QueryIter<'_, D> {
        let key = self.key();
        QueryIter::new(self.world, key.as_ref())
    }

    /// Number of matching entities, without fetching any component.
    pub fn count(&mut self) -> usize {
        self.matched_archetypes().map(Archetype::len).sum()
    }

    pub fn is_empty(&mut self) -> bool {
        self.count() == 0
    }

    /// Handles of every matching entity, in iteration order.
    pub fn entities(&mut self) -> Vec<Entity> {
        self.matched_archetypes()
            .flat_map(|archetype| archetype.entities().iter().copied())
            .collect()
    }

    fn matched_archetypes(&mut self) -> impl Iterator<Item = &Archetype> {
        let key = self.key();
        let World {
            archetypes,
            query_cache,
            ..
        } = &mut *self.world;
        let archetypes: &Archetypes = archetypes;
        let ids: &[ArchetypeId] = match &key {
            Some(key) => query_cache.matches(key, archetypes),
            None => &[],
        };
        ids.iter().map(move |&id| &archetypes[id])
    }

    fn key(&self) -> Option<QueryKey> {
        if self.matches_nothing {
            return None;
        }
        let mut all: Vec<_> = self.required.iter().chain(&self.with).copied().collect();
        all.sort_unstable();
        all.dedup();
        let mut none = self.without.clone();
        none.sort_unstable();
        none.dedup();
        Some(QueryKey {
            all: all.into(),
            none: none.into(),
        })
    }
}

impl<'q, 'w, D: QueryData> IntoIterator for &'q mut Query<'w, D> {
    type Item = D::Item<'q>;
    type IntoIter = QueryIter<'q, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'w, D: QueryData> IntoIterator for Query<'w, D> {
    type Item = D::Item<'w>;
    type IntoIter = QueryIter<'w, D>;

    fn into_iter(self) -> Self::IntoIter {
        let key = self.key();
        QueryIter::new(self.world, key.as_ref())
    }
}

/// Lazily walks the matching archetypes; columns of an archetype are only
/// borrowed once iteration reaches it.
pub struct QueryIter<'w, D: QueryData> {
    registry: &'w ComponentRegistry,
    archetypes: std::slice::IterMut<'w, Archetype>,
    next_index: usize,
    matched: std::slice::Iter<'w, ArchetypeId>,
    current: Option<D::Fetch<'w>>,
}

impl<'w, D: QueryData> QueryIter<'w, D> {
    fn new(world: &'w mut World, key: Option<&QueryKey>) -> Self {
        let World {
            components,
            archetypes,
            query_cache,
            ..
        } = world;
        let matched: &'w [ArchetypeId] = match key {
            Some(key) => query_cache.matches(key, archetypes),
            None => &[],
        };
        Self {
            registry: components,
            archetypes: archetypes.as_mut_slice().iter_mut(),
            next_index: 0,
            matched: matched.iter(),
            current: None,
        }
    }
}

impl<'w, D: QueryData> Iterator for QueryIter<'w, D> {
    type Item = D::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fetch) = &mut self.current {
                if let Some(item) = D::fetch_next(fetch) {
                    return Some(item);
                }
                self.current = None;
            }

            let id = *self.matched.next()?;
            let archetype = self.archetypes.nth(id.index() - self.next_index)?;
            self.next_index = id.index() + 1;
            if archetype.is_empty() {
                continue;
            }

            let mut columns = FetchColumns::new(self.registry, archetype);
            self.current = Some(D::init_fetch(&mut columns));
        }
    }
}
