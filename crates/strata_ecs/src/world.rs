use crate::archetype::ArchetypeId;
use crate::archetypes::Archetypes;
use crate::component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
use crate::entity::{Entities, Entity, EntityLocation};
use crate::error::{EcsError, Result};
use crate::events::EventHub;
use crate::hierarchy::Hierarchy;
use crate::naming::Names;
use crate::plugin::Plugins;
use crate::query::{Query, QueryCache, QueryData};
use crate::schedule::Schedules;
use crate::singleton::TypeSlots;
use log::{debug, trace};
use std::any::{Any, TypeId, type_name};

/// Sizing hints for a new [`World`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Rows reserved in every newly created archetype.
    pub initial_column_capacity: usize,
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_column_capacity: 64,
            entity_capacity: 0,
        }
    }
}

/// An isolated ECS universe.
///
/// Nothing is shared between worlds: component ids, archetypes, events,
/// systems, singletons and plugins all belong to one world only.
pub struct World {
    config: WorldConfig,
    entities: Entities,
    pub(crate) components: ComponentRegistry,
    pub(crate) archetypes: Archetypes,
    pub(crate) query_cache: QueryCache,
    pub(crate) events: EventHub,
    pub(crate) schedules: Schedules,
    pub(crate) singletons: TypeSlots,
    pub(crate) extensions: TypeSlots,
    pub(crate) plugins: Plugins,
    pub(crate) hierarchy: Hierarchy,
    pub(crate) names: Names,
    disposed: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            entities: Entities::with_capacity(config.entity_capacity),
            components: ComponentRegistry::new(),
            archetypes: Archetypes::new(config.initial_column_capacity),
            query_cache: QueryCache::default(),
            events: EventHub::default(),
            schedules: Schedules::default(),
            singletons: TypeSlots::new(),
            extensions: TypeSlots::new(),
            plugins: Plugins::default(),
            hierarchy: Hierarchy::default(),
            names: Names::default(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(EcsError::Disposed);
        }
        Ok(())
    }

    pub(crate) fn ensure_alive(&self, entity: Entity) -> Result<()> {
        self.location(entity).map(|_| ())
    }

    fn location(&self, entity: Entity) -> Result<EntityLocation> {
        self.entities
            .get(entity)
            .ok_or(EcsError::EntityNotAlive(entity))
    }

    /// Registers `T` with this world, returning its id. Registering again
    /// returns the same id.
    pub fn register<T: Component>(&mut self) -> Result<ComponentId> {
        self.ensure_live()?;
        Ok(self.components.register::<T>())
    }

    pub fn is_registered<T: Component>(&self) -> bool {
        self.components.get_id::<T>().is_some()
    }

    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.get_id::<T>()
    }

    pub fn component_info<T: Component>(&self) -> Option<&ComponentInfo> {
        self.components
            .get_id::<T>()
            .and_then(|id| self.components.get_info(id))
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn archetypes(&self) -> &Archetypes {
        &self.archetypes
    }

    /// Starts building an entity. Nothing is stored until
    /// [`EntityBuilder::build`].
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        EntityBuilder {
            world: self,
            name: None,
            components: Vec::new(),
        }
    }

    pub fn spawn_named(&mut self, name: impl Into<String>) -> EntityBuilder<'_> {
        self.spawn().named(name)
    }

    /// Spawns an entity with no components.
    pub fn spawn_empty(&mut self) -> Result<Entity> {
        self.spawn().build()
    }

    /// Removes `entity` and all its components. Children are orphaned, the
    /// name is released and destroyed-handlers run afterwards. Component
    /// removed-handlers do not run.
    pub fn despawn(&mut self, entity: Entity) -> Result<()> {
        self.ensure_live()?;
        let location = self
            .entities
            .free(entity)
            .ok_or(EcsError::EntityNotAlive(entity))?;

        if let Some(moved) = self.archetypes[location.archetype_id].swap_remove(location.row) {
            self.entities.set_location(moved, location);
        }
        self.hierarchy.remove(entity);
        self.names.remove(entity);

        trace!("despawned {entity:?}");
        EventHub::emit_entity_destroyed(self, entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Every live entity, grouped by archetype.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.archetypes
            .iter()
            .flat_map(|archetype| archetype.entities().iter().copied())
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn archetype_of(&self, entity: Entity) -> Option<ArchetypeId> {
        self.entities.get(entity).map(|location| location.archetype_id)
    }

    pub fn entity_location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.get(entity)
    }

    /// Never fails; `false` for dead entities and unregistered types.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let (Some(location), Some(id)) = (self.entities.get(entity), self.components.get_id::<T>())
        else {
            return false;
        };
        self.archetypes[location.archetype_id].contains(id)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.ensure_live()?;
        let location = self.location(entity)?;
        let missing = || EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        let id = self.components.get_id::<T>().ok_or_else(missing)?;
        self.archetypes[location.archetype_id]
            .column::<T>(id)
            .map(|column| &column[location.row])
            .ok_or_else(missing)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        self.ensure_live()?;
        let location = self.location(entity)?;
        let missing = || EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        let id = self.components.get_id::<T>().ok_or_else(missing)?;
        self.archetypes[location.archetype_id]
            .column_mut::<T>(id)
            .map(|column| &mut column[location.row])
            .ok_or_else(missing)
    }

    /// Overwrites the value of a component the entity already has. Never
    /// changes the archetype and never fires events.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        self.ensure_live()?;
        self.registered_id::<T>()?;
        *self.get_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Attaches `value` to `entity`, moving it to the archetype that also
    /// holds `T`. If `T` is already present its value is replaced in place
    /// and no event fires.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        self.ensure_live()?;
        let location = self.location(entity)?;
        let component_id = self.registered_id::<T>()?;

        let source = &mut self.archetypes[location.archetype_id];
        if source.contains(component_id) {
            if let Some(column) = source.column_mut::<T>(component_id) {
                column[location.row] = value;
            }
            return Ok(());
        }

        let target = self.archetypes.get_add_component_destination(
            location.archetype_id,
            component_id,
            &self.components,
        );
        let (new_location, moved) = self.archetypes.move_entity(location, target);
        self.archetypes[target].push_component(component_id, value);
        if let Some(moved) = moved {
            self.entities.set_location(moved, location);
        }
        self.entities.set_location(entity, new_location);

        trace!(
            "{entity:?} moved {:?} -> {:?} adding {}",
            location.archetype_id,
            target,
            type_name::<T>()
        );
        EventHub::emit_component_added(self, TypeId::of::<T>(), entity);
        Ok(())
    }

    /// Detaches `T` from `entity`. Returns `Ok(false)` if the entity did not
    /// have it, including when `T` was never registered.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<bool> {
        self.ensure_live()?;
        let location = self.location(entity)?;
        let Some(component_id) = self.components.get_id::<T>() else {
            return Ok(false);
        };
        if !self.archetypes[location.archetype_id].contains(component_id) {
            return Ok(false);
        }

        let target = self.archetypes.get_remove_component_destination(
            location.archetype_id,
            component_id,
            &self.components,
        );
        let (new_location, moved) = self.archetypes.move_entity(location, target);
        if let Some(moved) = moved {
            self.entities.set_location(moved, location);
        }
        self.entities.set_location(entity, new_location);

        trace!(
            "{entity:?} moved {:?} -> {:?} removing {}",
            location.archetype_id,
            target,
            type_name::<T>()
        );
        EventHub::emit_component_removed(self, TypeId::of::<T>(), entity);
        Ok(true)
    }

    fn registered_id<T: Component>(&self) -> Result<ComponentId> {
        self.components
            .get_id::<T>()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<T>()))
    }

    /// Iterates every entity matching `D`. See [`Query`].
    pub fn query<D: QueryData>(&mut self) -> Query<'_, D> {
        Query::new(self)
    }

    /// Tears the world down: plugins are uninstalled (most recent first),
    /// then every entity, component, system, subscription, singleton and
    /// extension is released. Calling it again does nothing.
    ///
    /// Afterwards fallible operations return [`EcsError::Disposed`] and
    /// predicates report `false`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        debug!(
            "disposing world with {} entities in {} archetypes",
            self.entities.len(),
            self.archetypes.len()
        );

        self.uninstall_all_plugins();
        self.disposed = true;

        self.schedules.clear();
        self.events.clear();
        self.query_cache.clear();
        self.archetypes.reset();
        self.entities.clear();
        self.components.clear();
        self.singletons.clear();
        self.extensions.clear();
        self.hierarchy.clear();
        self.names.clear();
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A component value waiting to be stored.
pub(crate) struct StagedComponent {
    type_id: TypeId,
    name: &'static str,
    value: Box<dyn Any + Send>,
}

impl StagedComponent {
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            value: Box::new(value),
        }
    }
}

/// Collects the initial components of a new entity.
///
/// ```ignore
/// let player = world
///     .spawn()
///     .with(Position { x: 0.0, y: 0.0 })
///     .with(Velocity { x: 1.0, y: 0.0 })
///     .build()?;
/// ```
#[must_use = "the entity is only created by `build`"]
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    name: Option<String>,
    components: Vec<StagedComponent>,
}

impl EntityBuilder<'_> {
    /// Stages `value`. Staging the same type twice keeps the last value.
    pub fn with<T: Component>(self, value: T) -> Self {
        self.with_staged(StagedComponent::new(value))
    }

    pub(crate) fn with_staged(mut self, staged: StagedComponent) -> Self {
        match self
            .components
            .iter_mut()
            .find(|existing| existing.type_id == staged.type_id)
        {
            Some(existing) => *existing = staged,
            None => self.components.push(staged),
        }
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stores the entity in the archetype matching its staged components in
    /// one step, then fires the created event followed by one added event per
    /// component in staging order.
    ///
    /// Fails without touching the world if any staged type is unregistered.
    pub fn build(self) -> Result<Entity> {
        let EntityBuilder {
            world,
            name,
            components,
        } = self;
        world.ensure_live()?;

        let mut staged = Vec::with_capacity(components.len());
        let mut added = Vec::with_capacity(components.len());
        for component in components {
            let id = world
                .components
                .get_id_by_type(component.type_id)
                .ok_or(EcsError::ComponentNotRegistered(component.name))?;
            added.push(component.type_id);
            staged.push((id, component.value));
        }
        staged.sort_unstable_by_key(|(id, _)| *id);

        let mut signature: Vec<_> = staged.iter().map(|(id, _)| *id).collect();
        let archetype_id = world
            .archetypes
            .get_or_create(&mut signature, &world.components);
        let archetype = &mut world.archetypes[archetype_id];
        let location = EntityLocation {
            archetype_id,
            row: archetype.len(),
        };
        let entity = world.entities.alloc(location);
        let row = archetype.push_row(entity, staged.into_iter().map(|(_, value)| value).collect());
        debug_assert_eq!(row, location.row);

        if let Some(name) = name {
            world.names.set(entity, name);
        }

        // Added values are captured before any handler can touch the row.
        let snapshots: Vec<_> = added
            .into_iter()
            .filter_map(|type_id| {
                EventHub::snapshot_added(world, type_id, entity).map(|value| (type_id, value))
            })
            .collect();

        trace!("spawned {entity:?} in {archetype_id:?}");
        EventHub::emit_entity_created(world, entity);
        for (type_id, value) in snapshots {
            if !world.is_alive(entity) {
                break;
            }
            EventHub::dispatch_added(world, type_id, entity, value);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {}

    struct Unregistered;
    impl Component for Unregistered {}

    fn world() -> World {
        let mut world = World::new();
        world.register::<Position>().unwrap();
        world.register::<Velocity>().unwrap();
        world
    }

    #[test]
    fn builder_places_entity_in_one_archetype() {
        let mut world = world();
        let e = world
            .spawn()
            .with(Velocity { x: 1.0, y: 0.0 })
            .with(Position { x: 2.0, y: 3.0 })
            .build()
            .unwrap();

        assert_eq!(world.archetype_count(), 2);
        assert_eq!(world.get::<Position>(e).unwrap(), &Position { x: 2.0, y: 3.0 });
        assert_eq!(world.get::<Velocity>(e).unwrap().x, 1.0);
    }

    #[test]
    fn builder_keeps_last_duplicate() {
        let mut world = world();
        let e = world
            .spawn()
            .with(Position { x: 1.0, y: 1.0 })
            .with(Position { x: 5.0, y: 5.0 })
            .build()
            .unwrap();
        assert_eq!(world.get::<Position>(e).unwrap().x, 5.0);
    }

    #[test]
    fn builder_rejects_unregistered_before_storing() {
        let mut world = world();
        let result = world
            .spawn()
            .with(Position { x: 0.0, y: 0.0 })
            .with(Unregistered)
            .build();

        assert!(matches!(result, Err(EcsError::ComponentNotRegistered(_))));
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.archetype_count(), 1);
    }

    #[test]
    fn add_and_remove_transition_archetypes() {
        let mut world = world();
        let e = world.spawn_empty().unwrap();
        assert_eq!(world.archetype_of(e), Some(ArchetypeId::EMPTY));

        world.add(e, Position { x: 1.0, y: 2.0 }).unwrap();
        world.add(e, Velocity { x: 3.0, y: 4.0 }).unwrap();
        assert!(world.has::<Position>(e) && world.has::<Velocity>(e));

        assert_eq!(world.remove::<Position>(e), Ok(true));
        assert!(!world.has::<Position>(e));
        assert_eq!(world.get::<Velocity>(e).unwrap(), &Velocity { x: 3.0, y: 4.0 });
        assert_eq!(world.remove::<Position>(e), Ok(false));
        assert_eq!(world.remove::<Unregistered>(e), Ok(false));
    }

    #[test]
    fn set_never_creates_archetypes() {
        let mut world = world();
        let e = world.spawn().with(Position { x: 0.0, y: 0.0 }).build().unwrap();
        let before = world.archetype_count();

        world.set(e, Position { x: 9.0, y: 9.0 }).unwrap();
        world.add(e, Position { x: 7.0, y: 7.0 }).unwrap();

        assert_eq!(world.archetype_count(), before);
        assert_eq!(world.get::<Position>(e).unwrap().x, 7.0);
        assert_eq!(
            world.set(e, Velocity { x: 0.0, y: 0.0 }),
            Err(EcsError::MissingComponent {
                entity: e,
                component: type_name::<Velocity>()
            })
        );
    }

    #[test]
    fn swap_remove_fixes_up_moved_entity() {
        let mut world = world();
        let a = world.spawn().with(Position { x: 1.0, y: 0.0 }).build().unwrap();
        let b = world.spawn().with(Position { x: 2.0, y: 0.0 }).build().unwrap();
        let c = world.spawn().with(Position { x: 3.0, y: 0.0 }).build().unwrap();

        world.add(a, Velocity { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(world.entity_location(c).unwrap().row, 0);
        assert_eq!(world.get::<Position>(c).unwrap().x, 3.0);

        world.despawn(c).unwrap();
        assert_eq!(world.entity_location(b).unwrap().row, 0);
        assert_eq!(world.get::<Position>(b).unwrap().x, 2.0);
    }

    #[test]
    fn stale_handles_fail() {
        let mut world = world();
        let e = world.spawn().with(Position { x: 0.0, y: 0.0 }).build().unwrap();
        world.despawn(e).unwrap();

        assert!(!world.is_alive(e));
        assert!(!world.has::<Position>(e));
        assert_eq!(world.despawn(e), Err(EcsError::EntityNotAlive(e)));
        assert_eq!(
            world.add(e, Velocity { x: 0.0, y: 0.0 }),
            Err(EcsError::EntityNotAlive(e))
        );
        assert!(matches!(world.get::<Position>(e), Err(EcsError::EntityNotAlive(_))));
    }

    #[test]
    fn add_of_unregistered_type_fails() {
        let mut world = world();
        let e = world.spawn_empty().unwrap();
        assert!(matches!(
            world.add(e, Unregistered),
            Err(EcsError::ComponentNotRegistered(_))
        ));
        assert!(!world.has::<Unregistered>(e));
    }

    #[test]
    fn dispose_is_idempotent_and_final() {
        let mut world = world();
        let e = world.spawn().with(Position { x: 0.0, y: 0.0 }).build().unwrap();

        world.dispose();
        world.dispose();

        assert!(world.is_disposed());
        assert!(!world.is_alive(e));
        assert!(!world.is_registered::<Position>());
        assert_eq!(world.spawn_empty(), Err(EcsError::Disposed));
        assert_eq!(world.register::<Position>(), Err(EcsError::Disposed));
        assert!(matches!(world.get::<Position>(e), Err(EcsError::Disposed)));
        assert_eq!(world.query::<&Position>().count(), 0);

        assert_eq!(
            world.add_system(|_: &mut World, _: f32| {}),
            Err(EcsError::Disposed)
        );
        assert_eq!(world.on_entity_created(|_, _| {}), Err(EcsError::Disposed));
        assert_eq!(
            world.on_component_added::<Position, _>(|_, _, _| {}),
            Err(EcsError::Disposed)
        );
        assert_eq!(world.system_count(), 0);
    }

    #[test]
    fn config_sets_column_capacity() {
        let world = World::with_config(WorldConfig {
            initial_column_capacity: 8,
            entity_capacity: 16,
        });
        assert_eq!(world.config().initial_column_capacity, 8);
        assert_eq!(world.archetype_count(), 1);
    }
}
