use crate::component::Component;
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::singleton::Singleton;
use crate::world::{StagedComponent, World};
use log::warn;
use std::collections::VecDeque;
use std::marker::PhantomData;

/// A deferred structural change.
pub trait Command: Send + 'static {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()>;
}

impl<F> Command for F
where
    F: FnOnce(&mut World) -> Result<()> + Send + 'static,
{
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        (*self)(world)
    }
}

pub struct SpawnEntity {
    name: Option<String>,
    components: Vec<StagedComponent>,
}

impl Command for SpawnEntity {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        let mut builder = match self.name {
            Some(name) => world.spawn_named(name),
            None => world.spawn(),
        };
        for component in self.components {
            builder = builder.with_staged(component);
        }
        builder.build().map(|_| ())
    }
}

pub struct DespawnEntity {
    pub entity: Entity,
}

impl Command for DespawnEntity {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        world.despawn(self.entity)
    }
}

pub struct AddComponent<T: Component> {
    pub entity: Entity,
    pub component: T,
}

impl<T: Component> Command for AddComponent<T> {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        world.add(self.entity, self.component)
    }
}

pub struct RemoveComponent<T: Component> {
    pub entity: Entity,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Command for RemoveComponent<T> {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        world.remove::<T>(self.entity).map(|_| ())
    }
}

pub struct SetSingleton<T: Singleton> {
    pub singleton: T,
}

impl<T: Singleton> Command for SetSingleton<T> {
    fn execute(self: Box<Self>, world: &mut World) -> Result<()> {
        world.set_singleton(self.singleton)
    }
}

/// Records changes while the world is borrowed, typically by a running query,
/// and replays them in order with [`apply`](CommandBuffer::apply).
#[derive(Default)]
pub struct CommandBuffer {
    commands: VecDeque<Box<dyn Command>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: VecDeque::new(),
        }
    }

    pub fn push(&mut self, command: impl Command) {
        self.commands.push_back(Box::new(command));
    }

    /// Starts recording a spawn; call [`SpawnCommands::queue`] to keep it.
    pub fn spawn(&mut self) -> SpawnCommands<'_> {
        SpawnCommands {
            buffer: self,
            command: SpawnEntity {
                name: None,
                components: Vec::new(),
            },
        }
    }

    pub fn despawn(&mut self, entity: Entity) {
        self.push(DespawnEntity { entity });
    }

    pub fn add<T: Component>(&mut self, entity: Entity, component: T) {
        self.push(AddComponent { entity, component });
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.push(RemoveComponent::<T> {
            entity,
            _marker: PhantomData,
        });
    }

    pub fn set_singleton<T: Singleton>(&mut self, singleton: T) {
        self.push(SetSingleton { singleton });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Executes every recorded command in order and empties the buffer.
    ///
    /// A failing command does not stop the ones after it; the first error is
    /// returned once all commands ran. Commands aimed at entities that died
    /// in the meantime are skipped with a warning.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        let mut first_error = None;
        for command in self.commands.drain(..) {
            match command.execute(world) {
                Ok(()) => {}
                Err(EcsError::EntityNotAlive(entity)) => {
                    warn!("skipped deferred command for dead entity {entity:?}");
                }
                Err(error) => {
                    warn!("deferred command failed: {error}");
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[must_use = "call `queue` to record the spawn"]
pub struct SpawnCommands<'a> {
    buffer: &'a mut CommandBuffer,
    command: SpawnEntity,
}

impl SpawnCommands<'_> {
    pub fn with<T: Component>(mut self, component: T) -> Self {
        self.command.components.push(StagedComponent::new(component));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.command.name = Some(name.into());
        self
    }

    pub fn queue(self) {
        self.buffer.push(self.command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Dead;
    impl Component for Dead {}

    #[derive(Debug, PartialEq)]
    struct Score(u32);
    impl Singleton for Score {}

    fn world() -> World {
        let mut world = World::new();
        world.register::<Health>().unwrap();
        world.register::<Dead>().unwrap();
        world
    }

    #[test]
    fn structural_changes_while_iterating() {
        let mut world = world();
        for hp in [0, 5, 0, 7] {
            world.spawn().with(Health(hp)).build().unwrap();
        }

        let mut commands = CommandBuffer::new();
        for (entity, health) in world.query::<(Entity, &Health)>() {
            if health.0 == 0 {
                commands.add(entity, Dead);
            }
        }
        assert_eq!(commands.len(), 2);
        commands.apply(&mut world).unwrap();

        assert!(commands.is_empty());
        assert_eq!(world.query::<&Health>().with::<Dead>().count(), 2);
    }

    #[test]
    fn commands_run_in_order() {
        let mut world = world();
        let mut commands = CommandBuffer::new();
        commands.spawn().with(Health(1)).named("hero").queue();
        commands.set_singleton(Score(3));
        commands.push(|world: &mut World| {
            let hero = world
                .get_entity_by_name("hero")
                .ok_or(EcsError::EntityNotAlive(Entity::NULL))?;
            world.set(hero, Health(9))
        });

        commands.apply(&mut world).unwrap();

        let hero = world.get_entity_by_name("hero").unwrap();
        assert_eq!(world.get::<Health>(hero).unwrap(), &Health(9));
        assert_eq!(world.get_singleton::<Score>().unwrap(), &Score(3));
    }

    #[test]
    fn dead_entities_are_skipped() {
        let mut world = world();
        let e = world.spawn().with(Health(1)).build().unwrap();
        let mut commands = CommandBuffer::new();
        commands.despawn(e);
        commands.remove::<Health>(e);

        assert_eq!(commands.apply(&mut world), Ok(()));
        assert!(!world.is_alive(e));
    }

    #[test]
    fn first_error_is_reported_after_all_ran() {
        struct Unregistered;
        impl Component for Unregistered {}

        let mut world = world();
        let e = world.spawn_empty().unwrap();
        let mut commands = CommandBuffer::new();
        commands.add(e, Unregistered);
        commands.add(e, Health(4));

        assert!(matches!(
            commands.apply(&mut world),
            Err(EcsError::ComponentNotRegistered(_))
        ));
        assert!(world.has::<Health>(e));
    }
}
