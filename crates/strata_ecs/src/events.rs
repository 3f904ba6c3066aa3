use crate::component::Component;
use crate::entity::Entity;
use crate::error::Result;
use crate::world::World;
use log::trace;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

/// Handle returned by every `on_*` subscription; pass it to
/// [`World::unsubscribe`] to stop receiving events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type AddedHandler = Box<dyn FnMut(&mut World, Entity, &dyn Any) + Send>;
type EntityHandler = Box<dyn FnMut(&mut World, Entity) + Send>;
type Snapshot = fn(&World, Entity) -> Option<Box<dyn Any>>;

/// Handlers of one channel in registration order. A slot is `None` while its
/// handler is running.
struct Subscribers<H> {
    entries: Vec<(SubscriptionId, Option<H>)>,
}

impl<H> Default for Subscribers<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H> Subscribers<H> {
    fn push(&mut self, id: SubscriptionId, handler: H) {
        self.entries.push((id, Some(handler)));
    }

    fn ids(&self) -> Vec<SubscriptionId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, id: SubscriptionId) -> Option<H> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| *entry == id)
            .and_then(|(_, handler)| handler.take())
    }

    /// Puts a handler back after it ran, unless it was unsubscribed meanwhile.
    fn restore(&mut self, id: SubscriptionId, handler: H) {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(entry, _)| *entry == id) {
            *slot = Some(handler);
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }
}

struct AddedChannel {
    component: &'static str,
    snapshot: Snapshot,
    subscribers: Subscribers<AddedHandler>,
}

#[derive(Copy, Clone, Debug)]
enum Channel {
    Added(TypeId),
    Removed(TypeId),
    Created,
    Destroyed,
}

/// Synchronous per-world event dispatch.
#[derive(Default)]
pub(crate) struct EventHub {
    next_id: u64,
    added: HashMap<TypeId, AddedChannel>,
    removed: HashMap<TypeId, Subscribers<EntityHandler>>,
    created: Subscribers<EntityHandler>,
    destroyed: Subscribers<EntityHandler>,
    channels: HashMap<SubscriptionId, Channel>,
}

fn snapshot<T: Component + Clone>(world: &World, entity: Entity) -> Option<Box<dyn Any>> {
    let value = world.get::<T>(entity).ok()?;
    Some(Box::new(value.clone()))
}

impl EventHub {
    fn next_id(&mut self, channel: Channel) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.channels.insert(id, channel);
        id
    }

    pub fn on_component_added<T, F>(&mut self, mut handler: F) -> SubscriptionId
    where
        T: Component + Clone,
        F: FnMut(&mut World, Entity, &T) + Send + 'static,
    {
        let type_id = TypeId::of::<T>();
        let id = self.next_id(Channel::Added(type_id));
        let handler: AddedHandler = Box::new(move |world, entity, value| {
            if let Some(value) = value.downcast_ref::<T>() {
                handler(world, entity, value);
            }
        });
        self.added
            .entry(type_id)
            .or_insert_with(|| AddedChannel {
                component: type_name::<T>(),
                snapshot: snapshot::<T>,
                subscribers: Subscribers::default(),
            })
            .subscribers
            .push(id, handler);
        id
    }

    pub fn on_component_removed<T, F>(&mut self, handler: F) -> SubscriptionId
    where
        T: Component,
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        let type_id = TypeId::of::<T>();
        let id = self.next_id(Channel::Removed(type_id));
        self.removed
            .entry(type_id)
            .or_default()
            .push(id, Box::new(handler));
        id
    }

    pub fn on_entity_created<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        let id = self.next_id(Channel::Created);
        self.created.push(id, Box::new(handler));
        id
    }

    pub fn on_entity_destroyed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        let id = self.next_id(Channel::Destroyed);
        self.destroyed.push(id, Box::new(handler));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(channel) = self.channels.remove(&id) else {
            return false;
        };
        match channel {
            Channel::Added(type_id) => self
                .added
                .get_mut(&type_id)
                .is_some_and(|channel| channel.subscribers.remove(id)),
            Channel::Removed(type_id) => self
                .removed
                .get_mut(&type_id)
                .is_some_and(|subscribers| subscribers.remove(id)),
            Channel::Created => self.created.remove(id),
            Channel::Destroyed => self.destroyed.remove(id),
        }
    }

    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.created = Subscribers::default();
        self.destroyed = Subscribers::default();
        self.channels.clear();
    }

    /// Clones the stored `type_id` value of `entity` if anyone listens for it.
    pub fn snapshot_added(world: &World, type_id: TypeId, entity: Entity) -> Option<Box<dyn Any>> {
        let channel = world.events.added.get(&type_id)?;
        if channel.subscribers.is_empty() {
            return None;
        }
        (channel.snapshot)(world, entity)
    }

    /// Runs every added-handler of `type_id` for `entity`. The value is read
    /// back from storage once, after the transition committed.
    pub fn emit_component_added(world: &mut World, type_id: TypeId, entity: Entity) {
        if let Some(value) = Self::snapshot_added(world, type_id, entity) {
            Self::dispatch_added(world, type_id, entity, value);
        }
    }

    /// Hands `value`, captured when the component was committed, to every
    /// added-handler of `type_id`.
    pub fn dispatch_added(world: &mut World, type_id: TypeId, entity: Entity, value: Box<dyn Any>) {
        let Some(channel) = world.events.added.get(&type_id) else {
            return;
        };
        let ids = channel.subscribers.ids();
        let component = channel.component;

        trace!("dispatching {component} added on {entity:?} to {} handlers", ids.len());
        for id in ids {
            let Some(mut handler) = world
                .events
                .added
                .get_mut(&type_id)
                .and_then(|channel| channel.subscribers.take(id))
            else {
                continue;
            };
            handler(world, entity, value.as_ref());
            if let Some(channel) = world.events.added.get_mut(&type_id) {
                channel.subscribers.restore(id, handler);
            }
        }
    }

    pub fn emit_component_removed(world: &mut World, type_id: TypeId, entity: Entity) {
        Self::emit_entity_event(world, entity, "removed", move |hub| {
            hub.removed.get_mut(&type_id)
        });
    }

    pub fn emit_entity_created(world: &mut World, entity: Entity) {
        Self::emit_entity_event(world, entity, "created", |hub| Some(&mut hub.created));
    }

    pub fn emit_entity_destroyed(world: &mut World, entity: Entity) {
        Self::emit_entity_event(world, entity, "destroyed", |hub| Some(&mut hub.destroyed));
    }

    fn emit_entity_event(
        world: &mut World,
        entity: Entity,
        kind: &str,
        subscribers: impl Fn(&mut EventHub) -> Option<&mut Subscribers<EntityHandler>>,
    ) {
        let ids = match subscribers(&mut world.events) {
            Some(subscribers) if !subscribers.is_empty() => subscribers.ids(),
            _ => return,
        };

        trace!("dispatching {kind} on {entity:?} to {} handlers", ids.len());
        for id in ids {
            let Some(mut handler) = subscribers(&mut world.events).and_then(|s| s.take(id)) else {
                continue;
            };
            handler(world, entity);
            if let Some(subscribers) = subscribers(&mut world.events) {
                subscribers.restore(id, handler);
            }
        }
    }
}

impl World {
    /// Calls `handler` after `T` is attached to an entity, with the value
    /// that was stored. Replacing a value with [`World::set`] does not fire.
    pub fn on_component_added<T, F>(&mut self, handler: F) -> Result<SubscriptionId>
    where
        T: Component + Clone,
        F: FnMut(&mut World, Entity, &T) + Send + 'static,
    {
        self.ensure_live()?;
        Ok(self.events.on_component_added(handler))
    }

    /// Calls `handler` after `T` is detached from a still-living entity.
    /// Despawning does not fire this; listen to
    /// [`on_entity_destroyed`](World::on_entity_destroyed) instead.
    pub fn on_component_removed<T, F>(&mut self, handler: F) -> Result<SubscriptionId>
    where
        T: Component,
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        self.ensure_live()?;
        Ok(self.events.on_component_removed::<T, F>(handler))
    }

    pub fn on_entity_created<F>(&mut self, handler: F) -> Result<SubscriptionId>
    where
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        self.ensure_live()?;
        Ok(self.events.on_entity_created(handler))
    }

    /// Calls `handler` with the handle of an entity that was just despawned.
    /// The handle is already stale.
    pub fn on_entity_destroyed<F>(&mut self, handler: F) -> Result<SubscriptionId>
    where
        F: FnMut(&mut World, Entity) + Send + 'static,
    {
        self.ensure_live()?;
        Ok(self.events.on_entity_destroyed(handler))
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.events.unsubscribe(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::component::Component;
    use crate::entity::Entity;
    use crate::world::World;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Poisoned;
    impl Component for Poisoned {}

    fn world() -> World {
        let mut world = World::new();
        world.register::<Health>().unwrap();
        world.register::<Poisoned>().unwrap();
        world
    }

    #[test]
    fn added_handler_sees_committed_value() {
        let mut world = world();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        world.on_component_added::<Health, _>(move |world, entity, health| {
            assert!(world.has::<Health>(entity));
            log.lock().unwrap().push(health.clone());
        })
        .unwrap();

        let e = world.spawn_empty().unwrap();
        world.add(e, Health(10)).unwrap();
        world.set(e, Health(20)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Health(10)]);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut world = world();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            world
                .on_entity_created(move |_, _| order.lock().unwrap().push(i))
                .unwrap();
        }

        world.spawn_empty().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn handler_may_reenter_the_world() {
        let mut world = world();
        world.on_component_added::<Poisoned, _>(|world, entity, _| {
            world.remove::<Health>(entity).unwrap();
        })
        .unwrap();
        let removed = Arc::new(Mutex::new(Vec::<Entity>::new()));
        let log = removed.clone();
        world
            .on_component_removed::<Health, _>(move |_, entity| log.lock().unwrap().push(entity))
            .unwrap();

        let e = world.spawn().with(Health(5)).build().unwrap();
        world.add(e, Poisoned).unwrap();

        assert!(!world.has::<Health>(e));
        assert!(world.has::<Poisoned>(e));
        assert_eq!(*removed.lock().unwrap(), vec![e]);
    }

    #[test]
    fn nested_dispatch_skips_running_handler() {
        let mut world = world();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        world.on_entity_created(move |world, _| {
            *counter.lock().unwrap() += 1;
            world.spawn_empty().unwrap();
        })
        .unwrap();

        world.spawn_empty().unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut world = world();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let id = world
            .on_entity_destroyed(move |_, _| *counter.lock().unwrap() += 1)
            .unwrap();

        let a = world.spawn_empty().unwrap();
        world.despawn(a).unwrap();
        assert_eq!(world.unsubscribe(id), Ok(true));
        assert_eq!(world.unsubscribe(id), Ok(false));
        let b = world.spawn_empty().unwrap();
        world.despawn(b).unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn handler_can_unsubscribe_itself() {
        let mut world = world();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let id = Arc::new(Mutex::new(None));
        let own_id = id.clone();
        let subscription = world.on_entity_created(move |world, _| {
            *counter.lock().unwrap() += 1;
            if let Some(id) = own_id.lock().unwrap().take() {
                world.unsubscribe(id).unwrap();
            }
        })
        .unwrap();
        *id.lock().unwrap() = Some(subscription);

        world.spawn_empty().unwrap();
        world.spawn_empty().unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
