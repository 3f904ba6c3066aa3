use crate::world::World;
use std::fmt;

/// Per-frame logic run by the world's scheduler.
///
/// Any `FnMut(&mut World, f32) + Send + 'static` closure is a system; implement
/// the trait directly when the system needs one-time setup or state of its
/// own.
pub trait System: Send + 'static {
    fn update(&mut self, world: &mut World, delta_time: f32);

    /// Runs once, right before the first `update` of this system.
    fn initialize(&mut self, _world: &mut World) {}

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> System for F
where
    F: FnMut(&mut World, f32) + Send + 'static,
{
    fn update(&mut self, world: &mut World, delta_time: f32) {
        self(world, delta_time)
    }
}

/// Handle to a registered system, used to enable, disable or remove it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u64);

impl SystemId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}

/// A boxed system plus its bookkeeping. The box is taken out while the
/// system runs so it can borrow the world mutably.
pub(crate) struct SystemEntry {
    pub id: SystemId,
    pub name: String,
    pub enabled: bool,
    pub initialized: bool,
    pub system: Option<Box<dyn System>>,
}

impl SystemEntry {
    pub fn new(id: SystemId, system: Box<dyn System>) -> Self {
        Self {
            id,
            name: system.name().to_owned(),
            enabled: true,
            initialized: false,
            system: Some(system),
        }
    }
}

#[derive(Default)]
pub(crate) struct Systems {
    pub(crate) systems: Vec<SystemEntry>,
}

impl Systems {
    pub fn push(&mut self, entry: SystemEntry) {
        self.systems.push(entry);
    }

    pub fn get_mut(&mut self, id: SystemId) -> Option<&mut SystemEntry> {
        self.systems.iter_mut().find(|entry| entry.id == id)
    }

    pub fn remove(&mut self, id: SystemId) -> Option<SystemEntry> {
        let index = self.systems.iter().position(|entry| entry.id == id)?;
        Some(self.systems.remove(index))
    }

    pub fn enabled_ids(&self) -> Vec<SystemId> {
        self.systems
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Counter {
        runs: u32,
    }

    impl System for Counter {
        fn update(&mut self, _: &mut World, _: f32) {
            self.runs += 1;
        }
    }

    #[test]
    fn closures_are_systems() {
        let mut world = World::new();
        let total = Arc::new(Mutex::new(0.0));
        let sum = total.clone();
        let mut system = move |_: &mut World, dt: f32| *sum.lock().unwrap() += dt;
        system.update(&mut world, 0.5);
        system.update(&mut world, 0.25);
        assert_eq!(*total.lock().unwrap(), 0.75);
    }

    #[test]
    fn entries_keep_registration_order() {
        let mut systems = Systems::default();
        for id in 0..3 {
            systems.push(SystemEntry::new(
                SystemId::new(id),
                Box::new(Counter { runs: 0 }),
            ));
        }
        systems.get_mut(SystemId::new(1)).unwrap().enabled = false;

        assert_eq!(systems.enabled_ids(), vec![SystemId::new(0), SystemId::new(2)]);
        let removed = systems.remove(SystemId::new(0)).unwrap();
        assert!(removed.name.ends_with("Counter"));
        assert!(systems.remove(SystemId::new(0)).is_none());
        assert_eq!(systems.systems.len(), 2);
    }

    #[test]
    fn default_name_is_type_name() {
        let counter = Counter { runs: 0 };
        assert!(counter.name().ends_with("Counter"));
    }
}
