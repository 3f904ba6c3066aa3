use crate::error::Result;
use crate::system::{System, SystemEntry, SystemId, Systems};
use crate::world::World;
use log::{debug, trace};
use std::collections::HashMap;

/// Phases a frame is split into. [`World::update`] runs every phase except
/// `FixedUpdate` in declaration order; [`World::fixed_update`] runs
/// `FixedUpdate` alone.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum SystemPhase {
    EarlyUpdate,
    FixedUpdate,
    #[default]
    Update,
    LateUpdate,
    Render,
    PostRender,
}

impl SystemPhase {
    pub const FRAME: [SystemPhase; 5] = [
        SystemPhase::EarlyUpdate,
        SystemPhase::Update,
        SystemPhase::LateUpdate,
        SystemPhase::Render,
        SystemPhase::PostRender,
    ];
}

#[derive(Default)]
pub(crate) struct Schedule {
    pub systems: Systems,
}

#[derive(Default)]
pub(crate) struct Schedules {
    next_id: u64,
    schedule_map: HashMap<SystemPhase, Schedule>,
    phases: HashMap<SystemId, SystemPhase>,
}

impl Schedules {
    pub fn add(&mut self, phase: SystemPhase, system: Box<dyn System>) -> SystemId {
        let id = SystemId::new(self.next_id);
        self.next_id += 1;

        debug!("added system {} as {:?} to {:?}", system.name(), id, phase);
        self.schedule_map
            .entry(phase)
            .or_default()
            .systems
            .push(SystemEntry::new(id, system));
        self.phases.insert(id, phase);
        id
    }

    fn entry_mut(&mut self, id: SystemId) -> Option<&mut SystemEntry> {
        let phase = self.phases.get(&id)?;
        self.schedule_map.get_mut(phase)?.systems.get_mut(id)
    }

    pub fn set_enabled(&mut self, id: SystemId, enabled: bool) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: SystemId) -> Option<bool> {
        let phase = self.phases.get(&id)?;
        self.schedule_map
            .get(phase)?
            .systems
            .systems
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.enabled)
    }

    pub fn remove(&mut self, id: SystemId) -> bool {
        let Some(phase) = self.phases.remove(&id) else {
            return false;
        };
        let Some(entry) = self
            .schedule_map
            .get_mut(&phase)
            .and_then(|schedule| schedule.systems.remove(id))
        else {
            return false;
        };
        debug!("removed system {} ({:?}) from {:?}", entry.name, id, phase);
        true
    }

    pub fn phase(&self, id: SystemId) -> Option<SystemPhase> {
        self.phases.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn clear(&mut self) {
        self.schedule_map.clear();
        self.phases.clear();
    }

    fn enabled_ids(&self, phase: SystemPhase) -> Vec<SystemId> {
        self.schedule_map
            .get(&phase)
            .map(|schedule| schedule.systems.enabled_ids())
            .unwrap_or_default()
    }

    /// Runs every enabled system of `phase` once, in registration order.
    ///
    /// Each system is taken out of its entry for the duration of its call, so
    /// it may add or remove systems (including itself) through the world.
    /// Systems added during the pass first run on the next pass.
    pub fn run_phase(world: &mut World, phase: SystemPhase, delta_time: f32) {
        for id in world.schedules.enabled_ids(phase) {
            if world.is_disposed() {
                return;
            }

            let Some(entry) = world.schedules.entry_mut(id) else {
                continue;
            };
            if !entry.enabled {
                continue;
            }
            let Some(mut system) = entry.system.take() else {
                continue;
            };
            let initialize = !entry.initialized;
            entry.initialized = true;

            if initialize {
                trace!("initializing system {}", system.name());
                system.initialize(world);
            }
            system.update(world, delta_time);

            if let Some(entry) = world.schedules.entry_mut(id) {
                entry.system = Some(system);
            }
        }
    }
}

impl World {
    /// Adds `system` to [`SystemPhase::Update`].
    pub fn add_system(&mut self, system: impl System) -> Result<SystemId> {
        self.add_system_to(SystemPhase::Update, system)
    }

    pub fn add_system_to(&mut self, phase: SystemPhase, system: impl System) -> Result<SystemId> {
        self.ensure_live()?;
        Ok(self.schedules.add(phase, Box::new(system)))
    }

    /// Builds a system from `factory`, which gets the world to look up
    /// singletons or extensions the system depends on.
    pub fn add_system_with<S, F>(&mut self, phase: SystemPhase, factory: F) -> Result<SystemId>
    where
        S: System,
        F: FnOnce(&mut World) -> S,
    {
        self.ensure_live()?;
        let system = factory(self);
        self.add_system_to(phase, system)
    }

    /// Returns `false` if no system has this id.
    pub fn set_system_enabled(&mut self, id: SystemId, enabled: bool) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.schedules.set_enabled(id, enabled))
    }

    pub fn is_system_enabled(&self, id: SystemId) -> bool {
        self.schedules.is_enabled(id).unwrap_or(false)
    }

    pub fn remove_system(&mut self, id: SystemId) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.schedules.remove(id))
    }

    pub fn system_phase(&self, id: SystemId) -> Option<SystemPhase> {
        self.schedules.phase(id)
    }

    pub fn system_count(&self) -> usize {
        self.schedules.len()
    }

    /// Runs one frame: every phase except `FixedUpdate`.
    pub fn update(&mut self, delta_time: f32) -> Result<()> {
        self.ensure_live()?;
        for phase in SystemPhase::FRAME {
            Schedules::run_phase(self, phase, delta_time);
        }
        Ok(())
    }

    /// Runs the `FixedUpdate` phase once. Callers own the fixed-step loop.
    pub fn fixed_update(&mut self, delta_time: f32) -> Result<()> {
        self.ensure_live()?;
        Schedules::run_phase(self, SystemPhase::FixedUpdate, delta_time);
        Ok(())
    }
}
