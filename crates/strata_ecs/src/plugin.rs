use crate::error::{EcsError, Result};
use crate::events::SubscriptionId;
use crate::schedule::SystemPhase;
use crate::system::{System, SystemId};
use crate::world::World;
use log::{debug, warn};
use std::any::{TypeId, type_name};

/// A bundle of systems, events and extensions installed into a world as one
/// unit.
///
/// Everything registered through the [`PluginContext`] is removed again when
/// the plugin is uninstalled.
pub trait Plugin: Send + 'static {
    /// Unique within a world.
    fn name(&self) -> &str;

    fn install(&mut self, ctx: &mut PluginContext<'_>) -> Result<()>;

    /// Runs before the plugin's systems, extensions and subscriptions are
    /// removed.
    fn uninstall(&mut self, _ctx: &mut PluginContext<'_>) {}
}

/// Registration surface handed to a plugin while it is installed or
/// uninstalled.
pub struct PluginContext<'w> {
    world: &'w mut World,
    plugin: String,
    registrations: Registrations,
}

#[derive(Default)]
struct Registrations {
    systems: Vec<SystemId>,
    extensions: Vec<TypeId>,
    subscriptions: Vec<SubscriptionId>,
}

impl Registrations {
    fn append(&mut self, other: Registrations) {
        self.systems.extend(other.systems);
        self.extensions.extend(other.extensions);
        self.subscriptions.extend(other.subscriptions);
    }

    fn release(self, world: &mut World) {
        for id in self.systems {
            world.schedules.remove(id);
        }
        for type_id in self.extensions {
            world.extensions.remove_type(type_id);
        }
        for id in self.subscriptions {
            world.events.unsubscribe(id);
        }
    }
}

impl<'w> PluginContext<'w> {
    fn new(world: &'w mut World, plugin: &str) -> Self {
        Self {
            world,
            plugin: plugin.to_owned(),
            registrations: Registrations::default(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Full access to the world. Systems or extensions added through it
    /// directly are not tracked and outlive the plugin.
    pub fn world(&mut self) -> &mut World {
        self.world
    }

    pub fn add_system(&mut self, system: impl System) -> SystemId {
        self.add_system_to(SystemPhase::Update, system)
    }

    pub fn add_system_to(&mut self, phase: SystemPhase, system: impl System) -> SystemId {
        let id = self.world.schedules.add(phase, Box::new(system));
        self.registrations.systems.push(id);
        id
    }

    pub fn add_system_with<S, F>(&mut self, phase: SystemPhase, factory: F) -> SystemId
    where
        S: System,
        F: FnOnce(&mut World) -> S,
    {
        let system = factory(self.world);
        self.add_system_to(phase, system)
    }

    pub fn set_extension<T: Send + Sync + 'static>(&mut self, extension: T) {
        self.world.extensions.insert(extension);
        let type_id = TypeId::of::<T>();
        if !self.registrations.extensions.contains(&type_id) {
            self.registrations.extensions.push(type_id);
        }
    }

    /// Keeps track of a subscription made through [`world`](Self::world) so
    /// it is dropped with the plugin.
    pub fn track_subscription(&mut self, id: SubscriptionId) {
        self.registrations.subscriptions.push(id);
    }
}

struct InstalledPlugin {
    name: String,
    plugin: Box<dyn Plugin>,
    registrations: Registrations,
}

/// Installed plugins in installation order.
#[derive(Default)]
pub(crate) struct Plugins {
    installed: Vec<InstalledPlugin>,
}

impl Plugins {
    fn contains(&self, name: &str) -> bool {
        self.installed.iter().any(|installed| installed.name == name)
    }

    fn take(&mut self, name: &str) -> Option<InstalledPlugin> {
        let index = self
            .installed
            .iter()
            .position(|installed| installed.name == name)?;
        Some(self.installed.remove(index))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.installed.iter().map(|installed| installed.name.as_str())
    }
}

fn uninstall(world: &mut World, mut installed: InstalledPlugin) {
    let mut ctx = PluginContext::new(world, &installed.name);
    installed.plugin.uninstall(&mut ctx);
    let PluginContext { registrations, .. } = ctx;

    installed.registrations.append(registrations);
    installed.registrations.release(world);
    debug!("uninstalled plugin {}", installed.name);
}

impl World {
    /// Installs `plugin`. If its `install` fails, whatever it registered so
    /// far is rolled back and the error is returned.
    pub fn install_plugin<P: Plugin>(&mut self, mut plugin: P) -> Result<()> {
        self.ensure_live()?;
        let name = plugin.name().to_owned();
        if self.plugins.contains(&name) {
            return Err(EcsError::PluginAlreadyInstalled(name));
        }

        let mut ctx = PluginContext::new(self, &name);
        let result = plugin.install(&mut ctx);
        let PluginContext { registrations, .. } = ctx;

        if let Err(error) = result {
            warn!("plugin {name} failed to install: {error}");
            registrations.release(self);
            return Err(error);
        }

        debug!(
            "installed plugin {name} ({} systems, {} extensions)",
            registrations.systems.len(),
            registrations.extensions.len()
        );
        self.plugins.installed.push(InstalledPlugin {
            name,
            plugin: Box::new(plugin),
            registrations,
        });
        Ok(())
    }

    pub fn uninstall_plugin(&mut self, name: &str) -> Result<()> {
        self.ensure_live()?;
        let installed = self
            .plugins
            .take(name)
            .ok_or_else(|| EcsError::UnknownPlugin(name.to_owned()))?;
        uninstall(self, installed);
        Ok(())
    }

    pub fn is_plugin_installed(&self, name: &str) -> bool {
        self.plugins.contains(name)
    }

    pub fn installed_plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins.names()
    }

    /// Uninstalls every plugin, most recently installed first.
    pub(crate) fn uninstall_all_plugins(&mut self) {
        while let Some(installed) = self.plugins.installed.pop() {
            uninstall(self, installed);
        }
    }

    /// Stores a service for plugins and systems to share. Prefer
    /// [`PluginContext::set_extension`] from inside a plugin so the
    /// extension is removed along with it.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, extension: T) -> Result<()> {
        self.ensure_live()?;
        self.extensions.insert(extension);
        Ok(())
    }

    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Result<&T> {
        self.ensure_live()?;
        self.extensions
            .get()
            .ok_or(EcsError::UnknownExtension(type_name::<T>()))
    }

    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Result<&mut T> {
        self.ensure_live()?;
        self.extensions
            .get_mut()
            .ok_or(EcsError::UnknownExtension(type_name::<T>()))
    }

    pub fn try_get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains::<T>()
    }

    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Result<Option<T>> {
        self.ensure_live()?;
        Ok(self.extensions.remove())
    }
}
