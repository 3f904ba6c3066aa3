use crate::error::{EcsError, Result};
use crate::world::World;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

pub use strata_macros::Singleton;

/// World-wide unique data addressed by its type, such as a clock or the
/// active camera.
pub trait Singleton: Send + Sync + 'static {}

/// One boxed value per type. Backs both singletons and plugin extensions.
#[derive(Default)]
pub(crate) struct TypeSlots {
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl TypeSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, handing back the one it replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| downcast_box(boxed))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| downcast_box(boxed))
    }

    pub fn remove_type(&mut self, type_id: TypeId) -> bool {
        self.data.remove(&type_id).is_some()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

fn downcast_box<T: 'static>(boxed: Box<dyn Any + Send + Sync>) -> Option<T> {
    boxed.downcast::<T>().ok().map(|boxed| *boxed)
}

impl World {
    /// Stores `value` as the world's `T`, replacing any previous one.
    pub fn set_singleton<T: Singleton>(&mut self, value: T) -> Result<()> {
        self.ensure_live()?;
        self.singletons.insert(value);
        Ok(())
    }

    pub fn get_singleton<T: Singleton>(&self) -> Result<&T> {
        self.ensure_live()?;
        self.singletons
            .get()
            .ok_or(EcsError::UnknownSingleton(type_name::<T>()))
    }

    pub fn get_singleton_mut<T: Singleton>(&mut self) -> Result<&mut T> {
        self.ensure_live()?;
        self.singletons
            .get_mut()
            .ok_or(EcsError::UnknownSingleton(type_name::<T>()))
    }

    pub fn try_get_singleton<T: Singleton>(&self) -> Option<&T> {
        self.singletons.get()
    }

    pub fn try_get_singleton_mut<T: Singleton>(&mut self) -> Option<&mut T> {
        self.singletons.get_mut()
    }

    pub fn has_singleton<T: Singleton>(&self) -> bool {
        self.singletons.contains::<T>()
    }

    pub fn remove_singleton<T: Singleton>(&mut self) -> Result<Option<T>> {
        self.ensure_live()?;
        Ok(self.singletons.remove())
    }
}
