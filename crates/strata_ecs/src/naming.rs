use crate::entity::Entity;
use crate::error::Result;
use crate::world::World;
use std::collections::HashMap;

/// Two-way name table. A name belongs to at most one entity and an entity has
/// at most one name.
#[derive(Default)]
pub(crate) struct Names {
    by_name: HashMap<String, Entity>,
    by_entity: HashMap<Entity, String>,
}

impl Names {
    /// Names `entity`, taking the name away from whoever held it.
    pub fn set(&mut self, entity: Entity, name: String) {
        self.remove(entity);
        if let Some(previous) = self.by_name.insert(name.clone(), entity) {
            self.by_entity.remove(&previous);
        }
        self.by_entity.insert(entity, name);
    }

    pub fn remove(&mut self, entity: Entity) -> Option<String> {
        let name = self.by_entity.remove(&entity)?;
        self.by_name.remove(&name);
        Some(name)
    }

    pub fn name_of(&self, entity: Entity) -> Option<&str> {
        self.by_entity.get(&entity).map(String::as_str)
    }

    pub fn entity(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_entity.clear();
    }
}

impl World {
    /// Names `entity`. A name held by another entity moves to this one.
    pub fn set_name(&mut self, entity: Entity, name: impl Into<String>) -> Result<()> {
        self.ensure_live()?;
        self.ensure_alive(entity)?;
        self.names.set(entity, name.into());
        Ok(())
    }

    /// Removes the name of `entity`, returning it.
    pub fn clear_name(&mut self, entity: Entity) -> Result<Option<String>> {
        self.ensure_live()?;
        self.ensure_alive(entity)?;
        Ok(self.names.remove(entity))
    }

    pub fn get_name(&self, entity: Entity) -> Option<&str> {
        self.names.name_of(entity)
    }

    pub fn get_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.names.entity(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_both_ways() {
        let mut world = World::new();
        let player = world.spawn_named("player").build().unwrap();

        assert_eq!(world.get_name(player), Some("player"));
        assert_eq!(world.get_entity_by_name("player"), Some(player));
        assert_eq!(world.get_entity_by_name("enemy"), None);
    }

    #[test]
    fn last_write_wins() {
        let mut world = World::new();
        let a = world.spawn_empty().unwrap();
        let b = world.spawn_empty().unwrap();
        world.set_name(a, "boss").unwrap();
        world.set_name(b, "boss").unwrap();

        assert_eq!(world.get_entity_by_name("boss"), Some(b));
        assert_eq!(world.get_name(a), None);

        world.set_name(b, "final boss").unwrap();
        assert_eq!(world.get_entity_by_name("boss"), None);
        assert_eq!(world.clear_name(b), Ok(Some("final boss".to_owned())));
        assert_eq!(world.get_name(b), None);
    }

    #[test]
    fn despawn_releases_the_name() {
        let mut world = World::new();
        let e = world.spawn_named("temp").build().unwrap();
        world.despawn(e).unwrap();

        assert_eq!(world.get_entity_by_name("temp"), None);
        let again = world.spawn_named("temp").build().unwrap();
        assert_eq!(world.get_entity_by_name("temp"), Some(again));
    }
}
