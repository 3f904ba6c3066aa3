use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;
use log::trace;
use std::collections::{HashMap, VecDeque};

/// Parent/child links between live entities. Children keep the order in
/// which they were attached.
#[derive(Default)]
pub(crate) struct Hierarchy {
    parents: HashMap<Entity, Entity>,
    children: HashMap<Entity, Vec<Entity>>,
}

impl Hierarchy {
    pub fn parent(&self, child: Entity) -> Option<Entity> {
        self.parents.get(&child).copied()
    }

    pub fn children(&self, parent: Entity) -> &[Entity] {
        self.children.get(&parent).map_or(&[], Vec::as_slice)
    }

    /// True if `ancestor` is `entity` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut current = Some(entity);
        while let Some(entity) = current {
            if entity == ancestor {
                return true;
            }
            current = self.parent(entity);
        }
        false
    }

    /// Re-attaching to the current parent keeps the child's sibling position.
    pub fn attach(&mut self, child: Entity, parent: Entity) {
        if self.parent(child) == Some(parent) {
            return;
        }
        self.detach(child);
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
    }

    /// Unlinks `child` from its parent, returning the old parent.
    pub fn detach(&mut self, child: Entity) -> Option<Entity> {
        let parent = self.parents.remove(&child)?;
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&sibling| sibling != child);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
        Some(parent)
    }

    /// Drops every link of a despawned entity; its children become roots.
    pub fn remove(&mut self, entity: Entity) {
        self.detach(entity);
        for child in self.children.remove(&entity).unwrap_or_default() {
            self.parents.remove(&child);
        }
    }

    /// `entity`'s descendants, breadth first.
    pub fn descendants(&self, entity: Entity) -> Vec<Entity> {
        let mut descendants = Vec::new();
        let mut queue = VecDeque::from([entity]);
        while let Some(next) = queue.pop_front() {
            for &child in self.children(next) {
                descendants.push(child);
                queue.push_back(child);
            }
        }
        descendants
    }

    pub fn clear(&mut self) {
        self.parents.clear();
        self.children.clear();
    }
}

impl World {
    /// Makes `parent` the parent of `child`, replacing any previous parent.
    ///
    /// Fails with [`EcsError::CircularHierarchy`] if `parent` is `child` or
    /// one of its descendants; the hierarchy is left unchanged.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()> {
        self.ensure_live()?;
        self.ensure_alive(child)?;
        self.ensure_alive(parent)?;
        if self.hierarchy.is_ancestor_or_self(child, parent) {
            return Err(EcsError::CircularHierarchy { child, parent });
        }

        trace!("{child:?} is now a child of {parent:?}");
        self.hierarchy.attach(child, parent);
        Ok(())
    }

    /// Turns `child` into a root. Returns its former parent.
    pub fn remove_parent(&mut self, child: Entity) -> Result<Option<Entity>> {
        self.ensure_live()?;
        self.ensure_alive(child)?;
        Ok(self.hierarchy.detach(child))
    }

    pub fn get_parent(&self, child: Entity) -> Option<Entity> {
        self.hierarchy.parent(child)
    }

    pub fn get_children(&self, parent: Entity) -> &[Entity] {
        self.hierarchy.children(parent)
    }

    pub fn get_descendants(&self, entity: Entity) -> Vec<Entity> {
        self.hierarchy.descendants(entity)
    }

    /// Parent first, root last.
    pub fn get_ancestors(&self, entity: Entity) -> Vec<Entity> {
        let mut ancestors = Vec::new();
        let mut current = self.hierarchy.parent(entity);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.hierarchy.parent(parent);
        }
        ancestors
    }

    /// The topmost ancestor, or `entity` itself if it has no parent.
    pub fn get_root(&self, entity: Entity) -> Entity {
        self.get_ancestors(entity).pop().unwrap_or(entity)
    }

    /// Despawns `entity` and every descendant.
    pub fn despawn_recursive(&mut self, entity: Entity) -> Result<()> {
        self.ensure_live()?;
        self.ensure_alive(entity)?;
        let descendants = self.hierarchy.descendants(entity);
        self.despawn(entity)?;
        for descendant in descendants {
            // A destroyed-handler may already have despawned it.
            if self.is_alive(descendant) {
                self.despawn(descendant)?;
            }
        }
        Ok(())
    }
}
