use crate::entity::Entity;
use thiserror::Error;

pub type Result<T, E = EcsError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),
    #[error("component `{0}` is not registered with this world")]
    ComponentNotRegistered(&'static str),
    #[error("entity {entity} has no component `{component}`")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
    #[error("making {parent} the parent of {child} would create a cycle")]
    CircularHierarchy { child: Entity, parent: Entity },
    #[error("no singleton of type `{0}` is set")]
    UnknownSingleton(&'static str),
    #[error("no extension of type `{0}` is installed")]
    UnknownExtension(&'static str),
    #[error("plugin `{0}` is already installed")]
    PluginAlreadyInstalled(String),
    #[error("plugin `{0}` is not installed")]
    UnknownPlugin(String),
    #[error("the world has been disposed")]
    Disposed,
}
