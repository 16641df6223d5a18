use super::envelope::VersionInfo;
use super::error::SaveError;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;

/// Version metadata handed to [`SaveObject::restore_state`].
///
/// Legacy files never stored writer versions, so `versions` is `None` for
/// them unless the caller configured a fallback on the save system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionContext {
    pub format_version: u32,
    pub versions: Option<VersionInfo>,
}

/// An object whose state can be captured into bytes and restored from them.
///
/// The container never interprets the state bytes; how they are produced is
/// entirely up to the implementor. [`encode_state`] / [`decode_state`] cover
/// the common case of a serde-derived state struct.
pub trait SaveObject: Any + std::fmt::Debug {
    /// Name the object is registered under; written into the container so the
    /// loader knows which factory to use.
    fn class_name(&self) -> &str;

    fn capture_state(&self) -> Result<Vec<u8>, SaveError>;

    fn restore_state(&mut self, bytes: &[u8], ctx: &VersionContext) -> Result<(), SaveError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Serialize a state struct to named-field MessagePack.
pub fn encode_state<T: Serialize>(state: &T) -> Result<Vec<u8>, SaveError> {
    Ok(rmp_serde::to_vec_named(state)?)
}

/// Deserialize a state struct from named-field MessagePack.
pub fn decode_state<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SaveError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

type Factory = Box<dyn Fn() -> Box<dyn SaveObject> + Send + Sync>;
type Loader = Box<dyn Fn(&str) -> Option<Box<dyn SaveObject>> + Send + Sync>;

/// Explicit class-name-to-factory mapping used to reconstruct loaded objects.
///
/// Kept as plain owned state on the save system rather than any process-wide
/// registry, so two systems can carry disjoint class sets.
#[derive(Default)]
pub struct ClassRegistry {
    factories: HashMap<String, Factory>,
    loader: Option<Loader>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class constructible via `Default`. The registered name is
    /// taken from the type's own `class_name`.
    pub fn register<T>(&mut self)
    where
        T: SaveObject + Default + 'static,
    {
        let name = T::default().class_name().to_string();
        self.register_factory(name, || Box::new(T::default()));
    }

    /// Register an arbitrary factory under an explicit name.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn SaveObject> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Fallback invoked when a class name has no registered factory, for
    /// hosts that can materialize classes on demand.
    pub fn set_loader<F>(&mut self, loader: F)
    where
        F: Fn(&str) -> Option<Box<dyn SaveObject>> + Send + Sync + 'static,
    {
        self.loader = Some(Box::new(loader));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a fresh instance for `name`, trying registered factories first
    /// and the dynamic loader second.
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn SaveObject>> {
        if let Some(factory) = self.factories.get(name) {
            return Some(factory());
        }
        self.loader.as_ref().and_then(|loader| loader(name))
    }
}
