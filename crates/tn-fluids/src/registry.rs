//! Explicitly constructed substance registry.
//!
//! A registry is built once, before any network exists, and then shared by
//! `Arc`. Every constant a substance carries (molar mass, bounds) is read when
//! its wrapper is registered, so nothing is populated lazily during a solve.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FluidError, FluidResult};
use crate::wrapper::FluidWrapper;

#[derive(Clone, Debug, Default)]
pub struct FluidRegistry {
    wrappers: BTreeMap<String, Arc<dyn FluidWrapper>>,
}

impl FluidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wrapper under its own name (builder style).
    pub fn with<W: FluidWrapper + 'static>(mut self, wrapper: W) -> Self {
        self.register(wrapper);
        self
    }

    /// Register a wrapper under its own name, replacing an existing entry.
    pub fn register<W: FluidWrapper + 'static>(&mut self, wrapper: W) -> &mut Self {
        let name = wrapper.name().to_string();
        self.register_as(name, Arc::new(wrapper))
    }

    /// Register a shared wrapper under an explicit key.
    pub fn register_as(
        &mut self,
        name: impl Into<String>,
        wrapper: Arc<dyn FluidWrapper>,
    ) -> &mut Self {
        let name = name.into();
        debug!(fluid = %name, "registering fluid property wrapper");
        self.wrappers.insert(name, wrapper);
        self
    }

    /// Build a registry of CoolProp substances.
    #[cfg(feature = "coolprop")]
    pub fn with_coolprop(names: &[&str]) -> FluidResult<Self> {
        let mut registry = Self::new();
        for name in names {
            registry.register(crate::coolprop::CoolPropWrapper::new(name)?);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> FluidResult<Arc<dyn FluidWrapper>> {
        self.wrappers
            .get(name)
            .cloned()
            .ok_or_else(|| FluidError::UnknownFluid {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wrappers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.wrappers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}
