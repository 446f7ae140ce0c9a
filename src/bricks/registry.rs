//! Brick registry
//!
//! Maps brick ids to brick instances, and service ids to service
//! definitions. One registry is built per execution context at startup and
//! passed by reference to the interpreter.

use super::builtin;
use super::schema::{validate_compiled, SchemaCache};
use super::service::ServiceDefinition;
use super::{Brick, Package};
use crate::error::BrickError;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Registry of bricks keyed by id
#[derive(Default)]
pub struct BrickRegistry {
    bricks: DashMap<String, Brick>,
    input_schemas: SchemaCache,
    services: DashMap<String, Arc<ServiceDefinition>>,
    builtins_registered: AtomicBool,
}

impl BrickRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin bricks
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register bricks; a brick replaces any earlier brick with the same id
    pub fn register<I>(&self, bricks: I)
    where
        I: IntoIterator<Item = Brick>,
    {
        for brick in bricks {
            let id = brick.id().to_string();
            let replacement = brick.clone();
            self.input_schemas.evict(&id);
            if let Some(previous) = self.bricks.insert(id.clone(), brick) {
                if !cfg!(test) && !previous.same_instance(&replacement) {
                    warn!("Brick {} registered more than once; keeping the latest", id);
                }
            }
        }
    }

    /// Register the builtin bricks once; later calls are no-ops
    pub fn register_builtins(&self) {
        if self.builtins_registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let bricks = builtin::all();
        debug!("Registering {} builtin bricks", bricks.len());
        self.register(bricks);
    }

    /// Brick registered under `id`
    pub fn lookup(&self, id: &str) -> Result<Brick, BrickError> {
        self.bricks
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrickError::NotFound(id.to_string()))
    }

    /// Register a loaded definition
    pub fn register_package(&self, package: Package) {
        match package {
            Package::Brick(brick) => self.register([brick]),
            Package::Service(service) => self.register_service(service),
        }
    }

    /// Register a service; a service replaces any earlier one with the same id
    pub fn register_service(&self, service: ServiceDefinition) {
        debug!("Registering service {}", service.id);
        self.services.insert(service.id.clone(), Arc::new(service));
    }

    /// Service registered under `id`
    pub fn service(&self, id: &str) -> Result<Arc<ServiceDefinition>, BrickError> {
        self.services
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrickError::NotFound(id.to_string()))
    }

    /// Registered services, sorted by id
    pub fn services(&self) -> Vec<Arc<ServiceDefinition>> {
        let mut services: Vec<_> = self.services.iter().map(|entry| entry.value().clone()).collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));
        services
    }

    /// Configure the services a mod binds, keyed by their context key
    ///
    /// `bindings` maps context keys to service ids; `configs` maps service ids
    /// to their configuration.
    pub fn configure_services(
        &self,
        bindings: &BTreeMap<String, String>,
        configs: &BTreeMap<String, Value>,
    ) -> Result<Map<String, Value>, BrickError> {
        let mut configured = Map::new();
        for (key, id) in bindings {
            let service = self.service(id)?;
            let config = configs.get(id).cloned().ok_or_else(|| {
                BrickError::business(format!("Service {} is not configured", id))
            })?;
            configured.insert(key.clone(), service.configure(config)?);
        }
        Ok(configured)
    }

    /// Coerce and validate arguments against `brick`'s input schema
    ///
    /// Schemas are compiled on first use and kept until the id is registered again.
    pub fn validate_input(&self, brick: &Brick, args: Value) -> Result<Value, BrickError> {
        let schema = &brick.metadata().input_schema;
        let compiled = self.input_schemas.compiled(brick.id(), schema)?;
        validate_compiled(brick.id(), schema, &compiled, args)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bricks.contains_key(id)
    }

    /// Snapshot of every registered brick, sorted by id
    pub fn all(&self) -> Vec<Brick> {
        let mut bricks: Vec<Brick> = self.bricks.iter().map(|entry| entry.value().clone()).collect();
        bricks.sort_by(|a, b| a.id().cmp(b.id()));
        bricks
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }
}
