//! Mission models: cells, topics, resources, activity types, constraints,
//! and daemons, assembled once and shared by every engine that runs them.
//!
//! A [`MissionModel`] is immutable after [`MissionModelBuilder::build`] and
//! is handed around as `Arc<MissionModel>`; engines never mutate it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use sortie_core::{Arguments, Cell, CellRef, RealDynamics, SerializedActivity, SerializedValue, Topic};
use sortie_history::{HistoryError, Querier, Registry, RegistryBuilder};
use tracing::debug;

use crate::activity::{instantiate_with, ActivityType, InstantiationError};
use crate::constraint::Constraint;
use crate::error::ModelError;
use crate::task::Task;

/// Reads a real-valued resource as dynamics starting at the queried node.
pub type RealResource =
    Arc<dyn Fn(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send + Sync>;

/// Reads a discrete resource as a serialized value at the queried node.
pub type DiscreteResource =
    Arc<dyn Fn(&mut Querier<'_>) -> Result<SerializedValue, HistoryError> + Send + Sync>;

/// Creates a daemon task for a fresh engine.
pub type DaemonFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

// ── Builder ─────────────────────────────────────────────────────

/// Incremental construction of a [`MissionModel`].
///
/// Registration mistakes that are not reported immediately (duplicate names,
/// constraints on unknown resources) surface from [`build`](Self::build).
#[derive(Default)]
pub struct MissionModelBuilder {
    registry: RegistryBuilder,
    activity_types: IndexMap<String, ActivityType>,
    real_resources: IndexMap<String, RealResource>,
    discrete_resources: IndexMap<String, DiscreteResource>,
    constraints: Vec<Constraint>,
    daemons: Vec<(String, DaemonFactory)>,
    first_error: Option<ModelError>,
}

impl MissionModelBuilder {
    /// An empty model.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Cells and topics ────────────────────────────────────────

    /// Register a cell with its initial state.
    pub fn allocate<C: Cell>(&mut self, name: impl Into<String>, initial: C) -> CellRef<C> {
        self.registry.allocate(name, initial)
    }

    /// Register a topic.
    pub fn topic<E: Send + Sync + 'static>(&mut self, name: impl Into<String>) -> Topic<E> {
        self.registry.topic(name)
    }

    /// Route events on `topic` to `cell` through `projection`.
    pub fn subscribe<E, C, F>(
        &mut self,
        topic: &Topic<E>,
        cell: &CellRef<C>,
        projection: F,
    ) -> Result<(), HistoryError>
    where
        E: Send + Sync + 'static,
        C: Cell,
        F: Fn(&E) -> C::Effect + Send + Sync + 'static,
    {
        self.registry.subscribe(topic, cell, projection)
    }

    /// Register a cell together with a topic carrying its own effect type.
    pub fn allocate_with_topic<C: Cell>(
        &mut self,
        name: impl Into<String>,
        initial: C,
    ) -> (CellRef<C>, Topic<C::Effect>) {
        self.registry.allocate_with_topic(name, initial)
    }

    // ── Resources ───────────────────────────────────────────────

    /// Publish a real resource for profiling and constraints.
    pub fn real_resource<F>(&mut self, name: impl Into<String>, read: F) -> &mut Self
    where
        F: Fn(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.resource_exists(&name) {
            self.fail(ModelError::DuplicateResource { name });
        } else {
            self.real_resources.insert(name, Arc::new(read));
        }
        self
    }

    /// Publish a discrete resource for profiling and constraints.
    pub fn discrete_resource<F>(&mut self, name: impl Into<String>, read: F) -> &mut Self
    where
        F: Fn(&mut Querier<'_>) -> Result<SerializedValue, HistoryError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.resource_exists(&name) {
            self.fail(ModelError::DuplicateResource { name });
        } else {
            self.discrete_resources.insert(name, Arc::new(read));
        }
        self
    }

    // ── Behavior ────────────────────────────────────────────────

    /// Add an activity type to the catalog.
    pub fn activity_type(&mut self, ty: ActivityType) -> &mut Self {
        if self.activity_types.contains_key(ty.name()) {
            self.fail(ModelError::DuplicateActivityType {
                name: ty.name().to_owned(),
            });
        } else {
            self.activity_types.insert(ty.name().to_owned(), ty);
        }
        self
    }

    /// Declare a constraint over published resources.
    pub fn constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    /// Register a task started at t=0 in every engine, before any directive.
    pub fn daemon<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.daemons.push((name.into(), Arc::new(factory)));
        self
    }

    /// Freeze the model.
    pub fn build(self) -> Result<MissionModel, ModelError> {
        if let Some(error) = self.first_error {
            return Err(error);
        }
        for constraint in &self.constraints {
            let resource = constraint.resource();
            let known = if constraint.is_real() {
                self.real_resources.contains_key(resource)
            } else {
                self.discrete_resources.contains_key(resource)
            };
            if !known {
                return Err(ModelError::UnknownResource {
                    constraint: constraint.name.clone(),
                    resource: resource.to_owned(),
                });
            }
        }
        let registry = Arc::new(self.registry.build());
        debug!(
            cells = registry.cell_count(),
            activity_types = self.activity_types.len(),
            resources = self.real_resources.len() + self.discrete_resources.len(),
            constraints = self.constraints.len(),
            daemons = self.daemons.len(),
            "mission model built"
        );
        Ok(MissionModel {
            registry,
            activity_types: self.activity_types,
            real_resources: self.real_resources,
            discrete_resources: self.discrete_resources,
            constraints: self.constraints,
            daemons: self.daemons,
        })
    }

    fn resource_exists(&self, name: &str) -> bool {
        self.real_resources.contains_key(name) || self.discrete_resources.contains_key(name)
    }

    fn fail(&mut self, error: ModelError) {
        self.first_error.get_or_insert(error);
    }
}

// ── MissionModel ────────────────────────────────────────────────

/// An immutable, shareable mission model.
pub struct MissionModel {
    registry: Arc<Registry>,
    activity_types: IndexMap<String, ActivityType>,
    real_resources: IndexMap<String, RealResource>,
    discrete_resources: IndexMap<String, DiscreteResource>,
    constraints: Vec<Constraint>,
    daemons: Vec<(String, DaemonFactory)>,
}

impl MissionModel {
    /// Start building a model.
    pub fn builder() -> MissionModelBuilder {
        MissionModelBuilder::new()
    }

    /// The cell and topic registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Look up an activity type.
    pub fn activity_type(&self, name: &str) -> Option<&ActivityType> {
        self.activity_types.get(name)
    }

    /// Every activity type, in registration order.
    pub fn activity_types(&self) -> impl Iterator<Item = &ActivityType> {
        self.activity_types.values()
    }

    /// Validate and build a task for `activity`.
    pub fn instantiate(
        &self,
        activity: &SerializedActivity,
    ) -> Result<(Arguments, Box<dyn Task>), InstantiationError> {
        instantiate_with(self.activity_type(&activity.type_name), activity)
    }

    /// Check `activity` without building a task.
    ///
    /// Malformed arguments are an error; well-formed arguments that break an
    /// activity-type validation are returned as the list of failed subjects.
    pub fn validate_activity(
        &self,
        activity: &SerializedActivity,
    ) -> Result<Vec<String>, InstantiationError> {
        let ty = self
            .activity_type(&activity.type_name)
            .ok_or_else(|| InstantiationError::UnknownType {
                type_name: activity.type_name.clone(),
            })?;
        let effective = ty.validate_arguments(&activity.arguments)?;
        Ok(ty.failed_validations(&effective))
    }

    /// Look up a real resource.
    pub fn real_resource(&self, name: &str) -> Option<&RealResource> {
        self.real_resources.get(name)
    }

    /// Real resources, in registration order.
    pub fn real_resources(&self) -> impl Iterator<Item = (&str, &RealResource)> {
        self.real_resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a discrete resource.
    pub fn discrete_resource(&self, name: &str) -> Option<&DiscreteResource> {
        self.discrete_resources.get(name)
    }

    /// Discrete resources, in registration order.
    pub fn discrete_resources(&self) -> impl Iterator<Item = (&str, &DiscreteResource)> {
        self.discrete_resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Declared constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub(crate) fn daemons(&self) -> &[(String, DaemonFactory)] {
        &self.daemons
    }
}

impl fmt::Debug for MissionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MissionModel")
            .field("registry", &self.registry)
            .field("activity_types", &self.activity_types.keys().collect::<Vec<_>>())
            .field("real_resources", &self.real_resources.keys().collect::<Vec<_>>())
            .field(
                "discrete_resources",
                &self.discrete_resources.keys().collect::<Vec<_>>(),
            )
            .field("constraints", &self.constraints.len())
            .field("daemons", &self.daemons.len())
            .finish()
    }
}
