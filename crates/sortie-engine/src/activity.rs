//! Activity types: named task constructors with parameter schemas.
//!
//! Instantiating a [`SerializedActivity`] checks its arguments against the
//! declared [`Parameter`]s before any task is built. Every offending
//! parameter gets its own [`ArgumentFailure`] entry; the caller never sees a
//! single opaque message for a malformed directive.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sortie_core::{Arguments, Duration, Parameter, SerializedActivity};
use thiserror::Error;

use crate::task::Task;

/// Builds a task from validated arguments (defaults already filled in).
pub type Instantiate = Arc<dyn Fn(&Arguments) -> Result<Box<dyn Task>, String> + Send + Sync>;

/// A named predicate over validated arguments.
pub type Validation = Arc<dyn Fn(&Arguments) -> bool + Send + Sync>;

// ── Failures ────────────────────────────────────────────────────

/// One problem with one argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentFailure {
    /// A required parameter was not supplied.
    Missing {
        /// Parameter name.
        parameter: String,
    },
    /// An argument names no declared parameter.
    Extraneous {
        /// Argument name.
        parameter: String,
    },
    /// An argument does not match its parameter's schema.
    Unconstructable {
        /// Parameter name.
        parameter: String,
        /// What was wrong.
        reason: String,
    },
}

impl ArgumentFailure {
    /// The parameter this failure concerns.
    pub fn parameter(&self) -> &str {
        match self {
            Self::Missing { parameter }
            | Self::Extraneous { parameter }
            | Self::Unconstructable { parameter, .. } => parameter,
        }
    }
}

impl fmt::Display for ArgumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { parameter } => write!(f, "missing '{parameter}'"),
            Self::Extraneous { parameter } => write!(f, "extraneous '{parameter}'"),
            Self::Unconstructable { parameter, reason } => {
                write!(f, "unconstructable '{parameter}': {reason}")
            }
        }
    }
}

fn list(failures: &[ArgumentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a serialized activity could not become a task.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InstantiationError {
    /// The mission model has no such activity type.
    #[error("unknown activity type '{type_name}'")]
    UnknownType {
        /// The requested name.
        type_name: String,
    },
    /// One or more arguments failed validation.
    #[error("invalid arguments for '{type_name}': {}", list(.failures))]
    InvalidArguments {
        /// The activity type.
        type_name: String,
        /// One entry per offending parameter.
        failures: Vec<ArgumentFailure>,
    },
    /// Arguments were well-formed but the constructor refused them.
    #[error("'{type_name}' rejected its arguments: {reason}")]
    Rejected {
        /// The activity type.
        type_name: String,
        /// The constructor's explanation.
        reason: String,
    },
}

impl InstantiationError {
    /// Per-parameter failures, empty for other variants.
    pub fn failures(&self) -> &[ArgumentFailure] {
        match self {
            Self::InvalidArguments { failures, .. } => failures,
            _ => &[],
        }
    }
}

// ── ActivityType ────────────────────────────────────────────────

/// A named, parameterized task constructor.
#[derive(Clone)]
pub struct ActivityType {
    name: String,
    parameters: Vec<Parameter>,
    validations: Vec<(String, Validation)>,
    instantiate: Instantiate,
}

impl ActivityType {
    /// An activity type with no parameters yet.
    pub fn new<F>(name: impl Into<String>, instantiate: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Box<dyn Task>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            validations: Vec::new(),
            instantiate: Arc::new(instantiate),
        }
    }

    /// Declare a parameter, builder style.
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare a validation predicate. `subject` describes what must hold.
    pub fn validation<F>(mut self, subject: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Arguments) -> bool + Send + Sync + 'static,
    {
        self.validations.push((subject.into(), Arc::new(predicate)));
        self
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters, in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Check `arguments` and return them with defaults filled in.
    ///
    /// Failures are listed in parameter declaration order, followed by
    /// extraneous arguments in name order.
    pub fn validate_arguments(&self, arguments: &Arguments) -> Result<Arguments, InstantiationError> {
        let mut failures = Vec::new();
        let mut filled = Arguments::new();
        for parameter in &self.parameters {
            match arguments.get(&parameter.name).or(parameter.default.as_ref()) {
                None => failures.push(ArgumentFailure::Missing {
                    parameter: parameter.name.clone(),
                }),
                Some(value) => match parameter.schema.check(value) {
                    Ok(()) => {
                        filled.insert(parameter.name.clone(), value.clone());
                    }
                    Err(reason) => failures.push(ArgumentFailure::Unconstructable {
                        parameter: parameter.name.clone(),
                        reason,
                    }),
                },
            }
        }
        for name in arguments.keys() {
            if !self.parameters.iter().any(|p| &p.name == name) {
                failures.push(ArgumentFailure::Extraneous {
                    parameter: name.clone(),
                });
            }
        }
        if failures.is_empty() {
            Ok(filled)
        } else {
            Err(InstantiationError::InvalidArguments {
                type_name: self.name.clone(),
                failures,
            })
        }
    }

    /// Validate and build a task. Returns the effective arguments alongside.
    pub fn instantiate(
        &self,
        arguments: &Arguments,
    ) -> Result<(Arguments, Box<dyn Task>), InstantiationError> {
        let effective = self.validate_arguments(arguments)?;
        let task = (self.instantiate)(&effective).map_err(|reason| InstantiationError::Rejected {
            type_name: self.name.clone(),
            reason,
        })?;
        Ok((effective, task))
    }

    /// Subjects of every validation that does not hold for `arguments`.
    /// `arguments` should already be validated.
    pub fn failed_validations(&self, arguments: &Arguments) -> Vec<String> {
        self.validations
            .iter()
            .filter(|(_, holds)| !holds(arguments))
            .map(|(subject, _)| subject.clone())
            .collect()
    }
}

impl fmt::Debug for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityType")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("validations", &self.validations.len())
            .finish_non_exhaustive()
    }
}

/// Validate and instantiate against an activity type found by name.
pub(crate) fn instantiate_with(
    ty: Option<&ActivityType>,
    activity: &SerializedActivity,
) -> Result<(Arguments, Box<dyn Task>), InstantiationError> {
    ty.ok_or_else(|| InstantiationError::UnknownType {
        type_name: activity.type_name.clone(),
    })?
    .instantiate(&activity.arguments)
}

// ── Argument helpers ────────────────────────────────────────────

fn arg<'a>(arguments: &'a Arguments, name: &str) -> Result<&'a serde_json::Value, String> {
    arguments
        .get(name)
        .ok_or_else(|| format!("argument '{name}' is missing"))
}

/// Read a real-valued argument.
pub fn arg_f64(arguments: &Arguments, name: &str) -> Result<f64, String> {
    arg(arguments, name)?
        .as_f64()
        .ok_or_else(|| format!("argument '{name}' is not a number"))
}

/// Read an integer argument.
pub fn arg_i64(arguments: &Arguments, name: &str) -> Result<i64, String> {
    arg(arguments, name)?
        .as_i64()
        .ok_or_else(|| format!("argument '{name}' is not an integer"))
}

/// Read a string argument.
pub fn arg_str<'a>(arguments: &'a Arguments, name: &str) -> Result<&'a str, String> {
    arg(arguments, name)?
        .as_str()
        .ok_or_else(|| format!("argument '{name}' is not a string"))
}

/// Read a duration argument given in microseconds.
pub fn arg_duration(arguments: &Arguments, name: &str) -> Result<Duration, String> {
    arg_i64(arguments, name).map(Duration::from_micros)
}
