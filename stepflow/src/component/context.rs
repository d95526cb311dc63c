//! The surface a component sees while it executes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::Record;
use crate::errors::{ComponentError, Result};
use crate::scope::Scope;

/// An output destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// The run's exported values.
    Return,
    /// A JSON file, relative paths resolved against the output directory.
    File(PathBuf),
    /// Standard output.
    Console,
}

impl Channel {
    /// Parses a destination name. `file` needs a path to be useful, so it
    /// takes the given default.
    #[must_use]
    pub fn parse(name: &str, file_path: impl Into<PathBuf>) -> Option<Self> {
        match name {
            "return" => Some(Self::Return),
            "console" => Some(Self::Console),
            "file" => Some(Self::File(file_path.into())),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return => write!(f, "return"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Console => write!(f, "console"),
        }
    }
}

/// Delivers writes to the file and console channels.
///
/// Return writes never reach a writer; they are buffered by the
/// [`ComponentContext`] and merged into the run's exports.
pub trait DestinationWriter: Send + Sync {
    /// Writes a value to a channel.
    fn write(&self, channel: &Channel, value: &Value) -> std::result::Result<(), ComponentError>;
}

/// Writes files under an output directory and prints console writes.
#[derive(Debug, Clone)]
pub struct StandardDestinations {
    output_dir: PathBuf,
}

impl StandardDestinations {
    /// Creates a writer rooted at `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl DestinationWriter for StandardDestinations {
    fn write(&self, channel: &Channel, value: &Value) -> std::result::Result<(), ComponentError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| ComponentError::permanent("value is not serializable").with_cause(e))?;

        match channel {
            Channel::Return => Ok(()),
            Channel::Console => {
                println!("{text}");
                Ok(())
            }
            Channel::File(path) => {
                let full = if path.is_absolute() {
                    path.clone()
                } else {
                    self.output_dir.join(path)
                };
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ComponentError::new(format!("cannot create {}", parent.display()))
                            .with_cause(e)
                    })?;
                }
                std::fs::write(&full, text).map_err(|e| {
                    ComponentError::new(format!("cannot write {}", full.display())).with_cause(e)
                })?;
                tracing::debug!(path = %full.display(), "Wrote file destination");
                Ok(())
            }
        }
    }
}

/// Scope writes and return writes made during one invocation.
///
/// Held back until the invocation completes, recorded in its checkpoint,
/// and replayed when the checkpoint is reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    /// Names bound into the step's frame.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub bindings: Record,
    /// Entries merged into the run's exports.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub returns: Record,
}

impl Effects {
    /// Returns true if the invocation made no buffered writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.returns.is_empty()
    }
}

/// What a component can see and do while it runs.
pub struct ComponentContext<'a> {
    component_id: &'a str,
    step: &'a str,
    scope: &'a Scope,
    destinations: &'a dyn DestinationWriter,
    effects: Effects,
}

impl<'a> ComponentContext<'a> {
    /// Creates a context for one invocation.
    #[must_use]
    pub fn new(
        component_id: &'a str,
        step: &'a str,
        scope: &'a Scope,
        destinations: &'a dyn DestinationWriter,
    ) -> Self {
        Self {
            component_id,
            step,
            scope,
            destinations,
            effects: Effects::default(),
        }
    }

    /// The id of the invoked component.
    #[must_use]
    pub const fn component_id(&self) -> &str {
        self.component_id
    }

    /// The structural path of the invoking step.
    #[must_use]
    pub const fn step(&self) -> &str {
        self.step
    }

    /// Looks up a bare name in the scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scope.get(name)
    }

    /// Resolves an expression such as `"{fetch.rows}"` against the scope.
    pub fn resolve(&self, expression: &str) -> Result<Value> {
        self.scope.resolve_value(&Value::String(expression.to_string()))
    }

    /// Interpolates references into text.
    pub fn interpolate(&self, text: &str) -> Result<String> {
        self.scope.interpolate(text)
    }

    /// Binds a name in the step's frame once the invocation completes.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.effects.bindings.insert(name.into(), value);
    }

    /// Writes a value to a destination channel.
    ///
    /// Return writes must be records; their entries become run exports.
    pub fn write(&mut self, channel: &Channel, value: Value) -> std::result::Result<(), ComponentError> {
        match channel {
            Channel::Return => match value {
                Value::Object(entries) => {
                    self.effects.returns.extend(entries);
                    Ok(())
                }
                other => Err(ComponentError::permanent(format!(
                    "return writes must be records, got {}",
                    crate::errors::value_kind(&other)
                ))),
            },
            other => self.destinations.write(other, &value),
        }
    }

    /// Consumes the context, returning its buffered writes.
    #[must_use]
    pub fn into_effects(self) -> Effects {
        self.effects
    }
}

impl fmt::Debug for ComponentContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("component_id", &self.component_id)
            .field("step", &self.step)
            .field("effects", &self.effects)
            .finish_non_exhaustive()
    }
}
