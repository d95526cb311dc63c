//! Frames, the scope chain, and path evaluation.

use serde_json::Value;
use std::collections::HashSet;

use super::expr::{Expr, Reference, Segment, TemplatePart};
use crate::core::Record;
use crate::errors::{FlowError, Result};

/// One level of bindings.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bindings: Record,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame holding the given bindings.
    #[must_use]
    pub const fn with_bindings(bindings: Record) -> Self {
        Self { bindings }
    }

    /// Returns the bindings held by this frame.
    #[must_use]
    pub const fn bindings(&self) -> &Record {
        &self.bindings
    }
}

/// A chain of frames with accumulator gating.
///
/// Component ids registered with [`Scope::gate`] cannot be read until
/// [`Scope::finalize`] is called for them.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
    gated: HashSet<String>,
    finalized: HashSet<String>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a scope with an empty root frame.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(Record::new())
    }

    /// Creates a scope whose root frame holds the given bindings.
    #[must_use]
    pub fn with_root(bindings: Record) -> Self {
        Self {
            frames: vec![Frame::with_bindings(bindings)],
            gated: HashSet::new(),
            finalized: HashSet::new(),
        }
    }

    /// Returns the number of frames, root included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a child frame.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pops the innermost frame. The root frame is never popped.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Binds a name in the innermost frame.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.into(), value);
        }
    }

    /// Binds a name in the root frame.
    pub fn bind_root(&mut self, name: impl Into<String>, value: Value) {
        self.frames[0].bindings.insert(name.into(), value);
    }

    /// Binds a component's output record in the innermost frame and mirrors
    /// it into the root frame under the component id.
    pub fn bind_output(&mut self, component_id: &str, outputs: &Record) {
        let value = Value::Object(outputs.clone());
        if self.frames.len() > 1 {
            self.bind_root(component_id, value.clone());
        }
        self.bind(component_id, value);
    }

    /// Looks up a bare name, innermost frame first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Returns the root frame's bindings.
    #[must_use]
    pub fn root_bindings(&self) -> &Record {
        &self.frames[0].bindings
    }

    /// Marks a component id as an accumulator whose outputs are hidden
    /// until finalized.
    pub fn gate(&mut self, component_id: impl Into<String>) {
        self.gated.insert(component_id.into());
    }

    /// Marks an accumulator as finalized, making it readable.
    pub fn finalize(&mut self, component_id: impl Into<String>) {
        self.finalized.insert(component_id.into());
    }

    /// Returns true if the accumulator has been finalized.
    #[must_use]
    pub fn is_finalized(&self, component_id: &str) -> bool {
        self.finalized.contains(component_id)
    }

    /// Returns true if reads of this name are currently blocked.
    #[must_use]
    pub fn is_blocked(&self, name: &str) -> bool {
        self.gated.contains(name) && !self.finalized.contains(name)
    }

    /// Evaluates a reference against the scope.
    ///
    /// Paths that walk through a null value resolve to null, so steps can
    /// read the fields of a skipped component's null-shaped output.
    pub fn resolve_reference(&self, reference: &Reference) -> Result<Value> {
        let root = reference.root();
        if self.is_blocked(root) {
            return Err(FlowError::NotFinalized {
                component_id: root.to_string(),
            });
        }

        let mut current = self
            .get(root)
            .ok_or_else(|| FlowError::unresolved(root, reference.to_string()))?;

        for (depth, segment) in reference.segments().iter().enumerate() {
            let next = match (current, segment) {
                (Value::Null, _) => return Ok(Value::Null),
                (Value::Object(map), Segment::Key(key)) => map.get(key),
                (Value::Array(items), Segment::Index(index)) => items.get(*index),
                (Value::Array(items), Segment::Key(key)) => match key.parse::<usize>() {
                    Ok(index) => items.get(index),
                    Err(_) => {
                        return Err(FlowError::type_mismatch(
                            reference.to_string(),
                            "record",
                            current,
                        ))
                    }
                },
                (Value::Object(_), Segment::Index(_)) => {
                    return Err(FlowError::type_mismatch(
                        reference.to_string(),
                        "sequence",
                        current,
                    ))
                }
                (scalar, _) => {
                    return Err(FlowError::type_mismatch(
                        reference.to_string(),
                        "record or sequence",
                        scalar,
                    ))
                }
            };

            current = next.ok_or_else(|| {
                FlowError::unresolved(reference.prefix(depth + 1), reference.to_string())
            })?;
        }

        Ok(current.clone())
    }

    /// Evaluates a parsed expression.
    pub fn resolve_expr(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(text) => Ok(Value::String(text.clone())),
            Expr::Reference(reference) => self.resolve_reference(reference),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Ref(reference) => {
                            render_into(&mut out, &self.resolve_reference(reference)?);
                        }
                    }
                }
                Ok(Value::String(out))
            }
        }
    }

    /// Resolves every reference embedded in a JSON value.
    ///
    /// Strings are parsed as expressions; sequences and records are walked
    /// recursively; other scalars pass through unchanged.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(text) => self.resolve_expr(&Expr::parse(text)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => self.resolve_record(map).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    /// Resolves each field of a binding record.
    pub fn resolve_record(&self, bindings: &Record) -> Result<Record> {
        bindings
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.resolve_value(value)?)))
            .collect()
    }

    /// Interpolates references into text, always producing a string.
    pub fn interpolate(&self, text: &str) -> Result<String> {
        match self.resolve_expr(&Expr::parse(text))? {
            Value::String(s) => Ok(s),
            other => {
                let mut out = String::new();
                render_into(&mut out, &other);
                Ok(out)
            }
        }
    }
}

/// Appends the text form of a value. Strings are inserted raw and null
/// renders as nothing.
fn render_into(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}
