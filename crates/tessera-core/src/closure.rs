//! Capture sets.
//!
//! A [`Closure`] is the ordered, name-unique set of scalar variables and
//! buffer references a code region needs from its enclosing scope. Every
//! consumer (layout, packing, unpacking) walks it through [`Closure::slots`],
//! which is the only agreement between those consumers about field order.
//!
//! ## Canonical order
//!
//! 1. Scalar captures, in insertion order.
//! 2. For each buffer capture in insertion order, its data slot
//!    (`<name>.host`) followed by its metadata slot (`<name>.buffer`).

use std::fmt;

use derive_more::Display;

use crate::types::ValueType;

/// Suffix of the slot holding a buffer's data pointer.
pub const HOST_SUFFIX: &str = ".host";

/// Suffix of the slot holding a pointer to a buffer's metadata record.
pub const BUFFER_SUFFIX: &str = ".buffer";

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ClosureError {
    #[display("capture `{_0}` is already present in the closure")]
    DuplicateCapture(String),
}

impl std::error::Error for ClosureError {}

/// A captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRef {
    /// Type of one element of the buffer's data.
    pub elem_type: ValueType,
}

/// What a single closure slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// A scalar variable of the given type.
    Scalar(ValueType),
    /// The data pointer of a buffer with the given element type.
    BufferHost(ValueType),
    /// The pointer to a buffer's metadata record.
    BufferMeta,
}

impl SlotKind {
    pub fn is_buffer(self) -> bool {
        matches!(self, SlotKind::BufferHost(_) | SlotKind::BufferMeta)
    }
}

/// One slot of a closure in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureSlot {
    pub name: String,
    pub kind: SlotKind,
}

/// An ordered capture set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Closure {
    vars: Vec<(String, ValueType)>,
    buffers: Vec<(String, BufferRef)>,
}

impl Closure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a scalar variable.
    pub fn add_var(&mut self, name: impl Into<String>, ty: ValueType) -> Result<(), ClosureError> {
        let name = name.into();
        self.check_unused(&name)?;
        self.vars.push((name, ty));
        Ok(())
    }

    /// Capture a buffer. Reserves both its data and metadata slots.
    pub fn add_buffer(
        &mut self,
        name: impl Into<String>,
        elem_type: ValueType,
    ) -> Result<(), ClosureError> {
        let name = name.into();
        self.check_unused(&host_slot_name(&name))?;
        self.check_unused(&meta_slot_name(&name))?;
        self.buffers.push((name, BufferRef { elem_type }));
        Ok(())
    }

    /// Builder-style [`Closure::add_var`].
    pub fn with_var(mut self, name: impl Into<String>, ty: ValueType) -> Result<Self, ClosureError> {
        self.add_var(name, ty)?;
        Ok(self)
    }

    /// Builder-style [`Closure::add_buffer`].
    pub fn with_buffer(
        mut self,
        name: impl Into<String>,
        elem_type: ValueType,
    ) -> Result<Self, ClosureError> {
        self.add_buffer(name, elem_type)?;
        Ok(self)
    }

    pub fn vars(&self) -> &[(String, ValueType)] {
        &self.vars
    }

    pub fn buffers(&self) -> &[(String, BufferRef)] {
        &self.buffers
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.buffers.is_empty()
    }

    /// Number of record fields this closure needs.
    pub fn slot_count(&self) -> usize {
        self.vars.len() + 2 * self.buffers.len()
    }

    /// The closure's slots in canonical order.
    pub fn slots(&self) -> impl Iterator<Item = CaptureSlot> + '_ {
        let vars = self.vars.iter().map(|(name, ty)| CaptureSlot {
            name: name.clone(),
            kind: SlotKind::Scalar(*ty),
        });
        let buffers = self.buffers.iter().flat_map(|(name, buffer)| {
            [
                CaptureSlot {
                    name: host_slot_name(name),
                    kind: SlotKind::BufferHost(buffer.elem_type),
                },
                CaptureSlot {
                    name: meta_slot_name(name),
                    kind: SlotKind::BufferMeta,
                },
            ]
        });
        vars.chain(buffers)
    }

    /// Slot names in canonical order.
    pub fn names(&self) -> Vec<String> {
        self.slots().map(|slot| slot.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots().any(|slot| slot.name == name)
    }

    fn check_unused(&self, name: &str) -> Result<(), ClosureError> {
        if self.contains(name) {
            return Err(ClosureError::DuplicateCapture(name.to_owned()));
        }
        Ok(())
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, ty)) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {name}: {ty}")?;
        }
        for (i, (name, buffer)) in self.buffers.iter().enumerate() {
            if i > 0 || !self.vars.is_empty() {
                write!(f, ",")?;
            }
            write!(f, " {name}: buffer<{}>", buffer.elem_type)?;
        }
        if !self.is_empty() {
            write!(f, " ")?;
        }
        write!(f, "}}")
    }
}

/// Name of the data slot of buffer `name`.
pub fn host_slot_name(name: &str) -> String {
    format!("{name}{HOST_SUFFIX}")
}

/// Name of the metadata slot of buffer `name`.
pub fn meta_slot_name(name: &str) -> String {
    format!("{name}{BUFFER_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Closure {
        Closure::new()
            .with_var("y", ValueType::float(32))
            .unwrap()
            .with_buffer("input", ValueType::uint(8))
            .unwrap()
            .with_var("x", ValueType::int(32))
            .unwrap()
            .with_buffer("output", ValueType::float(32))
            .unwrap()
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(
            sample().names(),
            vec![
                "y",
                "x",
                "input.host",
                "input.buffer",
                "output.host",
                "output.buffer"
            ]
        );
    }

    #[test]
    fn test_slot_kinds() {
        let slots: Vec<_> = sample().slots().collect();
        assert_eq!(slots[0].kind, SlotKind::Scalar(ValueType::float(32)));
        assert_eq!(slots[2].kind, SlotKind::BufferHost(ValueType::uint(8)));
        assert_eq!(slots[3].kind, SlotKind::BufferMeta);
        assert!(slots[3].kind.is_buffer());
        assert!(!slots[1].kind.is_buffer());
        assert_eq!(sample().slot_count(), slots.len());
    }

    #[test]
    fn test_order_is_a_function_of_contents() {
        let a = sample();
        let b = sample();
        assert_eq!(a, b);
        assert_eq!(a.names(), b.names());
    }

    #[test]
    fn test_duplicate_var_rejected() {
        let mut closure = Closure::new();
        closure.add_var("x", ValueType::int(32)).unwrap();
        assert_eq!(
            closure.add_var("x", ValueType::float(64)),
            Err(ClosureError::DuplicateCapture("x".to_owned()))
        );
    }

    #[test]
    fn test_buffer_slot_names_collide_with_vars() {
        let mut closure = Closure::new();
        closure.add_var("in.host", ValueType::handle()).unwrap();
        assert_eq!(
            closure.add_buffer("in", ValueType::uint(8)),
            Err(ClosureError::DuplicateCapture("in.host".to_owned()))
        );

        let mut closure = Closure::new();
        closure.add_buffer("in", ValueType::uint(8)).unwrap();
        assert!(closure.add_buffer("in", ValueType::uint(16)).is_err());
        assert!(closure.add_var("in.buffer", ValueType::handle()).is_err());
        // The bare buffer name is not a slot.
        assert!(closure.add_var("in", ValueType::int(32)).is_ok());
    }

    #[test]
    fn test_empty_closure() {
        let closure = Closure::new();
        assert!(closure.is_empty());
        assert_eq!(closure.slot_count(), 0);
        assert_eq!(closure.slots().count(), 0);
        assert_eq!(closure.to_string(), "{}");
    }

    #[test]
    fn test_display() {
        let closure = Closure::new()
            .with_var("x", ValueType::int(32))
            .unwrap()
            .with_buffer("in", ValueType::uint(8))
            .unwrap();
        assert_eq!(closure.to_string(), "{ x: int32, in: buffer<uint8> }");
    }
}
