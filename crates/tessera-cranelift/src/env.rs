//! Name-to-value bindings visible to generated code.

use std::collections::HashMap;

use cranelift_codegen::ir::{Value, ValueLabel};

use crate::{CompilationError, CompilationResult};

/// Where a pointer loaded from a closure came from.
///
/// Pointers unpacked from different closure fields are tagged with the
/// field name, so later passes can tell that loads through them address
/// distinct memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
    scope: String,
}

impl Provenance {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Two tagged pointers may alias only when they share a scope.
    pub fn may_alias(&self, other: &Provenance) -> bool {
        self.scope == other.scope
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub value: Value,
    pub provenance: Option<Provenance>,
}

impl Binding {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            provenance: None,
        }
    }

    pub fn with_provenance(value: Value, provenance: Provenance) -> Self {
        Self {
            value,
            provenance: Some(provenance),
        }
    }
}

/// An insertion-ordered symbol table.
///
/// A binding's position doubles as its debug [`ValueLabel`], so labels
/// attached to unpacked values can be mapped back to capture names.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    index: HashMap<String, usize>,
    bindings: Vec<(String, Binding)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a plain value.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> CompilationResult<()> {
        self.insert(name, Binding::new(value))
    }

    /// Add a binding. Names are never rebound.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) -> CompilationResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(CompilationError::capture_shadowed(&name));
        }
        self.index.insert(name.clone(), self.bindings.len());
        self.bindings.push((name, binding));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.index.get(name).map(|&i| &self.bindings[i].1)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(|binding| binding.value)
    }

    /// Debug label of the binding for `name`.
    pub fn label_of(&self, name: &str) -> Option<ValueLabel> {
        let position = u32::try_from(*self.index.get(name)?).ok()?;
        Some(ValueLabel::from_u32(position))
    }

    /// Name bound at the position `label` encodes.
    pub fn name_of_label(&self, label: ValueLabel) -> Option<&str> {
        let position = usize::try_from(label.as_u32()).ok()?;
        self.bindings.get(position).map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.as_str(), binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::entity::EntityRef;

    #[test]
    fn test_bind_and_lookup() {
        let mut env = Environment::new();
        env.bind("x", Value::new(0)).unwrap();
        env.insert(
            "in.host",
            Binding::with_provenance(Value::new(1), Provenance::new("in.host")),
        )
        .unwrap();

        assert_eq!(env.value("x"), Some(Value::new(0)));
        assert_eq!(
            env.get("in.host").and_then(|b| b.provenance.as_ref()).map(Provenance::scope),
            Some("in.host")
        );
        assert_eq!(env.value("y"), None);
        assert_eq!(env.names().collect::<Vec<_>>(), vec!["x", "in.host"]);
    }

    #[test]
    fn test_rebinding_is_rejected() {
        let mut env = Environment::new();
        env.bind("x", Value::new(0)).unwrap();
        let err = env.bind("x", Value::new(1)).unwrap_err();

        assert!(matches!(
            err.kind(),
            crate::CompilationErrorKind::CaptureShadowed(name) if name == "x"
        ));
        assert_eq!(env.value("x"), Some(Value::new(0)));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_labels_follow_binding_order() {
        let mut env = Environment::new();
        env.bind("x", Value::new(4)).unwrap();
        env.bind("in.host", Value::new(2)).unwrap();

        let label = env.label_of("in.host").unwrap();
        assert_eq!(label, ValueLabel::from_u32(1));
        assert_eq!(env.name_of_label(label), Some("in.host"));
        assert_eq!(env.name_of_label(ValueLabel::from_u32(0)), Some("x"));
        assert_eq!(env.label_of("y"), None);
        assert_eq!(env.name_of_label(ValueLabel::from_u32(2)), None);
    }

    #[test]
    fn test_provenance_scopes() {
        let a = Provenance::new("a.host");
        let b = Provenance::new("b.host");
        assert!(a.may_alias(&a.clone()));
        assert!(!a.may_alias(&b));
    }
}
