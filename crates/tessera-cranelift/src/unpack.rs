//! Loading a closure record back into bindings.

use cranelift_codegen::ir::{InstBuilder, MemFlags, Value};
use tessera_core::Closure;
use tracing::trace;

use crate::codegen::{ClosureCodegen, field_offset};
use crate::env::{Binding, Environment, Provenance};
use crate::layout::{RecordType, zip_slots};
use crate::{CompilationError, CompilationResult};

impl ClosureCodegen<'_, '_> {
    /// Load every slot of `closure` from the record at `src` into a fresh
    /// environment.
    pub fn unpack(
        &mut self,
        closure: &Closure,
        record: &RecordType,
        src: Value,
    ) -> CompilationResult<Environment> {
        let mut env = Environment::new();
        self.unpack_into(closure, record, src, &mut env)?;
        Ok(env)
    }

    /// Load every slot of `closure` from the record at `src` into `env`.
    ///
    /// Pointer slots are tagged with their own provenance scope. Each loaded
    /// value is labelled with its binding's position in `env`, which
    /// [`Environment::name_of_label`] maps back to the slot name. Fails if
    /// `env` already binds one of the slot names.
    pub fn unpack_into(
        &mut self,
        closure: &Closure,
        record: &RecordType,
        src: Value,
        env: &mut Environment,
    ) -> CompilationResult<()> {
        for (slot, field) in zip_slots(closure, record)? {
            if env.contains(&slot.name) {
                return Err(CompilationError::capture_shadowed(&slot.name));
            }
            let field_ty = self.field_register_type(field)?;
            let offset = field_offset(field)?;

            // The record is never written on this side.
            let flags = MemFlags::trusted().with_readonly();
            let value = self.builder.ins().load(field_ty, flags, src, offset);
            trace!(slot = %slot.name, offset, ty = %field_ty, "unpack");

            let binding = if field.ty.is_pointer() {
                Binding::with_provenance(value, Provenance::new(slot.name.as_str()))
            } else {
                Binding::new(value)
            };
            env.insert(slot.name.as_str(), binding)?;
            if let Some(label) = env.label_of(&slot.name) {
                self.builder.set_val_label(value, label);
            }
        }
        Ok(())
    }
}
