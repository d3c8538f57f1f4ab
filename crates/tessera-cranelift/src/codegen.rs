//! Closure code generation.
//!
//! [`ClosureCodegen`] emits the Cranelift IR that moves a capture set in and
//! out of a closure record. Packing lives in `pack.rs` and unpacking in
//! `unpack.rs`; both walk [`zip_slots`](crate::layout) so they agree with the
//! layout on field order.

use cranelift_codegen::ir::{Endianness as ClEndianness, InstBuilder, MemFlags, Type, Value};
use cranelift_frontend::FunctionBuilder;
use tessera_core::TargetInfo;

use crate::layout::RecordField;
use crate::types::pointer_type;
use crate::{CompilationError, CompilationResult};

/// Emits closure record accesses into a function under construction.
pub struct ClosureCodegen<'a, 'b> {
    pub(crate) builder: &'a mut FunctionBuilder<'b>,
    pub(crate) target: &'a TargetInfo,
}

impl<'a, 'b> ClosureCodegen<'a, 'b> {
    pub fn new(builder: &'a mut FunctionBuilder<'b>, target: &'a TargetInfo) -> Self {
        Self { builder, target }
    }

    pub fn builder(&mut self) -> &mut FunctionBuilder<'b> {
        self.builder
    }

    pub fn pointer_type(&self) -> Type {
        pointer_type(self.target)
    }

    /// Register type of a record field.
    pub(crate) fn field_register_type(&self, field: &RecordField) -> CompilationResult<Type> {
        field
            .ty
            .register_type(self.target)
            .ok_or_else(|| CompilationError::unsupported_type(&field.ty))
    }

    /// Reinterpret `value` as `to` without changing its bits.
    ///
    /// Values that already have type `to` are returned unchanged.
    pub fn reinterpret(&mut self, value: Value, to: Type) -> CompilationResult<Value> {
        let from = self.builder.func.dfg.value_type(value);
        if from == to {
            return Ok(value);
        }
        if from.bits() != to.bits() {
            return Err(CompilationError::type_error(format!(
                "cannot reinterpret {from} ({} bits) as {to} ({} bits)",
                from.bits(),
                to.bits()
            )));
        }

        // Lane layout of vector bitcasts depends on byte order.
        let mut flags = MemFlags::new();
        if from.is_vector() || to.is_vector() {
            flags.set_endianness(if self.target.is_little_endian() {
                ClEndianness::Little
            } else {
                ClEndianness::Big
            });
        }
        Ok(self.builder.ins().bitcast(to, flags, value))
    }
}

/// A field's offset as a load/store immediate.
pub(crate) fn field_offset(field: &RecordField) -> CompilationResult<i32> {
    i32::try_from(field.offset).map_err(|_| {
        CompilationError::layout_mismatch(format!(
            "offset {} of `{}` does not fit an immediate",
            field.offset, field.name
        ))
    })
}
