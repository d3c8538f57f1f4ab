//! Storing captured values into a closure record.

use cranelift_codegen::ir::{InstBuilder, MemFlags, Value};
use tessera_core::{Closure, SlotKind};
use tracing::{trace, warn};

use crate::codegen::{ClosureCodegen, field_offset};
use crate::env::Environment;
use crate::layout::{RecordType, zip_slots};
use crate::{CompilationError, CompilationResult};

impl ClosureCodegen<'_, '_> {
    /// Store every slot of `closure` from `env` into the record at `dst`.
    ///
    /// Scalar captures must be bound in `env`. Buffer slots that are not
    /// bound are stored as null pointers, so a record can be built for a
    /// buffer whose data or metadata was never materialized.
    pub fn pack(
        &mut self,
        record: &RecordType,
        dst: Value,
        closure: &Closure,
        env: &Environment,
    ) -> CompilationResult<()> {
        for (slot, field) in zip_slots(closure, record)? {
            let field_ty = self.field_register_type(field)?;
            let value = match (env.value(&slot.name), slot.kind) {
                (Some(value), _) => self.reinterpret(value, field_ty)?,
                (None, SlotKind::Scalar(_)) => {
                    return Err(CompilationError::missing_capture(&slot.name));
                }
                (None, SlotKind::BufferHost(_) | SlotKind::BufferMeta) => {
                    warn!(slot = %slot.name, "buffer slot is not bound, storing null");
                    self.builder.ins().iconst(field_ty, 0)
                }
            };

            let offset = field_offset(field)?;
            trace!(slot = %slot.name, offset, ty = %field_ty, "pack");
            self.builder
                .ins()
                .store(MemFlags::trusted(), value, dst, offset);
        }
        Ok(())
    }
}
