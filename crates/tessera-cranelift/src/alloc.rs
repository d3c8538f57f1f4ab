//! Constant allocation sizing.

use tessera_core::Expr;

use crate::{CompilationError, CompilationResult};

/// Largest element count a single allocation may have.
pub const MAX_ALLOCATION_SIZE: i64 = i32::MAX as i64;

/// Fold the extents of allocation `name` into a constant element count.
///
/// Returns `Ok(None)` as soon as an extent is not a constant. Extents are
/// multiplied in order, and the allocation is rejected the moment the
/// running product exceeds [`MAX_ALLOCATION_SIZE`], even if a later extent
/// would not have folded. An empty extent list describes a single element.
///
/// Negative products are not rejected. They are truncated to 32 bits, so a
/// product too negative for an `i32` wraps.
pub fn constant_allocation_size(extents: &[Expr], name: &str) -> CompilationResult<Option<i32>> {
    let mut size: i64 = 1;
    for extent in extents {
        let Some(extent) = extent.as_const() else {
            return Ok(None);
        };
        size = size.saturating_mul(extent);
        if size > MAX_ALLOCATION_SIZE {
            return Err(CompilationError::allocation_too_large(name));
        }
    }
    // Only the upper bound is checked. Products below i32::MIN keep their
    // low 32 bits.
    Ok(Some(size as i32))
}
