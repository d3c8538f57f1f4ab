//! Tessera compiler core types.
pub mod closure;
pub mod expr;
pub mod target;
pub mod types;

pub use closure::{
    BUFFER_SUFFIX, BufferRef, CaptureSlot, Closure, ClosureError, HOST_SUFFIX, SlotKind,
    host_slot_name, meta_slot_name,
};
pub use expr::Expr;
pub use target::*;
pub use types::{ParseTypeError, ScalarType, ValueType};
