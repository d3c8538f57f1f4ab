//! Machine types and the mapping from Tessera value types.
//!
//! [`MachineType`] is the backend's view of a value: it keeps the exact
//! integer width and vector length asked for, and knows how that value is
//! laid out in memory and which Cranelift register type carries it.
//!
//! ## Size mapping
//!
//! | Machine type     | Register type         | Size / alignment            |
//! |------------------|-----------------------|-----------------------------|
//! | `i1`..`i8`       | `i8`                  | 1                           |
//! | `i9`..`i16`      | `i16`                 | 2                           |
//! | `i17`..`i32`     | `i32`                 | 4                           |
//! | `i33`..`i64`     | `i64`                 | 8                           |
//! | `i65`..`i128`    | `i128`                | 16                          |
//! | `f16/f32/f64`    | `f16/f32/f64`         | 2 / 4 / 8                   |
//! | `*T`             | target pointer        | pointer size                |
//! | `TxN`            | `T.by(N)` if legal    | element size * N, see below |
//!
//! Vectors are aligned to their size rounded up to a power of two, capped
//! at 16 bytes, and padded to that alignment. Opaque named types only appear
//! behind pointers and have no size of their own.

use std::fmt;

use cranelift_codegen::ir::types::{self as cl_types, Type};
use tessera_core::{ScalarType, TargetInfo, ValueType};

use crate::{CompilationError, CompilationResult};

/// Name of the runtime's buffer metadata record.
pub const BUFFER_METADATA_TYPE: &str = "halide_buffer_t";

/// Largest alignment any machine type asks for.
const MAX_ALIGN: u32 = 16;

/// Largest vector Cranelift can keep in one register.
const MAX_VECTOR_BITS: u32 = 128;

/// A concrete machine type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MachineType {
    /// Integer of exactly this many bits. Signedness is not part of the
    /// machine type.
    Int(u16),
    Half,
    Float,
    Double,
    Pointer(Box<MachineType>),
    /// A named type registered elsewhere, only usable behind a pointer.
    Opaque(String),
    Vector(Box<MachineType>, u16),
}

impl MachineType {
    pub fn pointer_to(pointee: MachineType) -> Self {
        MachineType::Pointer(Box::new(pointee))
    }

    /// The runtime's buffer metadata type.
    pub fn buffer_metadata() -> Self {
        MachineType::Opaque(BUFFER_METADATA_TYPE.to_owned())
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, MachineType::Pointer(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, MachineType::Vector(..))
    }

    /// Size and alignment in bytes, or `None` for unsized (opaque) types.
    pub fn size_align(&self, target: &TargetInfo) -> Option<(u32, u32)> {
        match self {
            MachineType::Int(bits) => {
                let size = int_storage_bytes(*bits);
                Some((size, size.min(MAX_ALIGN)))
            }
            MachineType::Half => Some((2, 2)),
            MachineType::Float => Some((4, 4)),
            MachineType::Double => Some((8, 8)),
            MachineType::Pointer(_) => {
                let size = u32::from(target.pointer_size());
                Some((size, size))
            }
            MachineType::Opaque(_) => None,
            MachineType::Vector(element, lanes) => {
                let (element_size, _) = element.size_align(target)?;
                let bytes = element_size.checked_mul(u32::from(*lanes))?;
                let align = bytes.min(MAX_ALIGN).next_power_of_two();
                Some((align_to(bytes, align)?, align))
            }
        }
    }

    /// The Cranelift type that holds a value of this type in a register, or
    /// `None` when no single register type can.
    pub fn register_type(&self, target: &TargetInfo) -> Option<Type> {
        match self {
            MachineType::Int(bits) => match bits {
                0 => None,
                1..=8 => Some(cl_types::I8),
                9..=16 => Some(cl_types::I16),
                17..=32 => Some(cl_types::I32),
                33..=64 => Some(cl_types::I64),
                65..=128 => Some(cl_types::I128),
                _ => None,
            },
            MachineType::Half => Some(cl_types::F16),
            MachineType::Float => Some(cl_types::F32),
            MachineType::Double => Some(cl_types::F64),
            MachineType::Pointer(_) => Some(pointer_type(target)),
            MachineType::Opaque(_) => None,
            MachineType::Vector(element, lanes) => {
                let lane_ty = element.register_type(target)?;
                let vector_ty = lane_ty.by(u32::from(*lanes))?;
                (vector_ty.bits() <= MAX_VECTOR_BITS).then_some(vector_ty)
            }
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::Int(bits) => write!(f, "i{bits}"),
            MachineType::Half => write!(f, "f16"),
            MachineType::Float => write!(f, "f32"),
            MachineType::Double => write!(f, "f64"),
            MachineType::Pointer(pointee) => write!(f, "*{pointee}"),
            MachineType::Opaque(name) => write!(f, "%{name}"),
            MachineType::Vector(element, lanes) => write!(f, "{element}x{lanes}"),
        }
    }
}

/// Map a value type to its machine type.
pub fn map_type(ty: &ValueType) -> CompilationResult<MachineType> {
    match ty {
        ValueType::Scalar(scalar) => map_scalar(*scalar),
        ValueType::Vector(element, lanes) => {
            let element = map_scalar(*element)?;
            Ok(MachineType::Vector(Box::new(element), *lanes))
        }
    }
}

fn map_scalar(scalar: ScalarType) -> CompilationResult<MachineType> {
    match scalar {
        ScalarType::Float(16) => Ok(MachineType::Half),
        ScalarType::Float(32) => Ok(MachineType::Float),
        ScalarType::Float(64) => Ok(MachineType::Double),
        ScalarType::Float(bits) => Err(CompilationError::unsupported_float_width(bits)),
        // Handles are opaque byte pointers.
        ScalarType::Handle => Ok(MachineType::pointer_to(MachineType::Int(8))),
        ScalarType::Int(bits) | ScalarType::UInt(bits) => Ok(MachineType::Int(bits)),
    }
}

/// Get the pointer type for the target platform
pub fn pointer_type(target: &TargetInfo) -> Type {
    match target.pointer_size() {
        2 => cl_types::I16,
        4 => cl_types::I32,
        _ => cl_types::I64,
    }
}

/// Bytes used to store an integer: the smallest power of two that holds it.
fn int_storage_bytes(bits: u16) -> u32 {
    u32::from(bits).div_ceil(8).max(1).next_power_of_two()
}

/// Round `offset` up to a multiple of `align` (a power of two), or `None`
/// if the result does not fit in a `u32`.
pub(crate) fn align_to(offset: u32, align: u32) -> Option<u32> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x86_64() -> TargetInfo {
        TargetInfo::parse("x86_64-unknown-linux-gnu").unwrap()
    }

    fn i686() -> TargetInfo {
        TargetInfo::parse("i686-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn test_map_floats() {
        assert_eq!(map_type(&ValueType::float(16)).unwrap(), MachineType::Half);
        assert_eq!(map_type(&ValueType::float(32)).unwrap(), MachineType::Float);
        assert_eq!(map_type(&ValueType::float(64)).unwrap(), MachineType::Double);
    }

    #[test]
    fn test_map_unsupported_float_width() {
        for bits in [8, 24, 80, 128] {
            let err = map_type(&ValueType::float(bits)).unwrap_err();
            assert!(
                matches!(err.kind(), crate::CompilationErrorKind::UnsupportedFloatWidth(b) if *b == bits),
                "unexpected error for float{bits}: {err}"
            );
        }
        let vector = ValueType::vector(ScalarType::Float(24), 4);
        assert!(map_type(&vector).is_err());
    }

    #[test]
    fn test_map_integers_keep_exact_width() {
        assert_eq!(map_type(&ValueType::bool()).unwrap(), MachineType::Int(1));
        assert_eq!(map_type(&ValueType::int(24)).unwrap(), MachineType::Int(24));
        // Signedness is dropped.
        assert_eq!(
            map_type(&ValueType::uint(32)).unwrap(),
            map_type(&ValueType::int(32)).unwrap()
        );
    }

    #[test]
    fn test_map_handle() {
        let ty = map_type(&ValueType::handle()).unwrap();
        assert!(ty.is_pointer());
        assert_eq!(ty.to_string(), "*i8");
        assert_eq!(ty.register_type(&x86_64()), Some(cl_types::I64));
        assert_eq!(ty.register_type(&i686()), Some(cl_types::I32));
    }

    #[test]
    fn test_map_vectors() {
        let ty = map_type(&ValueType::vector(ScalarType::Float(32), 4)).unwrap();
        assert_eq!(ty, MachineType::Vector(Box::new(MachineType::Float), 4));
        assert_eq!(ty.to_string(), "f32x4");
        assert_eq!(ty.register_type(&x86_64()), Some(cl_types::F32X4));

        let ty = map_type(&ValueType::vector(ScalarType::UInt(8), 16)).unwrap();
        assert_eq!(ty.register_type(&x86_64()), Some(cl_types::I8X16));
    }

    #[test]
    fn test_register_types() {
        let target = x86_64();
        assert_eq!(MachineType::Int(1).register_type(&target), Some(cl_types::I8));
        assert_eq!(MachineType::Int(24).register_type(&target), Some(cl_types::I32));
        assert_eq!(MachineType::Int(64).register_type(&target), Some(cl_types::I64));
        assert_eq!(MachineType::Int(128).register_type(&target), Some(cl_types::I128));
        assert_eq!(MachineType::Int(200).register_type(&target), None);
        assert_eq!(MachineType::Half.register_type(&target), Some(cl_types::F16));
        assert_eq!(MachineType::buffer_metadata().register_type(&target), None);
        // Non power-of-two lane counts and oversized vectors have no register.
        let v3 = MachineType::Vector(Box::new(MachineType::Float), 3);
        assert_eq!(v3.register_type(&target), None);
        let v16 = MachineType::Vector(Box::new(MachineType::Float), 16);
        assert_eq!(v16.register_type(&target), None);
    }

    #[test]
    fn test_size_align() {
        let target = x86_64();
        assert_eq!(MachineType::Int(1).size_align(&target), Some((1, 1)));
        assert_eq!(MachineType::Int(24).size_align(&target), Some((4, 4)));
        assert_eq!(MachineType::Int(128).size_align(&target), Some((16, 16)));
        assert_eq!(MachineType::Double.size_align(&target), Some((8, 8)));
        assert_eq!(
            MachineType::pointer_to(MachineType::buffer_metadata()).size_align(&target),
            Some((8, 8))
        );
        assert_eq!(
            MachineType::pointer_to(MachineType::Float).size_align(&i686()),
            Some((4, 4))
        );
        assert_eq!(MachineType::buffer_metadata().size_align(&target), None);
    }

    #[test]
    fn test_vector_size_align() {
        let target = x86_64();
        let f32x4 = MachineType::Vector(Box::new(MachineType::Float), 4);
        assert_eq!(f32x4.size_align(&target), Some((16, 16)));
        // Twelve bytes of data, aligned and padded to sixteen.
        let f32x3 = MachineType::Vector(Box::new(MachineType::Float), 3);
        assert_eq!(f32x3.size_align(&target), Some((16, 16)));
        let i8x2 = MachineType::Vector(Box::new(MachineType::Int(8)), 2);
        assert_eq!(i8x2.size_align(&target), Some((2, 2)));
        let f64x8 = MachineType::Vector(Box::new(MachineType::Double), 8);
        assert_eq!(f64x8.size_align(&target), Some((64, 16)));
    }

    #[test]
    fn test_widest_vector_still_has_a_size() {
        // 8192-byte lanes, 65535 of them: just under 2^29 bytes.
        let wide = MachineType::Vector(Box::new(MachineType::Int(u16::MAX)), u16::MAX);
        assert_eq!(
            wide.size_align(&x86_64()),
            Some((8192 * u32::from(u16::MAX), 16))
        );
        assert_eq!(wide.register_type(&x86_64()), None);
    }

    #[test]
    fn test_align_to_overflow() {
        assert_eq!(align_to(13, 8), Some(16));
        assert_eq!(align_to(16, 16), Some(16));
        assert_eq!(align_to(u32::MAX - 3, 4), None);
        assert_eq!(align_to(u32::MAX, 1), Some(u32::MAX));
    }

    #[test]
    fn test_register_fits_in_storage() {
        let target = x86_64();
        let types = [
            ValueType::bool(),
            ValueType::int(8),
            ValueType::uint(24),
            ValueType::int(64),
            ValueType::float(16),
            ValueType::float(64),
            ValueType::handle(),
            ValueType::vector(ScalarType::Int(16), 8),
            ValueType::vector(ScalarType::Float(64), 2),
        ];
        for ty in types {
            let machine = map_type(&ty).unwrap();
            let reg = machine.register_type(&target).unwrap();
            let (size, _) = machine.size_align(&target).unwrap();
            assert!(reg.bytes() <= size, "{ty} does not fit in its storage");
        }
    }
}
