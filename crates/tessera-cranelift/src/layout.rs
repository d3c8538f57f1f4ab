//! Closure record layout.
//!
//! Derives the aggregate type that stores a [`Closure`]'s slots and computes
//! field offsets, sizes, and alignment for it.
//!
//! ## Layout rules
//!
//! - Fields are laid out in the closure's canonical slot order
//! - A scalar capture takes one field of its mapped machine type
//! - A buffer capture takes two pointer fields: data, then metadata
//! - Each field is aligned to its own alignment
//! - Total record size is padded to the maximum field alignment

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessera_core::{CaptureSlot, Closure, SlotKind, TargetInfo};
use tracing::debug;

use crate::types::{MachineType, align_to, map_type};
use crate::{CompilationError, CompilationResult};

/// Name given to closure record types.
pub const CLOSURE_TYPE_NAME: &str = "closure_t";

/// One field of a closure record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordField {
    /// Name of the slot stored in this field.
    pub name: String,
    pub ty: MachineType,
    /// Byte offset from the start of the record.
    pub offset: u32,
}

/// A named closure record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: String,
    fields: Vec<RecordField>,
    size: u32,
    align: u32,
}

impl RecordType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Total size in bytes (padded to alignment).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Maximum alignment of any field.
    pub fn align(&self) -> u32 {
        self.align
    }

    fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (size {}, align {})", self.name, self.size, self.align)?;
        for field in &self.fields {
            write!(f, "\n  {:>4}: {}: {}", field.offset, field.name, field.ty)?;
        }
        Ok(())
    }
}

/// The machine type of one closure slot.
pub fn slot_type(slot: &CaptureSlot, buffer_t: &MachineType) -> CompilationResult<MachineType> {
    match slot.kind {
        SlotKind::Scalar(ty) => map_type(&ty),
        SlotKind::BufferHost(elem_type) => Ok(MachineType::pointer_to(map_type(&elem_type)?)),
        SlotKind::BufferMeta => Ok(MachineType::pointer_to(buffer_t.clone())),
    }
}

/// Build the record type mirroring `closure`.
///
/// `buffer_t` is the metadata type buffer slots point to, normally
/// [`MachineType::buffer_metadata`].
pub fn build_closure_type(
    closure: &Closure,
    buffer_t: &MachineType,
    target: &TargetInfo,
) -> CompilationResult<RecordType> {
    let mut offset: u32 = 0;
    let mut max_align: u32 = 1;
    let mut fields = Vec::with_capacity(closure.slot_count());

    for slot in closure.slots() {
        let ty = slot_type(&slot, buffer_t)?;
        let (size, align) = ty
            .size_align(target)
            .ok_or_else(|| CompilationError::unsupported_type(&ty))?;

        let field_offset =
            align_to(offset, align).ok_or_else(|| CompilationError::record_too_large(&slot.name))?;
        offset = field_offset
            .checked_add(size)
            .ok_or_else(|| CompilationError::record_too_large(&slot.name))?;
        fields.push(RecordField {
            name: slot.name,
            ty,
            offset: field_offset,
        });
        max_align = max_align.max(align);
    }

    let size = align_to(offset, max_align).ok_or_else(|| {
        let last = fields.last().map_or(CLOSURE_TYPE_NAME, |field| field.name.as_str());
        CompilationError::record_too_large(last)
    })?;
    Ok(RecordType {
        name: CLOSURE_TYPE_NAME.to_owned(),
        fields,
        size,
        align: max_align,
    })
}

/// Pair each slot of `closure` with its field in `record`.
///
/// Fails when the record was not built from an identical capture set.
pub(crate) fn zip_slots<'r>(
    closure: &Closure,
    record: &'r RecordType,
) -> CompilationResult<Vec<(CaptureSlot, &'r RecordField)>> {
    if closure.slot_count() != record.fields.len() {
        return Err(CompilationError::layout_mismatch(format!(
            "{} has {} fields but the closure has {} slots",
            record.name,
            record.fields.len(),
            closure.slot_count()
        )));
    }
    closure
        .slots()
        .zip(&record.fields)
        .map(|(slot, field)| {
            if slot.name != field.name {
                return Err(CompilationError::layout_mismatch(format!(
                    "field at offset {} of {} holds `{}`, expected `{}`",
                    field.offset, record.name, field.name, slot.name
                )));
            }
            Ok((slot, field))
        })
        .collect()
}

/// Record types of one compilation unit, one per distinct capture set.
pub struct RecordTypes {
    target: TargetInfo,
    buffer_t: MachineType,
    interned: HashMap<Closure, Arc<RecordType>>,
}

impl RecordTypes {
    pub fn new(target: TargetInfo, buffer_t: MachineType) -> Self {
        Self {
            target,
            buffer_t,
            interned: HashMap::new(),
        }
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    /// Get the record type for `closure`, building it on first use.
    ///
    /// The first record is named `closure_t`, later ones `closure_t.1`,
    /// `closure_t.2`, and so on.
    pub fn intern(&mut self, closure: &Closure) -> CompilationResult<Arc<RecordType>> {
        if let Some(record) = self.interned.get(closure) {
            return Ok(Arc::clone(record));
        }

        let mut record = build_closure_type(closure, &self.buffer_t, &self.target)?;
        if !self.interned.is_empty() {
            record = record.with_name(format!("{}.{}", CLOSURE_TYPE_NAME, self.interned.len()));
        }
        debug!(
            name = record.name(),
            size = record.size(),
            fields = record.fields().len(),
            "built closure record type"
        );

        let record = Arc::new(record);
        self.interned.insert(closure.clone(), Arc::clone(&record));
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.interned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use tessera_core::{ScalarType, ValueType};

    fn x86_64() -> TargetInfo {
        TargetInfo::parse("x86_64-unknown-linux-gnu").unwrap()
    }

    fn build(closure: &Closure) -> RecordType {
        build_closure_type(closure, &MachineType::buffer_metadata(), &x86_64()).unwrap()
    }

    #[test]
    fn test_empty_closure_layout() {
        let record = build(&Closure::new());

        assert!(record.fields().is_empty());
        assert_eq!(record.size(), 0);
        assert_eq!(record.align(), 1);
        assert_eq!(record.name(), CLOSURE_TYPE_NAME);
    }

    #[test]
    fn test_scalar_fields_with_padding() {
        // { a: i32, b: f64 }: a at 0, 4 bytes padding, b at 8
        let closure = Closure::new()
            .with_var("a", ValueType::int(32))
            .unwrap()
            .with_var("b", ValueType::float(64))
            .unwrap();
        let record = build(&closure);

        let offsets: Vec<u32> = record.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 8]);
        assert_eq!(record.size(), 16);
        assert_eq!(record.align(), 8);
    }

    #[test]
    fn test_buffer_contributes_two_pointer_fields() {
        let closure = Closure::new()
            .with_buffer("input", ValueType::uint(16))
            .unwrap();
        let record = build(&closure);

        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.fields()[0].name, "input.host");
        assert_eq!(
            record.fields()[0].ty,
            MachineType::pointer_to(MachineType::Int(16))
        );
        assert_eq!(record.fields()[1].name, "input.buffer");
        assert_eq!(
            record.fields()[1].ty,
            MachineType::pointer_to(MachineType::buffer_metadata())
        );
        assert_eq!(record.size(), 16);
    }

    #[test]
    fn test_record_display() {
        let closure = Closure::new()
            .with_var("x", ValueType::int(32))
            .unwrap()
            .with_var("flag", ValueType::bool())
            .unwrap()
            .with_var("scale", ValueType::vector(ScalarType::Float(32), 4))
            .unwrap()
            .with_buffer("in", ValueType::uint(8))
            .unwrap();

        assert_snapshot!(build(&closure).to_string(), @r"
        closure_t (size 48, align 16)
             0: x: i32
             4: flag: i1
            16: scale: f32x4
            32: in.host: *i8
            40: in.buffer: *%halide_buffer_t
        ");
    }

    #[test]
    fn test_pointer_width_follows_target() {
        let closure = Closure::new()
            .with_var("n", ValueType::int(32))
            .unwrap()
            .with_buffer("out", ValueType::float(32))
            .unwrap();
        let i686 = TargetInfo::parse("i686-unknown-linux-gnu").unwrap();
        let record = build_closure_type(&closure, &MachineType::buffer_metadata(), &i686).unwrap();

        let offsets: Vec<u32> = record.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(record.size(), 12);
        assert_eq!(record.align(), 4);
    }

    #[test]
    fn test_layout_is_reproducible() {
        let make = || {
            Closure::new()
                .with_var("y", ValueType::int(16))
                .unwrap()
                .with_buffer("b", ValueType::float(64))
                .unwrap()
                .with_var("x", ValueType::float(32))
                .unwrap()
        };
        assert_eq!(build(&make()), build(&make()));
    }

    #[test]
    fn test_unsupported_float_fails_layout() {
        let closure = Closure::new().with_var("h", ValueType::float(80)).unwrap();
        let err = build_closure_type(&closure, &MachineType::buffer_metadata(), &x86_64())
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::CompilationErrorKind::UnsupportedFloatWidth(80)
        ));
    }

    #[test]
    fn test_record_past_u32_offsets_fails() {
        // Each capture is just under 2^29 bytes, so the ninth one no longer fits.
        let huge = ValueType::vector(ScalarType::Int(u16::MAX), u16::MAX);
        let mut closure = Closure::new();
        for i in 0..9 {
            closure.add_var(format!("v{i}"), huge).unwrap();
        }

        let err = build_closure_type(&closure, &MachineType::buffer_metadata(), &x86_64())
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::CompilationErrorKind::RecordTooLarge(name) if name == "v8"
        ));

        closure = Closure::new();
        for i in 0..8 {
            closure.add_var(format!("v{i}"), huge).unwrap();
        }
        let record = build(&closure);
        assert_eq!(record.fields()[7].offset, 7 * 8192 * u32::from(u16::MAX));
    }

    #[test]
    fn test_zip_slots_detects_foreign_record() {
        let a = Closure::new().with_var("x", ValueType::int(32)).unwrap();
        let b = Closure::new().with_var("y", ValueType::int(32)).unwrap();
        let c = Closure::new()
            .with_var("x", ValueType::int(32))
            .unwrap()
            .with_var("z", ValueType::int(32))
            .unwrap();
        let record = build(&a);

        assert!(zip_slots(&a, &record).is_ok());
        assert!(zip_slots(&b, &record).is_err());
        assert!(zip_slots(&c, &record).is_err());
    }

    #[test]
    fn test_interning_reuses_records() {
        let mut records = RecordTypes::new(x86_64(), MachineType::buffer_metadata());
        let a = Closure::new().with_var("x", ValueType::int(32)).unwrap();
        let b = Closure::new().with_var("x", ValueType::int(64)).unwrap();

        let first = records.intern(&a).unwrap();
        let again = records.intern(&a.clone()).unwrap();
        let second = records.intern(&b).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.name(), "closure_t");
        assert_eq!(second.name(), "closure_t.1");
        assert_eq!(records.len(), 2);
    }
}
