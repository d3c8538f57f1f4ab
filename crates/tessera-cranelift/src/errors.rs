//! Error types for Cranelift compilation

use derive_more::Display;
use tessera_core::ClosureError;

use crate::types::MachineType;

pub type CompilationResult<T> = Result<T, CompilationError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct CompilationError {
    kind: Box<CompilationErrorKind>,
}

impl<E> From<E> for CompilationError
where
    CompilationErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        CompilationError {
            kind: Box::new(CompilationErrorKind::from(error)),
        }
    }
}

impl CompilationError {
    pub fn kind(&self) -> &CompilationErrorKind {
        &self.kind
    }

    /// Whether the error is caused by the program being compiled rather than
    /// by an inconsistency inside the compiler.
    pub fn is_user_error(&self) -> bool {
        matches!(*self.kind, CompilationErrorKind::AllocationTooLarge(_))
    }

    pub(crate) fn unsupported_float_width(bits: u16) -> Self {
        CompilationErrorKind::UnsupportedFloatWidth(bits).into()
    }

    pub(crate) fn unsupported_type(ty: &MachineType) -> Self {
        CompilationErrorKind::UnsupportedType(ty.to_string()).into()
    }

    pub(crate) fn missing_capture(name: &str) -> Self {
        CompilationErrorKind::MissingCapture(name.to_owned()).into()
    }

    pub(crate) fn capture_shadowed(name: &str) -> Self {
        CompilationErrorKind::CaptureShadowed(name.to_owned()).into()
    }

    pub(crate) fn allocation_too_large(name: &str) -> Self {
        CompilationErrorKind::AllocationTooLarge(name.to_owned()).into()
    }

    pub(crate) fn record_too_large(field: &str) -> Self {
        CompilationErrorKind::RecordTooLarge(field.to_owned()).into()
    }

    pub(crate) fn layout_mismatch(msg: impl std::fmt::Display) -> Self {
        CompilationErrorKind::LayoutMismatch(msg.to_string()).into()
    }

    pub(crate) fn type_error(msg: impl std::fmt::Display) -> Self {
        CompilationErrorKind::TypeError(msg.to_string()).into()
    }

    pub(crate) fn codegen(msg: impl std::fmt::Display) -> Self {
        CompilationErrorKind::CodegenError(msg.to_string()).into()
    }
}

#[derive(Display, Debug)]
pub enum CompilationErrorKind {
    #[display("There is no machine type matching floating-point bit width {_0}")]
    UnsupportedFloatWidth(u16),

    #[display("Type {_0} has no register representation")]
    UnsupportedType(String),

    #[display("Closure capture `{_0}` is not defined in the enclosing scope")]
    MissingCapture(String),

    #[display("Closure capture `{_0}` would shadow an existing binding")]
    CaptureShadowed(String),

    #[display("Total size for allocation {_0} is constant but exceeds 2^31 - 1")]
    AllocationTooLarge(String),

    #[display("Closure record overflows 2^32 bytes at field `{_0}`")]
    RecordTooLarge(String),

    #[display("Closure record does not match its capture set: {_0}")]
    LayoutMismatch(String),

    #[display("Type error: {_0}")]
    TypeError(String),

    #[display("Invalid closure: {_0}")]
    Closure(ClosureError),

    #[display("Code generation error: {_0}")]
    CodegenError(String),

    #[display("Module error: {_0}")]
    ModuleError(cranelift_module::ModuleError),

    #[display("Cranelift error: {_0}")]
    CraneliftError(String),

    #[display("Invalid target: {_0}")]
    InvalidTarget(String),

    #[display("Object generation failed: {_0}")]
    ObjectError(object::write::Error),
}

impl From<ClosureError> for CompilationErrorKind {
    fn from(error: ClosureError) -> Self {
        CompilationErrorKind::Closure(error)
    }
}

impl From<cranelift_module::ModuleError> for CompilationErrorKind {
    fn from(error: cranelift_module::ModuleError) -> Self {
        CompilationErrorKind::ModuleError(error)
    }
}

impl From<object::write::Error> for CompilationErrorKind {
    fn from(error: object::write::Error) -> Self {
        CompilationErrorKind::ObjectError(error)
    }
}

impl From<cranelift_codegen::settings::SetError> for CompilationErrorKind {
    fn from(error: cranelift_codegen::settings::SetError) -> Self {
        CompilationErrorKind::CraneliftError(error.to_string())
    }
}

impl From<cranelift_codegen::isa::LookupError> for CompilationErrorKind {
    fn from(error: cranelift_codegen::isa::LookupError) -> Self {
        CompilationErrorKind::InvalidTarget(error.to_string())
    }
}

impl From<cranelift_codegen::CodegenError> for CompilationErrorKind {
    fn from(error: cranelift_codegen::CodegenError) -> Self {
        CompilationErrorKind::CodegenError(error.to_string())
    }
}

impl std::error::Error for CompilationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            CompilationErrorKind::Closure(e) => Some(e),
            CompilationErrorKind::ModuleError(e) => Some(e),
            CompilationErrorKind::ObjectError(e) => Some(e),
            _ => None,
        }
    }
}
