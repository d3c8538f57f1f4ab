//! Abstract value types.
//!
//! A value type is either a scalar (integer, float or opaque handle) or a
//! vector of scalars. Vectors hold a [`ScalarType`] element, so a vector of
//! vectors cannot be expressed.
//!
//! ## Textual form
//!
//! | Type                  | Text         |
//! |-----------------------|--------------|
//! | signed integer        | `int32`      |
//! | unsigned integer      | `uint8`      |
//! | boolean               | `uint1`      |
//! | float                 | `float32`    |
//! | opaque handle         | `handle`     |
//! | vector                | `float32x4`  |
//!
//! `bool` is accepted as an alias for `uint1` when parsing.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A single-lane type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Signed integer of the given bit width.
    Int(u16),
    /// Unsigned integer of the given bit width.
    UInt(u16),
    /// IEEE float of the given bit width.
    Float(u16),
    /// Opaque pointer-sized value with no arithmetic semantics.
    Handle,
}

impl ScalarType {
    /// Bit width of the scalar. Handles report 64 bits; their machine size
    /// follows the target pointer width instead.
    pub fn bits(self) -> u16 {
        match self {
            ScalarType::Int(bits) | ScalarType::UInt(bits) | ScalarType::Float(bits) => bits,
            ScalarType::Handle => 64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float(_))
    }

    pub fn is_handle(self) -> bool {
        matches!(self, ScalarType::Handle)
    }

    pub fn is_int(self) -> bool {
        matches!(self, ScalarType::Int(_) | ScalarType::UInt(_))
    }

    /// Widen this scalar to `lanes` lanes. One lane (or zero) gives the
    /// scalar back.
    pub fn with_lanes(self, lanes: u16) -> ValueType {
        if lanes <= 1 {
            ValueType::Scalar(self)
        } else {
            ValueType::Vector(self, lanes)
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int(bits) => write!(f, "int{bits}"),
            ScalarType::UInt(bits) => write!(f, "uint{bits}"),
            ScalarType::Float(bits) => write!(f, "float{bits}"),
            ScalarType::Handle => write!(f, "handle"),
        }
    }
}

/// The type of a captured value.
///
/// Build vectors through [`ScalarType::with_lanes`] or [`ValueType::vector`]
/// so that a `Vector` always has more than one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ValueType {
    Scalar(ScalarType),
    Vector(ScalarType, u16),
}

impl ValueType {
    pub fn int(bits: u16) -> Self {
        ValueType::Scalar(ScalarType::Int(bits))
    }

    pub fn uint(bits: u16) -> Self {
        ValueType::Scalar(ScalarType::UInt(bits))
    }

    pub fn float(bits: u16) -> Self {
        ValueType::Scalar(ScalarType::Float(bits))
    }

    pub fn bool() -> Self {
        Self::uint(1)
    }

    pub fn handle() -> Self {
        ValueType::Scalar(ScalarType::Handle)
    }

    pub fn vector(element: ScalarType, lanes: u16) -> Self {
        element.with_lanes(lanes)
    }

    /// The scalar type of one lane.
    pub fn element_of(self) -> ScalarType {
        match self {
            ValueType::Scalar(scalar) | ValueType::Vector(scalar, _) => scalar,
        }
    }

    pub fn lanes(self) -> u16 {
        match self {
            ValueType::Scalar(_) => 1,
            ValueType::Vector(_, lanes) => lanes,
        }
    }

    pub fn bits(self) -> u16 {
        self.element_of().bits()
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, ValueType::Scalar(_))
    }

    pub fn is_vector(self) -> bool {
        matches!(self, ValueType::Vector(..))
    }

    pub fn is_handle(self) -> bool {
        self == ValueType::handle()
    }

    /// Same element type with a different lane count.
    pub fn with_lanes(self, lanes: u16) -> Self {
        self.element_of().with_lanes(lanes)
    }
}

impl From<ScalarType> for ValueType {
    fn from(scalar: ScalarType) -> Self {
        ValueType::Scalar(scalar)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(scalar) => write!(f, "{scalar}"),
            ValueType::Vector(scalar, lanes) => write!(f, "{scalar}x{lanes}"),
        }
    }
}

/// Error returned when a type name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("invalid type `{text}`: {reason}")]
pub struct ParseTypeError {
    text: String,
    reason: &'static str,
}

impl ParseTypeError {
    fn new(text: &str, reason: &'static str) -> Self {
        Self {
            text: text.to_owned(),
            reason,
        }
    }
}

impl std::error::Error for ParseTypeError {}

impl FromStr for ValueType {
    type Err = ParseTypeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (scalar_text, lanes) = match text.rsplit_once('x') {
            // `handle` has no `x`, but `handlex4` does
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                let lanes: u16 = tail
                    .parse()
                    .map_err(|_| ParseTypeError::new(text, "lane count out of range"))?;
                if lanes < 2 {
                    return Err(ParseTypeError::new(text, "vectors need at least two lanes"));
                }
                (head, lanes)
            }
            _ => (text, 1),
        };

        let scalar = parse_scalar(scalar_text).map_err(|reason| ParseTypeError::new(text, reason))?;
        Ok(scalar.with_lanes(lanes))
    }
}

fn parse_scalar(text: &str) -> Result<ScalarType, &'static str> {
    match text {
        "handle" => return Ok(ScalarType::Handle),
        "bool" => return Ok(ScalarType::UInt(1)),
        _ => {}
    }

    let (prefix, bits_text) = ["uint", "int", "float"]
        .into_iter()
        .find_map(|prefix| text.strip_prefix(prefix).map(|rest| (prefix, rest)))
        .ok_or("unknown type name")?;

    let bits: u16 = bits_text.parse().map_err(|_| "missing or invalid bit width")?;
    if bits == 0 {
        return Err("bit width must be positive");
    }
    Ok(match prefix {
        "uint" => ScalarType::UInt(bits),
        "int" => ScalarType::Int(bits),
        _ => ScalarType::Float(bits),
    })
}

impl From<ValueType> for String {
    fn from(ty: ValueType) -> Self {
        ty.to_string()
    }
}

impl TryFrom<String> for ValueType {
    type Error = ParseTypeError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}
