//! Target platform information for code generation
//!
//! This module defines target-specific information that affects
//! record layout and pointer representation.

use std::str::FromStr;

use target_lexicon::Triple;

/// Target platform information for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    triple: Triple,
    /// Pointer size in bytes (4 for 32-bit, 8 for 64-bit)
    pointer_size: u8,
    endianness: Endianness,
}

/// Byte order of the target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl TargetInfo {
    /// Create target info from a triple
    pub fn from_triple(triple: Triple) -> Self {
        let pointer_size = match triple.pointer_width() {
            Ok(target_lexicon::PointerWidth::U16) => 2,
            Ok(target_lexicon::PointerWidth::U32) => 4,
            Ok(target_lexicon::PointerWidth::U64) => 8,
            _ => 8, // Default to 64-bit
        };

        let endianness = match triple.endianness() {
            Ok(target_lexicon::Endianness::Little) => Endianness::Little,
            Ok(target_lexicon::Endianness::Big) => Endianness::Big,
            _ => Endianness::Little,
        };

        Self {
            triple,
            pointer_size,
            endianness,
        }
    }

    /// Get the default target for the current host
    pub fn host() -> Self {
        Self::from_triple(Triple::host())
    }

    /// Parse a target triple such as `x86_64-unknown-linux-gnu`.
    pub fn parse(triple: &str) -> Result<Self, target_lexicon::ParseError> {
        Triple::from_str(triple).map(Self::from_triple)
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    pub fn pointer_size(&self) -> u8 {
        self.pointer_size
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Check if this target uses little endian byte order
    pub fn is_little_endian(&self) -> bool {
        self.endianness() == Endianness::Little
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self::host()
    }
}
