//! Code sections of an EVM Object Format (EOF) container, in decoded form.
//!
//! Byte-level framing and relative jump resolution happen before this point: a code section
//! arrives here as a list of [`Instruction`]s whose jump immediates are already instruction
//! indices, next to the [`CodeInfo`] signatures of the type section.

#[cfg(feature = "parse")]
pub mod asm;
mod code_info;
mod instruction;
#[cfg(feature = "std")]
pub mod printer;
pub mod verification;

pub use code_info::{CodeInfo, CodeInfoError};
pub use instruction::{Immediate, Instruction};
