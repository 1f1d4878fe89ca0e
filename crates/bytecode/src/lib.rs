//! Crate that contains the EOF instruction table and the deploy-time stack validator.
//!
//! Code sections are consumed as already decoded instruction lists with resolved jump targets.
//! Every section is validated independently against the type section signatures, and only
//! sections whose stack behaviour is statically proven correct are accepted.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc as std;

pub mod constants;
pub mod eof;
pub mod opcode;

pub use eof::{
    verification::{
        validate_eof_code, validate_eof_codes, CodeValidationError, EofError, EofValidationError,
    },
    CodeInfo, CodeInfoError, Immediate, Instruction,
};
#[cfg(feature = "parse")]
pub use eof::asm::{assemble, AsmError, AsmErrorKind};
#[cfg(feature = "std")]
pub use eof::verification::validate_eof_codes_parallel;
pub use opcode::{OpCode, OpCodeInfo, TerminatorKind};
