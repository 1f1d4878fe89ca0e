//! Module that contains the stack validation logic for EOF code sections.

use crate::{
    constants::{MAX_CODE_SECTIONS, MAX_STACK_HEIGHT},
    eof::{CodeInfo, CodeInfoError, Instruction},
    opcode::TerminatorKind,
};
use core::fmt;
use std::{vec, vec::Vec};
use tracing::{debug, trace};

/// Validates all code sections of a container against its type section.
///
/// Checks the type section itself first, then validates every code section independently.
/// Returns the computed max stack height of each section, in section order.
pub fn validate_eof_codes<S: AsRef<[Instruction]>>(
    code_sections: &[S],
    types: &[CodeInfo],
) -> Result<Vec<u16>, EofError> {
    validate_code_info(code_sections.len(), types)?;

    code_sections
        .iter()
        .enumerate()
        .map(|(section, code)| {
            validate_eof_code(code.as_ref(), section, types)
                .map_err(|error| EofError::Code { section, error })
        })
        .collect()
}

/// Same as [`validate_eof_codes`] but validates sections on scoped worker threads.
///
/// Sections share nothing but the read-only type section, so the outcome is identical to the
/// sequential run. On failure the error of the lowest failing section index is returned.
#[cfg(feature = "std")]
pub fn validate_eof_codes_parallel<S: AsRef<[Instruction]> + Sync>(
    code_sections: &[S],
    types: &[CodeInfo],
) -> Result<Vec<u16>, EofError> {
    validate_code_info(code_sections.len(), types)?;

    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(code_sections.len());
    if num_threads <= 1 {
        return validate_eof_codes(code_sections, types);
    }
    let chunk_size = code_sections.len().div_ceil(num_threads);

    std::thread::scope(|scope| {
        let handles: Vec<_> = code_sections
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(i, code)| {
                            let section = chunk_index * chunk_size + i;
                            validate_eof_code(code.as_ref(), section, types)
                                .map_err(|error| EofError::Code { section, error })
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .collect();

        let mut max_heights = Vec::with_capacity(code_sections.len());
        for handle in handles {
            match handle.join() {
                Ok(result) => max_heights.extend(result?),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        Ok(max_heights)
    })
}

/// Validates the type section and how it lines up with the code sections.
fn validate_code_info(num_code_sections: usize, types: &[CodeInfo]) -> Result<(), EofError> {
    if num_code_sections == 0 {
        return Err(EofError::NoCodeSections);
    }
    if num_code_sections > MAX_CODE_SECTIONS {
        return Err(EofError::TooManyCodeSections);
    }
    if num_code_sections != types.len() {
        return Err(EofError::MismatchCodeAndTypesSize);
    }
    for (section, info) in types.iter().enumerate() {
        info.validate()
            .map_err(|error| EofError::CodeInfo { section, error })?;
    }
    // The first code section is the entry point and takes and returns nothing.
    let first = &types[0];
    if first.inputs != 0 || first.outputs != 0 {
        return Err(EofError::InvalidFirstCodeInfo);
    }
    Ok(())
}

/// Validates the stack behaviour of one code section.
///
/// Walks the control flow graph from the first instruction, recording the stack height on entry
/// of every instruction. An instruction is processed once; reaching it again must happen with the
/// recorded height, which is what rejects loops with a non-zero net stack effect.
///
/// Jump targets of an instruction are explored before its fallthrough successor.
///
/// Returns the max stack height of the section, which has to match the one declared in `types`.
pub fn validate_eof_code(
    code: &[Instruction],
    this_types_index: usize,
    types: &[CodeInfo],
) -> Result<u16, CodeValidationError> {
    match walk_code_section(code, this_types_index, types) {
        Ok(max_height) => {
            debug!(section = this_types_index, max_height, "code section is valid");
            Ok(max_height)
        }
        Err(error) => {
            debug!(section = this_types_index, %error, "code section is invalid");
            Err(error)
        }
    }
}

fn walk_code_section(
    code: &[Instruction],
    this_types_index: usize,
    types: &[CodeInfo],
) -> Result<u16, CodeValidationError> {
    let Some(this_types) = types.get(this_types_index) else {
        return Err(CodeValidationError::new(
            EofValidationError::CodeSectionOutOfBounds,
            0,
        ));
    };

    if code.is_empty() {
        return Err(CodeValidationError::new(
            EofValidationError::EmptyCodeSection,
            0,
        ));
    }

    // Malformed immediates are rejected before any height is recorded.
    for (i, instruction) in code.iter().enumerate() {
        if !instruction.has_valid_immediate() {
            return Err(CodeValidationError::new(
                EofValidationError::MissingImmediate,
                i,
            ));
        }
        if instruction.jump_targets().iter().any(|&target| target >= code.len()) {
            return Err(CodeValidationError::new(
                EofValidationError::JumpOutOfBounds,
                i,
            ));
        }
        if let Some(section) = instruction.called_section() {
            if section >= types.len() {
                return Err(CodeValidationError::new(
                    EofValidationError::CodeSectionOutOfBounds,
                    i,
                ));
            }
        }
    }

    // Recorded stack height on entry of each instruction, `None` if not yet visited.
    let mut heights: Vec<Option<usize>> = vec![None; code.len()];
    let mut worklist: Vec<(usize, usize)> = Vec::with_capacity(8);
    worklist.push((0, this_types.inputs as usize));

    while let Some((i, height)) = worklist.pop() {
        if let Some(recorded) = heights[i] {
            if recorded != height {
                return Err(CodeValidationError::new(
                    EofValidationError::ConflictingStackHeight,
                    i,
                ));
            }
            // Already explored from here with this height.
            continue;
        }
        heights[i] = Some(height);

        let instruction = &code[i];
        let info = instruction.opcode.info();
        let kind = info.terminator_kind();
        trace!(position = i, height, opcode = %instruction.opcode, "visit");

        let (inputs, io_diff) = match kind {
            TerminatorKind::Call => {
                let Some(callee) = instruction
                    .called_section()
                    .and_then(|section| types.get(section))
                else {
                    return Err(CodeValidationError::new(
                        EofValidationError::CodeSectionOutOfBounds,
                        i,
                    ));
                };
                (callee.inputs as usize, callee.io_diff())
            }
            _ => (info.inputs() as usize, info.io_diff() as i32),
        };

        if height < inputs {
            return Err(CodeValidationError::new(
                EofValidationError::StackUnderflow,
                i,
            ));
        }

        if kind == TerminatorKind::Return && height != this_types.outputs as usize {
            return Err(CodeValidationError::new(
                EofValidationError::IncorrectReturnArity,
                i,
            ));
        }

        if kind.is_terminating() {
            continue;
        }

        // Never negative, the height covers the inputs.
        let next_height = height.wrapping_add_signed(io_diff as isize);
        if kind.has_fallthrough() {
            if i + 1 >= code.len() {
                return Err(CodeValidationError::new(
                    EofValidationError::InstructionFallsOffEnd,
                    i,
                ));
            }
            worklist.push((i + 1, next_height));
        }
        // Pushed last so the first jump target is popped first.
        for &target in instruction.jump_targets().iter().rev() {
            worklist.push((target, next_height));
        }
    }

    if let Some(position) = heights.iter().position(Option::is_none) {
        return Err(CodeValidationError::new(
            EofValidationError::UnreachableCode,
            position,
        ));
    }

    // First position holding the max height.
    let (position, max_height) = heights
        .iter()
        .enumerate()
        .filter_map(|(i, height)| height.map(|height| (i, height)))
        .fold((0, 0), |max, current| if current.1 > max.1 { current } else { max });

    if max_height > MAX_STACK_HEIGHT as usize {
        return Err(CodeValidationError::new(
            EofValidationError::MaxHeightExceeded,
            position,
        ));
    }

    if max_height != this_types.max_stack_height as usize {
        return Err(CodeValidationError::new(
            EofValidationError::MaxHeightMismatch,
            position,
        ));
    }

    Ok(max_height as u16)
}

/// EOF container error.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum EofError {
    /// No code sections present.
    NoCodeSections,
    /// More than [`MAX_CODE_SECTIONS`] code sections.
    TooManyCodeSections,
    /// Number of code sections and type section entries differ.
    MismatchCodeAndTypesSize,
    /// First code section has to take zero inputs and return zero outputs.
    InvalidFirstCodeInfo,
    /// Type section entry is invalid.
    CodeInfo {
        /// Index of the invalid entry.
        section: usize,
        /// Reason.
        error: CodeInfoError,
    },
    /// Code section failed stack validation.
    Code {
        /// Index of the invalid code section.
        section: usize,
        /// Reason and position.
        error: CodeValidationError,
    },
}

impl EofError {
    /// Returns the stack validation error if this is a code section failure.
    pub fn code_error(&self) -> Option<&CodeValidationError> {
        match self {
            Self::Code { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for EofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCodeSections => f.write_str("No code sections"),
            Self::TooManyCodeSections => f.write_str("Too many code sections"),
            Self::MismatchCodeAndTypesSize => f.write_str("Mismatch of code and types sizes"),
            Self::InvalidFirstCodeInfo => f.write_str("Invalid first types section"),
            Self::CodeInfo { section, error } => write!(f, "Types section {section}: {error}"),
            Self::Code { section, error } => write!(f, "Code section {section}: {error}"),
        }
    }
}

impl core::error::Error for EofError {}

/// Failed stack validation of a code section, with the offending instruction index.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct CodeValidationError {
    /// Kind of the violation.
    pub error: EofValidationError,
    /// Index of the offending instruction in the code section.
    pub position: usize,
}

impl CodeValidationError {
    /// Creates a new error at the given instruction index.
    #[inline]
    pub const fn new(error: EofValidationError, position: usize) -> Self {
        Self { error, position }
    }
}

impl fmt::Display for CodeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at instruction {}", self.error, self.position)
    }
}

impl core::error::Error for CodeValidationError {}

/// EOF stack validation error.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum EofValidationError {
    /// Stack height is below the number of items the instruction consumes.
    ///
    /// For `CALLF` the requirement is the callee's inputs.
    StackUnderflow,
    /// Two control flow paths reach the instruction with different stack heights.
    ConflictingStackHeight,
    /// Stack height before `RETF` is not exactly the function's outputs.
    IncorrectReturnArity,
    /// Instruction is not reachable from the first instruction.
    UnreachableCode,
    /// Computed max stack height is above 1023.
    MaxHeightExceeded,
    /// Computed max stack height differs from the one in the type section.
    MaxHeightMismatch,
    /// Code section has no instructions.
    EmptyCodeSection,
    /// Code section index, of this section or a `CALLF` target, is not in the type section.
    CodeSectionOutOfBounds,
    /// Jump target is not an instruction of the code section.
    JumpOutOfBounds,
    /// Immediate does not match the opcode.
    MissingImmediate,
    /// Last instruction would continue with an instruction past the end of the code section.
    InstructionFallsOffEnd,
}

impl fmt::Display for EofValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StackUnderflow => "Stack requirement is above stack height",
            Self::ConflictingStackHeight => "Instruction reached with different stack heights",
            Self::IncorrectReturnArity => "Stack height at RETF differs from outputs",
            Self::UnreachableCode => "Instruction is unreachable",
            Self::MaxHeightExceeded => "Max stack height is above limit",
            Self::MaxHeightMismatch => "Max stack height mismatches types section",
            Self::EmptyCodeSection => "Code section is empty",
            Self::CodeSectionOutOfBounds => "Code section index is out of bounds",
            Self::JumpOutOfBounds => "Jump destination is out of bounds",
            Self::MissingImmediate => "Immediate does not match opcode",
            Self::InstructionFallsOffEnd => "Last instruction is not terminating",
        };
        f.write_str(s)
    }
}

impl core::error::Error for EofValidationError {}
