use crate::constants::{MAX_FUNCTION_INPUTS, MAX_FUNCTION_OUTPUTS, MAX_STACK_HEIGHT};
use core::fmt;

/// Types section entry that contains the stack information of the matching code section.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeInfo {
    /// `inputs` - 1 byte - `0x00-0x7F`
    ///
    /// Number of stack elements the code section consumes
    pub inputs: u8,
    /// `outputs` - 1 byte - `0x00-0x7F`
    ///
    /// Number of stack elements the code section returns
    pub outputs: u8,
    /// `max_stack_height` - 2 bytes - `0x0000-0x03FF`
    ///
    /// Maximum number of elements the stack of this code section holds, inputs included.
    pub max_stack_height: u16,
}

impl CodeInfo {
    /// Returns new `CodeInfo` with the given inputs, outputs, and max_stack_height.
    pub const fn new(inputs: u8, outputs: u8, max_stack_height: u16) -> Self {
        Self {
            inputs,
            outputs,
            max_stack_height,
        }
    }

    /// Calculates the difference between the number of input and output stack elements.
    #[inline]
    pub const fn io_diff(&self) -> i32 {
        self.outputs as i32 - self.inputs as i32
    }

    /// Validates the section signature.
    pub fn validate(&self) -> Result<(), CodeInfoError> {
        if self.inputs > MAX_FUNCTION_INPUTS {
            return Err(CodeInfoError::InvalidInputValue { value: self.inputs });
        }

        if self.outputs > MAX_FUNCTION_OUTPUTS {
            return Err(CodeInfoError::InvalidOutputValue {
                value: self.outputs,
            });
        }

        if self.max_stack_height > MAX_STACK_HEIGHT {
            return Err(CodeInfoError::InvalidMaxStackHeight {
                value: self.max_stack_height,
            });
        }

        // Entry height is the number of inputs, so it always counts towards the maximum.
        if self.inputs as u16 > self.max_stack_height {
            return Err(CodeInfoError::InputsAboveMaxStackHeight {
                inputs: self.inputs,
                max_stack_height: self.max_stack_height,
            });
        }

        Ok(())
    }
}

/// Invalid type section entry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeInfoError {
    /// Inputs are above `0x7F`.
    InvalidInputValue {
        /// Declared inputs.
        value: u8,
    },
    /// Outputs are above `0x7F`.
    InvalidOutputValue {
        /// Declared outputs.
        value: u8,
    },
    /// Max stack height is above `0x03FF`.
    InvalidMaxStackHeight {
        /// Declared max stack height.
        value: u16,
    },
    /// Inputs alone exceed the declared max stack height.
    InputsAboveMaxStackHeight {
        /// Declared inputs.
        inputs: u8,
        /// Declared max stack height.
        max_stack_height: u16,
    },
}

impl fmt::Display for CodeInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInputValue { value } => write!(f, "Invalid inputs value: {value}"),
            Self::InvalidOutputValue { value } => write!(f, "Invalid outputs value: {value}"),
            Self::InvalidMaxStackHeight { value } => {
                write!(f, "Invalid max stack height value: {value}")
            }
            Self::InputsAboveMaxStackHeight {
                inputs,
                max_stack_height,
            } => write!(
                f,
                "Inputs {inputs} are above max stack height {max_stack_height}"
            ),
        }
    }
}

impl core::error::Error for CodeInfoError {}
