//! Subcommands and their shared error type.

pub mod eofvalidation;
pub mod validate;

use bytecode::{AsmError, EofError};
use clap::Parser;

/// EOF stack validation tool.
#[derive(Parser, Debug)]
#[command(infer_subcommands = true)]
pub enum MainCmd {
    /// Validate a single code section written in assembler text
    Validate(validate::Cmd),
    /// Run JSON suites of code sections against their expected outcome
    Suite(eofvalidation::Cmd),
}

/// Errors of all commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading a source or suite file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{path}: {source}")]
    /// Suite file is not valid JSON for the suite format.
    Json {
        /// Path of the suite file.
        path: String,
        /// Parser error.
        source: serde_json::Error,
    },
    /// Assembler text could not be turned into instructions.
    #[error(transparent)]
    Asm(#[from] AsmError),
    /// Container or code section failed validation.
    #[error("invalid code: {0}")]
    Validation(#[from] EofError),
    /// `--callee` value is not three comma separated numbers.
    #[error("invalid callee signature `{0}`, expected INPUTS,OUTPUTS,MAX_STACK_HEIGHT")]
    InvalidCallee(String),
    #[error("EOF stack validation failed: {failed_test}/{total_tests}")]
    /// Some suite vectors did not have their expected outcome.
    EofValidation {
        /// Number of failed vectors.
        failed_test: usize,
        /// Number of vectors run.
        total_tests: usize,
    },
    /// Any other failure.
    #[error("{0}")]
    Custom(&'static str),
}

impl MainCmd {
    /// Runs the selected command.
    pub fn run(&self) -> Result<(), Error> {
        match self {
            Self::Validate(cmd) => cmd.run(),
            Self::Suite(cmd) => cmd.run(),
        }
    }
}
