//! `eofstack validate`: stack validation of one code section given as assembler text.

use crate::cmd::Error;
use bytecode::{assemble, eof::printer::print, validate_eof_code, CodeInfo, EofError};
use clap::Parser;
use std::{borrow::Cow, fs, path::PathBuf};
use tracing::debug;

/// Validates one code section given as assembler text.
///
/// The section is code section 0 of a container whose type section is built from the
/// signature options. Sections called with `CALLF` are declared with `--callee`.
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Assembler source of the code section
    #[arg(required_unless_present = "file")]
    source: Option<String>,
    /// Path to a file containing the assembler source
    ///
    /// Overrides the positional `source` argument.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Number of stack items the section consumes
    #[arg(long, default_value_t = 0)]
    inputs: u8,
    /// Number of stack items the section returns with `RETF`
    #[arg(long, default_value_t = 0)]
    outputs: u8,
    /// Declared max stack height of the section
    #[arg(long)]
    max_stack_height: u16,
    /// Signature of a callable section as `INPUTS,OUTPUTS,MAX_STACK_HEIGHT`
    ///
    /// Each occurrence declares the next section, starting at index 1.
    #[arg(long = "callee", value_parser = parse_code_info)]
    callees: Vec<CodeInfo>,
    /// Print the instruction listing before validating
    #[arg(long)]
    print: bool,
}

impl Cmd {
    /// Runs `validate` command.
    pub fn run(&self) -> Result<(), Error> {
        let max_height = self.validate()?;
        println!("valid: max_height={max_height}");
        Ok(())
    }

    /// Assembles and validates the section, returning its max stack height.
    pub fn validate(&self) -> Result<u16, Error> {
        let source: Cow<'_, str> = if let Some(path) = &self.file {
            if !path.exists() {
                return Err(Error::Custom("The specified path does not exist"));
            }
            fs::read_to_string(path)?.into()
        } else if let Some(source) = &self.source {
            source.as_str().into()
        } else {
            return Err(Error::Custom("No code section given"));
        };

        let code = assemble(&source)?;
        if self.print {
            print(&code);
        }

        let types = self.types();
        for (section, info) in types.iter().enumerate() {
            info.validate()
                .map_err(|error| EofError::CodeInfo { section, error })?;
        }
        debug!(instructions = code.len(), sections = types.len(), "validating");

        validate_eof_code(&code, 0, &types)
            .map_err(|error| EofError::Code { section: 0, error }.into())
    }

    /// Type section: this section's signature followed by the callees.
    fn types(&self) -> Vec<CodeInfo> {
        std::iter::once(CodeInfo::new(
            self.inputs,
            self.outputs,
            self.max_stack_height,
        ))
        .chain(self.callees.iter().copied())
        .collect()
    }
}

fn parse_code_info(s: &str) -> Result<CodeInfo, Error> {
    let invalid = || Error::InvalidCallee(s.to_string());
    let mut parts = s.split(',').map(str::trim);
    let mut next = || parts.next().ok_or_else(invalid);
    let inputs = next()?.parse().map_err(|_| invalid())?;
    let outputs = next()?.parse().map_err(|_| invalid())?;
    let max_stack_height = next()?.parse().map_err(|_| invalid())?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(CodeInfo::new(inputs, outputs, max_stack_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::{CodeValidationError, EofValidationError};

    fn cmd(args: &[&str]) -> Cmd {
        Cmd::try_parse_from(std::iter::once("validate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn valid_section() {
        let max_height = cmd(&["PUSH0 PUSH0 ADD POP STOP", "--max-stack-height", "2"])
            .validate()
            .unwrap();
        assert_eq!(max_height, 2);
    }

    #[test]
    fn callee_signatures() {
        let cmd = cmd(&[
            "PUSH0 PUSH0 PUSH0 CALLF 1 POP STOP",
            "--max-stack-height",
            "3",
            "--callee",
            "3,1,3",
        ]);
        assert_eq!(cmd.types()[1], CodeInfo::new(3, 1, 3));
        assert_eq!(cmd.validate().unwrap(), 3);
    }

    #[test]
    fn invalid_section_reports_position() {
        let err = cmd(&[
            "PUSH0 RJUMPI 3 PUSH0 RETF",
            "--inputs",
            "1",
            "--outputs",
            "1",
            "--max-stack-height",
            "2",
        ])
        .validate()
        .unwrap_err();
        let Error::Validation(EofError::Code { section, error }) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(section, 0);
        assert_eq!(
            error,
            CodeValidationError::new(EofValidationError::ConflictingStackHeight, 3)
        );
    }

    #[test]
    fn bad_callee_is_rejected_by_parser() {
        assert!(Cmd::try_parse_from([
            "validate",
            "STOP",
            "--max-stack-height",
            "0",
            "--callee",
            "1,2",
        ])
        .is_err());
        assert!(matches!(parse_code_info("1,2,x"), Err(Error::InvalidCallee(_))));
        assert_eq!(parse_code_info(" 1, 2, 3 ").unwrap(), CodeInfo::new(1, 2, 3));
    }

    #[test]
    fn invalid_signature() {
        let err = cmd(&["STOP", "--inputs", "200", "--max-stack-height", "200"])
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(EofError::CodeInfo { section: 0, .. })
        ));
    }

    #[test]
    fn asm_error() {
        let err = cmd(&["JUMP", "--max-stack-height", "0"]).validate().unwrap_err();
        assert!(matches!(err, Error::Asm(_)));
    }
}
