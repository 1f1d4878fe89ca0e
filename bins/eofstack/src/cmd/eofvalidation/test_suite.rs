use bytecode::{CodeInfo, EofError};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Suite file.
#[derive(Debug, PartialEq, Eq, Deserialize)]
pub struct TestSuite(
    /// Units by name.
    pub BTreeMap<String, TestUnit>,
);

/// Group of test vectors.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestUnit {
    /// Free-form description, not checked.
    #[serde(default, rename = "_info")]
    pub info: Option<serde_json::Value>,
    /// Test vectors by name.
    #[serde(default)]
    pub vectors: BTreeMap<String, TestVector>,
}

/// One container: its type section and code sections in assembler text.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestVector {
    /// Type section, one entry per code section.
    pub types: Vec<CodeInfo>,
    /// Code sections in assembler text.
    pub code: Vec<String>,
    /// Expected outcome.
    pub expected: TestResult,
}

/// Expected validation outcome.
///
/// For invalid containers `error` names the error kind, `section` and `position` locate it.
/// Fields left out are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestResult {
    /// Whether the container passes validation.
    pub valid: bool,
    /// Name of the error kind, e.g. `StackUnderflow`.
    #[serde(default)]
    pub error: Option<String>,
    /// Index of the failing code section or type section entry.
    #[serde(default)]
    pub section: Option<usize>,
    /// Index of the offending instruction in the failing code section.
    #[serde(default)]
    pub position: Option<usize>,
}

impl TestResult {
    /// Returns `true` if `result` is the expected outcome.
    pub fn matches(&self, result: &Result<Vec<u16>, EofError>) -> bool {
        let error = match result {
            Ok(_) => return self.valid,
            Err(_) if self.valid => return false,
            Err(error) => error,
        };
        if let Some(name) = &self.error {
            if *name != error_name(error) {
                return false;
            }
        }
        if self.section.is_some() && self.section != error_section(error) {
            return false;
        }
        if self.position.is_some() && self.position != error.code_error().map(|e| e.position) {
            return false;
        }
        true
    }
}

/// Name of the most specific error kind, as used in suite files.
pub fn error_name(error: &EofError) -> String {
    let debug = match error {
        EofError::Code { error, .. } => format!("{:?}", error.error),
        EofError::CodeInfo { error, .. } => format!("{error:?}"),
        _ => format!("{error:?}"),
    };
    // Strip fields of struct variants.
    debug
        .split([' ', '{', '('])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn error_section(error: &EofError) -> Option<usize> {
    match error {
        EofError::Code { section, .. } | EofError::CodeInfo { section, .. } => Some(*section),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::{CodeInfoError, CodeValidationError, EofValidationError};

    #[test]
    fn error_names() {
        let code = EofError::Code {
            section: 2,
            error: CodeValidationError::new(EofValidationError::UnreachableCode, 1),
        };
        assert_eq!(error_name(&code), "UnreachableCode");
        let info = EofError::CodeInfo {
            section: 1,
            error: CodeInfoError::InvalidOutputValue { value: 128 },
        };
        assert_eq!(error_name(&info), "InvalidOutputValue");
        assert_eq!(error_name(&EofError::NoCodeSections), "NoCodeSections");
    }

    #[test]
    fn matching() -> anyhow::Result<()> {
        let expected: TestResult = serde_json::from_str(
            r#"{"valid": false, "error": "StackUnderflow", "section": 1, "position": 0}"#,
        )?;
        let error = |section, position| {
            Err(EofError::Code {
                section,
                error: CodeValidationError::new(EofValidationError::StackUnderflow, position),
            })
        };
        assert!(expected.matches(&error(1, 0)));
        assert!(!expected.matches(&error(0, 0)));
        assert!(!expected.matches(&error(1, 2)));
        assert!(!expected.matches(&Ok(vec![0, 0])));

        let valid: TestResult = serde_json::from_str(r#"{"valid": true}"#)?;
        assert!(valid.matches(&Ok(vec![1])));
        assert!(!valid.matches(&error(0, 0)));
        Ok(())
    }
}
