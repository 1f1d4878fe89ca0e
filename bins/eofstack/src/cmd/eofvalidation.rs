//! `eofstack suite`: runs JSON suites of containers against their expected outcome.

mod test_suite;

pub use test_suite::{error_name, TestResult, TestSuite, TestUnit, TestVector};

use crate::{cmd::Error, dir_utils::find_all_json_tests};
use bytecode::{assemble, validate_eof_codes, validate_eof_codes_parallel, EofError, Instruction};
use clap::Parser;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// `suite` subcommand
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Path to folder or file containing the test suites
    ///
    /// Folders will be searched recursively for files with the extension `.json`.
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
    /// Validate the code sections of a container in a single thread
    #[arg(short = 's', long)]
    single_thread: bool,
}

impl Cmd {
    /// Runs `suite` command.
    pub fn run(&self) -> Result<(), Error> {
        for path in &self.paths {
            if !path.exists() {
                return Err(Error::Custom("The specified path does not exist"));
            }
            run_test(path, self.single_thread)?
        }
        Ok(())
    }
}

/// A vector whose outcome differs from the expected one.
#[derive(Debug)]
pub struct TestFailure {
    /// Name of the unit holding the vector.
    pub unit: String,
    /// Name of the vector.
    pub vector: String,
    /// Outcome the suite file asks for.
    pub expected: TestResult,
    /// Max heights, the validation error, or the assembler error of a section.
    pub got: Result<Vec<u16>, String>,
}

/// Outcome of running one suite.
#[derive(Debug, Default)]
pub struct SuiteReport {
    /// Number of vectors run.
    pub total: usize,
    /// Vectors that did not have their expected outcome.
    pub failures: Vec<TestFailure>,
}

/// Runs all suites found under `path` and prints failures and a summary.
pub fn run_test(path: &Path, single_thread: bool) -> Result<(), Error> {
    let test_files = find_all_json_tests(path);
    if test_files.is_empty() {
        return Err(Error::Custom("No json test files found"));
    }

    let mut test_sum = 0;
    let mut passed_tests = 0;
    let mut types_of_error: BTreeMap<String, usize> = BTreeMap::new();
    for test_file in test_files {
        let s = std::fs::read_to_string(&test_file)?;
        let suite: TestSuite = serde_json::from_str(&s).map_err(|source| Error::Json {
            path: test_file.display().to_string(),
            source,
        })?;
        let report = run_suite(&suite, single_thread);
        debug!(
            path = %test_file.display(),
            total = report.total,
            failed = report.failures.len(),
            "suite done"
        );

        test_sum += report.total;
        passed_tests += report.total - report.failures.len();
        for failure in report.failures {
            println!(
                "\nTest failed: {} - {}\nexpected: {:?}\ngot: {:?}\n",
                failure.unit, failure.vector, failure.expected, failure.got
            );
            let kind = match &failure.got {
                Ok(_) => "FalsePositive".to_string(),
                Err(error) => error.clone(),
            };
            *types_of_error.entry(kind).or_default() += 1;
        }
    }

    println!("Passed tests: {passed_tests}/{test_sum}");
    if passed_tests != test_sum {
        println!("Types of error: {types_of_error:#?}");
        Err(Error::EofValidation {
            failed_test: test_sum - passed_tests,
            total_tests: test_sum,
        })
    } else {
        Ok(())
    }
}

/// Validates every vector of `suite` and collects the ones not matching their expected outcome.
pub fn run_suite(suite: &TestSuite, single_thread: bool) -> SuiteReport {
    let mut report = SuiteReport::default();
    for (unit_name, unit) in &suite.0 {
        for (vector_name, vector) in &unit.vectors {
            report.total += 1;
            let got = match assemble_vector(vector) {
                Ok(code) => {
                    let result = if single_thread {
                        validate_eof_codes(&code, &vector.types)
                    } else {
                        validate_eof_codes_parallel(&code, &vector.types)
                    };
                    if vector.expected.matches(&result) {
                        continue;
                    }
                    result.map_err(|error| describe(&error))
                }
                Err(error) => {
                    warn!(
                        unit = %unit_name,
                        vector = %vector_name,
                        %error,
                        "vector does not assemble"
                    );
                    Err(error.to_string())
                }
            };
            report.failures.push(TestFailure {
                unit: unit_name.clone(),
                vector: vector_name.clone(),
                expected: vector.expected.clone(),
                got,
            });
        }
    }
    report
}

fn assemble_vector(vector: &TestVector) -> Result<Vec<Vec<Instruction>>, Error> {
    vector
        .code
        .iter()
        .map(|source| assemble(source).map_err(Into::into))
        .collect()
}

fn describe(error: &EofError) -> String {
    format!("{} ({error})", error_name(error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[test]
    fn fixture_suites_pass() {
        run_test(&fixtures(), false).unwrap();
        run_test(&fixtures(), true).unwrap();
    }

    #[test]
    fn every_fixture_vector_is_counted() -> anyhow::Result<()> {
        let s = std::fs::read_to_string(fixtures().join("stack_validation.json"))?;
        let suite: TestSuite = serde_json::from_str(&s)?;
        let vectors: usize = suite.0.values().map(|unit| unit.vectors.len()).sum();
        let report = run_suite(&suite, false);
        assert_eq!(report.total, vectors);
        assert!(report.failures.is_empty(), "{:#?}", report.failures);
        Ok(())
    }

    #[test]
    fn wrong_expectation_is_reported() -> anyhow::Result<()> {
        let suite: TestSuite = serde_json::from_str(
            r#"{
                "unit": {
                    "vectors": {
                        "claims_valid": {
                            "types": [{"inputs": 0, "outputs": 0, "max_stack_height": 0}],
                            "code": ["ADD STOP"],
                            "expected": {"valid": true}
                        },
                        "bad_asm": {
                            "types": [{"inputs": 0, "outputs": 0, "max_stack_height": 0}],
                            "code": ["JUMP"],
                            "expected": {"valid": false}
                        }
                    }
                }
            }"#,
        )?;
        let report = run_suite(&suite, true);
        assert_eq!(report.total, 2);
        assert_eq!(report.failures.len(), 2);
        let claims_valid = report
            .failures
            .iter()
            .find(|f| f.vector == "claims_valid")
            .unwrap();
        assert!(claims_valid.got.as_ref().unwrap_err().starts_with("StackUnderflow"));
        Ok(())
    }

    #[test]
    fn missing_path() {
        let cmd = Cmd::try_parse_from(["suite", "does/not/exist"]).unwrap();
        assert!(matches!(cmd.run(), Err(Error::Custom(_))));
    }
}
