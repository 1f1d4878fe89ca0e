//! Command line front-end of the EOF stack validator.
//!
//! `eofstack validate` checks a single hand written code section, `eofstack suite` runs JSON
//! suites of containers against their expected outcome.

pub mod cmd;
pub mod dir_utils;
