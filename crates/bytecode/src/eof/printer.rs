//! Human readable listing of decoded code sections.
#![cfg(feature = "std")]

use super::Instruction;
use core::fmt::Write;

/// Prints the listing of a code section to stdout.
pub fn print(code: &[Instruction]) {
    print!("{}", listing(code));
}

/// Renders a code section as one line per instruction: index, byte offset, instruction.
///
/// Jump targets and `CALLF` sections are printed as indices, so the instruction column
/// assembles back.
pub fn listing(code: &[Instruction]) -> String {
    let width = code.len().saturating_sub(1).to_string().len();
    let mut out = String::new();
    let mut offset = 0;
    for (i, instruction) in code.iter().enumerate() {
        // Writing into a String never fails.
        let _ = writeln!(out, "{i:>width$} {offset:#06x}  {instruction}");
        offset += instruction.size();
    }
    out
}
