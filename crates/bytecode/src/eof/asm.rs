//! Text assembler for code sections.
//!
//! One instruction per mnemonic, immediates follow on the same line:
//!
//! ```text
//! ; counts down from 3
//!         PUSH1 0x03
//! loop:   DUP1
//!         RJUMPI @body
//!         STOP
//! body:   PUSH1 0x01
//!         SWAP1
//!         SUB
//!         RJUMP @loop
//! ```
//!
//! Jump targets are instruction indices, given either as `@label` or as a decimal index.

use crate::{
    eof::{Immediate, Instruction},
    opcode::{self, OpCode},
};
use core::fmt;
use std::{
    collections::BTreeMap,
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};

/// Assembles `source` into the instruction list of one code section.
pub fn assemble(source: &str) -> Result<Vec<Instruction>, AsmError> {
    let mut labels: BTreeMap<&str, usize> = BTreeMap::new();
    let mut parsed: Vec<(usize, OpCode, Operand<'_>)> = Vec::new();

    for (line_index, line) in source.lines().enumerate() {
        let line_number = line_index + 1;
        let code = line.split([';', '#']).next().unwrap_or_default();
        let mut tokens = code.split_whitespace().peekable();

        while let Some(token) = tokens.next() {
            if let Some(name) = token.strip_suffix(':') {
                if name.is_empty() || name.starts_with('@') {
                    return Err(AsmError::new(
                        line_number,
                        AsmErrorKind::InvalidLabel(token.into()),
                    ));
                }
                if labels.insert(name, parsed.len()).is_some() {
                    return Err(AsmError::new(
                        line_number,
                        AsmErrorKind::DuplicateLabel(name.into()),
                    ));
                }
                continue;
            }

            let Some(opcode) = OpCode::parse(&token.to_ascii_uppercase()) else {
                return Err(AsmError::new(
                    line_number,
                    AsmErrorKind::UnknownMnemonic(token.into()),
                ));
            };
            let missing = || AsmError::new(line_number, AsmErrorKind::MissingImmediate(opcode));
            let invalid = |token: &str| {
                AsmError::new(line_number, AsmErrorKind::InvalidImmediate(token.into()))
            };

            let operand = match opcode.get() {
                opcode::RJUMP | opcode::RJUMPI => {
                    let token = tokens.next().ok_or_else(missing)?;
                    Operand::Jump(parse_target(token).ok_or_else(|| invalid(token))?)
                }
                opcode::RJUMPV => {
                    let mut targets = Vec::new();
                    while let Some(target) = tokens.peek().copied().and_then(parse_target) {
                        targets.push(target);
                        tokens.next();
                    }
                    if targets.is_empty() {
                        return Err(missing());
                    }
                    Operand::JumpTable(targets)
                }
                opcode::CALLF => {
                    let token = tokens.next().ok_or_else(missing)?;
                    Operand::Section(token.parse().map_err(|_| invalid(token))?)
                }
                _ if opcode.info().immediate_size() > 0 => {
                    let token = tokens.next().ok_or_else(missing)?;
                    let size = opcode.info().immediate_size() as usize;
                    Operand::Bytes(parse_bytes(token, size).ok_or_else(|| invalid(token))?)
                }
                _ => Operand::None,
            };
            parsed.push((line_number, opcode, operand));
        }
    }

    let resolve = |target: Target<'_>, line: usize| match target {
        Target::Index(index) => Ok(index),
        Target::Label(name) => labels
            .get(name)
            .copied()
            .ok_or_else(|| AsmError::new(line, AsmErrorKind::UndefinedLabel(name.into()))),
    };

    parsed
        .into_iter()
        .map(|(line, opcode, operand)| {
            let immediate = match operand {
                Operand::None => Immediate::None,
                Operand::Bytes(bytes) => Immediate::Bytes(bytes),
                Operand::Section(section) => Immediate::Section(section),
                Operand::Jump(target) => Immediate::Jump(resolve(target, line)?),
                Operand::JumpTable(targets) => Immediate::JumpTable(
                    targets
                        .into_iter()
                        .map(|target| resolve(target, line))
                        .collect::<Result<_, _>>()?,
                ),
            };
            Ok(Instruction::with_immediate(opcode, immediate))
        })
        .collect()
}

/// Jump target before label resolution.
#[derive(Clone, Copy, Debug)]
enum Target<'a> {
    Index(usize),
    Label(&'a str),
}

#[derive(Debug)]
enum Operand<'a> {
    None,
    Bytes(Vec<u8>),
    Jump(Target<'a>),
    JumpTable(Vec<Target<'a>>),
    Section(u16),
}

fn parse_target(token: &str) -> Option<Target<'_>> {
    if let Some(label) = token.strip_prefix('@') {
        return (!label.is_empty()).then_some(Target::Label(label));
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok().map(Target::Index)
}

/// Parses a `0x` prefixed hex payload of at most `size` bytes, left-padded to `size`.
fn parse_bytes(token: &str, size: usize) -> Option<Vec<u8>> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}")).ok()?
    } else {
        hex::decode(digits).ok()?
    };
    if decoded.len() > size {
        return None;
    }
    let mut bytes = vec![0u8; size - decoded.len()];
    bytes.extend_from_slice(&decoded);
    Some(bytes)
}

/// Assembler error with the 1-based source line it occurred on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AsmError {
    /// Source line, starting at 1.
    pub line: usize,
    /// What went wrong.
    pub kind: AsmErrorKind,
}

impl AsmError {
    fn new(line: usize, kind: AsmErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Kind of [`AsmError`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AsmErrorKind {
    /// Token is not an EOF mnemonic.
    UnknownMnemonic(String),
    /// Opcode requires an immediate that is not there.
    MissingImmediate(OpCode),
    /// Immediate could not be parsed or does not fit.
    InvalidImmediate(String),
    /// Label is defined twice.
    DuplicateLabel(String),
    /// Label is referenced but never defined.
    UndefinedLabel(String),
    /// Label definition has no usable name.
    InvalidLabel(String),
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic(token) => write!(f, "unknown mnemonic `{token}`"),
            Self::MissingImmediate(opcode) => write!(f, "missing immediate for {opcode}"),
            Self::InvalidImmediate(token) => write!(f, "invalid immediate `{token}`"),
            Self::DuplicateLabel(name) => write!(f, "duplicate label `{name}`"),
            Self::UndefinedLabel(name) => write!(f, "undefined label `{name}`"),
            Self::InvalidLabel(token) => write!(f, "invalid label `{token}`"),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl core::error::Error for AsmError {}

impl core::str::FromStr for Instruction {
    type Err = AsmError;

    /// Parses a single instruction with a numeric target, as printed by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut code = assemble(s)?;
        match code.len() {
            1 => Ok(code.remove(0)),
            0 => Err(AsmError::new(1, AsmErrorKind::UnknownMnemonic(String::new()))),
            _ => Err(AsmError::new(1, AsmErrorKind::UnknownMnemonic(s.trim().to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eof::{verification::validate_eof_code, CodeInfo};

    #[test]
    fn labels_and_comments() {
        let source = "
            ; counter loop
                    PUSH1 0x03
            loop:   DUP1          # top
                    RJUMPI @body
                    STOP
            body:   PUSH1 0x01
                    SWAP1
                    SUB
                    RJUMP @loop
        ";
        let code = assemble(source).unwrap();
        assert_eq!(code.len(), 8);
        assert_eq!(code[2], Instruction::rjumpi(4));
        assert_eq!(code[7], Instruction::rjump(1));
        assert_eq!(code[0], Instruction::push(&[3]).unwrap());
        assert_eq!(validate_eof_code(&code, 0, &[CodeInfo::new(0, 0, 2)]), Ok(2));
    }

    #[test]
    fn mnemonics_are_case_insensitive() {
        let code = assemble("push0 Push0 add retf").unwrap();
        assert_eq!(
            code,
            vec![
                Instruction::new(OpCode::PUSH0),
                Instruction::new(OpCode::PUSH0),
                Instruction::new(OpCode::ADD),
                Instruction::new(OpCode::RETF),
            ]
        );
    }

    #[test]
    fn push_payload_is_left_padded() {
        let code = assemble("PUSH4 0xabc\nDATALOADN 0x1").unwrap();
        assert_eq!(code[0].immediate, Immediate::Bytes(vec![0, 0, 0x0a, 0xbc]));
        assert_eq!(code[1].immediate, Immediate::Bytes(vec![0, 1]));
    }

    #[test]
    fn jump_tables_and_calls() {
        let code = assemble("PUSH0\nRJUMPV @a 3 @a\na: STOP\nSTOP\nCALLF 2").unwrap();
        assert_eq!(code[1], Instruction::rjumpv(vec![2, 3, 2]));
        assert_eq!(code[4], Instruction::callf(2));
    }

    #[test]
    fn errors_carry_line() {
        assert_eq!(
            assemble("STOP\nJUMP").unwrap_err(),
            AsmError::new(2, AsmErrorKind::UnknownMnemonic("JUMP".into()))
        );
        assert_eq!(
            assemble("\n\nRJUMP").unwrap_err(),
            AsmError::new(3, AsmErrorKind::MissingImmediate(OpCode::RJUMP))
        );
        assert_eq!(
            assemble("RJUMPV\nSTOP").unwrap_err(),
            AsmError::new(1, AsmErrorKind::MissingImmediate(OpCode::RJUMPV))
        );
        assert_eq!(
            assemble("PUSH1 0x0102").unwrap_err(),
            AsmError::new(1, AsmErrorKind::InvalidImmediate("0x0102".into()))
        );
        assert_eq!(
            assemble("PUSH1 12").unwrap_err(),
            AsmError::new(1, AsmErrorKind::InvalidImmediate("12".into()))
        );
        assert_eq!(
            assemble("a: STOP\na: STOP").unwrap_err(),
            AsmError::new(2, AsmErrorKind::DuplicateLabel("a".into()))
        );
        assert_eq!(
            assemble("STOP\nRJUMP @nowhere").unwrap_err(),
            AsmError::new(2, AsmErrorKind::UndefinedLabel("nowhere".into()))
        );
    }

    #[test]
    fn error_display() {
        let err = assemble("STOP\nRJUMP @x").unwrap_err();
        assert_eq!(err.to_string(), "line 2: undefined label `x`");
    }

    #[test]
    fn display_parses_back() {
        for instruction in [
            Instruction::push(&[0xab, 0x01]).unwrap(),
            Instruction::rjumpv(vec![3, 7]),
            Instruction::callf(2),
            Instruction::new(OpCode::RETF),
        ] {
            assert_eq!(instruction.to_string().parse::<Instruction>(), Ok(instruction));
        }
    }
}
