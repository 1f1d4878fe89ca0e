use crate::opcode::{self, OpCode};
use core::fmt;
use std::vec::Vec;

/// Decoded immediate operand of an instruction.
///
/// Jump targets are instruction indices within the same code section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Immediate {
    /// Instruction has no immediate.
    #[default]
    None,
    /// Raw payload of `PUSHn` and `DATALOADN`, exactly as many bytes as the opcode encodes.
    Bytes(Vec<u8>),
    /// Target of `RJUMP` and `RJUMPI`.
    Jump(usize),
    /// Jump table of `RJUMPV`.
    JumpTable(Vec<usize>),
    /// Code section called by `CALLF`.
    Section(u16),
}

/// One instruction of a code section.
///
/// Its position is its index in the code section's instruction list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Opcode of the instruction.
    pub opcode: OpCode,
    /// Immediate operand.
    pub immediate: Immediate,
}

impl From<OpCode> for Instruction {
    fn from(opcode: OpCode) -> Self {
        Self::new(opcode)
    }
}

impl Instruction {
    /// Creates an instruction without immediate.
    #[inline]
    pub const fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            immediate: Immediate::None,
        }
    }

    /// Creates an instruction with the given immediate.
    #[inline]
    pub const fn with_immediate(opcode: OpCode, immediate: Immediate) -> Self {
        Self { opcode, immediate }
    }

    /// Creates the `PUSHn` instruction that pushes `data`, `PUSH0` for empty data.
    ///
    /// Returns `None` if `data` is longer than 32 bytes.
    pub fn push(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return Some(Self::new(OpCode::PUSH0));
        }
        if data.len() > 32 {
            return None;
        }
        let opcode = OpCode::new(opcode::PUSH1 + data.len() as u8 - 1)?;
        Some(Self::with_immediate(opcode, Immediate::Bytes(data.to_vec())))
    }

    /// Creates `RJUMP` to the instruction at `target`.
    #[inline]
    pub const fn rjump(target: usize) -> Self {
        Self::with_immediate(OpCode::RJUMP, Immediate::Jump(target))
    }

    /// Creates `RJUMPI` to the instruction at `target`.
    #[inline]
    pub const fn rjumpi(target: usize) -> Self {
        Self::with_immediate(OpCode::RJUMPI, Immediate::Jump(target))
    }

    /// Creates `RJUMPV` with the given jump table.
    #[inline]
    pub fn rjumpv(targets: impl Into<Vec<usize>>) -> Self {
        Self::with_immediate(OpCode::RJUMPV, Immediate::JumpTable(targets.into()))
    }

    /// Creates `CALLF` to the code section at `section`.
    #[inline]
    pub const fn callf(section: u16) -> Self {
        Self::with_immediate(OpCode::CALLF, Immediate::Section(section))
    }

    /// Returns the resolved jump targets, empty for non-jump instructions.
    #[inline]
    pub fn jump_targets(&self) -> &[usize] {
        match &self.immediate {
            Immediate::Jump(target) => core::slice::from_ref(target),
            Immediate::JumpTable(targets) => targets,
            _ => &[],
        }
    }

    /// Returns the called code section for `CALLF`.
    #[inline]
    pub fn called_section(&self) -> Option<usize> {
        match self.immediate {
            Immediate::Section(section) => Some(section as usize),
            _ => None,
        }
    }

    /// Returns `true` if the immediate has the shape the opcode requires.
    pub fn has_valid_immediate(&self) -> bool {
        match (self.opcode.get(), &self.immediate) {
            (opcode::RJUMP | opcode::RJUMPI, Immediate::Jump(_)) => true,
            // Max index is one byte, so the table holds 1 to 256 entries.
            (opcode::RJUMPV, Immediate::JumpTable(targets)) => {
                !targets.is_empty() && targets.len() <= 256
            }
            (opcode::CALLF, Immediate::Section(_)) => true,
            (opcode::RJUMP | opcode::RJUMPI | opcode::RJUMPV | opcode::CALLF, _) => false,
            (_, Immediate::Bytes(bytes)) => {
                bytes.len() == self.opcode.info().immediate_size() as usize
            }
            (_, Immediate::None) => self.opcode.info().immediate_size() == 0,
            _ => false,
        }
    }

    /// Returns the encoded size of the instruction in bytes.
    pub fn size(&self) -> usize {
        let immediate = match &self.immediate {
            Immediate::JumpTable(targets) => 1 + targets.len() * 2,
            _ => self.opcode.info().immediate_size() as usize,
        };
        1 + immediate
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.opcode, f)?;
        match &self.immediate {
            Immediate::None => Ok(()),
            Immediate::Bytes(bytes) => {
                f.write_str(" 0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Immediate::Jump(target) => write!(f, " {target}"),
            Immediate::JumpTable(targets) => {
                for target in targets {
                    write!(f, " {target}")?;
                }
                Ok(())
            }
            Immediate::Section(section) => write!(f, " {section}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_picks_opcode_by_length() {
        assert_eq!(Instruction::push(&[]), Some(Instruction::new(OpCode::PUSH0)));
        let push2 = Instruction::push(&[0x12, 0x34]).unwrap();
        assert_eq!(push2.opcode, OpCode::PUSH2);
        assert!(push2.has_valid_immediate());
        assert_eq!(push2.size(), 3);
        assert_eq!(Instruction::push(&[0u8; 33]), None);
    }

    #[test]
    fn immediate_shape() {
        assert!(Instruction::rjump(0).has_valid_immediate());
        assert!(Instruction::rjumpv(vec![1, 2]).has_valid_immediate());
        assert!(!Instruction::rjumpv(vec![]).has_valid_immediate());
        assert!(!Instruction::rjumpv(vec![0; 257]).has_valid_immediate());
        assert!(Instruction::callf(3).has_valid_immediate());
        assert!(!Instruction::new(OpCode::CALLF).has_valid_immediate());
        assert!(!Instruction::new(OpCode::PUSH1).has_valid_immediate());
        assert!(
            !Instruction::with_immediate(OpCode::ADD, Immediate::Jump(0)).has_valid_immediate()
        );
        assert!(
            !Instruction::with_immediate(OpCode::PUSH1, Immediate::Bytes(vec![1, 2]))
                .has_valid_immediate()
        );
    }

    #[test]
    fn jump_targets() {
        assert_eq!(Instruction::rjumpi(4).jump_targets(), &[4]);
        assert_eq!(Instruction::rjumpv(vec![1, 5]).jump_targets(), &[1, 5]);
        assert!(Instruction::callf(1).jump_targets().is_empty());
        assert_eq!(Instruction::callf(1).called_section(), Some(1));
    }

    #[test]
    fn encoded_size() {
        assert_eq!(Instruction::new(OpCode::ADD).size(), 1);
        assert_eq!(Instruction::rjump(0).size(), 3);
        assert_eq!(Instruction::rjumpv(vec![0, 1, 2]).size(), 8);
        assert_eq!(Instruction::callf(0).size(), 3);
    }

    #[test]
    fn display() {
        assert_eq!(Instruction::push(&[0xab, 0x01]).unwrap().to_string(), "PUSH2 0xab01");
        assert_eq!(Instruction::rjumpv(vec![3, 7]).to_string(), "RJUMPV 3 7");
        assert_eq!(Instruction::callf(2).to_string(), "CALLF 2");
        assert_eq!(Instruction::new(OpCode::RETF).to_string(), "RETF");
    }
}
