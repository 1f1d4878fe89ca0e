//! EOF opcode definitions and their stack effects.

#[cfg(feature = "parse")]
mod parse;

#[cfg(feature = "parse")]
pub use parse::OpCodeError;

use core::fmt;

/// An EOF opcode.
///
/// This is always a valid opcode, as declared in the [`opcode`][self] module or the
/// [`OPCODE_INFO`] constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct OpCode(u8);

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.get();
        if let Some(val) = OPCODE_INFO[n as usize] {
            f.write_str(val.name())
        } else {
            write!(f, "UNKNOWN(0x{n:02X})")
        }
    }
}

impl OpCode {
    /// Instantiates a new opcode from a u8.
    ///
    /// Returns `None` for bytes that are not part of the EOF instruction set.
    #[inline]
    pub const fn new(opcode: u8) -> Option<Self> {
        match OPCODE_INFO[opcode as usize] {
            Some(_) => Some(Self(opcode)),
            None => None,
        }
    }

    /// Returns the opcode as a string.
    #[doc(alias = "name")]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        self.info().name()
    }

    /// Returns the number of input stack elements.
    #[inline]
    pub const fn inputs(&self) -> u8 {
        self.info().inputs()
    }

    /// Returns the number of output stack elements.
    #[inline]
    pub const fn outputs(&self) -> u8 {
        self.info().outputs()
    }

    /// Returns how control leaves this instruction.
    #[inline]
    pub const fn terminator_kind(&self) -> TerminatorKind {
        self.info().terminator_kind()
    }

    /// Returns the opcode information.
    #[inline]
    pub const fn info(&self) -> OpCodeInfo {
        if let Some(t) = OPCODE_INFO[self.0 as usize] {
            t
        } else {
            panic!("opcode not found")
        }
    }

    /// Returns the opcode as a u8.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// How control flow continues after an instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TerminatorKind {
    /// Execution continues with the next instruction.
    #[default]
    Fallthrough,
    /// Execution continues at the jump target only. `RJUMP`.
    UnconditionalJump,
    /// Execution continues at one of the jump targets or the next instruction. `RJUMPI`, `RJUMPV`.
    ConditionalJump,
    /// Call into another code section, continuing with the next instruction. `CALLF`.
    Call,
    /// Return to the caller. `RETF`.
    Return,
    /// Execution halts. `STOP`, `RETURN`, `REVERT`, `INVALID`.
    Terminate,
}

impl TerminatorKind {
    /// Returns `true` if the next instruction is a successor.
    #[inline]
    pub const fn has_fallthrough(self) -> bool {
        matches!(self, Self::Fallthrough | Self::ConditionalJump | Self::Call)
    }

    /// Returns `true` if no instruction of this section follows on this path.
    #[inline]
    pub const fn is_terminating(self) -> bool {
        matches!(self, Self::Return | Self::Terminate)
    }
}

/// Information about opcode, such as name, stack inputs and outputs, and successor kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpCodeInfo {
    name: &'static str,
    /// Stack inputs.
    inputs: u8,
    /// Stack outputs.
    outputs: u8,
    /// Number of immediate bytes in the encoded form.
    ///
    /// RJUMPV is a special case where the bytes len depends on the jump table,
    /// its size is set to the one byte of the table length.
    immediate_size: u8,
    /// Successor kind.
    kind: TerminatorKind,
}

impl OpCodeInfo {
    /// Creates a new opcode info with the given name and default values.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            inputs: 0,
            outputs: 0,
            immediate_size: 0,
            kind: TerminatorKind::Fallthrough,
        }
    }

    /// Returns the opcode name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Calculates the difference between the number of input and output stack elements.
    #[inline]
    pub const fn io_diff(&self) -> i16 {
        self.outputs as i16 - self.inputs as i16
    }

    /// Returns the number of input stack elements.
    #[inline]
    pub const fn inputs(&self) -> u8 {
        self.inputs
    }

    /// Returns the number of output stack elements.
    #[inline]
    pub const fn outputs(&self) -> u8 {
        self.outputs
    }

    /// Returns the size of the immediate value in bytes.
    #[inline]
    pub const fn immediate_size(&self) -> u8 {
        self.immediate_size
    }

    /// Returns how control leaves this instruction.
    #[inline]
    pub const fn terminator_kind(&self) -> TerminatorKind {
        self.kind
    }

    /// Returns whether this opcode ends the control-flow path, e.g. `STOP`, `RETF`, etc.
    #[inline]
    pub const fn is_terminating(&self) -> bool {
        self.kind.is_terminating()
    }
}

/// Sets the immediate bytes number.
#[inline]
pub const fn immediate_size(mut op: OpCodeInfo, n: u8) -> OpCodeInfo {
    op.immediate_size = n;
    op
}

/// Marks the opcode as halting execution.
#[inline]
pub const fn terminating(mut op: OpCodeInfo) -> OpCodeInfo {
    op.kind = TerminatorKind::Terminate;
    op
}

/// Marks the opcode as an unconditional relative jump.
#[inline]
pub const fn jump(mut op: OpCodeInfo) -> OpCodeInfo {
    op.kind = TerminatorKind::UnconditionalJump;
    op
}

/// Marks the opcode as a conditional relative jump.
#[inline]
pub const fn conditional_jump(mut op: OpCodeInfo) -> OpCodeInfo {
    op.kind = TerminatorKind::ConditionalJump;
    op
}

/// Marks the opcode as a function call.
///
/// The stack effect of a call comes from the callee's signature, not from the table.
#[inline]
pub const fn call(mut op: OpCodeInfo) -> OpCodeInfo {
    op.kind = TerminatorKind::Call;
    op
}

/// Marks the opcode as a function return.
///
/// The stack requirement of a return comes from the current function's outputs.
#[inline]
pub const fn ret(mut op: OpCodeInfo) -> OpCodeInfo {
    op.kind = TerminatorKind::Return;
    op
}

/// Sets the number of stack inputs and outputs.
#[inline]
pub const fn stack_io(mut op: OpCodeInfo, inputs: u8, outputs: u8) -> OpCodeInfo {
    op.inputs = inputs;
    op.outputs = outputs;
    op
}

/// Callback for creating a [`phf`] map with `stringify_with_cb`.
#[cfg(feature = "parse")]
macro_rules! phf_map_cb {
    ($(#[doc = $s:literal] $id:ident)*) => {
        phf::phf_map! {
            $($s => OpCode::$id),*
        }
    };
}

/// Stringifies identifiers with `paste` so that they are available as literals.
/// This doesn't work with `stringify!` because it cannot be expanded inside of another macro.
#[cfg(feature = "parse")]
macro_rules! stringify_with_cb {
    ($callback:ident; $($id:ident)*) => { paste::paste! {
        $callback! { $(#[doc = "" $id ""] $id)* }
    }};
}

macro_rules! opcodes {
    ($($val:literal => $name:ident => $($modifier:ident $(( $($modifier_arg:expr),* ))?),*);* $(;)?) => {
        // Constants for each opcode. This also takes care of duplicate names.
        $(
            #[doc = concat!("The `", stringify!($val), "` (\"", stringify!($name),"\") opcode.")]
            pub const $name: u8 = $val;
        )*
        impl OpCode {$(
            #[doc = concat!("The `", stringify!($val), "` (\"", stringify!($name),"\") opcode.")]
            pub const $name: Self = Self($val);
        )*}

        /// Maps each opcode to its info.
        pub const OPCODE_INFO: [Option<OpCodeInfo>; 256] = {
            let mut map = [None; 256];
            let mut prev: u8 = 0;
            $(
                let val: u8 = $val;
                assert!(val == 0 || val > prev, "opcodes must be sorted in ascending order");
                prev = val;
                let info = OpCodeInfo::new(stringify!($name));
                $(
                let info = $modifier(info, $($($modifier_arg),*)?);
                )*
                map[$val] = Some(info);
            )*
            let _ = prev;
            map
        };

        /// Maps each name to its opcode.
        #[cfg(feature = "parse")]
        pub(crate) static NAME_TO_OPCODE: phf::Map<&'static str, OpCode> = stringify_with_cb! { phf_map_cb; $($name)* };
    };
}

// When adding new opcodes make sure the list stays sorted by opcode value.
// Opcodes that are rejected in EOF code are not part of the table.
opcodes! {
    0x00 => STOP            => stack_io(0, 0), terminating;

    0x01 => ADD             => stack_io(2, 1);
    0x02 => MUL             => stack_io(2, 1);
    0x03 => SUB             => stack_io(2, 1);
    0x04 => DIV             => stack_io(2, 1);
    0x05 => SDIV            => stack_io(2, 1);
    0x06 => MOD             => stack_io(2, 1);
    0x07 => SMOD            => stack_io(2, 1);
    0x08 => ADDMOD          => stack_io(3, 1);
    0x09 => MULMOD          => stack_io(3, 1);
    0x0A => EXP             => stack_io(2, 1);
    0x0B => SIGNEXTEND      => stack_io(2, 1);

    0x10 => LT              => stack_io(2, 1);
    0x11 => GT              => stack_io(2, 1);
    0x12 => SLT             => stack_io(2, 1);
    0x13 => SGT             => stack_io(2, 1);
    0x14 => EQ              => stack_io(2, 1);
    0x15 => ISZERO          => stack_io(1, 1);
    0x16 => AND             => stack_io(2, 1);
    0x17 => OR              => stack_io(2, 1);
    0x18 => XOR             => stack_io(2, 1);
    0x19 => NOT             => stack_io(1, 1);
    0x1A => BYTE            => stack_io(2, 1);
    0x1B => SHL             => stack_io(2, 1);
    0x1C => SHR             => stack_io(2, 1);
    0x1D => SAR             => stack_io(2, 1);

    0x20 => KECCAK256       => stack_io(2, 1);

    0x30 => ADDRESS         => stack_io(0, 1);
    0x31 => BALANCE         => stack_io(1, 1);
    0x32 => ORIGIN          => stack_io(0, 1);
    0x33 => CALLER          => stack_io(0, 1);
    0x34 => CALLVALUE       => stack_io(0, 1);
    0x35 => CALLDATALOAD    => stack_io(1, 1);
    0x36 => CALLDATASIZE    => stack_io(0, 1);
    0x37 => CALLDATACOPY    => stack_io(3, 0);
    0x3A => GASPRICE        => stack_io(0, 1);
    0x3D => RETURNDATASIZE  => stack_io(0, 1);
    0x3E => RETURNDATACOPY  => stack_io(3, 0);
    0x40 => BLOCKHASH       => stack_io(1, 1);
    0x41 => COINBASE        => stack_io(0, 1);
    0x42 => TIMESTAMP       => stack_io(0, 1);
    0x43 => NUMBER          => stack_io(0, 1);
    0x44 => PREVRANDAO      => stack_io(0, 1);
    0x45 => GASLIMIT        => stack_io(0, 1);
    0x46 => CHAINID         => stack_io(0, 1);
    0x47 => SELFBALANCE     => stack_io(0, 1);
    0x48 => BASEFEE         => stack_io(0, 1);
    0x49 => BLOBHASH        => stack_io(1, 1);
    0x4A => BLOBBASEFEE     => stack_io(0, 1);

    0x50 => POP             => stack_io(1, 0);
    0x51 => MLOAD           => stack_io(1, 1);
    0x52 => MSTORE          => stack_io(2, 0);
    0x53 => MSTORE8         => stack_io(2, 0);
    0x54 => SLOAD           => stack_io(1, 1);
    0x55 => SSTORE          => stack_io(2, 0);
    0x59 => MSIZE           => stack_io(0, 1);
    0x5B => NOP             => stack_io(0, 0);
    0x5C => TLOAD           => stack_io(1, 1);
    0x5D => TSTORE          => stack_io(2, 0);
    0x5E => MCOPY           => stack_io(3, 0);

    0x5F => PUSH0           => stack_io(0, 1);
    0x60 => PUSH1           => stack_io(0, 1), immediate_size(1);
    0x61 => PUSH2           => stack_io(0, 1), immediate_size(2);
    0x62 => PUSH3           => stack_io(0, 1), immediate_size(3);
    0x63 => PUSH4           => stack_io(0, 1), immediate_size(4);
    0x64 => PUSH5           => stack_io(0, 1), immediate_size(5);
    0x65 => PUSH6           => stack_io(0, 1), immediate_size(6);
    0x66 => PUSH7           => stack_io(0, 1), immediate_size(7);
    0x67 => PUSH8           => stack_io(0, 1), immediate_size(8);
    0x68 => PUSH9           => stack_io(0, 1), immediate_size(9);
    0x69 => PUSH10          => stack_io(0, 1), immediate_size(10);
    0x6A => PUSH11          => stack_io(0, 1), immediate_size(11);
    0x6B => PUSH12          => stack_io(0, 1), immediate_size(12);
    0x6C => PUSH13          => stack_io(0, 1), immediate_size(13);
    0x6D => PUSH14          => stack_io(0, 1), immediate_size(14);
    0x6E => PUSH15          => stack_io(0, 1), immediate_size(15);
    0x6F => PUSH16          => stack_io(0, 1), immediate_size(16);
    0x70 => PUSH17          => stack_io(0, 1), immediate_size(17);
    0x71 => PUSH18          => stack_io(0, 1), immediate_size(18);
    0x72 => PUSH19          => stack_io(0, 1), immediate_size(19);
    0x73 => PUSH20          => stack_io(0, 1), immediate_size(20);
    0x74 => PUSH21          => stack_io(0, 1), immediate_size(21);
    0x75 => PUSH22          => stack_io(0, 1), immediate_size(22);
    0x76 => PUSH23          => stack_io(0, 1), immediate_size(23);
    0x77 => PUSH24          => stack_io(0, 1), immediate_size(24);
    0x78 => PUSH25          => stack_io(0, 1), immediate_size(25);
    0x79 => PUSH26          => stack_io(0, 1), immediate_size(26);
    0x7A => PUSH27          => stack_io(0, 1), immediate_size(27);
    0x7B => PUSH28          => stack_io(0, 1), immediate_size(28);
    0x7C => PUSH29          => stack_io(0, 1), immediate_size(29);
    0x7D => PUSH30          => stack_io(0, 1), immediate_size(30);
    0x7E => PUSH31          => stack_io(0, 1), immediate_size(31);
    0x7F => PUSH32          => stack_io(0, 1), immediate_size(32);

    0x80 => DUP1            => stack_io(1, 2);
    0x81 => DUP2            => stack_io(2, 3);
    0x82 => DUP3            => stack_io(3, 4);
    0x83 => DUP4            => stack_io(4, 5);
    0x84 => DUP5            => stack_io(5, 6);
    0x85 => DUP6            => stack_io(6, 7);
    0x86 => DUP7            => stack_io(7, 8);
    0x87 => DUP8            => stack_io(8, 9);
    0x88 => DUP9            => stack_io(9, 10);
    0x89 => DUP10           => stack_io(10, 11);
    0x8A => DUP11           => stack_io(11, 12);
    0x8B => DUP12           => stack_io(12, 13);
    0x8C => DUP13           => stack_io(13, 14);
    0x8D => DUP14           => stack_io(14, 15);
    0x8E => DUP15           => stack_io(15, 16);
    0x8F => DUP16           => stack_io(16, 17);

    0x90 => SWAP1           => stack_io(2, 2);
    0x91 => SWAP2           => stack_io(3, 3);
    0x92 => SWAP3           => stack_io(4, 4);
    0x93 => SWAP4           => stack_io(5, 5);
    0x94 => SWAP5           => stack_io(6, 6);
    0x95 => SWAP6           => stack_io(7, 7);
    0x96 => SWAP7           => stack_io(8, 8);
    0x97 => SWAP8           => stack_io(9, 9);
    0x98 => SWAP9           => stack_io(10, 10);
    0x99 => SWAP10          => stack_io(11, 11);
    0x9A => SWAP11          => stack_io(12, 12);
    0x9B => SWAP12          => stack_io(13, 13);
    0x9C => SWAP13          => stack_io(14, 14);
    0x9D => SWAP14          => stack_io(15, 15);
    0x9E => SWAP15          => stack_io(16, 16);
    0x9F => SWAP16          => stack_io(17, 17);

    0xA0 => LOG0            => stack_io(2, 0);
    0xA1 => LOG1            => stack_io(3, 0);
    0xA2 => LOG2            => stack_io(4, 0);
    0xA3 => LOG3            => stack_io(5, 0);
    0xA4 => LOG4            => stack_io(6, 0);

    0xD0 => DATALOAD        => stack_io(1, 1);
    0xD1 => DATALOADN       => stack_io(0, 1), immediate_size(2);
    0xD2 => DATASIZE        => stack_io(0, 1);
    0xD3 => DATACOPY        => stack_io(3, 0);

    0xE0 => RJUMP           => stack_io(0, 0), immediate_size(2), jump;
    0xE1 => RJUMPI          => stack_io(1, 0), immediate_size(2), conditional_jump;
    0xE2 => RJUMPV          => stack_io(1, 0), immediate_size(1), conditional_jump;
    0xE3 => CALLF           => stack_io(0, 0), immediate_size(2), call;
    0xE4 => RETF            => stack_io(0, 0), ret;

    0xF3 => RETURN          => stack_io(2, 0), terminating;
    0xF7 => RETURNDATALOAD  => stack_io(1, 1);
    0xF8 => EXTCALL         => stack_io(4, 1);
    0xF9 => EXTDELEGATECALL => stack_io(3, 1);
    0xFB => EXTSTATICCALL   => stack_io(3, 1);
    0xFD => REVERT          => stack_io(2, 0), terminating;
    0xFE => INVALID         => stack_io(0, 0), terminating;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode() {
        let opcode = OpCode::new(0x00).unwrap();
        assert_eq!(opcode.as_str(), "STOP");
        assert_eq!(opcode.get(), 0x00);
        assert_eq!(opcode.terminator_kind(), TerminatorKind::Terminate);
    }

    #[test]
    fn test_rejected_in_eof() {
        const REJECTED_IN_EOF: &[u8] = &[
            0x38, 0x39, 0x3b, 0x3c, 0x3f, 0x56, 0x57, 0x58, 0x5a, 0xf0, 0xf1, 0xf2, 0xf4, 0xf5,
            0xfa, 0xff,
        ];

        for opcode in REJECTED_IN_EOF {
            assert!(
                OpCode::new(*opcode).is_none(),
                "opcode 0x{opcode:02x} should not be in the EOF table",
            );
        }
    }

    #[test]
    fn test_immediate_size() {
        let mut expected = [0u8; 256];
        // PUSH opcodes
        for push in PUSH1..=PUSH32 {
            expected[push as usize] = push - PUSH1 + 1;
        }
        expected[DATALOADN as usize] = 2;
        expected[RJUMP as usize] = 2;
        expected[RJUMPI as usize] = 2;
        expected[RJUMPV as usize] = 1;
        expected[CALLF as usize] = 2;

        for (i, opcode) in OPCODE_INFO.iter().enumerate() {
            if let Some(opcode) = opcode {
                assert_eq!(
                    opcode.immediate_size(),
                    expected[i],
                    "immediate_size check failed for {opcode:#?}",
                );
            }
        }
    }

    #[test]
    fn test_terminator_kinds() {
        let kinds = [
            (RJUMP, TerminatorKind::UnconditionalJump),
            (RJUMPI, TerminatorKind::ConditionalJump),
            (RJUMPV, TerminatorKind::ConditionalJump),
            (CALLF, TerminatorKind::Call),
            (RETF, TerminatorKind::Return),
            (STOP, TerminatorKind::Terminate),
            (RETURN, TerminatorKind::Terminate),
            (REVERT, TerminatorKind::Terminate),
            (INVALID, TerminatorKind::Terminate),
        ];
        let mut expected = [TerminatorKind::Fallthrough; 256];
        for (op, kind) in kinds {
            expected[op as usize] = kind;
        }

        for (i, opcode) in OPCODE_INFO.into_iter().enumerate() {
            if let Some(opcode) = opcode {
                assert_eq!(
                    opcode.terminator_kind(),
                    expected[i],
                    "Opcode {opcode:?} terminator kind check failed."
                );
            }
        }
    }

    #[test]
    fn test_dup_swap_stack_io() {
        for n in 1..=16u8 {
            let dup = OpCode::new(DUP1 + n - 1).unwrap();
            assert_eq!((dup.inputs(), dup.outputs()), (n, n + 1));
            let swap = OpCode::new(SWAP1 + n - 1).unwrap();
            assert_eq!((swap.inputs(), swap.outputs()), (n + 1, n + 1));
            assert_eq!(swap.info().io_diff(), 0);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::ADD.to_string(), "ADD");
        assert_eq!(OpCode(0x0C).to_string(), "UNKNOWN(0x0C)");
    }

    #[test]
    #[cfg(feature = "parse")]
    fn test_parsing() {
        for i in 0..=u8::MAX {
            if let Some(op) = OpCode::new(i) {
                assert_eq!(OpCode::parse(op.as_str()), Some(op));
            }
        }
    }
}
