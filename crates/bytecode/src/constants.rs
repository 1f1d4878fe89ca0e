//! Limits shared by the type section and the stack validator.

/// EVM stack limit.
pub const STACK_LIMIT: usize = 1024;

/// Largest maximum stack height a code section may reach.
///
/// One slot below [`STACK_LIMIT`] so the single runtime check left in `CALLF` has room to fail.
pub const MAX_STACK_HEIGHT: u16 = (STACK_LIMIT - 1) as u16;

/// Maximum number of code sections in one container.
pub const MAX_CODE_SECTIONS: usize = 1024;

/// Maximum number of inputs a function may declare.
pub const MAX_FUNCTION_INPUTS: u8 = 0x7F;

/// Maximum number of outputs a function may declare.
pub const MAX_FUNCTION_OUTPUTS: u8 = 0x7F;
