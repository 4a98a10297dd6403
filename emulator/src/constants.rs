pub use crate::word::Word;

/// Offsets into the bytecode, and values of the program counter
pub type Address = usize;

/// Maximum number of words on the data stack
pub const STACK_LIMIT: usize = 1024;

/// Maximum number of outstanding subroutine calls.
///
/// The sentinel entry pushed when the machine starts does not count against
/// this limit.
pub const RETURN_STACK_LIMIT: usize = 1023;

/// Size of a machine word, in bytes
pub const WORD_SIZE: usize = 32;

/// Default upper bound on memory size, in bytes
pub const DEFAULT_MEMORY_LIMIT: usize = 1024 * 1024;
