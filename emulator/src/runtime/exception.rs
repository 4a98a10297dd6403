use thiserror::Error;

use crate::bytecode::DestinationKind;
use crate::constants::Word;

use super::budget::BudgetExceeded;
use super::memory::MemoryError;

/// Conditions that abort an execution.
///
/// None of them are recoverable: the machine stops at the faulting
/// instruction and reports it to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow")]
    StackOverflow,

    #[error("return stack overflow")]
    ReturnStackOverflow,

    #[error("invalid {kind} destination {destination}")]
    InvalidDestination {
        destination: Word,
        kind: DestinationKind,
    },

    #[error("invalid instruction {0:#04x}")]
    InvalidInstruction(u8),

    #[error("invalid memory access ({0})")]
    InvalidMemoryAccess(#[from] MemoryError),

    #[error("budget exceeded ({0})")]
    BudgetExceeded(#[from] BudgetExceeded),
}
