use parse_display::Display;
use tracing::debug;

use crate::bytecode::{DestinationKind, DestinationPolicy, Opcode};
use crate::constants::{Address, Word, WORD_SIZE};

use super::{budget::Budget, exception::Exception, Halt, Machine};

/// A decoded instruction, with its immediate operand if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Instruction {
    /// Halt the execution, without output
    Stop,

    /// Wrapping addition of the two top words
    Add,

    /// Wrapping subtraction of the two top words
    Sub,

    Lt,
    Gt,
    Eq,
    IsZero,

    /// Discard the top word
    Pop,

    /// Load a word from memory
    MLoad,

    /// Store a word in memory
    MStore,

    /// Store a single byte in memory
    MStore8,

    /// Unconditional jump to a jump destination
    Jump,

    /// Conditional jump to a jump destination
    JumpI,

    /// Push the address of this instruction
    Pc,

    /// Push the size of the memory, in bytes
    MSize,

    /// Ordinary jump destination marker
    JumpDest,

    /// Push a word encoded in the following `width` bytes
    #[display("push{width} {value}")]
    Push { width: u8, value: Word },

    /// Duplicate the nth word from the top
    #[display("dup{0}")]
    Dup(u8),

    /// Swap the top word with the (n+1)th one
    #[display("swap{0}")]
    Swap(u8),

    /// Call a subroutine: push the current address on the return stack and
    /// jump to the entry popped from the data stack
    JumpSub,

    /// Subroutine entry marker
    BeginSub,

    /// Return to the instruction following the last call
    ReturnSub,

    /// Halt, returning a slice of memory
    Return,

    /// Halt, reverting with a slice of memory
    Revert,

    /// Unassigned or designated-invalid byte
    #[display("invalid {0:#04x}")]
    Invalid(u8),
}

/// Opcode of the nth member (1-based) of the dup/swap families
fn ranged(first: Opcode, n: u8) -> Option<Opcode> {
    if !(1..=16).contains(&n) {
        return None;
    }
    Opcode::from_byte(first.byte() + n - 1)
}

/// What the machine does after an instruction executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Continue with the instruction following this one
    Next,

    /// Continue at the given address
    Jump(Address),

    /// End the execution
    Halt(Halt),
}

impl Instruction {
    /// Decode the instruction at `pc`.
    ///
    /// Any offset past the end of the code reads as [`Instruction::Stop`].
    /// Push immediates running past the end are padded with zeros.
    #[must_use]
    pub fn decode(code: &[u8], pc: Address) -> Self {
        let Some(&byte) = code.get(pc) else {
            return Self::Stop;
        };

        let Some(opcode) = Opcode::from_byte(byte) else {
            return Self::Invalid(byte);
        };

        let size = opcode.immediate_size();
        if size > 0 {
            let mut immediate = [0; WORD_SIZE];
            let start = pc + 1;
            let available = code.len().saturating_sub(start).min(size);
            // Bytes past the end of the code read as zero, on the low end of
            // the big-endian immediate
            immediate[..available].copy_from_slice(&code[start..start + available]);

            let Some(value) = Word::from_be_slice(&immediate[..size]) else {
                return Self::Invalid(byte);
            };

            #[allow(clippy::cast_possible_truncation)]
            return Self::Push {
                width: size as u8,
                value,
            };
        }

        Self::from_opcode(opcode)
    }

    /// Map an opcode without immediate to its instruction
    pub(crate) fn from_opcode(opcode: Opcode) -> Self {
        use Opcode as O;

        let byte = opcode.byte();
        match opcode {
            O::Stop => Self::Stop,
            O::Add => Self::Add,
            O::Sub => Self::Sub,
            O::Lt => Self::Lt,
            O::Gt => Self::Gt,
            O::Eq => Self::Eq,
            O::IsZero => Self::IsZero,
            O::Pop => Self::Pop,
            O::MLoad => Self::MLoad,
            O::MStore => Self::MStore,
            O::MStore8 => Self::MStore8,
            O::Jump => Self::Jump,
            O::JumpI => Self::JumpI,
            O::Pc => Self::Pc,
            O::MSize => Self::MSize,
            O::JumpDest => Self::JumpDest,
            O::Push1 | O::Push2 | O::Push3 | O::Push4 | O::Push5 | O::Push6 | O::Push7
            | O::Push8 | O::Push9 | O::Push10 | O::Push11 | O::Push12 | O::Push13
            | O::Push14 | O::Push15 | O::Push16 | O::Push17 | O::Push18 | O::Push19
            | O::Push20 | O::Push21 | O::Push22 | O::Push23 | O::Push24 | O::Push25
            | O::Push26 | O::Push27 | O::Push28 | O::Push29 | O::Push30 | O::Push31
            | O::Push32 => Self::Push {
                width: byte - O::Push1.byte() + 1,
                value: Word::ZERO,
            },
            O::Dup1 | O::Dup2 | O::Dup3 | O::Dup4 | O::Dup5 | O::Dup6 | O::Dup7 | O::Dup8
            | O::Dup9 | O::Dup10 | O::Dup11 | O::Dup12 | O::Dup13 | O::Dup14 | O::Dup15
            | O::Dup16 => Self::Dup(byte - O::Dup1.byte() + 1),
            O::Swap1 | O::Swap2 | O::Swap3 | O::Swap4 | O::Swap5 | O::Swap6 | O::Swap7
            | O::Swap8 | O::Swap9 | O::Swap10 | O::Swap11 | O::Swap12 | O::Swap13
            | O::Swap14 | O::Swap15 | O::Swap16 => Self::Swap(byte - O::Swap1.byte() + 1),
            O::JumpSub => Self::JumpSub,
            O::BeginSub => Self::BeginSub,
            O::ReturnSub => Self::ReturnSub,
            O::Return => Self::Return,
            O::Revert => Self::Revert,
            O::Invalid => Self::Invalid(byte),
        }
    }

    /// The opcode of this instruction, `None` for unassigned bytes
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        let opcode = match self {
            Self::Stop => Opcode::Stop,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Lt => Opcode::Lt,
            Self::Gt => Opcode::Gt,
            Self::Eq => Opcode::Eq,
            Self::IsZero => Opcode::IsZero,
            Self::Pop => Opcode::Pop,
            Self::MLoad => Opcode::MLoad,
            Self::MStore => Opcode::MStore,
            Self::MStore8 => Opcode::MStore8,
            Self::Jump => Opcode::Jump,
            Self::JumpI => Opcode::JumpI,
            Self::Pc => Opcode::Pc,
            Self::MSize => Opcode::MSize,
            Self::JumpDest => Opcode::JumpDest,
            Self::Push { width, .. } => return Opcode::push(usize::from(*width)),
            Self::Dup(n) => return ranged(Opcode::Dup1, *n),
            Self::Swap(n) => return ranged(Opcode::Swap1, *n),
            Self::JumpSub => Opcode::JumpSub,
            Self::BeginSub => Opcode::BeginSub,
            Self::ReturnSub => Opcode::ReturnSub,
            Self::Return => Opcode::Return,
            Self::Revert => Opcode::Revert,
            Self::Invalid(byte) => return Opcode::from_byte(*byte),
        };
        Some(opcode)
    }

    /// Size of the encoded instruction, in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Push { width, .. } => 1 + usize::from(*width),
            _ => 1,
        }
    }

    /// Append the encoded instruction to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        match (self, self.opcode()) {
            (Self::Push { width, value }, Some(opcode)) => {
                out.push(opcode.byte());
                let bytes = value.to_be_bytes();
                out.extend_from_slice(&bytes[WORD_SIZE - usize::from(*width)..]);
            }
            (Self::Invalid(byte), _) => out.push(*byte),
            (_, Some(opcode)) => out.push(opcode.byte()),
            // Out-of-range dup/swap/push widths have no encoding
            (_, None) => out.push(Opcode::Invalid.byte()),
        }
    }

    /// Whether this instruction ends the execution normally
    #[must_use]
    pub const fn is_halting(&self) -> bool {
        matches!(self, Self::Stop | Self::Return | Self::Revert)
    }

    /// Static cost of the instruction
    #[must_use]
    pub const fn cost(&self) -> u64 {
        match self {
            Self::Stop | Self::Return | Self::Revert | Self::Invalid(_) => 0,
            Self::JumpDest | Self::BeginSub => 1,
            Self::Pop | Self::Pc | Self::MSize => 2,
            Self::Add
            | Self::Sub
            | Self::Lt
            | Self::Gt
            | Self::Eq
            | Self::IsZero
            | Self::Push { .. }
            | Self::Dup(_)
            | Self::Swap(_)
            | Self::MLoad
            | Self::MStore
            | Self::MStore8 => 3,
            Self::ReturnSub => 5,
            Self::Jump => 8,
            Self::JumpI | Self::JumpSub => 10,
        }
    }

    /// Execute the instruction
    #[tracing::instrument(skip(machine), level = "trace")]
    pub(crate) fn execute<B: Budget>(&self, machine: &mut Machine<'_, B>) -> Result<Flow, Exception> {
        match *self {
            Self::Stop => return Ok(Flow::Halt(Halt::Stop)),

            Self::Add => {
                let a = machine.stack.pop()?;
                let b = machine.stack.pop()?;
                machine.stack.push(a.wrapping_add(b))?;
            }

            Self::Sub => {
                let a = machine.stack.pop()?;
                let b = machine.stack.pop()?;
                machine.stack.push(a.wrapping_sub(b))?;
            }

            Self::Lt => {
                let a = machine.stack.pop()?;
                let b = machine.stack.pop()?;
                machine.stack.push((a < b).into())?;
            }

            Self::Gt => {
                let a = machine.stack.pop()?;
                let b = machine.stack.pop()?;
                machine.stack.push((a > b).into())?;
            }

            Self::Eq => {
                let a = machine.stack.pop()?;
                let b = machine.stack.pop()?;
                machine.stack.push((a == b).into())?;
            }

            Self::IsZero => {
                let a = machine.stack.pop()?;
                machine.stack.push(a.is_zero().into())?;
            }

            Self::Pop => {
                machine.stack.pop()?;
            }

            Self::MLoad => {
                let offset = machine.stack.pop()?;
                let value = machine.memory.load(offset)?;
                machine.stack.push(value)?;
            }

            Self::MStore => {
                let offset = machine.stack.pop()?;
                let value = machine.stack.pop()?;
                machine.memory.store(offset, value)?;
            }

            Self::MStore8 => {
                let offset = machine.stack.pop()?;
                let value = machine.stack.pop()?;
                machine.memory.store8(offset, value)?;
            }

            Self::Jump => {
                let destination = machine.stack.pop()?;
                let target = machine.resolve_destination(destination, DestinationKind::Jump)?;
                debug!(target, "Jumping");
                return Ok(Flow::Jump(target));
            }

            Self::JumpI => {
                let destination = machine.stack.pop()?;
                let condition = machine.stack.pop()?;
                if !condition.is_zero() {
                    let target =
                        machine.resolve_destination(destination, DestinationKind::Jump)?;
                    debug!(target, "Jumping");
                    return Ok(Flow::Jump(target));
                }
            }

            Self::Pc => {
                machine.stack.push(machine.pc.into())?;
            }

            Self::MSize => {
                machine.stack.push(machine.memory.len().into())?;
            }

            Self::JumpDest => {}

            Self::Push { value, .. } => {
                machine.stack.push(value)?;
            }

            Self::Dup(n) => {
                machine.stack.dup(usize::from(n))?;
            }

            Self::Swap(n) => {
                machine.stack.swap(usize::from(n))?;
            }

            Self::JumpSub => {
                let destination = machine.stack.pop()?;
                let target =
                    machine.resolve_destination(destination, DestinationKind::Subroutine)?;
                // The call site itself is saved, `returnsub` resumes right after it
                machine.return_stack.push(machine.pc)?;
                debug!(
                    target,
                    call_site = machine.pc,
                    depth = machine.return_stack.outstanding(),
                    "Calling subroutine"
                );
                return Ok(Flow::Jump(target));
            }

            Self::BeginSub => {
                if machine.destinations.policy() == DestinationPolicy::Shared {
                    return Err(Exception::InvalidInstruction(Opcode::BeginSub.byte()));
                }
            }

            Self::ReturnSub => {
                let call_site = machine.return_stack.pop();
                let target = call_site.saturating_add(1);
                debug!(target, call_site, "Returning from subroutine");
                return Ok(Flow::Jump(target));
            }

            Self::Return => {
                let offset = machine.stack.pop()?;
                let length = machine.stack.pop()?;
                let output = machine.memory.read(offset, length)?;
                return Ok(Flow::Halt(Halt::Return(output)));
            }

            Self::Revert => {
                let offset = machine.stack.pop()?;
                let length = machine.stack.pop()?;
                let output = machine.memory.read(offset, length)?;
                return Ok(Flow::Halt(Halt::Revert(output)));
            }

            Self::Invalid(byte) => return Err(Exception::InvalidInstruction(byte)),
        };

        Ok(Flow::Next)
    }
}
