//! The interpreter core.
//!
//! A [`Machine`] is one execution of a [`Bytecode`]: it exclusively owns the
//! program counter, the data stack, the return-address stack and the memory,
//! and only borrows the code. Independent machines can run the same code on
//! different threads.

use thiserror::Error;
use tracing::{debug, info};

use crate::bytecode::{Bytecode, DestinationKind, DestinationPolicy, Destinations};
use crate::constants::{Address, Word, DEFAULT_MEMORY_LIMIT, STACK_LIMIT};

mod budget;
mod exception;
mod instructions;
mod memory;
mod return_stack;
mod stack;

pub use self::budget::{Budget, BudgetExceeded, CostLimit, StepLimit, Unlimited};
pub use self::exception::Exception;
pub use self::instructions::Instruction;
pub use self::memory::{Memory, MemoryError};
pub use self::return_stack::ReturnStack;
pub use self::stack::Stack;

use self::instructions::Flow;

/// An exception, along with the address of the instruction that raised it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{exception} at offset {pc}")]
pub struct Fault {
    pub pc: Address,
    #[source]
    pub exception: Exception,
}

/// How an execution ended normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// `stop`, or running past the end of the code
    Stop,

    /// `return`, with its output
    Return(Vec<u8>),

    /// `revert`, with its output
    Revert(Vec<u8>),
}

impl std::fmt::Display for Halt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Return(output) => write!(f, "return ({} bytes)", output.len()),
            Self::Revert(output) => write!(f, "revert ({} bytes)", output.len()),
        }
    }
}

/// State of the machine after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted(Halt),
}

/// Result of a complete execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub halt: Halt,

    /// Data stack, bottom first
    pub stack: Vec<Word>,

    /// Number of instructions executed, not counting the halting one
    pub steps: u64,

    /// Total static cost of the executed instructions
    pub cost: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Which markers are valid jump and subroutine destinations
    pub policy: DestinationPolicy,

    /// Upper bound on memory size, in bytes
    pub memory_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            policy: DestinationPolicy::default(),
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Running,
    Halted(Halt),
    Faulted(Fault),
}

pub struct Machine<'code, B = Unlimited> {
    code: &'code Bytecode,
    destinations: Destinations,
    pc: Address,
    stack: Stack,
    return_stack: ReturnStack,
    memory: Memory,
    budget: B,
    steps: u64,
    cost: u64,
    state: State,
}

impl<B> std::fmt::Debug for Machine<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Machine {{ pc: {}, stack: {}, return_stack: {}, memory: {} bytes, steps: {} }}",
            self.pc,
            self.stack.len(),
            self.return_stack.depth(),
            self.memory.len(),
            self.steps,
        )
    }
}

impl<'code> Machine<'code, Unlimited> {
    /// Prepare an execution of `code`, with an empty data stack and the
    /// return stack holding only its sentinel
    #[must_use]
    pub fn new(code: &'code Bytecode, config: MachineConfig) -> Self {
        Self {
            code,
            destinations: code.destinations(config.policy),
            pc: 0,
            stack: Stack::with_limit(STACK_LIMIT),
            return_stack: ReturnStack::new(code.len()),
            memory: Memory::with_limit(config.memory_limit),
            budget: Unlimited,
            steps: 0,
            cost: 0,
            state: State::Running,
        }
    }
}

impl<'code, B> Machine<'code, B> {
    /// Replace the budget consulted before each step
    #[must_use]
    pub fn with_budget<B2: Budget>(self, budget: B2) -> Machine<'code, B2> {
        Machine {
            code: self.code,
            destinations: self.destinations,
            pc: self.pc,
            stack: self.stack,
            return_stack: self.return_stack,
            memory: self.memory,
            budget,
            steps: self.steps,
            cost: self.cost,
            state: self.state,
        }
    }

    /// Push initial words on the data stack, bottom first
    ///
    /// # Errors
    ///
    /// Fails with [`Exception::StackOverflow`] if they do not fit.
    pub fn with_stack<I: IntoIterator<Item = Word>>(mut self, words: I) -> Result<Self, Exception> {
        for word in words {
            self.stack.push(word)?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn code(&self) -> &'code Bytecode {
        self.code
    }

    #[must_use]
    pub fn pc(&self) -> Address {
        self.pc
    }

    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    #[must_use]
    pub fn return_stack(&self) -> &ReturnStack {
        &self.return_stack
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[must_use]
    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    #[must_use]
    pub fn budget(&self) -> &B {
        &self.budget
    }

    /// Number of instructions executed so far, not counting a halting one
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Total static cost of the instructions executed so far
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// The instruction the next step will execute
    #[must_use]
    pub fn next_instruction(&self) -> Instruction {
        self.code.fetch(self.pc)
    }

    /// How the execution ended, if it did normally
    #[must_use]
    pub fn halt(&self) -> Option<&Halt> {
        match &self.state {
            State::Halted(halt) => Some(halt),
            _ => None,
        }
    }

    /// The fault that aborted the execution, if any
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match &self.state {
            State::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    /// Check that `destination` is a valid target of the given kind
    pub(crate) fn resolve_destination(
        &self,
        destination: Word,
        kind: DestinationKind,
    ) -> Result<Address, Exception> {
        destination
            .to_usize()
            .filter(|&offset| self.destinations.is_valid(offset, kind))
            .ok_or(Exception::InvalidDestination { destination, kind })
    }

    fn abort(&mut self, pc: Address, exception: Exception) -> Fault {
        debug!(pc, %exception, "Execution aborted");
        let fault = Fault { pc, exception };
        self.state = State::Faulted(fault.clone());
        fault
    }
}

impl<B: Budget> Machine<'_, B> {
    /// Execute one instruction.
    ///
    /// Once the machine halted or faulted, this keeps returning the same
    /// result without doing anything.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] if the instruction raised an exception or the
    /// budget refused it.
    #[tracing::instrument(skip(self), fields(pc = self.pc), level = "debug")]
    pub fn step(&mut self) -> Result<Status, Fault> {
        match &self.state {
            State::Running => {}
            State::Halted(halt) => return Ok(Status::Halted(halt.clone())),
            State::Faulted(fault) => return Err(fault.clone()),
        }

        let pc = self.pc;
        let instruction = self.code.fetch(pc);

        // Halting is always allowed
        if !instruction.is_halting() {
            if let Err(e) = self.budget.charge(&instruction) {
                return Err(self.abort(pc, e.into()));
            }
        }

        debug!("Executing instruction \"{}\"", instruction);
        let flow = match instruction.execute(self) {
            Ok(flow) => flow,
            Err(e) => return Err(self.abort(pc, e)),
        };

        match flow {
            Flow::Next => self.pc = pc.saturating_add(instruction.size()),
            Flow::Jump(target) => self.pc = target,
            Flow::Halt(halt) => {
                info!(pc, steps = self.steps, %halt, "Halted");
                self.state = State::Halted(halt.clone());
                return Ok(Status::Halted(halt));
            }
        }

        self.steps += 1;
        self.cost += instruction.cost();
        Ok(Status::Running)
    }

    /// Run until the machine halts
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] that aborted the execution.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<Outcome, Fault> {
        loop {
            if let Status::Halted(halt) = self.step()? {
                return Ok(Outcome {
                    halt,
                    stack: self.stack.as_slice().to_vec(),
                    steps: self.steps,
                    cost: self.cost,
                });
            }
        }
    }
}
