//! Execution budgets.
//!
//! A [`Budget`] is consulted by the machine before each instruction runs.
//! Refusing the charge aborts the execution with
//! [`Exception::BudgetExceeded`](super::Exception::BudgetExceeded), leaving the
//! machine as it was after the previous instruction.

use thiserror::Error;

use super::instructions::Instruction;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExceeded {
    #[error("step limit of {limit} reached")]
    Steps { limit: u64 },

    #[error("cost limit of {limit} reached, {required} more needed")]
    Cost { limit: u64, required: u64 },
}

pub trait Budget {
    /// Account for an instruction about to be executed
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction must not be executed.
    fn charge(&mut self, instruction: &Instruction) -> Result<(), BudgetExceeded>;
}

impl<B: Budget + ?Sized> Budget for &mut B {
    fn charge(&mut self, instruction: &Instruction) -> Result<(), BudgetExceeded> {
        (**self).charge(instruction)
    }
}

impl<B: Budget + ?Sized> Budget for Box<B> {
    fn charge(&mut self, instruction: &Instruction) -> Result<(), BudgetExceeded> {
        (**self).charge(instruction)
    }
}

/// Never refuses anything
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl Budget for Unlimited {
    fn charge(&mut self, _instruction: &Instruction) -> Result<(), BudgetExceeded> {
        Ok(())
    }
}

/// Allows a fixed number of instructions
#[derive(Debug, Clone, Copy)]
pub struct StepLimit {
    limit: u64,
    used: u64,
}

impl StepLimit {
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

impl Budget for StepLimit {
    fn charge(&mut self, _instruction: &Instruction) -> Result<(), BudgetExceeded> {
        if self.used >= self.limit {
            return Err(BudgetExceeded::Steps { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }
}

/// Allows instructions up to a total static cost
#[derive(Debug, Clone, Copy)]
pub struct CostLimit {
    limit: u64,
    used: u64,
}

impl CostLimit {
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

impl Budget for CostLimit {
    fn charge(&mut self, instruction: &Instruction) -> Result<(), BudgetExceeded> {
        let cost = instruction.cost();
        let remaining = self.remaining();
        if cost > remaining {
            return Err(BudgetExceeded::Cost {
                limit: self.limit,
                required: cost - remaining,
            });
        }
        self.used += cost;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_limit_test() {
        let mut budget = StepLimit::new(2);
        assert!(budget.charge(&Instruction::Add).is_ok());
        assert!(budget.charge(&Instruction::Add).is_ok());
        assert_eq!(budget.remaining(), 0);
        assert_eq!(
            budget.charge(&Instruction::JumpDest),
            Err(BudgetExceeded::Steps { limit: 2 })
        );
    }

    #[test]
    fn cost_limit_test() {
        let mut budget = CostLimit::new(12);
        assert!(budget.charge(&Instruction::JumpSub).is_ok());
        assert_eq!(
            budget.charge(&Instruction::ReturnSub),
            Err(BudgetExceeded::Cost {
                limit: 12,
                required: 3
            })
        );
        assert!(budget.charge(&Instruction::Pop).is_ok());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn boxed_budget_test() {
        let mut budget: Box<dyn Budget> = Box::new(StepLimit::new(1));
        assert!(budget.charge(&Instruction::Stop).is_ok());
        assert!(budget.charge(&Instruction::Stop).is_err());
    }
}
