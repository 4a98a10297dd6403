use crate::constants::{Word, STACK_LIMIT};

use super::exception::Exception;

/// The data stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    items: Vec<Word>,
    limit: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::with_limit(STACK_LIMIT)
    }
}

impl Stack {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    /// Push a word
    ///
    /// # Errors
    ///
    /// Fails with [`Exception::StackOverflow`] if the stack is full.
    pub fn push(&mut self, word: Word) -> Result<(), Exception> {
        if self.items.len() >= self.limit {
            return Err(Exception::StackOverflow);
        }

        self.items.push(word);
        Ok(())
    }

    /// Pop the top word
    ///
    /// # Errors
    ///
    /// Fails with [`Exception::StackUnderflow`] if the stack is empty.
    pub fn pop(&mut self) -> Result<Word, Exception> {
        self.items.pop().ok_or(Exception::StackUnderflow)
    }

    /// Look at the nth word from the top, 0 being the top
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<&Word> {
        let index = self.items.len().checked_sub(n + 1)?;
        self.items.get(index)
    }

    /// Push a copy of the nth word from the top, 1 being the top
    pub(crate) fn dup(&mut self, n: usize) -> Result<(), Exception> {
        let word = *self
            .peek(n.saturating_sub(1))
            .ok_or(Exception::StackUnderflow)?;
        self.push(word)
    }

    /// Exchange the top word with the (n+1)th one
    pub(crate) fn swap(&mut self, n: usize) -> Result<(), Exception> {
        let top = self.items.len().checked_sub(1).ok_or(Exception::StackUnderflow)?;
        let other = top.checked_sub(n).ok_or(Exception::StackUnderflow)?;
        self.items.swap(top, other);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Words from the bottom to the top of the stack
    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.items
    }
}
