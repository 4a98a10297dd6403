use crate::constants::{Address, RETURN_STACK_LIMIT};

use super::exception::Exception;

/// The return-address stack.
///
/// It starts with a single sentinel entry equal to the code size, so that a
/// `returnsub` without a matching call resumes past the end of the code and
/// halts. Only the entries pushed by calls count against
/// [`RETURN_STACK_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStack {
    calls: Vec<Address>,
    sentinel: Option<Address>,
    end: Address,
}

impl ReturnStack {
    #[must_use]
    pub fn new(code_size: Address) -> Self {
        Self {
            calls: Vec::new(),
            sentinel: Some(code_size),
            end: code_size,
        }
    }

    /// Save a call site
    ///
    /// # Errors
    ///
    /// Fails with [`Exception::ReturnStackOverflow`] if there are already
    /// [`RETURN_STACK_LIMIT`] outstanding calls.
    pub fn push(&mut self, call_site: Address) -> Result<(), Exception> {
        if self.calls.len() >= RETURN_STACK_LIMIT {
            return Err(Exception::ReturnStackOverflow);
        }

        self.calls.push(call_site);
        Ok(())
    }

    /// Pop the last call site.
    ///
    /// This never fails: once the calls and the sentinel are exhausted, it
    /// keeps returning the code size.
    pub fn pop(&mut self) -> Address {
        self.calls
            .pop()
            .or_else(|| self.sentinel.take())
            .unwrap_or(self.end)
    }

    /// Number of calls not returned from yet
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.calls.len()
    }

    /// Number of entries, including the sentinel if still present
    #[must_use]
    pub fn depth(&self) -> usize {
        self.calls.len() + usize::from(self.sentinel.is_some())
    }

    /// Entries from the bottom to the top of the stack
    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        self.sentinel.iter().chain(self.calls.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_test() {
        let mut stack = ReturnStack::new(10);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.outstanding(), 0);
        assert_eq!(stack.iter().collect::<Vec<_>>(), [10]);

        stack.push(3).unwrap();
        assert_eq!(stack.iter().collect::<Vec<_>>(), [10, 3]);
        assert_eq!(stack.pop(), 3);
        assert_eq!(stack.pop(), 10);
        assert_eq!(stack.depth(), 0);

        // Popping an exhausted stack keeps yielding the end of the code
        assert_eq!(stack.pop(), 10);
        assert_eq!(stack.pop(), 10);
    }

    #[test]
    fn limit_test() {
        let mut stack = ReturnStack::new(0);
        for i in 0..RETURN_STACK_LIMIT {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.depth(), RETURN_STACK_LIMIT + 1);
        assert_eq!(stack.push(0), Err(Exception::ReturnStackOverflow));

        // The limit applies to outstanding calls only
        stack.pop();
        stack.push(0).unwrap();
        assert_eq!(stack.push(0), Err(Exception::ReturnStackOverflow));
    }
}
