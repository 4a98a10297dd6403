use thiserror::Error;

use crate::constants::{Word, DEFAULT_MEMORY_LIMIT, WORD_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The offset or length does not fit in an address
    #[error("invalid offset {0}")]
    InvalidOffset(Word),

    /// The access would grow the memory past its limit
    #[error("access to {end} bytes exceeds the limit of {limit} bytes")]
    LimitExceeded { end: usize, limit: usize },
}

/// Byte-addressed memory, growing by whole words on access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
    limit: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MEMORY_LIMIT)
    }
}

impl Memory {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    /// Current size, in bytes. Always a multiple of the word size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Make sure `len` bytes starting at `offset` are addressable, and return
    /// the start offset
    fn expand(&mut self, offset: Word, len: usize) -> Result<usize, MemoryError> {
        let start = offset.to_usize().ok_or(MemoryError::InvalidOffset(offset))?;
        let end = start
            .checked_add(len)
            .ok_or(MemoryError::InvalidOffset(offset))?;

        if end > self.limit {
            return Err(MemoryError::LimitExceeded {
                end,
                limit: self.limit,
            });
        }

        if end > self.bytes.len() {
            let words = end.div_ceil(WORD_SIZE);
            self.bytes.resize(words * WORD_SIZE, 0);
        }

        Ok(start)
    }

    /// Load the word at `offset`
    ///
    /// # Errors
    ///
    /// Fails if the offset is out of range or above the memory limit.
    pub fn load(&mut self, offset: Word) -> Result<Word, MemoryError> {
        let start = self.expand(offset, WORD_SIZE)?;
        let mut bytes = [0; WORD_SIZE];
        bytes.copy_from_slice(&self.bytes[start..start + WORD_SIZE]);
        Ok(Word::from_be_bytes(bytes))
    }

    /// Store a word at `offset`
    ///
    /// # Errors
    ///
    /// Fails if the offset is out of range or above the memory limit.
    pub fn store(&mut self, offset: Word, value: Word) -> Result<(), MemoryError> {
        let start = self.expand(offset, WORD_SIZE)?;
        self.bytes[start..start + WORD_SIZE].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Store the lowest byte of `value` at `offset`
    ///
    /// # Errors
    ///
    /// Fails if the offset is out of range or above the memory limit.
    pub fn store8(&mut self, offset: Word, value: Word) -> Result<(), MemoryError> {
        let start = self.expand(offset, 1)?;
        self.bytes[start] = value.to_be_bytes()[WORD_SIZE - 1];
        Ok(())
    }

    /// Copy `length` bytes starting at `offset`.
    ///
    /// A zero length never touches the memory, whatever the offset.
    ///
    /// # Errors
    ///
    /// Fails if the range is out of range or above the memory limit.
    pub fn read(&mut self, offset: Word, length: Word) -> Result<Vec<u8>, MemoryError> {
        if length.is_zero() {
            return Ok(Vec::new());
        }

        let len = length.to_usize().ok_or(MemoryError::InvalidOffset(length))?;
        let start = self.expand(offset, len)?;
        Ok(self.bytes[start..start + len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_load_test() {
        let mut memory = Memory::default();
        assert!(memory.is_empty());

        memory.store(Word::from(1u64), Word::from(0xabcdu64)).unwrap();
        // Growth is word-aligned
        assert_eq!(memory.len(), 64);
        assert_eq!(memory.load(Word::from(1u64)), Ok(Word::from(0xabcdu64)));
        assert_eq!(&memory.as_bytes()[31..33], &[0xab, 0xcd]);

        memory.store8(Word::from(0u64), Word::from(0x1ffu64)).unwrap();
        assert_eq!(memory.as_bytes()[0], 0xff);
    }

    #[test]
    fn read_test() {
        let mut memory = Memory::default();
        memory.store(Word::ZERO, Word::from(0x0102u64)).unwrap();
        assert_eq!(
            memory.read(Word::from(30u64), Word::from(2u64)),
            Ok(vec![0x01, 0x02])
        );
        assert_eq!(memory.read(Word::MAX, Word::ZERO), Ok(Vec::new()));
    }

    #[test]
    fn limit_test() {
        let mut memory = Memory::with_limit(64);
        assert!(memory.store(Word::from(32u64), Word::ZERO).is_ok());
        assert_eq!(
            memory.store(Word::from(33u64), Word::ZERO),
            Err(MemoryError::LimitExceeded { end: 65, limit: 64 })
        );
        assert_eq!(
            memory.load(Word::MAX),
            Err(MemoryError::InvalidOffset(Word::MAX))
        );
    }
}
