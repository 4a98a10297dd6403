//! 256-bit machine words.
//!
//! [`Word`] wraps a [`U256`] and only exposes the handful of operations the
//! interpreter, the assembler and the signature codec need.

use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

use ruint::aliases::U256;
use thiserror::Error;

use crate::constants::WORD_SIZE;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Word(U256);

impl Word {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const ONE: Self = Self(U256::from_limbs([1, 0, 0, 0]));
    pub const MAX: Self = Self(U256::MAX);

    /// Only the most significant bit set
    pub const HIGH_BIT: Self = Self(U256::from_limbs([0, 0, 0, 1 << 63]));

    /// Every bit set except the most significant one
    pub const LOW_MASK: Self = Self(U256::from_limbs([
        u64::MAX,
        u64::MAX,
        u64::MAX,
        u64::MAX >> 1,
    ]));

    #[must_use]
    pub fn from_be_bytes(bytes: [u8; WORD_SIZE]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }

    /// Build a word from big-endian bytes, left-padded with zeros.
    ///
    /// Returns `None` if the value does not fit in a word.
    #[must_use]
    pub fn from_be_slice(slice: &[u8]) -> Option<Self> {
        U256::try_from_be_slice(slice).map(Self)
    }

    #[must_use]
    pub fn to_be_bytes(self) -> [u8; WORD_SIZE] {
        self.0.to_be_bytes()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant bytes, i.e. the smallest push width able to hold
    /// this value. Zero needs one byte.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.0.byte_len().max(1)
    }

    /// Convert to a `usize`, if it fits
    #[must_use]
    pub fn to_usize(&self) -> Option<usize> {
        u64::try_from(self.0)
            .ok()
            .and_then(|value| usize::try_from(value).ok())
    }

    #[must_use]
    pub fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }

    #[must_use]
    pub fn wrapping_sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }

    /// Returns the given bit, counting from the least significant one
    #[must_use]
    pub fn bit(&self, index: usize) -> bool {
        self.0.bit(index)
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Self(U256::from(value))
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl BitAnd for Word {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Word {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Not for Word {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl std::fmt::LowerHex for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Word({:#x})", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WordError {
    #[error("invalid number literal {0:?}")]
    InvalidLiteral(String),
}

impl FromStr for Word {
    type Err = WordError;

    /// Parse a decimal or a `0x`-prefixed hexadecimal literal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => (hex, 16),
            None => (s, 10),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(WordError::InvalidLiteral(s.to_string()));
        }

        U256::from_str_radix(digits, u64::from(radix))
            .map(Self)
            .map_err(|_| WordError::InvalidLiteral(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_test() {
        assert_eq!("0".parse(), Ok(Word::ZERO));
        assert_eq!("42".parse(), Ok(Word::from(42u64)));
        assert_eq!("0x2a".parse(), Ok(Word::from(42u64)));
        assert_eq!("0X2A".parse(), Ok(Word::from(42u64)));
        assert_eq!("0x8000000000000000000000000000000000000000000000000000000000000000".parse(), Ok(Word::HIGH_BIT));
        assert!("0x".parse::<Word>().is_err());
        assert!("0xfoo".parse::<Word>().is_err());
        assert!("0b101".parse::<Word>().is_err());
        assert!("1_000".parse::<Word>().is_err());
        assert!("hello".parse::<Word>().is_err());
        // 65 hex digits
        assert!(format!("0x1{}", "0".repeat(64)).parse::<Word>().is_err());
    }

    #[test]
    fn parse_wide_decimal_test() {
        // 2^128
        let word: Word = "340282366920938463463374607431768211456".parse().unwrap();
        assert_eq!(word, "0x100000000000000000000000000000000".parse().unwrap());
        assert_eq!(word.byte_len(), 17);

        // 2^256 - 1
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(max.parse(), Ok(Word::MAX));

        // 2^256
        let overflow = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(overflow.parse::<Word>().is_err());
    }

    #[test]
    fn format_test() {
        assert_eq!(Word::ZERO.to_string(), "0x0");
        assert_eq!(Word::from(0x1234u64).to_string(), "0x1234");
        assert_eq!(format!("{:x}", Word::from(255u64)), "ff");
        assert_eq!(Word::HIGH_BIT.to_string(), format!("0x8{}", "0".repeat(63)));
    }

    #[test]
    fn arithmetic_test() {
        let a = Word::from(200u64);
        let b = Word::from(100u64);
        assert_eq!(a.wrapping_add(b), Word::from(300u64));
        assert_eq!(a.wrapping_sub(b), Word::from(100u64));
        assert_eq!(b.wrapping_sub(a), Word::MAX.wrapping_sub(Word::from(99u64)));
        assert_eq!(Word::MAX.wrapping_add(Word::ONE), Word::ZERO);
        assert!(b < a);
        assert!(Word::HIGH_BIT > Word::LOW_MASK);
    }

    #[test]
    fn bit_test() {
        assert!(Word::HIGH_BIT.bit(255));
        assert!(!Word::HIGH_BIT.bit(254));
        assert!(Word::ONE.bit(0));
        assert!(!Word::LOW_MASK.bit(255));
        assert!(Word::LOW_MASK.bit(254));
        assert_eq!(Word::HIGH_BIT | Word::LOW_MASK, Word::MAX);
        assert_eq!(Word::HIGH_BIT & Word::LOW_MASK, Word::ZERO);
        assert_eq!(!Word::HIGH_BIT, Word::LOW_MASK);
    }

    #[test]
    fn conversion_test() {
        assert_eq!(Word::from(7usize).to_usize(), Some(7));
        assert_eq!(Word::HIGH_BIT.to_usize(), None);

        let mut bytes = [0; WORD_SIZE];
        bytes[WORD_SIZE - 2] = 1;
        assert_eq!(Word::from_be_bytes(bytes), Word::from(256u64));
        assert_eq!(Word::from(256u64).to_be_bytes(), bytes);
        assert_eq!(Word::from_be_slice(&[1, 0]), Some(Word::from(256u64)));
        assert_eq!(Word::from_be_slice(&[]), Some(Word::ZERO));
        assert_eq!(Word::from_be_slice(&[0xff; 32]), Some(Word::MAX));
        assert_eq!(Word::from_be_slice(&[0x01; 33]), None);

        assert_eq!(Word::ZERO.byte_len(), 1);
        assert_eq!(Word::from(0x100u64).byte_len(), 2);
        assert_eq!(Word::MAX.byte_len(), 32);
    }
}
