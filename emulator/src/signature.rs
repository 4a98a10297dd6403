//! Compact signature encoding.
//!
//! A recoverable signature is `(r, s, v)` where `v` only carries the parity
//! of the curve point's `y` coordinate. Since canonical signatures always
//! have the top bit of `s` cleared, the parity bit can be folded into it,
//! giving a 64-byte `(r, vs)` representation:
//!
//! ```text
//! vs = (v << 255) | s
//! s  = vs & ((1 << 255) - 1)
//! v  = vs >> 255
//! ```
//!
//! Recovering the public key is left to whatever consumes these values.

use thiserror::Error;

use crate::constants::{Word, WORD_SIZE};

/// Offset of the canonical `v` encoding
pub const V_OFFSET: u8 = 27;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid recovery id {0}, expected 0, 1, 27 or 28")]
    InvalidRecoveryId(u8),

    #[error("s has its top bit set and can not be compacted")]
    HighS,

    #[error("compact signatures are {expected} bytes long, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// A signature in its expanded form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: Word,
    pub s: Word,
    y_parity: bool,
}

impl Signature {
    /// Build a signature. `v` may either be the raw parity (0 or 1) or its
    /// canonical encoding (27 or 28).
    ///
    /// # Errors
    ///
    /// Fails if `v` is none of those.
    pub fn new(r: Word, s: Word, v: u8) -> Result<Self, SignatureError> {
        let y_parity = match v {
            0 | V_OFFSET => false,
            1 | 28 => true,
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        };
        Ok(Self { r, s, y_parity })
    }

    /// The canonical `v`, 27 or 28
    #[must_use]
    pub fn v(&self) -> u8 {
        V_OFFSET + u8::from(self.y_parity)
    }

    #[must_use]
    pub fn y_parity(&self) -> bool {
        self.y_parity
    }

    /// Fold the parity into `s`
    ///
    /// # Errors
    ///
    /// Fails with [`SignatureError::HighS`] if the top bit of `s` is set,
    /// since it would be overwritten.
    pub fn to_compact(&self) -> Result<CompactSignature, SignatureError> {
        if self.s.bit(255) {
            return Err(SignatureError::HighS);
        }

        let vs = if self.y_parity {
            self.s | Word::HIGH_BIT
        } else {
            self.s
        };

        Ok(CompactSignature { r: self.r, vs })
    }
}

/// A signature with the parity folded in the top bit of `s`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactSignature {
    pub r: Word,
    pub vs: Word,
}

impl CompactSignature {
    pub const LEN: usize = 2 * WORD_SIZE;

    #[must_use]
    pub fn expand(&self) -> Signature {
        Signature {
            r: self.r,
            s: self.vs & Word::LOW_MASK,
            y_parity: self.vs.bit(255),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[..WORD_SIZE].copy_from_slice(&self.r.to_be_bytes());
        bytes[WORD_SIZE..].copy_from_slice(&self.vs.to_be_bytes());
        bytes
    }

    /// # Errors
    ///
    /// Fails if the input is not exactly 64 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != Self::LEN {
            return Err(SignatureError::InvalidLength {
                expected: Self::LEN,
                got: bytes.len(),
            });
        }

        let (r, vs) = bytes.split_at(WORD_SIZE);
        Word::from_be_slice(r)
            .zip(Word::from_be_slice(vs))
            .map(|(r, vs)| Self { r, vs })
            .ok_or(SignatureError::InvalidLength {
                expected: Self::LEN,
                got: bytes.len(),
            })
    }
}

impl From<CompactSignature> for Signature {
    fn from(compact: CompactSignature) -> Self {
        compact.expand()
    }
}

impl TryFrom<Signature> for CompactSignature {
    type Error = SignatureError;

    fn try_from(signature: Signature) -> Result<Self, Self::Error> {
        signature.to_compact()
    }
}

impl std::fmt::Display for CompactSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for byte in self.to_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
