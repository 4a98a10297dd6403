//! Immutable program code, and what can be statically learned from it.

use crate::constants::Address;
use crate::parser::literal::{parse_hex_bytes, HexError};
use crate::runtime::Instruction;

mod analysis;
mod opcode;

pub use self::analysis::{DestinationKind, DestinationPolicy, Destinations, Markers};
pub use self::opcode::{Opcode, UnknownMnemonic};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytecode {
    code: Vec<u8>,
}

impl Bytecode {
    #[must_use]
    pub fn new(code: impl Into<Vec<u8>>) -> Self {
        Self { code: code.into() }
    }

    /// Parse hexadecimal bytecode, with an optional `0x` prefix. Whitespace
    /// between bytes is ignored.
    ///
    /// # Errors
    ///
    /// Fails on non-hexadecimal characters or an odd number of digits.
    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        parse_hex_bytes(input).map(Self::new)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    /// Decode the instruction at `pc`. Anything past the end is a `stop`.
    #[must_use]
    pub fn fetch(&self, pc: Address) -> Instruction {
        Instruction::decode(&self.code, pc)
    }

    /// Walk the instructions in code order
    #[must_use]
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            offset: 0,
        }
    }

    /// Find the valid jump destinations and subroutine entries
    #[must_use]
    pub fn destinations(&self, policy: DestinationPolicy) -> Destinations {
        Destinations::analyze(&self.code, policy)
    }
}

impl From<Vec<u8>> for Bytecode {
    fn from(code: Vec<u8>) -> Self {
        Self::new(code)
    }
}

impl std::fmt::Display for Bytecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for byte in &self.code {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Iterator over the instructions of a bytecode, with their offsets
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: Address,
}

impl Iterator for Instructions<'_> {
    type Item = (Address, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.code.len() {
            return None;
        }

        let offset = self.offset;
        let instruction = Instruction::decode(self.code, offset);
        self.offset += instruction.size();
        Some((offset, instruction))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::constants::Word;

    #[test]
    fn hex_test() {
        let code = Bytecode::from_hex("0x6004b3 00 5bb7").unwrap();
        assert_eq!(code.as_bytes(), &[0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
        assert_eq!(code.to_string(), "0x6004b3005bb7");
        assert!(Bytecode::from_hex("0x600").is_err());
        assert!(Bytecode::from_hex("zz").is_err());
        assert!(Bytecode::from_hex("").unwrap().is_empty());
    }

    #[test]
    fn instructions_test() {
        let code = Bytecode::new(vec![0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
        let instructions: Vec<_> = code.instructions().collect();
        assert_eq!(
            instructions,
            vec![
                (
                    0,
                    Instruction::Push {
                        width: 1,
                        value: Word::from(4u64)
                    }
                ),
                (2, Instruction::JumpSub),
                (3, Instruction::Stop),
                (4, Instruction::JumpDest),
                (5, Instruction::ReturnSub),
            ]
        );
    }

    #[test]
    fn fetch_past_end_test() {
        let code = Bytecode::new(vec![0x5b]);
        assert_eq!(code.fetch(0), Instruction::JumpDest);
        assert_eq!(code.fetch(1), Instruction::Stop);
        assert_eq!(code.fetch(1000), Instruction::Stop);
    }
}
