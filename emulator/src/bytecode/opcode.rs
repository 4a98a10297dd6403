//! Opcode table.
//!
//! The [`opcodes!`] macro holds the canonical list of assigned bytes and
//! generates the [`Opcode`] enum with its byte mapping and mnemonics. Because
//! the enum is `#[repr(u8)]` with explicit discriminants, assigning the same
//! byte twice is a compile error.

use std::str::FromStr;

use thiserror::Error;

macro_rules! opcodes {
    (
        $( $(#[$doc:meta])* $name:ident = $byte:literal, $mnemonic:literal; )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$doc])* $name = $byte, )*
        }

        impl Opcode {
            /// Every assigned opcode, in byte order
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Decode a byte into an opcode, if it is assigned
            #[must_use]
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $byte => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }
        }
    };
}

opcodes! {
    /// Halt the execution
    Stop = 0x00, "stop";
    Add = 0x01, "add";
    Sub = 0x03, "sub";
    Lt = 0x10, "lt";
    Gt = 0x11, "gt";
    Eq = 0x14, "eq";
    IsZero = 0x15, "iszero";
    Pop = 0x50, "pop";
    MLoad = 0x51, "mload";
    MStore = 0x52, "mstore";
    MStore8 = 0x53, "mstore8";
    /// Unconditional jump to a jump destination
    Jump = 0x56, "jump";
    /// Conditional jump to a jump destination
    JumpI = 0x57, "jumpi";
    Pc = 0x58, "pc";
    MSize = 0x59, "msize";
    /// Marks a valid destination for ordinary jumps
    JumpDest = 0x5b, "jumpdest";
    Push1 = 0x60, "push1";
    Push2 = 0x61, "push2";
    Push3 = 0x62, "push3";
    Push4 = 0x63, "push4";
    Push5 = 0x64, "push5";
    Push6 = 0x65, "push6";
    Push7 = 0x66, "push7";
    Push8 = 0x67, "push8";
    Push9 = 0x68, "push9";
    Push10 = 0x69, "push10";
    Push11 = 0x6a, "push11";
    Push12 = 0x6b, "push12";
    Push13 = 0x6c, "push13";
    Push14 = 0x6d, "push14";
    Push15 = 0x6e, "push15";
    Push16 = 0x6f, "push16";
    Push17 = 0x70, "push17";
    Push18 = 0x71, "push18";
    Push19 = 0x72, "push19";
    Push20 = 0x73, "push20";
    Push21 = 0x74, "push21";
    Push22 = 0x75, "push22";
    Push23 = 0x76, "push23";
    Push24 = 0x77, "push24";
    Push25 = 0x78, "push25";
    Push26 = 0x79, "push26";
    Push27 = 0x7a, "push27";
    Push28 = 0x7b, "push28";
    Push29 = 0x7c, "push29";
    Push30 = 0x7d, "push30";
    Push31 = 0x7e, "push31";
    Push32 = 0x7f, "push32";
    Dup1 = 0x80, "dup1";
    Dup2 = 0x81, "dup2";
    Dup3 = 0x82, "dup3";
    Dup4 = 0x83, "dup4";
    Dup5 = 0x84, "dup5";
    Dup6 = 0x85, "dup6";
    Dup7 = 0x86, "dup7";
    Dup8 = 0x87, "dup8";
    Dup9 = 0x88, "dup9";
    Dup10 = 0x89, "dup10";
    Dup11 = 0x8a, "dup11";
    Dup12 = 0x8b, "dup12";
    Dup13 = 0x8c, "dup13";
    Dup14 = 0x8d, "dup14";
    Dup15 = 0x8e, "dup15";
    Dup16 = 0x8f, "dup16";
    Swap1 = 0x90, "swap1";
    Swap2 = 0x91, "swap2";
    Swap3 = 0x92, "swap3";
    Swap4 = 0x93, "swap4";
    Swap5 = 0x94, "swap5";
    Swap6 = 0x95, "swap6";
    Swap7 = 0x96, "swap7";
    Swap8 = 0x97, "swap8";
    Swap9 = 0x98, "swap9";
    Swap10 = 0x99, "swap10";
    Swap11 = 0x9a, "swap11";
    Swap12 = 0x9b, "swap12";
    Swap13 = 0x9c, "swap13";
    Swap14 = 0x9d, "swap14";
    Swap15 = 0x9e, "swap15";
    Swap16 = 0x9f, "swap16";
    /// Call the subroutine whose entry is on top of the stack
    JumpSub = 0xb3, "jumpsub";
    /// Subroutine entry marker, when markers are distinct from jump destinations
    BeginSub = 0xb5, "beginsub";
    /// Return to the instruction following the last `jumpsub`
    ReturnSub = 0xb7, "returnsub";
    Return = 0xf3, "return";
    Revert = 0xfd, "revert";
    /// Designated invalid instruction
    Invalid = 0xfe, "invalid";
}

impl Opcode {
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Number of immediate bytes following the opcode
    #[must_use]
    pub const fn immediate_size(self) -> usize {
        let byte = self as u8;
        if byte >= Opcode::Push1 as u8 && byte <= Opcode::Push32 as u8 {
            (byte - Opcode::Push1 as u8) as usize + 1
        } else {
            0
        }
    }

    /// The `pushN` opcode for a given width
    #[must_use]
    pub const fn push(width: usize) -> Option<Self> {
        if width == 0 || width > 32 {
            return None;
        }
        // Fits in a byte, width is at most 32
        #[allow(clippy::cast_possible_truncation)]
        let byte = Opcode::Push1 as u8 + (width - 1) as u8;
        Self::from_byte(byte)
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode.byte()
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mnemonic {0:?}")]
pub struct UnknownMnemonic(pub String);

impl FromStr for Opcode {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic() == lower)
            .ok_or_else(|| UnknownMnemonic(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mapping_test() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
            assert_eq!(op.mnemonic().parse(), Ok(op));
        }

        assert_eq!(Opcode::from_byte(0x02), None);
        assert_eq!(Opcode::from_byte(0xb4), None);
    }

    #[test]
    fn all_is_sorted_test() {
        assert!(Opcode::ALL.windows(2).all(|w| w[0].byte() < w[1].byte()));
    }

    #[test]
    fn push_width_test() {
        assert_eq!(Opcode::Push1.immediate_size(), 1);
        assert_eq!(Opcode::Push32.immediate_size(), 32);
        assert_eq!(Opcode::JumpSub.immediate_size(), 0);
        assert_eq!(Opcode::push(2), Some(Opcode::Push2));
        assert_eq!(Opcode::push(0), None);
        assert_eq!(Opcode::push(33), None);
    }

    #[test]
    fn mnemonic_case_test() {
        assert_eq!("JUMPSUB".parse(), Ok(Opcode::JumpSub));
        assert_eq!("ReturnSub".parse(), Ok(Opcode::ReturnSub));
        assert!("frobnicate".parse::<Opcode>().is_err());
    }
}
