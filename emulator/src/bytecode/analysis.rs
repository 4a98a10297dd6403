//! Static destination analysis.
//!
//! Walks the code once, skipping push immediates, and records which offsets
//! hold a marker usable as an ordinary jump destination or as a subroutine
//! entry. The two kinds are kept apart so that flow analysis can treat calls
//! and jumps as different kinds of branches.

use bitflags::bitflags;
use parse_display::{Display, FromStr};

use crate::constants::Address;

use super::opcode::Opcode;

bitflags! {
    /// Destination kinds valid at a given offset
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Markers: u8 {
        const JUMP_DEST        = 0b01;
        const SUBROUTINE_ENTRY = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr)]
#[display(style = "lowercase")]
pub enum DestinationKind {
    /// Target of `jump` and `jumpi`
    Jump,

    /// Target of `jumpsub`
    Subroutine,
}

impl DestinationKind {
    const fn marker(self) -> Markers {
        match self {
            Self::Jump => Markers::JUMP_DEST,
            Self::Subroutine => Markers::SUBROUTINE_ENTRY,
        }
    }
}

/// Which instruction marks subroutine entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, FromStr)]
#[display(style = "lowercase")]
pub enum DestinationPolicy {
    /// `jumpdest` marks both jump destinations and subroutine entries.
    /// `beginsub` is not an assigned instruction.
    #[default]
    Shared,

    /// `jumpdest` only marks jump destinations, `beginsub` only marks
    /// subroutine entries.
    Distinct,
}

impl DestinationPolicy {
    /// Markers set by the given opcode under this policy
    const fn markers(self, opcode: Opcode) -> Markers {
        match (self, opcode) {
            (Self::Shared, Opcode::JumpDest) => {
                Markers::JUMP_DEST.union(Markers::SUBROUTINE_ENTRY)
            }
            (Self::Distinct, Opcode::JumpDest) => Markers::JUMP_DEST,
            (Self::Distinct, Opcode::BeginSub) => Markers::SUBROUTINE_ENTRY,
            _ => Markers::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    policy: DestinationPolicy,
    markers: Vec<Markers>,
}

impl Destinations {
    #[must_use]
    pub fn analyze(code: &[u8], policy: DestinationPolicy) -> Self {
        let mut markers = vec![Markers::empty(); code.len()];
        let mut offset = 0;

        while offset < code.len() {
            let Some(opcode) = Opcode::from_byte(code[offset]) else {
                offset += 1;
                continue;
            };

            markers[offset] = policy.markers(opcode);
            offset += 1 + opcode.immediate_size();
        }

        Self { policy, markers }
    }

    #[must_use]
    pub fn policy(&self) -> DestinationPolicy {
        self.policy
    }

    /// Markers at an offset; empty past the end of the code
    #[must_use]
    pub fn markers_at(&self, offset: Address) -> Markers {
        self.markers.get(offset).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_valid(&self, offset: Address, kind: DestinationKind) -> bool {
        self.markers_at(offset).contains(kind.marker())
    }

    #[must_use]
    pub fn is_jump_destination(&self, offset: Address) -> bool {
        self.is_valid(offset, DestinationKind::Jump)
    }

    #[must_use]
    pub fn is_subroutine_entry(&self, offset: Address) -> bool {
        self.is_valid(offset, DestinationKind::Subroutine)
    }

    /// Offsets holding at least one marker, with their markers
    pub fn iter(&self) -> impl Iterator<Item = (Address, Markers)> + '_ {
        self.markers
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(offset, m)| (offset, *m))
    }

    /// Offsets valid for the given kind of branch
    pub fn of_kind(&self, kind: DestinationKind) -> impl Iterator<Item = Address> + '_ {
        self.iter()
            .filter(move |(_, m)| m.contains(kind.marker()))
            .map(|(offset, _)| offset)
    }
}
