use tracing::trace;

use super::layout::{Layout, Placement};
use super::CompilationError;
use crate::parser::{Argument, Program};
use crate::runtime::Instruction;
use crate::word::Word;

/// Resolve the argument of a push, checking it fits the chosen width
fn resolve_argument(
    program: &Program<'_>,
    layout: &Layout<'_>,
    placement: &Placement<'_>,
) -> Result<Word, CompilationError> {
    let width = placement.opcode.immediate_size();
    let Some(argument) = &placement.statement.argument else {
        return Err(CompilationError::MissingArgument {
            mnemonic: placement.statement.mnemonic.to_owned(),
            span: program.span_of(placement.statement.mnemonic),
        });
    };

    let value = match argument {
        Argument::Literal { value, .. } => *value,
        Argument::Label(label) => {
            let offset = layout.labels.get(label).ok_or_else(|| {
                CompilationError::UnknownLabel {
                    label: (*label).to_owned(),
                    span: program.span_of(label),
                }
            })?;
            Word::from(*offset)
        }
    };

    if value.byte_len() > width {
        return Err(CompilationError::LiteralTooLarge {
            value,
            width,
            span: program.span_of(argument.text()),
        });
    }

    Ok(value)
}

/// Encode every placed instruction, in order
pub(crate) fn emit(program: &Program<'_>, layout: &Layout<'_>) -> Result<Vec<u8>, CompilationError> {
    let mut code = Vec::with_capacity(layout.size);

    for placement in &layout.placements {
        let instruction = match placement.opcode.immediate_size() {
            0 => Instruction::from_opcode(placement.opcode),
            width => {
                // At most 32
                #[allow(clippy::cast_possible_truncation)]
                let width = width as u8;
                Instruction::Push {
                    width,
                    value: resolve_argument(program, layout, placement)?,
                }
            }
        };

        trace!(offset = placement.offset, %instruction, "Emitting");
        instruction.encode(&mut code);
    }

    Ok(code)
}
