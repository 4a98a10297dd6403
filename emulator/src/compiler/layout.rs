use std::collections::HashMap;

use tracing::trace;

use super::CompilationError;
use crate::bytecode::Opcode;
use crate::constants::Address;
use crate::parser::{Argument, Program, Statement};

/// Width used by a bare `push` whose argument is a label
pub(crate) const LABEL_WIDTH: usize = 2;

/// Labels, keyed by the fragment of their first definition
pub(crate) type Labels<'a> = HashMap<&'a str, Address>;

/// An instruction placed at its final offset, waiting for its argument to be resolved
#[derive(Debug)]
pub(crate) struct Placement<'a> {
    pub offset: Address,
    pub opcode: Opcode,
    pub statement: &'a Statement<'a>,
}

#[derive(Debug, Default)]
pub(crate) struct Layout<'a> {
    pub labels: Labels<'a>,
    pub placements: Vec<Placement<'a>>,
    pub size: usize,
}

impl<'a> Layout<'a> {
    fn insert_label(
        &mut self,
        program: &Program<'a>,
        label: &'a str,
    ) -> Result<(), CompilationError> {
        if let Some((first, _)) = self.labels.get_key_value(label) {
            return Err(CompilationError::DuplicateLabel {
                label: label.to_owned(),
                span: program.span_of(label),
                first: program.span_of(first),
            });
        }

        trace!(label, offset = self.size, "Placing label");
        self.labels.insert(label, self.size);
        Ok(())
    }
}

/// Pick the opcode for a statement. A bare `push` gets the narrowest width able to hold its
/// literal, or [`LABEL_WIDTH`] for labels.
fn select_opcode(
    program: &Program<'_>,
    statement: &Statement<'_>,
) -> Result<Opcode, CompilationError> {
    if statement.mnemonic.eq_ignore_ascii_case("push") {
        let width = match &statement.argument {
            Some(Argument::Literal { value, .. }) => value.byte_len(),
            Some(Argument::Label(_)) => LABEL_WIDTH,
            None => {
                return Err(CompilationError::MissingArgument {
                    mnemonic: statement.mnemonic.to_owned(),
                    span: program.span_of(statement.mnemonic),
                })
            }
        };
        // `byte_len` is always within 1..=32
        return Opcode::push(width).ok_or_else(|| CompilationError::UnknownMnemonic {
            mnemonic: statement.mnemonic.to_owned(),
            span: program.span_of(statement.mnemonic),
        });
    }

    let opcode: Opcode =
        statement
            .mnemonic
            .parse()
            .map_err(|_| CompilationError::UnknownMnemonic {
                mnemonic: statement.mnemonic.to_owned(),
                span: program.span_of(statement.mnemonic),
            })?;

    match (&statement.argument, opcode.immediate_size()) {
        (None, 0) | (Some(_), 1..) => Ok(opcode),
        (None, _) => Err(CompilationError::MissingArgument {
            mnemonic: statement.mnemonic.to_owned(),
            span: program.span_of(statement.mnemonic),
        }),
        (Some(argument), 0) => Err(CompilationError::UnexpectedArgument {
            mnemonic: statement.mnemonic.to_owned(),
            span: program.span_of(argument.text()),
        }),
    }
}

/// Lays out the program
///
/// It places the labels and decides the encoding size of every statement, so that forward label
/// references can be resolved in a second pass.
pub(crate) fn layout_program<'a>(program: &'a Program<'a>) -> Result<Layout<'a>, CompilationError> {
    let mut layout = Layout::default();

    for line in &program.lines {
        for &label in &line.labels {
            layout.insert_label(program, label)?;
        }

        if let Some(ref statement) = line.statement {
            let opcode = select_opcode(program, statement)?;
            layout.placements.push(Placement {
                offset: layout.size,
                opcode,
                statement,
            });
            layout.size += 1 + opcode.immediate_size();
        }
    }

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn place_labels_simple_test() {
        let program = parse("main: push1 4\njumpsub\nstop\nsub: beginsub\nreturnsub").unwrap();
        let layout = layout_program(&program).unwrap();

        let expected = HashMap::from([("main", 0), ("sub", 4)]);
        assert_eq!(layout.labels, expected);
        assert_eq!(layout.size, 6);

        let offsets: Vec<_> = layout.placements.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, [0, 2, 3, 4, 5]);
    }

    #[test]
    fn label_on_empty_line_test() {
        let program = parse("start:\n\n  end: stop").unwrap();
        let layout = layout_program(&program).unwrap();
        assert_eq!(layout.labels, HashMap::from([("start", 0), ("end", 0)]));
    }

    #[test]
    fn bare_push_width_test() {
        let program = parse("push 0\npush 0x0100\npush target\ntarget: jumpdest").unwrap();
        let layout = layout_program(&program).unwrap();
        let opcodes: Vec<_> = layout.placements.iter().map(|p| p.opcode).collect();
        assert_eq!(
            opcodes,
            [Opcode::Push1, Opcode::Push2, Opcode::Push2, Opcode::JumpDest]
        );
        assert_eq!(layout.labels["target"], 2 + 3 + 3);
    }

    #[test]
    fn duplicate_label_test() {
        let program = parse("a: stop\na: stop").unwrap();
        let error = layout_program(&program).unwrap_err();
        assert_eq!(
            error,
            CompilationError::DuplicateLabel {
                label: "a".to_owned(),
                span: (8, 1).into(),
                first: (0, 1).into(),
            }
        );
    }

    #[test]
    fn argument_mismatch_test() {
        let program = parse("jumpsub 4").unwrap();
        assert!(matches!(
            layout_program(&program),
            Err(CompilationError::UnexpectedArgument { .. })
        ));

        let program = parse("push2").unwrap();
        assert!(matches!(
            layout_program(&program),
            Err(CompilationError::MissingArgument { .. })
        ));

        let program = parse("push").unwrap();
        assert!(matches!(
            layout_program(&program),
            Err(CompilationError::MissingArgument { .. })
        ));
    }

    #[test]
    fn unknown_mnemonic_test() {
        let program = parse("  gosub 4").unwrap();
        let error = layout_program(&program).unwrap_err();
        assert_eq!(
            error,
            CompilationError::UnknownMnemonic {
                mnemonic: "gosub".to_owned(),
                span: (2, 5).into(),
            }
        );
    }
}
