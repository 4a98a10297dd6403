//! Two-pass assembler, from parsed source to bytecode

use std::collections::BTreeMap;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use tracing::debug;

use crate::bytecode::{Bytecode, DestinationKind, Destinations};
use crate::constants::Address;
use crate::parser::{parse, Program, SyntaxError};
use crate::word::Word;

mod emit;
mod layout;

type Labels = BTreeMap<String, Address>;

/// Holds informations about the compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// Map of labels to offsets
    pub labels: Labels,
}

impl DebugInfo {
    /// Labels defined at an offset, in alphabetical order
    pub fn labels_at(&self, offset: Address) -> impl Iterator<Item = &str> + '_ {
        self.labels
            .iter()
            .filter(move |&(_, &at)| at == offset)
            .map(|(label, _)| label.as_str())
    }
}

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum CompilationError {
    #[error("unknown instruction {mnemonic:?}")]
    #[diagnostic(code(jumpsub::unknown_mnemonic))]
    UnknownMnemonic {
        mnemonic: String,
        #[label("not an instruction")]
        span: SourceSpan,
    },

    #[error("duplicate label {label:?}")]
    #[diagnostic(code(jumpsub::duplicate_label))]
    DuplicateLabel {
        label: String,
        #[label("redefined here")]
        span: SourceSpan,
        #[label("first defined here")]
        first: SourceSpan,
    },

    #[error("unknown label {label:?}")]
    #[diagnostic(code(jumpsub::unknown_label))]
    UnknownLabel {
        label: String,
        #[label("never defined")]
        span: SourceSpan,
    },

    #[error("{mnemonic} does not take an argument")]
    #[diagnostic(code(jumpsub::unexpected_argument))]
    UnexpectedArgument {
        mnemonic: String,
        #[label("unexpected argument")]
        span: SourceSpan,
    },

    #[error("{mnemonic} needs an argument")]
    #[diagnostic(code(jumpsub::missing_argument))]
    MissingArgument {
        mnemonic: String,
        #[label("argument missing")]
        span: SourceSpan,
    },

    #[error("{value} does not fit in {width} bytes")]
    #[diagnostic(code(jumpsub::literal_too_large), help("use a wider push"))]
    LiteralTooLarge {
        value: Word,
        width: usize,
        #[label("too large")]
        span: SourceSpan,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum AssemblyError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compilation(#[from] CompilationError),
}

/// Compile a parsed program to bytecode
///
/// # Errors
///
/// This function will return an error if a mnemonic or a label can't be resolved, or if an
/// argument does not fit its instruction.
#[tracing::instrument(skip(program))]
pub fn compile(program: &Program<'_>) -> Result<(Bytecode, DebugInfo), CompilationError> {
    let layout = self::layout::layout_program(program)?;
    let code = self::emit::emit(program, &layout)?;
    debug!(size = code.len(), labels = layout.labels.len(), "Compiled program");

    let debug_info = DebugInfo {
        labels: layout
            .labels
            .iter()
            .map(|(key, value)| ((*key).to_owned(), *value))
            .collect(),
    };

    Ok((Bytecode::new(code), debug_info))
}

/// Parse and compile a program
///
/// # Errors
///
/// This function will return an error if the program is invalid
pub fn assemble(source: &str) -> Result<(Bytecode, DebugInfo), AssemblyError> {
    let program = parse(source)?;
    Ok(compile(&program)?)
}

/// A listing of some bytecode, one instruction per line
struct Listing<'a> {
    bytecode: &'a Bytecode,
    debug_info: Option<&'a DebugInfo>,
    destinations: Option<&'a Destinations>,
}

impl std::fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (offset, instruction) in self.bytecode.instructions() {
            for label in self
                .debug_info
                .into_iter()
                .flat_map(|info| info.labels_at(offset))
            {
                writeln!(f, "{label}:")?;
            }

            let line = format!("{offset:04x}    {instruction}");
            let kinds: Vec<String> = [DestinationKind::Jump, DestinationKind::Subroutine]
                .into_iter()
                .filter(|&kind| self.destinations.is_some_and(|d| d.is_valid(offset, kind)))
                .map(|kind| kind.to_string())
                .collect();

            if kinds.is_empty() {
                writeln!(f, "{line}")?;
            } else {
                writeln!(f, "{line:<24}; {}", kinds.join(", "))?;
            }
        }

        Ok(())
    }
}

/// Render a listing of the bytecode, one instruction per line, with labels when known.
///
/// When `destinations` is given, offsets that are valid destinations are annotated with their
/// kinds.
#[must_use]
pub fn disassemble(
    bytecode: &Bytecode,
    debug_info: Option<&DebugInfo>,
    destinations: Option<&Destinations>,
) -> String {
    Listing {
        bytecode,
        debug_info,
        destinations,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::bytecode::DestinationPolicy;

    #[test]
    fn assemble_test() {
        let source = indoc! {"
            ; call a subroutine and come back
            main:
                push1 sub
                jumpsub
                stop

            sub:
                jumpdest
                returnsub
        "};
        let (bytecode, debug_info) = assemble(source).unwrap();
        assert_eq!(bytecode.as_bytes(), [0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7]);
        assert_eq!(
            debug_info.labels,
            BTreeMap::from([("main".to_owned(), 0), ("sub".to_owned(), 4)])
        );
    }

    #[test]
    fn assemble_wide_decimal_test() {
        // 2^128 needs a 17-byte push
        let (bytecode, _) = assemble("push 340282366920938463463374607431768211456\nstop").unwrap();
        let mut expected = vec![0x70, 0x01];
        expected.extend([0x00; 16]);
        expected.push(0x00);
        assert_eq!(bytecode.as_bytes(), expected.as_slice());
    }

    #[test]
    fn assemble_errors_test() {
        assert!(matches!(
            assemble("push1 $"),
            Err(AssemblyError::Syntax(_))
        ));
        assert!(matches!(
            assemble("push1 missing"),
            Err(AssemblyError::Compilation(CompilationError::UnknownLabel { .. }))
        ));
    }

    #[test]
    fn disassemble_test() {
        let source = indoc! {"
            main:
                push1 sub
                jumpsub
                push2 0x0102
                stop
            sub:
            entry:
                beginsub
                returnsub
        "};
        let (bytecode, debug_info) = assemble(source).unwrap();
        insta::assert_snapshot!(disassemble(&bytecode, Some(&debug_info), None), @r###"
        main:
        0000    push1 0x7
        0002    jumpsub
        0003    push2 0x102
        0006    stop
        entry:
        sub:
        0007    beginsub
        0008    returnsub
        "###);
    }

    #[test]
    fn disassemble_without_labels_test() {
        let bytecode = Bytecode::new([0x60, 0x04, 0xb3, 0x0c]);
        insta::assert_snapshot!(disassemble(&bytecode, None, None), @r###"
        0000    push1 0x4
        0002    jumpsub
        0003    invalid 0x0c
        "###);
    }

    #[test]
    fn disassemble_destinations_test() {
        let bytecode = Bytecode::new([0x60, 0x04, 0xb3, 0x00, 0x5b, 0xb7, 0xb5]);

        let destinations = bytecode.destinations(DestinationPolicy::Shared);
        insta::assert_snapshot!(disassemble(&bytecode, None, Some(&destinations)), @r###"
        0000    push1 0x4
        0002    jumpsub
        0003    stop
        0004    jumpdest        ; jump, subroutine
        0005    returnsub
        0006    beginsub
        "###);

        let destinations = bytecode.destinations(DestinationPolicy::Distinct);
        insta::assert_snapshot!(disassemble(&bytecode, None, Some(&destinations)), @r###"
        0000    push1 0x4
        0002    jumpsub
        0003    stop
        0004    jumpdest        ; jump
        0005    returnsub
        0006    beginsub        ; subroutine
        "###);
    }
}
