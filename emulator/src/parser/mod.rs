//! Assembly source parsing
//!
//! This module is splitted in multiple submodules to make things easier to
//! read. The parsing is handled by the `nom` library.

use miette::SourceSpan;
use nom::bytes::complete::take_while1;
use nom::combinator::{all_consuming, verify};
use nom::{Finish, IResult, Offset};

mod errors;
pub mod line;
pub mod literal;

pub use errors::{Error, ParseError, SyntaxError};
pub use line::{Argument, Line, Statement};
pub use literal::{parse_hex_bytes, HexError};

fn is_identifier_char(c: char) -> bool {
    is_start_identifier_char(c) || c.is_ascii_digit()
}

fn is_start_identifier_char(c: char) -> bool {
    c == '_' || c == '.' || c.is_ascii_lowercase() || c.is_ascii_uppercase()
}

/// Parse an identifier, used both for mnemonics and labels
pub(crate) fn parse_identifier<'a, Error: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, Error> {
    verify(take_while1(is_identifier_char), |f: &str| {
        f.chars()
            .next()
            .filter(|&c| is_start_identifier_char(c))
            .is_some()
    })(input)
}

/// A parsed program, borrowing from its source
#[derive(Clone, Debug, PartialEq)]
pub struct Program<'a> {
    source: &'a str,
    pub lines: Vec<Line<'a>>,
}

impl<'a> Program<'a> {
    /// The source the program was parsed from
    #[must_use]
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Location of a fragment of the source, as a span usable in diagnostics
    #[must_use]
    pub fn span_of(&self, fragment: &str) -> SourceSpan {
        (self.source.offset(fragment), fragment.len()).into()
    }
}

impl std::fmt::Display for Program<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Parse a program
///
/// # Errors
///
/// This function will return an error if the program is invalid
pub fn parse(input: &str) -> Result<Program<'_>, SyntaxError> {
    let result: IResult<&str, Vec<Line>, Error<&str>> = all_consuming(line::parse_lines)(input);
    let (_, lines) = result
        .finish()
        .map_err(|e| SyntaxError::new(input, &e))?;

    Ok(Program {
        source: input,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_identifier_test() {
        type R<'a> = IResult<&'a str, &'a str, ()>;
        assert_eq!(parse_identifier("hello"), R::Ok(("", "hello")));
        assert_eq!(parse_identifier("push32"), R::Ok(("", "push32")));
        assert_eq!(parse_identifier("123abc"), R::Err(nom::Err::Error(())));
        assert_eq!(parse_identifier("abc_123"), R::Ok(("", "abc_123")));
        assert_eq!(parse_identifier(".loop"), R::Ok(("", ".loop")));
        assert_eq!(parse_identifier("abc-123"), R::Ok(("-123", "abc")));
    }

    #[test]
    fn parse_program_test() {
        let source = "main:\n    push1 sub\n    jumpsub\n    stop\nsub:\n    beginsub\n    returnsub\n";
        let program = parse(source).unwrap();
        assert_eq!(program.lines.len(), 8);
        assert_eq!(
            program.to_string(),
            "main: \n    push1    sub\n    jumpsub\n    stop\nsub: \n    beginsub\n    returnsub\n\n"
        );
    }

    #[test]
    fn span_of_test() {
        let source = "push1 0x04\njumpsub";
        let program = parse(source).unwrap();
        let statement = program.lines[1].statement.as_ref().unwrap();
        assert_eq!(program.span_of(statement.mnemonic), (11, 7).into());
    }

    #[test]
    fn syntax_error_offset_test() {
        let source = "push1 4\npush1 $\n";
        let error = parse(source).unwrap_err();
        assert_eq!(error.offset(), 14);
    }
}
