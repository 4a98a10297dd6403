//! Program line parsing
//!
//! A line holds any number of label definitions, at most one statement and an optional comment.
//! A statement is a mnemonic followed by an optional argument, either a number literal or a label
//! reference.
//!
//! Parsing is zero copy: every member of [`Line`] borrows from the original input, which lets the
//! compiler recover the location of any fragment with [`nom::Offset`].

use nom::{
    branch::alt,
    character::complete::{char, line_ending, not_line_ending, one_of, space0, space1},
    combinator::{consumed, cut, eof, map, opt, peek},
    error::context,
    multi::{many0, separated_list1},
    sequence::{preceded, terminated},
    IResult,
};

use super::{literal::parse_literal, parse_identifier, ParseError};
use crate::word::Word;

/// The argument of a statement
#[derive(Clone, Debug, PartialEq)]
pub enum Argument<'a> {
    /// A number literal, along with its original spelling
    Literal { text: &'a str, value: Word },
    /// A reference to a label
    Label(&'a str),
}

impl<'a> Argument<'a> {
    /// The source fragment of the argument
    #[must_use]
    pub fn text(&self) -> &'a str {
        match self {
            Self::Literal { text, .. } => text,
            Self::Label(label) => label,
        }
    }
}

impl std::fmt::Display for Argument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// An instruction mnemonic and its argument
#[derive(Clone, Debug, PartialEq)]
pub struct Statement<'a> {
    pub mnemonic: &'a str,
    pub argument: Option<Argument<'a>>,
}

impl std::fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{:8} {argument}", self.mnemonic),
            None => write!(f, "{}", self.mnemonic),
        }
    }
}

/// Holds a whole line, with the label definitions (if any), the statement (if any) and the
/// comment (if any).
///
/// Note that the `Default::default()` implementation represents an empty line.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Line<'a> {
    pub labels: Vec<&'a str>,
    pub statement: Option<Statement<'a>>,
    comment: Option<&'a str>,
}

impl std::fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut had_something = false;
        for label in &self.labels {
            write!(f, "{label}: ")?;
            had_something = true;
        }

        if let Some(ref statement) = self.statement {
            if !had_something {
                write!(f, "    ")?;
            }
            write!(f, "{statement}")?;
            had_something = true;
        }

        if let Some(comment) = self.comment {
            if had_something {
                write!(f, "\t{comment}")?;
            } else {
                write!(f, "{comment}")?;
            }
        }

        Ok(())
    }
}

impl<'a> Line<'a> {
    #[cfg(test)]
    pub(crate) fn comment(mut self, comment: &'a str) -> Self {
        self.comment = Some(comment);
        self
    }

    #[cfg(test)]
    pub(crate) fn label(mut self, label: &'a str) -> Self {
        self.labels.push(label);
        self
    }

    #[cfg(test)]
    pub(crate) fn statement(mut self, mnemonic: &'a str, argument: Option<Argument<'a>>) -> Self {
        self.statement = Some(Statement { mnemonic, argument });
        self
    }
}

/// Parses a statement argument
fn parse_argument<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Argument<'a>, E> {
    alt((
        map(consumed(parse_literal), |(text, value)| Argument::Literal {
            text,
            value,
        }),
        map(parse_identifier, Argument::Label),
    ))(input)
}

/// Parses a statement
fn parse_statement<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Statement<'a>, E> {
    let (input, mnemonic) = parse_identifier(input)?;
    let (input, argument) = opt(preceded(space1, parse_argument))(input)?;
    Ok((input, Statement { mnemonic, argument }))
}

/// Parses an inline comment, starting with either `;` or `#`
fn parse_comment<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    let (input, _) = peek(one_of(";#"))(input)?;
    not_line_ending(input)
}

/// Parses a label definition
fn parse_label_definition<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    let (input, label) = parse_identifier(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char(':')(input)?;
    Ok((input, label))
}

/// Parses a whole line
fn parse_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Line<'a>, E> {
    let (input, _) = space0(input)?;

    // Extract the list of label definitions
    let (input, labels) = many0(terminated(parse_label_definition, space0))(input)?;

    // Extract the statement
    let (input, statement) = opt(parse_statement)(input)?;
    let (input, _) = space0(input)?;

    // Extract the comment
    let (input, comment) = opt(parse_comment)(input)?;

    // Anything left before the end of the line is garbage
    let (input, _) = cut(context(
        "expected end of line",
        peek(alt((line_ending, eof))),
    ))(input)?;

    Ok((
        input,
        Line {
            labels,
            statement,
            comment,
        },
    ))
}

pub(crate) fn parse_lines<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<Line<'a>>, E> {
    separated_list1(line_ending, parse_line)(input)
}
