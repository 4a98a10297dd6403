//! Parse number literals and raw hex bytecode.
//!
//! Number literals are either base 10 or base 16 (prefixed by `0x`). Both forms yield a [`Word`]
//! and are limited to 256 bits.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1, take_while_m_n},
    character::complete::multispace0,
    combinator::{all_consuming, cut, map_res, opt, peek, recognize},
    multi::many0,
    sequence::{delimited, pair, terminated},
    Finish, IResult, Offset,
};
use thiserror::Error;

use super::ParseError;
use crate::word::Word;

/// Check if character is a decimal digit
fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// Check if character is a hexadecimal digit
fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Extract a hexadecimal literal, prefix included
fn take_hexadecimal_literal<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    recognize(pair(tag_no_case("0x"), take_while1(is_hex_digit)))(input)
}

/// Parse a hexadecimal literal. Once the `0x` prefix is seen, no other alternative is tried.
fn parse_hexadecimal<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Word, E> {
    peek(tag_no_case::<_, _, E>("0x"))(input)?;
    cut(map_res(take_hexadecimal_literal, Word::from_str))(input)
}

/// Parse a number literal
pub fn parse_literal<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Word, E> {
    alt((
        parse_hexadecimal,
        map_res(take_while1(is_digit), Word::from_str),
    ))(input)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid hex bytecode at offset {offset}")]
pub struct HexError {
    pub offset: usize,
}

fn parse_hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, is_hex_digit), |digits| {
        u8::from_str_radix(digits, 16)
    })(input)
}

/// Decode a hex string into raw bytes.
///
/// The `0x` prefix is optional and whitespace may separate bytes, but never split one.
///
/// # Errors
///
/// Returns the offset of the first character that is not part of a complete byte.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, HexError> {
    let parser = delimited(
        pair(multispace0, opt(tag_no_case("0x"))),
        many0(terminated(parse_hex_byte, multispace0)),
        multispace0,
    );

    all_consuming(parser)(input)
        .finish()
        .map(|(_, bytes)| bytes)
        .map_err(|e| HexError {
            offset: input.offset(e.input),
        })
}
