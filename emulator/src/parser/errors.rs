#![expect(
    unused_assignments,
    reason = "Looks like miette error derive generates this"
)]

use miette::{SourceOffset, SourceSpan};
use nom::Offset;

use crate::word::WordError;

pub trait ParseError<I>:
    nom::error::ParseError<I>
    + nom::error::FromExternalError<I, WordError>
    + nom::error::ContextError<I>
{
}

impl<I, E> ParseError<I> for E where
    E: nom::error::ParseError<I>
        + nom::error::FromExternalError<I, WordError>
        + nom::error::ContextError<I>
{
}

#[derive(Debug)]
pub enum Error<I> {
    Context {
        input: I,
        ctx: &'static str,
        child: Box<Error<I>>,
    },
    Or {
        inner: Vec<Error<I>>,
    },
    Char {
        input: I,
        needed: char,
    },
    Nom {
        input: I,
        kind: nom::error::ErrorKind,
        child: Option<Box<Error<I>>>,
    },
    Literal {
        input: I,
        kind: nom::error::ErrorKind,
        inner: WordError,
    },
}

impl<I> Error<I> {
    /// The input at which the error happened. `Or` errors report their first alternative.
    pub fn input(&self) -> Option<&I> {
        match self {
            Self::Context { input, .. }
            | Self::Char { input, .. }
            | Self::Nom { input, .. }
            | Self::Literal { input, .. } => Some(input),

            Self::Or { inner } => inner.first().and_then(Self::input),
        }
    }

    pub fn to_miette_diagnostic(&self, source: &I) -> Box<dyn miette::Diagnostic + Send + Sync>
    where
        I: Offset,
    {
        Box::new(self.to_diagnostic(source))
    }

    fn to_diagnostic(&self, source: &I) -> Diagnostic
    where
        I: Offset,
    {
        match self {
            Error::Context { input, ctx, child } => Diagnostic::Context {
                span: source.offset(input).into(),
                ctx,
                child: child.to_miette_diagnostic(source),
            },
            Error::Or { inner } => Diagnostic::Or {
                inner: inner.iter().map(|e| e.to_diagnostic(source)).collect(),
            },
            Error::Char { input, needed } => Diagnostic::Char {
                span: source.offset(input).into(),
                needed: *needed,
            },
            Error::Nom { input, child, .. } => Diagnostic::Nom {
                span: source.offset(input).into(),
                child: child
                    .as_ref()
                    .map(|child| child.to_miette_diagnostic(source)),
            },
            Error::Literal { input, inner, .. } => Diagnostic::Literal {
                span: source.offset(input).into(),
                inner: inner.clone(),
            },
        }
    }
}

impl<I> nom::error::ParseError<I> for Error<I> {
    fn from_error_kind(input: I, kind: nom::error::ErrorKind) -> Self {
        Self::Nom {
            input,
            kind,
            child: None,
        }
    }

    fn append(input: I, kind: nom::error::ErrorKind, other: Self) -> Self {
        Self::Nom {
            input,
            kind,
            child: Some(Box::new(other)),
        }
    }

    fn from_char(input: I, needed: char) -> Self {
        Self::Char { input, needed }
    }

    fn or(self, other: Self) -> Self {
        // Flatten nested alternatives into a single list
        match (self, other) {
            (Self::Or { inner: first }, Self::Or { inner: second }) => Self::Or {
                inner: first.into_iter().chain(second).collect(),
            },
            (Self::Or { inner: first }, second) => Self::Or {
                inner: first.into_iter().chain(std::iter::once(second)).collect(),
            },
            (first, Self::Or { inner: second }) => Self::Or {
                inner: std::iter::once(first).chain(second).collect(),
            },
            (first, second) => Self::Or {
                inner: vec![first, second],
            },
        }
    }
}

impl<I> nom::error::ContextError<I> for Error<I> {
    fn add_context(input: I, ctx: &'static str, other: Self) -> Self {
        Self::Context {
            input,
            ctx,
            child: Box::new(other),
        }
    }
}

impl<I> nom::error::FromExternalError<I, WordError> for Error<I> {
    fn from_external_error(input: I, kind: nom::error::ErrorKind, inner: WordError) -> Self {
        Self::Literal { input, kind, inner }
    }
}

#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("invalid syntax")]
enum Diagnostic {
    Context {
        #[label("{ctx}")]
        span: SourceOffset,
        ctx: &'static str,
        child: Box<dyn miette::Diagnostic + Send + Sync>,
    },

    Or {
        #[related]
        inner: Vec<Diagnostic>,
    },

    Char {
        #[label("Expect '{needed}' here")]
        span: SourceOffset,

        needed: char,
    },

    Nom {
        #[label("here")]
        span: SourceOffset,
        child: Option<Box<dyn miette::Diagnostic + Send + Sync>>,
    },

    Literal {
        #[label("here")]
        span: SourceOffset,

        #[source]
        inner: WordError,
    },
}

/// A parse failure, detached from the borrowed input so it can be reported with its source
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
#[error("failed to parse program")]
#[diagnostic(code(jumpsub::syntax))]
pub struct SyntaxError {
    #[source_code]
    source_code: String,

    #[label("invalid syntax")]
    span: SourceSpan,

    #[related]
    causes: Vec<Box<dyn miette::Diagnostic + Send + Sync>>,
}

impl SyntaxError {
    pub(crate) fn new(source: &str, error: &Error<&str>) -> Self {
        let offset = error.input().map_or(0, |input| source.offset(input));
        Self {
            source_code: source.to_owned(),
            span: offset.into(),
            causes: vec![error.to_miette_diagnostic(&source)],
        }
    }

    /// Byte offset of the error in the source
    #[must_use]
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}
