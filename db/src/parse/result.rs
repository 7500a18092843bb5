//! Tagged outcome of decoding one row.

use crate::error::ParseError;

/// Success or failure of a row parser.
///
/// `Map` and `FlatMap` short-circuit on failure and carry the original error
/// through unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseResult<T> {
    Success(T),
    Failure(ParseError),
}

impl<T> ParseResult<T> {
    pub fn successful(value: T) -> Self {
        ParseResult::Success(value)
    }

    pub fn failed(error: ParseError) -> Self {
        ParseResult::Failure(error)
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    /// Returns the decoded value, or the carried error on failure.
    pub fn value(self) -> Result<T, ParseError> {
        match self {
            ParseResult::Success(v) => Ok(v),
            ParseResult::Failure(e) => Err(e),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ParseResult<U> {
        match self {
            ParseResult::Success(v) => ParseResult::Success(f(v)),
            ParseResult::Failure(e) => ParseResult::Failure(e),
        }
    }

    pub fn flat_map<U, F: FnOnce(T) -> ParseResult<U>>(self, f: F) -> ParseResult<U> {
        match self {
            ParseResult::Success(v) => f(v),
            ParseResult::Failure(e) => ParseResult::Failure(e),
        }
    }

    pub fn fold<R>(self, on_error: impl FnOnce(ParseError) -> R, on_success: impl FnOnce(T) -> R) -> R {
        match self {
            ParseResult::Success(v) => on_success(v),
            ParseResult::Failure(e) => on_error(e),
        }
    }

    /// Turns an unexpected-NULL failure into an alternate result.
    ///
    /// `f` receives the column that was NULL. Every other failure is returned
    /// unchanged, so wrapping a parser with `recover` never hides decode errors.
    pub fn recover<F: FnOnce(usize) -> ParseResult<T>>(self, f: F) -> ParseResult<T> {
        match self {
            ParseResult::Failure(ParseError::UnexpectedNull { column }) => f(column),
            other => other,
        }
    }
}

impl<T> From<Result<T, ParseError>> for ParseResult<T> {
    fn from(result: Result<T, ParseError>) -> Self {
        match result {
            Ok(v) => ParseResult::Success(v),
            Err(e) => ParseResult::Failure(e),
        }
    }
}

impl<T> From<ParseResult<T>> for Result<T, ParseError> {
    fn from(result: ParseResult<T>) -> Self {
        result.value()
    }
}
