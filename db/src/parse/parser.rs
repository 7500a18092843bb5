//! Composable row parsers.

use std::fmt::Display;
use std::sync::Arc;

use crate::backend::Row;
use crate::error::ParseError;
use crate::parse::maybe::Maybe;
use crate::parse::result::ParseResult;

type ParseFn<T> = dyn Fn(&dyn Row) -> ParseResult<T> + Send + Sync;

/// A function from a row to a [`ParseResult`].
///
/// Parsers are cheap to clone and never consume the row, so composed parsers
/// all read from the same positional view.
pub struct RowParser<T> {
    f: Arc<ParseFn<T>>,
}

impl<T> Clone for RowParser<T> {
    fn clone(&self) -> Self {
        Self { f: Arc::clone(&self.f) }
    }
}

impl<T> std::fmt::Debug for RowParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowParser").finish_non_exhaustive()
    }
}

impl<T: 'static> RowParser<T> {
    pub fn new(f: impl Fn(&dyn Row) -> ParseResult<T> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Parser that ignores the row and always yields `value`.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::new(move |_| ParseResult::successful(value.clone()))
    }

    /// Parser that always fails with `error`.
    pub fn failing(error: ParseError) -> Self {
        Self::new(move |_| ParseResult::failed(error.clone()))
    }

    /// Wraps a fallible closure; its error becomes a [`ParseError::Custom`].
    pub fn safe<E: Display>(f: impl Fn(&dyn Row) -> Result<T, E> + Send + Sync + 'static) -> Self {
        Self::new(move |row| match f(row) {
            Ok(v) => ParseResult::successful(v),
            Err(e) => ParseResult::failed(ParseError::Custom(e.to_string())),
        })
    }

    pub fn parse(&self, row: &dyn Row) -> ParseResult<T> {
        (self.f)(row)
    }

    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> RowParser<U> {
        RowParser::new(move |row| self.parse(row).map(&f))
    }

    /// Chains a parser chosen from this parser's value; the continuation is
    /// handed the same row.
    pub fn flat_map<U: 'static>(
        self,
        f: impl Fn(T) -> RowParser<U> + Send + Sync + 'static,
    ) -> RowParser<U> {
        RowParser::new(move |row| self.parse(row).flat_map(|v| f(v).parse(row)))
    }

    /// Runs both parsers against the same row and pairs the values.
    ///
    /// The left error wins when both sides fail.
    pub fn and<U: 'static>(self, other: impl Into<RowParser<U>>) -> RowParser<(T, U)> {
        let other = other.into();
        RowParser::new(move |row| {
            self.parse(row)
                .flat_map(|left| other.parse(row).map(|right| (left, right)))
        })
    }

    /// Yields `Nothing` when this parser hits a NULL cell; other failures pass through.
    pub fn maybe(self) -> RowParser<Maybe<T>> {
        RowParser::new(move |row| {
            self.parse(row)
                .map(Maybe::Just)
                .recover(|_| ParseResult::successful(Maybe::Nothing))
        })
    }
}

/// A [`RowParser`] that reads exactly one known column.
///
/// Keeping the position lets [`optional`](crate::parse::columns::optional) test
/// the cell for NULL before any typed accessor runs.
pub struct CellParser<T> {
    column: usize,
    parser: RowParser<T>,
}

impl<T> Clone for CellParser<T> {
    fn clone(&self) -> Self {
        Self {
            column: self.column,
            parser: self.parser.clone(),
        }
    }
}

impl<T> std::fmt::Debug for CellParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellParser")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> CellParser<T> {
    pub fn new(column: usize, parser: RowParser<T>) -> Self {
        Self { column, parser }
    }

    /// Zero-based position of the column this parser reads.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn parse(&self, row: &dyn Row) -> ParseResult<T> {
        self.parser.parse(row)
    }

    pub fn into_parser(self) -> RowParser<T> {
        self.parser
    }

    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> RowParser<U> {
        self.parser.map(f)
    }

    pub fn flat_map<U: 'static>(
        self,
        f: impl Fn(T) -> RowParser<U> + Send + Sync + 'static,
    ) -> RowParser<U> {
        self.parser.flat_map(f)
    }

    pub fn and<U: 'static>(self, other: impl Into<RowParser<U>>) -> RowParser<(T, U)> {
        self.parser.and(other)
    }

    pub fn maybe(self) -> RowParser<Maybe<T>> {
        crate::parse::columns::optional(self)
    }
}

impl<T> From<CellParser<T>> for RowParser<T> {
    fn from(cell: CellParser<T>) -> Self {
        cell.parser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ValueRow;
    use crate::parse::columns::{cell, integer};
    use crate::value::SqlValue;
    use proptest::prelude::*;
    use rstest::rstest;

    fn row_of(values: Vec<SqlValue>) -> ValueRow {
        let columns = (0..values.len()).map(|i| format!("c{}", i)).collect();
        ValueRow::new(columns, values)
    }

    #[rstest]
    fn test_constant_parser_ignores_row() {
        let row = row_of(vec![]);
        assert_eq!(RowParser::constant(7).parse(&row).value(), Ok(7));
    }

    #[rstest]
    fn test_safe_captures_errors() {
        let row = row_of(vec![]);
        let parser = RowParser::<i32>::safe(|_| Err::<i32, _>("nope"));
        assert_eq!(parser.parse(&row).value(), Err(ParseError::Custom("nope".into())));
    }

    #[rstest]
    fn test_map_and_flat_map() {
        let row = row_of(vec![SqlValue::Int(1), SqlValue::Int(40)]);

        let doubled = integer(1).map(|v| v * 2);
        assert_eq!(doubled.parse(&row).value(), Ok(80));

        // first column picks which column to read next
        let indirect = integer(0).flat_map(|idx| cell::<i64>(idx as usize).into_parser());
        assert_eq!(indirect.parse(&row).value(), Ok(40));
    }

    #[rstest]
    fn test_and_left_error_wins() {
        let row = row_of(vec![]);
        let left = RowParser::<i32>::failing(ParseError::Custom("left".into()));
        let right = RowParser::<i32>::failing(ParseError::Custom("right".into()));

        assert_eq!(left.and(right).parse(&row).value(), Err(ParseError::Custom("left".into())));
    }

    #[rstest]
    fn test_maybe_only_swallows_null() {
        let row = row_of(vec![SqlValue::Null, SqlValue::Str("x".into())]);

        assert_eq!(integer(0).into_parser().maybe().parse(&row).value(), Ok(Maybe::Nothing));
        assert!(integer(1).into_parser().maybe().parse(&row).value().is_err());
    }

    fn cell_value() -> impl Strategy<Value = SqlValue> {
        prop_oneof![
            any::<i32>().prop_map(|v| SqlValue::Int(v.into())),
            Just(SqlValue::Null),
            "[a-z]{0,4}".prop_map(SqlValue::Str),
        ]
    }

    proptest! {
        #[test]
        fn and_succeeds_iff_both_sides_succeed(a in cell_value(), b in cell_value()) {
            let row = row_of(vec![a, b]);
            let left = integer(0);
            let right = integer(1);

            let both = left.clone().and(right.clone()).parse(&row).value();
            match (left.parse(&row).value(), right.parse(&row).value()) {
                (Ok(x), Ok(y)) => prop_assert_eq!(both, Ok((x, y))),
                (Err(e), _) => prop_assert_eq!(both, Err(e)),
                (Ok(_), Err(e)) => prop_assert_eq!(both, Err(e)),
            }
        }
    }
}
