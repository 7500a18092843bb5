//! Primitive column parsers.
//!
//! Every primitive comes in two flavours: by position, returning a
//! [`CellParser`], and by name (`*_named`), which resolves the name against the
//! row and then delegates to the positional parser.

use crate::backend::Row;
use crate::error::ParseError;
use crate::parse::maybe::Maybe;
use crate::parse::parser::{CellParser, RowParser};
use crate::parse::result::ParseResult;
use crate::value::{FromValue, SqlValue};

/// Decodes the cell at `index` as `T`.
///
/// NULL cells fail with [`ParseError::UnexpectedNull`] before `T`'s conversion
/// is attempted; conversion errors become [`ParseError::Decode`].
pub fn cell<T: FromValue + 'static>(index: usize) -> CellParser<T> {
    let parser = RowParser::new(move |row: &dyn Row| {
        let Some(value) = row.get(index) else {
            return ParseResult::failed(ParseError::ColumnOutOfRange {
                index,
                len: row.len(),
            });
        };
        if value.is_null() {
            return ParseResult::failed(ParseError::UnexpectedNull { column: index });
        }
        T::from_value(value)
            .map_err(|message| ParseError::decode(index, message))
            .into()
    });
    CellParser::new(index, parser)
}

/// Decodes the column called `name` as `T`.
pub fn named<T: FromValue + 'static>(name: impl Into<String>) -> RowParser<T> {
    let name = name.into();
    RowParser::new(move |row: &dyn Row| ParseResult::from(row.column_index(&name)))
        .flat_map(|index| cell::<T>(index).into_parser())
}

/// Yields `Nothing` for a NULL cell without running the wrapped parser.
pub fn optional<T: 'static>(parser: CellParser<T>) -> RowParser<Maybe<T>> {
    let column = parser.column();
    RowParser::new(move |row: &dyn Row| match row.is_null(column) {
        Ok(true) => ParseResult::successful(Maybe::Nothing),
        Ok(false) => parser.parse(row).map(Maybe::Just),
        Err(e) => ParseResult::failed(e),
    })
}

/// Optional decode of the column called `name`.
pub fn optional_named<T: FromValue + 'static>(name: impl Into<String>) -> RowParser<Maybe<T>> {
    let name = name.into();
    RowParser::new(move |row: &dyn Row| ParseResult::from(row.column_index(&name)))
        .flat_map(|index| optional(cell::<T>(index)))
}

macro_rules! column_parsers {
    ($($(#[$doc:meta])* $name:ident / $named:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(index: usize) -> CellParser<$ty> {
                cell::<$ty>(index)
            }

            $(#[$doc])*
            pub fn $named(name: impl Into<String>) -> RowParser<$ty> {
                named::<$ty>(name)
            }
        )*
    };
}

column_parsers! {
    /// Text column.
    string / string_named => String;
    /// 32-bit integer column.
    integer / integer_named => i32;
    /// 64-bit integer column.
    long / long_named => i64;
    short / short_named => i16;
    byte / byte_named => u8;
    /// Boolean column; integer 0 and 1 are accepted.
    boolean / boolean_named => bool;
    double / double_named => f64;
    float / float_named => f32;
    /// Single-character text column.
    character / character_named => char;
    bytes / bytes_named => Vec<u8>;
    /// Raw cell value, NULL excluded.
    value / value_named => SqlValue;
}
