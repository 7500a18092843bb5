//! Row decoding: the result algebra and composable parsers.

pub mod columns;
pub mod maybe;
pub mod parser;
pub mod result;

pub use columns::{
    boolean, boolean_named, byte, byte_named, bytes, bytes_named, cell, character,
    character_named, double, double_named, float, float_named, integer, integer_named, long,
    long_named, named, optional, optional_named, short, short_named, string, string_named,
    value, value_named,
};
pub use maybe::{Maybe, NoValue, Nothing};
pub use parser::{CellParser, RowParser};
pub use result::ParseResult;
