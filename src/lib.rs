//! Composable recursive-descent parsers.
//!
//! The machinery lives in `quince-parser` and is re-exported here together
//! with the operator-precedence builder in [`expr`] and the [`parse()`] entry
//! points.

#[cfg(test)]
#[macro_use]
extern crate assert_float_eq;

pub use quince_parser::char_classes;
pub use quince_parser::error::{Defect, ErrorMessage, MessageKind, ParseError};
pub use quince_parser::impls::{CharStream, SourcePos, TokenStream, Utf16Item, Utf16Stream};
pub use quince_parser::parser::Parser;
pub use quince_parser::qo::{qo, Halt, Qo};
pub use quince_parser::state::{Config, Reply, State};
pub use quince_parser::traits::Stream;
pub use quince_parser::{chars, combinators, parser};

pub use crate::expr::{build_expression_parser, Assoc, Operator, OperatorTableError};
pub use crate::parse::{parse, parse_with_config};

pub mod expr;

mod parse;
