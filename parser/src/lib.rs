//! Parser combinator runtime.
//!
//! A [`Parser`](parser::Parser) runs against a [`State`](state::State) and
//! answers with a [`Reply`](state::Reply) that records whether input was
//! consumed and whether the parse succeeded. Alternatives are only tried
//! when the previous branch failed without consuming; wrap a branch in
//! [`try_parse`](parser::try_parse) to backtrack further.

pub use paste;

pub mod chars;
pub mod combinators;
pub mod error;
pub mod impls;
pub mod parser;
pub mod qo;
pub mod state;
pub mod traits;
