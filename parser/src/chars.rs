//! Parsers over streams of `char`.

use crate::impls::SourcePos;
use crate::parser::{label, skip_many, token_prim, tokens, Parser};
use crate::state::Config;
use crate::traits::Stream;

/// Declares a named character class: an `is_<name>` predicate and a
/// `<name>()` parser labelled with the given text.
///
/// ```ignore
/// char_classes! {
///     pub sign("sign") => '+' | '-';
///     pub octal_digit("octal digit") => '0' ..= '7';
/// }
/// ```
#[macro_export]
macro_rules! char_classes {
    (
        $(
            $( #[ $attr:meta ] )*
            $vis:vis $name:ident ( $label:literal ) => $($($value:literal)..=+)|+;
        )*
    ) => {
        $(
            $crate::char_classes!{
                IMPL
                $( #[ $attr ] )*
                $vis $name ( $label ) => $($($value)..=+)|+
            }
        )*
    };
    (
        IMPL
        $( #[ $attr:meta ] )*
        $vis:vis $name:ident ( $label:literal ) => $($($value:literal)..=+)|+
    ) => (
        $crate::paste::item! {
            #[allow(dead_code)]
            $vis fn [< is_ $name >](c: char) -> bool {
                matches!(c, $($($value)..=+)|+)
            }

            $( #[ $attr ] )*
            $vis fn $name<S, U>() -> $crate::parser::Parser<S, U, char>
            where
                S: $crate::traits::Stream<Item = char>,
                U: Clone + 'static,
            {
                $crate::chars::satisfy([< is_ $name >]).label($label)
            }
        }
    );
}

/// Accepts a character for which `predicate` holds.
pub fn satisfy<S, U, F>(predicate: F) -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
    F: Fn(char) -> bool + Send + Sync + 'static,
{
    token_prim(
        move |c: &char, _: &Config| if predicate(*c) { Some(*c) } else { None },
        |c: &char| format!("{:?}", c),
        |pos: &SourcePos, c: &char, _: &S, config: &Config| pos.next(*c, config.tab_width()),
    )
}

pub fn char<S, U>(expected: char) -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    label(satisfy(move |c| c == expected), format!("{:?}", expected))
}

/// Accepts any character contained in `set`.
pub fn one_of<S, U>(set: &str) -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    let set: Vec<char> = set.chars().collect();
    satisfy(move |c| set.contains(&c))
}

pub fn none_of<S, U>(set: &str) -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    let set: Vec<char> = set.chars().collect();
    satisfy(move |c| !set.contains(&c))
}

pub fn any_char<S, U>() -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    satisfy(|_| true)
}

/// Accepts exactly `text`. A mismatch after the first character consumes.
pub fn string<S, U>(text: &str) -> Parser<S, U, String>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    tokens(
        text.chars().collect(),
        |a: &char, b: &char| a == b,
        |cs: &[char]| format!("{:?}", cs.iter().collect::<String>()),
        |pos: &SourcePos, cs: &[char], config: &Config| {
            pos.advance(cs.iter().copied(), config.tab_width())
        },
    )
    .map(|cs| cs.into_iter().collect())
}

char_classes! {
    pub digit("digit") => '0' ..= '9';
    pub hex_digit("hexadecimal digit") => '0' ..= '9' | 'a' ..= 'f' | 'A' ..= 'F';
    pub oct_digit("octal digit") => '0' ..= '7';
    pub space("space") => ' ' | '\t' | '\n' | '\r' | '\u{000B}' | '\u{000C}';
    pub newline("new-line") => '\n';
    pub tab("tab") => '\t';
}

pub fn letter<S, U>() -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    satisfy(char::is_alphabetic).label("letter")
}

pub fn alpha_num<S, U>() -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    satisfy(char::is_alphanumeric).label("letter or digit")
}

pub fn upper<S, U>() -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    satisfy(char::is_uppercase).label("uppercase letter")
}

pub fn lower<S, U>() -> Parser<S, U, char>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    satisfy(char::is_lowercase).label("lowercase letter")
}

/// Skips any amount of white space.
pub fn spaces<S, U>() -> Parser<S, U, ()>
where
    S: Stream<Item = char>,
    U: Clone + 'static,
{
    skip_many(space()).label("white space")
}
