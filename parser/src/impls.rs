use crate::state::Config;
use crate::traits::Stream;

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

/// A point in the source: the input's name, the element index, and the
/// one-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub name: Arc<str>,
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(name: impl Into<Arc<str>>, index: usize, line: usize, column: usize) -> Self {
        Self {
            name: name.into(),
            index,
            line,
            column,
        }
    }

    /// Start of the input called `name`: line 1, column 1.
    pub fn init(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, 0, 1, 1)
    }

    /// Position after consuming `c`. A newline starts the next line, a tab
    /// moves to the column after the next multiple of `tab_width`.
    pub fn next(&self, c: char, tab_width: usize) -> Self {
        let (line, column) = match c {
            '\n' => (self.line + 1, 1),
            '\t' => (
                self.line,
                self.column + tab_width - (self.column - 1) % tab_width,
            ),
            _ => (self.line, self.column + 1),
        };
        Self {
            name: Arc::clone(&self.name),
            index: self.index + 1,
            line,
            column,
        }
    }

    pub fn advance<I: IntoIterator<Item = char>>(&self, chars: I, tab_width: usize) -> Self {
        chars
            .into_iter()
            .fold(self.clone(), |pos, c| pos.next(c, tab_width))
    }

    /// Orders positions by how far parsing has advanced. The name is ignored.
    pub fn cmp_progress(&self, other: &Self) -> Ordering {
        (self.line, self.column, self.index).cmp(&(other.line, other.column, other.index))
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "(line {}, column {})", self.line, self.column)
        } else {
            write!(
                f,
                "{:?}(line {}, column {})",
                &*self.name, self.line, self.column
            )
        }
    }
}

/// Text input backed by a shared string. Yields one `char` per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharStream {
    source: Arc<str>,
    offset: usize,
}

impl CharStream {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            offset: 0,
        }
    }

    /// The text not consumed yet.
    pub fn as_str(&self) -> &str {
        &self.source[self.offset..]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Stream for CharStream {
    type Item = char;

    fn uncons(&self, _config: &Config) -> Option<(char, Self)> {
        let c = self.as_str().chars().next()?;
        Some((
            c,
            Self {
                source: Arc::clone(&self.source),
                offset: self.offset + c.len_utf8(),
            },
        ))
    }
}

impl From<&str> for CharStream {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for CharStream {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

/// One element of a [`Utf16Stream`]: either a decoded scalar value or a
/// single code unit that is read on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Utf16Item {
    Scalar(char),
    Unit(u16),
}

impl Utf16Item {
    pub fn as_char(&self) -> Option<char> {
        match self {
            Utf16Item::Scalar(c) => Some(*c),
            Utf16Item::Unit(_) => None,
        }
    }

    pub fn next_pos(&self, pos: &SourcePos, tab_width: usize) -> SourcePos {
        match self {
            Utf16Item::Scalar(c) => pos.next(*c, tab_width),
            Utf16Item::Unit(_) => pos.next('\u{fffd}', tab_width),
        }
    }
}

impl fmt::Display for Utf16Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Utf16Item::Scalar(c) => write!(f, "{:?}", c),
            Utf16Item::Unit(u) => write!(f, "'\\u{{{:04x}}}'", u),
        }
    }
}

/// UTF-16 input. Whether a surrogate pair is one element or two is decided
/// by [`Config::unicode`]; unpaired surrogates are always single elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf16Stream {
    units: Arc<[u16]>,
    offset: usize,
}

impl Utf16Stream {
    pub fn new(units: impl Into<Arc<[u16]>>) -> Self {
        Self {
            units: units.into(),
            offset: 0,
        }
    }

    pub fn units(&self) -> &[u16] {
        &self.units[self.offset..]
    }
}

impl Stream for Utf16Stream {
    type Item = Utf16Item;

    fn uncons(&self, config: &Config) -> Option<(Utf16Item, Self)> {
        let rest = self.units();
        let first = *rest.first()?;
        let (item, width) = match char::decode_utf16(rest.iter().copied()).next()? {
            Ok(c) if c.len_utf16() == 1 => (Utf16Item::Scalar(c), 1),
            Ok(c) if config.unicode() => (Utf16Item::Scalar(c), 2),
            Ok(_) => (Utf16Item::Unit(first), 1),
            Err(e) => (Utf16Item::Unit(e.unpaired_surrogate()), 1),
        };
        Some((
            item,
            Self {
                units: Arc::clone(&self.units),
                offset: self.offset + width,
            },
        ))
    }
}

impl From<&str> for Utf16Stream {
    fn from(source: &str) -> Self {
        Self::new(source.encode_utf16().collect::<Vec<_>>())
    }
}

impl From<Vec<u16>> for Utf16Stream {
    fn from(units: Vec<u16>) -> Self {
        Self::new(units)
    }
}

/// Input made of tokens produced by an earlier pass.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenStream<T> {
    tokens: Arc<[T]>,
    offset: usize,
}

impl<T> TokenStream<T> {
    pub fn new(tokens: impl Into<Arc<[T]>>) -> Self {
        Self {
            tokens: tokens.into(),
            offset: 0,
        }
    }

    pub fn remaining(&self) -> &[T] {
        &self.tokens[self.offset..]
    }
}

impl<T> Clone for TokenStream<T> {
    fn clone(&self) -> Self {
        Self {
            tokens: Arc::clone(&self.tokens),
            offset: self.offset,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Stream for TokenStream<T> {
    type Item = T;

    fn uncons(&self, _config: &Config) -> Option<(T, Self)> {
        let token = self.remaining().first()?.clone();
        Some((
            token,
            Self {
                tokens: Arc::clone(&self.tokens),
                offset: self.offset + 1,
            },
        ))
    }
}

impl<T> From<Vec<T>> for TokenStream<T> {
    fn from(tokens: Vec<T>) -> Self {
        Self::new(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn drain<S: Stream>(stream: S, config: &Config) -> Vec<S::Item> {
        let mut items = Vec::new();
        let mut rest = stream;
        while let Some((item, next)) = rest.uncons(config) {
            items.push(item);
            rest = next;
        }
        items
    }

    #[test]
    fn char_stream_offset_counts_bytes() {
        let config = Config::default();
        let stream = CharStream::new("éa");
        assert!(!stream.is_end(&config));
        let (c, rest) = stream.uncons(&config).unwrap();
        assert_eq!((c, rest.offset(), rest.as_str()), ('é', 2, "a"));
        let (_, rest) = rest.uncons(&config).unwrap();
        assert_eq!(rest.offset(), 3);
        assert!(rest.is_end(&config));
    }

    #[test]
    fn end_of_token_and_utf16_streams() {
        let config = Config::default();
        assert!(TokenStream::<u8>::from(Vec::new()).is_end(&config));
        assert!(!TokenStream::from(vec![1u8]).is_end(&config));
        assert!(Utf16Stream::from("").is_end(&config));
    }

    #[rstest]
    #[case(Utf16Item::Scalar('z'), Some('z'))]
    #[case(Utf16Item::Unit(0xd83c), None)]
    fn utf16_item_as_char(#[case] item: Utf16Item, #[case] expected: Option<char>) {
        assert_eq!(item.as_char(), expected);
    }

    #[rstest]
    #[case('a', 1, 2)]
    #[case('\n', 2, 1)]
    #[case('\t', 1, 9)]
    fn it_advances_from_start(#[case] c: char, #[case] line: usize, #[case] column: usize) {
        let pos = SourcePos::init("test").next(c, 8);
        assert_eq!((pos.index, pos.line, pos.column), (1, line, column));
    }

    #[test]
    fn it_rounds_tabs_up() {
        let pos = SourcePos::new("", 2, 1, 3).next('\t', 4);
        assert_eq!(pos.column, 5);
        let pos = SourcePos::new("", 4, 1, 5).next('\t', 4);
        assert_eq!(pos.column, 9);
    }

    #[test]
    fn it_displays_with_and_without_name() {
        assert_eq!(
            SourcePos::new("main", 0, 3, 7).to_string(),
            "\"main\"(line 3, column 7)"
        );
        assert_eq!(SourcePos::new("", 0, 1, 2).to_string(), "(line 1, column 2)");
    }

    #[test]
    fn char_stream_yields_scalars() {
        let items = drain(CharStream::from("a\u{1F600}b"), &Config::default());
        assert_eq!(items, vec!['a', '\u{1F600}', 'b']);
    }

    #[test]
    fn utf16_stream_splits_pairs_unless_unicode() {
        let config = Config::default();
        let items = drain(Utf16Stream::from("a\u{1F600}"), &config);
        assert_eq!(
            items,
            vec![
                Utf16Item::Scalar('a'),
                Utf16Item::Unit(0xd83d),
                Utf16Item::Unit(0xde00)
            ]
        );

        let config = Config::default().with_unicode(true);
        let items = drain(Utf16Stream::from("a\u{1F600}"), &config);
        assert_eq!(
            items,
            vec![Utf16Item::Scalar('a'), Utf16Item::Scalar('\u{1F600}')]
        );
    }

    #[test]
    fn utf16_stream_keeps_lone_surrogates() {
        let config = Config::default().with_unicode(true);
        let items = drain(Utf16Stream::from(vec![0xd83c, 0x61]), &config);
        assert_eq!(items, vec![Utf16Item::Unit(0xd83c), Utf16Item::Scalar('a')]);
    }

    #[test]
    fn token_stream_yields_tokens() {
        let items = drain(TokenStream::from(vec![1, 2, 3]), &Config::default());
        assert_eq!(items, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn two_newlines_reach_line_three(tab_width in 1usize..32) {
            let pos = SourcePos::init("p").next('\n', tab_width).next('\n', tab_width);
            prop_assert_eq!((pos.line, pos.column), (3, 1));
        }

        #[test]
        fn tabs_land_after_a_multiple_of_width(column in 1usize..200, tab_width in 1usize..16) {
            let pos = SourcePos::new("", 0, 1, column).next('\t', tab_width);
            prop_assert!(pos.column > column);
            prop_assert_eq!((pos.column - 1) % tab_width, 0);
        }

        #[test]
        fn advance_never_moves_backwards(text in "[a-z\t\n ]{0,40}") {
            let start = SourcePos::init("p");
            let end = start.advance(text.chars(), 8);
            prop_assert_ne!(end.cmp_progress(&start), Ordering::Less);
            prop_assert_eq!(end.index, text.chars().count());
        }
    }
}
