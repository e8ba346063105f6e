//! Parse errors and programming defects.
//!
//! A [`ParseError`] is either strict (already materialized) or lazy (a thunk
//! evaluated on first observation and cached). Combinators build and merge
//! errors on every step, most of which are thrown away unobserved, so the
//! expensive ones are deferred.

use crate::impls::SourcePos;

use core::fmt;
use once_cell::sync::Lazy;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Produced by token primitives. Empty text means end of input.
    SystemUnexpected,
    Unexpected,
    Expected,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl ErrorMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn system_unexpected(text: impl Into<String>) -> Self {
        Self::new(MessageKind::SystemUnexpected, text)
    }

    pub fn unexpected(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Unexpected, text)
    }

    pub fn expected(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Expected, text)
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Message, text)
    }
}

/// The materialized content of a [`ParseError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictError {
    pub pos: SourcePos,
    pub messages: Vec<ErrorMessage>,
}

type Thunk = Box<dyn FnOnce() -> Arc<StrictError> + Send>;

#[derive(Clone)]
enum Repr {
    Strict(Arc<StrictError>),
    Lazy(Arc<Lazy<Arc<StrictError>, Thunk>>),
}

/// A position plus the messages explaining why parsing failed there.
///
/// Cloning is cheap. Once a lazy error has been forced every clone observes
/// the same content.
#[derive(Clone)]
pub struct ParseError(Repr);

impl ParseError {
    pub fn new(pos: SourcePos, messages: Vec<ErrorMessage>) -> Self {
        Self(Repr::Strict(Arc::new(StrictError { pos, messages })))
    }

    /// An error without messages.
    pub fn unknown(pos: SourcePos) -> Self {
        Self::new(pos, Vec::new())
    }

    /// Defers building the error until it is observed. The thunk runs at
    /// most once, even when several threads observe the error together.
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: FnOnce() -> ParseError + Send + 'static,
    {
        let thunk: Thunk = Box::new(move || thunk().shared());
        Self(Repr::Lazy(Arc::new(Lazy::new(thunk))))
    }

    fn shared(&self) -> Arc<StrictError> {
        match &self.0 {
            Repr::Strict(error) => Arc::clone(error),
            Repr::Lazy(cell) => Arc::clone(Lazy::force(cell)),
        }
    }

    /// Materializes the error, running the deferred thunk if needed.
    pub fn force(&self) -> &StrictError {
        match &self.0 {
            Repr::Strict(error) => &**error,
            Repr::Lazy(cell) => &**Lazy::force(cell),
        }
    }

    pub fn is_forced(&self) -> bool {
        match &self.0 {
            Repr::Strict(_) => true,
            Repr::Lazy(cell) => Lazy::get(cell).is_some(),
        }
    }

    pub fn pos(&self) -> &SourcePos {
        &self.force().pos
    }

    pub fn messages(&self) -> &[ErrorMessage] {
        &self.force().messages
    }

    pub fn is_unknown(&self) -> bool {
        self.messages().is_empty()
    }

    /// Applies `f` to the materialized error, now if it is already forced,
    /// otherwise when the result is first observed.
    fn derive<F>(&self, f: F) -> ParseError
    where
        F: FnOnce(&StrictError) -> ParseError + Send + 'static,
    {
        if self.is_forced() {
            f(self.force())
        } else {
            let this = self.clone();
            ParseError::lazy(move || f(this.force()))
        }
    }

    pub fn set_position(&self, pos: SourcePos) -> ParseError {
        self.derive(move |error| ParseError::new(pos, error.messages.clone()))
    }

    pub fn set_messages(&self, messages: Vec<ErrorMessage>) -> ParseError {
        self.derive(move |error| ParseError::new(error.pos.clone(), messages))
    }

    pub fn add_messages(&self, messages: Vec<ErrorMessage>) -> ParseError {
        self.derive(move |error| {
            let mut all = error.messages.clone();
            all.extend(messages);
            ParseError::new(error.pos.clone(), all)
        })
    }

    /// Drops every message of `kind` and appends one message of that kind
    /// per entry of `texts`.
    pub fn set_specific_type_messages(&self, kind: MessageKind, texts: Vec<String>) -> ParseError {
        self.derive(move |error| {
            let mut messages: Vec<ErrorMessage> = error
                .messages
                .iter()
                .filter(|message| message.kind != kind)
                .cloned()
                .collect();
            messages.extend(texts.into_iter().map(|text| ErrorMessage::new(kind, text)));
            ParseError::new(error.pos.clone(), messages)
        })
    }

    /// Combines the errors of two branches tried at the same state.
    ///
    /// An unknown error yields to the other one; equal positions concatenate
    /// the messages; otherwise the error further into the input wins.
    pub fn merge(a: ParseError, b: ParseError) -> ParseError {
        if a.is_forced() && a.is_unknown() {
            return b;
        }
        if b.is_forced() && b.is_unknown() {
            return a;
        }
        if a.is_forced() && b.is_forced() {
            Self::merge_forced(&a, &b)
        } else {
            ParseError::lazy(move || Self::merge_forced(&a, &b))
        }
    }

    /// Merges `first` with each of `rest` from left to right, as repeated
    /// [`merge`](Self::merge) would, but behind at most one lazy cell.
    pub fn merge_all(first: ParseError, rest: Vec<ParseError>) -> ParseError {
        if rest.is_empty() {
            return first;
        }
        if first.is_forced() && rest.iter().all(ParseError::is_forced) {
            Self::merge_all_forced(&first, &rest)
        } else {
            ParseError::lazy(move || Self::merge_all_forced(&first, &rest))
        }
    }

    fn merge_all_forced(first: &ParseError, rest: &[ParseError]) -> ParseError {
        let mut best = first.clone();
        let mut extra: Vec<ErrorMessage> = Vec::new();
        for error in rest {
            if error.is_unknown() {
                continue;
            }
            if best.is_unknown() {
                best = error.clone();
                continue;
            }
            match best.pos().cmp_progress(error.pos()) {
                core::cmp::Ordering::Equal => extra.extend_from_slice(error.messages()),
                core::cmp::Ordering::Greater => {}
                core::cmp::Ordering::Less => {
                    best = error.clone();
                    extra.clear();
                }
            }
        }
        if extra.is_empty() {
            return best;
        }
        let mut messages = best.messages().to_vec();
        messages.extend(extra);
        ParseError::new(best.pos().clone(), messages)
    }

    fn merge_forced(a: &ParseError, b: &ParseError) -> ParseError {
        if a.is_unknown() {
            return b.clone();
        }
        if b.is_unknown() {
            return a.clone();
        }
        match a.pos().cmp_progress(b.pos()) {
            core::cmp::Ordering::Equal => {
                let mut messages = a.messages().to_vec();
                messages.extend_from_slice(b.messages());
                ParseError::new(a.pos().clone(), messages)
            }
            core::cmp::Ordering::Greater => a.clone(),
            core::cmp::Ordering::Less => b.clone(),
        }
    }

    /// The message part of the rendered error, without the position.
    pub fn render_messages(&self) -> String {
        render_messages(self.messages())
    }
}

fn texts_of(messages: &[ErrorMessage], kind: MessageKind) -> Vec<&str> {
    let mut texts: Vec<&str> = Vec::new();
    for message in messages.iter().filter(|message| message.kind == kind) {
        if !message.text.is_empty() && !texts.contains(&message.text.as_str()) {
            texts.push(&message.text);
        }
    }
    texts
}

fn comma_or(texts: &[&str]) -> String {
    match texts.split_last() {
        None => String::new(),
        Some((last, [])) => (*last).to_string(),
        Some((last, init)) => format!("{} or {}", init.join(", "), last),
    }
}

fn render_messages(messages: &[ErrorMessage]) -> String {
    let mut lines = Vec::new();

    let unexpected = texts_of(messages, MessageKind::Unexpected);
    if !unexpected.is_empty() {
        lines.push(format!("unexpected {}", comma_or(&unexpected)));
    } else if let Some(system) = messages
        .iter()
        .find(|message| message.kind == MessageKind::SystemUnexpected)
    {
        if system.text.is_empty() {
            lines.push("unexpected end of input".to_string());
        } else {
            lines.push(format!("unexpected {}", system.text));
        }
    }

    let expected = texts_of(messages, MessageKind::Expected);
    if !expected.is_empty() {
        lines.push(format!("expecting {}", comma_or(&expected)));
    }

    let free = texts_of(messages, MessageKind::Message);
    if !free.is_empty() {
        lines.push(comma_or(&free));
    }

    if lines.is_empty() {
        "unknown parse error".to_string()
    } else {
        lines.join("\n")
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\n{}", self.pos(), self.render_messages())
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseError")
            .field("pos", self.pos())
            .field("messages", &self.messages())
            .finish()
    }
}

impl PartialEq for ParseError {
    fn eq(&self, other: &Self) -> bool {
        self.force() == other.force()
    }
}

impl Eq for ParseError {}

impl std::error::Error for ParseError {}

impl From<StrictError> for ParseError {
    fn from(error: StrictError) -> Self {
        Self(Repr::Strict(Arc::new(error)))
    }
}

/// Misuse of the library. Defects are raised as panics and never flow
/// through replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    #[error("combinator `many` is applied to a parser that accepts an empty string")]
    EmptyLoop,
    #[error("tab width must be greater than zero")]
    ZeroTabWidth,
}

pub(crate) fn raise(defect: Defect) -> ! {
    tracing::error!(%defect, "parser defect");
    panic!("{}", defect)
}
