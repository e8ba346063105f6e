use crate::error::{raise, Defect, ParseError};
use crate::impls::SourcePos;

/// How input is decoded and how positions advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
    tab_width: usize,
    unicode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tab_width: 8,
            unicode: false,
        }
    }
}

impl Config {
    /// Panics with [`Defect::ZeroTabWidth`] when `tab_width` is zero.
    pub fn with_tab_width(self, tab_width: usize) -> Self {
        if tab_width == 0 {
            raise(Defect::ZeroTabWidth);
        }
        Self { tab_width, ..self }
    }

    /// Whether a UTF-16 surrogate pair is read as a single element.
    pub fn with_unicode(self, unicode: bool) -> Self {
        Self { unicode, ..self }
    }

    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    pub fn unicode(&self) -> bool {
        self.unicode
    }
}

/// Everything a parser sees at one step. States are never mutated; every
/// step that moves builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct State<S, U> {
    pub config: Config,
    pub input: S,
    pub pos: SourcePos,
    pub user_state: U,
}

impl<S, U> State<S, U> {
    pub fn new(config: Config, input: S, pos: SourcePos, user_state: U) -> Self {
        Self {
            config,
            input,
            pos,
            user_state,
        }
    }
}

impl<S: Clone, U: Clone> State<S, U> {
    pub fn set_config(&self, config: Config) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn set_input(&self, input: S) -> Self {
        Self {
            input,
            ..self.clone()
        }
    }

    pub fn set_position(&self, pos: SourcePos) -> Self {
        Self {
            pos,
            ..self.clone()
        }
    }

    pub fn set_user_state(&self, user_state: U) -> Self {
        Self {
            user_state,
            ..self.clone()
        }
    }

    /// An unknown error located at this state.
    pub fn unknown_error(&self) -> ParseError {
        ParseError::unknown(self.pos.clone())
    }
}

/// Outcome of running a parser: consumed or empty, success or failure.
///
/// `error` is kept on success too, so that the alternatives a successful
/// parser gave up on can still be reported if a later step fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<S, U, A> {
    ConsumedOk {
        value: A,
        state: State<S, U>,
        error: ParseError,
    },
    ConsumedErr {
        error: ParseError,
    },
    EmptyOk {
        value: A,
        state: State<S, U>,
        error: ParseError,
    },
    EmptyErr {
        error: ParseError,
    },
}

impl<S, U, A> Reply<S, U, A> {
    pub fn ok(consumed: bool, value: A, state: State<S, U>, error: ParseError) -> Self {
        if consumed {
            Reply::ConsumedOk {
                value,
                state,
                error,
            }
        } else {
            Reply::EmptyOk {
                value,
                state,
                error,
            }
        }
    }

    pub fn err(consumed: bool, error: ParseError) -> Self {
        if consumed {
            Reply::ConsumedErr { error }
        } else {
            Reply::EmptyErr { error }
        }
    }

    pub fn consumed(&self) -> bool {
        matches!(self, Reply::ConsumedOk { .. } | Reply::ConsumedErr { .. })
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Reply::ConsumedOk { .. } | Reply::EmptyOk { .. })
    }

    pub fn error(&self) -> &ParseError {
        match self {
            Reply::ConsumedOk { error, .. }
            | Reply::ConsumedErr { error }
            | Reply::EmptyOk { error, .. }
            | Reply::EmptyErr { error } => error,
        }
    }

    pub fn value(&self) -> Option<&A> {
        match self {
            Reply::ConsumedOk { value, .. } | Reply::EmptyOk { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn map<B, F: FnOnce(A) -> B>(self, f: F) -> Reply<S, U, B> {
        match self {
            Reply::ConsumedOk {
                value,
                state,
                error,
            } => Reply::ConsumedOk {
                value: f(value),
                state,
                error,
            },
            Reply::EmptyOk {
                value,
                state,
                error,
            } => Reply::EmptyOk {
                value: f(value),
                state,
                error,
            },
            Reply::ConsumedErr { error } => Reply::ConsumedErr { error },
            Reply::EmptyErr { error } => Reply::EmptyErr { error },
        }
    }

    pub fn into_result(self) -> Result<(A, State<S, U>), ParseError> {
        match self {
            Reply::ConsumedOk { value, state, .. } | Reply::EmptyOk { value, state, .. } => {
                Ok((value, state))
            }
            Reply::ConsumedErr { error } | Reply::EmptyErr { error } => Err(error),
        }
    }
}
