//! The parser cell and the primitive combinators.
//!
//! Every combinator here is a function from a [`State`] to a [`Reply`]. The
//! rules for combining consumedness and errors live in this module and
//! nowhere else; derived combinators are built on top of these.

use crate::error::{raise, Defect, ErrorMessage, MessageKind, ParseError};
use crate::impls::SourcePos;
use crate::state::{Config, Reply, State};
use crate::traits::Stream;

use core::fmt;
use once_cell::sync::Lazy;
use std::sync::Arc;

type RunFn<S, U, A> = dyn Fn(&State<S, U>) -> Reply<S, U, A> + Send + Sync;
type Thunk<S, U, A> = Box<dyn FnOnce() -> Parser<S, U, A> + Send>;

enum Repr<S, U, A> {
    Strict(Arc<RunFn<S, U, A>>),
    Lazy(Arc<Lazy<Parser<S, U, A>, Thunk<S, U, A>>>),
}

/// A parser over stream `S` with user state `U`, producing `A`.
///
/// Parsers are built once and run many times. Cloning shares the
/// underlying function.
pub struct Parser<S, U, A>(Repr<S, U, A>);

impl<S, U, A> Clone for Parser<S, U, A> {
    fn clone(&self) -> Self {
        match &self.0 {
            Repr::Strict(run) => Parser(Repr::Strict(Arc::clone(run))),
            Repr::Lazy(cell) => Parser(Repr::Lazy(Arc::clone(cell))),
        }
    }
}

impl<S, U, A> fmt::Debug for Parser<S, U, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Strict(_) => f.write_str("Parser(strict)"),
            Repr::Lazy(cell) => match Lazy::get(cell) {
                Some(_) => f.write_str("Parser(lazy, forced)"),
                None => f.write_str("Parser(lazy)"),
            },
        }
    }
}

impl<S, U, A> Parser<S, U, A> {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&State<S, U>) -> Reply<S, U, A> + Send + Sync + 'static,
    {
        Parser(Repr::Strict(Arc::new(run)))
    }

    /// Defers building the parser until it first runs, which lets grammars
    /// refer to themselves. The thunk is evaluated exactly once.
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Parser<S, U, A> + Send + 'static,
    {
        let thunk: Thunk<S, U, A> = Box::new(move || {
            tracing::trace!("forcing lazy parser");
            thunk()
        });
        Parser(Repr::Lazy(Arc::new(Lazy::new(thunk))))
    }

    pub fn run(&self, state: &State<S, U>) -> Reply<S, U, A> {
        match &self.0 {
            Repr::Strict(run) => run(state),
            Repr::Lazy(cell) => Lazy::force(cell).run(state),
        }
    }
}

/// Succeeds with `value` without consuming.
pub fn pure<S, U, A>(value: A) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: Clone + Send + Sync + 'static,
{
    Parser::new(move |state| Reply::EmptyOk {
        value: value.clone(),
        state: state.clone(),
        error: state.unknown_error(),
    })
}

/// Runs `parser`, then the parser `f` builds from its value.
pub fn bind<S, U, A, B, F>(parser: Parser<S, U, A>, f: F) -> Parser<S, U, B>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
    F: Fn(A) -> Parser<S, U, B> + Send + Sync + 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::ConsumedOk {
            value,
            state,
            error,
        } => match f(value).run(&state) {
            Reply::EmptyOk {
                value,
                state,
                error: next,
            } => Reply::ConsumedOk {
                value,
                state,
                error: ParseError::merge(error, next),
            },
            Reply::EmptyErr { error: next } => Reply::ConsumedErr {
                error: ParseError::merge(error, next),
            },
            consumed => consumed,
        },
        Reply::EmptyOk {
            value,
            state,
            error,
        } => match f(value).run(&state) {
            Reply::EmptyOk {
                value,
                state,
                error: next,
            } => Reply::EmptyOk {
                value,
                state,
                error: ParseError::merge(error, next),
            },
            Reply::EmptyErr { error: next } => Reply::EmptyErr {
                error: ParseError::merge(error, next),
            },
            consumed => consumed,
        },
        Reply::ConsumedErr { error } => Reply::ConsumedErr { error },
        Reply::EmptyErr { error } => Reply::EmptyErr { error },
    })
}

/// Runs `first` then `second`, keeping the value of `second`.
pub fn then<S, U, A, B>(first: Parser<S, U, A>, second: Parser<S, U, B>) -> Parser<S, U, B>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
{
    bind(first, move |_| second.clone())
}

pub fn map<S, U, A, B, F>(parser: Parser<S, U, A>, f: F) -> Parser<S, U, B>
where
    S: 'static,
    U: 'static,
    A: 'static,
    B: 'static,
    F: Fn(A) -> B + Send + Sync + 'static,
{
    Parser::new(move |state| parser.run(state).map(&f))
}

/// Fails without consuming, with `message` as a free-text message.
pub fn fail<S, U, A>(message: impl Into<String>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    let message = message.into();
    Parser::new(move |state| Reply::EmptyErr {
        error: ParseError::new(state.pos.clone(), vec![ErrorMessage::message(message.clone())]),
    })
}

/// Fails without consuming, reporting `text` as unexpected.
pub fn unexpected<S, U, A>(text: impl Into<String>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    let text = text.into();
    Parser::new(move |state| Reply::EmptyErr {
        error: ParseError::new(state.pos.clone(), vec![ErrorMessage::unexpected(text.clone())]),
    })
}

/// Fails without consuming and without any message.
pub fn mzero<S, U, A>() -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    Parser::new(|state| Reply::EmptyErr {
        error: ParseError::unknown(state.pos.clone()),
    })
}

/// Tries `first`; only if it fails without consuming is `second` tried from
/// the same state.
pub fn mplus<S, U, A>(first: Parser<S, U, A>, second: Parser<S, U, A>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    Parser::new(move |state| match first.run(state) {
        Reply::EmptyErr { error } => match second.run(state) {
            Reply::EmptyOk {
                value,
                state,
                error: other,
            } => Reply::EmptyOk {
                value,
                state,
                error: ParseError::merge(error, other),
            },
            Reply::EmptyErr { error: other } => Reply::EmptyErr {
                error: ParseError::merge(error, other),
            },
            consumed => consumed,
        },
        reply => reply,
    })
}

/// Turns a consumed failure into an empty one so that alternatives are
/// still tried.
pub fn try_parse<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::ConsumedErr { error } => Reply::EmptyErr { error },
        reply => reply,
    })
}

/// Runs `parser` and, on success, rewinds to the original state.
pub fn look_ahead<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, A>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::ConsumedOk { value, .. } | Reply::EmptyOk { value, .. } => Reply::EmptyOk {
            value,
            state: state.clone(),
            error: state.unknown_error(),
        },
        reply => reply,
    })
}

/// Succeeds without consuming only when `parser` fails.
pub fn not_followed_by<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: fmt::Debug + Send + 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::ConsumedOk { value, error, .. } | Reply::EmptyOk { value, error, .. } => {
            let pos = state.pos.clone();
            Reply::EmptyErr {
                error: ParseError::lazy(move || {
                    let mut messages: Vec<ErrorMessage> = error
                        .messages()
                        .iter()
                        .filter(|message| message.kind == MessageKind::Message)
                        .cloned()
                        .collect();
                    messages.push(ErrorMessage::unexpected(format!("{:?}", value)));
                    ParseError::new(pos, messages)
                }),
            }
        }
        Reply::ConsumedErr { error } | Reply::EmptyErr { error } => Reply::EmptyOk {
            value: (),
            state: state.clone(),
            error,
        },
    })
}

/// Substitutes `default` when `parser` fails without consuming.
pub fn option<S, U, A>(default: A, parser: Parser<S, U, A>) -> Parser<S, U, A>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: Clone + Send + Sync + 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::EmptyErr { error } => Reply::EmptyOk {
            value: default.clone(),
            state: state.clone(),
            error,
        },
        reply => reply,
    })
}

pub fn option_maybe<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, Option<A>>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::EmptyErr { error } => Reply::EmptyOk {
            value: None,
            state: state.clone(),
            error,
        },
        reply => reply.map(Some),
    })
}

pub fn optional<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
{
    Parser::new(move |state| match parser.run(state) {
        Reply::EmptyErr { error } => Reply::EmptyOk {
            value: (),
            state: state.clone(),
            error,
        },
        reply => reply.map(|_| ()),
    })
}

/// Repeats `parser` while it consumes, folding the values into an
/// accumulator made by `init`.
///
/// Panics with [`Defect::EmptyLoop`] when `parser` succeeds without
/// consuming, since the loop would never end.
pub fn many_fold<S, U, A, B, I, F>(parser: Parser<S, U, A>, init: I, step: F) -> Parser<S, U, B>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
    I: Fn() -> B + Send + Sync + 'static,
    F: Fn(B, A) -> B + Send + Sync + 'static,
{
    Parser::new(move |state: &State<S, U>| {
        let mut accum = init();
        let mut current: Option<State<S, U>> = None;
        loop {
            match parser.run(current.as_ref().unwrap_or(state)) {
                Reply::ConsumedOk { value, state, .. } => {
                    accum = step(accum, value);
                    current = Some(state);
                }
                Reply::EmptyOk { .. } => raise(Defect::EmptyLoop),
                Reply::ConsumedErr { error } => return Reply::ConsumedErr { error },
                Reply::EmptyErr { error } => {
                    return match current {
                        Some(state) => Reply::ConsumedOk {
                            value: accum,
                            state,
                            error,
                        },
                        None => Reply::EmptyOk {
                            value: accum,
                            state: state.clone(),
                            error,
                        },
                    };
                }
            }
        }
    })
}

pub fn many<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, Vec<A>>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
{
    many_fold(parser, Vec::new, |mut values, value| {
        values.push(value);
        values
    })
}

pub fn skip_many<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
    A: 'static,
{
    many_fold(parser, || (), |_, _| ())
}

/// Consumes a single element.
///
/// `calc_value` accepts or rejects the element, `describe` renders a
/// rejected element for the error, and `next_pos` computes the position
/// after the element from the current position, the element, the rest of
/// the stream and the config.
pub fn token_prim<S, U, A, V, D, N>(calc_value: V, describe: D, next_pos: N) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    V: Fn(&S::Item, &Config) -> Option<A> + Send + Sync + 'static,
    D: Fn(&S::Item) -> String + Send + Sync + 'static,
    N: Fn(&SourcePos, &S::Item, &S, &Config) -> SourcePos + Send + Sync + 'static,
{
    let describe = Arc::new(describe);
    Parser::new(move |state: &State<S, U>| match state.input.uncons(&state.config) {
        None => Reply::EmptyErr {
            error: ParseError::new(
                state.pos.clone(),
                vec![ErrorMessage::system_unexpected("")],
            ),
        },
        Some((head, tail)) => match calc_value(&head, &state.config) {
            Some(value) => {
                let pos = next_pos(&state.pos, &head, &tail, &state.config);
                Reply::ConsumedOk {
                    value,
                    error: ParseError::unknown(pos.clone()),
                    state: State::new(state.config, tail, pos, state.user_state.clone()),
                }
            }
            None => {
                let describe = Arc::clone(&describe);
                let pos = state.pos.clone();
                Reply::EmptyErr {
                    error: ParseError::lazy(move || {
                        ParseError::new(pos, vec![ErrorMessage::system_unexpected(describe(&head))])
                    }),
                }
            }
        },
    })
}

/// Consumes a single element of a stream whose elements carry their own
/// positions. The position after an element is the position of the element
/// that follows it, or of the element itself at the end of input.
pub fn token<S, U, A, V, D, P>(calc_value: V, describe: D, token_pos: P) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    V: Fn(&S::Item, &Config) -> Option<A> + Send + Sync + 'static,
    D: Fn(&S::Item) -> String + Send + Sync + 'static,
    P: Fn(&S::Item) -> SourcePos + Send + Sync + 'static,
{
    token_prim(calc_value, describe, move |_, item, rest: &S, config| {
        match rest.uncons(config) {
            Some((next, _)) => token_pos(&next),
            None => token_pos(item),
        }
    })
}

/// Consumes exactly the elements of `expected`.
///
/// An empty `expected` succeeds without consuming. A mismatch on the first
/// element fails without consuming; a mismatch after that fails consumed.
/// Errors are reported at the starting position.
pub fn tokens<S, U, E, D, N>(expected: Vec<S::Item>, equals: E, show: D, next_pos: N) -> Parser<S, U, Vec<S::Item>>
where
    S: Stream,
    U: Clone + 'static,
    E: Fn(&S::Item, &S::Item) -> bool + Send + Sync + 'static,
    D: Fn(&[S::Item]) -> String + Send + Sync + 'static,
    N: Fn(&SourcePos, &[S::Item], &Config) -> SourcePos + Send + Sync + 'static,
{
    let expected: Arc<[S::Item]> = expected.into();
    let show = Arc::new(show);
    Parser::new(move |state: &State<S, U>| {
        if expected.is_empty() {
            return Reply::EmptyOk {
                value: Vec::new(),
                state: state.clone(),
                error: state.unknown_error(),
            };
        }
        let mismatch = |consumed: bool, found: Option<S::Item>| {
            let expected = Arc::clone(&expected);
            let show = Arc::clone(&show);
            let pos = state.pos.clone();
            Reply::err(
                consumed,
                ParseError::lazy(move || {
                    let found = match found {
                        Some(item) => show(core::slice::from_ref(&item)),
                        None => String::new(),
                    };
                    ParseError::new(
                        pos,
                        vec![
                            ErrorMessage::system_unexpected(found),
                            ErrorMessage::expected(show(&expected[..])),
                        ],
                    )
                }),
            )
        };
        let mut rest = state.input.clone();
        for (index, want) in expected.iter().enumerate() {
            match rest.uncons(&state.config) {
                None => return mismatch(index > 0, None),
                Some((got, tail)) if equals(want, &got) => rest = tail,
                Some((got, _)) => return mismatch(index > 0, Some(got)),
            }
        }
        let pos = next_pos(&state.pos, &expected[..], &state.config);
        Reply::ConsumedOk {
            value: expected.to_vec(),
            error: ParseError::unknown(pos.clone()),
            state: State::new(state.config, rest, pos, state.user_state.clone()),
        }
    })
}

/// Names what `parser` expects when it does not consume.
pub fn label<S, U, A>(parser: Parser<S, U, A>, text: impl Into<String>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    labels(parser, vec![text.into()])
}

/// Like [`label`], with several alternatives.
///
/// Consumed replies pass through. For empty replies the `Expected` messages
/// are replaced by `texts`; other messages are kept.
pub fn labels<S, U, A>(parser: Parser<S, U, A>, texts: Vec<String>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    let relabel = move |error: ParseError| {
        error.set_specific_type_messages(MessageKind::Expected, texts.clone())
    };
    Parser::new(move |state| match parser.run(state) {
        Reply::EmptyOk {
            value,
            state,
            error,
        } => Reply::EmptyOk {
            value,
            state,
            error: relabel(error),
        },
        Reply::EmptyErr { error } => Reply::EmptyErr {
            error: relabel(error),
        },
        reply => reply,
    })
}

/// Hides what `parser` expects from error messages.
pub fn hidden<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    label(parser, "")
}

fn update_parser_state<S, U, F>(f: F) -> Parser<S, U, State<S, U>>
where
    S: Clone + 'static,
    U: Clone + 'static,
    F: Fn(&State<S, U>) -> State<S, U> + Send + Sync + 'static,
{
    Parser::new(move |state: &State<S, U>| {
        let next = f(state);
        Reply::EmptyOk {
            value: next.clone(),
            error: next.unknown_error(),
            state: next,
        }
    })
}

pub fn get_parser_state<S, U>() -> Parser<S, U, State<S, U>>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    update_parser_state(State::clone)
}

pub fn set_parser_state<S, U>(state: State<S, U>) -> Parser<S, U, State<S, U>>
where
    S: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    update_parser_state(move |_| state.clone())
}

pub fn get_config<S, U>() -> Parser<S, U, Config>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(get_parser_state(), |state| state.config)
}

pub fn set_config<S, U>(config: Config) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(update_parser_state(move |state: &State<S, U>| state.set_config(config)), |_| ())
}

pub fn get_input<S, U>() -> Parser<S, U, S>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(get_parser_state(), |state| state.input)
}

pub fn set_input<S, U>(input: S) -> Parser<S, U, ()>
where
    S: Clone + Send + Sync + 'static,
    U: Clone + 'static,
{
    map(update_parser_state(move |state: &State<S, U>| state.set_input(input.clone())), |_| ())
}

pub fn get_position<S, U>() -> Parser<S, U, SourcePos>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(get_parser_state(), |state| state.pos)
}

pub fn set_position<S, U>(pos: SourcePos) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(update_parser_state(move |state: &State<S, U>| state.set_position(pos.clone())), |_| ())
}

pub fn get_state<S, U>() -> Parser<S, U, U>
where
    S: Clone + 'static,
    U: Clone + 'static,
{
    map(get_parser_state(), |state| state.user_state)
}

pub fn set_state<S, U>(user_state: U) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + Send + Sync + 'static,
{
    map(
        update_parser_state(move |state: &State<S, U>| state.set_user_state(user_state.clone())),
        |_| (),
    )
}

pub fn update_state<S, U, F>(f: F) -> Parser<S, U, ()>
where
    S: Clone + 'static,
    U: Clone + 'static,
    F: Fn(U) -> U + Send + Sync + 'static,
{
    map(
        update_parser_state(move |state: &State<S, U>| state.set_user_state(f(state.user_state.clone()))),
        |_| (),
    )
}

impl<S, U, A> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    pub fn and_then<B, F>(self, f: F) -> Parser<S, U, B>
    where
        B: 'static,
        F: Fn(A) -> Parser<S, U, B> + Send + Sync + 'static,
    {
        bind(self, f)
    }

    pub fn then<B: 'static>(self, next: Parser<S, U, B>) -> Parser<S, U, B> {
        then(self, next)
    }

    /// Runs `self` then `next`, keeping the value of `self`.
    pub fn skip<B: 'static>(self, next: Parser<S, U, B>) -> Parser<S, U, A> {
        crate::qo::qo(move |ctx| {
            let value = ctx.run(&self)?;
            ctx.run(&next)?;
            Ok(value)
        })
    }

    pub fn map<B, F>(self, f: F) -> Parser<S, U, B>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        map(self, f)
    }

    pub fn or(self, other: Parser<S, U, A>) -> Parser<S, U, A> {
        mplus(self, other)
    }

    pub fn try_parse(self) -> Parser<S, U, A> {
        try_parse(self)
    }

    pub fn look_ahead(self) -> Parser<S, U, A> {
        look_ahead(self)
    }

    pub fn label(self, text: impl Into<String>) -> Parser<S, U, A> {
        label(self, text)
    }

    pub fn labels(self, texts: Vec<String>) -> Parser<S, U, A> {
        labels(self, texts)
    }

    pub fn hidden(self) -> Parser<S, U, A> {
        hidden(self)
    }

    pub fn many(self) -> Parser<S, U, Vec<A>> {
        many(self)
    }

    pub fn skip_many(self) -> Parser<S, U, ()> {
        skip_many(self)
    }

    pub fn option_maybe(self) -> Parser<S, U, Option<A>> {
        option_maybe(self)
    }

    pub fn optional(self) -> Parser<S, U, ()> {
        optional(self)
    }
}

impl<S, U, A> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: Clone + Send + Sync + 'static,
{
    pub fn option(self, default: A) -> Parser<S, U, A> {
        option(default, self)
    }
}
