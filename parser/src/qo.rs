//! Do-notation: write a sequence of parsers as straight-line code.
//!
//! ```ignore
//! let pair = qo(move |ctx| {
//!     let key = ctx.run(&ident)?;
//!     ctx.run(&colon)?;
//!     let value = ctx.run(&number)?;
//!     Ok((key, value))
//! });
//! ```
//!
//! Each `ctx.run` threads the state exactly as a chain of `bind`s would.
//! A failing step returns a [`Halt`] that `?` carries out of the block.

use crate::error::ParseError;
use crate::parser::Parser;
use crate::state::{Reply, State};
use crate::traits::Stream;

use core::fmt;

/// The state threaded through a do-block: the current parser state, the
/// error accumulated so far and whether any step consumed input.
///
/// Errors of empty steps are queued after the error of the last consumed
/// step and merged in one go, so long blocks never nest lazy errors.
pub struct Qo<S, U, A> {
    state: State<S, U>,
    error: ParseError,
    pending: Vec<ParseError>,
    consumed: bool,
    _output: core::marker::PhantomData<fn() -> A>,
}

/// Ends a do-block early with the enclosed reply.
pub struct Halt<S, U, A>(Reply<S, U, A>);

impl<S: fmt::Debug, U: fmt::Debug, A: fmt::Debug> fmt::Debug for Halt<S, U, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Halt").field(&self.0).finish()
    }
}

impl<S, U, A> Qo<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    fn start(state: &State<S, U>) -> Self {
        Qo {
            state: state.clone(),
            error: state.unknown_error(),
            pending: Vec::new(),
            consumed: false,
            _output: core::marker::PhantomData,
        }
    }

    /// Runs `parser` at the current state and returns its value.
    ///
    /// A consumed step replaces the accumulated error; an empty step merges
    /// into it. A consumed failure halts with that failure as is; an empty
    /// failure halts with the merged error, consumed if any earlier step
    /// consumed.
    pub fn run<B>(&mut self, parser: &Parser<S, U, B>) -> Result<B, Halt<S, U, A>> {
        match parser.run(&self.state) {
            Reply::ConsumedOk {
                value,
                state,
                error,
            } => {
                self.consumed = true;
                self.state = state;
                self.error = error;
                self.pending.clear();
                Ok(value)
            }
            Reply::EmptyOk {
                value,
                state,
                error,
            } => {
                self.state = state;
                if !(error.is_forced() && error.is_unknown()) {
                    self.pending.push(error);
                }
                Ok(value)
            }
            Reply::ConsumedErr { error } => Err(Halt(Reply::ConsumedErr { error })),
            Reply::EmptyErr { error } => Err(Halt(Reply::err(self.consumed, self.merged(error)))),
        }
    }

    /// Abandons the rest of the block and finishes with the outcome of
    /// `parser` run at the current state, folded in like a final step.
    pub fn exit(&mut self, parser: &Parser<S, U, A>) -> Halt<S, U, A> {
        Halt(match parser.run(&self.state) {
            Reply::EmptyOk { value, state, error } => {
                Reply::ok(self.consumed, value, state, self.merged(error))
            }
            Reply::EmptyErr { error } => Reply::err(self.consumed, self.merged(error)),
            consumed => consumed,
        })
    }

    pub fn state(&self) -> &State<S, U> {
        &self.state
    }

    pub fn has_consumed(&self) -> bool {
        self.consumed
    }

    fn merged(&self, error: ParseError) -> ParseError {
        let mut rest = self.pending.clone();
        rest.push(error);
        ParseError::merge_all(self.error.clone(), rest)
    }

    fn finish(self, value: A) -> Reply<S, U, A> {
        let error = ParseError::merge_all(self.error, self.pending);
        Reply::ok(self.consumed, value, self.state, error)
    }
}

/// Builds a parser from a block that runs other parsers through [`Qo`].
///
/// The block runs once per parse; it must not keep state between runs.
pub fn qo<S, U, A, F>(block: F) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    F: Fn(&mut Qo<S, U, A>) -> Result<A, Halt<S, U, A>> + Send + Sync + 'static,
{
    Parser::new(move |state: &State<S, U>| {
        let mut ctx = Qo::start(state);
        match block(&mut ctx) {
            Ok(value) => ctx.finish(value),
            Err(Halt(reply)) => reply,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::count;
    use crate::error::ErrorMessage;
    use crate::impls::{CharStream, SourcePos};
    use crate::parser::tests::{ch, state_of};
    use crate::parser::{fail, option_maybe, pure};

    fn pos_at(index: usize) -> SourcePos {
        SourcePos::new("test", index, 1, index + 1)
    }

    #[test]
    fn empty_steps_give_an_empty_success() {
        let p: Parser<CharStream, (), &str> = qo(|ctx| {
            ctx.run(&pure(1))?;
            ctx.run(&pure(2))?;
            ctx.run(&pure(3))?;
            Ok("done")
        });
        let reply = p.run(&state_of("abc"));
        assert_eq!(
            reply,
            Reply::EmptyOk {
                value: "done",
                state: state_of("abc"),
                error: ParseError::unknown(pos_at(0)),
            }
        );
        assert!(reply.error().is_unknown());
    }

    #[test]
    fn values_flow_between_steps() {
        let a = ch('a');
        let b = ch('b');
        let p = qo(move |ctx| {
            let x = ctx.run(&a)?;
            let y = ctx.run(&b)?;
            Ok(format!("{}{}", x, y))
        });
        let reply = p.run(&state_of("abc"));
        assert!(reply.consumed());
        let (value, state) = reply.into_result().unwrap();
        assert_eq!(value, "ab");
        assert_eq!(state.input.as_str(), "c");
    }

    #[test]
    fn consumed_failure_halts_at_once() {
        let ab = ch('a').then(ch('b'));
        let p: Parser<CharStream, (), ()> = qo(move |ctx| {
            ctx.run(&ab)?;
            panic!("block must stop at the failing step");
        });
        let reply = p.run(&state_of("ac"));
        assert_eq!(
            reply,
            Reply::ConsumedErr {
                error: ParseError::new(pos_at(1), vec![ErrorMessage::system_unexpected("'c'")]),
            }
        );
    }

    #[test]
    fn empty_failure_after_consumption_is_consumed() {
        let a = ch('a');
        let maybe_x = option_maybe(ch('x'));
        let y = ch('y');
        let p = qo(move |ctx| {
            ctx.run(&a)?;
            ctx.run(&maybe_x)?;
            ctx.run(&y)
        });
        let reply = p.run(&state_of("az"));
        assert_eq!(
            reply,
            Reply::ConsumedErr {
                error: ParseError::new(
                    pos_at(1),
                    vec![
                        ErrorMessage::system_unexpected("'z'"),
                        ErrorMessage::system_unexpected("'z'"),
                    ]
                ),
            }
        );
    }

    #[test]
    fn empty_failure_without_consumption_is_empty() {
        let y = ch('y');
        let p = qo(move |ctx| ctx.run(&y));
        let reply = p.run(&state_of("z"));
        assert!(!reply.consumed() && !reply.succeeded());
    }

    #[test]
    fn exit_finishes_with_the_substitute_outcome() {
        let a = ch('a');
        let b = ch('b');
        let p = qo(move |ctx| {
            let first = ctx.run(&a)?;
            if ctx.has_consumed() {
                return Err(ctx.exit(&b));
            }
            Ok(first)
        });
        let reply = p.run(&state_of("ab"));
        assert!(reply.consumed());
        assert_eq!(reply.value(), Some(&'b'));

        let reply = p.run(&state_of("ax"));
        assert!(reply.consumed() && !reply.succeeded());
    }

    #[test]
    fn exit_with_a_failure_reports_consumedness_of_the_block() {
        let a = ch('a');
        let p: Parser<CharStream, (), char> = qo(move |ctx| {
            ctx.run(&a)?;
            Err(ctx.exit(&fail("stop here")))
        });
        let reply = p.run(&state_of("ab"));
        assert_eq!(
            reply,
            Reply::ConsumedErr {
                error: ParseError::new(pos_at(1), vec![ErrorMessage::message("stop here")]),
            }
        );

        let p: Parser<CharStream, (), char> = qo(|ctx| Err(ctx.exit(&fail("stop here"))));
        let reply = p.run(&state_of("ab"));
        assert!(!reply.consumed() && !reply.succeeded());
    }

    #[test]
    fn state_is_visible_inside_the_block() {
        let a = ch('a');
        let p = qo(move |ctx| {
            let before = ctx.state().pos.clone();
            ctx.run(&a)?;
            Ok((before, ctx.state().pos.clone()))
        });
        assert_eq!(p.run(&state_of("ab")).value(), Some(&(pos_at(0), pos_at(1))));
    }

    #[test]
    fn long_runs_of_empty_steps_merge_their_errors() {
        let p = count(5_000, option_maybe(ch('x')));
        let reply = p.run(&state_of("y"));
        assert!(reply.succeeded() && !reply.consumed());
        let messages = reply.error().messages();
        assert_eq!(messages.len(), 5_000);
        assert!(messages.iter().all(|m| m == &ErrorMessage::system_unexpected("'y'")));
    }

    #[test]
    #[should_panic(expected = "genuine")]
    fn other_panics_propagate() {
        let p: Parser<CharStream, (), ()> = qo(|_| panic!("genuine defect"));
        let _ = p.run(&state_of(""));
    }
}
