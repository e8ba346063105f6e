//! Combinators derived from the primitives in [`crate::parser`].

use crate::error::{raise, Defect};
use crate::impls::SourcePos;
use crate::parser::{
    label, many, mplus, mzero, not_followed_by, option_maybe, skip_many, token_prim, Parser,
};
use crate::qo::qo;
use crate::state::{Config, Reply, State};
use crate::traits::Stream;

use core::fmt;
use std::sync::Arc;

/// A prefix or postfix operation produced by an operator parser.
pub type UnaryFn<A> = Arc<dyn Fn(A) -> A + Send + Sync>;

/// An infix operation produced by an operator parser.
pub type BinaryFn<A> = Arc<dyn Fn(A, A) -> A + Send + Sync>;

/// Tries each parser in turn, as a chain of [`mplus`].
pub fn choice<S, U, A>(parsers: Vec<Parser<S, U, A>>) -> Parser<S, U, A>
where
    S: 'static,
    U: 'static,
    A: 'static,
{
    parsers.into_iter().reduce(mplus).unwrap_or_else(mzero)
}

pub fn many1<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    let rest = many(parser.clone());
    qo(move |ctx| {
        let first = ctx.run(&parser)?;
        let mut values = ctx.run(&rest)?;
        values.insert(0, first);
        Ok(values)
    })
}

pub fn skip_many1<S, U, A>(parser: Parser<S, U, A>) -> Parser<S, U, ()>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    parser.clone().then(skip_many(parser))
}

/// Runs `open`, `parser` and `close`, keeping the value of `parser`.
pub fn between<S, U, O, C, A>(
    open: Parser<S, U, O>,
    close: Parser<S, U, C>,
    parser: Parser<S, U, A>,
) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    O: 'static,
    C: 'static,
    A: 'static,
{
    open.then(parser).skip(close)
}

/// Runs `parser` exactly `n` times.
pub fn count<S, U, A>(n: usize, parser: Parser<S, U, A>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    qo(move |ctx| {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(ctx.run(&parser)?);
        }
        Ok(values)
    })
}

pub fn sep_by1<S, U, A, B>(parser: Parser<S, U, A>, sep: Parser<S, U, B>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
{
    let rest = many(sep.then(parser.clone()));
    qo(move |ctx| {
        let first = ctx.run(&parser)?;
        let mut values = ctx.run(&rest)?;
        values.insert(0, first);
        Ok(values)
    })
}

pub fn sep_by<S, U, A, B>(parser: Parser<S, U, A>, sep: Parser<S, U, B>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
{
    option_maybe(sep_by1(parser, sep)).map(Option::unwrap_or_default)
}

/// One or more `parser`, each followed by `sep`.
pub fn end_by1<S, U, A, B>(parser: Parser<S, U, A>, sep: Parser<S, U, B>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
{
    many1(parser.skip(sep))
}

pub fn end_by<S, U, A, B>(parser: Parser<S, U, A>, sep: Parser<S, U, B>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    B: 'static,
{
    many(parser.skip(sep))
}

/// Runs `parser` until `end` succeeds, collecting the values of `parser`.
///
/// Panics with [`Defect::EmptyLoop`] if `parser` succeeds without consuming.
pub fn many_till<S, U, A, E>(parser: Parser<S, U, A>, end: Parser<S, U, E>) -> Parser<S, U, Vec<A>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    E: 'static,
{
    let body = Parser::new(move |state: &State<S, U>| match parser.run(state) {
        Reply::EmptyOk { .. } => raise(Defect::EmptyLoop),
        reply => reply,
    });
    let step = mplus(end.map(|_| None), body.map(Some));
    qo(move |ctx| {
        let mut values = Vec::new();
        while let Some(value) = ctx.run(&step)? {
            values.push(value);
        }
        Ok(values)
    })
}

fn operations<S, U, A, F>(
    operand: Parser<S, U, A>,
    op: Parser<S, U, F>,
) -> Parser<S, U, Vec<(F, A)>>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
    F: Clone + Send + Sync + 'static,
{
    many(op.and_then(move |f| operand.clone().map(move |x| (f.clone(), x))))
}

/// One or more `operand` separated by `op`, folded to the left.
pub fn chainl1<S, U, A>(operand: Parser<S, U, A>, op: Parser<S, U, BinaryFn<A>>) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    let rest = operations(operand.clone(), op);
    qo(move |ctx| {
        let first = ctx.run(&operand)?;
        let pairs = ctx.run(&rest)?;
        Ok(pairs.into_iter().fold(first, |acc, (f, x)| f(acc, x)))
    })
}

/// One or more `operand` separated by `op`, folded to the right.
pub fn chainr1<S, U, A>(operand: Parser<S, U, A>, op: Parser<S, U, BinaryFn<A>>) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    let rest = operations(operand.clone(), op);
    qo(move |ctx| {
        let first = ctx.run(&operand)?;
        let mut pairs = ctx.run(&rest)?;
        let (mut op, mut right) = match pairs.pop() {
            Some(last) => last,
            None => return Ok(first),
        };
        while let Some((f, x)) = pairs.pop() {
            right = op(x, right);
            op = f;
        }
        Ok(op(first, right))
    })
}

/// Accepts any element. The position is left unchanged.
pub fn any_token<S, U>() -> Parser<S, U, S::Item>
where
    S: Stream,
    S::Item: fmt::Debug,
    U: Clone + 'static,
{
    token_prim(
        |item: &S::Item, _: &Config| Some(item.clone()),
        |item: &S::Item| format!("{:?}", item),
        |pos: &SourcePos, _: &S::Item, _: &S, _: &Config| pos.clone(),
    )
}

/// Succeeds only at the end of input.
pub fn eof<S, U>() -> Parser<S, U, ()>
where
    S: Stream,
    S::Item: fmt::Debug,
    U: Clone + 'static,
{
    label(not_followed_by(any_token()), "end of input")
}
