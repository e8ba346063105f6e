//! Operator-precedence expression parsers.

use quince_parser::combinators::{chainl1, chainr1, choice, BinaryFn, UnaryFn};
use quince_parser::parser::{fail, hidden, label, look_ahead, many, option_maybe, try_parse, Parser};
use quince_parser::qo::qo;
use quince_parser::traits::Stream;

use core::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assoc {
    None,
    Left,
    Right,
}

/// One entry of an operator table. The parser recognises the operator and
/// yields the function that applies it.
pub enum Operator<S, U, A> {
    Prefix(Parser<S, U, UnaryFn<A>>),
    Postfix(Parser<S, U, UnaryFn<A>>),
    Infix(Parser<S, U, BinaryFn<A>>, Assoc),
}

impl<S, U, A> Clone for Operator<S, U, A> {
    fn clone(&self) -> Self {
        match self {
            Operator::Prefix(p) => Operator::Prefix(p.clone()),
            Operator::Postfix(p) => Operator::Postfix(p.clone()),
            Operator::Infix(p, assoc) => Operator::Infix(p.clone(), *assoc),
        }
    }
}

impl<S, U, A> fmt::Debug for Operator<S, U, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Prefix(_) => f.write_str("Prefix"),
            Operator::Postfix(_) => f.write_str("Postfix"),
            Operator::Infix(_, assoc) => write!(f, "Infix({:?})", assoc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorTableError {
    #[error("precedence level {level} mixes {first:?} and {second:?} associative infix operators")]
    MixedAssociativity {
        level: usize,
        first: Assoc,
        second: Assoc,
    },
}

/// Builds a parser for expressions over `term`.
///
/// `table` lists precedence levels from the tightest binding to the
/// loosest. Within a level, prefix operators apply before postfix ones, and
/// all infix operators must share one associativity. A non-associative
/// operator may appear at most once in a row: `a = b = c` is rejected.
pub fn build_expression_parser<S, U, A>(
    table: Vec<Vec<Operator<S, U, A>>>,
    term: Parser<S, U, A>,
) -> Result<Parser<S, U, A>, OperatorTableError>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    table
        .into_iter()
        .enumerate()
        .try_fold(term, |inner, (level, operators)| make_level(level, operators, inner))
}

fn make_level<S, U, A>(
    level: usize,
    operators: Vec<Operator<S, U, A>>,
    inner: Parser<S, U, A>,
) -> Result<Parser<S, U, A>, OperatorTableError>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    let mut prefix = Vec::new();
    let mut postfix = Vec::new();
    let mut infix = Vec::new();
    let mut assoc = None;
    for operator in operators {
        match operator {
            Operator::Prefix(p) => prefix.push(p),
            Operator::Postfix(p) => postfix.push(p),
            Operator::Infix(p, second) => {
                match assoc {
                    Some(first) if first != second => {
                        return Err(OperatorTableError::MixedAssociativity {
                            level,
                            first,
                            second,
                        })
                    }
                    _ => assoc = Some(second),
                }
                infix.push(p);
            }
        }
    }

    let factor = make_factor(prefix, postfix, inner);
    let parser = match assoc {
        None => factor,
        Some(assoc) => {
            let op = label(choice(infix), "operator");
            match assoc {
                Assoc::Left => chainl1(factor, op),
                Assoc::Right => chainr1(factor, op),
                Assoc::None => non_associative(factor, op),
            }
        }
    };
    tracing::trace!(level, "built precedence level");
    Ok(parser)
}

/// Prefix operators, then `inner`, then postfix operators. Prefixes apply
/// from the one nearest the operand outwards; postfixes in reading order.
fn make_factor<S, U, A>(
    prefix: Vec<Parser<S, U, UnaryFn<A>>>,
    postfix: Vec<Parser<S, U, UnaryFn<A>>>,
    inner: Parser<S, U, A>,
) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    if prefix.is_empty() && postfix.is_empty() {
        return inner;
    }
    let prefix = many(hidden(choice(prefix)));
    let postfix = many(hidden(choice(postfix)));
    qo(move |ctx| {
        let before = ctx.run(&prefix)?;
        let value = ctx.run(&inner)?;
        let after = ctx.run(&postfix)?;
        let value = before.iter().rev().fold(value, |acc, f| f(acc));
        Ok(after.iter().fold(value, |acc, f| f(acc)))
    })
}

fn non_associative<S, U, A>(factor: Parser<S, U, A>, op: Parser<S, U, BinaryFn<A>>) -> Parser<S, U, A>
where
    S: Stream,
    U: Clone + 'static,
    A: 'static,
{
    let operand = factor.clone();
    let rest = option_maybe(op.clone().and_then(move |f| {
        operand.clone().map(move |y| (f.clone(), y))
    }));
    let again = option_maybe(look_ahead(try_parse(op)));
    qo(move |ctx| {
        let x = ctx.run(&factor)?;
        let (f, y) = match ctx.run(&rest)? {
            Some(pair) => pair,
            None => return Ok(x),
        };
        if ctx.run(&again)?.is_some() {
            return Err(ctx.exit(&fail("ambiguous use of a non-associative operator")));
        }
        Ok(f(x, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use quince_parser::chars::{char, digit, spaces};
    use quince_parser::combinators::{between, eof, many1};
    use quince_parser::impls::CharStream;
    use rstest::rstest;
    use std::sync::Arc;

    type P<A> = Parser<CharStream, (), A>;

    fn lexeme<A: 'static>(p: P<A>) -> P<A> {
        p.skip(spaces().hidden())
    }

    fn symbol(c: char) -> P<char> {
        lexeme(char(c))
    }

    fn integer() -> P<i64> {
        lexeme(many1(digit()).map(|ds| ds.into_iter().collect::<String>().parse::<i64>().unwrap()))
    }

    fn binary(c: char, f: fn(i64, i64) -> i64, assoc: Assoc) -> Operator<CharStream, (), i64> {
        Operator::Infix(symbol(c).map(move |_| -> BinaryFn<i64> { Arc::new(f) }), assoc)
    }

    fn prefix(c: char, f: fn(i64) -> i64) -> Operator<CharStream, (), i64> {
        Operator::Prefix(symbol(c).map(move |_| -> UnaryFn<i64> { Arc::new(f) }))
    }

    fn postfix(c: char, f: fn(i64) -> i64) -> Operator<CharStream, (), i64> {
        Operator::Postfix(symbol(c).map(move |_| -> UnaryFn<i64> { Arc::new(f) }))
    }

    fn arithmetic() -> P<i64> {
        let table = vec![
            vec![binary('*', |a, b| a * b, Assoc::Left), binary('/', |a, b| a / b, Assoc::Left)],
            vec![binary('+', |a, b| a + b, Assoc::Left), binary('-', |a, b| a - b, Assoc::Left)],
        ];
        let term = integer().or(between(symbol('('), symbol(')'), Parser::lazy(arithmetic)));
        build_expression_parser(table, term).unwrap()
    }

    fn run(p: &P<i64>, input: &str) -> Result<i64, quince_parser::error::ParseError> {
        parse(&spaces().then(p.clone()).skip(eof()), "expr", input, ())
    }

    #[rstest]
    #[case("2+3*4", 14)]
    #[case("2*3+4", 10)]
    #[case("10-4-3", 3)]
    #[case("100/10/5", 2)]
    #[case(" (2 + 3) * 4 ", 20)]
    #[case("((7))", 7)]
    fn arithmetic_respects_precedence(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(run(&arithmetic(), input), Ok(expected));
    }

    #[test]
    fn right_associative_levels_fold_right() {
        let table = vec![vec![binary('^', |a, b| a.pow(b as u32), Assoc::Right)]];
        let p = build_expression_parser(table, integer()).unwrap();
        assert_eq!(run(&p, "2^3^2"), Ok(512));
    }

    #[test]
    fn non_associative_operator_applies_once() {
        let table = vec![
            vec![binary('+', |a, b| a + b, Assoc::Left)],
            vec![binary('=', |a, b| (a == b) as i64, Assoc::None)],
        ];
        let p = build_expression_parser(table, integer()).unwrap();
        assert_eq!(run(&p, "1+1=2"), Ok(1));
        assert_eq!(run(&p, "3"), Ok(3));

        let error = run(&p, "1=2=3").unwrap_err();
        assert_eq!(error.pos().column, 4);
        assert!(error
            .render_messages()
            .contains("ambiguous use of a non-associative operator"));
    }

    #[test]
    fn mixed_associativity_is_rejected() {
        let table = vec![
            vec![binary('*', |a, b| a * b, Assoc::Left)],
            vec![binary('+', |a, b| a + b, Assoc::Left), binary('-', |a, b| a - b, Assoc::Right)],
        ];
        let error = build_expression_parser(table, integer()).unwrap_err();
        assert_eq!(
            error,
            OperatorTableError::MixedAssociativity {
                level: 1,
                first: Assoc::Left,
                second: Assoc::Right,
            }
        );
        assert_eq!(
            error.to_string(),
            "precedence level 1 mixes Left and Right associative infix operators"
        );
    }

    #[test]
    fn prefix_and_postfix_wrap_the_term() {
        let table = vec![
            vec![prefix('-', |x| -x), prefix('~', |x| x + 1), postfix('!', |x| x + 1), postfix('?', |x| x * 2)],
            vec![binary('+', |a, b| a + b, Assoc::Left)],
        ];
        let p = build_expression_parser(table, integer()).unwrap();
        assert_eq!(run(&p, "-~3"), Ok(-4));
        assert_eq!(run(&p, "~-3"), Ok(-2));
        assert_eq!(run(&p, "3!?"), Ok(8));
        assert_eq!(run(&p, "-3! + 1"), Ok(-1));
    }

    #[test]
    fn empty_table_is_the_term() {
        let p = build_expression_parser(Vec::new(), integer()).unwrap();
        assert_eq!(run(&p, "42"), Ok(42));
    }

    #[test]
    fn failures_name_operators_and_terms() {
        let error = run(&arithmetic(), "2+").unwrap_err();
        assert_eq!(error.to_string(), "\"expr\"(line 1, column 3):\nunexpected end of input\nexpecting digit or '('");

        let error = run(&arithmetic(), "2 3").unwrap_err();
        assert_eq!(error.pos().column, 3);
        assert!(error.render_messages().contains("expecting"));
        assert!(error.render_messages().contains("operator"));
    }

    fn float() -> Parser<CharStream, (), f64> {
        let digits = || many1(digit()).map(|ds| ds.into_iter().collect::<String>());
        let fraction = char('.').then(digits()).option_maybe();
        lexeme(digits().and_then(move |whole| {
            fraction.clone().map(move |frac| match frac {
                Some(frac) => format!("{}.{}", whole, frac).parse::<f64>().unwrap(),
                None => whole.parse::<f64>().unwrap(),
            })
        }))
    }

    fn float_op(c: char, f: fn(f64, f64) -> f64) -> Operator<CharStream, (), f64> {
        Operator::Infix(symbol(c).map(move |_| -> BinaryFn<f64> { Arc::new(f) }), Assoc::Left)
    }

    #[rstest]
    #[case("1.5 * 2.5", 3.75)]
    #[case("7 / 2 - 0.25", 3.25)]
    #[case("0.1 + 0.2", 0.3)]
    fn float_calculator(#[case] input: &str, #[case] expected: f64) {
        let table = vec![
            vec![float_op('*', |a, b| a * b), float_op('/', |a, b| a / b)],
            vec![float_op('+', |a, b| a + b), float_op('-', |a, b| a - b)],
        ];
        let p = build_expression_parser(table, float()).unwrap();
        let value = parse(&p.skip(eof()), "calc", input, ()).unwrap();
        assert_float_absolute_eq!(value, expected, 1e-12);
    }
}
