use quince_parser::error::ParseError;
use quince_parser::impls::SourcePos;
use quince_parser::parser::Parser;
use quince_parser::state::{Config, State};
use quince_parser::traits::Stream;

/// Runs `parser` over `input` from line 1, column 1 of `name`, with the
/// default [`Config`].
pub fn parse<S, U, A>(
    parser: &Parser<S, U, A>,
    name: &str,
    input: impl Into<S>,
    user_state: U,
) -> Result<A, ParseError>
where
    S: Stream,
    U: Clone + 'static,
{
    parse_with_config(parser, name, input, user_state, Config::default())
}

pub fn parse_with_config<S, U, A>(
    parser: &Parser<S, U, A>,
    name: &str,
    input: impl Into<S>,
    user_state: U,
    config: Config,
) -> Result<A, ParseError>
where
    S: Stream,
    U: Clone + 'static,
{
    let state = State::new(config, input.into(), SourcePos::init(name), user_state);
    match parser.run(&state).into_result() {
        Ok((value, state)) => {
            tracing::debug!(source = name, line = state.pos.line, column = state.pos.column, "parse succeeded");
            Ok(value)
        }
        Err(error) => {
            tracing::debug!(source = name, position = %error.pos(), "parse failed");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quince_parser::chars::{char, letter, string};
    use quince_parser::combinators::eof;
    use quince_parser::impls::{CharStream, TokenStream, Utf16Item, Utf16Stream};
    use quince_parser::parser::{get_position, get_state, token_prim, update_state};

    crate::char_classes! {
        sign("sign") => '+' | '-';
        octal("octal digit") => '0' ..= '7';
    }

    #[test]
    fn it_parses_with_declared_classes() {
        let p: Parser<CharStream, (), (char, Vec<char>)> = sign().and_then(|s| {
            octal().many().map(move |ds| (s, ds))
        });
        assert_eq!(parse(&p, "octal", "-17", ()), Ok(('-', vec!['1', '7'])));
        assert!(is_octal('7') && !is_octal('8'));
        let error = parse(&p, "octal", "17", ()).unwrap_err();
        assert_eq!(error.render_messages(), "unexpected '1'\nexpecting sign");
    }

    #[test]
    fn it_reports_values_and_errors() {
        let p: Parser<CharStream, (), String> = string("hello").skip(eof());
        assert_eq!(parse(&p, "greeting", "hello", ()), Ok("hello".to_string()));

        let error = parse(&p, "greeting", "hello!", ()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "\"greeting\"(line 1, column 6):\nunexpected '!'\nexpecting end of input"
        );
    }

    #[test]
    fn it_threads_user_state() {
        let counted = letter::<CharStream, usize>()
            .skip(update_state(|n: usize| n + 1))
            .many()
            .then(get_state());
        assert_eq!(parse(&counted, "count", "abc", 10), Ok(13));
    }

    #[test]
    fn it_applies_the_config() {
        let p: Parser<CharStream, (), _> = char('\t').then(get_position());
        let pos = parse_with_config(&p, "tabs", "\t", (), Config::default().with_tab_width(4)).unwrap();
        assert_eq!(pos.column, 5);
        let pos = parse(&p, "tabs", "\t", ()).unwrap();
        assert_eq!(pos.column, 9);
    }

    #[test]
    fn unicode_flag_joins_surrogate_pairs() {
        let unit = || -> Parser<Utf16Stream, (), Utf16Item> {
            token_prim(
                |item: &Utf16Item, _: &Config| Some(*item),
                |item: &Utf16Item| item.to_string(),
                |pos: &SourcePos, item: &Utf16Item, _: &Utf16Stream, config: &Config| {
                    item.next_pos(pos, config.tab_width())
                },
            )
        };
        let p = unit().many();
        let split = parse(&p, "u", "🎉", ()).unwrap();
        assert_eq!(split, vec![Utf16Item::Unit(0xd83c), Utf16Item::Unit(0xdf89)]);
        let joined = parse_with_config(&p, "u", "🎉", (), Config::default().with_unicode(true)).unwrap();
        assert_eq!(joined, vec![Utf16Item::Scalar('🎉')]);
    }

    #[test]
    fn it_accepts_token_streams() {
        let word: Parser<TokenStream<&'static str>, (), usize> = token_prim(
            |t: &&'static str, _: &Config| {
                if t.chars().all(char::is_alphabetic) {
                    Some(t.len())
                } else {
                    None
                }
            },
            |t: &&'static str| format!("{:?}", t),
            |pos: &SourcePos, _: &&'static str, _: &TokenStream<&'static str>, _: &Config| {
                SourcePos::new(pos.name.clone(), pos.index + 1, pos.line, pos.column + 1)
            },
        );
        let p = word.many().skip(eof());
        assert_eq!(parse(&p, "toks", vec!["ab", "cde"], ()), Ok(vec![2, 3]));

        let error = parse(&p, "toks", vec!["ab", "42"], ()).unwrap_err();
        assert_eq!(error.pos().column, 2);
        assert_eq!(error.render_messages(), "unexpected \"42\"\nexpecting end of input");
    }
}
