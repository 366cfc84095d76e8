//! nom parser for the expression syntax
//!
//! ```text
//! expr  := "(" tag arg* ")"
//! arg   := ":" key value
//! value := string | integer | "true" | "false" | "nil" | expr | "[" value* "]"
//! ```
//!
//! Tags and keys are kebab identifiers (letters, digits, `_` and `-`, starting
//! with a letter or `_`). List items may be separated by whitespace or commas.
//! Expressions and lists nest at most [`MAX_NESTING_DEPTH`] levels deep.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, multispace1, none_of},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError as NomParseError, VerboseErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::ast::{Arg, Expr, Value};

// ============================================================================
// Public API
// ============================================================================

/// Deepest accepted nesting of expressions and lists, counting the outermost
/// expression as level 1
pub const MAX_NESTING_DEPTH: usize = 64;

const TOO_DEEP: &str = "nesting too deep";

/// Parse exactly one expression, surrounded by optional whitespace.
///
/// Errors are rendered with nom's `convert_error`, pointing at the offending
/// position in `input`.
pub fn parse_expr(input: &str) -> Result<Expr, String> {
    match all_consuming(delimited(
        multispace0::<_, nom::error::VerboseError<&str>>,
        |i| expr(i, 1),
        multispace0,
    ))(input)
    {
        Ok((_, e)) => Ok(e),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            // Every enclosing level adds a frame; report the limit alone.
            let too_deep = e
                .errors
                .iter()
                .any(|(_, kind)| matches!(kind, VerboseErrorKind::Context(TOO_DEEP)));
            if too_deep {
                return Err(format!(
                    "{}: at most {} levels are allowed",
                    TOO_DEEP, MAX_NESTING_DEPTH
                ));
            }
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete input".to_string()),
    }
}

// ============================================================================
// Expressions
// ============================================================================

fn expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    let (input, _) = char('(')(input)?;
    check_depth(input, depth)?;
    let (input, _) = multispace0(input)?;
    let (input, tag) = cut(context("expression tag", kebab_identifier))(input)?;
    let (input, args) = many0(|i: &'a str| argument(i, depth))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;

    Ok((input, Expr { tag, args }))
}

fn argument<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Arg, E> {
    let (input, _) = multispace0(input)?;
    let (input, key) = keyword(input)?;
    let (input, _) = multispace1(input)?;
    let (input, value) = cut(context("value", |i: &'a str| value_parser(i, depth)))(input)?;

    Ok((input, Arg { key, value }))
}

/// Hard failure once `depth` passes the limit, so no caller backtracks into
/// another branch.
fn check_depth<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> Result<(), nom::Err<E>> {
    if depth > MAX_NESTING_DEPTH {
        return Err(nom::Err::Failure(E::add_context(
            input,
            TOO_DEEP,
            E::from_error_kind(input, ErrorKind::TooLarge),
        )));
    }
    Ok(())
}

fn keyword<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    preceded(char(':'), kebab_identifier)(input)
}

fn kebab_identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
    .map(|(rest, matched)| (rest, matched.to_string()))
}

// ============================================================================
// Values
// ============================================================================

/// A value inside an expression at `depth`; nested expressions and lists sit
/// one level deeper.
fn value_parser<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Value, E> {
    alt((
        map(boolean_literal, Value::Boolean),
        map(null_literal, |_| Value::Null),
        map(string_literal, Value::String),
        map(integer_literal, Value::Integer),
        map(|i: &'a str| expr(i, depth + 1), |e| Value::Expr(Box::new(e))),
        |i: &'a str| list_literal(i, depth + 1),
    ))(input)
}

fn string_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    // escaped_transform fails on an empty body, so "" is matched first.
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                none_of("\"\\"),
                '\\',
                alt((
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    value('\\', char('\\')),
                    value('"', char('"')),
                )),
            ),
            char('"'),
        ),
    ))(input)
}

fn integer_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, i64, E> {
    let (remaining, num_str) = recognize(pair(opt(char('-')), digit1))(input)?;
    match num_str.parse::<i64>() {
        Ok(i) => Ok((remaining, i)),
        Err(_) => Err(nom::Err::Error(E::from_error_kind(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn boolean_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, bool, E> {
    alt((value(true, tag("true")), value(false, tag("false"))))(input)
}

fn null_literal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    value((), tag("nil"))(input)
}

fn list_literal<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Value, E> {
    let (input, _) = char('[')(input)?;
    check_depth(input, depth)?;
    let (input, _) = multispace0(input)?;

    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, val) = match value_parser::<E>(remaining, depth) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };
        items.push(val);
        remaining = rest;

        let (rest, _) = multispace0::<_, E>(remaining)?;
        remaining = rest;

        // Optional comma separator
        if let Ok((rest, _)) = char::<_, E>(',')(remaining) {
            let (rest, _) = multispace0::<_, E>(rest)?;
            remaining = rest;
        }
    }

    let (input, _) = multispace0(remaining)?;
    let (input, _) = cut(context("closing bracket", char(']')))(input)?;

    Ok((input, Value::List(items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bare_tag() {
        assert_eq!(parse_expr("(accept-all)").unwrap(), Expr::new("accept-all"));
        assert_eq!(parse_expr("  ( acceptAll )\n").unwrap(), Expr::new("acceptAll"));
    }

    #[test]
    fn test_parse_scalar_args() {
        let e = parse_expr(r#"(triggering :allow-upstream-dependencies true :upstream-strategy "use-newest")"#)
            .unwrap();
        assert_eq!(e.tag, "triggering");
        assert_eq!(
            e.get("allow-upstream-dependencies").and_then(Value::as_boolean),
            Some(true)
        );
        assert_eq!(
            e.get("upstream-strategy").and_then(Value::as_str),
            Some("use-newest")
        );
    }

    #[test]
    fn test_parse_nested_and_list() {
        let e = parse_expr(
            r#"(and :filters [(display-name :name "a"), (not :filter (accept-all))])"#,
        )
        .unwrap();
        let filters = e.get("filters").and_then(Value::as_list).unwrap();
        assert_eq!(filters.len(), 2);
        let not = filters[1].as_expr().unwrap();
        assert_eq!(not.tag, "not");
        assert_eq!(
            not.get("filter").and_then(Value::as_expr),
            Some(&Expr::new("accept-all"))
        );
    }

    #[test]
    fn test_parse_empty_list_and_string() {
        let e = parse_expr(r#"(or :filters [] :name "")"#).unwrap();
        assert_eq!(e.get("filters"), Some(&Value::List(vec![])));
        assert_eq!(e.get("name"), Some(&Value::String(String::new())));
    }

    #[test]
    fn test_parse_escapes() {
        let e = parse_expr(r#"(display-name :name "a \"b\" \\ c\n")"#).unwrap();
        assert_eq!(e.get("name").and_then(Value::as_str), Some("a \"b\" \\ c\n"));
    }

    #[test]
    fn test_parse_integers_and_nil() {
        let e = parse_expr("(x :a 42 :b -7 :c nil)").unwrap();
        assert_eq!(e.get("a"), Some(&Value::Integer(42)));
        assert_eq!(e.get("b"), Some(&Value::Integer(-7)));
        assert!(e.get("c").unwrap().is_null());
    }

    #[test]
    fn test_render_parses_back() {
        let src = r#"(fallback :entries [(entry :selector (permalink :id "lastBuild") :filter (accept-all))])"#;
        let e = parse_expr(src).unwrap();
        assert_eq!(e.to_expr_string(), src);
        assert_eq!(parse_expr(&e.to_expr_string()).unwrap(), e);
    }

    // ========================================================================
    // Error cases
    // ========================================================================

    #[test]
    fn test_error_unclosed() {
        assert!(parse_expr("(status :build-status \"stable\"").is_err());
    }

    #[test]
    fn test_error_trailing_input() {
        assert!(parse_expr("(accept-all) (accept-all)").is_err());
    }

    #[test]
    fn test_error_missing_tag() {
        let err = parse_expr("( :name \"x\")").unwrap_err();
        assert!(err.contains("expression tag"), "{err}");
    }

    #[test]
    fn test_error_bare_word_value() {
        assert!(parse_expr("(status :build-status stable)").is_err());
    }

    #[test]
    fn test_error_empty_input() {
        assert!(parse_expr("").is_err());
        assert!(parse_expr("   ").is_err());
    }

    fn nested_not(levels: usize) -> String {
        format!(
            "{}(accept-all){}",
            "(not :filter ".repeat(levels),
            ")".repeat(levels)
        )
    }

    #[test]
    fn test_nesting_at_limit_parses() {
        let e = parse_expr(&nested_not(MAX_NESTING_DEPTH - 1)).unwrap();
        assert_eq!(e.tag, "not");

        let lists = format!(
            "(x :v {}{})",
            "[".repeat(MAX_NESTING_DEPTH - 1),
            "]".repeat(MAX_NESTING_DEPTH - 1)
        );
        assert!(parse_expr(&lists).is_ok());
    }

    #[test]
    fn test_error_nesting_too_deep() {
        let err = parse_expr(&nested_not(MAX_NESTING_DEPTH)).unwrap_err();
        assert!(err.contains("nesting too deep"), "{err}");

        // far past the limit: fails instead of exhausting the stack
        let err = parse_expr(&nested_not(20_000)).unwrap_err();
        assert!(err.contains("nesting too deep"), "{err}");

        let lists = format!("(x :v {}{})", "[".repeat(5_000), "]".repeat(5_000));
        assert!(parse_expr(&lists).unwrap_err().contains("nesting too deep"));
    }

    #[test]
    fn test_error_integer_overflow() {
        assert!(parse_expr("(build-number :number 99999999999999999999)").is_err());
    }
}
