//! Expression parser using nom.
//!
//! Parses check expressions into an [`Expr`] tree. The comprehension macros
//! (`all`, `exists`, `exists_one`, `map`, `filter`) and `has()` are expanded
//! here, so later stages only see plain nodes.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, hex_digit1, one_of, satisfy},
    combinator::{map, map_res, not, opt, recognize, value, verify},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};

/// Parse error information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Error message.
    pub message: String,
    /// Column where parsing stopped (1-indexed, in characters).
    pub column: usize,
}

impl ParseError {
    fn unexpected(source: &str, rest: &str) -> Self {
        let consumed = source.len().saturating_sub(rest.len());
        let column = source[..consumed].chars().count() + 1;
        let remaining = rest.trim_start();
        let message = if remaining.is_empty() {
            "unexpected end of input".to_string()
        } else {
            let snippet: String = remaining.chars().take(16).collect();
            format!("unexpected input {:?}", snippet)
        };
        Self { message, column }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax error at column {}: {}", self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a complete expression. Trailing input is an error.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    match terminated(parse_ternary, skip_space)(input) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(ParseError::unexpected(input, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::unexpected(input, e.input))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::unexpected(input, "")),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "true" | "false" | "null" | "in")
}

/// Skip whitespace and `//` line comments.
fn skip_space(input: &str) -> IResult<&str, ()> {
    let mut rest = input.trim_start();
    while let Some(comment) = rest.strip_prefix("//") {
        rest = comment
            .find('\n')
            .map_or("", |pos| &comment[pos..])
            .trim_start();
    }
    Ok((rest, ()))
}

fn symbol<'a>(text: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(skip_space, tag(text))
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(skip_space, terminated(tag(word), not(satisfy(is_ident_char))))
}

fn fold_binary(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn parse_ternary(input: &str) -> IResult<&str, Expr> {
    let (input, condition) = parse_or(input)?;
    let (input, branches) = opt(pair(
        preceded(symbol("?"), parse_or),
        preceded(symbol(":"), parse_ternary),
    ))(input)?;

    let expr = match branches {
        Some((then, otherwise)) => Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
        None => condition,
    };
    Ok((input, expr))
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (input, (first, rest)) = pair(
        parse_and,
        many0(pair(value(BinaryOp::Or, symbol("||")), parse_and)),
    )(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (input, (first, rest)) = pair(
        parse_relation,
        many0(pair(value(BinaryOp::And, symbol("&&")), parse_relation)),
    )(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_relation_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Le, symbol("<=")),
        value(BinaryOp::Ge, symbol(">=")),
        value(BinaryOp::Eq, symbol("==")),
        value(BinaryOp::Ne, symbol("!=")),
        value(BinaryOp::Lt, symbol("<")),
        value(BinaryOp::Gt, symbol(">")),
        value(BinaryOp::In, keyword("in")),
    ))(input)
}

fn parse_relation(input: &str) -> IResult<&str, Expr> {
    let (input, (first, rest)) =
        pair(parse_additive, many0(pair(parse_relation_op, parse_additive)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let op = alt((
        value(BinaryOp::Add, symbol("+")),
        value(BinaryOp::Sub, symbol("-")),
    ));
    let (input, (first, rest)) = pair(parse_multiplicative, many0(pair(op, parse_multiplicative)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let op = alt((
        value(BinaryOp::Mul, symbol("*")),
        value(BinaryOp::Div, symbol("/")),
        value(BinaryOp::Rem, symbol("%")),
    ));
    let (input, (first, rest)) = pair(parse_unary, many0(pair(op, parse_unary)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(symbol("!"), parse_unary), |operand| Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }),
        map(preceded(symbol("-"), parse_unary), negate),
        parse_member,
    ))(input)
}

/// Fold negation into numeric literals so `-1` stays a constant.
fn negate(operand: Expr) -> Expr {
    match operand {
        Expr::Literal(Literal::Int(n)) => Expr::Literal(Literal::Int(n.wrapping_neg())),
        Expr::Literal(Literal::Double(d)) => Expr::Literal(Literal::Double(-d)),
        other => Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(other),
        },
    }
}

fn parse_member(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut expr) = parse_primary(input)?;

    loop {
        if let Ok((rest, _)) = symbol(".")(input) {
            let (rest, optional) = map(opt(char('?')), |q| q.is_some())(rest)?;
            let (rest, field) = preceded(skip_space, identifier)(rest)?;
            if !optional {
                if let Ok((after, args)) = parse_call_args(rest) {
                    expr = member_call(expr, field, args);
                    input = after;
                    continue;
                }
            }
            expr = Expr::Select {
                operand: Box::new(expr),
                field: field.to_string(),
                optional,
            };
            input = rest;
            continue;
        }

        if let Ok((rest, index)) = delimited(symbol("["), parse_ternary, symbol("]"))(input) {
            expr = Expr::Index {
                operand: Box::new(expr),
                index: Box::new(index),
            };
            input = rest;
            continue;
        }

        return Ok((input, expr));
    }
}

/// Build a receiver-style call, expanding comprehension macros.
fn member_call(target: Expr, function: &str, mut args: Vec<Expr>) -> Expr {
    if let Some(kind) = MacroKind::from_name(function) {
        let arity_ok = match kind {
            MacroKind::Map => args.len() == 2 || args.len() == 3,
            _ => args.len() == 2,
        };
        if arity_ok {
            if let Expr::Ident(var) = &args[0] {
                let var = var.clone();
                // Arity was checked above, so both pops succeed.
                let body = args.pop().map(Box::new);
                let filter = if args.len() == 2 { args.pop().map(Box::new) } else { None };
                if let Some(body) = body {
                    return Expr::Comprehension {
                        kind,
                        range: Box::new(target),
                        var,
                        filter,
                        body,
                    };
                }
            }
        }
    }

    Expr::Call {
        target: Some(Box::new(target)),
        function: function.to_string(),
        args,
    }
}

fn global_call(function: &str, mut args: Vec<Expr>) -> Expr {
    if function == "has" && args.len() == 1 {
        if let Some(Expr::Select {
            operand,
            field,
            optional: false,
        }) = args.pop()
        {
            return Expr::Has { operand, field };
        }
        // Not a field selection; leave it for the checker to reject.
        return Expr::Call {
            target: None,
            function: function.to_string(),
            args: Vec::new(),
        };
    }

    Expr::Call {
        target: None,
        function: function.to_string(),
        args,
    }
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    preceded(
        skip_space,
        alt((
            map(parse_literal, Expr::Literal),
            parse_ident_or_call,
            delimited(char('('), parse_ternary, symbol(")")),
            map(delimited(char('['), parse_items, symbol("]")), Expr::List),
            map(delimited(char('{'), parse_entries, symbol("}")), Expr::Map),
        )),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn parse_ident_or_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = verify(identifier, |name: &str| !is_reserved(name))(input)?;
    match parse_call_args(input) {
        Ok((rest, args)) => Ok((rest, global_call(name, args))),
        Err(nom::Err::Error(_)) => Ok((input, Expr::Ident(name.to_string()))),
        Err(e) => Err(e),
    }
}

fn parse_call_args(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(symbol("("), parse_items, symbol(")"))(input)
}

/// Comma separated expressions with an optional trailing comma.
fn parse_items(input: &str) -> IResult<&str, Vec<Expr>> {
    terminated(separated_list0(symbol(","), parse_ternary), opt(symbol(",")))(input)
}

fn parse_entries(input: &str) -> IResult<&str, Vec<(Expr, Expr)>> {
    terminated(
        separated_list0(
            symbol(","),
            separated_pair(parse_ternary, symbol(":"), parse_ternary),
        ),
        opt(symbol(",")),
    )(input)
}

fn parse_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(parse_string, Literal::String),
        parse_number,
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        value(Literal::Null, keyword("null")),
    ))(input)
}

fn parse_number(input: &str) -> IResult<&str, Literal> {
    alt((parse_hex, parse_double, parse_uint, parse_int))(input)
}

fn parse_hex(input: &str) -> IResult<&str, Literal> {
    let (rest, digits) = preceded(alt((tag("0x"), tag("0X"))), hex_digit1)(input)?;
    let (rest, unsigned) = opt(one_of("uU"))(rest)?;
    let literal = if unsigned.is_some() {
        u64::from_str_radix(digits, 16).map(Literal::Uint)
    } else {
        i64::from_str_radix(digits, 16).map(Literal::Int)
    };
    match literal {
        Ok(literal) => Ok((rest, literal)),
        Err(_) => Err(nom::Err::Error(NomError::new(input, ErrorKind::HexDigit))),
    }
}

fn parse_exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn parse_double(input: &str) -> IResult<&str, Literal> {
    map_res(
        alt((
            recognize(tuple((digit1, char('.'), digit1, opt(parse_exponent)))),
            recognize(pair(digit1, parse_exponent)),
        )),
        |text: &str| text.parse::<f64>().map(Literal::Double),
    )(input)
}

fn parse_uint(input: &str) -> IResult<&str, Literal> {
    map_res(terminated(digit1, one_of("uU")), |digits: &str| {
        digits.parse::<u64>().map(Literal::Uint)
    })(input)
}

fn parse_int(input: &str) -> IResult<&str, Literal> {
    map_res(digit1, |digits: &str| digits.parse::<i64>().map(Literal::Int))(input)
}

/// Quoted string literal. A leading `r` or `R` disables escapes.
fn parse_string(input: &str) -> IResult<&str, String> {
    let fail = || nom::Err::Error(NomError::new(input, ErrorKind::Char));

    let (rest, raw) = map(opt(one_of("rR")), |r| r.is_some())(input)?;
    let mut chars = rest.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err(fail()),
    };

    let mut out = String::new();
    while let Some((pos, c)) = chars.next() {
        if c == quote {
            return Ok((&rest[pos + c.len_utf8()..], out));
        }
        if c == '\n' {
            break;
        }
        if c != '\\' || raw {
            out.push(c);
            continue;
        }
        let escaped = match chars.next().map(|(_, c)| c) {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('a') => '\u{07}',
            Some('b') => '\u{08}',
            Some('f') => '\u{0c}',
            Some('v') => '\u{0b}',
            Some(c @ ('\\' | '\'' | '"' | '`' | '?')) => c,
            Some('u') => {
                let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) if hex.len() == 4 => c,
                    _ => return Err(fail()),
                }
            }
            _ => return Err(fail()),
        };
        out.push(escaped);
    }

    Err(fail())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Int(n)))
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_expression("42").unwrap(), Expr::Literal(Literal::Int(42)));
        assert_eq!(parse_expression("42u").unwrap(), Expr::Literal(Literal::Uint(42)));
        assert_eq!(parse_expression("0x1F").unwrap(), Expr::Literal(Literal::Int(31)));
        assert_eq!(parse_expression("2.5").unwrap(), Expr::Literal(Literal::Double(2.5)));
        assert_eq!(parse_expression("1e3").unwrap(), Expr::Literal(Literal::Double(1000.0)));
        assert_eq!(parse_expression("-7").unwrap(), Expr::Literal(Literal::Int(-7)));
        assert_eq!(parse_expression("true").unwrap(), Expr::Literal(Literal::Bool(true)));
        assert_eq!(parse_expression(" null ").unwrap(), Expr::Literal(Literal::Null));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(
            parse_expression(r#""a\tb""#).unwrap(),
            Expr::Literal(Literal::String("a\tb".to_string()))
        );
        assert_eq!(
            parse_expression(r"'it\'s'").unwrap(),
            Expr::Literal(Literal::String("it's".to_string()))
        );
        assert_eq!(
            parse_expression(r"r'^\d+$'").unwrap(),
            Expr::Literal(Literal::String(r"^\d+$".to_string()))
        );
        assert_eq!(
            parse_expression(r#""é""#).unwrap(),
            Expr::Literal(Literal::String("é".to_string()))
        );
        assert!(parse_expression("'unterminated").is_err());
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(parse_expression("nullable").unwrap(), Expr::Ident("nullable".to_string()));
        assert_eq!(parse_expression("truth").unwrap(), Expr::Ident("truth".to_string()));
        assert_eq!(parse_expression("index").unwrap(), Expr::Ident("index".to_string()));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a || b && c == 1 + 2 * 3").unwrap();
        let expected = Expr::Binary {
            op: BinaryOp::Or,
            lhs: ident("a"),
            rhs: Box::new(Expr::Binary {
                op: BinaryOp::And,
                lhs: ident("b"),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Eq,
                    lhs: ident("c"),
                    rhs: Box::new(Expr::Binary {
                        op: BinaryOp::Add,
                        lhs: int(1),
                        rhs: Box::new(Expr::Binary {
                            op: BinaryOp::Mul,
                            lhs: int(2),
                            rhs: int(3),
                        }),
                    }),
                }),
            }),
        };
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_expression("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Sub,
                lhs: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    lhs: int(10),
                    rhs: int(4),
                }),
                rhs: int(3),
            }
        );
    }

    #[test]
    fn test_ternary_and_in() {
        let expr = parse_expression("'a' in xs ? 1 : 2").unwrap();
        match expr {
            Expr::Ternary { condition, .. } => {
                assert!(matches!(*condition, Expr::Binary { op: BinaryOp::In, .. }));
            }
            other => panic!("expected ternary, got {:?}", other),
        }
    }

    #[test]
    fn test_member_chain() {
        let expr = parse_expression("object.metadata.?labels['app'].size()").unwrap();
        match expr {
            Expr::Call { target: Some(target), function, args } => {
                assert_eq!(function, "size");
                assert!(args.is_empty());
                match *target {
                    Expr::Index { operand, .. } => {
                        assert!(matches!(
                            *operand,
                            Expr::Select { ref field, optional: true, .. } if field == "labels"
                        ));
                    }
                    other => panic!("expected index, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_macros_expand() {
        let expr = parse_expression("allContainers.all(c, has(c.securityContext))").unwrap();
        match expr {
            Expr::Comprehension { kind, var, filter, body, .. } => {
                assert_eq!(kind, MacroKind::All);
                assert_eq!(var, "c");
                assert!(filter.is_none());
                assert!(matches!(*body, Expr::Has { ref field, .. } if field == "securityContext"));
            }
            other => panic!("expected comprehension, got {:?}", other),
        }

        let expr = parse_expression("xs.map(x, x > 1, x * 2)").unwrap();
        assert!(matches!(
            expr,
            Expr::Comprehension { kind: MacroKind::Map, filter: Some(_), .. }
        ));
    }

    #[test]
    fn test_macro_with_non_identifier_stays_call() {
        let expr = parse_expression("xs.all(1, true)").unwrap();
        assert!(matches!(expr, Expr::Call { ref function, .. } if function == "all"));
    }

    #[test]
    fn test_collections() {
        assert_eq!(parse_expression("[]").unwrap(), Expr::List(Vec::new()));
        assert_eq!(
            parse_expression("[1, 2,]").unwrap(),
            Expr::List(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2))])
        );
        let map = parse_expression("{'a': 1, 'b': true}").unwrap();
        assert!(matches!(map, Expr::Map(ref entries) if entries.len() == 2));
    }

    #[test]
    fn test_comments_and_whitespace() {
        let expr = parse_expression("a // first\n  && b").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_expression("a &&").unwrap_err();
        assert_eq!(err.column, 3);

        let err = parse_expression("a b").unwrap_err();
        assert_eq!(err.column, 3);
        assert!(err.message.contains("\"b\""));

        assert!(parse_expression("").is_err());
        assert!(parse_expression("(1 + 2").is_err());
    }
}
