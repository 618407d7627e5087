//! Formula parser using nom
//!
//! Grammar:
//! ```text
//! program   := statement*
//! statement := type_kw* ident assign_op expr ';'
//! type_kw   := 'const' | 'float' | 'double' | 'int'
//! assign_op := '=' | '+=' | '-=' | '*=' | '/='
//! expr      := term (('+' | '-') term)*
//! term      := unary (('*' | '/') unary)*
//! unary     := '-' unary | '+' unary | primary
//! primary   := '(' expr ')' | ident '(' args ')' | ident | number ['f']
//! ```
//!
//! `//` and `/* */` comments are removed before parsing.

use crate::ast::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, recognize, value},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

/// Parse errors
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unterminated block comment")]
    UnterminatedComment,

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),
}

/// Parse a formula program from source text
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let stripped = strip_comments(source)?;
    let input = stripped.trim();
    if input.is_empty() {
        return Ok(Program::default());
    }

    let result = match many0(statement)(input) {
        Ok((remaining, statements)) => {
            let remaining = remaining.trim();
            if remaining.is_empty() {
                Ok(Program::new(statements))
            } else {
                Err(ParseError::InvalidStatement(
                    remaining.lines().next().unwrap_or(remaining).to_string(),
                ))
            }
        }
        Err(e) => Err(ParseError::Parse(format!("{:?}", e))),
    };
    result
}

/// Parse a single expression, e.g. for a parameter override
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let input = source.trim();
    match expr(input) {
        Ok(("", result)) => Ok(result),
        Ok((remaining, _)) => Err(ParseError::Parse(format!(
            "Unexpected characters at end: '{}'",
            remaining
        ))),
        Err(e) => Err(ParseError::Parse(format!("{:?}", e))),
    }
}

/// Remove `//` line comments and `/* */` block comments
pub fn strip_comments(source: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('\n').unwrap_or(after.len());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix("/*") {
            let end = after.find("*/").ok_or(ParseError::UnterminatedComment)?;
            out.push(' ');
            rest = &after[end + 2..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    Ok(out)
}

/// Parse whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn statement(input: &str) -> IResult<&str, Statement> {
    let (input, keywords) =
        many0(preceded(multispace0, terminated(type_keyword, multispace1)))(input)?;
    let (input, target) = ws(identifier)(input)?;
    let (input, op) = ws(assign_op)(input)?;
    let (input, value) = expr(input)?;
    let (input, _) = ws(char(';'))(input)?;

    Ok((
        input,
        Statement {
            target: target.to_string(),
            op,
            value,
            declared: !keywords.is_empty(),
        },
    ))
}

fn type_keyword(input: &str) -> IResult<&str, &str> {
    alt((tag("const"), tag("float"), tag("double"), tag("int")))(input)
}

fn assign_op(input: &str) -> IResult<&str, AssignOp> {
    alt((
        value(AssignOp::Add, tag("+=")),
        value(AssignOp::Sub, tag("-=")),
        value(AssignOp::Mul, tag("*=")),
        value(AssignOp::Div, tag("/=")),
        value(AssignOp::Assign, char('=')),
    ))(input)
}

/// Parse an expression (entry point)
fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
        term,
    ))(input)?;

    let result = rest
        .into_iter()
        .fold(first, |acc, (op, e)| Expr::binary(op, acc, e));
    Ok((input, result))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
        ))),
        unary,
    ))(input)?;

    let result = rest
        .into_iter()
        .fold(first, |acc, (op, e)| Expr::binary(op, acc, e));
    Ok((input, result))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), Expr::neg),
        preceded(ws(char('+')), unary),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        // Parenthesized expression
        delimited(char('('), expr, ws(char(')'))),
        // Function call (before plain identifiers)
        map(function_call, Expr::Call),
        map(identifier, |name| Expr::variable(name)),
        map(parse_number, Expr::Number),
    )))(input)
}

/// Parse a number, accepting a trailing `f` as in `1.0f`
fn parse_number(input: &str) -> IResult<&str, f64> {
    terminated(double, opt(char('f')))(input)
}

/// Parse an identifier (starts with letter or underscore, followed by alphanumeric or underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn function_call(input: &str) -> IResult<&str, FunctionCall> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), expr),
        ws(char(')')),
    )(input)?;

    Ok((input, FunctionCall::new(name, args)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gray_scott() {
        let program = parse_program(
            "delta_a = D_a * laplacian_a - a*b*b + F*(1.0-a);\n\
             delta_b = D_b * laplacian_b + a*b*b - (F+k)*b;",
        )
        .unwrap();
        assert_eq!(program.statements.len(), 2);
        assert_eq!(program.assigned_names(), vec!["delta_a", "delta_b"]);
        assert!(program.free_variables().contains("laplacian_b"));
    }

    #[test]
    fn test_precedence() {
        let e = parse_expression("1 + 2 * 3").unwrap();
        match e {
            Expr::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            _ => panic!("Expected binary expression"),
        }
    }

    #[test]
    fn test_declarations_and_compound_ops() {
        let program = parse_program("const float t = 0.5f;\n t *= 2; delta_a -= t;").unwrap();
        assert!(program.statements[0].declared);
        assert_eq!(program.statements[0].target, "t");
        assert_eq!(program.statements[0].value, Expr::Number(0.5));
        assert_eq!(program.statements[1].op, AssignOp::Mul);
        assert!(!program.statements[1].declared);
        assert_eq!(program.statements[2].op, AssignOp::Sub);
    }

    #[test]
    fn test_keyword_prefix_of_identifier() {
        let program = parse_program("floaty = 1;").unwrap();
        assert_eq!(program.statements[0].target, "floaty");
        assert!(!program.statements[0].declared);
    }

    #[test]
    fn test_comments_stripped() {
        let program = parse_program(
            "// header\n delta_a = /* inline */ 1.0; // trailing\n/* block\n over lines */",
        )
        .unwrap();
        assert_eq!(program.statements.len(), 1);
        assert_eq!(
            parse_program("delta_a = 1; /* open"),
            Err(ParseError::UnterminatedComment)
        );
    }

    #[test]
    fn test_function_call() {
        let e = parse_expression("pow(a, 2) + max(b, 0.1)").unwrap();
        match e {
            Expr::Binary { lhs, .. } => match *lhs {
                Expr::Call(call) => {
                    assert_eq!(call.name, "pow");
                    assert_eq!(call.args.len(), 2);
                }
                _ => panic!("Expected function call"),
            },
            _ => panic!("Expected binary expression"),
        }
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(
            parse_expression("-a").unwrap(),
            Expr::neg(Expr::variable("a"))
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_program("delta_a = 1"),
            Err(ParseError::InvalidStatement(_))
        ));
        assert!(parse_program("delta_a = (1 + ;").is_err());
        assert!(parse_expression("1 +").is_err());
    }

    #[test]
    fn test_empty_program() {
        assert!(parse_program("  // nothing\n").unwrap().is_empty());
    }
}
