// Formula parser for derived columns
//
// Grammar (lowest to highest precedence):
//   expr  := term (("+" | "-") term)*
//   term  := unary (("*" | "/" | "%") unary)*
//   unary := ("-" | "+") unary | power
//   power := atom ("**" unary)?
//   atom  := number | @'column' | name | name "(" args ")" | "(" expr ")"

use super::ast::{BinaryOp, Expr, Function};
use super::lexer::{column_reference, identifier, number_literal, ws};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, not, opt, value},
    error::{Error, ErrorKind},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

/// Parse a complete formula; trailing input is an error
pub fn parse_formula(input: &str) -> IResult<&str, Expr> {
    all_consuming(ws(expr))(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(
            ws(alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            ))),
            term,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::Binary(op, Box::new(acc), Box::new(rhs)),
    )(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            ws(alt((
                value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
                value(BinaryOp::Div, char('/')),
                value(BinaryOp::Mod, char('%')),
            ))),
            unary,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::Binary(op, Box::new(acc), Box::new(rhs)),
    )(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        preceded(ws(char('+')), unary),
        power,
    ))(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), unary))(input)?;
    let expr = match exponent {
        Some(exp) => Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exp)),
        None => base,
    };
    Ok((input, expr))
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(number_literal, Expr::Number),
        map(column_reference, Expr::Column),
        delimited(ws(char('(')), expr, ws(char(')'))),
        named,
    )))(input)
}

/// Function call, constant, or bare column name
fn named(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_paren, open) = opt(preceded(multispace0, char('(')))(rest)?;

    if open.is_none() {
        let expr = match name.as_str() {
            "pi" => Expr::Number(std::f64::consts::PI),
            "e" => Expr::Number(std::f64::consts::E),
            _ => Expr::Column(name),
        };
        return Ok((rest, expr));
    }

    let (rest, args) = separated_list0(ws(char(',')), expr)(after_paren)?;
    let (rest, _) = ws(char(')'))(rest)?;

    match Function::from_name(&name) {
        Some(f) if f.arity() == args.len() => Ok((rest, Expr::Call(f, args))),
        // Unknown function or wrong argument count: stop here so the error points at the name
        _ => Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify))),
    }
}
