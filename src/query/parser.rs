use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, value},
    multi::separated_list1,
    sequence::delimited,
};
use crate::core::error::{Error, ErrorKind, Result};
use crate::query::types::{Condition, Operator};

/// Parser for the textual conditions form:
///
///   `title~rust* pid=demo:1 cdate>=2024-01-01 label='a spaced value'`
///
/// Conditions are whitespace-separated `field op value` triples. Values with
/// spaces are single-quoted, with `\'` and `\\` escapes.
fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::GreaterOrEqual, tag(">=")),
        value(Operator::LessOrEqual, tag("<=")),
        value(Operator::Equals, tag("=")),
        value(Operator::Contains, tag("~")),
        value(Operator::GreaterThan, tag(">")),
        value(Operator::LessThan, tag("<")),
    ))
    .parse(input)
}

fn quoted_value(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        escaped_transform(
            is_not("'\\"),
            '\\',
            alt((value("'", char('\'')), value("\\", char('\\')))),
        ),
        char('\''),
    )
    .parse(input)
}

fn bare_value(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != '\''),
        String::from,
    )
    .parse(input)
}

fn condition(input: &str) -> IResult<&str, Condition> {
    map(
        (field_name, operator, alt((quoted_value, bare_value))),
        |(field, operator, value)| Condition {
            field: field.to_string(),
            operator,
            value,
        },
    )
    .parse(input)
}

/// Parse a conditions string. A structurally invalid query is surfaced to
/// the caller as a query-parse error; per-condition field/operator problems
/// are left to the query builder.
pub fn parse_conditions(input: &str) -> Result<Vec<Condition>> {
    let full = delimited(
        multispace0,
        separated_list1(multispace1, condition),
        multispace0,
    );
    match all_consuming(full).parse(input) {
        Ok((_, conditions)) => Ok(conditions),
        Err(err) => Err(Error::new(
            ErrorKind::QueryParse,
            format!("malformed conditions query {input:?}: {err}"),
        )),
    }
}
