// Shared token parsers

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, none_of, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::{fold_many0, many0_count},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Identifier: letter or underscore followed by letters, digits or underscores
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Unsigned decimal number with optional fraction and exponent: `12`, `1.5`, `.5`, `3e-2`
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    let exponent = tuple((one_of("eE"), opt(one_of("+-")), digit1));
    map_res(
        recognize(tuple((
            alt((
                recognize(tuple((digit1, opt(pair(char('.'), digit0))))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(exponent),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

/// Quoted name where a doubled quote escapes the quote character:
/// `'Driver''s Seat'` or `"Say ""hi"""`
pub fn quoted_name(input: &str) -> IResult<&str, String> {
    alt((quoted_with('\''), quoted_with('"')))(input)
}

fn quoted_with(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        let escaped = if quote == '\'' { "''" } else { "\"\"" };
        let excluded = if quote == '\'' { "'" } else { "\"" };
        delimited(
            char(quote),
            fold_many0(
                alt((map(tag(escaped), move |_| quote), none_of(excluded))),
                String::new,
                |mut acc, c| {
                    acc.push(c);
                    acc
                },
            ),
            char(quote),
        )(input)
    }
}

/// Column reference: `@` followed by a quoted name
pub fn column_reference(input: &str) -> IResult<&str, String> {
    preceded(char('@'), quoted_name)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("speed_2 + 1").unwrap(), (" + 1", "speed_2".to_string()));
        assert!(identifier("2speed").is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("12").unwrap().1, 12.0);
        assert_eq!(number_literal("1.5)").unwrap(), (")", 1.5));
        assert_eq!(number_literal(".5").unwrap().1, 0.5);
        assert_eq!(number_literal("3e-2").unwrap().1, 0.03);
        assert!(number_literal("abc").is_err());
    }

    #[test]
    fn test_quoted_name_with_spaces() {
        assert_eq!(quoted_name("'Engine Speed' * 2").unwrap(), (" * 2", "Engine Speed".to_string()));
    }

    #[test]
    fn test_quoted_name_escaped_quote() {
        assert_eq!(quoted_name("'Driver''s Seat'").unwrap().1, "Driver's Seat");
        assert_eq!(quoted_name(r#""it's""#).unwrap().1, "it's");
        assert_eq!(quoted_name(r#""a ""b""""#).unwrap().1, "a \"b\"");
    }

    #[test]
    fn test_quoted_name_unterminated() {
        assert!(quoted_name("'open").is_err());
    }

    #[test]
    fn test_column_reference() {
        assert_eq!(column_reference("@'A B'").unwrap().1, "A B");
        assert!(column_reference("'A B'").is_err());
    }
}
