// Parser for the legacy `.cm` import method format:
//
//   header:1
//   data start:3
//   delimiter:,

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, line_ending, multispace0, not_line_ending, space0},
    combinator::{eof, map, map_res},
    multi::{many1, separated_list0},
    sequence::{delimited, preceded, terminated},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyEntry {
    Header(usize),
    DataStart(usize),
    Delimiter(String),
}

fn row_number(input: &str) -> IResult<&str, usize> {
    delimited(space0, map_res(digit1, |s: &str| s.parse::<usize>()), space0)(input)
}

fn entry(input: &str) -> IResult<&str, LegacyEntry> {
    alt((
        map(preceded(tag("header:"), row_number), LegacyEntry::Header),
        map(preceded(tag("data start:"), row_number), LegacyEntry::DataStart),
        // The delimiter is everything after the colon, whitespace included
        map(preceded(tag("delimiter:"), not_line_ending), |d: &str| {
            LegacyEntry::Delimiter(d.to_string())
        }),
    ))(input)
}

/// Parse every `key:value` line of a legacy method file
pub fn parse_legacy_method(input: &str) -> IResult<&str, Vec<LegacyEntry>> {
    terminated(
        separated_list0(many1(line_ending), entry),
        preceded(multispace0, eof),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_entries() {
        let (_, entries) = parse_legacy_method("header:1\ndata start:3\ndelimiter:,").unwrap();
        assert_eq!(
            entries,
            vec![
                LegacyEntry::Header(1),
                LegacyEntry::DataStart(3),
                LegacyEntry::Delimiter(",".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_tab_delimiter_and_crlf() {
        let (_, entries) = parse_legacy_method("header: 2\r\ndata start:4\r\ndelimiter:\t\r\n").unwrap();
        assert_eq!(entries[0], LegacyEntry::Header(2));
        assert_eq!(entries[2], LegacyEntry::Delimiter("\t".to_string()));
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        assert!(parse_legacy_method("header:1\nfooter:2").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric_row() {
        assert!(parse_legacy_method("header:one").is_err());
    }
}
