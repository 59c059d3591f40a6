//! Turns free-form input such as `12/25/2021 - 3 weeks as days` into a flat
//! list of spanned tokens, terminated by [`Token::Eof`].
//!
//! Scanning is a single left-to-right pass with one character of lookahead.
//! The small building blocks (blanks, words, integers) are nom parsers over a
//! [`ParserSpan`]; the dispatch between them is plain code so that every
//! failure can be reported with a precise message.

use std::fmt;
use std::num::ParseIntError;

use chrono::NaiveDate;
use nom::bytes::complete::take_while;
use nom::character::complete::{alpha1, char, digit1, one_of};
use nom::combinator::{map, map_res};
use nom::error::{ErrorKind, FromExternalError, ParseError as NomErr};
use nom::{IResult, Parser};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::DateLiteral;
use crate::code::{CodeSpan, ParserSpan, Spanned};
use crate::unit::{Duration, Unit};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character: {ch}")]
    UnexpectedChar { ch: char, span: CodeSpan },

    #[error("unexpected word: {word}")]
    UnexpectedWord { word: String, span: CodeSpan },

    #[error("invalid unit: {word}")]
    InvalidUnit { word: String, span: CodeSpan },

    #[error("error parsing cast: expected a unit after `{keyword}` but got {found}")]
    MissingCastUnit {
        keyword: String,
        found: String,
        span: CodeSpan,
    },

    #[error("error parsing date: {msg}")]
    MalformedDate { msg: String, span: CodeSpan },

    #[error("invalid date: {month}/{day}/{year} is not a calendar day")]
    InvalidDate {
        month: i64,
        day: i64,
        year: i64,
        span: CodeSpan,
    },

    #[error("invalid integer `{value}`: {msg}")]
    BadInt {
        value: String,
        msg: String,
        span: CodeSpan,
    },

    #[error("unexpected input at offset {} ({kind:?})", .span.start)]
    Nom { kind: ErrorKind, span: CodeSpan },
}

impl LexError {
    pub fn span(&self) -> CodeSpan {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnexpectedWord { span, .. }
            | LexError::InvalidUnit { span, .. }
            | LexError::MissingCastUnit { span, .. }
            | LexError::MalformedDate { span, .. }
            | LexError::InvalidDate { span, .. }
            | LexError::BadInt { span, .. }
            | LexError::Nom { span, .. } => *span,
        }
    }
}

impl<'a> NomErr<ParserSpan<'a>> for LexError {
    fn from_error_kind(input: ParserSpan<'a>, kind: ErrorKind) -> Self {
        Self::Nom {
            kind,
            span: CodeSpan::point(input.location_offset()),
        }
    }
    fn append(_: ParserSpan<'a>, _: ErrorKind, other: Self) -> Self {
        other
    }
    fn or(self, _other: Self) -> Self {
        self
    }
}

impl<'a> FromExternalError<ParserSpan<'a>, ParseIntError> for LexError {
    fn from_external_error(input: ParserSpan<'a>, _kind: ErrorKind, e: ParseIntError) -> Self {
        let digits = input
            .fragment()
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let start = input.location_offset();
        LexError::BadInt {
            value: input.fragment()[..digits].to_string(),
            msg: e.to_string(),
            span: CodeSpan::new(start, start + digits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "UPPERCASE")]
pub enum Token {
    Date(DateLiteral),
    Duration(Duration),
    Cast(Unit),
    Op(char),
    Number(i64),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Date,
    Duration,
    Cast,
    Op,
    Number,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Date => "DATE",
            TokenKind::Duration => "DURATION",
            TokenKind::Cast => "CAST",
            TokenKind::Op => "OP",
            TokenKind::Number => "NUMBER",
            TokenKind::Eof => "EOF",
        })
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Date(_) => TokenKind::Date,
            Token::Duration(_) => TokenKind::Duration,
            Token::Cast(_) => TokenKind::Cast,
            Token::Op(_) => TokenKind::Op,
            Token::Number(_) => TokenKind::Number,
            Token::Eof => TokenKind::Eof,
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            Token::Date(date) => Some(date.to_string()),
            Token::Duration(duration) => Some(duration.to_string()),
            Token::Cast(unit) => Some(unit.to_string()),
            Token::Op(op) => Some(op.to_string()),
            Token::Number(n) => Some(n.to_string()),
            Token::Eof => None,
        }
    }

    /// Kind and value, for error messages: `EOF`, `NUMBER 5`, `OP +`.
    pub fn summary(&self) -> String {
        match self.value() {
            Some(value) => format!("{} {value}", self.kind()),
            None => self.kind().to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "Token({}, {value})", self.kind()),
            None => write!(f, "Token({})", self.kind()),
        }
    }
}

type LexResult<'a, T> = IResult<ParserSpan<'a>, T, LexError>;

/// Wrap any nom parser so it returns a `Spanned<O>`.
fn spanned<'a, F, O>(mut inner: F) -> impl FnMut(ParserSpan<'a>) -> LexResult<'a, Spanned<O>>
where
    F: Parser<ParserSpan<'a>, Output = O, Error = LexError>,
{
    move |input: ParserSpan<'a>| {
        let start = input.location_offset();
        let (rest, value) = inner.parse(input)?;
        let end = rest.location_offset();
        Ok((rest, Spanned::new(value, CodeSpan::new(start, end))))
    }
}

fn blanks<'a>(input: ParserSpan<'a>) -> LexResult<'a, ParserSpan<'a>> {
    take_while(|c: char| c == ' ').parse(input)
}

fn word<'a>(input: ParserSpan<'a>) -> LexResult<'a, Spanned<String>> {
    spanned(map(alpha1, |s: ParserSpan<'a>| s.fragment().to_ascii_lowercase())).parse(input)
}

fn integer<'a>(input: ParserSpan<'a>) -> LexResult<'a, Spanned<i64>> {
    spanned(map_res(digit1, |s: ParserSpan<'a>| s.fragment().parse::<i64>())).parse(input)
}

fn finish<'a, T>(result: LexResult<'a, T>) -> Result<(ParserSpan<'a>, T), LexError> {
    result.map_err(|e| match e {
        nom::Err::Error(p) | nom::Err::Failure(p) => p,
        nom::Err::Incomplete(_) => unreachable!("complete parsers never report Incomplete"),
    })
}

/// Quoted next character, or `end of input`.
fn describe(input: &ParserSpan) -> String {
    match input.fragment().chars().next() {
        Some(c) => format!("\"{c}\""),
        None => "end of input".to_string(),
    }
}

fn resolve_unit(word: &Spanned<String>) -> Result<Unit, LexError> {
    Unit::from_alias(&word.value).ok_or_else(|| LexError::InvalidUnit {
        word: word.value.clone(),
        span: word.span,
    })
}

fn scan_op(input: ParserSpan) -> Result<(ParserSpan, Spanned<Token>), LexError> {
    let (rest, op) = finish(spanned(one_of("+-/")).parse(input))?;
    Ok((rest, Spanned::new(Token::Op(op.value), op.span)))
}

/// `now`, `today`, or a cast introduced by `as` / `to`.
fn scan_keyword(input: ParserSpan) -> Result<(ParserSpan, Spanned<Token>), LexError> {
    let (rest, keyword) = finish(word(input))?;
    match keyword.value.as_str() {
        "now" => Ok((rest, Spanned::new(Token::Date(DateLiteral::Now), keyword.span))),
        "today" => Ok((rest, Spanned::new(Token::Date(DateLiteral::Today), keyword.span))),
        "as" | "to" => {
            let (rest, _) = finish(blanks(rest))?;
            let (rest, unit_word) = finish(word(rest)).map_err(|_| LexError::MissingCastUnit {
                keyword: keyword.value.clone(),
                found: describe(&rest),
                span: CodeSpan::point(rest.location_offset()),
            })?;
            let unit = resolve_unit(&unit_word)?;
            Ok((rest, Spanned::new(Token::Cast(unit), keyword.span.to(unit_word.span))))
        }
        _ => Err(LexError::UnexpectedWord {
            word: keyword.value,
            span: keyword.span,
        }),
    }
}

/// A bare number, a duration (`3 weeks`) or a date (`12/25/2021`).
fn scan_number(input: ParserSpan) -> Result<(ParserSpan, Spanned<Token>), LexError> {
    let (rest, amount) = finish(integer(input))?;
    let (after_blank, _) = finish(blanks(rest))?;

    match after_blank.fragment().chars().next() {
        Some('/') => scan_date_tail(amount, after_blank),
        Some(c) if c.is_ascii_alphabetic() => {
            let (rest, unit_word) = finish(word(after_blank))?;
            let unit = resolve_unit(&unit_word)?;
            let duration = Duration::new(amount.value as f64, unit);
            Ok((rest, Spanned::new(Token::Duration(duration), amount.span.to(unit_word.span))))
        }
        _ => Ok((rest, Spanned::new(Token::Number(amount.value), amount.span))),
    }
}

fn date_part(input: ParserSpan) -> Result<(ParserSpan, Spanned<i64>), LexError> {
    finish(integer(input)).map_err(|e| match e {
        LexError::Nom { span, .. } => LexError::MalformedDate {
            msg: format!("expected digit but got {}", describe(&input)),
            span,
        },
        other => other,
    })
}

fn date_slash(input: ParserSpan) -> Result<ParserSpan, LexError> {
    let (rest, _) = finish(char('/').parse(input)).map_err(|_| LexError::MalformedDate {
        msg: format!("expected \"/\" but got {}", describe(&input)),
        span: CodeSpan::point(input.location_offset()),
    })?;
    Ok(rest)
}

/// Scans `/D/Y` after the month has been read.
fn scan_date_tail<'a>(
    month: Spanned<i64>,
    input: ParserSpan<'a>,
) -> Result<(ParserSpan<'a>, Spanned<Token>), LexError> {
    let rest = date_slash(input)?;
    let (rest, day) = date_part(rest)?;
    let rest = date_slash(rest)?;
    let (rest, year) = date_part(rest)?;

    let span = month.span.to(year.span);
    let date = calendar_date(month.value, day.value, year.value).ok_or(LexError::InvalidDate {
        month: month.value,
        day: day.value,
        year: year.value,
        span,
    })?;
    Ok((rest, Spanned::new(Token::Date(DateLiteral::Calendar(date)), span)))
}

/// Years 0 through 99 belong to the twentieth century: `12/25/21` is 1921.
fn calendar_date(month: i64, day: i64, year: i64) -> Option<NaiveDate> {
    let year = if (0..=99).contains(&year) { year + 1900 } else { year };
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Scan `input` into tokens, always ending with [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Spanned<Token>>, LexError> {
    let mut rest = ParserSpan::new(input);
    let mut tokens = Vec::new();

    loop {
        (rest, _) = finish(blanks(rest))?;
        let Some(c) = rest.fragment().chars().next() else {
            break;
        };

        let (next, token) = match c {
            '+' | '-' | '/' => scan_op(rest)?,
            c if c.is_ascii_alphabetic() => scan_keyword(rest)?,
            c if c.is_ascii_digit() => scan_number(rest)?,
            c => {
                let start = rest.location_offset();
                return Err(LexError::UnexpectedChar {
                    ch: c,
                    span: CodeSpan::new(start, start + c.len_utf8()),
                });
            }
        };
        trace!(token = %token.value, "scanned token");
        tokens.push(token);
        rest = next;
    }

    tokens.push(Spanned::new(Token::Eof, CodeSpan::point(rest.location_offset())));
    debug!(count = tokens.len(), "tokenized input");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("tokenize")
            .iter()
            .map(|t| t.value.kind())
            .collect()
    }

    fn values(input: &str) -> Vec<Token> {
        tokenize(input)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(values(""), vec![Token::Eof]);
        assert_eq!(values("    "), vec![Token::Eof]);
    }

    #[test]
    fn scans_date_plus_duration() {
        assert_eq!(
            values("12/25/2021 + 7 days"),
            vec![
                Token::Date(DateLiteral::Calendar(ymd(2021, 12, 25))),
                Token::Op('+'),
                Token::Duration(Duration::new(7.0, Unit::Day)),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn symbolic_dates_any_case() {
        assert_eq!(
            values("NOW - Today"),
            vec![
                Token::Date(DateLiteral::Now),
                Token::Op('-'),
                Token::Date(DateLiteral::Today),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn casts_resolve_units() {
        assert_eq!(
            values("1 week as hours to d"),
            vec![
                Token::Duration(Duration::new(1.0, Unit::Week)),
                Token::Cast(Unit::Hour),
                Token::Cast(Unit::Day),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unit_may_touch_amount() {
        assert_eq!(
            values("90min"),
            vec![Token::Duration(Duration::new(90.0, Unit::Minute)), Token::Eof]
        );
    }

    #[test]
    fn space_before_first_slash_allowed() {
        assert_eq!(
            values("1 /2/2003"),
            vec![Token::Date(DateLiteral::Calendar(ymd(2003, 1, 2))), Token::Eof]
        );
    }

    #[test]
    fn bare_number_and_standalone_slash() {
        assert_eq!(
            kinds("5 + / 3"),
            vec![
                TokenKind::Number,
                TokenKind::Op,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn spans_cover_source_text() {
        let tokens = tokenize("today + 3 weeks").expect("tokenize");
        let spans: Vec<_> = tokens.iter().map(|t| (t.span.start, t.span.end)).collect();
        assert_eq!(spans, vec![(0, 5), (6, 7), (8, 15), (15, 15)]);
    }

    #[test]
    fn unknown_character() {
        let err = tokenize("1 day * 2").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedChar {
                ch: '*',
                span: CodeSpan::new(6, 7)
            }
        );
        assert_eq!(err.to_string(), "unexpected character: *");
    }

    #[test]
    fn unknown_word() {
        let err = tokenize("tomorrow").unwrap_err();
        assert_eq!(err.to_string(), "unexpected word: tomorrow");
    }

    #[test]
    fn unit_word_without_amount_is_rejected() {
        assert!(matches!(
            tokenize("days").unwrap_err(),
            LexError::UnexpectedWord { .. }
        ));
    }

    #[test]
    fn unknown_unit() {
        let err = tokenize("3 blorps").unwrap_err();
        assert_eq!(
            err,
            LexError::InvalidUnit {
                word: "blorps".to_string(),
                span: CodeSpan::new(2, 8)
            }
        );
    }

    #[test]
    fn cast_needs_unit() {
        let err = tokenize("1 day as 5").unwrap_err();
        assert_eq!(
            err.to_string(),
            "error parsing cast: expected a unit after `as` but got \"5\""
        );
        let err = tokenize("1 day to").unwrap_err();
        assert!(matches!(err, LexError::MissingCastUnit { .. }));
    }

    #[test]
    fn malformed_dates() {
        let err = tokenize("12/x/2021").unwrap_err();
        assert_eq!(err.to_string(), "error parsing date: expected digit but got \"x\"");
        let err = tokenize("12/25-2021").unwrap_err();
        assert_eq!(err.to_string(), "error parsing date: expected \"/\" but got \"-\"");
        let err = tokenize("12/25/").unwrap_err();
        assert_eq!(err.to_string(), "error parsing date: expected digit but got end of input");
    }

    #[test]
    fn impossible_calendar_day() {
        let err = tokenize("2/30/2021").unwrap_err();
        assert!(matches!(
            err,
            LexError::InvalidDate {
                month: 2,
                day: 30,
                year: 2021,
                ..
            }
        ));
    }

    #[test]
    fn short_years_are_twentieth_century() {
        assert_eq!(
            values("12/25/21")[0],
            Token::Date(DateLiteral::Calendar(ymd(1921, 12, 25)))
        );
        assert_eq!(
            values("1/1/0")[0],
            Token::Date(DateLiteral::Calendar(ymd(1900, 1, 1)))
        );
        assert_eq!(
            values("1/1/100")[0],
            Token::Date(DateLiteral::Calendar(ymd(100, 1, 1)))
        );
    }

    #[test]
    fn integer_overflow() {
        let err = tokenize("99999999999999999999 days").unwrap_err();
        match err {
            LexError::BadInt { value, span, .. } => {
                assert_eq!(value, "99999999999999999999");
                assert_eq!(span, CodeSpan::new(0, 20));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn token_display() {
        let rendered: Vec<String> = values("12/25/2021 + 1 week as h")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            vec![
                "Token(DATE, 12/25/2021)",
                "Token(OP, +)",
                "Token(DURATION, 1 week)",
                "Token(CAST, HOUR)",
                "Token(EOF)",
            ]
        );
    }
}
