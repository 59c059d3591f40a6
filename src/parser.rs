//! Folds the token list into a single [`Expr`].
//!
//! ```text
//! program  := term (('+' | '-') term)* cast*
//! term     := DATE | DURATION
//! cast     := CAST
//! ```
//!
//! `+` and `-` are handled by precedence climbing. Both share one level, so
//! chains associate to the left. Casts wrap whatever has been reduced so far,
//! in source order.

use thiserror::Error;
use tracing::debug;

use crate::ast::Expr;
use crate::code::{CodeSpan, Spanned};
use crate::lexer::Token;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("error parsing program: not enough tokens")]
    Empty,

    #[error("expected {expected} but got {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        span: CodeSpan,
    },

    #[error("invalid operator: {op}")]
    InvalidOperator { op: char, span: CodeSpan },

    #[error("unexpected tokens after program end: {found}")]
    TrailingTokens { found: String, span: CodeSpan },
}

impl ParseError {
    pub fn span(&self) -> Option<CodeSpan> {
        match self {
            ParseError::Empty => None,
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidOperator { span, .. }
            | ParseError::TrailingTokens { span, .. } => Some(*span),
        }
    }
}

static EOF: Token = Token::Eof;

fn precedence(op: char) -> Option<u8> {
    match op {
        '+' | '-' => Some(0),
        _ => None,
    }
}

/// Index cursor over an immutable token list. Reading past the end yields
/// [`Token::Eof`], so a list without its terminator still parses.
struct TokenCursor<'t> {
    tokens: &'t [Spanned<Token>],
    pos: usize,
}

impl<'t> TokenCursor<'t> {
    fn new(tokens: &'t [Spanned<Token>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> (&'t Token, CodeSpan) {
        match self.tokens.get(self.pos) {
            Some(token) => (&token.value, token.span),
            None => {
                let end = self.tokens.last().map_or(0, |t| t.span.end);
                (&EOF, CodeSpan::point(end))
            }
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        matches!(self.current().0, Token::Eof)
    }

    /// The operator under the cursor if it binds at least as tightly as
    /// `min_prec`.
    fn peek_operator(&self, min_prec: u8) -> Result<Option<(char, u8)>, ParseError> {
        match self.current() {
            (Token::Op(op), span) => match precedence(*op) {
                Some(prec) if prec >= min_prec => Ok(Some((*op, prec))),
                Some(_) => Ok(None),
                None => Err(ParseError::InvalidOperator { op: *op, span }),
            },
            _ => Ok(None),
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.current() {
            (Token::Date(date), _) => Expr::Date(*date),
            (Token::Duration(duration), _) => Expr::Duration(*duration),
            (other, span) => {
                return Err(ParseError::UnexpectedToken {
                    expected: "DATE or DURATION",
                    found: other.summary(),
                    span,
                });
            }
        };
        self.advance();
        Ok(expr)
    }

    fn binary(&mut self, mut left: Expr, min_prec: u8) -> Result<Expr, ParseError> {
        while let Some((op, prec)) = self.peek_operator(min_prec)? {
            self.advance();
            let mut right = self.term()?;
            while let Some((_, next)) = self.peek_operator(prec + 1)? {
                right = self.binary(right, next)?;
            }
            left = match op {
                '+' => Expr::plus(left, right),
                _ => Expr::minus(left, right),
            };
        }
        Ok(left)
    }

    fn casts(&mut self, mut expr: Expr) -> Expr {
        while let (Token::Cast(unit), _) = self.current() {
            self.advance();
            expr = Expr::cast(expr, *unit);
        }
        expr
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.current() {
            (Token::Eof, _) => Ok(()),
            (other, span) => Err(ParseError::TrailingTokens {
                found: other.summary(),
                span,
            }),
        }
    }
}

/// Parse a token list produced by [`crate::lexer::tokenize`].
pub fn parse(tokens: &[Spanned<Token>]) -> Result<Expr, ParseError> {
    let mut cursor = TokenCursor::new(tokens);
    if cursor.at_end() {
        return Err(ParseError::Empty);
    }

    let first = cursor.term()?;
    let expr = cursor.binary(first, 0)?;
    let expr = cursor.casts(expr);
    cursor.expect_end()?;

    debug!(tree = %expr, "parsed expression");
    Ok(expr)
}
