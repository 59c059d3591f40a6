//! # datecalc
//!
//! A small calculator for dates and durations:
//!
//! ```
//! use chrono::NaiveDate;
//! use datecalc::Calculator;
//!
//! let anchor = NaiveDate::from_ymd_opt(2021, 12, 20).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let calc = Calculator::anchored(anchor);
//!
//! assert_eq!(calc.calculate("12/25/2021 - today").unwrap().output, "5 days");
//! assert_eq!(calc.calculate("1 week as hours").unwrap().output, "168 hours");
//! ```
//!
//! Input goes through three stages, each failing fast with its own error:
//! [`lexer::tokenize`], [`parser::parse`] and [`interpreter::Evaluator`].

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod ast;
pub mod code;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod settings;
pub mod unit;

pub use ast::{DateLiteral, Expr};
pub use code::{Code, CodeSpan, Spanned};
pub use format::{format_tokens, format_tree, DateStyle};
pub use interpreter::{evaluate, EvalError, Evaluator, Value};
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse, ParseError};
pub use settings::Settings;
pub use unit::{Duration, Unit};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalcError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl CalcError {
    /// Location of the offending input, when the stage knows it.
    pub fn span(&self) -> Option<CodeSpan> {
        match self {
            CalcError::Lex(e) => Some(e.span()),
            CalcError::Parse(e) => e.span(),
            CalcError::Eval(_) => None,
        }
    }
}

/// Every intermediate product of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub tokens: Vec<Spanned<Token>>,
    pub tree: Expr,
    pub value: Value,
    pub output: String,
}

/// Runs the whole pipeline. Without an anchor, `now` and `today` are read
/// from the local clock on each call.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    anchor: Option<NaiveDateTime>,
    style: DateStyle,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchored(anchor: NaiveDateTime) -> Self {
        Self {
            anchor: Some(anchor),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: DateStyle) -> Self {
        self.style = style;
        self
    }

    fn evaluator(&self) -> Evaluator {
        match self.anchor {
            Some(anchor) => Evaluator::new(anchor),
            None => Evaluator::now(),
        }
        .with_style(self.style)
    }

    /// Evaluate an already parsed tree.
    pub fn eval(&self, tree: &Expr) -> Result<Value, EvalError> {
        self.evaluator().eval(tree)
    }

    pub fn style(&self) -> DateStyle {
        self.style
    }

    pub fn calculate(&self, input: &str) -> Result<Calculation, CalcError> {
        debug!(input, "calculating");
        let tokens = tokenize(input)?;
        let tree = parse(&tokens)?;
        let value = self.eval(&tree)?;
        let output = value.render(self.style);
        Ok(Calculation {
            tokens,
            tree,
            value,
            output,
        })
    }
}

/// Tokenize, parse and evaluate `input` against the local clock.
pub fn calculate(input: &str) -> Result<String, CalcError> {
    Calculator::new().calculate(input).map(|c| c.output)
}
