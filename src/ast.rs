use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::unit::{Duration, Unit};

/// A point in time as written in the source: a calendar day, or `now` /
/// `today`, which are resolved against the evaluator's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateLiteral {
    Now,
    Today,
    Calendar(NaiveDate),
}

impl fmt::Display for DateLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateLiteral::Now => f.write_str("now"),
            DateLiteral::Today => f.write_str("today"),
            DateLiteral::Calendar(date) => write!(f, "{}", date.format("%-m/%-d/%Y")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expr {
    Date(DateLiteral),
    Duration(Duration),
    Plus(Box<Expr>, Box<Expr>),
    Minus(Box<Expr>, Box<Expr>),
    Cast(Box<Expr>, Unit),
}

impl Expr {
    pub fn plus(left: Expr, right: Expr) -> Self {
        Expr::Plus(Box::new(left), Box::new(right))
    }

    pub fn minus(left: Expr, right: Expr) -> Self {
        Expr::Minus(Box::new(left), Box::new(right))
    }

    pub fn cast(inner: Expr, unit: Unit) -> Self {
        Expr::Cast(Box::new(inner), unit)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Date(date) => write!(f, "DateNode({date})"),
            Expr::Duration(duration) => write!(f, "DurationNode({duration})"),
            Expr::Plus(left, right) => write!(f, "PlusNode({left}, {right})"),
            Expr::Minus(left, right) => write!(f, "MinusNode({left}, {right})"),
            Expr::Cast(inner, unit) => write!(f, "CastNode({inner}, {unit})"),
        }
    }
}
