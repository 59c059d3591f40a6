use chrono::{Local, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{DateLiteral, Expr};
use crate::format::{format_point_in_time, DateStyle};
use crate::unit::{Duration, Unit, DAY};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("adding dates is not supported")]
    AddDates,

    #[error("subtracting date from duration is not supported")]
    SubtractDateFromDuration,

    #[error("can't convert a point in time to a duration")]
    CastPointInTime,

    #[error("date out of range: {at} shifted by {duration}")]
    OutOfRange { at: String, duration: String },
}

/// Result of evaluating an expression or any of its sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    PointInTime(NaiveDateTime),
    Duration(Duration),
}

impl Value {
    pub fn render(&self, style: DateStyle) -> String {
        match self {
            Value::PointInTime(at) => format_point_in_time(*at, style),
            Value::Duration(duration) => duration.to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::PointInTime(_) => "point in time",
            Value::Duration(_) => "duration",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DateStyle::default()))
    }
}

/// Walks an [`Expr`], resolving `now` and `today` against a fixed anchor so
/// that every occurrence in one expression denotes the same instant.
#[derive(Debug, Clone)]
pub struct Evaluator {
    anchor: NaiveDateTime,
    style: DateStyle,
}

impl Evaluator {
    pub fn new(anchor: NaiveDateTime) -> Self {
        Self {
            anchor,
            style: DateStyle::default(),
        }
    }

    /// Anchored at the local wall clock, to millisecond precision.
    pub fn now() -> Self {
        Self::new(Local::now().naive_local().trunc_subsecs(3))
    }

    pub fn with_style(mut self, style: DateStyle) -> Self {
        self.style = style;
        self
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        let value = self.visit(expr)?;
        debug!(kind = value.kind(), result = %value, "evaluated expression");
        Ok(value)
    }

    /// Evaluate and render with this evaluator's date style.
    pub fn eval_to_string(&self, expr: &Expr) -> Result<String, EvalError> {
        self.eval(expr).map(|value| value.render(self.style))
    }

    fn resolve(&self, date: DateLiteral) -> NaiveDateTime {
        match date {
            DateLiteral::Now => self.anchor,
            DateLiteral::Today => self.anchor.date().and_time(NaiveTime::MIN),
            DateLiteral::Calendar(day) => day.and_time(NaiveTime::MIN),
        }
    }

    fn visit(&self, expr: &Expr) -> Result<Value, EvalError> {
        let value = match expr {
            Expr::Date(date) => Value::PointInTime(self.resolve(*date)),
            Expr::Duration(duration) => Value::Duration(*duration),
            Expr::Plus(left, right) => self.plus(self.visit(left)?, self.visit(right)?)?,
            Expr::Minus(left, right) => self.minus(self.visit(left)?, self.visit(right)?)?,
            Expr::Cast(inner, unit) => match self.visit(inner)? {
                Value::Duration(duration) => Value::Duration(duration.to_unit(*unit)),
                Value::PointInTime(_) => return Err(EvalError::CastPointInTime),
            },
        };
        trace!(node = %expr, result = ?value, "visited node");
        Ok(value)
    }

    fn plus(&self, left: Value, right: Value) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::PointInTime(_), Value::PointInTime(_)) => Err(EvalError::AddDates),
            (Value::PointInTime(at), Value::Duration(duration))
            | (Value::Duration(duration), Value::PointInTime(at)) => {
                shift(at, duration, 1.0).map(Value::PointInTime)
            }
            (Value::Duration(left), Value::Duration(right)) => Ok(Value::Duration(left.plus(right))),
        }
    }

    fn minus(&self, left: Value, right: Value) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::PointInTime(left), Value::PointInTime(right)) => {
                Ok(Value::Duration(days_between(left, right)))
            }
            (Value::PointInTime(at), Value::Duration(duration)) => {
                shift(at, duration, -1.0).map(Value::PointInTime)
            }
            (Value::Duration(_), Value::PointInTime(_)) => {
                Err(EvalError::SubtractDateFromDuration)
            }
            (Value::Duration(left), Value::Duration(right)) => {
                Ok(Value::Duration(left.minus(right)))
            }
        }
    }
}

/// Non-negative distance between two instants, in days.
fn days_between(left: NaiveDateTime, right: NaiveDateTime) -> Duration {
    let millis = left.signed_duration_since(right).num_milliseconds().unsigned_abs();
    Duration::new(millis as f64 / DAY, Unit::Day)
}

/// Move `at` by `duration` (times `sign`), truncated to whole milliseconds.
fn shift(at: NaiveDateTime, duration: Duration, sign: f64) -> Result<NaiveDateTime, EvalError> {
    let out_of_range = || EvalError::OutOfRange {
        at: at.to_string(),
        duration: duration.to_string(),
    };

    let millis = (duration.as_millis() * sign).trunc();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let delta = TimeDelta::try_milliseconds(millis as i64).ok_or_else(out_of_range)?;
    at.checked_add_signed(delta).ok_or_else(out_of_range)
}

/// Evaluate against the local clock and render with the full date style.
pub fn evaluate(expr: &Expr) -> Result<String, EvalError> {
    Evaluator::now().eval_to_string(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 28)
            .unwrap()
            .and_hms_opt(13, 45, 10)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Expr {
        Expr::Date(DateLiteral::Calendar(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
    }

    fn dur(amount: f64, unit: Unit) -> Expr {
        Expr::Duration(Duration::new(amount, unit))
    }

    fn eval(expr: &Expr) -> Result<Value, EvalError> {
        Evaluator::new(anchor()).eval(expr)
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Value {
        Value::PointInTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, s)
                .unwrap(),
        )
    }

    #[test]
    fn symbolic_dates_use_anchor() {
        assert_eq!(eval(&Expr::Date(DateLiteral::Now)), Ok(at(2024, 2, 28, 13, 45, 10)));
        assert_eq!(eval(&Expr::Date(DateLiteral::Today)), Ok(at(2024, 2, 28, 0, 0, 0)));
    }

    #[test]
    fn date_plus_duration_either_side() {
        let forward = Expr::plus(date(2024, 2, 28), dur(2.0, Unit::Day));
        let backward = Expr::plus(dur(2.0, Unit::Day), date(2024, 2, 28));
        assert_eq!(eval(&forward), Ok(at(2024, 3, 1, 0, 0, 0)));
        assert_eq!(eval(&backward), Ok(at(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn date_minus_duration() {
        let expr = Expr::minus(Expr::Date(DateLiteral::Now), dur(90.0, Unit::Minute));
        assert_eq!(eval(&expr), Ok(at(2024, 2, 28, 12, 15, 10)));
    }

    #[test]
    fn month_shift_uses_average_length() {
        let expr = Expr::plus(date(2021, 1, 1), dur(1.0, Unit::Month));
        assert_eq!(eval(&expr), Ok(at(2021, 1, 31, 10, 29, 6)));
    }

    #[test]
    fn date_difference_is_absolute_days() {
        let earlier = date(2021, 12, 20);
        let later = date(2021, 12, 25);
        let expected = Ok(Value::Duration(Duration::new(5.0, Unit::Day)));
        assert_eq!(eval(&Expr::minus(later.clone(), earlier.clone())), expected);
        assert_eq!(eval(&Expr::minus(earlier, later)), expected);
    }

    #[test]
    fn fractional_day_difference() {
        let expr = Expr::minus(Expr::Date(DateLiteral::Now), Expr::Date(DateLiteral::Today));
        let Ok(Value::Duration(d)) = eval(&expr) else {
            panic!("expected a duration");
        };
        assert_eq!(d.unit, Unit::Day);
        assert!((d.amount - (13.0 * 3600.0 + 45.0 * 60.0 + 10.0) / 86400.0).abs() < 1e-12);
    }

    #[test]
    fn duration_arithmetic_keeps_left_unit() {
        let expr = Expr::minus(dur(1.0, Unit::Week), dur(3.0, Unit::Day));
        let Ok(Value::Duration(d)) = eval(&expr) else {
            panic!("expected a duration");
        };
        assert_eq!(d.unit, Unit::Week);
        assert!((d.amount - 4.0 / 7.0).abs() < 1e-12);

        let expr = Expr::minus(dur(3.0, Unit::Day), dur(1.0, Unit::Week));
        assert_eq!(eval(&expr), Ok(Value::Duration(Duration::new(-4.0, Unit::Day))));
    }

    #[test]
    fn casts() {
        let expr = Expr::cast(dur(1.0, Unit::Week), Unit::Hour);
        assert_eq!(eval(&expr), Ok(Value::Duration(Duration::new(168.0, Unit::Hour))));

        let expr = Expr::cast(Expr::cast(dur(7.0, Unit::Day), Unit::Hour), Unit::Week);
        let Ok(Value::Duration(d)) = eval(&expr) else {
            panic!("expected a duration");
        };
        assert_eq!(d.unit, Unit::Week);
        assert!((d.amount - 1.0).abs() < 1e-12);
    }

    #[test]
    fn type_errors() {
        let now = || Expr::Date(DateLiteral::Now);
        assert_eq!(eval(&Expr::plus(now(), now())), Err(EvalError::AddDates));
        assert_eq!(
            eval(&Expr::minus(dur(1.0, Unit::Day), now())),
            Err(EvalError::SubtractDateFromDuration)
        );
        assert_eq!(
            eval(&Expr::cast(now(), Unit::Day)),
            Err(EvalError::CastPointInTime)
        );
    }

    #[test]
    fn errors_in_subtrees_propagate() {
        let now = || Expr::Date(DateLiteral::Now);
        let expr = Expr::cast(Expr::plus(Expr::plus(now(), now()), dur(1.0, Unit::Day)), Unit::Day);
        assert_eq!(eval(&expr), Err(EvalError::AddDates));
    }

    #[test]
    fn shift_out_of_range() {
        let expr = Expr::plus(date(2021, 1, 1), dur(9e15, Unit::Year));
        assert!(matches!(eval(&expr), Err(EvalError::OutOfRange { .. })));
        let expr = Expr::plus(date(2021, 1, 1), dur(1e300, Unit::Year));
        assert!(matches!(eval(&expr), Err(EvalError::OutOfRange { .. })));
    }

    #[test]
    fn render_with_style() {
        let evaluator = Evaluator::new(anchor()).with_style(DateStyle::Short);
        assert_eq!(
            evaluator.eval_to_string(&Expr::Date(DateLiteral::Now)),
            Ok("2/28/2024, 13:45".to_string())
        );
        assert_eq!(
            evaluator.eval_to_string(&dur(2.0, Unit::Hour)),
            Ok("2 hours".to_string())
        );
    }
}
