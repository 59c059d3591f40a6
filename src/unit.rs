//! Time units, their millisecond conversion factors and the alias table used
//! to resolve unit words.
//!
//! Month and year are calendar averages (30.436875 and 365.25 days), not
//! calendar-exact lengths. Results depend on these exact constants.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::Serialize;
use std::fmt;

pub const MILLISECOND: f64 = 1.0;
pub const SECOND: f64 = 1000.0;
pub const MINUTE: f64 = SECOND * 60.0;
pub const HOUR: f64 = MINUTE * 60.0;
pub const DAY: f64 = HOUR * 24.0;
pub const WEEK: f64 = DAY * 7.0;
pub const MONTH: f64 = DAY * 30.436875;
pub const YEAR: f64 = DAY * 365.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Canonical unit names in alias registration order. An alias shared by
/// several names belongs to the first one listed, so `m` is a minute and
/// `s` a second.
const REGISTRATION_ORDER: [(&str, Unit); 8] = [
    ("seconds", Unit::Second),
    ("minutes", Unit::Minute),
    ("milliseconds", Unit::Millisecond),
    ("hours", Unit::Hour),
    ("days", Unit::Day),
    ("weeks", Unit::Week),
    ("months", Unit::Month),
    ("years", Unit::Year),
];

lazy_static! {
    static ref UNIT_ALIASES: IndexMap<String, Unit> = build_aliases();
}

fn build_aliases() -> IndexMap<String, Unit> {
    let prefixes: Vec<(&str, Unit)> = REGISTRATION_ORDER
        .iter()
        .flat_map(|&(name, unit)| {
            name.char_indices()
                .map(move |(i, c)| (&name[..i + c.len_utf8()], unit))
        })
        .collect();

    let mut aliases = IndexMap::with_capacity(prefixes.len());
    for (alias, unit) in prefixes {
        aliases.entry(alias.to_string()).or_insert(unit);
    }
    aliases
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Millisecond,
        Unit::Second,
        Unit::Minute,
        Unit::Hour,
        Unit::Day,
        Unit::Week,
        Unit::Month,
        Unit::Year,
    ];

    /// Resolve a lowercase unit word or any prefix of one.
    pub fn from_alias(word: &str) -> Option<Unit> {
        UNIT_ALIASES.get(word).copied()
    }

    /// Every alias with the unit it resolves to, in registration order.
    pub fn aliases() -> impl Iterator<Item = (&'static str, Unit)> {
        UNIT_ALIASES.iter().map(|(alias, unit)| (alias.as_str(), *unit))
    }

    /// Milliseconds in one of this unit.
    pub fn factor(self) -> f64 {
        match self {
            Unit::Millisecond => MILLISECOND,
            Unit::Second => SECOND,
            Unit::Minute => MINUTE,
            Unit::Hour => HOUR,
            Unit::Day => DAY,
            Unit::Week => WEEK,
            Unit::Month => MONTH,
            Unit::Year => YEAR,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Unit::Millisecond => "millisecond",
            Unit::Second => "second",
            Unit::Minute => "minute",
            Unit::Hour => "hour",
            Unit::Day => "day",
            Unit::Week => "week",
            Unit::Month => "month",
            Unit::Year => "year",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_uppercase())
    }
}

/// A signed amount of time in a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Duration {
    pub amount: f64,
    pub unit: Unit,
}

impl Duration {
    pub fn new(amount: f64, unit: Unit) -> Self {
        Self { amount, unit }
    }

    /// Re-express this duration in `unit`.
    pub fn to_unit(self, unit: Unit) -> Duration {
        let factor = self.unit.factor() / unit.factor();
        Duration::new(self.amount * factor, unit)
    }

    pub fn as_millis(self) -> f64 {
        self.to_unit(Unit::Millisecond).amount
    }

    /// Sum in the left operand's unit.
    pub fn plus(self, other: Duration) -> Duration {
        Duration::new(self.amount + other.to_unit(self.unit).amount, self.unit)
    }

    /// Difference in the left operand's unit.
    pub fn minus(self, other: Duration) -> Duration {
        Duration::new(self.amount - other.to_unit(self.unit).amount, self.unit)
    }
}

/// Shortest decimal form, switching to exponent notation below 1e-6 and from
/// 1e21 up: `0.5`, `3.168808781402895e-11`, `1e+21`.
fn format_amount(amount: f64) -> String {
    let magnitude = amount.abs();
    if magnitude != 0.0 && (magnitude < 1e-6 || magnitude >= 1e21) {
        let text = format!("{amount:e}");
        if text.contains("e-") {
            text
        } else {
            text.replacen('e', "e+", 1)
        }
    } else {
        format!("{amount}")
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -0 prints as 0
        let amount = if self.amount == 0.0 { 0.0 } else { self.amount };
        let plural = if amount == 1.0 { "" } else { "s" };
        write!(f, "{} {}{plural}", format_amount(amount), self.unit.name())
    }
}
