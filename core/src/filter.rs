//! Filter compiler for conference queries.
//!
//! Clients send a list of `(field, operator, value)` clauses. [`ConferenceQuery::compile`]
//! validates them against a whitelist, coerces numeric values, enforces the
//! single-inequality-field rule and derives the sort order. The resulting
//! query is backend-neutral: the in-memory store evaluates it with
//! [`ConferenceQuery::apply`], the Postgres store translates it to SQL from
//! [`ConferenceQuery::predicates`] and [`ConferenceQuery::order`].
//!
//! # Ordering
//!
//! If an inequality field is present it is the primary sort key, followed by
//! the conference name. Otherwise results are sorted by name alone.
//!
//! # Example
//!
//! ```
//! use conference_core::filter::{ConferenceField, ConferenceQuery, FilterClause};
//!
//! let query = ConferenceQuery::compile(&[
//!     FilterClause::new("city", "=", "London"),
//!     FilterClause::new("MAX_ATTENDEES", "GT", "10"),
//! ])
//! .unwrap();
//!
//! assert_eq!(query.order(), vec![ConferenceField::MaxAttendees, ConferenceField::Name]);
//! ```

use crate::model::Conference;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while compiling filter clauses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field name outside the whitelist.
    #[error("Filter contains invalid field: {0}")]
    UnknownField(String),

    /// Operator name outside the whitelist.
    #[error("Filter contains invalid operator: {0}")]
    UnknownOperator(String),

    /// Inequality clauses on two different fields.
    #[error("Inequality filter is allowed on only one field")]
    MultipleInequalityFields {
        /// Field that already carries an inequality.
        first: ConferenceField,
        /// Field that tried to add another.
        second: ConferenceField,
    },

    /// Non-numeric value for a numeric field.
    #[error("Filter value for {field} must be an integer, got '{value}'")]
    NotAnInteger {
        /// Offending field.
        field: ConferenceField,
        /// Raw value.
        value: String,
    },
}

/// A conference property that can appear in a predicate or sort order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConferenceField {
    /// Host city.
    City,
    /// Topics (repeated).
    Topics,
    /// Start month.
    Month,
    /// Capacity.
    MaxAttendees,
    /// Remaining seats. Not user-filterable.
    SeatsAvailable,
    /// Conference name. Not user-filterable; used for ordering.
    Name,
}

impl ConferenceField {
    /// Parse a user-supplied field name. Accepts property names and
    /// enumerated wire names; rejects anything else.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownField`] for names outside the whitelist.
    pub fn from_user(name: &str) -> Result<Self, FilterError> {
        match name {
            "city" | "CITY" => Ok(Self::City),
            "topics" | "TOPIC" => Ok(Self::Topics),
            "month" | "MONTH" => Ok(Self::Month),
            "maxAttendees" | "MAX_ATTENDEES" => Ok(Self::MaxAttendees),
            other => Err(FilterError::UnknownField(other.to_string())),
        }
    }

    /// Stored property name.
    #[must_use]
    pub const fn property(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Topics => "topics",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
            Self::SeatsAvailable => "seatsAvailable",
            Self::Name => "name",
        }
    }

    /// Whether values of this field compare as integers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Month | Self::MaxAttendees | Self::SeatsAvailable)
    }

    /// Whether this field holds a list of values.
    #[must_use]
    pub const fn is_repeated(self) -> bool {
        matches!(self, Self::Topics)
    }

    fn values(self, conference: &Conference) -> Vec<FilterValue> {
        match self {
            Self::City => vec![FilterValue::Text(conference.city.clone())],
            Self::Topics => conference
                .topics
                .iter()
                .cloned()
                .map(FilterValue::Text)
                .collect(),
            Self::Month => vec![FilterValue::Int(i64::from(conference.month))],
            Self::MaxAttendees => vec![FilterValue::Int(i64::from(conference.max_attendees))],
            Self::SeatsAvailable => vec![FilterValue::Int(i64::from(conference.seats_available))],
            Self::Name => vec![FilterValue::Text(conference.name.clone())],
        }
    }

    /// Ascending sort key; repeated fields sort by their smallest element.
    fn sort_key(self, conference: &Conference) -> Option<FilterValue> {
        self.values(conference).into_iter().min()
    }
}

impl fmt::Display for ConferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

/// Comparison operator of a predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `!=`
    Ne,
}

impl Operator {
    /// SQL-style symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Ne => "!=",
        }
    }

    /// Every operator except equality is an inequality.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Whether `stored.cmp(&operand)` satisfies this operator.
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
        }
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" | "EQ" => Ok(Self::Eq),
            ">" | "GT" => Ok(Self::Gt),
            ">=" | "GTEQ" => Ok(Self::Ge),
            "<" | "LT" => Ok(Self::Lt),
            "<=" | "LTEQ" => Ok(Self::Le),
            "!=" | "NE" => Ok(Self::Ne),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A typed predicate operand.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterValue {
    /// Integer operand for numeric fields.
    Int(i64),
    /// Text operand for string fields.
    Text(String),
}

/// One compiled `field op value` predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field under test.
    pub field: ConferenceField,
    /// Comparison.
    pub op: Operator,
    /// Operand, already coerced to the field's type.
    pub value: FilterValue,
}

impl Predicate {
    /// Evaluates the predicate. A repeated field matches when any element does.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        self.field.values(conference).iter().any(|stored| {
            match (stored, &self.value) {
                (FilterValue::Int(a), FilterValue::Int(b)) => self.op.holds(a.cmp(b)),
                (FilterValue::Text(a), FilterValue::Text(b)) => self.op.holds(a.cmp(b)),
                _ => false,
            }
        })
    }
}

/// A raw clause as sent by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Field name (`city` or `CITY`, ...).
    pub field: String,
    /// Operator (`>=` or `GTEQ`, ...).
    pub operator: String,
    /// Operand as text.
    pub value: String,
}

impl FilterClause {
    /// Convenience constructor.
    #[must_use]
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A validated conference query: ANDed predicates plus sort order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceQuery {
    predicates: Vec<Predicate>,
    inequality_field: Option<ConferenceField>,
}

impl ConferenceQuery {
    /// Query over every conference, ordered by name.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile client clauses into a query.
    ///
    /// # Errors
    ///
    /// - `UnknownField` / `UnknownOperator` for names outside the whitelist
    /// - `NotAnInteger` when a numeric field gets non-numeric text
    /// - `MultipleInequalityFields` when inequalities span two fields
    pub fn compile(clauses: &[FilterClause]) -> Result<Self, FilterError> {
        clauses.iter().try_fold(Self::all(), |query, clause| {
            let field = ConferenceField::from_user(&clause.field)?;
            let op: Operator = clause.operator.parse()?;
            let value = if field.is_numeric() {
                clause
                    .value
                    .trim()
                    .parse::<i64>()
                    .map(FilterValue::Int)
                    .map_err(|_| FilterError::NotAnInteger {
                        field,
                        value: clause.value.clone(),
                    })?
            } else {
                FilterValue::Text(clause.value.clone())
            };
            query.and(Predicate { field, op, value })
        })
    }

    /// Add a predicate, enforcing the single-inequality-field rule.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleInequalityFields`] if `predicate` is an
    /// inequality on a different field than an earlier one.
    pub fn and(mut self, predicate: Predicate) -> Result<Self, FilterError> {
        if predicate.op.is_inequality() {
            match self.inequality_field {
                Some(first) if first != predicate.field => {
                    return Err(FilterError::MultipleInequalityFields {
                        first,
                        second: predicate.field,
                    });
                }
                _ => self.inequality_field = Some(predicate.field),
            }
        }
        self.predicates.push(predicate);
        Ok(self)
    }

    /// The ANDed predicates in clause order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The single field carrying inequality predicates, if any.
    #[must_use]
    pub const fn inequality_field(&self) -> Option<ConferenceField> {
        self.inequality_field
    }

    /// Ascending sort keys.
    #[must_use]
    pub fn order(&self) -> Vec<ConferenceField> {
        match self.inequality_field {
            Some(field) if field != ConferenceField::Name => vec![field, ConferenceField::Name],
            _ => vec![ConferenceField::Name],
        }
    }

    /// Whether a conference satisfies every predicate.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        self.predicates.iter().all(|p| p.matches(conference))
    }

    /// Compare two conferences by this query's sort order, then by key.
    #[must_use]
    pub fn compare(&self, a: &Conference, b: &Conference) -> Ordering {
        self.order()
            .into_iter()
            .map(|field| field.sort_key(a).cmp(&field.sort_key(b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.key.cmp(&b.key))
    }

    /// Filter and sort a candidate set.
    #[must_use]
    pub fn apply(&self, conferences: impl IntoIterator<Item = Conference>) -> Vec<Conference> {
        let mut matched: Vec<Conference> = conferences
            .into_iter()
            .filter(|c| self.matches(c))
            .collect();
        matched.sort_by(|a, b| self.compare(a, b));
        matched
    }
}
