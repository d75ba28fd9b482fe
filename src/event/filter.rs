//! Event filters: a where-clause predicate plus a select-clause projection.
//!
//! Filters are validated and compiled once at construction; `Like` patterns
//! become anchored regular expressions. Evaluation never fails: a missing
//! field or a type mismatch simply does not match.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::Variant;

use super::record::{fields, EventRecord, FieldPath};

/// Where-clause expression evaluated against an event record.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
    Equals { field: FieldPath, value: Variant },
    GreaterThan { field: FieldPath, value: Variant },
    GreaterThanOrEqual { field: FieldPath, value: Variant },
    LessThan { field: FieldPath, value: Variant },
    LessThanOrEqual { field: FieldPath, value: Variant },

    /// String match with `%` (any run) and `_` (any single char) wildcards.
    /// A backslash escapes the next character.
    Like { field: FieldPath, pattern: String },

    /// Field is absent or `Null`.
    IsNull { field: FieldPath },

    InList { field: FieldPath, values: Vec<Variant> },

    Not { expr: Box<FilterExpr> },
    And { exprs: Vec<FilterExpr> },
    Or { exprs: Vec<FilterExpr> },
}

impl FilterExpr {
    #[must_use]
    pub fn equals(field: &str, value: impl Into<Variant>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn greater_than_or_equal(field: &str, value: impl Into<Variant>) -> Self {
        Self::GreaterThanOrEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn less_than(field: &str, value: impl Into<Variant>) -> Self {
        Self::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn like(field: &str, pattern: impl Into<String>) -> Self {
        Self::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    #[must_use]
    pub fn and(exprs: Vec<Self>) -> Self {
        Self::And { exprs }
    }

    #[must_use]
    pub fn or(exprs: Vec<Self>) -> Self {
        Self::Or { exprs }
    }

    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(expr: Self) -> Self {
        Self::Not { expr: Box::new(expr) }
    }

    fn collect_like_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Like { pattern, .. } => out.push(pattern),
            Self::Not { expr } => expr.collect_like_patterns(out),
            Self::And { exprs } | Self::Or { exprs } => {
                for e in exprs {
                    e.collect_like_patterns(out);
                }
            }
            _ => {}
        }
    }
}

/// Translates a `Like` pattern to an anchored regex source string.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Selects which events match and which of their fields are returned.
///
/// # Examples
///
/// ```
/// use historian::event::{EventFilter, FilterExpr};
///
/// let filter = EventFilter::new(
///     vec!["EventId".into(), "Severity".into()],
///     Some(FilterExpr::greater_than_or_equal("Severity", 500)),
/// )
/// .unwrap();
/// assert_eq!(filter.select().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct EventFilter {
    select: Vec<FieldPath>,
    where_clause: Option<FilterExpr>,
    like: HashMap<String, Regex>,
}

impl EventFilter {
    /// Builds a filter, compiling any `Like` patterns.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidLikePattern` if a pattern cannot be
    /// compiled.
    pub fn new(select: Vec<FieldPath>, where_clause: Option<FilterExpr>) -> Result<Self, ValidationError> {
        let mut patterns = Vec::new();
        if let Some(expr) = where_clause.as_ref() {
            expr.collect_like_patterns(&mut patterns);
        }

        let mut like = HashMap::with_capacity(patterns.len());
        for pattern in patterns {
            if like.contains_key(pattern) {
                continue;
            }
            let compiled = Regex::new(&like_to_regex(pattern)).map_err(|e| ValidationError::InvalidLikePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            like.insert(pattern.to_string(), compiled);
        }

        Ok(Self {
            select,
            where_clause,
            like,
        })
    }

    /// Filter selecting the standard base event fields, matching every event.
    #[must_use]
    pub fn select_all_standard() -> Self {
        Self {
            select: fields::STANDARD.iter().copied().map(FieldPath::from).collect(),
            where_clause: None,
            like: HashMap::new(),
        }
    }

    /// The select clause, in projection order.
    #[must_use]
    pub fn select(&self) -> &[FieldPath] {
        &self.select
    }

    /// The where clause, if any.
    #[must_use]
    pub const fn where_clause(&self) -> Option<&FilterExpr> {
        self.where_clause.as_ref()
    }

    /// Returns true if the record satisfies the where clause.
    #[must_use]
    pub fn evaluate(&self, record: &EventRecord) -> bool {
        self.where_clause
            .as_ref()
            .map_or(true, |expr| self.eval_expr(expr, record))
    }

    /// Projects the record down to the selected fields, `Null` where absent.
    #[must_use]
    pub fn project(&self, record: &EventRecord) -> Vec<Variant> {
        self.select
            .iter()
            .map(|path| record.field(path).cloned().unwrap_or(Variant::Null))
            .collect()
    }

    fn eval_expr(&self, expr: &FilterExpr, record: &EventRecord) -> bool {
        use std::cmp::Ordering;

        let cmp = |field: &FieldPath, value: &Variant| record.field(field).and_then(|v| v.compare(value));

        match expr {
            FilterExpr::Equals { field, value } => record.field(field).is_some_and(|v| v.loosely_equals(value)),
            FilterExpr::GreaterThan { field, value } => cmp(field, value) == Some(Ordering::Greater),
            FilterExpr::GreaterThanOrEqual { field, value } => {
                matches!(cmp(field, value), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterExpr::LessThan { field, value } => cmp(field, value) == Some(Ordering::Less),
            FilterExpr::LessThanOrEqual { field, value } => {
                matches!(cmp(field, value), Some(Ordering::Less | Ordering::Equal))
            }
            FilterExpr::Like { field, pattern } => {
                let Some(text) = record.field(field).and_then(Variant::as_string) else {
                    return false;
                };
                self.like.get(pattern).is_some_and(|re| re.is_match(text))
            }
            FilterExpr::IsNull { field } => record.field(field).map_or(true, Variant::is_null),
            FilterExpr::InList { field, values } => record
                .field(field)
                .is_some_and(|v| values.iter().any(|candidate| v.loosely_equals(candidate))),
            FilterExpr::Not { expr } => !self.eval_expr(expr, record),
            FilterExpr::And { exprs } => exprs.iter().all(|e| self.eval_expr(e, record)),
            FilterExpr::Or { exprs } => exprs.iter().any(|e| self.eval_expr(e, record)),
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::select_all_standard()
    }
}
