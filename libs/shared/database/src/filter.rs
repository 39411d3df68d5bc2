use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

/// Inclusive bounds on one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCondition {
    pub field: String,
    pub gte: Option<Value>,
    pub lte: Option<Value>,
}

/// Equality and range conditions, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub equals: Vec<(String, Value)>,
    pub ranges: Vec<RangeCondition>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn between(mut self, field: &str, gte: impl Into<Value>, lte: impl Into<Value>) -> Self {
        self.ranges.push(RangeCondition {
            field: field.to_string(),
            gte: Some(gte.into()),
            lte: Some(lte.into()),
        });
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        let equal = self
            .equals
            .iter()
            .all(|(field, expected)| record.get(field).is_some_and(|actual| actual == expected));

        equal
            && self.ranges.iter().all(|range| {
                let Some(actual) = record.get(&range.field) else {
                    return false;
                };
                let above = range.gte.as_ref().map_or(true, |low| {
                    matches!(compare_values(actual, low), Some(Ordering::Greater | Ordering::Equal))
                });
                let below = range.lte.as_ref().map_or(true, |high| {
                    matches!(compare_values(actual, high), Some(Ordering::Less | Ordering::Equal))
                });
                above && below
            })
    }
}

/// Orders two JSON scalars of the same kind. ISO-8601 dates and times
/// compare correctly as strings.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

type ConflictCheck = dyn Fn(&Value) -> bool + Send + Sync;

/// Decides whether an existing record blocks a guarded write.
///
/// `filter` narrows the candidate set (and is what remote backends push down
/// as a query); `check` is evaluated on each candidate. Records sharing the id
/// being written are never treated as conflicts.
pub struct ConflictPredicate {
    pub filter: RecordFilter,
    check: Box<ConflictCheck>,
}

impl ConflictPredicate {
    pub fn new<F>(filter: RecordFilter, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            filter,
            check: Box::new(check),
        }
    }

    /// Every record matching `filter` is a conflict.
    pub fn any_match(filter: RecordFilter) -> Self {
        Self::new(filter, |_| true)
    }

    pub fn conflicts_with(&self, id: &str, record: &Value) -> bool {
        let same_record = record.get("id").and_then(Value::as_str) == Some(id);
        !same_record && self.filter.matches(record) && (self.check)(record)
    }
}

impl fmt::Debug for ConflictPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictPredicate")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_and_range_conditions_combine() {
        let filter = RecordFilter::new()
            .eq("doctor_id", "d-1")
            .between("date", "2025-06-01", "2025-06-30");

        assert!(filter.matches(&json!({"doctor_id": "d-1", "date": "2025-06-01"})));
        assert!(filter.matches(&json!({"doctor_id": "d-1", "date": "2025-06-30"})));
        assert!(!filter.matches(&json!({"doctor_id": "d-1", "date": "2025-07-01"})));
        assert!(!filter.matches(&json!({"doctor_id": "d-2", "date": "2025-06-10"})));
        assert!(!filter.matches(&json!({"doctor_id": "d-1"})));
    }

    #[test]
    fn mismatched_kinds_never_satisfy_a_range() {
        let filter = RecordFilter::new().between("priority", 1, 5);

        assert!(filter.matches(&json!({"priority": 3})));
        assert!(!filter.matches(&json!({"priority": "3"})));
    }

    #[test]
    fn predicate_ignores_the_record_being_written() {
        let predicate = ConflictPredicate::any_match(RecordFilter::new().eq("doctor_id", "d-1"));

        assert!(predicate.conflicts_with("a", &json!({"id": "b", "doctor_id": "d-1"})));
        assert!(!predicate.conflicts_with("a", &json!({"id": "a", "doctor_id": "d-1"})));
    }
}
