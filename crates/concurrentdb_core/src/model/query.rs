//! Typed filter and sort expressions.
//!
//! # Responsibility
//! - Represent read predicates and orderings as explicit data.
//! - Validate field names before any storage query is built.
//!
//! # Invariants
//! - Field names are identifier paths (`name` or `name.nested`).
//! - Sort terms compose left to right: the first term is the primary key.
//! - An empty `Filter::And` matches everything; an empty `Filter::Or`
//!   matches nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static FIELD_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field name regex")
});

/// Scalar value a filter compares a field against.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Comparison applied between a field and a `FieldValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    /// Also matches entities whose field is absent or null.
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring match on text fields.
    Contains,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Contains => "CONTAINS",
        }
    }
}

/// Boolean predicate over entity fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: String,
        op: CompareOp,
        value: FieldValue,
    },
    /// Field is absent or explicitly null.
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Every entity the inner filter does not match, including those where
    /// a compared field is absent.
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<FieldValue>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Contains, FieldValue::Text(needle.into()))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut terms) => {
                terms.push(other);
                Self::And(terms)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested `Or`s.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut terms) => {
                terms.push(other);
                Self::Or(terms)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Checks every field name referenced by this filter.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Self::Compare { field, .. } | Self::IsNull(field) => validate_field_name(field),
            Self::And(terms) | Self::Or(terms) => terms.iter().try_for_each(Filter::validate),
            Self::Not(inner) => inner.validate(),
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare { field, op, value } => write!(f, "{field} {} {value}", op.symbol()),
            Self::IsNull(field) => write!(f, "{field} IS NULL"),
            Self::And(terms) => write_joined(f, terms, "AND", "TRUE"),
            Self::Or(terms) => write_joined(f, terms, "OR", "FALSE"),
            Self::Not(inner) => match inner.as_ref() {
                Self::And(_) | Self::Or(_) => write!(f, "NOT ({inner})"),
                other => write!(f, "NOT {other}"),
            },
        }
    }
}

fn write_joined(
    f: &mut Formatter<'_>,
    terms: &[Filter],
    keyword: &str,
    empty: &str,
) -> std::fmt::Result {
    if terms.is_empty() {
        return write!(f, "{empty}");
    }
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            write!(f, " {keyword} ")?;
        }
        match term {
            Filter::And(_) | Filter::Or(_) => write!(f, "({term})")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// One key of a multi-key ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub field: String,
    pub direction: SortDirection,
}

impl SortTerm {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction.reversed(),
        }
    }
}

/// Filter plus ordering for a multi-entity read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchQuery {
    pub filter: Option<Filter>,
    pub sort: Vec<SortTerm>,
}

impl FetchQuery {
    pub fn new(filter: Option<Filter>, sort: Vec<SortTerm>) -> Self {
        Self { filter, sort }
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            sort: Vec::new(),
        }
    }

    pub fn sorted(sort: Vec<SortTerm>) -> Self {
        Self { filter: None, sort }
    }

    pub fn then_by(mut self, term: SortTerm) -> Self {
        self.sort.push(term);
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        self.sort
            .iter()
            .try_for_each(|term| validate_field_name(&term.field))
    }
}

/// Rejected filter or sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidField(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidField(name) => write!(f, "invalid field name `{name}`"),
        }
    }
}

impl Error for QueryError {}

fn validate_field_name(name: &str) -> Result<(), QueryError> {
    if FIELD_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidField(name.to_string()))
    }
}

/// JSON path addressing `field` inside a stored entity body.
pub(crate) fn json_path(field: &str) -> String {
    format!("$.{field}")
}

#[cfg(test)]
mod tests {
    use super::{json_path, FetchQuery, FieldValue, Filter, QueryError, SortDirection, SortTerm};

    #[test]
    fn field_names_must_be_identifier_paths() {
        assert!(Filter::eq("testValue", 1).validate().is_ok());
        assert!(Filter::eq("meta.owner_id", "a").validate().is_ok());

        for bad in ["", "1abc", "a b", "a'); DROP TABLE entities; --", "a..b", "$.a"] {
            assert_eq!(
                Filter::eq(bad, 1).validate(),
                Err(QueryError::InvalidField(bad.to_string())),
                "`{bad}` should be rejected"
            );
        }
    }

    #[test]
    fn nested_filters_are_validated() {
        let filter = Filter::eq("a", 1).and(Filter::is_null("b").or(Filter::gt("c d", 2)).negate());
        assert_eq!(
            filter.validate(),
            Err(QueryError::InvalidField("c d".to_string()))
        );
    }

    #[test]
    fn and_or_builders_flatten() {
        let filter = Filter::eq("a", 1).or(Filter::eq("a", 2)).or(Filter::eq("a", 3));
        match filter {
            Filter::Or(terms) => assert_eq!(terms.len(), 3),
            other => panic!("unexpected filter shape: {other:?}"),
        }
    }

    #[test]
    fn display_renders_readable_expression() {
        let filter = Filter::eq("testValue", 2)
            .or(Filter::eq("testValue", 4))
            .and(Filter::contains("name", "x").negate());
        assert_eq!(
            filter.to_string(),
            "(testValue == 2 OR testValue == 4) AND NOT name CONTAINS \"x\""
        );
        assert_eq!(Filter::And(Vec::new()).to_string(), "TRUE");
        assert_eq!(Filter::Or(Vec::new()).to_string(), "FALSE");
    }

    #[test]
    fn optional_values_convert_to_null() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("a")), FieldValue::Text("a".to_string()));
    }

    #[test]
    fn fetch_query_validates_sort_fields() {
        let query = FetchQuery::sorted(vec![SortTerm::asc("ok"), SortTerm::desc("not ok")]);
        assert!(query.validate().is_err());
        assert!(FetchQuery::default().then_by(SortTerm::asc("x")).validate().is_ok());
    }

    #[test]
    fn sort_term_reverses_direction() {
        let term = SortTerm::asc("x");
        assert_eq!(term.reversed().direction, SortDirection::Descending);
        assert_eq!(term.reversed().reversed(), term);
        assert_eq!(json_path("a.b"), "$.a.b");
    }
}
