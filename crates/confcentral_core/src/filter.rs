//! Conference filter compiler.
//!
//! # Responsibility
//! - Validate untrusted `(field, operator, value)` triples against fixed whitelists.
//! - Coerce values to the field's type.
//! - Derive the only sort order the store may serve for the predicate set.
//!
//! # Invariants
//! - At most one distinct field carries inequality predicates.
//! - With an inequality field the order is `[that field, name]`, otherwise `[name]`.
//! - Compilation is pure: the same input always yields the same output.
//! - Text values are normalized the same way stored labels are.

use crate::error::{ConferenceError, ConferenceResult};
use crate::model::normalize_label;
use std::fmt::{Display, Formatter};

/// Filterable conference fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    City,
    /// Multi-valued: matches when any topic satisfies the predicate.
    Topic,
    Month,
    MaxAttendees,
}

impl FilterField {
    /// Parses wire names (`CITY`, `MAX_ATTENDEES`) and field names (`maxAttendees`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "CITY" | "city" => Some(Self::City),
            "TOPIC" | "topic" | "topics" => Some(Self::Topic),
            "MONTH" | "month" => Some(Self::Month),
            "MAX_ATTENDEES" | "maxAttendees" | "max_attendees" => Some(Self::MaxAttendees),
            _ => None,
        }
    }

    /// Whether values for this field are compared as integers.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Month | Self::MaxAttendees)
    }
}

impl Display for FilterField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::City => "city",
            Self::Topic => "topic",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
        };
        f.write_str(name)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl FilterOperator {
    /// Parses wire names (`GTEQ`) and symbols (`>=`, `≥`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "EQ" | "=" | "==" => Some(Self::Eq),
            "GT" | ">" => Some(Self::Gt),
            "GTEQ" | ">=" | "≥" => Some(Self::Gte),
            "LT" | "<" => Some(Self::Lt),
            "LTEQ" | "<=" | "≤" => Some(Self::Lte),
            "NE" | "!=" | "≠" => Some(Self::Ne),
            _ => None,
        }
    }

    /// Everything except equality constrains a range.
    pub fn is_inequality(self) -> bool {
        self != Self::Eq
    }

    /// SQL spelling.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Ne => "<>",
        }
    }
}

/// Raw caller-supplied filter triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl FilterCondition {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Typed predicate value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

/// One validated predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: FilterField,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// Sort keys a compiled query may order by (always ascending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Field(FilterField),
    Name,
}

/// Store-ready query: predicates in input order plus the required ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub predicates: Vec<Predicate>,
    pub order: Vec<SortKey>,
    pub inequality_field: Option<FilterField>,
}

/// Compiles caller filters into a [`CompiledQuery`].
///
/// # Errors
/// `InvalidFilter` for an unknown field or operator, a non-integer value on a
/// numeric field, or inequalities on more than one field.
pub fn compile_filters(filters: &[FilterCondition]) -> ConferenceResult<CompiledQuery> {
    let mut predicates = Vec::with_capacity(filters.len());
    let mut inequality_field: Option<FilterField> = None;

    for condition in filters {
        let (Some(field), Some(operator)) = (
            FilterField::parse(&condition.field),
            FilterOperator::parse(&condition.operator),
        ) else {
            return Err(ConferenceError::InvalidFilter(format!(
                "filter contains invalid field or operator: `{}` `{}`",
                condition.field.trim(),
                condition.operator.trim()
            )));
        };

        if operator.is_inequality() {
            match inequality_field {
                Some(existing) if existing != field => {
                    return Err(ConferenceError::InvalidFilter(format!(
                        "inequality allowed on only one field: already filtering `{existing}`, got `{field}`"
                    )));
                }
                _ => inequality_field = Some(field),
            }
        }

        predicates.push(Predicate {
            field,
            operator,
            value: coerce_value(field, &condition.value)?,
        });
    }

    let order = match inequality_field {
        Some(field) => vec![SortKey::Field(field), SortKey::Name],
        None => vec![SortKey::Name],
    };

    Ok(CompiledQuery {
        predicates,
        order,
        inequality_field,
    })
}

fn coerce_value(field: FilterField, raw: &str) -> ConferenceResult<FilterValue> {
    if !field.is_numeric() {
        return Ok(FilterValue::Text(normalize_label(raw)));
    }
    raw.trim()
        .parse::<i64>()
        .map(FilterValue::Integer)
        .map_err(|_| {
            ConferenceError::InvalidFilter(format!(
                "value `{}` for `{field}` must be an integer",
                raw.trim()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::{FilterField, FilterOperator};

    #[test]
    fn wire_names_and_symbols_agree() {
        for (wire, symbol) in [("GT", ">"), ("GTEQ", ">="), ("LT", "<"), ("LTEQ", "<="), ("NE", "!=")] {
            assert_eq!(FilterOperator::parse(wire), FilterOperator::parse(symbol));
            assert!(FilterOperator::parse(wire).is_some());
        }
        assert_eq!(FilterOperator::parse("≥"), Some(FilterOperator::Gte));
        assert_eq!(FilterOperator::parse("LIKE"), None);
    }

    #[test]
    fn field_parsing_accepts_both_spellings() {
        assert_eq!(FilterField::parse("MAX_ATTENDEES"), Some(FilterField::MaxAttendees));
        assert_eq!(FilterField::parse("maxAttendees"), Some(FilterField::MaxAttendees));
        assert_eq!(FilterField::parse("seatsAvailable"), None);
    }
}
