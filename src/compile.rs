//! Lowering of [`Predicate`] trees into SQL conditions.
//!
//! A [`Condition`] is a boolean SQL expression with positional `?` parameters,
//! written against the entity table of an [`EntityKind`] under its alias
//! (`e` for events, `c` for catalogues). Conditions compose with
//! [`Condition::and`], [`Condition::or`] and [`Condition::negate`], and are
//! executed by the query façade in [`crate::database`].
//!
//! Compilation is pure: nothing here touches a connection.

use regex::Regex;
use tracing::debug;

use crate::attribute::AttributeStore;
use crate::datatype::{Value, ValueKind};
use crate::error::{CatalogueError, Result};
use crate::predicate::{Operand, Predicate};

/// A fixed column that predicates can reference through a [`crate::predicate::Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: ValueKind,
}

const EVENT_FIELDS: [FieldSpec; 4] = [
    FieldSpec { name: "start", column: "start_time", kind: ValueKind::Timestamp },
    FieldSpec { name: "end", column: "end_time", kind: ValueKind::Timestamp },
    FieldSpec { name: "author", column: "author", kind: ValueKind::String },
    FieldSpec { name: "uuid", column: "uuid", kind: ValueKind::String },
];

const CATALOGUE_FIELDS: [FieldSpec; 2] = [
    FieldSpec { name: "name", column: "name", kind: ValueKind::String },
    FieldSpec { name: "author", column: "author", kind: ValueKind::String },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Event,
    Catalogue,
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Event => "Event",
            EntityKind::Catalogue => "Catalogue",
        }
    }
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Event => "events",
            EntityKind::Catalogue => "catalogues",
        }
    }
    /// Alias of the entity table in every generated query.
    pub fn alias(self) -> &'static str {
        match self {
            EntityKind::Event => "e",
            EntityKind::Catalogue => "c",
        }
    }
    pub fn attribute_table(self) -> &'static str {
        match self {
            EntityKind::Event => "event_attributes",
            EntityKind::Catalogue => "catalogue_attributes",
        }
    }
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Event => &EVENT_FIELDS,
            EntityKind::Catalogue => &CATALOGUE_FIELDS,
        }
    }
    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    sql: String,
    params: Vec<Value>,
}

impl Condition {
    pub(crate) fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    pub fn params(&self) -> &[Value] {
        &self.params
    }
    /// Conjunction; a single condition is returned as is, none yields `1`.
    pub fn and(conditions: Vec<Condition>) -> Condition {
        Self::join(conditions, "and", "1")
    }
    /// Disjunction; a single condition is returned as is, none yields `0`.
    pub fn or(conditions: Vec<Condition>) -> Condition {
        Self::join(conditions, "or", "0")
    }
    pub fn negate(self) -> Condition {
        Condition {
            sql: format!("not ({})", self.sql),
            params: self.params,
        }
    }
    fn join(mut conditions: Vec<Condition>, connective: &str, identity: &str) -> Condition {
        match conditions.len() {
            0 => Condition::new(identity.to_string(), Vec::new()),
            1 => conditions.remove(0),
            _ => {
                let mut parts = Vec::with_capacity(conditions.len());
                let mut params = Vec::new();
                for condition in conditions {
                    parts.push(format!("({})", condition.sql));
                    params.extend(condition.params);
                }
                Condition::new(parts.join(&format!(" {} ", connective)), params)
            }
        }
    }
}

/// Compiles `predicate` into a condition over entities of `kind`.
pub fn compile(predicate: &Predicate, kind: EntityKind) -> Result<Condition> {
    let condition = lower(predicate, kind)?;
    debug!(kind = kind.name(), sql = %condition.sql(), params = condition.params().len(), "compiled predicate");
    Ok(condition)
}

fn lower(predicate: &Predicate, kind: EntityKind) -> Result<Condition> {
    match predicate {
        Predicate::Comparison { op, operand, literal } => {
            literal.check(operand.name())?;
            match operand {
                Operand::Field(field) => {
                    let known = known_field(kind, field.name())?;
                    if literal.kind() != known.kind {
                        return Err(CatalogueError::TypeMismatch {
                            operand: field.name().to_string(),
                            expected: known.kind.discriminator(),
                            found: literal.kind().discriminator(),
                        });
                    }
                    Ok(Condition::new(
                        format!("{}.{} {} ?", kind.alias(), known.column, op.as_sql()),
                        vec![literal.clone()],
                    ))
                }
                Operand::Attribute(attribute) => {
                    Ok(AttributeStore::compare(kind, attribute.key(), *op, literal))
                }
            }
        }
        Predicate::Match { operand, pattern } => {
            let pattern = pattern.as_str().ok_or_else(|| {
                CatalogueError::UnsupportedOperandType(format!(
                    "match on {} needs a string pattern, got {}",
                    operand,
                    pattern.kind()
                ))
            })?;
            Regex::new(pattern).map_err(|e| CatalogueError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            match operand {
                Operand::Field(field) => {
                    let known = known_field(kind, field.name())?;
                    Ok(Condition::new(
                        format!("{}.{} regexp ?", kind.alias(), known.column),
                        vec![Value::from(pattern)],
                    ))
                }
                Operand::Attribute(attribute) => {
                    Ok(AttributeStore::matches(kind, attribute.key(), pattern))
                }
            }
        }
        // double negation cancels out so that Not(Not(p)) compiles exactly like p
        Predicate::Not(inner) => match inner.as_ref() {
            Predicate::Not(p) => lower(p, kind),
            other => Ok(lower(other, kind)?.negate()),
        },
        Predicate::Has(attribute) => Ok(AttributeStore::exists(kind, attribute.key())),
        Predicate::All(predicates) => {
            if predicates.is_empty() {
                return Err(CatalogueError::EmptyCombinator("All"));
            }
            Ok(Condition::and(lower_each(predicates, kind)?))
        }
        Predicate::Any(predicates) => {
            if predicates.is_empty() {
                return Err(CatalogueError::EmptyCombinator("Any"));
            }
            Ok(Condition::or(lower_each(predicates, kind)?))
        }
    }
}

fn lower_each(predicates: &[Predicate], kind: EntityKind) -> Result<Vec<Condition>> {
    predicates.iter().map(|p| lower(p, kind)).collect()
}

fn known_field(kind: EntityKind, name: &str) -> Result<&'static FieldSpec> {
    kind.field(name).ok_or_else(|| CatalogueError::UnknownField {
        field: name.to_string(),
        kind: kind.name(),
    })
}
