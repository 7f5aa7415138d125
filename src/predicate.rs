//! Boolean expressions over the fixed fields and open attributes of an entity.
//!
//! A [`Predicate`] is an immutable tree. It is lowered into a backend condition
//! by [`crate::compile::compile`] and persisted as part of a smart catalogue
//! through [`Predicate::to_bytes`] / [`Predicate::from_bytes`].
//!
//! ```
//! use catalogue::predicate::{Attribute, Field, Predicate};
//! let p = Predicate::all([
//!     Predicate::eq(Field::new("author"), "Patrick"),
//!     Predicate::not(Predicate::eq(Attribute::new("mission"), "mms2")),
//! ]);
//! let restored = Predicate::from_bytes(&p.to_bytes().unwrap()).unwrap();
//! assert_eq!(p, restored);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::datatype::Value;
use crate::error::{CatalogueError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

impl FromStr for Operator {
    type Err = CatalogueError;
    fn from_str(s: &str) -> Result<Operator> {
        match s.trim() {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            other => Err(CatalogueError::UnsupportedOperandType(format!(
                "unknown comparison operator '{}'",
                other
            ))),
        }
    }
}

/// A fixed column of the evaluated entity, e.g. `start` or `author`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field(String);

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A key into the open attribute mapping of the evaluated entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute(String);

impl Attribute {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    pub fn key(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Field(Field),
    Attribute(Attribute),
}

impl From<Field> for Operand {
    fn from(f: Field) -> Self {
        Operand::Field(f)
    }
}
impl From<Attribute> for Operand {
    fn from(a: Attribute) -> Self {
        Operand::Attribute(a)
    }
}

impl Operand {
    /// The field name or attribute key.
    pub fn name(&self) -> &str {
        match self {
            Operand::Field(field) => field.name(),
            Operand::Attribute(attribute) => attribute.key(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "Field({})", field.name()),
            Operand::Attribute(attribute) => write!(f, "Attribute({})", attribute.key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison {
        op: Operator,
        operand: Operand,
        literal: Value,
    },
    // the pattern is a literal like any other, only strings compile
    Match { operand: Operand, pattern: Value },
    Not(Box<Predicate>),
    Has(Attribute),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn comparison(op: Operator, operand: impl Into<Operand>, literal: impl Into<Value>) -> Self {
        Predicate::Comparison {
            op,
            operand: operand.into(),
            literal: literal.into(),
        }
    }
    /// Comparison with the operator given in its textual form (`"=="`, `"<="`, ...).
    pub fn compare(op: &str, operand: impl Into<Operand>, literal: impl Into<Value>) -> Result<Self> {
        Ok(Self::comparison(op.parse()?, operand, literal))
    }
    pub fn eq(operand: impl Into<Operand>, literal: impl Into<Value>) -> Self {
        Self::comparison(Operator::Eq, operand, literal)
    }
    pub fn matches(operand: impl Into<Operand>, pattern: impl Into<Value>) -> Self {
        Predicate::Match {
            operand: operand.into(),
            pattern: pattern.into(),
        }
    }
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }
    pub fn has(attribute: Attribute) -> Self {
        Predicate::Has(attribute)
    }
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::All(predicates.into_iter().collect())
    }
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Any(predicates.into_iter().collect())
    }

    /// Opaque durable form, see [`Predicate::from_bytes`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Predicate> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Predicate::Comparison { op, operand, literal } => {
                write!(f, "{} {} {:?}", operand, op.symbol(), literal.to_string())
            }
            Predicate::Match { operand, pattern } => {
                write!(f, "{} ~ /{}/", operand, pattern)
            }
            Predicate::Not(p) => write!(f, "Not({})", p),
            Predicate::Has(attribute) => write!(f, "Has({})", attribute.key()),
            Predicate::All(ps) | Predicate::Any(ps) => {
                let name = if matches!(self, Predicate::All(_)) { "All" } else { "Any" };
                let inner: Vec<String> = ps.iter().map(|p| p.to_string()).collect();
                write!(f, "{}({})", name, inner.join(", "))
            }
        }
    }
}
