//! Vertical storage of the open attribute mapping of events and catalogues.
//!
//! Every attribute is one row `(owner_id, key, value_type, int_value,
//! char_value, boolean_value, datetime_value, float_value)`. The `value_type`
//! tag names the single slot that is populated; all other slots are null.
//! Overwriting a key rewrites the tag and every slot, so a value that changes
//! type never leaves a stale slot behind.

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection};
use tracing::warn;

use crate::compile::{Condition, EntityKind};
use crate::construct::{Attributes, RowId};
use crate::datatype::{parse_timestamp, Value, ValueKind};
use crate::error::{CatalogueError, Result};
use crate::predicate::Operator;

lazy_static! {
    static ref STRICT_KEY: Regex =
        Regex::new(r"^[a-z][a-z_0-9]*$").expect("strict key grammar is a valid regex");
    static ref CASE_INSENSITIVE_KEY: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z_0-9]*$").expect("case insensitive key grammar is a valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// `^[a-z][a-z_0-9]*$`
    #[default]
    Strict,
    /// `^[A-Za-z][A-Za-z_0-9]*$`
    CaseInsensitive,
}

impl KeyPolicy {
    pub fn accepts(self, key: &str) -> bool {
        match self {
            KeyPolicy::Strict => STRICT_KEY.is_match(key),
            KeyPolicy::CaseInsensitive => CASE_INSENSITIVE_KEY.is_match(key),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    policy: KeyPolicy,
}

// one nullable column per value kind, as read back from a row
struct Slots {
    int_value: Option<i64>,
    char_value: Option<String>,
    boolean_value: Option<bool>,
    datetime_value: Option<String>,
    float_value: Option<f64>,
}

impl Slots {
    fn project(self, key: &str, tag: &str) -> Result<Value> {
        let kind = ValueKind::from_discriminator(tag).ok_or_else(|| {
            CatalogueError::corrupt(format!("attribute '{}' has unknown type tag '{}'", key, tag))
        })?;
        let value = match kind {
            ValueKind::Integer => self.int_value.map(Value::Integer),
            ValueKind::String => self.char_value.map(Value::String),
            ValueKind::Boolean => self.boolean_value.map(Value::Boolean),
            ValueKind::Timestamp => match self.datetime_value {
                Some(text) => Some(Value::Timestamp(parse_timestamp(&text).ok_or_else(|| {
                    CatalogueError::corrupt(format!(
                        "attribute '{}' holds an unreadable timestamp '{}'",
                        key, text
                    ))
                })?)),
                None => None,
            },
            ValueKind::Float => self.float_value.map(Value::Float),
        };
        value.ok_or_else(|| {
            CatalogueError::corrupt(format!(
                "attribute '{}' is tagged {} but its {} slot is empty",
                key,
                tag,
                kind.column()
            ))
        })
    }
}

impl AttributeStore {
    pub fn new(policy: KeyPolicy) -> Self {
        Self { policy }
    }
    pub fn validate_key(&self, key: &str) -> Result<()> {
        if self.policy.accepts(key) {
            Ok(())
        } else {
            Err(CatalogueError::InvalidKey {
                key: key.to_string(),
            })
        }
    }

    /// Checks an entry before it is written, see [`Value::check`].
    pub fn validate(&self, key: &str, value: &Value) -> Result<()> {
        self.validate_key(key)?;
        value.check(key)
    }

    /// Stores `value` under `key`, replacing whatever was there before.
    pub fn set(
        &self,
        conn: &Connection,
        kind: EntityKind,
        owner: RowId,
        key: &str,
        value: &Value,
    ) -> Result<()> {
        self.validate(key, value)?;
        let slot = |k: ValueKind| if value.kind() == k { Some(value) } else { None };
        let sql = format!(
            "insert into {} (
                owner_id, key, value_type,
                int_value, char_value, boolean_value, datetime_value, float_value
            ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            on conflict (owner_id, key) do update set
                value_type = excluded.value_type,
                int_value = excluded.int_value,
                char_value = excluded.char_value,
                boolean_value = excluded.boolean_value,
                datetime_value = excluded.datetime_value,
                float_value = excluded.float_value",
            kind.attribute_table()
        );
        conn.prepare_cached(&sql)?.execute(params![
            owner,
            key,
            value.kind().discriminator(),
            slot(ValueKind::Integer),
            slot(ValueKind::String),
            slot(ValueKind::Boolean),
            slot(ValueKind::Timestamp),
            slot(ValueKind::Float),
        ])?;
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, conn: &Connection, kind: EntityKind, owner: RowId, key: &str) -> Result<bool> {
        let sql = format!(
            "delete from {} where owner_id = ? and key = ?",
            kind.attribute_table()
        );
        let removed = conn.prepare_cached(&sql)?.execute(params![owner, key])?;
        Ok(removed > 0)
    }

    pub fn has(&self, conn: &Connection, kind: EntityKind, owner: RowId, key: &str) -> Result<bool> {
        let sql = format!(
            "select exists (select 1 from {} where owner_id = ? and key = ?)",
            kind.attribute_table()
        );
        let found: bool = conn
            .prepare_cached(&sql)?
            .query_row(params![owner, key], |r| r.get(0))?;
        Ok(found)
    }

    pub fn get_all(&self, conn: &Connection, kind: EntityKind, owner: RowId) -> Result<Attributes> {
        let sql = format!(
            "select key, value_type,
                int_value, char_value, boolean_value, datetime_value, float_value
            from {}
            where owner_id = ?",
            kind.attribute_table()
        );
        let mut statement = conn.prepare_cached(&sql)?;
        let rows = statement.query_map(params![owner], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                Slots {
                    int_value: row.get(2)?,
                    char_value: row.get(3)?,
                    boolean_value: row.get(4)?,
                    datetime_value: row.get(5)?,
                    float_value: row.get(6)?,
                },
            ))
        })?;
        let mut attributes = Attributes::new();
        for row in rows {
            let (key, tag, slots) = row?;
            let value = slots.project(&key, &tag).inspect_err(|e| {
                warn!(table = kind.attribute_table(), owner, error = %e, "unreadable attribute row");
            })?;
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    /// Makes the stored mapping of `owner` equal to `attributes`: every key is
    /// written and keys that are no longer present are deleted. All entries are
    /// validated before the first write.
    pub fn sync(
        &self,
        conn: &Connection,
        kind: EntityKind,
        owner: RowId,
        attributes: &Attributes,
    ) -> Result<()> {
        for (key, value) in attributes {
            self.validate(key, value)?;
        }
        let stored = self.get_all(conn, kind, owner)?;
        for key in stored.keys().filter(|k| !attributes.contains_key(*k)) {
            self.remove(conn, kind, owner, key)?;
        }
        for (key, value) in attributes {
            if stored.get(key) != Some(value) {
                self.set(conn, kind, owner, key, value)?;
            }
        }
        Ok(())
    }

    // ------------- Condition builders -------------
    // These produce existential sub-conditions correlated with the alias of the
    // entity table, see crate::compile.

    /// Entity has an attribute `key`, whatever its value.
    pub fn exists(kind: EntityKind, key: &str) -> Condition {
        Condition::new(
            format!("exists ({})", Self::correlated(kind, "")),
            vec![Value::from(key)],
        )
    }

    /// Entity has an attribute `key` of the literal's kind that compares to it.
    pub fn compare(kind: EntityKind, key: &str, op: Operator, literal: &Value) -> Condition {
        let column = literal.kind().column();
        Condition::new(
            format!(
                "exists ({})",
                Self::correlated(
                    kind,
                    &format!(" and a.value_type = ? and a.{} {} ?", column, op.as_sql())
                )
            ),
            vec![
                Value::from(key),
                Value::from(literal.kind().discriminator()),
                literal.clone(),
            ],
        )
    }

    /// Entity has a string attribute `key` matching `pattern`.
    pub fn matches(kind: EntityKind, key: &str, pattern: &str) -> Condition {
        Condition::new(
            format!(
                "exists ({})",
                Self::correlated(
                    kind,
                    &format!(" and a.value_type = ? and a.{} regexp ?", ValueKind::String.column())
                )
            ),
            vec![
                Value::from(key),
                Value::from(ValueKind::String.discriminator()),
                Value::from(pattern),
            ],
        )
    }

    fn correlated(kind: EntityKind, extra: &str) -> String {
        format!(
            "select 1 from {} a where a.owner_id = {}.id and a.key = ?{}",
            kind.attribute_table(),
            kind.alias(),
            extra
        )
    }
}
