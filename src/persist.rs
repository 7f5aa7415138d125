// used for persistence
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, Transaction};

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::compile::{Condition, EntityKind};
use crate::config::PersistenceMode;
use crate::construct::{Attributes, Catalogue, Event, RowId};
use crate::datatype::{format_timestamp, parse_timestamp, Value};
use crate::error::{CatalogueError, Result};
use crate::predicate::Predicate;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
}

impl Persistor {
    pub fn new(mode: &PersistenceMode) -> Result<Persistor> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        register_regexp(&connection)?;
        connection.execute_batch(
            "
            pragma foreign_keys = on;
            create table if not exists events (
                id integer not null,
                uuid text not null,
                start_time text not null,
                end_time text not null,
                author text not null,
                constraint referenceable_Event_Identity primary key (
                    id autoincrement
                ),
                constraint unique_Event_Uuid unique (
                    uuid
                )
            );
            create table if not exists catalogues (
                id integer not null,
                name text not null,
                author text not null,
                predicate blob null,
                predicate_digest text null,
                constraint referenceable_Catalogue_Identity primary key (
                    id autoincrement
                )
            );
            create table if not exists event_attributes (
                owner_id integer not null,
                key text not null,
                value_type text not null,
                int_value integer null,
                char_value text null,
                boolean_value integer null,
                datetime_value text null,
                float_value real null,
                constraint Attribute_of_Event foreign key (
                    owner_id
                ) references events(id) on delete cascade,
                constraint unique_Event_Attribute primary key (
                    owner_id,
                    key
                )
            );
            create table if not exists catalogue_attributes (
                owner_id integer not null,
                key text not null,
                value_type text not null,
                int_value integer null,
                char_value text null,
                boolean_value integer null,
                datetime_value text null,
                float_value real null,
                constraint Attribute_of_Catalogue foreign key (
                    owner_id
                ) references catalogues(id) on delete cascade,
                constraint unique_Catalogue_Attribute primary key (
                    owner_id,
                    key
                )
            );
            create table if not exists catalogue_events (
                catalogue_id integer not null,
                event_id integer not null,
                constraint Member_in_Catalogue foreign key (
                    catalogue_id
                ) references catalogues(id) on delete cascade,
                constraint Member_is_Event foreign key (
                    event_id
                ) references events(id) on delete cascade,
                constraint unique_Membership primary key (
                    catalogue_id,
                    event_id
                )
            );
            create index if not exists catalogue_events_by_event on catalogue_events (
                event_id
            );
            ",
        )?;
        debug!(?mode, "persistor ready");
        Ok(Persistor { connection })
    }
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
    /// Rolls back when dropped without a commit.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.connection.transaction()?)
    }
}

/// `x regexp p` is evaluated by SQLite as `regexp(p, x)`. The compiled pattern
/// is cached per statement as auxiliary data on the pattern argument.
fn register_regexp(connection: &Connection) -> Result<()> {
    connection.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Null | ValueRef::Blob(_) => false,
                ValueRef::Text(text) => {
                    let text = std::str::from_utf8(text)
                        .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                    regex.is_match(text)
                }
                ValueRef::Integer(i) => regex.is_match(&i.to_string()),
                ValueRef::Real(f) => regex.is_match(&f.to_string()),
            };
            Ok(is_match)
        },
    )?;
    Ok(())
}

// ------------- Rows -------------
pub struct EventRow {
    pub id: RowId,
    pub uuid: String,
    pub start: String,
    pub end: String,
    pub author: String,
}

impl EventRow {
    pub fn into_event(self, attributes: Attributes) -> Result<Event> {
        let start = read_timestamp(&self.uuid, "start", &self.start)?;
        let end = read_timestamp(&self.uuid, "end", &self.end)?;
        Ok(Event::restore(self.id, self.uuid, start, end, self.author, attributes))
    }
}

pub struct CatalogueRow {
    pub id: RowId,
    pub name: String,
    pub author: String,
    pub predicate: Option<Vec<u8>>,
    pub predicate_digest: Option<String>,
}

impl CatalogueRow {
    pub fn into_catalogue(self, attributes: Attributes) -> Result<Catalogue> {
        let predicate = decode_predicate(&self.name, self.predicate, self.predicate_digest)?;
        Ok(Catalogue::restore(self.id, self.name, self.author, predicate, attributes))
    }
}

fn read_timestamp(uuid: &str, field: &str, text: &str) -> Result<chrono::NaiveDateTime> {
    parse_timestamp(text).ok_or_else(|| {
        CatalogueError::corrupt(format!("event {} has an unreadable {} '{}'", uuid, field, text))
    })
}

/// Durable form of a catalogue predicate: the bytes and their digest.
pub fn encode_predicate(predicate: Option<&Predicate>) -> Result<(Option<Vec<u8>>, Option<String>)> {
    match predicate {
        None => Ok((None, None)),
        Some(predicate) => {
            let bytes = predicate.to_bytes()?;
            let digest = blake3::hash(&bytes).to_hex().to_string();
            Ok((Some(bytes), Some(digest)))
        }
    }
}

pub fn decode_predicate(
    catalogue: &str,
    bytes: Option<Vec<u8>>,
    digest: Option<String>,
) -> Result<Option<Predicate>> {
    match (bytes, digest) {
        (None, None) => Ok(None),
        (Some(bytes), Some(digest)) => {
            if blake3::hash(&bytes).to_hex().as_str() != digest {
                return Err(CatalogueError::corrupt(format!(
                    "predicate of catalogue '{}' does not match its digest",
                    catalogue
                )));
            }
            Predicate::from_bytes(&bytes).map(Some).map_err(|e| {
                CatalogueError::corrupt(format!(
                    "predicate of catalogue '{}' cannot be read: {}",
                    catalogue, e
                ))
            })
        }
        _ => Err(CatalogueError::corrupt(format!(
            "predicate of catalogue '{}' is stored without its digest",
            catalogue
        ))),
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<RowId> {
    conn.prepare_cached(
        "
        insert into events (
            uuid,
            start_time,
            end_time,
            author
        ) values (?, ?, ?, ?)
    ",
    )?
    .execute(params![
        event.uuid(),
        format_timestamp(&event.start),
        format_timestamp(&event.end),
        &event.author
    ])?;
    Ok(conn.last_insert_rowid())
}

pub fn update_event(conn: &Connection, id: RowId, event: &Event) -> Result<()> {
    conn.prepare_cached(
        "
        update events
            set uuid = ?,
                start_time = ?,
                end_time = ?,
                author = ?
            where id = ?
    ",
    )?
    .execute(params![
        event.uuid(),
        format_timestamp(&event.start),
        format_timestamp(&event.end),
        &event.author,
        id
    ])?;
    Ok(())
}

pub fn insert_catalogue(conn: &Connection, catalogue: &Catalogue) -> Result<RowId> {
    let (predicate, digest) = encode_predicate(catalogue.predicate.as_ref())?;
    conn.prepare_cached(
        "
        insert into catalogues (
            name,
            author,
            predicate,
            predicate_digest
        ) values (?, ?, ?, ?)
    ",
    )?
    .execute(params![&catalogue.name, &catalogue.author, predicate, digest])?;
    Ok(conn.last_insert_rowid())
}

pub fn update_catalogue(conn: &Connection, id: RowId, catalogue: &Catalogue) -> Result<()> {
    let (predicate, digest) = encode_predicate(catalogue.predicate.as_ref())?;
    conn.prepare_cached(
        "
        update catalogues
            set name = ?,
                author = ?,
                predicate = ?,
                predicate_digest = ?
            where id = ?
    ",
    )?
    .execute(params![&catalogue.name, &catalogue.author, predicate, digest, id])?;
    Ok(())
}

// ------------- Membership -------------
/// Creates the edge unless it already exists, returning whether it was new.
pub fn add_member(conn: &Connection, catalogue: RowId, event: RowId) -> Result<bool> {
    let added = conn
        .prepare_cached(
            "
            insert or ignore into catalogue_events (
                catalogue_id,
                event_id
            ) values (?, ?)
        ",
        )?
        .execute(params![catalogue, event])?;
    Ok(added > 0)
}

pub fn remove_member(conn: &Connection, catalogue: RowId, event: RowId) -> Result<bool> {
    let removed = conn
        .prepare_cached(
            "
            delete from catalogue_events
                where catalogue_id = ?
                and event_id = ?
        ",
        )?
        .execute(params![catalogue, event])?;
    Ok(removed > 0)
}

/// Events that are members of the catalogue.
pub fn members_of(catalogue: RowId) -> Condition {
    Condition::new(
        format!(
            "exists (select 1 from catalogue_events m where m.event_id = {}.id and m.catalogue_id = ?)",
            EntityKind::Event.alias()
        ),
        vec![Value::Integer(catalogue)],
    )
}

/// Catalogues that have the event as a member.
pub fn containing(event: RowId) -> Condition {
    Condition::new(
        format!(
            "exists (select 1 from catalogue_events m where m.catalogue_id = {}.id and m.event_id = ?)",
            EntityKind::Catalogue.alias()
        ),
        vec![Value::Integer(event)],
    )
}

// ------------- Selection -------------
pub fn select_events(conn: &Connection, condition: &Condition) -> Result<Vec<EventRow>> {
    let alias = EntityKind::Event.alias();
    let sql = format!(
        "select {a}.id, {a}.uuid, {a}.start_time, {a}.end_time, {a}.author
            from {table} {a}
            where {condition}
            order by {a}.id",
        a = alias,
        table = EntityKind::Event.table(),
        condition = condition.sql()
    );
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(condition.params()), |row| {
        Ok(EventRow {
            id: row.get(0)?,
            uuid: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
            author: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn select_catalogues(conn: &Connection, condition: &Condition) -> Result<Vec<CatalogueRow>> {
    let alias = EntityKind::Catalogue.alias();
    let sql = format!(
        "select {a}.id, {a}.name, {a}.author, {a}.predicate, {a}.predicate_digest
            from {table} {a}
            where {condition}
            order by {a}.id",
        a = alias,
        table = EntityKind::Catalogue.table(),
        condition = condition.sql()
    );
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(condition.params()), |row| {
        Ok(CatalogueRow {
            id: row.get(0)?,
            name: row.get(1)?,
            author: row.get(2)?,
            predicate: row.get(3)?,
            predicate_digest: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
