//! The [`Database`] handle: batch saves with membership reconciliation, and
//! the query façade that rehydrates events and catalogues.
//!
//! Saving is all-or-nothing. Every entity of a batch is validated before the
//! transaction opens, rows are written inside one transaction, and entities
//! only learn their row ids once that transaction has committed.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::attribute::AttributeStore;
use crate::compile::{compile, Condition, EntityKind};
use crate::config::{PersistenceMode, Settings};
use crate::construct::{Attributes, Base, Catalogue, Entity, Event, Link, Record, RowId};
use crate::datatype::check_timestamp;
use crate::error::{CatalogueError, Result};
use crate::persist::{self, Persistor};
use crate::predicate::Predicate;

pub struct Database {
    persistor: Persistor,
    attributes: AttributeStore,
    enforce_interval: bool,
}

impl Database {
    /// Opens a database with default settings.
    pub fn new(mode: PersistenceMode) -> Result<Database> {
        Ok(Database {
            persistor: Persistor::new(&mode)?,
            attributes: AttributeStore::default(),
            enforce_interval: false,
        })
    }
    pub fn with_settings(settings: &Settings) -> Result<Database> {
        Ok(Database {
            persistor: Persistor::new(&settings.persistence_mode())?,
            attributes: AttributeStore::new(settings.key_policy()),
            enforce_interval: settings.enforce_interval,
        })
    }
    pub fn persistor(&self) -> &Persistor {
        &self.persistor
    }
    pub fn attribute_store(&self) -> &AttributeStore {
        &self.attributes
    }

    // ------------- Save -------------
    /// Saves a batch of events and catalogues in a single transaction.
    ///
    /// Catalogues have their pending removals applied before their pending
    /// additions. Removing an event that has never been saved cancels its
    /// pending addition, so it is not written at all. Unsaved events among the
    /// additions are saved as part of the batch.
    pub fn save<'a, I>(&mut self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = Entity<'a>>,
    {
        let mut entities: Vec<Entity<'a>> = entities.into_iter().collect();
        for entity in &entities {
            self.validate(entity)?;
        }
        let tx = self.persistor.transaction()?;
        let mut batch = Batch {
            conn: &tx,
            attributes: &self.attributes,
            staged: HashMap::new(),
            staged_catalogues: Vec::new(),
            assignments: Vec::new(),
            events: 0,
            catalogues: 0,
            added: 0,
            removed: 0,
        };
        for entity in &entities {
            match entity {
                Entity::Event(event) => {
                    batch.save_event(event)?;
                }
                Entity::Catalogue(catalogue) => {
                    batch.save_catalogue(catalogue)?;
                }
            }
        }
        let Batch {
            assignments,
            events,
            catalogues,
            added,
            removed,
            ..
        } = batch;
        tx.commit()?;
        for (link, id) in assignments {
            link.assign(id);
        }
        for entity in &mut entities {
            if let Entity::Catalogue(catalogue) = entity {
                catalogue.clear_pending();
            }
        }
        info!(events, catalogues, added, removed, "saved batch");
        Ok(())
    }
    pub fn save_event(&mut self, event: &mut Event) -> Result<()> {
        self.save([Entity::Event(event)])
    }
    pub fn save_catalogue(&mut self, catalogue: &mut Catalogue) -> Result<()> {
        self.save([Entity::Catalogue(catalogue)])
    }

    fn validate(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Event(event) => self.validate_event(event),
            Entity::Catalogue(catalogue) => {
                self.validate_attributes(&catalogue.attributes)?;
                if let Some(predicate) = &catalogue.predicate {
                    if catalogue.has_pending_edits() {
                        return Err(CatalogueError::ComputedMembership {
                            catalogue: catalogue.name.clone(),
                        });
                    }
                    compile(predicate, EntityKind::Event)?;
                }
                for event in catalogue.pending_additions() {
                    self.validate_event(event)?;
                }
                Ok(())
            }
        }
    }
    fn validate_event(&self, event: &Event) -> Result<()> {
        self.validate_attributes(&event.attributes)?;
        check_timestamp(&event.start, "start")?;
        check_timestamp(&event.end, "end")?;
        if self.enforce_interval && event.start > event.end {
            return Err(CatalogueError::InvalidInterval {
                uuid: event.uuid().to_string(),
            });
        }
        Ok(())
    }
    fn validate_attributes(&self, attributes: &Attributes) -> Result<()> {
        attributes
            .iter()
            .try_for_each(|(key, value)| self.attributes.validate(key, value))
    }

    // ------------- Queries -------------
    /// Events of a catalogue, or matching a predicate, or all events when no
    /// base is given. A smart catalogue is evaluated through its predicate.
    pub fn get_events(&self, base: Option<Base<'_>>) -> Result<Vec<Event>> {
        let condition = match base {
            None => Condition::and(Vec::new()),
            Some(Base::Predicate(predicate)) => compile(predicate, EntityKind::Event)?,
            Some(Base::Catalogue(catalogue)) => match &catalogue.predicate {
                Some(predicate) => compile(predicate, EntityKind::Event)?,
                None => match catalogue.record() {
                    Record::Persisted(id) => persist::members_of(id),
                    Record::Unsaved => {
                        return Err(CatalogueError::NotPersisted(format!(
                            "Catalogue '{}'",
                            catalogue.name
                        )));
                    }
                },
            },
            Some(Base::Event(event)) => {
                return Err(CatalogueError::AmbiguousBase(format!(
                    "events cannot be listed from event {}",
                    event.uuid()
                )));
            }
        };
        self.events_where(&condition)
    }
    pub fn filter_events(&self, predicate: &Predicate) -> Result<Vec<Event>> {
        self.get_events(Some(Base::Predicate(predicate)))
    }

    /// Catalogues holding an event, or matching a predicate, or all catalogues
    /// when no base is given. Smart catalogues have no stored membership and are
    /// therefore never found through an event.
    pub fn get_catalogues(&self, base: Option<Base<'_>>) -> Result<Vec<Catalogue>> {
        let condition = match base {
            None => Condition::and(Vec::new()),
            Some(Base::Predicate(predicate)) => compile(predicate, EntityKind::Catalogue)?,
            Some(Base::Event(event)) => match event.record() {
                Record::Persisted(id) => persist::containing(id),
                Record::Unsaved => {
                    return Err(CatalogueError::NotPersisted(format!("Event {}", event.uuid())));
                }
            },
            Some(Base::Catalogue(catalogue)) => {
                return Err(CatalogueError::AmbiguousBase(format!(
                    "catalogues cannot be listed from catalogue '{}'",
                    catalogue.name
                )));
            }
        };
        self.catalogues_where(&condition)
    }

    /// Finding the smart catalogues an event satisfies would mean evaluating
    /// every stored predicate, which is not offered.
    pub fn smart_catalogues_containing(&self, _event: &Event) -> Result<Vec<Catalogue>> {
        Err(CatalogueError::Unsupported(
            "reverse lookup of smart catalogues",
        ))
    }

    fn events_where(&self, condition: &Condition) -> Result<Vec<Event>> {
        let conn = self.persistor.connection();
        let rows = persist::select_events(conn, condition)?;
        debug!(rows = rows.len(), "selected events");
        rows.into_iter()
            .map(|row| {
                let attributes = self.attributes.get_all(conn, EntityKind::Event, row.id)?;
                row.into_event(attributes)
            })
            .collect()
    }
    fn catalogues_where(&self, condition: &Condition) -> Result<Vec<Catalogue>> {
        let conn = self.persistor.connection();
        let rows = persist::select_catalogues(conn, condition)?;
        debug!(rows = rows.len(), "selected catalogues");
        rows.into_iter()
            .map(|row| {
                let attributes = self.attributes.get_all(conn, EntityKind::Catalogue, row.id)?;
                row.into_catalogue(attributes)
            })
            .collect()
    }
}

// The writes of one save, tracking rows created in this transaction. Links
// are only assigned after commit, so events inserted earlier in the batch are
// recognized by their uuid and catalogues by their shared link.
struct Batch<'t> {
    conn: &'t Connection,
    attributes: &'t AttributeStore,
    staged: HashMap<String, RowId>,
    staged_catalogues: Vec<(Link, RowId)>,
    assignments: Vec<(Link, RowId)>,
    events: usize,
    catalogues: usize,
    added: usize,
    removed: usize,
}

impl Batch<'_> {
    fn event_id(&self, event: &Event) -> Option<RowId> {
        match event.record() {
            Record::Persisted(id) => Some(id),
            Record::Unsaved => self.staged.get(event.uuid()).copied(),
        }
    }

    fn save_event(&mut self, event: &Event) -> Result<RowId> {
        let id = match self.event_id(event) {
            Some(id) => {
                persist::update_event(self.conn, id, event)?;
                id
            }
            None => {
                let id = persist::insert_event(self.conn, event)?;
                self.staged.insert(event.uuid().to_string(), id);
                id
            }
        };
        if !event.is_persisted() {
            self.assignments.push((event.link().clone(), id));
        }
        self.attributes
            .sync(self.conn, EntityKind::Event, id, &event.attributes)?;
        self.events += 1;
        Ok(id)
    }

    fn catalogue_id(&self, catalogue: &Catalogue) -> Option<RowId> {
        match catalogue.record() {
            Record::Persisted(id) => Some(id),
            Record::Unsaved => self
                .staged_catalogues
                .iter()
                .find(|(link, _)| link.shares(catalogue.link()))
                .map(|(_, id)| *id),
        }
    }

    fn save_catalogue(&mut self, catalogue: &Catalogue) -> Result<RowId> {
        let id = match self.catalogue_id(catalogue) {
            Some(id) => {
                persist::update_catalogue(self.conn, id, catalogue)?;
                id
            }
            None => {
                let id = persist::insert_catalogue(self.conn, catalogue)?;
                self.staged_catalogues.push((catalogue.link().clone(), id));
                self.assignments.push((catalogue.link().clone(), id));
                id
            }
        };
        let mut additions: Vec<&Event> = catalogue.pending_additions().iter().collect();
        for event in catalogue.pending_removals() {
            match self.event_id(event) {
                Some(event_id) => {
                    if persist::remove_member(self.conn, id, event_id)? {
                        self.removed += 1;
                    }
                }
                None => additions.retain(|added| added.uuid() != event.uuid()),
            }
        }
        for event in additions {
            let event_id = match self.event_id(event) {
                Some(event_id) => event_id,
                None => self.save_event(event)?,
            };
            if persist::add_member(self.conn, id, event_id)? {
                self.added += 1;
            }
        }
        self.attributes
            .sync(self.conn, EntityKind::Catalogue, id, &catalogue.attributes)?;
        self.catalogues += 1;
        Ok(id)
    }
}
