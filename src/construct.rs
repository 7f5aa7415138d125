use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

// used for the fixed start and end of an event
use chrono::NaiveDateTime;

// used to give new events their identity
use uuid::Uuid;

// our own stuff that we need
use crate::datatype::{DataType, Value};
use crate::error::{CatalogueError, Result};
use crate::predicate::Predicate;

/// Surrogate identity of a persisted row.
pub type RowId = i64;

/// The open attribute mapping of an entity.
pub type Attributes = BTreeMap<String, Value>;

// ------------- Record -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Record {
    #[default]
    Unsaved,
    Persisted(RowId),
}

/// Link between an in-memory entity and its backing row. Clones of an entity
/// share the link, so once any copy has been saved every copy knows its row.
#[derive(Debug, Clone, Default)]
pub struct Link(Arc<Mutex<Record>>);

impl Link {
    pub(crate) fn persisted(id: RowId) -> Self {
        Self(Arc::new(Mutex::new(Record::Persisted(id))))
    }
    pub fn record(&self) -> Record {
        // a Record is Copy, so a poisoned lock still holds a whole value
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Whether both entities are copies of the same one.
    pub fn shares(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
    pub(crate) fn assign(&self, id: RowId) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Record::Persisted(id);
    }
}

// ------------- Event -------------
#[derive(Debug, Clone)]
pub struct Event {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub author: String,
    uuid: String,
    pub attributes: Attributes,
    link: Link,
}

impl Event {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, author: impl Into<String>) -> Self {
        Self::with_uuid(start, end, author, Uuid::new_v4().to_string())
    }
    pub fn with_uuid(
        start: NaiveDateTime,
        end: NaiveDateTime,
        author: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            author: author.into(),
            uuid: uuid.into(),
            attributes: Attributes::new(),
            link: Link::default(),
        }
    }
    pub(crate) fn restore(
        id: RowId,
        uuid: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        author: String,
        attributes: Attributes,
    ) -> Self {
        Self {
            start,
            end,
            author,
            uuid,
            attributes,
            link: Link::persisted(id),
        }
    }
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
    /// Immutable once the event exists.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn attribute<T: DataType>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(T::peek)
    }
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }
    pub fn record(&self) -> Record {
        self.link.record()
    }
    pub fn is_persisted(&self) -> bool {
        matches!(self.record(), Record::Persisted(_))
    }
    pub(crate) fn link(&self) -> &Link {
        &self.link
    }
}

// the link is bookkeeping, equality is about content
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.start == other.start
            && self.end == other.end
            && self.author == other.author
            && self.attributes == other.attributes
    }
}

// ------------- Listify -------------
/// Lets membership edits take a single event or a sequence of events alike.
///
/// Events are taken by value: a catalogue keeps the events it was given, and
/// an unsaved one is written on save exactly as the catalogue holds it. Edits
/// made afterwards to another clone are not seen by the catalogue; use
/// [`Catalogue::pending_additions_mut`] or save that clone itself.
pub trait IntoEvents {
    fn into_events(self) -> Vec<Event>;
}

impl IntoEvents for Event {
    fn into_events(self) -> Vec<Event> {
        vec![self]
    }
}
impl IntoEvents for Vec<Event> {
    fn into_events(self) -> Vec<Event> {
        self
    }
}
impl<const N: usize> IntoEvents for [Event; N] {
    fn into_events(self) -> Vec<Event> {
        self.into()
    }
}

// ------------- Catalogue -------------
#[derive(Debug, Clone)]
pub struct Catalogue {
    pub name: String,
    pub author: String,
    /// When set, membership is computed from the predicate and never stored.
    pub predicate: Option<Predicate>,
    pub attributes: Attributes,
    pending_add: Vec<Event>,
    pending_remove: Vec<Event>,
    link: Link,
}

impl Catalogue {
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
            predicate: None,
            attributes: Attributes::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            link: Link::default(),
        }
    }
    pub(crate) fn restore(
        id: RowId,
        name: String,
        author: String,
        predicate: Option<Predicate>,
        attributes: Attributes,
    ) -> Self {
        Self {
            name,
            author,
            predicate,
            attributes,
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            link: Link::persisted(id),
        }
    }
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
    /// Seeds the pending additions.
    pub fn with_events(mut self, events: impl IntoEvents) -> Self {
        self.add_events(events);
        self
    }
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
    pub fn is_smart(&self) -> bool {
        self.predicate.is_some()
    }
    pub fn add_events(&mut self, events: impl IntoEvents) {
        self.pending_add.extend(events.into_events());
    }
    pub fn remove_events(&mut self, events: impl IntoEvents) {
        self.pending_remove.extend(events.into_events());
    }
    pub fn pending_additions(&self) -> &[Event] {
        &self.pending_add
    }
    /// The pending additions as they will be written by the next save.
    pub fn pending_additions_mut(&mut self) -> &mut [Event] {
        &mut self.pending_add
    }
    pub fn pending_removals(&self) -> &[Event] {
        &self.pending_remove
    }
    pub fn has_pending_edits(&self) -> bool {
        !self.pending_add.is_empty() || !self.pending_remove.is_empty()
    }
    pub(crate) fn clear_pending(&mut self) {
        self.pending_add.clear();
        self.pending_remove.clear();
    }
    pub fn attribute<T: DataType>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(T::peek)
    }
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }
    pub fn record(&self) -> Record {
        self.link.record()
    }
    pub fn is_persisted(&self) -> bool {
        matches!(self.record(), Record::Persisted(_))
    }
    pub(crate) fn link(&self) -> &Link {
        &self.link
    }
}

// ------------- Save and query inputs -------------
/// Something that can be handed to [`crate::database::Database::save`].
#[derive(Debug)]
pub enum Entity<'a> {
    Event(&'a mut Event),
    Catalogue(&'a mut Catalogue),
}

impl<'a> From<&'a mut Event> for Entity<'a> {
    fn from(event: &'a mut Event) -> Self {
        Entity::Event(event)
    }
}
impl<'a> From<&'a mut Catalogue> for Entity<'a> {
    fn from(catalogue: &'a mut Catalogue) -> Self {
        Entity::Catalogue(catalogue)
    }
}

/// For heterogeneous collections of boxed values.
impl<'a> TryFrom<&'a mut dyn Any> for Entity<'a> {
    type Error = CatalogueError;
    fn try_from(value: &'a mut dyn Any) -> Result<Self> {
        let type_id = (*value).type_id();
        let unsupported = || CatalogueError::UnsupportedEntity(format!("{:?}", type_id));
        if value.is::<Event>() {
            value.downcast_mut::<Event>().map(Entity::Event).ok_or_else(unsupported)
        } else if value.is::<Catalogue>() {
            value.downcast_mut::<Catalogue>().map(Entity::Catalogue).ok_or_else(unsupported)
        } else {
            Err(unsupported())
        }
    }
}

/// The object a query starts from.
#[derive(Debug, Clone, Copy)]
pub enum Base<'a> {
    Event(&'a Event),
    Catalogue(&'a Catalogue),
    Predicate(&'a Predicate),
}

impl<'a> From<&'a Event> for Base<'a> {
    fn from(event: &'a Event) -> Self {
        Base::Event(event)
    }
}
impl<'a> From<&'a Catalogue> for Base<'a> {
    fn from(catalogue: &'a Catalogue) -> Self {
        Base::Catalogue(catalogue)
    }
}
impl<'a> From<&'a Predicate> for Base<'a> {
    fn from(predicate: &'a Predicate) -> Self {
        Base::Predicate(predicate)
    }
}
