//! Catalogue – time-bounded events with typed attributes, grouped into explicit
//! or predicate-driven catalogues.
//!
//! An [`construct::Event`] has a fixed start, end, author and uuid, plus an open
//! mapping of attributes whose values are one of the kinds in
//! [`datatype::Value`]. A [`construct::Catalogue`] groups events. Its
//! membership is either stored explicitly, edited through pending additions and
//! removals that are reconciled on save, or computed from a
//! [`predicate::Predicate`] ("smart" catalogue).
//!
//! ## Modules
//! * [`construct`] – Events, catalogues and the link to their backing rows.
//! * [`datatype`] – The [`datatype::Value`] tagged union and the [`datatype::DataType`] trait.
//! * [`predicate`] – Predicate trees over fields and attributes.
//! * [`compile`] – Lowering of predicates into SQL conditions.
//! * [`attribute`] – Vertical storage of attributes and the conditions over it.
//! * [`persist`] – SQLite schema, `REGEXP` and row level reads and writes.
//! * [`config`] – Settings and persistence modes.
//! * [`database`] – Batch saves and queries.
//!
//! ## Quick Start
//! ```
//! use chrono::NaiveDate;
//! use catalogue::{Attribute, Base, Catalogue, Database, Event, PersistenceMode, Predicate};
//!
//! let at = |h| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap();
//! let mut db = Database::new(PersistenceMode::InMemory).unwrap();
//!
//! let mut event = Event::new(at(1), at(2), "alice").with_attribute("mission", "mms2");
//! db.save_event(&mut event).unwrap();
//!
//! let smart = Catalogue::new("mms2", "alice")
//!     .with_predicate(Predicate::eq(Attribute::new("mission"), "mms2"));
//! let events = db.get_events(Some(Base::from(&smart))).unwrap();
//! assert_eq!(events, vec![event]);
//! ```

pub mod attribute;
pub mod compile;
pub mod config;
pub mod construct;
pub mod database;
pub mod datatype;
pub mod error;
pub mod persist;
pub mod predicate;

pub use crate::compile::{compile, Condition, EntityKind};
pub use crate::config::{PersistenceMode, Settings};
pub use crate::construct::{Base, Catalogue, Entity, Event, IntoEvents, Record};
pub use crate::database::Database;
pub use crate::datatype::Value;
pub use crate::error::{CatalogueError, Result};
pub use crate::predicate::{Attribute, Field, Operand, Operator, Predicate};
