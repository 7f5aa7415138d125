mod common;

use std::any::Any;

use catalogue::predicate::{Attribute, Predicate};
use catalogue::{Base, Catalogue, CatalogueError, Database, Entity, Event, Settings};
use common::{at, database, uuids};

fn members(db: &Database, catalogue: &Catalogue) -> Vec<String> {
    uuids(&db.get_events(Some(Base::from(catalogue))).expect("members"))
}

#[test]
fn single_events_and_sequences_are_buffered_alike() {
    let e1 = Event::new(at(1), at(2), "Patrick");
    let e2 = Event::new(at(2), at(3), "Patrick");

    let mut one_by_one = Catalogue::new("one", "Patrick");
    one_by_one.add_events(e1.clone());
    one_by_one.add_events(e2.clone());
    let mut as_vec = Catalogue::new("vec", "Patrick");
    as_vec.add_events(vec![e1.clone(), e2.clone()]);
    let mut as_array = Catalogue::new("array", "Patrick");
    as_array.add_events([e1, e2]);

    assert_eq!(one_by_one.pending_additions(), as_vec.pending_additions());
    assert_eq!(as_vec.pending_additions(), as_array.pending_additions());
}

#[test]
fn removing_an_unsaved_event_cancels_its_addition() {
    let mut db = database();
    let e1 = Event::new(at(1), at(2), "Patrick");
    let e2 = Event::new(at(2), at(3), "Patrick");
    let mut catalogue = Catalogue::new("Moon", "Patrick").with_events([e1.clone(), e2.clone()]);
    catalogue.remove_events(e1.clone());
    db.save_catalogue(&mut catalogue).expect("saved");

    assert!(!catalogue.has_pending_edits());
    assert!(!e1.is_persisted(), "cancelled event must not be written");
    assert!(e2.is_persisted(), "added event shares its link with the caller");
    assert_eq!(members(&db, &catalogue), uuids([&e2]));
    assert_eq!(db.get_events(None).expect("all events").len(), 1);
}

#[test]
fn membership_follows_successive_saves() {
    let mut db = database();
    let e1 = Event::new(at(1), at(2), "Patrick");
    let e2 = Event::new(at(2), at(3), "Patrick");
    let mut catalogue = Catalogue::new("Moon", "Patrick");
    catalogue.add_events([e1.clone(), e2.clone()]);
    db.save_catalogue(&mut catalogue).expect("first save");
    assert_eq!(members(&db, &catalogue), uuids([&e1, &e2]));

    catalogue.remove_events(e1.clone());
    db.save_catalogue(&mut catalogue).expect("second save");
    assert_eq!(members(&db, &catalogue), uuids([&e2]));
    // the event itself stays
    assert_eq!(db.get_events(None).expect("all events").len(), 2);
}

#[test]
fn re_adding_an_existing_member_is_idempotent() {
    let mut db = database();
    let e1 = Event::new(at(1), at(2), "Patrick");
    let mut catalogue = Catalogue::new("Moon", "Patrick").with_events(e1.clone());
    db.save_catalogue(&mut catalogue).expect("first save");
    catalogue.add_events(e1.clone());
    db.save_catalogue(&mut catalogue).expect("second save");
    assert_eq!(members(&db, &catalogue), uuids([&e1]));
}

#[test]
fn batch_commits_events_and_catalogues_together() {
    let mut db = database();
    let mut lone = Event::new(at(5), at(6), "Alexis").with_attribute("mission", "mms1");
    let member = Event::new(at(1), at(2), "Alexis");
    let mut catalogue = Catalogue::new("Sun", "Alexis")
        .with_attribute("color", "yellow")
        .with_events(member.clone());
    db.save([Entity::from(&mut lone), Entity::from(&mut catalogue)])
        .expect("batch saved");

    assert!(lone.is_persisted());
    assert!(member.is_persisted());
    assert!(catalogue.is_persisted());
    let catalogues = db.get_catalogues(None).expect("catalogues");
    assert_eq!(catalogues.len(), 1);
    assert_eq!(catalogues[0].attribute::<String>("color").map(String::as_str), Some("yellow"));
    assert_eq!(db.get_events(None).expect("events").len(), 2);
}

#[test]
fn event_saved_twice_in_one_batch_is_written_once() {
    let mut db = database();
    let mut event = Event::new(at(1), at(2), "Alexis");
    let mut catalogue = Catalogue::new("Sun", "Alexis").with_events(event.clone());
    db.save([Entity::from(&mut event), Entity::from(&mut catalogue)])
        .expect("batch saved");
    assert_eq!(db.get_events(None).expect("events").len(), 1);
    assert_eq!(members(&db, &catalogue), uuids([&event]));
}

#[test]
fn catalogue_writes_the_events_it_holds() {
    let mut db = database();
    let mut event = Event::new(at(1), at(2), "Alexis").with_attribute("mission", "mms1");
    let mut catalogue = Catalogue::new("Sun", "Alexis").with_events(event.clone());

    // the catalogue holds its own copy; this edit stays with the caller
    event.author = "Bob".to_string();
    catalogue.pending_additions_mut()[0].set_attribute("mission", "mms2");
    db.save_catalogue(&mut catalogue).expect("saved");

    let mms2 = Predicate::eq(Attribute::new("mission"), "mms2");
    let found = db.filter_events(&mms2).expect("queried");
    assert_eq!(uuids(&found), uuids([&event]));
    assert_eq!(found[0].author, "Alexis");

    // the caller's copy shares the row and updates it when saved itself
    assert!(event.is_persisted());
    db.save_event(&mut event).expect("saved");
    let all = db.get_events(None).expect("events");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].author, "Bob");
    assert_eq!(all[0].attribute::<String>("mission").map(String::as_str), Some("mms1"));
}

#[test]
fn clones_of_an_unsaved_catalogue_share_one_row() {
    let mut db = database();
    let member = Event::new(at(1), at(2), "Alexis");
    let mut catalogue = Catalogue::new("Sun", "Alexis").with_events(member.clone());
    let mut copy = catalogue.clone();
    db.save([Entity::from(&mut catalogue), Entity::from(&mut copy)])
        .expect("batch saved");

    assert!(catalogue.is_persisted());
    assert!(copy.is_persisted());
    assert_eq!(catalogue.record(), copy.record());
    assert_eq!(db.get_catalogues(None).expect("catalogues").len(), 1);
    assert_eq!(db.get_events(None).expect("events").len(), 1);
    assert_eq!(members(&db, &catalogue), uuids([&member]));
}

#[test]
fn failing_batch_leaves_no_trace() {
    let mut db = database();
    let mut first = Event::with_uuid(at(1), at(2), "Alexis", "fixed-uuid");
    db.save_event(&mut first).expect("first saved");

    // the last entity reuses that uuid and violates uniqueness
    let mut fresh = Event::new(at(3), at(4), "Alexis");
    let member = Event::new(at(5), at(6), "Alexis");
    let mut catalogue = Catalogue::new("Clash", "Alexis").with_events(member.clone());
    let mut duplicate = Event::with_uuid(at(7), at(8), "Alexis", "fixed-uuid");
    let result = db.save([
        Entity::from(&mut fresh),
        Entity::from(&mut catalogue),
        Entity::from(&mut duplicate),
    ]);
    assert!(matches!(result, Err(CatalogueError::Persistence(_))));

    assert!(!fresh.is_persisted());
    assert!(!member.is_persisted());
    assert!(!catalogue.is_persisted());
    assert!(catalogue.has_pending_edits(), "pending edits survive a failed save");
    assert_eq!(db.get_events(None).expect("events").len(), 1);
    assert!(db.get_catalogues(None).expect("catalogues").is_empty());
}

#[test]
fn smart_catalogue_refuses_membership_edits() {
    let mut db = database();
    let mut smart = Catalogue::new("mms2", "Patrick")
        .with_predicate(Predicate::eq(Attribute::new("mission"), "mms2"));
    smart.add_events(Event::new(at(1), at(2), "Patrick"));
    match db.save_catalogue(&mut smart) {
        Err(CatalogueError::ComputedMembership { catalogue }) => assert_eq!(catalogue, "mms2"),
        other => panic!("expected ComputedMembership, got {:?}", other),
    }
    assert!(db.get_events(None).expect("events").is_empty());
    assert!(db.get_catalogues(None).expect("catalogues").is_empty());
}

#[test]
fn interval_is_checked_only_when_enforced() {
    let mut lenient = database();
    let mut backwards = Event::new(at(5), at(1), "Patrick");
    lenient.save_event(&mut backwards).expect("accepted by default");

    let settings = Settings {
        enforce_interval: true,
        ..Default::default()
    };
    let mut strict = Database::with_settings(&settings).expect("database");
    let backwards = Event::new(at(5), at(1), "Patrick");
    let mut catalogue = Catalogue::new("Moon", "Patrick").with_events(backwards.clone());
    assert!(matches!(
        strict.save_catalogue(&mut catalogue),
        Err(CatalogueError::InvalidInterval { ref uuid }) if uuid == backwards.uuid()
    ));
    assert!(strict.get_catalogues(None).expect("catalogues").is_empty());
}

#[test]
fn only_events_and_catalogues_convert_into_entities() {
    let mut event = Event::new(at(1), at(2), "Patrick");
    let mut label = String::from("not an entity");

    let any: &mut dyn Any = &mut event;
    assert!(matches!(Entity::try_from(any), Ok(Entity::Event(_))));
    let any: &mut dyn Any = &mut label;
    assert!(matches!(
        Entity::try_from(any),
        Err(CatalogueError::UnsupportedEntity(_))
    ));
}
