mod common;

use catalogue::predicate::{Attribute, Field, Operator, Predicate};
use catalogue::{Base, Catalogue, CatalogueError, Database, Event};
use common::{at, database, uuids};

struct Fixture {
    db: Database,
    mms1: Event,
    mms2: Event,
    bare: Event,
}

// three events: one per mission and one without any mission attribute
fn fixture() -> Fixture {
    let mut db = database();
    let mut mms1 = Event::new(at(1), at(2), "Patrick")
        .with_attribute("mission", "mms1")
        .with_attribute("orbit", 3);
    let mut mms2 = Event::new(at(3), at(4), "Alexis")
        .with_attribute("mission", "mms2")
        .with_attribute("orbit", 8);
    let mut bare = Event::new(at(5), at(6), "Patrick");
    db.save_event(&mut mms1).expect("saved");
    db.save_event(&mut mms2).expect("saved");
    db.save_event(&mut bare).expect("saved");
    Fixture { db, mms1, mms2, bare }
}

fn mission_is_mms2() -> Predicate {
    Predicate::eq(Attribute::new("mission"), "mms2")
}

#[test]
fn attribute_equality_finds_the_event() {
    let f = fixture();
    let found = f.db.filter_events(&mission_is_mms2()).expect("queried");
    assert_eq!(found, vec![f.mms2.clone()]);
    assert!(found[0].is_persisted());
}

#[test]
fn negated_smart_catalogue_includes_events_without_the_attribute() {
    let f = fixture();
    let smart = Catalogue::new("not mms2", "Patrick").with_predicate(Predicate::not(mission_is_mms2()));
    let found = f.db.get_events(Some(Base::from(&smart))).expect("queried");
    assert_eq!(uuids(&found), uuids([&f.mms1, &f.bare]));
}

#[test]
fn smart_catalogue_survives_a_save_and_ignores_stored_membership() {
    let mut f = fixture();
    let mut smart = Catalogue::new("mms2", "Patrick").with_predicate(mission_is_mms2());
    f.db.save_catalogue(&mut smart).expect("saved");

    let restored = f.db.get_catalogues(None).expect("queried");
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].predicate, Some(mission_is_mms2()));
    let found = f.db.get_events(Some(Base::from(&restored[0]))).expect("queried");
    assert_eq!(uuids(&found), uuids([&f.mms2]));
}

#[test]
fn tampered_predicate_is_reported_as_corrupt() {
    let mut f = fixture();
    let mut smart = Catalogue::new("mms2", "Patrick").with_predicate(mission_is_mms2());
    f.db.save_catalogue(&mut smart).expect("saved");
    f.db.persistor()
        .connection()
        .execute("update catalogues set predicate_digest = 'deadbeef'", [])
        .expect("tampered");
    assert!(matches!(
        f.db.get_catalogues(None),
        Err(CatalogueError::CorruptRow { .. })
    ));
}

#[test]
fn explicit_catalogue_lists_its_members() {
    let mut f = fixture();
    let mut catalogue = Catalogue::new("Moon", "Patrick").with_events([f.mms1.clone(), f.bare.clone()]);
    f.db.save_catalogue(&mut catalogue).expect("saved");
    let found = f.db.get_events(Some(Base::from(&catalogue))).expect("queried");
    assert_eq!(uuids(&found), uuids([&f.mms1, &f.bare]));
}

#[test]
fn catalogues_of_an_event_are_those_holding_it() {
    let mut f = fixture();
    let mut moon = Catalogue::new("Moon", "Patrick").with_events(f.mms1.clone());
    let mut sun = Catalogue::new("Sun", "Patrick").with_events([f.mms1.clone(), f.mms2.clone()]);
    let mut smart = Catalogue::new("everything mms1", "Patrick")
        .with_predicate(Predicate::eq(Attribute::new("mission"), "mms1"));
    f.db.save_catalogue(&mut moon).expect("saved");
    f.db.save_catalogue(&mut sun).expect("saved");
    f.db.save_catalogue(&mut smart).expect("saved");

    let names = |event: &Event| -> Vec<String> {
        let mut names: Vec<String> = f
            .db
            .get_catalogues(Some(Base::from(event)))
            .expect("queried")
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        names
    };
    // smart catalogues keep no membership, so they never show up here
    assert_eq!(names(&f.mms1), vec!["Moon".to_string(), "Sun".to_string()]);
    assert_eq!(names(&f.mms2), vec!["Sun".to_string()]);
    assert!(names(&f.bare).is_empty());
    assert!(matches!(
        f.db.smart_catalogues_containing(&f.mms1),
        Err(CatalogueError::Unsupported(_))
    ));
}

#[test]
fn catalogues_can_be_filtered_by_fields_and_attributes() {
    let mut f = fixture();
    let mut moon = Catalogue::new("Moon", "Patrick").with_attribute("priority", 1);
    let mut sun = Catalogue::new("Sun", "Alexis").with_attribute("priority", 5);
    f.db.save_catalogue(&mut moon).expect("saved");
    f.db.save_catalogue(&mut sun).expect("saved");

    let by_author = Predicate::eq(Field::new("author"), "Alexis");
    let found = f.db.get_catalogues(Some(Base::from(&by_author))).expect("queried");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Sun");

    let urgent = Predicate::comparison(Operator::Lt, Attribute::new("priority"), 3);
    let found = f.db.get_catalogues(Some(Base::from(&urgent))).expect("queried");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Moon");
}

#[test]
fn fields_ordering_and_patterns_filter_events() {
    let f = fixture();
    let later = Predicate::comparison(Operator::Ge, Field::new("start"), at(3));
    assert_eq!(uuids(&f.db.filter_events(&later).expect("queried")), uuids([&f.mms2, &f.bare]));

    let high_orbit = Predicate::comparison(Operator::Gt, Attribute::new("orbit"), 5);
    assert_eq!(uuids(&f.db.filter_events(&high_orbit).expect("queried")), uuids([&f.mms2]));

    let by_pattern = Predicate::all([
        Predicate::matches(Field::new("author"), "^Pat"),
        Predicate::matches(Attribute::new("mission"), "^mms[0-9]$"),
    ]);
    assert_eq!(uuids(&f.db.filter_events(&by_pattern).expect("queried")), uuids([&f.mms1]));

    // a string literal never matches an integer attribute
    let orbit_as_text = Predicate::eq(Attribute::new("orbit"), "3");
    assert!(f.db.filter_events(&orbit_as_text).expect("queried").is_empty());
}

#[test]
fn timestamp_attributes_compare_chronologically() {
    let mut f = fixture();
    let mut early = Event::new(at(7), at(8), "Patrick").with_attribute("detected", at(9));
    let mut late = Event::new(at(7), at(8), "Patrick").with_attribute("detected", at(21));
    // a string attribute under the same key never takes part in the ordering
    let mut text = Event::new(at(7), at(8), "Patrick").with_attribute("detected", "2020-01-01 23:00:00");
    f.db.save_event(&mut early).expect("saved");
    f.db.save_event(&mut late).expect("saved");
    f.db.save_event(&mut text).expect("saved");

    let after_noon = Predicate::comparison(Operator::Gt, Attribute::new("detected"), at(12));
    assert_eq!(uuids(&f.db.filter_events(&after_noon).expect("queried")), uuids([&late]));
    let up_to_nine = Predicate::comparison(Operator::Le, Attribute::new("detected"), at(9));
    assert_eq!(uuids(&f.db.filter_events(&up_to_nine).expect("queried")), uuids([&early]));
    let exactly = Predicate::eq(Attribute::new("detected"), at(21));
    assert_eq!(uuids(&f.db.filter_events(&exactly).expect("queried")), uuids([&late]));
}

#[test]
fn has_covers_every_comparison_on_the_same_key() {
    let f = fixture();
    let has = uuids(&f.db.filter_events(&Predicate::has(Attribute::new("mission"))).expect("queried"));
    assert_eq!(has, uuids([&f.mms1, &f.mms2]));
    for literal in ["mms1", "mms2", "mms3"] {
        let p = Predicate::comparison(Operator::Ne, Attribute::new("mission"), literal);
        for uuid in uuids(&f.db.filter_events(&p).expect("queried")) {
            assert!(has.contains(&uuid), "{} compared without having the key", uuid);
        }
    }
}

#[test]
fn rehydrated_events_update_instead_of_insert() {
    let mut f = fixture();
    let mut restored = f.db.filter_events(&mission_is_mms2()).expect("queried");
    let event = &mut restored[0];
    event.author = "Bob".to_string();
    event.set_attribute("orbit", 9);
    f.db.save_event(event).expect("saved");

    let all = f.db.get_events(None).expect("queried");
    assert_eq!(all.len(), 3);
    let updated = f.db.filter_events(&Predicate::eq(Field::new("author"), "Bob")).expect("queried");
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].uuid(), f.mms2.uuid());
    assert_eq!(updated[0].attribute::<i64>("orbit"), Some(&9));
}

#[test]
fn bases_that_cannot_answer_are_rejected() {
    let f = fixture();
    assert!(matches!(
        f.db.get_events(Some(Base::from(&f.mms1))),
        Err(CatalogueError::AmbiguousBase(_))
    ));
    let unsaved = Catalogue::new("Moon", "Patrick");
    assert!(matches!(
        f.db.get_catalogues(Some(Base::from(&unsaved))),
        Err(CatalogueError::AmbiguousBase(_))
    ));
    assert!(matches!(
        f.db.get_events(Some(Base::from(&unsaved))),
        Err(CatalogueError::NotPersisted(_))
    ));
    let fresh = Event::new(at(1), at(2), "Patrick");
    assert!(matches!(
        f.db.get_catalogues(Some(Base::from(&fresh))),
        Err(CatalogueError::NotPersisted(_))
    ));
}
