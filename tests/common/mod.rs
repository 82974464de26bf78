#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::Row;
use scratchdb::{Column, DbContext, Entity, ModelBuilder, RecordSet, Session, SessionOptions};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonModel {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl PersonModel {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            id: 0,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

impl Entity for PersonModel {
    const TABLE: &'static str = "persons";

    fn columns() -> Vec<Column> {
        vec![
            Column::text("first_name").max_length(50),
            Column::text("last_name").max_length(50),
        ]
    }

    fn key(&self) -> Option<i64> {
        (self.id > 0).then_some(self.id)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.first_name.clone()),
            Value::Text(self.last_name.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
        })
    }
}

/// Context exposing a single `persons` table
pub struct TestContext {
    session: Session,
}

impl TestContext {
    pub fn persons(&self) -> RecordSet<'_, PersonModel> {
        self.session
            .set::<PersonModel>()
            .expect("persons is part of the model")
    }
}

impl DbContext for TestContext {
    fn configure(model: &mut ModelBuilder) {
        model.entity::<PersonModel>();
    }

    fn create(options: SessionOptions) -> Self {
        Self {
            session: Session::new(options),
        }
    }

    fn session(&self) -> &Session {
        &self.session
    }
}

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn add_person(ctx: &TestContext, first_name: &str, last_name: &str) {
    ctx.persons().add(&PersonModel::new(first_name, last_name));
    ctx.session().save_changes().unwrap();
}

pub fn add_default_data(ctx: &TestContext, suffix: &str) {
    for i in 1..=3 {
        add_person(
            ctx,
            &format!("First Name {}{}", i, suffix),
            &format!("Last Name {}{}", i, suffix),
        );
    }
}

pub fn swap_first_and_last_name(ctx: &TestContext, id: i64) {
    let persons = ctx.persons();
    let mut person = persons.single(id).unwrap();
    std::mem::swap(&mut person.first_name, &mut person.last_name);
    persons.update(&person).unwrap();
    ctx.session().save_changes().unwrap();
}

pub fn delete_person(ctx: &TestContext, id: i64) {
    let persons = ctx.persons();
    let person = persons.single(id).unwrap();
    persons.remove(&person).unwrap();
    ctx.session().save_changes().unwrap();
}

pub fn should_exist(ctx: &TestContext, id: i64, first_name: &str, last_name: &str) {
    let person = ctx
        .persons()
        .find(id)
        .unwrap()
        .unwrap_or_else(|| panic!("person {} should exist", id));
    assert_eq!(person.first_name, first_name);
    assert_eq!(person.last_name, last_name);
}

pub fn should_not_exist(ctx: &TestContext, id: i64) {
    assert!(ctx.persons().find(id).unwrap().is_none());
}
