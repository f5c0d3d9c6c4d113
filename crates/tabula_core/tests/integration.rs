//! Integration tests for record operations on a real directory.

use serde::{Deserialize, Serialize};
use std::fs;
use tabula_core::{Config, CoreError, Database, Resource, Value, Where};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct User {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Age")]
    age: u32,
}

impl Resource for User {
    fn model() -> String {
        "User".into()
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn indexed_fields(&self) -> Vec<(&'static str, Value)> {
        vec![("Name", Value::from(&self.name)), ("Age", Value::from(self.age))]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Manager {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name")]
    name: String,
}

impl Resource for Manager {
    fn model() -> String {
        "model.Manager".into()
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Employee {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ManagerID")]
    manager_id: i64,
}

impl Resource for Employee {
    fn model() -> String {
        "model.Employee".into()
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn owner_ids(&self) -> Vec<(&'static str, i64)> {
        vec![("Manager", self.manager_id)]
    }
}

fn user(name: &str, age: u32) -> User {
    User {
        id: 0,
        name: name.into(),
        age,
    }
}

fn open(dir: &TempDir) -> Database {
    Database::open(Config::new(dir.path())).unwrap()
}

fn ids(users: &[User]) -> Vec<i64> {
    let mut ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn create_read_delete_scenario() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let mut ann = user("Ann", 30);
    assert_eq!(db.create(&mut ann).unwrap(), 1);
    assert_eq!(ann.id, 1);
    assert!(dir.path().join("User/0000001").is_file());
    assert_eq!(
        fs::read_to_string(dir.path().join("User/metadata/counter")).unwrap(),
        "1"
    );

    let mut bo = user("Bo", 40);
    assert_eq!(db.create(&mut bo).unwrap(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("User/metadata/counter")).unwrap(),
        "2"
    );

    assert_eq!(db.read_all::<User>().unwrap(), vec![ann.clone(), bo.clone()]);

    db.delete(&ann).unwrap();
    assert!(!dir.path().join("User/0000001").exists());

    let err = db.read::<User>(1).unwrap_err();
    assert!(matches!(err, CoreError::ResourceNotFound { id: 1, .. }));
    assert!(err.to_string().contains("resource does not exist"));
    assert_eq!(db.read::<User>(2).unwrap(), bo);
}

#[test]
fn round_trip_keeps_every_field() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let mut original = user("Zoë \u{1F600}", u32::MAX);
    let id = db.create(&mut original).unwrap();

    let read: User = db.read(id).unwrap();
    assert_eq!(read, original);
}

#[test]
fn ids_increase_monotonically() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("seed", 1)).unwrap();
    let before = db.counter::<User>().unwrap();

    let assigned: Vec<i64> = (0..10)
        .map(|i| db.create(&mut user("u", i)).unwrap())
        .collect();

    assert_eq!(assigned, ((before + 1)..=(before + 10)).collect::<Vec<_>>());
}

#[test]
fn read_all_is_in_id_order_and_skips_foreign_files() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    for i in 0..12 {
        db.create(&mut user("u", i)).unwrap();
    }
    fs::write(dir.path().join("User/notes.txt"), b"not a record").unwrap();
    fs::create_dir(dir.path().join("User/0000099")).unwrap();

    let all = db.read_all::<User>().unwrap();
    let seen: Vec<i64> = all.iter().map(|u| u.id).collect();
    assert_eq!(seen, (1..=12).collect::<Vec<_>>());

    let mut visited = Vec::new();
    db.read_all_with(|u: User| visited.push(u.age)).unwrap();
    assert_eq!(visited, (0..12).collect::<Vec<_>>());
}

#[test]
fn and_or_composition() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    for age in [17, 36, 23, 23, 56, 19] {
        db.create(&mut user("John", age)).unwrap();
    }

    let both = db
        .find_all::<User>(&[Where::new("Name", "John").and(Where::new("Age", 23))])
        .unwrap();
    assert_eq!(ids(&both), vec![3, 4]);
    assert!(both.iter().all(|u| u.age == 23));

    let either = db
        .find_all::<User>(&[Where::new("Age", 23), Where::new("Age", 17)])
        .unwrap();
    assert_eq!(ids(&either), vec![1, 3, 4]);

    let first: User = db.find(&[Where::new("Age", "56")]).unwrap();
    assert_eq!(first.id, 5);

    let mut streamed = Vec::new();
    db.find_all_with(&[Where::new("Age", 19u64)], |u: User| streamed.push(u.id))
        .unwrap();
    assert_eq!(streamed, vec![6]);
}

#[test]
fn index_follows_create_and_delete() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();

    let found: User = db.find(&[Where::new("Name", "Ann")]).unwrap();
    assert_eq!(found.id, ann.id);

    db.delete(&ann).unwrap();
    assert!(matches!(
        db.find::<User>(&[Where::new("Name", "Ann")]),
        Err(CoreError::NoMatch { .. })
    ));
}

#[test]
fn queries_need_clauses() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("Ann", 30)).unwrap();

    assert!(matches!(
        db.find_all::<User>(&[]),
        Err(CoreError::MissingClauses)
    ));
}

#[test]
fn replace_overwrites_and_reindexes() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();

    ann.age = 31;
    db.replace(&ann).unwrap();

    assert_eq!(db.read::<User>(ann.id).unwrap().age, 31);
    assert!(db.find::<User>(&[Where::new("Age", 30)]).is_err());
    assert_eq!(db.find::<User>(&[Where::new("Age", 31)]).unwrap(), ann);
}

#[test]
fn update_merges_non_zero_fields() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();
    db.create(&mut user("Bo", 40)).unwrap();

    let patch = User {
        id: 0,
        name: String::new(),
        age: 31,
    };
    let merged = db.update(&patch, ann.id).unwrap();

    assert_eq!(merged, User { age: 31, ..ann.clone() });
    assert_eq!(db.read::<User>(ann.id).unwrap(), merged);
    assert_eq!(db.counter::<User>().unwrap(), 2);
    assert_eq!(db.read_all::<User>().unwrap().len(), 2);
    assert_eq!(
        db.find::<User>(&[Where::new("Name", "Ann").and(Where::new("Age", 31))])
            .unwrap()
            .id,
        ann.id
    );
}

#[test]
fn update_keeps_target_id() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();
    db.create(&mut user("Bo", 40)).unwrap();

    let patch = User {
        id: 2,
        name: "Anna".into(),
        age: 0,
    };
    let merged = db.update(&patch, 1).unwrap();

    assert_eq!(merged.id, 1);
    assert_eq!(merged.name, "Anna");
    assert_eq!(db.read::<User>(2).unwrap().name, "Bo");
}

#[test]
fn update_of_missing_record_fails() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("Ann", 30)).unwrap();

    assert!(matches!(
        db.update(&user("X", 1), 7),
        Err(CoreError::ResourceNotFound { id: 7, .. })
    ));
}

#[test]
fn get_owner_follows_owner_id() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let mut boss = Manager {
        id: 0,
        name: "Grace".into(),
    };
    db.create(&mut boss).unwrap();
    let mut worker = Employee {
        id: 0,
        name: "Alan".into(),
        manager_id: boss.id,
    };
    db.create(&mut worker).unwrap();

    let owner: Manager = db.get_owner(&worker).unwrap();
    assert_eq!(owner, boss);
    assert!(dir.path().join("model.Manager/0000001").is_file());
}

#[test]
fn get_owner_without_owner_field() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();

    let err = db.get_owner::<User, Manager>(&ann).unwrap_err();
    assert!(matches!(err, CoreError::OwnerNotFound { ref owner, .. } if owner == "Manager"));
}

#[test]
fn delete_all_then_create_continues_counting() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    for name in ["a", "b", "c"] {
        db.create(&mut user(name, 1)).unwrap();
    }

    assert_eq!(db.delete_all::<User>().unwrap(), 3);
    assert!(db.read_all::<User>().unwrap().is_empty());
    assert_eq!(db.create(&mut user("d", 1)).unwrap(), 4);
}

#[test]
fn reset_counter_writes_zero() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("a", 1)).unwrap();

    db.reset_counter::<User>().unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("User/metadata/counter")).unwrap(),
        "0"
    );
}

#[test]
fn create_after_reset_replaces_stale_index_keys() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("Old", 1)).unwrap();

    db.reset_counter::<User>().unwrap();
    assert_eq!(db.create(&mut user("New", 2)).unwrap(), 1);

    assert!(matches!(
        db.find::<User>(&[Where::new("Name", "Old")]),
        Err(CoreError::NoMatch { .. })
    ));
    assert_eq!(db.indexed_ids::<User>("Name", "New"), vec![1]);
    assert!(db.indexed_ids::<User>("Age", 1).is_empty());
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
enum Status {
    #[default]
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id: i64,
    title: String,
    status: Status,
    priority: u8,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            status: Status::Active,
            priority: 5,
        }
    }
}

impl Resource for Task {
    fn model() -> String {
        "Task".into()
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[test]
fn update_leaves_fields_at_type_default_alone() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut task = Task {
        title: "a".into(),
        status: Status::Archived,
        priority: 9,
        ..Task::default()
    };
    db.create(&mut task).unwrap();

    let merged = db
        .update(
            &Task {
                title: "b".into(),
                ..Task::default()
            },
            task.id,
        )
        .unwrap();
    assert_eq!(
        merged,
        Task {
            title: "b".into(),
            ..task.clone()
        }
    );

    let merged = db
        .update(
            &Task {
                status: Status::Paused,
                priority: 1,
                ..Task::default()
            },
            task.id,
        )
        .unwrap();
    assert_eq!(merged.status, Status::Paused);
    assert_eq!(merged.priority, 1);
    assert_eq!(merged.title, "b");
    assert_eq!(db.read::<Task>(task.id).unwrap(), merged);
}

#[test]
fn records_survive_field_changes() {
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct UserV2 {
        #[serde(rename = "ID")]
        id: i64,
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Email")]
        email: String,
    }

    impl Resource for UserV2 {
        fn model() -> String {
            "User".into()
        }
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let mut ann = user("Ann", 30);
    db.create(&mut ann).unwrap();

    let v2: UserV2 = db.read(ann.id).unwrap();
    assert_eq!(v2.id, ann.id);
    assert_eq!(v2.name, "Ann");
    assert!(v2.email.is_empty());
}

#[test]
fn viewer_reads_without_type() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create(&mut user("Ann", 30)).unwrap();
    db.create(&mut user("Bo", 40)).unwrap();

    let table = dir.path().join("User");
    assert_eq!(db.list_record_ids(&table).unwrap(), vec![1, 2]);

    let value = db.read_value(&table, 2).unwrap();
    assert_eq!(value.get("Name"), Some(&Value::Text("Bo".into())));
    assert_eq!(value.get("Age"), Some(&Value::Integer(40)));
}
