//! Tag preferences computed against a real SQLite item table.

use moviebot_usermodel::{
    Choice, ItemStore, SqliteItemStore, StoreError, UserModel, UserModelError,
};
use rusqlite::{params, Connection};
use std::path::PathBuf;

fn movie_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "moviebot_usermodel_{name}_{}.sqlite",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let conn = Connection::open(&path).unwrap_or_else(|e| panic!("open db: {e}"));
    conn.execute_batch(
        "CREATE TABLE movies (ID TEXT PRIMARY KEY, title TEXT, genres TEXT, keywords TEXT);",
    )
    .unwrap_or_else(|e| panic!("schema: {e}"));
    let rows = [
        ("m1", "Airplane!", "Comedy", "pilot"),
        ("m2", "Hot Shots!", "Action|Comedy", "100%_parody"),
        ("m3", "Alien", "Horror|Sci-Fi", "space"),
    ];
    for (id, title, genres, keywords) in rows {
        conn.execute(
            "INSERT INTO movies (ID, title, genres, keywords) VALUES (?1, ?2, ?3, ?4)",
            params![id, title, genres, keywords],
        )
        .unwrap_or_else(|e| panic!("insert: {e}"));
    }
    path
}

#[test]
fn lookup_matches_substring_case_insensitively() {
    let path = movie_db("lookup");
    let store = SqliteItemStore::open(&path).unwrap_or_else(|e| panic!("{e}"));
    let ids = store
        .matching_items("genres", "comedy")
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("m1") && ids.contains("m2"));

    let none = store
        .matching_items("genres", "western")
        .unwrap_or_else(|e| panic!("{e}"));
    assert!(none.is_empty());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn wildcards_in_tags_are_literal() {
    let path = movie_db("wildcards");
    let store = SqliteItemStore::open(&path).unwrap_or_else(|e| panic!("{e}"));
    let ids = store
        .matching_items("keywords", "%_")
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["m2".to_string()]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unknown_slot_is_rejected() {
    let path = movie_db("slot");
    let store = SqliteItemStore::open(&path).unwrap_or_else(|e| panic!("{e}"));
    assert!(matches!(
        store.matching_items("genres; DROP TABLE movies", "x"),
        Err(StoreError::UnknownSlot(_))
    ));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn column_names_match_regardless_of_case() {
    let path = std::env::temp_dir().join(format!(
        "moviebot_usermodel_case_{}.sqlite",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let conn = Connection::open(&path).unwrap_or_else(|e| panic!("open db: {e}"));
    conn.execute_batch(
        "CREATE TABLE movies (Id TEXT PRIMARY KEY, Genres TEXT);
         INSERT INTO movies (Id, Genres) VALUES ('m1', 'Comedy'), ('m2', 'Drama');",
    )
    .unwrap_or_else(|e| panic!("schema: {e}"));
    drop(conn);

    let store = SqliteItemStore::open_table(&path, "movies", "ID")
        .unwrap_or_else(|e| panic!("{e}"));
    for slot in ["genres", "Genres", "GENRES"] {
        let ids = store
            .matching_items(slot, "comedy")
            .unwrap_or_else(|e| panic!("{slot}: {e}"));
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["m1".to_string()]);
    }
    assert!(matches!(
        store.matching_items("title", "x"),
        Err(StoreError::UnknownSlot(_))
    ));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_database_or_table_fails() {
    let missing = std::env::temp_dir().join("moviebot_usermodel_no_such_db.sqlite");
    assert!(SqliteItemStore::open(&missing).is_err());

    let path = movie_db("table");
    assert!(matches!(
        SqliteItemStore::open_table(&path, "series", "ID"),
        Err(StoreError::UnknownTable(_))
    ));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn comedy_preference_averages_all_choices() {
    let path = movie_db("preference");
    let store = SqliteItemStore::open(&path).unwrap_or_else(|e| panic!("{e}"));
    let mut user = UserModel::new("alice");
    user.record_choice("m1", Choice::Accept);
    user.record_choice("m2", Choice::Reject);
    user.record_choice("m2", Choice::Reject);
    user.record_choice("m3", Choice::Accept);

    let p = user
        .compute_tag_preference("genres", "comedy", &store)
        .unwrap_or_else(|e| panic!("{e}"));
    assert!((p - (1.0 - 1.0 - 1.0) / 3.0).abs() < 1e-6, "{p}");

    let horror = user
        .get_tag_preference("genres", "horror", &store)
        .unwrap_or_else(|e| panic!("{e}"));
    assert!((horror - 1.0).abs() < f32::EPSILON);

    assert!(matches!(
        user.compute_tag_preference("director", "nolan", &store),
        Err(UserModelError::Store(StoreError::UnknownSlot(_)))
    ));
    let _ = std::fs::remove_file(&path);
}
