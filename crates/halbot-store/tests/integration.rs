//! Integration tests for the halbot-store crate.
//!
//! These tests drive instance settings from the kernel through the SQLite
//! preference store against a real database file (via tempfile).

use std::sync::Arc;

use halbot_kernel::{NamedBroker, Plugin, PrefKey, Registry};
use halbot_store::{Database, PrefScope, SqlitePreferenceStore};

fn karma() -> Arc<Plugin> {
    Plugin::builder("karma")
        .pattern(r"(\w+)\+\+")
        .setting("max", "10", false)
        .setting("channel", "", true)
        .build()
}

#[tokio::test]
async fn settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halbot.db");
    let plugin = karma();

    {
        let db = Database::open_and_migrate(path.clone()).await.unwrap();
        let store = SqlitePreferenceStore::new(db);

        let inst = plugin.instance("r1", Arc::new(NamedBroker::new("irc")));
        inst.set_setting("channel", "#general").unwrap();
        inst.save_settings_to_prefs(&store).await.unwrap();
    }

    let db = Database::open_and_migrate(path).await.unwrap();
    let store = SqlitePreferenceStore::new(db);

    let inst = plugin.instance("r1", Arc::new(NamedBroker::new("irc")));
    inst.load_settings_from_prefs(&store).await.unwrap();

    assert_eq!(inst.setting("channel").as_deref(), Some("#general"));
    assert_eq!(inst.setting("max").as_deref(), Some("10"));
    assert!(inst.missing_required_settings().is_empty());
}

#[tokio::test]
async fn load_save_load_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let store = SqlitePreferenceStore::new(db);
    store
        .set(&PrefKey::new("r1", "irc", "karma", "max"), "25")
        .await
        .unwrap();

    let registry = Registry::new();
    let plugin = karma();
    registry.register_plugin(Arc::clone(&plugin));
    let inst = registry
        .register_instance(plugin.instance("r1", Arc::new(NamedBroker::new("irc"))))
        .unwrap();

    inst.load_settings_from_prefs(&store).await.unwrap();
    let first = inst.settings();
    inst.save_settings_to_prefs(&store).await.unwrap();
    inst.load_settings_from_prefs(&store).await.unwrap();

    assert_eq!(inst.settings(), first);
    assert_eq!(inst.setting("max").as_deref(), Some("25"));
}

#[tokio::test]
async fn plugin_wide_default_applies_to_new_rooms() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let store = SqlitePreferenceStore::new(db);
    store
        .set_scoped(PrefScope::Global, &PrefKey::new("", "", "karma", "max"), "50")
        .await
        .unwrap();

    let inst = karma().instance("brand-new-room", Arc::new(NamedBroker::new("slack")));
    inst.load_settings_from_prefs(&store).await.unwrap();
    assert_eq!(inst.setting("max").as_deref(), Some("50"));

    // Saving writes the room-scoped copy; the global row is untouched.
    inst.set_setting("max", "5").unwrap();
    inst.save_settings_to_prefs(&store).await.unwrap();

    let rows = store.list_plugin("karma").await.unwrap();
    let global = rows
        .iter()
        .find(|p| p.scope == PrefScope::Global && p.key.key == "max")
        .unwrap();
    assert_eq!(global.value, "50");
    assert_eq!(
        store
            .get(&PrefKey::new("brand-new-room", "slack", "karma", "max"))
            .await
            .unwrap()
            .as_deref(),
        Some("5")
    );
}

#[tokio::test]
async fn empty_broker_name_round_trips() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let store = SqlitePreferenceStore::new(db);

    let inst = karma().instance("r1", Arc::new(NamedBroker::new("")));
    inst.set_setting("max", "5").unwrap();
    inst.save_settings_to_prefs(&store).await.unwrap();
    inst.load_settings_from_prefs(&store).await.unwrap();

    assert_eq!(inst.setting("max").as_deref(), Some("5"));
}

#[tokio::test]
async fn empty_room_does_not_leak_into_other_rooms() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let store = SqlitePreferenceStore::new(db);
    let plugin = karma();

    let unnamed = plugin.instance("", Arc::new(NamedBroker::new("irc")));
    unnamed.set_setting("max", "1").unwrap();
    unnamed.save_settings_to_prefs(&store).await.unwrap();

    let fresh = plugin.instance("r7", Arc::new(NamedBroker::new("irc")));
    fresh.load_settings_from_prefs(&store).await.unwrap();
    assert_eq!(fresh.setting("max").as_deref(), Some("10"));

    let rows = store.list_plugin("karma").await.unwrap();
    assert!(rows.iter().all(|p| p.scope == PrefScope::Room));

    unnamed.load_settings_from_prefs(&store).await.unwrap();
    assert_eq!(unnamed.setting("max").as_deref(), Some("1"));
}
