//! Channel lifecycle integration tests
//!
//! Drives whole modules against the mock subscription backend and the
//! in-memory store:
//! - path variables across open / close / open cycles
//! - server-delivered state cleared on teardown
//! - where-clause resolution with and without identity
//! - doc mode id and local patches
//! - repeated and concurrent opens

use docsync::{
    ArrayDirective, ChannelState, CloseOptions, Collaborators, MemoryStore, MockSubscription,
    ModuleConfig, ModuleMode, PathVariables, StaticIdentity, SyncConfig, SyncModule, WhereClause,
    WhereOp,
};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    backend: Arc<MockSubscription>,
    store: Arc<MemoryStore>,
    identity: Arc<StaticIdentity>,
}

impl Harness {
    fn new(backend: MockSubscription) -> Self {
        Self {
            backend: Arc::new(backend),
            store: Arc::new(MemoryStore::new()),
            identity: Arc::new(StaticIdentity::anonymous()),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.backend.clone(), self.store.clone(), self.identity.clone())
    }

    fn module(&self, config: ModuleConfig) -> SyncModule {
        SyncModule::new(config, self.collaborators()).unwrap()
    }
}

fn name(value: &str) -> Option<PathVariables> {
    Some(PathVariables::from([("name".to_string(), value.to_string())]))
}

// =============================================================================
// Path variables
// =============================================================================

#[tokio::test]
async fn test_resolved_path_across_open_close_open() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(ModuleConfig::new("testPathVar", "coll/{name}").unwrap());

    // 0. initial path
    assert!(module.path_variables().is_empty());
    assert_eq!(module.config().path_template.as_str(), "coll/{name}");
    assert_eq!(module.resolved_path(), "coll/{name}");

    // 1. open once
    assert_ok!(module.open(name("Luca")).await);
    assert_eq!(module.path_variables(), name("Luca").unwrap());
    assert_eq!(module.config().path_template.as_str(), "coll/{name}");
    assert_eq!(module.resolved_path(), "coll/Luca");

    // 2. close with teardown
    assert_ok!(module.close(CloseOptions::clear_module()).await);
    assert!(module.path_variables().is_empty());
    assert_eq!(module.resolved_path(), "coll/{name}");

    // 3. open again, nothing from the first epoch leaks in
    let handle = module.open(name("Mesqueeb")).await.unwrap();
    assert_eq!(handle.path, "coll/Mesqueeb");
    assert_eq!(module.path_variables(), name("Mesqueeb").unwrap());
    assert_eq!(module.resolved_path(), "coll/Mesqueeb");

    let paths: Vec<String> = h.backend.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["coll/Luca", "coll/Mesqueeb"]);
}

#[tokio::test]
async fn test_server_state_dropped_on_teardown() {
    let h = Harness::new(
        MockSubscription::new()
            .with_document("testPathVar2/Luca", json!({"number": 29}))
            .with_document("testPathVar2/Mesqueeb", json!({"number": 42})),
    );
    let module = h.module(ModuleConfig::new("testPathVar2", "testPathVar2/{name}").unwrap());

    module.open(name("Luca")).await.unwrap();
    assert_eq!(h.store.field("testPathVar2", "number"), Some(json!(29)));

    // not part of the initial state, so it must not stick around
    module.close(CloseOptions::clear_module()).await.unwrap();
    assert_eq!(h.store.field("testPathVar2", "number"), None);

    module.open(name("Mesqueeb")).await.unwrap();
    assert_eq!(h.store.field("testPathVar2", "number"), Some(json!(42)));
    assert_eq!(module.resolved_path(), "testPathVar2/Mesqueeb");
}

#[tokio::test]
async fn test_teardown_restores_initial_state() {
    let h = Harness::new(MockSubscription::new().with_document("pets/Luca", json!({"count": 3})));
    let module = h.module(
        ModuleConfig::new("pets", "pets/{name}")
            .unwrap()
            .with_initial_state(json!({"count": 0, "tags": []})),
    );

    module.open(name("Luca")).await.unwrap();
    assert_eq!(h.store.field("pets", "count"), Some(json!(3)));

    module.close(CloseOptions::clear_module()).await.unwrap();
    assert_eq!(h.store.module_state("pets"), Some(json!({"count": 0, "tags": []})));
}

// =============================================================================
// Where clauses
// =============================================================================

#[tokio::test]
async fn test_where_clauses_follow_identity_and_variables() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(
        ModuleConfig::new("mainCharacter", "characters")
            .unwrap()
            .with_where(WhereClause::new("hi.{userId}.docs.{name}", WhereOp::Eq, "{big}")),
    );

    // 0. signed in, nothing opened yet
    h.identity.sign_in("charlie");
    assert_eq!(
        module.where_clauses().unwrap(),
        vec![WhereClause::new("hi.charlie.docs.{name}", WhereOp::Eq, "{big}")]
    );
    assert_eq!(module.config().where_clauses[0].field, "hi.{userId}.docs.{name}");

    // 1. open once, nobody signed in any more
    h.identity.sign_out();
    module.open(name("Luca")).await.unwrap();
    assert_eq!(module.path_variables(), name("Luca").unwrap());
    assert_eq!(
        module.where_clauses().unwrap(),
        vec![WhereClause::new("hi.null.docs.Luca", WhereOp::Eq, "{big}")]
    );

    // 2. open again with another name, the channel is reused
    module.open(name("Mesqueeb")).await.unwrap();
    assert_eq!(module.path_variables(), name("Mesqueeb").unwrap());
    assert_eq!(
        module.where_clauses().unwrap(),
        vec![WhereClause::new("hi.null.docs.Mesqueeb", WhereOp::Eq, "{big}")]
    );
    assert_eq!(h.backend.subscribe_count(), 1);

    // filters sent to the backend were resolved at open time
    let sent = &h.backend.requests()[0].where_clauses;
    assert_eq!(sent[0].field, "hi.null.docs.Luca");
}

#[tokio::test]
async fn test_open_joined_with_clearing_close_keeps_new_variables() {
    let h = Harness::new(MockSubscription::new().with_latency(Duration::from_millis(10)));
    let module = h.module(ModuleConfig::new("testPathVar", "coll/{name}").unwrap());
    module.open(name("Luca")).await.unwrap();

    let (closed, reopened) = tokio::join!(
        module.close(CloseOptions::clear_module()),
        module.open(name("Mesqueeb"))
    );
    assert_ok!(closed);
    assert_eq!(reopened.unwrap().path, "coll/Mesqueeb");
    assert_eq!(module.state(), ChannelState::Open);
    assert_eq!(module.path_variables(), name("Mesqueeb").unwrap());
    assert_eq!(module.resolved_path(), "coll/Mesqueeb");

    // a plain close keeps them for the next open
    module.close(CloseOptions::default()).await.unwrap();
    let handle = module.open(None).await.unwrap();
    assert_eq!(handle.path, "coll/Mesqueeb");
}

// =============================================================================
// Doc mode
// =============================================================================

#[tokio::test]
async fn test_doc_mode_id_and_patch() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(
        ModuleConfig::new("docModeWithPathVar", "playerCharacters/{name}")
            .unwrap()
            .with_mode(ModuleMode::Doc),
    );
    assert_eq!(module.resolved_path(), "playerCharacters/{name}");

    module.open(name("Lucaz")).await.unwrap();
    assert_eq!(module.resolved_path(), "playerCharacters/Lucaz");
    assert_eq!(h.store.field("docModeWithPathVar", "id"), Some(json!("Lucaz")));

    let mut fields = Map::new();
    fields.insert("description".into(), json!("Test"));
    fields.insert("tags".into(), ArrayDirective::union("hero").to_value());
    module.patch(fields);

    assert_eq!(module.resolved_path(), "playerCharacters/Lucaz");
    assert_eq!(h.store.field("docModeWithPathVar", "description"), Some(json!("Test")));
    assert_eq!(h.store.field("docModeWithPathVar", "tags"), Some(json!(["hero"])));
    assert_eq!(h.store.field("docModeWithPathVar", "id"), Some(json!("Lucaz")));
}

#[tokio::test]
async fn test_doc_mode_unresolved_path_writes_no_id() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(
        ModuleConfig::new("docModeWithPathVar", "playerCharacters/{name}")
            .unwrap()
            .with_mode(ModuleMode::Doc),
    );

    let handle = module.open(None).await.unwrap();
    assert_eq!(handle.path, "playerCharacters/{name}");
    assert_eq!(h.store.field("docModeWithPathVar", "id"), None);
}

#[tokio::test]
async fn test_snapshot_fields_kept_literal() {
    let h = Harness::new(
        MockSubscription::new().with_document("stats", json!({"a.b": 1, "number": 29})),
    );
    let module = h.module(ModuleConfig::new("stats", "stats").unwrap());

    module.open(None).await.unwrap();
    assert_eq!(
        h.store.module_state("stats"),
        Some(json!({"a.b": 1, "number": 29}))
    );
}

// =============================================================================
// Repeated and concurrent opens
// =============================================================================

#[tokio::test]
async fn test_open_multiple_times() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(ModuleConfig::new("multipleOpenDBChannels", "multi/{name}").unwrap());

    assert_ok!(module.open(None).await);
    assert_ok!(module.open(None).await);
    assert_ok!(module.open(name("Lucaz")).await);
    assert_ok!(module.open(name("Lucas")).await);
    assert_ok!(module.open(name("Lucas")).await);

    assert_eq!(h.backend.subscribe_count(), 1);
    assert_eq!(h.backend.active_count(), 1);
    assert_eq!(module.path_variables(), name("Lucas").unwrap());
}

#[tokio::test]
async fn test_five_concurrent_opens_one_subscription() {
    let h = Harness::new(MockSubscription::new().with_latency(Duration::from_millis(10)));
    let module = h.module(ModuleConfig::new("multipleOpenDBChannels", "multi").unwrap());

    let results = futures::future::join_all((0..5).map(|_| module.open(None))).await;

    assert_eq!(results.len(), 5);
    for result in &results {
        assert_ok!(result);
    }
    assert_eq!(h.backend.subscribe_count(), 1);
    assert_eq!(module.state(), ChannelState::Open);
}

#[tokio::test]
async fn test_second_open_during_opening_merges_without_restart() {
    let h = Harness::new(MockSubscription::new().with_latency(Duration::from_millis(10)));
    let module = h.module(ModuleConfig::new("multipleOpenDBChannels", "multi/{name}").unwrap());

    let (first, second) = tokio::join!(module.open(None), module.open(name("Lucaz")));
    let first = first.unwrap();
    let second = second.unwrap();

    // the in-flight subscription keeps the path it started with
    assert_eq!(first, second);
    assert_eq!(first.path, "multi/{name}");
    assert_eq!(h.backend.subscribe_count(), 1);

    // while the remembered variables take the later value
    assert_eq!(module.resolved_path(), "multi/Lucaz");
}

#[tokio::test]
async fn test_open_failure_then_retry() {
    let h = Harness::new(MockSubscription::new());
    let module = h.module(ModuleConfig::new("flaky", "flaky/{name}").unwrap());

    h.backend.set_reject_subscribe(true);
    assert_err!(module.open(name("Luca")).await);
    assert_eq!(module.state(), ChannelState::Closed);
    // variables merged before the failure are kept for the retry
    assert_eq!(module.resolved_path(), "flaky/Luca");

    h.backend.set_reject_subscribe(false);
    let handle = module.open(None).await.unwrap();
    assert_eq!(handle.path, "flaky/Luca");
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_modules_from_yaml() {
    let yaml = r#"
modules:
  - module_name: mainCharacter
    path_template: "characters/{userId}"
    where:
      - ["owner", "==", "{userId}"]
  - module_name: settings
    path_template: "settings/global"
    mode: doc
"#;
    let config = SyncConfig::from_yaml(yaml).unwrap();
    let h = Harness::new(MockSubscription::new());
    h.identity.sign_in("charlie");

    let modules = docsync::modules_from_config(&config, &h.collaborators()).unwrap();
    assert_eq!(modules.len(), 2);

    let character = &modules["mainCharacter"];
    assert_eq!(character.resolved_path(), "characters/charlie");
    assert_eq!(
        character.where_clauses().unwrap(),
        vec![WhereClause::new("owner", WhereOp::Eq, "charlie")]
    );

    let settings = &modules["settings"];
    settings.open(None).await.unwrap();
    assert_eq!(h.store.field("settings", "id"), Some(json!("global")));
}
