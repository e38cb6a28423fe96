//! Postgres-backed `NoteStore` tests
//!
//! Need a live PostgreSQL with pgvector at `DATABASE_URL` (or the default dev
//! URL). Each test skips when the database is unreachable.

use pkos_core::config::DatabaseConfig;
use pkos_core::{NewAuditEntry, NewNote, NoteFilter, NoteStore, NoteUpdate, PgNoteStore, EMBEDDING_DIMENSIONS};
use uuid::Uuid;

async fn make_store() -> Option<PgNoteStore> {
    let mut config = DatabaseConfig {
        acquire_timeout_secs: 2,
        ..Default::default()
    };
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.url = url;
    }
    let pool = pkos_core::db::create_pool(&config).await.ok()?;
    pkos_core::db::run_migrations(&pool).await.ok()?;
    Some(PgNoteStore::new(pool))
}

fn unit_vector(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIMENSIONS];
    v[axis] = 1.0;
    v
}

// ===========================================================================
// TEST 1: insert / fetch / partial update
// ===========================================================================
#[tokio::test]
async fn test_pg_insert_fetch_update() {
    let store = match make_store().await {
        Some(s) => s,
        None => {
            eprintln!("Skipping test_pg_insert_fetch_update: DB unavailable");
            return;
        }
    };

    let note = store
        .insert(NewNote::new("pg roundtrip").with_tags(["pg"]))
        .await
        .unwrap();
    assert_eq!(note.metadata, serde_json::json!({}));
    assert!(!note.is_archived);

    let fetched = store.fetch(note.id).await.unwrap().unwrap();
    assert_eq!(fetched.content, "pg roundtrip");

    let update = NoteUpdate {
        tags: Some(vec!["changed".to_string()]),
        ..Default::default()
    };
    let updated = store.update(note.id, &update).await.unwrap().unwrap();
    assert_eq!(updated.content, "pg roundtrip");
    assert_eq!(updated.tags, vec!["changed".to_string()]);
    assert!(updated.updated_at >= note.updated_at);

    assert!(store.update(Uuid::new_v4(), &update).await.unwrap().is_none());
    assert!(store.delete(note.id).await.unwrap());
}

// ===========================================================================
// TEST 2: delete cascades links and audit rows
// ===========================================================================
#[tokio::test]
async fn test_pg_delete_cascades() {
    let store = match make_store().await {
        Some(s) => s,
        None => {
            eprintln!("Skipping test_pg_delete_cascades: DB unavailable");
            return;
        }
    };

    let a = store.insert(NewNote::new("cascade a")).await.unwrap();
    let b = store.insert(NewNote::new("cascade b")).await.unwrap();
    assert!(store.add_link(a.id, b.id).await.unwrap());
    assert!(!store.add_link(a.id, b.id).await.unwrap());
    store
        .append_audit(NewAuditEntry {
            note_id: a.id,
            action: "create".to_string(),
            changes: serde_json::json!({}),
            user_id: None,
        })
        .await
        .unwrap();

    assert!(store.delete(a.id).await.unwrap());
    assert!(store.incoming_links(b.id).await.unwrap().is_empty());
    assert!(store.audit_history(a.id, 10).await.unwrap().is_empty());

    store.delete(b.id).await.unwrap();
}

// ===========================================================================
// TEST 3: nearest uses L2 distance and skips NULL embeddings
// ===========================================================================
#[tokio::test]
async fn test_pg_nearest() {
    let store = match make_store().await {
        Some(s) => s,
        None => {
            eprintln!("Skipping test_pg_nearest: DB unavailable");
            return;
        }
    };

    let near = store.insert(NewNote::new("nearest near")).await.unwrap();
    let far = store.insert(NewNote::new("nearest far")).await.unwrap();
    let bare = store.insert(NewNote::new("nearest bare")).await.unwrap();
    store.set_embedding(near.id, unit_vector(0)).await.unwrap();
    store.set_embedding(far.id, unit_vector(1)).await.unwrap();

    let hits = store.nearest(&unit_vector(0), 1000).await.unwrap();
    let near_pos = hits.iter().position(|h| h.id == near.id).unwrap();
    let far_pos = hits.iter().position(|h| h.id == far.id).unwrap();
    assert!(near_pos < far_pos);
    assert!(hits[near_pos].distance.abs() < 1e-6);
    assert!((hits[far_pos].distance - 2f64.sqrt()).abs() < 1e-4);
    assert!(hits.iter().all(|h| h.id != bare.id));

    for id in [near.id, far.id, bare.id] {
        store.delete(id).await.unwrap();
    }
}

// ===========================================================================
// TEST 4: list filters archived notes and tags
// ===========================================================================
#[tokio::test]
async fn test_pg_list_filters() {
    let store = match make_store().await {
        Some(s) => s,
        None => {
            eprintln!("Skipping test_pg_list_filters: DB unavailable");
            return;
        }
    };

    let tag = format!("it-{}", Uuid::new_v4());
    let live = store
        .insert(NewNote::new("live").with_tags([tag.clone()]))
        .await
        .unwrap();
    let old = store
        .insert(NewNote::new("old").with_tags([tag.clone()]))
        .await
        .unwrap();
    let archive = NoteUpdate {
        is_archived: Some(true),
        ..Default::default()
    };
    store.update(old.id, &archive).await.unwrap();

    let visible = store
        .list(&NoteFilter {
            include_archived: false,
            tag: Some(tag.clone()),
        })
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, live.id);

    let all = store
        .list(&NoteFilter {
            include_archived: true,
            tag: Some(tag),
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    store.delete(live.id).await.unwrap();
    store.delete(old.id).await.unwrap();
}
