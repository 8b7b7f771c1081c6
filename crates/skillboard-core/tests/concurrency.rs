use skillboard_core::model::ProfileUpsert;
use skillboard_core::storage::{Store, StoreOptions};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_upserts_keep_one_row_per_id() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("profiles.db");
    Store::open(&db_path)?.init_schema()?;

    let opts = StoreOptions {
        busy_timeout: Duration::from_secs(10),
    };

    // Separate handles (separate connections) racing on the same ids.
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = db_path.clone();
            let opts = opts.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                let store = Store::open_with(&path, &opts)?;
                for round in 0..25 {
                    let id = format!("shared-{}", round % 5);
                    store.upsert(&ProfileUpsert::new(id).points(worker * 100 + round))?;
                }
                Ok(())
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker panicked")?;
    }

    let conn = rusqlite::Connection::open(&db_path)?;
    let rows: i64 = conn.query_row("SELECT count(*) FROM skillrack_profiles", [], |r| r.get(0))?;
    let distinct: i64 =
        conn.query_row("SELECT count(DISTINCT id) FROM skillrack_profiles", [], |r| r.get(0))?;
    assert_eq!(rows, 5);
    assert_eq!(distinct, 5);
    Ok(())
}

#[test]
fn cloned_handles_share_one_connection() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    store
                        .upsert(&ProfileUpsert::new(format!("w{worker}")).points(round))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }

    for worker in 0..4 {
        let rec = store.get(&format!("w{worker}"))?.expect("row exists");
        assert_eq!(rec.points, 49);
        assert!(rec.updated_at >= rec.created_at);
    }
    Ok(())
}
