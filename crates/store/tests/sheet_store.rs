use serde_json::json;
use telesink_core::config::SheetInsert;
use telesink_store::sheet::{Credentials, SheetStore, SheetsClient, SheetsEndpoints};
use telesink_store::{HistoryOrder, Store};
use testkit::{FakeSheets, record_at};

fn sheet_store(fake: &FakeSheets, insert: SheetInsert, buffered: bool) -> SheetStore {
    let client = SheetsClient::new(
        Credentials::AccessToken("ya29.test".to_string()),
        "Telemetry",
        None,
        SheetsEndpoints::single(&fake.base_url),
    );
    SheetStore::new(client, insert, buffered)
}

#[tokio::test]
async fn first_write_creates_header_and_top_insert_keeps_newest_first() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Top, false));
    assert_eq!(store.order(), HistoryOrder::NewestFirst);

    for i in 1..=3 {
        store.append(record_at(i, "/api/data")).await?;
    }

    let rows = fake.rows();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], json!("received_at"));
    assert_eq!(rows[0][1], json!("path"));
    assert_eq!(rows[1][0], json!("2026-02-01T00:00:03.000Z"));
    assert_eq!(rows[3][0], json!("2026-02-01T00:00:01.000Z"));

    let history = store.history(10).await?;
    let temps = history.iter().map(|r| r.data["temp"].clone()).collect::<Vec<_>>();
    assert_eq!(temps, vec![json!(43), json!(42), json!(41)]);
    assert_eq!(history[0].id, 3);

    let exported = store.export_rows().await?;
    assert_eq!(exported.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(store.latest().await?.map(|r| r.id), Some(3));
    Ok(())
}

#[tokio::test]
async fn append_mode_writes_below_existing_rows() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Append, false));
    assert_eq!(store.order(), HistoryOrder::InsertionOrder);

    let first = store.append(record_at(1, "/")).await?;
    let second = store.append(record_at(2, "/")).await?;
    assert_eq!((first.id, second.id), (1, 2));

    let rows = fake.rows();
    assert_eq!(rows[1][0], json!("2026-02-01T00:00:01.000Z"));
    assert_eq!(rows[2][0], json!("2026-02-01T00:00:02.000Z"));
    assert_eq!(store.count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn existing_header_is_reused() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    fake.set_rows(vec![vec![
        json!("received_at"),
        json!("path"),
        json!("temp"),
    ]]);
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Append, false));
    store.append(record_at(1, "/")).await?;

    let rows = fake.rows();
    assert_eq!(rows[0].len(), 3);
    assert_eq!(rows[1][2], json!(41));
    Ok(())
}

#[tokio::test]
async fn buffered_writes_wait_for_flush() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Top, true));
    assert!(store.is_buffered());

    for i in 1..=3 {
        store.append(record_at(i, "/api/data")).await?;
    }
    assert!(fake.rows().is_empty());
    assert_eq!(store.count().await?, 3, "pending rows are readable");

    assert_eq!(store.flush_pending().await?, 3);
    let rows = fake.rows();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][0], json!("2026-02-01T00:00:03.000Z"));
    assert_eq!(store.flush_pending().await?, 0);
    assert_eq!(store.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn failed_flush_drops_the_batch() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Top, true));
    store.append(record_at(1, "/")).await?;

    fake.fail_writes(true);
    assert!(store.flush_pending().await.is_err());
    fake.fail_writes(false);

    assert_eq!(store.flush_pending().await?, 0);
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn appends_racing_flushes_get_unique_ids() -> anyhow::Result<()> {
    let fake = FakeSheets::spawn().await?;
    let store = Store::sheet(sheet_store(&fake, SheetInsert::Append, true));

    let flusher = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                store.flush_pending().await?;
                tokio::task::yield_now().await;
            }
            anyhow::Ok(())
        })
    };
    let writers = (0..8u64)
        .map(|w| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..10 {
                    ids.push(store.append(record_at(w * 10 + i, "/")).await?.id);
                }
                anyhow::Ok(ids)
            })
        })
        .collect::<Vec<_>>();

    let mut ids = Vec::new();
    for writer in writers {
        ids.extend(writer.await??);
    }
    flusher.await??;
    store.flush_pending().await?;

    ids.sort_unstable();
    assert_eq!(ids, (1..=80).collect::<Vec<u64>>());
    assert_eq!(fake.rows().len(), 81);
    Ok(())
}
