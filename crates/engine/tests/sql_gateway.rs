use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Direction, Engine, ErrorKind, Gateway, MoneyCents, NewTransaction, Sort, SqlGateway,
    Transaction, TransactionFilter, TransactionUpdate,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    (engine, path)
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 8, 30, 0).unwrap()
}

fn cents(value: i64) -> MoneyCents {
    MoneyCents::new(value)
}

#[tokio::test]
async fn transactions_round_trip_through_the_database() {
    let (engine, _db) = engine_with_db().await;
    let origin = engine.new_origin("alice", "Bank").await.unwrap();

    let tx = engine
        .create_transaction(
            NewTransaction::new("alice", cents(12_345), Direction::Debit, at(2024, 2, 14))
                .origin(&origin.id)
                .subject("dinner", "bistro")
                .description("anniversary"),
        )
        .await
        .unwrap();

    let stored = engine.transaction(&tx.id, "alice").await.unwrap();
    assert_eq!(stored.transaction, tx);
    assert_eq!(stored.transaction.created_label, "2024-02-14");
    assert_eq!(stored.origin.unwrap().total, cents(-12_345));
}

#[tokio::test]
async fn reconciliation_against_sqlite() {
    let (engine, _db) = engine_with_db().await;
    let x = engine.new_origin("alice", "X").await.unwrap();
    let y = engine.new_origin("alice", "Y").await.unwrap();

    let tx = engine
        .create_transaction(
            NewTransaction::new("alice", cents(5_000), Direction::Credit, at(2024, 1, 5))
                .origin(&x.id),
        )
        .await
        .unwrap();

    let tx = engine
        .update_transaction(
            &tx.id,
            "alice",
            TransactionUpdate {
                amount: cents(8_000),
                ..TransactionUpdate::from(&tx)
            },
        )
        .await
        .unwrap();
    assert_eq!(engine.origin(&x.id, "alice").await.unwrap().total, cents(8_000));

    let tx = engine
        .update_transaction(
            &tx.id,
            "alice",
            TransactionUpdate {
                origin_id: Some(y.id.clone()),
                direction: Direction::Debit,
                ..TransactionUpdate::from(&tx)
            },
        )
        .await
        .unwrap();
    assert_eq!(engine.origin(&x.id, "alice").await.unwrap().total, cents(0));
    assert_eq!(engine.origin(&y.id, "alice").await.unwrap().total, cents(-8_000));

    engine.delete_transaction(&tx.id, "alice").await.unwrap();
    assert_eq!(engine.origin(&y.id, "alice").await.unwrap().total, cents(0));

    let err = engine.transaction(&tx.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn increment_is_evaluated_by_the_database() {
    let (_engine, db) = engine_with_db().await;
    let gateway = SqlGateway::new(db);
    let origin = gateway.insert_origin("alice", "Bank").await.unwrap();

    gateway
        .update_origin(&origin.id, "Bank", Some(cents(1_000)))
        .await
        .unwrap();
    let after = gateway
        .increment_origin_total(&origin.id, cents(-250))
        .await
        .unwrap();
    assert_eq!(after.total, cents(750));

    let err = gateway
        .increment_origin_total("missing", cents(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn overflowing_increment_is_rejected_and_leaves_the_total() {
    let (_engine, db) = engine_with_db().await;
    let gateway = SqlGateway::new(db);
    let origin = gateway.insert_origin("alice", "Bank").await.unwrap();
    gateway
        .update_origin(&origin.id, "Bank", Some(cents(i64::MAX - 1)))
        .await
        .unwrap();

    let err = gateway
        .increment_origin_total(&origin.id, cents(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    gateway
        .update_origin(&origin.id, "Bank", Some(cents(i64::MIN + 1)))
        .await
        .unwrap();
    let err = gateway
        .increment_origin_total(&origin.id, cents(-5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let stored = gateway.find_origin(&origin.id).await.unwrap().unwrap();
    assert_eq!(stored.total, cents(i64::MIN + 1));
}

#[tokio::test]
async fn rename_without_total_keeps_the_stored_balance() {
    let (engine, db) = engine_with_db().await;
    let gateway = SqlGateway::new(db);
    let origin = engine.new_origin("alice", "Bank").await.unwrap();
    gateway
        .increment_origin_total(&origin.id, cents(300))
        .await
        .unwrap();

    let renamed = gateway
        .update_origin(&origin.id, "Checking", None)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Checking");
    assert_eq!(renamed.total, cents(300));
}

#[tokio::test]
async fn writes_planned_on_a_stale_row_are_conflicts() {
    let (engine, db) = engine_with_db().await;
    let gateway = SqlGateway::new(db);
    let origin = engine.new_origin("alice", "Bank").await.unwrap();
    let stale = engine
        .create_transaction(
            NewTransaction::new("alice", cents(100), Direction::Credit, at(2024, 6, 1))
                .origin(&origin.id),
        )
        .await
        .unwrap();
    let current = engine
        .update_transaction(
            &stale.id,
            "alice",
            TransactionUpdate {
                amount: cents(150),
                ..TransactionUpdate::from(&stale)
            },
        )
        .await
        .unwrap();

    let next = Transaction {
        amount: cents(200),
        ..stale.clone()
    };
    let err = gateway.update_transaction(&stale, &next).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = gateway.delete_transaction(&stale).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = gateway.find_transaction(&stale.id).await.unwrap().unwrap();
    assert_eq!(stored, current);
    assert_eq!(
        engine.origin(&origin.id, "alice").await.unwrap().total,
        cents(150)
    );

    gateway.delete_transaction(&current).await.unwrap();
    let err = gateway.delete_transaction(&current).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adjustments_on_a_file_database() {
    let (engine, path) = engine_with_file_db().await;
    let origin = engine.new_origin("alice", "Bank").await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let origin_id = origin.id.clone();
        tasks.spawn(async move { engine.adjust(&origin_id, cents(5)).await.map(|_| ()) });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(
        engine.origin(&origin.id, "alice").await.unwrap().total,
        cents(100)
    );
    drop(engine);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn duplicate_origin_name_is_a_conflict() {
    let (engine, _db) = engine_with_db().await;
    let bank = engine.new_origin("alice", "Bank").await.unwrap();
    let cash = engine.new_origin("alice", "Cash").await.unwrap();
    engine.new_origin("bob", "Bank").await.unwrap();

    let err = engine.new_origin("alice", "Bank").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = engine
        .update_origin(&cash.id, "alice", Some("Bank"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let renamed = engine
        .update_origin(&bank.id, "alice", Some("Checking"), Some(cents(42)))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Checking");
    assert_eq!(renamed.total, cents(42));
}

#[tokio::test]
async fn filters_and_pagination_in_sql() {
    let (engine, db) = engine_with_db().await;
    for day in 1..=25 {
        let subject = if day % 5 == 0 { "rent" } else { "food" };
        engine
            .create_transaction(
                NewTransaction::new("alice", cents(100), Direction::Debit, at(2024, 3, day))
                    .subject(subject, "shop"),
            )
            .await
            .unwrap();
    }
    engine
        .create_transaction(NewTransaction::new(
            "alice",
            cents(100),
            Direction::Debit,
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        ))
        .await
        .unwrap();
    engine
        .create_transaction(NewTransaction::new(
            "bob",
            cents(100),
            Direction::Debit,
            at(2024, 3, 2),
        ))
        .await
        .unwrap();

    let march = engine
        .transactions_by_date("alice", 2, 10, 2024, Some(3))
        .await
        .unwrap();
    assert_eq!(march.total_documents, 25);
    assert_eq!(march.total_pages, 3);
    assert_eq!(march.items.len(), 10);
    assert_eq!(march.items[0].transaction.created_at, at(2024, 3, 15));

    let rent = engine
        .transactions_by_subject("alice", 1, 10, "rent", Some("shop"))
        .await
        .unwrap();
    assert_eq!(rent.total_documents, 5);

    let gateway = SqlGateway::new(db);
    let filter = TransactionFilter::user("alice").subject("food", None);
    let oldest = gateway
        .find_transaction_page(&filter, Sort::CreatedAtAsc, 0, 1)
        .await
        .unwrap();
    assert_eq!(oldest[0].created_at, at(2024, 3, 1));
    assert_eq!(gateway.count_transactions(&filter).await.unwrap(), 20);
}

#[tokio::test]
async fn enrichment_tolerates_deleted_origins() {
    let (engine, _db) = engine_with_db().await;
    let kept = engine.new_origin("alice", "Kept").await.unwrap();
    let dropped = engine.new_origin("alice", "Dropped").await.unwrap();
    for origin_id in [&kept.id, &dropped.id] {
        engine
            .create_transaction(
                NewTransaction::new("alice", cents(700), Direction::Credit, at(2024, 7, 1))
                    .origin(origin_id),
            )
            .await
            .unwrap();
    }
    engine.delete_origin(&dropped.id, "alice").await.unwrap();

    let page = engine.transactions_by_user("alice", 1, 10).await.unwrap();
    let with_origin = page.items.iter().filter(|item| item.origin.is_some()).count();
    assert_eq!(page.total_documents, 2);
    assert_eq!(with_origin, 1);
}
