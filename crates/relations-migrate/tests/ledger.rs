//! Ledger bootstrap and step application over a scripted connection.

mod common;

use common::{write, Call, Scripted};
use relations_core::SqlValue;
use relations_migrate::prelude::*;

const EXISTS: &str = "SELECT COUNT(*) AS `total` FROM `information_schema`.`tables` \
                      WHERE `table_schema`=%s AND `table_name`=%s";
const CREATE: &str = "CREATE TABLE IF NOT EXISTS `app`.`_relations_migration` \
                      (`migration` VARCHAR(255) NOT NULL PRIMARY KEY)";
const READ: &str =
    "SELECT `migration` FROM `app`.`_relations_migration` ORDER BY `migration`";
const RECORD: &str = "INSERT INTO `app`.`_relations_migration` (`migration`) VALUES(%s)";

fn exists_call() -> Call {
    Call::Fetch(
        EXISTS.to_string(),
        vec![
            SqlValue::Text("app".into()),
            SqlValue::Text(LEDGER_TABLE.into()),
        ],
    )
}

fn record_call(id: &str) -> Call {
    Call::Execute(RECORD.to_string(), vec![SqlValue::Text(id.into())])
}

fn baseline(dir: &std::path::Path) {
    write(
        dir,
        "definition.sql",
        "CREATE TABLE IF NOT EXISTS `app`.`unit` (\n  `id` INTEGER\n);\n\n\
         CREATE TABLE IF NOT EXISTS `app`.`test` (\n  `id` INTEGER\n);\n",
    );
}

#[tokio::test]
async fn test_bootstrap_runs_baseline() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-20260101000000.sql", "DROP TABLE `app`.`test`;\n");

    let mut connection = Scripted::new().ledger_exists(false);
    let ledger = Ledger::new("app", dir.path());

    assert!(ledger.migrate(&mut connection).await.unwrap());

    assert_eq!(
        connection.calls,
        vec![
            exists_call(),
            Call::Execute(
                "CREATE TABLE IF NOT EXISTS `app`.`unit` (\n  `id` INTEGER\n)".to_string(),
                vec![]
            ),
            Call::Execute(
                "CREATE TABLE IF NOT EXISTS `app`.`test` (\n  `id` INTEGER\n)".to_string(),
                vec![]
            ),
            Call::Execute(CREATE.to_string(), vec![]),
            record_call("20260101000000"),
            Call::Commit,
        ]
    );
}

#[tokio::test]
async fn test_failed_baseline_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-1.sql", "DROP TABLE `app`.`test`;\n");

    let mut connection = Scripted::new()
        .ledger_exists(false)
        .failing_on("`app`.`test`");
    let ledger = Ledger::new("app", dir.path());

    let err = ledger.migrate(&mut connection).await.unwrap_err();
    assert!(matches!(err, MigrateError::Database(_)));
    assert!(!connection.executed().contains(&CREATE));
    assert_eq!(connection.commits(), 0);

    connection.fail_on = None;
    connection.calls.clear();
    let mut connection = connection.ledger_exists(false);

    assert!(ledger.migrate(&mut connection).await.unwrap());
    assert_eq!(
        connection.executed(),
        vec![
            "CREATE TABLE IF NOT EXISTS `app`.`unit` (\n  `id` INTEGER\n)",
            "CREATE TABLE IF NOT EXISTS `app`.`test` (\n  `id` INTEGER\n)",
            CREATE,
            RECORD,
        ]
    );
    assert_eq!(connection.commits(), 1);
}

#[tokio::test]
async fn test_rerun_without_steps_only_checks() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());

    let mut connection = Scripted::new().ledger_exists(true);
    let ledger = Ledger::new("app", dir.path());

    assert!(!ledger.migrate(&mut connection).await.unwrap());
    assert_eq!(connection.calls, vec![exists_call()]);
}

#[tokio::test]
async fn test_pending_steps_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-3.sql", "ALTER TABLE `app`.`unit`\n  ADD `c` INTEGER;\n");
    write(dir.path(), "migration-1.sql", "ALTER TABLE `app`.`unit`\n  ADD `a` INTEGER;\n");
    write(
        dir.path(),
        "migration-2.sql",
        "ALTER TABLE `app`.`unit`\n  ADD `b` INTEGER;\n\nDROP TABLE `app`.`test`;\n",
    );
    write(dir.path(), "notes.txt", "not a step");

    let mut connection = Scripted::new().ledger_exists(true).recorded(&["1"]);
    let ledger = Ledger::new("app", dir.path());

    assert!(ledger.migrate(&mut connection).await.unwrap());

    assert_eq!(
        connection.calls,
        vec![
            exists_call(),
            Call::Fetch(READ.to_string(), vec![]),
            Call::Execute("ALTER TABLE `app`.`unit`\n  ADD `b` INTEGER".to_string(), vec![]),
            Call::Execute("DROP TABLE `app`.`test`".to_string(), vec![]),
            record_call("2"),
            Call::Commit,
            Call::Execute("ALTER TABLE `app`.`unit`\n  ADD `c` INTEGER".to_string(), vec![]),
            record_call("3"),
            Call::Commit,
        ]
    );
}

#[test]
fn test_up_to_date_only_reads() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-1.sql", "DROP TABLE `app`.`test`;\n");

    let mut connection = Scripted::new().ledger_exists(true).recorded(&["1"]);
    let ledger = Ledger::new("app", dir.path());

    let migrated = tokio_test::block_on(ledger.migrate(&mut connection)).unwrap();

    assert!(!migrated);
    assert!(connection.executed().is_empty());
    assert_eq!(connection.commits(), 0);
}

#[tokio::test]
async fn test_failed_step_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-1.sql", "DROP TABLE `app`.`test`;\n");
    write(dir.path(), "migration-2.sql", "DROP TABLE `app`.`broken`;\n");

    let mut connection = Scripted::new()
        .ledger_exists(true)
        .recorded(&[])
        .failing_on("broken");
    let ledger = Ledger::new("app", dir.path());

    let err = ledger.migrate(&mut connection).await.unwrap_err();
    assert!(matches!(err, MigrateError::Database(_)));

    assert_eq!(
        connection.executed(),
        vec!["DROP TABLE `app`.`test`", RECORD]
    );
    assert_eq!(connection.commits(), 1);
}

#[tokio::test]
async fn test_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut connection = Scripted::new();
    let ledger = Ledger::new("app", dir.path().join("missing"));

    let err = ledger.migrate(&mut connection).await.unwrap_err();
    assert!(matches!(err, MigrateError::MigrationsDirNotFound(_)));
    assert!(connection.calls.is_empty());
}

#[tokio::test]
async fn test_status() {
    let dir = tempfile::tempdir().unwrap();
    baseline(dir.path());
    write(dir.path(), "migration-1.sql", "");
    write(dir.path(), "migration-2.sql", "");

    let mut connection = Scripted::new().ledger_exists(true).recorded(&["1"]);
    let status = Ledger::new("app", dir.path())
        .status(&mut connection)
        .await
        .unwrap();

    assert_eq!(
        status,
        vec![
            StepStatus {
                id: "1".into(),
                applied: true
            },
            StepStatus {
                id: "2".into(),
                applied: false
            },
        ]
    );

    let mut fresh = Scripted::new().ledger_exists(false);
    let status = Ledger::new("app", dir.path()).status(&mut fresh).await.unwrap();
    assert!(status.iter().all(|step| !step.applied));
    assert_eq!(fresh.calls, vec![exists_call()]);
}

#[tokio::test]
async fn test_execute_splits_statements() {
    let mut connection = Scripted::new();

    execute(&mut connection, "DROP TABLE a;\n\nDROP TABLE b;\n")
        .await
        .unwrap();

    assert_eq!(connection.executed(), vec!["DROP TABLE a", "DROP TABLE b"]);
    assert_eq!(connection.commits(), 0);
}

#[tokio::test]
async fn test_generated_artifacts_apply() {
    let dir = tempfile::tempdir().unwrap();
    let definitions: Definitions = serde_json::from_value(serde_json::json!({
        "unit": {
            "name": "unit",
            "source": "mysql",
            "fields": [{"name": "id", "kind": "int", "auto": true}],
            "id": "id"
        }
    }))
    .unwrap();

    let sql = Generator::new("mysql").database("app").define(&definitions);
    write_definition(dir.path(), &sql).unwrap();
    write_step(dir.path(), "1", "DROP TABLE `app`.`unit`;\n").unwrap();

    let mut connection = Scripted::new().ledger_exists(false);
    assert!(Ledger::new("app", dir.path())
        .migrate(&mut connection)
        .await
        .unwrap());

    assert_eq!(
        connection.executed(),
        vec![
            "CREATE TABLE IF NOT EXISTS `app`.`unit` (\n  \
             `id` INTEGER AUTO_INCREMENT,\n  \
             PRIMARY KEY (`id`)\n)",
            CREATE,
            RECORD,
        ]
    );
}
