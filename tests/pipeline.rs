use chrono::NaiveDate;
use spa::core::service::Stores;
use spa::facts::{FactValue, SqlSearch};
use spa::storage::{MemoryBlobStore, SqliteConfig, SqliteStore, StorageBackend};
use spa::{FactQuery, Spa, SpaConfig};
use std::sync::Arc;
use uuid::Uuid;

const REPORT: &str = include_str!("data/awr_small.html");

/// The fixture with its snapshot window moved by `minutes`.
fn shifted_report(minutes: u32) -> Vec<u8> {
    REPORT
        .replace("10:01:05", &format!("10:{:02}:05", minutes + 1))
        .replace("10:00:05", &format!("10:{:02}:05", minutes))
        .into_bytes()
}

async fn dataset_with_reports(spa: &Spa, offsets: &[u32]) -> (Uuid, Vec<Uuid>) {
    let mut ids = Vec::new();
    for (i, minutes) in offsets.iter().enumerate() {
        let id = spa
            .reports
            .ingest(shifted_report(*minutes), &format!("awr_{}.html", i))
            .await
            .unwrap();
        ids.push(id);
    }
    let dataset = spa.datasets.create("prod", "nightly batch").await.unwrap();
    let outcome = spa.datasets.assign(dataset.id, &ids).await.unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.failed);
    (dataset.id, ids)
}

fn at(h: u32, m: u32, s: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 2, 5)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[tokio::test]
async fn test_extract_core_facts() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let (dataset_id, _) = dataset_with_reports(&spa, &[0]).await;

    let cpu = spa
        .facts
        .find(
            &FactQuery::new(dataset_id)
                .category("Host CPU")
                .dimension("Host Name", "db01.example.com"),
        )
        .await
        .unwrap();
    assert_eq!(cpu.len(), 2);
    let user = cpu.iter().find(|f| f.name == "CPU %User").unwrap();
    let system = cpu.iter().find(|f| f.name == "CPU %System").unwrap();
    assert_eq!(user.value, FactValue::Number(12.5));
    assert_eq!(system.value, FactValue::Number(3.1));

    let sessions = spa
        .facts
        .find(
            &FactQuery::new(dataset_id)
                .names(["Sessions"])
                .dimension("DB Name", "FOO")
                .dimension("Instance", "FOO1"),
        )
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].value, FactValue::Number(120.0));

    for fact in cpu.iter().chain(&sessions) {
        assert_eq!(fact.start, at(10, 0, 5));
        assert_eq!(fact.end, at(10, 1, 5));
    }
}

#[tokio::test]
async fn test_lookup_and_converted_facts() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let (dataset_id, _) = dataset_with_reports(&spa, &[0]).await;

    let table = spa
        .facts
        .table(&FactQuery::new(dataset_id).category("Cache Sizes"))
        .await
        .unwrap();
    let value = |name: &str| {
        table
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    };
    assert_eq!(value("Buffer Cache"), FactValue::Number(2000.0));
    assert_eq!(value("Shared Pool"), FactValue::Number(1000.0));
    assert_eq!(value("Log Buffer"), FactValue::Number(15.0));

    let redo = spa
        .facts
        .find(&FactQuery::new(dataset_id).names(["Redo Size per second"]))
        .await
        .unwrap();
    assert_eq!(redo[0].value, FactValue::Number(123_456.7));

    let hit = spa
        .facts
        .find(&FactQuery::new(dataset_id).names(["Buffer Hit"]))
        .await
        .unwrap();
    assert_eq!(hit[0].value, FactValue::Number(99.52));
}

#[tokio::test]
async fn test_graph_fills_missing_snapshots() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let (dataset_id, _) = dataset_with_reports(&spa, &[3, 0]).await;

    let chart = spa
        .facts
        .graph(&FactQuery::new(dataset_id).category("Host CPU"))
        .await
        .unwrap();
    assert_eq!(
        chart.tick_labels(),
        vec![
            "2017-02-05 10:00",
            "2017-02-05 10:01",
            "2017-02-05 10:02",
            "2017-02-05 10:03"
        ]
    );
    assert_eq!(chart.names(), vec!["CPU %System", "CPU %User"]);
    assert_eq!(chart.series[1].values, vec![12.5, 0.0, 0.0, 12.5]);
    assert!(chart.series.iter().all(|s| s.color.starts_with('#')));

    let json = chart.to_chart_json();
    assert_eq!(json["x"], "x");
    assert_eq!(json["columns"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_hosts_databases_and_search() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let (dataset_id, ids) = dataset_with_reports(&spa, &[0, 5]).await;

    assert_eq!(
        spa.facts.hosts(dataset_id).await.unwrap(),
        vec!["db01.example.com"]
    );
    let databases = spa.facts.databases(dataset_id).await.unwrap();
    assert_eq!(databases.get("FOO"), Some(&vec!["FOO1".to_string()]));

    let found = spa
        .reports
        .search(dataset_id, "FOO", "FOO1", at(10, 5, 0))
        .await
        .unwrap();
    assert_eq!(found, Some(ids[1]));
    let missing = spa
        .reports
        .search(dataset_id, "FOO", "FOO2", at(10, 5, 0))
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_sql_facts() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let (dataset_id, _) = dataset_with_reports(&spa, &[0]).await;

    let text = spa
        .facts
        .sql_text(dataset_id, "FOO", "FOO1", "0k8522rmdzg4k")
        .await
        .unwrap();
    assert_eq!(text.as_deref(), Some("update orders set status = :1 where id = :2"));

    let modules = spa
        .facts
        .sql_module(dataset_id, "FOO", "FOO1", "7ztv2z24kw0s0")
        .await
        .unwrap();
    assert_eq!(modules, vec!["JDBC Thin Client"]);

    let impact = spa
        .facts
        .find(&FactQuery::new(dataset_id).names(["SQL by Number of Executions"]))
        .await
        .unwrap();
    assert_eq!(impact.len(), 1);
    assert_eq!(impact[0].value, FactValue::Number(50.0));

    // Names narrow nothing once a category is given.
    let impacts = spa
        .facts
        .find(
            &FactQuery::new(dataset_id)
                .category("SQL Impact")
                .names(["SQL by Number of Executions"]),
        )
        .await
        .unwrap();
    assert!(impacts.len() > 1);
    assert!(impacts.iter().all(|f| f.category == "SQL Impact"));

    let hits = spa
        .facts
        .search_sql(dataset_id, "FOO", "FOO1", &SqlSearch::Text("ORDERS".into()))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    let by_prefix = spa
        .facts
        .search_sql(dataset_id, "FOO", "FOO1", &SqlSearch::IdPrefix("7Z".into()))
        .await
        .unwrap();
    assert_eq!(by_prefix.len(), 1);
    assert_eq!(by_prefix[0].sql_id, "7ztv2z24kw0s0");
}

#[tokio::test]
async fn test_broken_report_fails_alone() {
    let spa = Spa::in_memory(&SpaConfig::default());
    let good = spa
        .reports
        .ingest(shifted_report(0), "good.html")
        .await
        .unwrap();
    let broken = REPORT.replace(
        "This table displays host information",
        "This table displays hardware notes",
    );
    let broken = spa
        .reports
        .ingest(broken.into_bytes(), "broken.html")
        .await
        .unwrap();

    let dataset = spa.datasets.create("prod", "mixed").await.unwrap();
    let outcome = spa
        .datasets
        .assign(dataset.id, &[good, broken])
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, vec![good]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, broken);

    let cpu = spa
        .facts
        .find(
            &FactQuery::new(dataset.id)
                .category("Host CPU")
                .dimension("Host Name", "db01.example.com"),
        )
        .await
        .unwrap();
    assert_eq!(cpu.len(), 2);

    let outcome = spa.datasets.recalculate(dataset.id).await.unwrap();
    assert_eq!(outcome.succeeded, vec![good]);
    assert_eq!(outcome.failed.len(), 1);
}

#[tokio::test]
async fn test_pipeline_on_sqlite() {
    let backend = SqliteStore::new(SqliteConfig::in_memory()).await.unwrap();
    let stores = Stores::new(Arc::new(backend), Arc::new(MemoryBlobStore::default()));
    let spa = Spa::new(stores, &SpaConfig::default());
    let (dataset_id, ids) = dataset_with_reports(&spa, &[0, 1]).await;

    let chart = spa
        .facts
        .graph(&FactQuery::new(dataset_id).category("Host CPU"))
        .await
        .unwrap();
    assert_eq!(chart.ticks, vec![at(10, 0, 0), at(10, 1, 0)]);

    let outcome = spa.reports.remove(ids[0]).await.unwrap();
    assert!(outcome.is_success());
    let dataset = spa.datasets.get(dataset_id).await.unwrap().unwrap();
    assert_eq!(dataset.report_ids, vec![ids[1]]);

    let chart = spa
        .facts
        .graph(&FactQuery::new(dataset_id).category("Host CPU"))
        .await
        .unwrap();
    assert_eq!(chart.ticks, vec![at(10, 1, 0)]);
}
