use std::path::Path;

use planwise_core::{
    CatalogStore, KeywordClassifier, KeywordQuery, Plan, PlanError, PlanImportRecord,
    SqlitePlanStore,
};
use tempfile::TempDir;

fn temp_store(dir: &Path) -> SqlitePlanStore {
    let store = SqlitePlanStore::builder()
        .path(dir.join("plans.sqlite"))
        .create_if_missing(true)
        .keyword_limit(3)
        .build()
        .expect("create store");
    store.initialize().expect("initialize store");
    store
}

fn sample_plan(id: &str, provider: &str, name: &str, cost: f64, data: &str, calls: &str) -> Plan {
    let mut plan = Plan::new(id, provider, name, cost);
    plan.total_data = Some(data.into());
    plan.local_calls_mins = Some(calls.into());
    plan.local_sms = Some("100".into());
    plan
}

fn find(store: &SqlitePlanStore, id: &str) -> Option<Plan> {
    store
        .fetch_all_plans()
        .unwrap()
        .into_iter()
        .find(|plan| plan.id == id)
}

fn seed(store: &SqlitePlanStore) {
    let plans = vec![
        sample_plan("d1", "Dhiraagu", "Postpaid Basic", 199.0, "10GB", "100"),
        sample_plan("d2", "Dhiraagu", "Postpaid Plus", 499.0, "40GB", "2 Free Numbers"),
        sample_plan("o1", "Ooredoo", "Smart 350", 350.0, "25 GB", "500"),
        sample_plan("o2", "Ooredoo", "Max Unlimited", 899.0, "Unlimited", "Unlimited"),
        sample_plan("o3", "Ooredoo", "Starter", 99.0, "2GB", "50"),
    ];
    for plan in &plans {
        store.upsert_plan(plan).unwrap();
    }
}

#[test]
fn fetch_all_returns_catalog_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    seed(&store);

    let plans = store.fetch_all_plans().unwrap();
    let ids: Vec<&str> = plans.iter().map(|plan| plan.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2", "o1", "o2", "o3"]);
    assert_eq!(plans[1].local_calls_mins.as_deref(), Some("2 Free Numbers"));
    assert_eq!(store.count().unwrap(), 5);
}

#[test]
fn keyword_search_filters_by_provider_and_price() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    seed(&store);

    let classifier = KeywordClassifier::new(["dhiraagu", "ooredoo"], ["under", "max"]);
    let query = classifier.classify(&["Ooredoo", "under 400"]);
    let plans = store.search_by_keywords(&query).unwrap();
    let ids: Vec<&str> = plans.iter().map(|plan| plan.id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o3"]);
}

#[test]
fn keyword_search_matches_free_text_and_caps_results() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    seed(&store);

    let unlimited = store
        .search_by_keywords(&KeywordQuery {
            terms: vec!["unlimited".into()],
            ..KeywordQuery::default()
        })
        .unwrap();
    assert_eq!(unlimited.len(), 1);
    assert_eq!(unlimited[0].id, "o2");

    let free_numbers = store
        .search_by_keywords(&KeywordQuery {
            terms: vec!["free numbers".into(), "starter".into()],
            ..KeywordQuery::default()
        })
        .unwrap();
    let ids: Vec<&str> = free_numbers.iter().map(|plan| plan.id.as_str()).collect();
    assert_eq!(ids, vec!["d2", "o3"]);

    let everything = store.search_by_keywords(&KeywordQuery::default()).unwrap();
    assert_eq!(everything.len(), 3);
}

#[test]
fn import_skips_existing_unless_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    seed(&store);

    let mut changed = Plan::new("d1", "Dhiraagu", "Postpaid Basic", 149.0);
    changed.total_data = Some("12GB".into());
    let fresh = Plan::new("", "Ooredoo", "Imported", 250.0);

    let imported = store
        .import(&[
            PlanImportRecord {
                plan: changed.clone(),
                overwrite: false,
            },
            PlanImportRecord {
                plan: fresh,
                overwrite: false,
            },
        ])
        .unwrap();
    assert_eq!(imported, 1);
    assert_eq!(find(&store, "d1").unwrap().cost, 199.0);
    assert_eq!(store.count().unwrap(), 6);

    let overwritten = store
        .import(&[PlanImportRecord {
            plan: changed,
            overwrite: true,
        }])
        .unwrap();
    assert_eq!(overwritten, 1);
    let updated = find(&store, "d1").unwrap();
    assert_eq!(updated.cost, 149.0);
    assert_eq!(updated.total_data.as_deref(), Some("12GB"));
    assert!(updated.updated_at.is_some());
}

#[test]
fn import_json_reads_sample_catalog() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    let sample = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/plans.sample.json");
    let json = std::fs::read_to_string(sample).unwrap();

    assert_eq!(store.import_json(&json).unwrap(), 4);
    let plus = find(&store, "dhi-plus").unwrap();
    assert_eq!(plus.data_breakdown_detail(), Some("30GB anytime + 10GB night"));
}

#[test]
fn missing_database_is_a_store_error() {
    let dir = TempDir::new().unwrap();
    let store = SqlitePlanStore::builder()
        .path(dir.path().join("absent.sqlite"))
        .read_only(true)
        .build()
        .unwrap();
    assert!(matches!(
        store.fetch_all_plans(),
        Err(PlanError::OpenDatabase { .. })
    ));
}
