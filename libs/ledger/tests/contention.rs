//! Integration tests against a real MySQL instance. Ignored by default
//! since CI here has no database; run with `MYSQL_TEST_URL` set and
//! `cargo test -- --ignored` against a disposable database.

use fleet_ledger::{LedgerClient, LedgerRepository};
use sqlx::mysql::MySqlPoolOptions;

async fn repo() -> LedgerRepository {
    let url = std::env::var("MYSQL_TEST_URL").expect("MYSQL_TEST_URL must be set for this test");
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");
    LedgerRepository::new(LedgerClient::from_pool(pool))
}

#[tokio::test]
#[ignore]
async fn login_contention_yields_exactly_one_winner() {
    let repo = repo().await;
    let zone = "testzone";
    fleet_ledger::schema::ensure_zone_schema(
        &sqlx::mysql::MySqlPoolOptions::new()
            .connect(&std::env::var("MYSQL_TEST_URL").unwrap())
            .await
            .unwrap(),
        zone,
    )
    .await
    .unwrap();

    // Scenario 5 (SPEC_FULL.md §8): one edge row available, fifty
    // concurrent logins, exactly one winner and 49 `NoneAvailable`.
    let pod = uuid::Uuid::new_v4().to_string();
    let instance = fleet_domain::Instance {
        zone_id: zone.to_string(),
        site_id: Some("s1".to_string()),
        server_ip: "10.0.0.1".to_string(),
        pod_name: format!("cloudgame-{pod}"),
        instance_id: format!("instance-cloudgame-{pod}"),
        port: 30000,
        is_elastic: false,
        status: fleet_domain::InstanceStatus::Available,
        device_id: None,
    };
    repo.insert_instance(&instance).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..50 {
        let repo = repo.clone();
        let zone = zone.to_string();
        handles.push(tokio::spawn(async move {
            repo.get_available_and_bind(&zone, "s1", &format!("device-{i}"))
                .await
        }));
    }

    let mut wins = 0;
    let mut losses = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => wins += 1,
            Err(fleet_ledger::LedgerError::NoneAvailable { .. }) => losses += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(losses, 49);
}
