//! End-to-end campaigns against the simulated account service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use trafficgen_core::config::{GeneratorConfig, UserName};
use trafficgen_core::password::Pbkdf2Hasher;
use trafficgen_core::{CampaignState, TrafficGenerator};
use trafficgen_sim::{NetworkConditions, SimulatedAccountService, SimulatedClientFactory};
use url::Url;

const GRACE: Duration = Duration::from_secs(10);

fn config(users: &[(&str, &str)]) -> GeneratorConfig {
    GeneratorConfig {
        admin_name: "admin".to_string(),
        admin_password: "12345678".to_string(),
        admin_api: Url::parse("http://localhost:51000/").unwrap(),
        user_api: Url::parse("http://localhost:50000/").unwrap(),
        user_email_suffix: "@example.com".to_string(),
        pause_between_actions: Duration::from_millis(100),
        pause_jitter_bound: Duration::from_millis(50),
        users: users
            .iter()
            .map(|(name, password)| (UserName::new(*name).unwrap(), password.to_string()))
            .collect::<BTreeMap<_, _>>(),
        seed: Some(5),
    }
}

fn generator(
    service: &SimulatedAccountService,
    users: &[(&str, &str)],
) -> TrafficGenerator<SimulatedClientFactory> {
    TrafficGenerator::with_hasher(
        config(users),
        SimulatedClientFactory::new(service.clone()),
        Arc::new(Pbkdf2Hasher::new(64, 32).unwrap()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_campaign_creates_accounts_and_updates_passwords() {
    let service = SimulatedAccountService::new("admin", "12345678").unwrap();
    let generator = generator(&service, &[("alice", "pw1"), ("bob", "pw2")]);

    generator.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = generator.shutdown(GRACE).await.unwrap();

    assert_eq!(service.account_names(), ["alice", "bob"]);
    let alice = service.account("alice").unwrap();
    assert_eq!(alice.email, "alice@example.com");
    assert!(alice.password_updates >= 5);

    let stats = service.stats();
    assert_eq!(stats.accounts_created, 2);
    assert_eq!(stats.user_logins, 2);
    assert_eq!(stats.logouts, 3);
    assert_eq!(report.active_workers(), 2);
    assert_eq!(report.updates_succeeded(), stats.password_updates);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_against_existing_accounts() {
    let service = SimulatedAccountService::new("admin", "12345678").unwrap();
    let users = [("alice", "pw1"), ("bob", "pw2")];

    let first = generator(&service, &users);
    first.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    first.shutdown(GRACE).await.unwrap();

    let second = generator(&service, &users);
    second.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let report = second.shutdown(GRACE).await.unwrap();

    let bootstrap = report.bootstrap.as_ref().unwrap();
    assert_eq!(bootstrap.existing.len(), 2);
    assert!(bootstrap.created.is_empty());
    assert_eq!(report.active_workers(), 2);
    assert_eq!(service.stats().duplicate_creates, 2);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_admin_password_stops_campaign() {
    let service = SimulatedAccountService::new("admin", "other-password").unwrap();
    let generator = generator(&service, &[("alice", "pw1")]);

    generator.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(generator.state(), CampaignState::Stopped);

    let report = generator.shutdown(GRACE).await.unwrap();
    assert!(report.error.is_some());
    assert!(service.account_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_password_keeps_worker_logging_in() {
    let service = SimulatedAccountService::new("admin", "12345678").unwrap();
    service.insert_account("alice", "old-password").unwrap();
    let generator = generator(&service, &[("alice", "pw1")]);

    generator.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = generator.shutdown(GRACE).await.unwrap();

    let alice = &report.workers[0];
    assert!(!alice.reached_active);
    assert!(alice.login_attempts >= 6);
    assert_eq!(service.stats().password_updates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_injected_failures_do_not_stop_workers() {
    let network = NetworkConditions::builder()
        .latency(1..10)
        .failure_rate(0.3)
        .seed(21)
        .build();
    // Admin calls share the RNG, so retry until bootstrap gets through.
    let mut report = None;
    for _ in 0..20 {
        let service = SimulatedAccountService::new("admin", "12345678")
            .unwrap()
            .with_network(network.clone());
        let generator = generator(&service, &[("alice", "pw1"), ("bob", "pw2")]);

        generator.start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let campaign = generator.shutdown(GRACE).await.unwrap();
        if campaign.error.is_none() {
            assert!(service.stats().injected_failures > 0);
            report = Some(campaign);
            break;
        }
    }

    let report = report.expect("bootstrap should succeed within 20 attempts");
    assert_eq!(report.active_workers(), 2);
    assert!(report.updates_failed() > 0);
    assert!(report.updates_succeeded() > report.updates_failed());
}
