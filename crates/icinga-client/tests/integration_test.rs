//! Integration tests for the Icinga client
//!
//! These tests require a running Icinga2 instance.
//! Set ICINGA_URL, ICINGA_USER and ICINGA_PASSWORD to run them.

use icinga_client::{IcingaClient, IcingaClientTrait, IcingaSettings};

fn client_from_env() -> IcingaClient {
    let settings = IcingaSettings {
        url: std::env::var("ICINGA_URL").unwrap_or_else(|_| "https://localhost:5665".to_string()),
        username: std::env::var("ICINGA_USER").expect("ICINGA_USER must be set"),
        password: std::env::var("ICINGA_PASSWORD").expect("ICINGA_PASSWORD must be set"),
        debug: true,
    };
    IcingaClient::new(settings).expect("failed to create client")
}

#[tokio::test]
#[ignore] // Requires running Icinga2 instance
async fn test_list_host_groups() {
    let client = client_from_env();
    let groups = client
        .list_host_groups()
        .await
        .expect("failed to list host groups");
    println!("found {} host groups", groups.len());
}

#[tokio::test]
#[ignore]
async fn test_get_missing_host_is_not_found() {
    let client = client_from_env();
    let err = client
        .get_host("does-not-exist-anywhere")
        .await
        .expect_err("host should not exist");
    assert!(err.is_not_found());
}
