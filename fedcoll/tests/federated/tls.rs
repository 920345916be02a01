use fedcoll::{DevCa, FedError, FederatedClient};
use std::time::Duration;

use super::helpers::{start_server, write_file};

#[tokio::test]
async fn test_untrusted_client_rejected() {
    let server = start_server(2).await;

    let rogue_ca = DevCa::generate().unwrap();
    let (cert_pem, key_pem) = rogue_ca.issue_pem("rank-0").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut config = server.client_config(2, 0);
    config.client_cert = Some(write_file(dir.path(), "rogue.pem", &cert_pem));
    config.client_key = Some(write_file(dir.path(), "rogue.key", &key_pem));
    config.call_timeout = Some(Duration::from_secs(5));

    // With TLS 1.3 the client may finish its side of the handshake before
    // the server rejects the certificate, so the failure can surface on
    // either step.
    let result = async {
        let mut client = FederatedClient::connect(&config).await?;
        client.allgather(&[1]).await
    }
    .await;
    let err = result.unwrap_err();
    assert!(
        matches!(err, FedError::Transport { .. }),
        "got {err:?}"
    );
    assert_eq!(server.coordinator.snapshot().unwrap().arrived, 0);
}

#[tokio::test]
async fn test_client_rejects_untrusted_server() {
    let server = start_server(1).await;

    let other_ca = DevCa::generate().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut config = server.client_config(1, 0);
    config.server_cert = Some(write_file(dir.path(), "other-ca.pem", &other_ca.cert_pem()));

    let err = FederatedClient::connect(&config).await.err().unwrap();
    assert!(matches!(err, FedError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_server_name_must_match_certificate() {
    let server = start_server(1).await;
    let mut config = server.client_config(1, 0);
    config.server_name = Some("coordinator.example".into());

    assert!(FederatedClient::connect(&config).await.is_err());
}
