use fedcoll::{ClientConfig, FedError, FederatedClient, FederatedServer, ServerConfig};

use super::helpers::{start_server, write_file};

#[tokio::test]
async fn test_client_from_args() {
    let server = start_server(1).await;
    let template = server.client_config(1, 0);
    let path = |p: &Option<std::path::PathBuf>| p.as_ref().unwrap().display().to_string();

    let args = [
        format!("federated_server_address={}", server.addr),
        "FEDERATED_SERVER_NAME=localhost".to_string(),
        format!("Federated_Server_Cert={}", path(&template.server_cert)),
        format!("FEDERATED_CLIENT_KEY={}", path(&template.client_key)),
        format!("FEDERATED_CLIENT_CERT={}", path(&template.client_cert)),
    ];
    let config = ClientConfig::default().with_args(&args).unwrap();
    let mut client = FederatedClient::connect(&config).await.unwrap();
    assert_eq!(client.allgather(b"hi").await.unwrap(), b"hi");
}

#[tokio::test]
async fn test_client_missing_certificates() {
    let config = ClientConfig::default();
    let err = FederatedClient::connect(&config).await.err().unwrap();
    assert!(matches!(err, FedError::Config(ref m) if m.contains("FEDERATED_SERVER_CERT")));
}

#[test]
fn test_server_bind_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new(
        0,
        2,
        dir.path().join("missing.key"),
        dir.path().join("missing.pem"),
        dir.path().join("ca.pem"),
    );
    assert!(matches!(FederatedServer::bind(&config), Err(FedError::Io(_))));
}

#[test]
fn test_server_bind_malformed_pem() {
    let dir = tempfile::tempdir().unwrap();
    let junk = write_file(dir.path(), "junk.pem", "this is not PEM\n");
    let config = ServerConfig::new(0, 2, &junk, &junk, &junk);
    assert!(matches!(FederatedServer::bind(&config), Err(FedError::Tls(_))));
}
