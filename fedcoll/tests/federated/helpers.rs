use fedcoll::{
    ClientConfig, DevCa, FederatedClient, FederatedServer, RoundCoordinator, ServerConfig,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A running coordinator plus the PEM files its clients need.
pub struct TestServer {
    pub ca: DevCa,
    pub dir: TempDir,
    pub addr: SocketAddr,
    pub coordinator: Arc<RoundCoordinator>,
    task: tokio::task::JoinHandle<fedcoll::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Helper: start a coordinator on a free port with fresh certificates.
pub async fn start_server(world_size: u32) -> TestServer {
    start_server_with(world_size, |_| {}).await
}

pub async fn start_server_with(
    world_size: u32,
    tweak: impl FnOnce(&mut ServerConfig),
) -> TestServer {
    let ca = DevCa::generate().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let (cert_pem, key_pem) = ca.issue_pem("localhost").unwrap();
    let server_cert = write_file(dir.path(), "server.pem", &cert_pem);
    let server_key = write_file(dir.path(), "server.key", &key_pem);
    let ca_pem = write_file(dir.path(), "ca.pem", &ca.cert_pem());

    let mut config = ServerConfig::new(0, world_size, server_key, server_cert, ca_pem);
    tweak(&mut config);

    let server = FederatedServer::bind(&config).unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], server.local_addr().port()));
    let coordinator = Arc::clone(server.coordinator());
    let task = tokio::spawn(server.serve());

    TestServer {
        ca,
        dir,
        addr,
        coordinator,
        task,
    }
}

impl TestServer {
    /// Client config for `rank`, with a certificate issued by the server's CA.
    pub fn client_config(&self, world_size: u32, rank: u32) -> ClientConfig {
        let (cert_pem, key_pem) = self.ca.issue_pem(&format!("rank-{rank}")).unwrap();
        let dir = self.dir.path();
        ClientConfig {
            server_address: self.addr.to_string(),
            server_name: Some("localhost".into()),
            world_size,
            rank,
            server_cert: Some(dir.join("ca.pem")),
            client_key: Some(write_file(dir, &format!("rank-{rank}.key"), &key_pem)),
            client_cert: Some(write_file(dir, &format!("rank-{rank}.pem"), &cert_pem)),
            call_timeout: Some(Duration::from_secs(20)),
            ..Default::default()
        }
    }

    pub async fn connect(&self, world_size: u32, rank: u32) -> FederatedClient {
        FederatedClient::connect(&self.client_config(world_size, rank))
            .await
            .unwrap()
    }
}

/// Helper: connect `world_size` clients and run `f` on each concurrently.
/// Returns results indexed by rank.
pub async fn run_clients<F, Fut, T>(server: &TestServer, world_size: u32, f: F) -> Vec<T>
where
    F: Fn(FederatedClient) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let f = Arc::new(f);
    let mut handles = Vec::new();
    for rank in 0..world_size {
        let client = server.connect(world_size, rank).await;
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(client).await }));
    }
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }
    results
}
