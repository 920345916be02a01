mod federated_client;
mod typed;

pub use federated_client::FederatedClient;
