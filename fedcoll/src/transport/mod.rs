mod connection;
mod listener;
pub mod tls;

pub use connection::{read_framed, request_reply, write_framed};
pub use listener::TransportListener;
pub use tls::DevCa;
