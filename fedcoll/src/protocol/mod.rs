pub(crate) mod codec;
pub(crate) mod header;
mod message;

pub use codec::{decode_message, encode_message};
pub use header::{HEADER_SIZE, Header, MessageKind};
pub use message::{
    AllgatherRequest, AllreduceRequest, BroadcastRequest, CollectiveReply, FederatedMessage,
};
