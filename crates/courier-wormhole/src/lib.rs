// The wormhole: a peer-to-peer session between two identity keys. The
// exchange server is used only to swap signalling material (offer, answer,
// invite codes); once the datagram channel is up, framed messages flow
// directly between the peers.

pub mod messaging;
pub mod session;
pub mod transport;

mod error;

pub use error::WormholeError;
pub use messaging::{new_id, ContentType, Message, MessageType};
pub use session::{State, Wormhole};
pub use transport::{Addr, MemoryHub, Transport, TransportError};
