// Client for the exchange server: signed requests over reqwest, plus the
// disco, message, invite, and sigchain APIs layered on them. Disco payloads
// are sealed to the pair before they leave this process; message bytes are
// opaque here and encrypted by the calling service.

mod client;
mod disco;
mod error;
mod invite;
mod messages;
mod sigchain;

pub use client::Client;
pub use disco::DiscoType;
pub use error::ClientError;
pub use messages::MessagesOpts;
