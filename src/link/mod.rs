//! The command/acknowledgement link protocol.
//!
//! One parameterised protocol engine replaces the old firmware's
//! accumulated `send/ack` variants: [`message`] fixes the token
//! vocabulary, [`transport`] is the half-duplex radio contract,
//! [`session`] is the transmitter-side exchange engine, and
//! [`responder`] is the receiver-side reactive loop.

pub mod message;
pub mod responder;
pub mod session;
pub mod transport;

pub use message::{Command, LinkMessage};
pub use responder::{Handled, Responder};
pub use session::LinkSession;
pub use transport::{LinkTransport, ReceiveError, SendError, MAX_FRAME_LEN};

#[cfg(not(target_os = "espidf"))]
pub use transport::LoopbackTransport;
