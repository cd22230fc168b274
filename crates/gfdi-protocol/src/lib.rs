//! Garmin GFDI wearable protocol
//!
//! This crate implements the binary message protocol spoken between a host
//! and a Garmin wearable over a reliable byte transport. The transport itself
//! is out of scope; every entry point takes or returns whole frames.
//!
//! # Protocol Overview
//!
//! Each frame carries a total length, a type code, a payload and a CRC-16:
//!
//! ```text
//! +--------+-----------+-------------+--------+
//! | length | type code |   payload   | crc16  |
//! |  u16   |    u16    |   n bytes   |  u16   |
//! +--------+-----------+-------------+--------+
//! ```
//!
//! Messages are either:
//!
//! - **Requests and notices** (either direction): identified by a type code
//!   in the 5000 range
//! - **Responses**: type code 5000, carrying the answered type code, a status
//!   and a type-specific body
//!
//! Files move in offset/CRC-checked chunks ([`TransferSession`]); payloads too
//! large for one frame move through the protobuf envelope and are rebuilt by a
//! [`ReassemblyBuffer`].
//!
//! # Example
//!
//! ```rust
//! use gfdi_protocol::{Message, ProtocolConfig, Session, FindMyPhoneRequest};
//!
//! let mut session = Session::new(ProtocolConfig::default()).unwrap();
//! let frame = session
//!     .encode(&Message::FindMyPhoneRequest(FindMyPhoneRequest { duration: 30 }))
//!     .unwrap();
//! let output = session.handle_frame(&frame).unwrap();
//! assert_eq!(output.frames.len(), 1);
//! ```

mod checksum;
mod clock;
mod codec;
mod config;
mod constants;
mod dispatcher;
mod error;
mod events;
mod frame;
mod messages;
mod reassembly;
pub mod registry;
mod responses;
mod session;
mod transfer;
mod types;

pub use checksum::*;
pub use clock::*;
pub use codec::*;
pub use config::*;
pub use constants::*;
pub use dispatcher::*;
pub use error::*;
pub use events::*;
pub use frame::*;
pub use messages::*;
pub use reassembly::*;
pub use responses::*;
pub use session::*;
pub use transfer::*;
pub use types::*;
