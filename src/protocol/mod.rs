//! Protocol module — the client side of the engine wire protocol.
//!
//! Engines are language servers: JSON-RPC 2.0 bodies behind
//! `Content-Length` headers on the process's stdin/stdout.
//!
//! ```text
//! ┌────────────────┐  framed request   ┌────────────────┐
//! │ ProtocolClient │ ────────────────▶ │     engine     │
//! │  pending ids   │ ◀──────────────── │   (process)    │
//! └────────────────┘  framed response  └────────────────┘
//!   reader thread routes responses by id
//! ```

pub mod client;
pub mod framing;
pub mod message;

pub use client::ProtocolClient;
pub use framing::{Frame, FrameError};
pub use message::{Incoming, Response, ResponseError};
