//! Kestrel Server - Chain-facing side of the BFT engine
//!
//! This crate implements the consensus [`kestrel_consensus::Backend`] on top
//! of the chain store: verifier-set snapshots replayed from header votes,
//! header verification, block preparation and sealing, membership
//! candidates, and message ingress with de-duplication.

pub mod backend;
pub mod error;
pub mod server;
pub mod snapshot;
pub mod transport;
pub mod verify;

pub use error::ServerError;
pub use server::Server;
pub use snapshot::{Snapshot, Tally, Vote};
pub use transport::{NoopTransport, Transport};
