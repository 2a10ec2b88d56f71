//! JSON-RPC 2.0 message types and LSP method-name constants shared by every
//! ulsp-daemon crate.
//!
//! This crate isolates wire-level types from the daemon runtime so the
//! dispatch engine, the transport framing layer and individual plugins can
//! agree on a single vocabulary without depending on each other.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod jsonrpc;
pub mod methods;

pub use errors::*;
pub use jsonrpc::*;
