//! LSP transport layer for ulsp-daemon.
//!
//! This crate implements `Content-Length` message framing per the LSP Base
//! Protocol, over any [`tokio::io::AsyncBufRead`]/[`tokio::io::AsyncWrite`]
//! pair. The daemon's Connection Host (§4.I) wraps one accepted TCP stream
//! per editor connection in [`read_message`]/[`MessageWriter`]; every other
//! transport detail (session lifecycle, dispatch) lives upstream in
//! `ulsp-daemon`.
//!
//! # Example
//!
//! ```no_run
//! use tokio::io::AsyncBufRead;
//! use ulsp_transport::read_message;
//!
//! async fn doc<R: AsyncBufRead + Unpin>(mut stream: R) {
//!     if let Ok(Some(request)) = read_message(&mut stream).await {
//!         println!("got {}", request.method);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod framing;

pub use framing::{FramingError, MessageWriter, read_message, write_message, write_notification};
