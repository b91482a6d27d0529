//! # Core Protocol Components
//!
//! Packet framing and the message wire codec.
//!
//! ## Components
//! - **Packet**: length-prefixed frame with magic bytes and a version
//! - **Codec**: Tokio codec that reassembles frames from a byte stream
//! - **Wire**: JSON mapping, optionally wrapped in a base64 AES envelope
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(1)] [Length(4)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum payload size is configurable (1 MiB default)
//! - Length is validated before any buffer is reserved

pub mod codec;
pub mod packet;
pub mod wire;
