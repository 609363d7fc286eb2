//! Shared types and error definitions used by the keygen gRPC server and its
//! clients.
//!
//! - [`error`] - Service error type and its `tonic::Status` mapping.
//! - [`types`] - Conversions between wire messages and [`keygen::Key`].
//! - [`proto`] - Generated bindings for the `keys` package.

pub mod error;
pub mod types;
pub mod proto {
    tonic::include_proto!("keys");
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("keys_descriptor");
}

pub use error::*;
