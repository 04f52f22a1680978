//! Transport plumbing: TLS setup and the shared, close-once stream writer.

pub mod tls;
pub mod writer;

pub use writer::SharedWriter;
