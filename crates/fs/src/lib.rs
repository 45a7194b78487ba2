//! stow-fs: local filesystem backend for stow
//!
//! Implements the `Client` contract from stow-core on top of `tokio::fs`.

mod client;

pub use client::FsClient;
