//! stow-s3: S3-compatible object store backend for stow
//!
//! Wraps aws-sdk-s3 and implements the `Client` contract from stow-core.

mod client;

pub use client::S3Client;
