//! ABC Retail web backend library.
//!
//! This crate provides the storage facade, its Azure and in-memory backends,
//! and the HTTP routes as a library, allowing them to be tested and reused by
//! the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
