//! Library half of the `mapreduced` daemon: configuration blocks, stage
//! wiring and the HTTP trigger endpoint. The binary in `main.rs` is a thin
//! shell over these pieces, and the end-to-end tests drive them directly.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod config;
pub mod http;
pub mod pipeline;
