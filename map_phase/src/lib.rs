//! Map-phase stage workers: Starter, Splitter, Mapper and Combiner.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod combine;
pub mod map;
pub mod split;
pub mod starter;
