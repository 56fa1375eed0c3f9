#![forbid(unsafe_code)]

//! SQLite-backed category store.

mod store;

pub use store::*;
