#![forbid(unsafe_code)]

//! Structural reorganization: planners validate a request against the local
//! view and produce a [`Mutation`] for the coordinator to run.

mod mutation;
mod plan;

pub use mutation::*;
pub use plan::*;
