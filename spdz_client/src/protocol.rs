//! Client side of the SPDZ external input/output protocol.
//!
//! Inputs are masked with preprocessed triples dealt by the parties, outputs
//! are authenticated with a shared random value. Both checks are only
//! meaningful on values summed over all parties.

pub mod input;
pub mod output;

pub use input::{submit, submit_value, Triple};
pub use output::{reveal, ResultBundle};
