//! Exchange adapters.
//!
//! The live signing client belongs to the quoting loop; this crate ships the
//! paper venue used for dry runs.

pub mod paper;

pub use paper::{PAPER_ORDER_PREFIX, PaperExchangeGateway};
