//! Operators built on the [`flow`](crate::flow) contract.

mod reduce;
mod retry;

pub use reduce::Reduce;
pub use retry::Retry;
