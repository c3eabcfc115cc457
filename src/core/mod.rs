pub mod abi;
pub mod chain;
pub mod executor;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub mod fake_chain;

pub use types::*;
