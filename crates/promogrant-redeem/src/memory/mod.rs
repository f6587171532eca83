//! In-memory adapters, for tests and local runs.

mod claims;
mod wallet;

pub use claims::{MemoryClaimSet, MemoryClaimStore};
pub use wallet::{MemoryWallet, MemoryWalletProvider};
