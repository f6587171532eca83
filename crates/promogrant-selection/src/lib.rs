//! # promogrant-selection
//!
//! **Pure deterministic grant selection.**
//!
//! Given the shortfall of a settlement transaction and the grants a caller
//! supplied, decide whether exactly those grants are what is needed:
//!
//! - **Zero side effects**: no claims, no wallet calls
//! - **Deterministic output**: same grants → same order and total
//! - **No waste**: a grant that is not needed to reach the shortfall fails
//!   the whole request instead of being silently dropped

pub mod selection;

pub use selection::{Selection, select_grants, sort_grants};
