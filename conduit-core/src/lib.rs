#![allow(dead_code)]

// ----------

use std::{future::Future, pin::Pin};

// ----------

pub use std::error::Error as StdError;

pub(crate) use thiserror::Error as ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub mod body;
pub mod http;
pub mod request;
pub mod response;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// A type-erased `Send + Sync` error.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// A boxed, `Send` future, as produced by the dispatch loop and every handler.
pub type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

// --------------------------------------------------------------------------------
// Marker

pub(crate) mod mark {
	pub struct Private;
}

// --------------------------------------------------
// Used when expecting a valid value in internal invariants.
pub(crate) const SCOPE_VALIDITY: &str = "scope validity";

// --------------------------------------------------------------------------------
