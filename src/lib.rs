//! A middleware and routing framework for building HTTP applications: an ordered
//! stack of layers walked per request, path matching with named parameters, mounted
//! sub-routers, an error channel, and the request/response conveniences built on top
//! of it (cookies, sessions, body parsing, content negotiation).
//!
//! Start with [`application::Application`] and [`router::Router`]; [`prelude`] re-exports
//! the names most call sites need.

// ----------

pub mod application;
pub mod body_parsers;
pub mod conditional;
mod cookies;
mod error;
pub mod handler;
pub mod middleware;
mod pattern;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

#[cfg(feature = "signed-cookies")]
pub mod session;

mod common;

pub mod prelude;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub use application::Application;
pub use conduit_core::{body::Body, request::Request, response::Response};
pub use cookies::{CookieOptions, CookieValue, SameSite};
pub use handler::{chain, error_handler, handler, mw, ErrorHandler, ErrorOutcome, Handler, HandlerOutcome};
pub use middleware::{param_fn, ParamHandler, ParamOutcome};
pub use request::RequestContext;
pub use router::Router;
pub use server::{Server, ServerError};
