//! Convenience re-export of the names most applications need: `use conduit::prelude::*;`.

pub use crate::{
	application::Application,
	body_parsers::{json, raw, text, urlencoded, JsonOptions, RawOptions, TextOptions, UrlencodedOptions},
	cookies::{CookieOptions, SameSite},
	handler::{chain, error_handler, handler, mw, ErrorHandler, ErrorOutcome, Handler, HandlerOutcome},
	middleware::{param_fn, ParamHandler, ParamOutcome},
	request::RequestContext,
	router::Router,
	server::Server,
};

#[cfg(feature = "signed-cookies")]
pub use crate::session::{memory::MemoryStore, session_middleware, Session, SessionConfig, SessionStore};
