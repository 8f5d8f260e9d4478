//! Response-building state staged by middleware (`res.status()`, `res.set()`, ...)
//! before a terminal handler or the error pipeline produces the final body.

// ----------

use http::{HeaderMap, StatusCode};

use crate::cookies::OutgoingCookie;

pub(crate) mod format;
pub(crate) mod send;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// Response state accumulated across the middleware chain. [`finish`] merges it onto
/// the `Response` a terminal handler (or the error pipeline) produces.
#[derive(Default)]
pub(crate) struct PendingResponse {
	pub(crate) status: Option<StatusCode>,
	pub(crate) headers: HeaderMap,
	pub(crate) cookies: Vec<OutgoingCookie>,
	pub(crate) raw_cookie_headers: Vec<String>,
	pub(crate) cookie_secret: Option<Vec<u8>>,
}

/// Merges staged status/headers/cookies onto a handler-produced response. Headers set
/// via `res.set`/`res.append` take precedence over whatever the body type defaulted to,
/// mirroring `res.set(...)` winning over a later `res.json(...)`'s own `Content-Type`
/// only when the latter doesn't also set it explicitly — in practice `send`/`json`
/// always set `Content-Type` themselves, so staged headers here cover everything else.
pub(crate) fn finish(
	pending: PendingResponse,
	mut response: conduit_core::response::Response,
) -> conduit_core::response::Response {
	for (name, value) in pending.headers.iter() {
		response.headers_mut().insert(name.clone(), value.clone());
	}

	if let Some(status) = pending.status {
		*response.status_mut() = status;
	}

	for cookie in &pending.cookies {
		if let Ok(value) = crate::cookies::serialize(cookie, pending.cookie_secret.as_deref())
			.parse()
		{
			response.headers_mut().append(http::header::SET_COOKIE, value);
		}
	}

	for raw in &pending.raw_cookie_headers {
		if let Ok(value) = raw.parse() {
			response.headers_mut().append(http::header::SET_COOKIE, value);
		}
	}

	response
}
