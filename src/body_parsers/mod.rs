//! Body parsers: each is a middleware factory that conditionally drains and parses
//! the request body into `req.body`, following the same per-request flow regardless
//! of format — idempotence check, empty-body short-circuit, content-type match,
//! size-limited drain, then parse.

// ----------

use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;

use conduit_core::response::{BoxedErrorResponse, ResponseError};

use crate::{common::ImplError, request::RequestContext};

pub mod json;
pub mod raw;
pub mod text;
pub mod urlencoded;

pub use json::{json, JsonOptions};
pub use raw::{raw, RawOptions};
pub use text::{text, TextOptions};
pub use urlencoded::{urlencoded, UrlencodedOptions};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// The parsed form `req.body` takes on after the matching parser ran.
#[derive(Debug, Clone)]
pub enum ParsedBody {
	Json(serde_json::Value),
	/// `urlencoded`'s result, in both simple and extended mode: a JSON object whose
	/// shape mirrors the bracket nesting (`user[name]=x` -> `{"user": {"name": "x"}}`).
	Form(serde_json::Value),
	Text(String),
	Raw(Vec<u8>),
}

// --------------------------------------------------------------------------------
// Content-Type matching (the `type` option)

/// How a body parser decides whether a request's `Content-Type` is its concern.
#[derive(Clone)]
pub enum TypeMatch {
	Single(String),
	List(Vec<String>),
	Predicate(Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>),
}

impl TypeMatch {
	pub(crate) fn matches(&self, ctx: &RequestContext) -> bool {
		match self {
			TypeMatch::Single(spec) => ctx.is(spec),
			TypeMatch::List(specs) => specs.iter().any(|spec| ctx.is(spec)),
			TypeMatch::Predicate(predicate) => predicate(ctx),
		}
	}
}

impl From<&str> for TypeMatch {
	fn from(spec: &str) -> Self {
		TypeMatch::Single(spec.to_owned())
	}
}

impl From<Vec<&str>> for TypeMatch {
	fn from(specs: Vec<&str>) -> Self {
		TypeMatch::List(specs.into_iter().map(str::to_owned).collect())
	}
}

impl<F> From<F> for TypeMatch
where
	F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
{
	fn from(predicate: F) -> Self {
		TypeMatch::Predicate(Arc::new(predicate))
	}
}

// --------------------------------------------------------------------------------
// Errors

#[derive(Debug, ImplError)]
#[error("{tag}: {detail}")]
struct TaggedError {
	tag: &'static str,
	detail: String,
}

fn parse_failed(detail: impl Into<String>) -> BoxedErrorResponse {
	ResponseError::new(
		StatusCode::BAD_REQUEST,
		TaggedError { tag: "entity.parse.failed", detail: detail.into() },
	)
	.into()
}

fn too_large(limit: usize) -> BoxedErrorResponse {
	ResponseError::new(
		StatusCode::PAYLOAD_TOO_LARGE,
		TaggedError { tag: "entity.too.large", detail: format!("request body exceeds the {limit} byte limit") },
	)
	.into()
}

fn size_invalid(detail: impl Into<String>) -> BoxedErrorResponse {
	ResponseError::new(
		StatusCode::BAD_REQUEST,
		TaggedError { tag: "request.size.invalid", detail: detail.into() },
	)
	.into()
}

fn too_many_parameters(limit: usize) -> BoxedErrorResponse {
	ResponseError::new(
		StatusCode::PAYLOAD_TOO_LARGE,
		TaggedError { tag: "parameters.too.many", detail: format!("exceeds the parameter limit of {limit}") },
	)
	.into()
}

fn unsupported_charset(charset: &str) -> BoxedErrorResponse {
	ResponseError::new(
		StatusCode::UNSUPPORTED_MEDIA_TYPE,
		TaggedError { tag: "entity.parse.failed", detail: format!("unsupported charset {charset:?}") },
	)
	.into()
}

fn stream_error(error: conduit_core::BoxedError) -> BoxedErrorResponse {
	ResponseError::new(StatusCode::BAD_REQUEST, TaggedError { tag: "stream.error", detail: error.to_string() }).into()
}

// --------------------------------------------------------------------------------
// Shared per-request flow

/// Step 2 of the per-request flow: whether the request declares a body at all.
pub(crate) fn request_has_body(ctx: &RequestContext) -> bool {
	if ctx.headers().get(http::header::TRANSFER_ENCODING).is_some() {
		return true;
	}

	ctx
		.headers()
		.get(http::header::CONTENT_LENGTH)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.parse::<u64>().ok())
		.map(|len| len > 0)
		.unwrap_or(false)
}

/// The `charset` parameter of the request's `Content-Type`, if present.
pub(crate) fn charset_of(ctx: &RequestContext) -> Option<String> {
	let content_type = ctx.get("content-type")?;
	content_type.split(';').skip(1).find_map(|param| {
		let param = param.trim();
		param
			.strip_prefix("charset=")
			.map(|v| v.trim_matches('"').to_owned())
	})
}

/// Rejects charsets other than UTF-8 with the spec's 415-class error; callers should
/// run this before decoding a text-ish body.
pub(crate) fn check_charset(ctx: &RequestContext) -> Result<(), BoxedErrorResponse> {
	match charset_of(ctx) {
		Some(charset) if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("utf8") => {
			Err(unsupported_charset(&charset))
		}
		_ => Ok(()),
	}
}

/// Steps 4-6: validate `Content-Length` against `limit`, then drain the body frame by
/// frame, aborting as soon as the running total would exceed `limit` (so an attacker
/// omitting `Content-Length` can't force unbounded buffering either).
pub(crate) async fn read_body_with_limit(ctx: &mut RequestContext, limit: usize) -> Result<Vec<u8>, BoxedErrorResponse> {
	if let Some(declared) = ctx.headers().get(http::header::CONTENT_LENGTH) {
		let declared: u64 = declared
			.to_str()
			.ok()
			.and_then(|v| v.parse().ok())
			.ok_or_else(|| size_invalid("invalid Content-Length"))?;

		if declared > limit as u64 {
			return Err(too_large(limit));
		}
	}

	let mut body = ctx.take_body();
	let mut buffer = Vec::new();

	loop {
		let Some(frame_result) = body.frame().await else { break };
		let frame = frame_result.map_err(stream_error)?;

		if let Some(data) = frame.data_ref() {
			if buffer.len() + data.len() > limit {
				return Err(too_large(limit));
			}
			buffer.extend_from_slice(data);
		}
	}

	Ok(buffer)
}

pub(crate) fn decode_utf8(bytes: Vec<u8>) -> Result<String, BoxedErrorResponse> {
	String::from_utf8(bytes).map_err(|e| parse_failed(format!("invalid utf-8: {e}")))
}

// --------------------------------------------------------------------------------
