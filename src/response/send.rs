//! `RequestContext`'s response-building methods (`res.status`, `res.json`, `res.send`,
//! ...). These run synchronously against the staged [`PendingResponse`] and, for the
//! terminal senders, immediately produce a finished [`Response`] — the dispatch loop's
//! final [`crate::response::finish`] only ever layers staged headers/cookies on top.

// ----------

use http::{HeaderValue, Method, StatusCode};
use serde::Serialize;

use conduit_core::{
	body::Body,
	response::{BoxedErrorResponse, Response, ResponseError},
};

use crate::{
	common::SCOPE_VALIDITY,
	cookies::{CookieOptions, OutgoingCookie},
	error::html_escape,
	request::RequestContext,
};

use super::format::best_match;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// A value accepted by [`RequestContext::cookie`]: either a plain string or a JSON
/// value, the latter serialized with the `j:` prefix `cookie-parser` uses.
pub enum CookieData {
	Text(String),
	Json(serde_json::Value),
}

impl From<&str> for CookieData {
	fn from(value: &str) -> Self {
		CookieData::Text(value.to_owned())
	}
}

impl From<String> for CookieData {
	fn from(value: String) -> Self {
		CookieData::Text(value)
	}
}

impl From<serde_json::Value> for CookieData {
	fn from(value: serde_json::Value) -> Self {
		CookieData::Json(value)
	}
}

/// A value accepted by [`RequestContext::send`], dispatched by type per spec.
pub enum SendBody {
	Bytes(Vec<u8>),
	Text(String),
	Number(f64),
	Bool(bool),
	Null,
	Json(serde_json::Value),
}

impl From<Vec<u8>> for SendBody {
	fn from(value: Vec<u8>) -> Self {
		SendBody::Bytes(value)
	}
}

impl From<&str> for SendBody {
	fn from(value: &str) -> Self {
		SendBody::Text(value.to_owned())
	}
}

impl From<String> for SendBody {
	fn from(value: String) -> Self {
		SendBody::Text(value)
	}
}

impl From<f64> for SendBody {
	fn from(value: f64) -> Self {
		SendBody::Number(value)
	}
}

impl From<bool> for SendBody {
	fn from(value: bool) -> Self {
		SendBody::Bool(value)
	}
}

impl From<serde_json::Value> for SendBody {
	fn from(value: serde_json::Value) -> Self {
		SendBody::Json(value)
	}
}

/// A `res.format(handlers)` callback: takes the context (so it can itself call
/// `res.json`/`res.send`) and returns the finished response.
pub type FormatHandler<'a> =
	Box<dyn FnOnce(&mut RequestContext) -> Result<Response, BoxedErrorResponse> + 'a>;

fn with_default_charset(mime: &str) -> String {
	if mime.contains("charset") {
		return mime.to_owned();
	}

	if mime == "application/json" || mime.starts_with("text/") {
		format!("{mime}; charset=utf-8")
	} else {
		mime.to_owned()
	}
}

/// Escapes `<`, `>`, `&`, U+2028, and U+2029 as `\uXXXX` sequences, matching the
/// `json escape` setting's purpose: make a JSON response safe to embed in a
/// `<script>` block.
fn escape_json_html(input: &str) -> String {
	let mut out = String::with_capacity(input.len());

	for ch in input.chars() {
		match ch {
			'<' => out.push_str("\\u003c"),
			'>' => out.push_str("\\u003e"),
			'&' => out.push_str("\\u0026"),
			'\u{2028}' => out.push_str("\\u2028"),
			'\u{2029}' => out.push_str("\\u2029"),
			other => out.push(other),
		}
	}

	out
}

impl RequestContext {
	// --------------------------------------------------
	// Status and headers

	/// `res.status(code)` — stages the status; does not flush anything.
	pub fn status(&mut self, code: StatusCode) -> &mut Self {
		self.pending.status = Some(code);
		self
	}

	fn current_status(&self) -> StatusCode {
		self.pending.status.unwrap_or(StatusCode::OK)
	}

	/// `res.set(name, value)` — stages a header, replacing any existing value.
	pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
		if let (Ok(name), Ok(value)) = (name.parse::<http::HeaderName>(), HeaderValue::from_str(value)) {
			self.pending.headers.insert(name, value);
		}

		self
	}

	/// `res.get(name)` — reads back a header staged by `set`/`append`/etc. this request.
	pub fn get_header(&self, name: &str) -> Option<&str> {
		self.pending.headers.get(name).and_then(|v| v.to_str().ok())
	}

	/// `res.append(name, value)` — stages an additional value for a header, keeping any
	/// already staged under that name.
	pub fn append_header(&mut self, name: &str, value: &str) -> &mut Self {
		if let (Ok(name), Ok(value)) = (name.parse::<http::HeaderName>(), HeaderValue::from_str(value)) {
			self.pending.headers.append(name, value);
		}

		self
	}

	/// `res.vary(field)` — adds `field` to the staged `Vary` header, skipping it if
	/// already present (case-insensitively).
	pub fn vary(&mut self, field: &str) -> &mut Self {
		let existing = self
			.pending
			.headers
			.get(http::header::VARY)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("")
			.to_owned();

		let mut fields: Vec<&str> = existing.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();

		if !fields.iter().any(|f| f.eq_ignore_ascii_case(field)) {
			fields.push(field);
		}

		let joined = fields.join(", ");
		if let Ok(value) = HeaderValue::from_str(&joined) {
			self.pending.headers.insert(http::header::VARY, value);
		}

		self
	}

	/// `res.type(t)` — sets `Content-Type` from a MIME type or short name/extension,
	/// appending `; charset=utf-8` for text types left without an explicit charset.
	pub fn type_(&mut self, t: &str) -> &mut Self {
		let mime = crate::common::header_utils::expand_mime_shorthand(t);
		let value = with_default_charset(mime);

		if let Ok(value) = HeaderValue::from_str(&value) {
			self.pending.headers.insert(http::header::CONTENT_TYPE, value);
		}

		self
	}

	// --------------------------------------------------
	// Cookies

	/// `res.cookie(name, value, opts)`.
	pub fn cookie(&mut self, name: &str, value: impl Into<CookieData>, options: CookieOptions) -> &mut Self {
		let raw_value = match value.into() {
			CookieData::Text(text) => text,
			CookieData::Json(json) => format!("j:{json}"),
		};

		self.pending.cookies.push(OutgoingCookie {
			name: name.to_owned(),
			value: raw_value,
			options,
		});

		self
	}

	/// `res.clearCookie(name, opts)`.
	pub fn clear_cookie(&mut self, name: &str, path: Option<&str>, domain: Option<&str>) -> &mut Self {
		self
			.pending
			.raw_cookie_headers
			.push(crate::cookies::serialize_clear(name, path, domain));

		self
	}

	// --------------------------------------------------
	// Buffer finalization shared by json/send/sendStatus/redirect

	fn json_bytes(&self, value: &serde_json::Value) -> Vec<u8> {
		let mut buf = Vec::new();

		if self.app.json_spaces > 0 && !self.app.env.is_production() {
			let indent = " ".repeat(self.app.json_spaces);
			let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
			let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
			value.serialize(&mut serializer).expect(SCOPE_VALIDITY);
		} else {
			serde_json::to_writer(&mut buf, value).expect(SCOPE_VALIDITY);
		}

		if self.app.json_escape {
			let escaped = escape_json_html(std::str::from_utf8(&buf).expect(SCOPE_VALIDITY));
			escaped.into_bytes()
		} else {
			buf
		}
	}

	/// Builds the final response for a buffer body: stages `Content-Type` if unset,
	/// `Content-Length`, and strips the body for `HEAD`/204/304 per the decision
	/// recorded for this crate (keep it for every other status).
	fn finalize_buffer(&mut self, bytes: Vec<u8>, default_content_type: &str) -> Response {
		if !self.pending.headers.contains_key(http::header::CONTENT_TYPE) {
			let value = with_default_charset(default_content_type);
			if let Ok(value) = HeaderValue::from_str(&value) {
				self.pending.headers.insert(http::header::CONTENT_TYPE, value);
			}
		}

		let status = self.current_status();
		let is_head = *self.method() == Method::HEAD;
		let strip_body = is_head || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;

		if is_head || !strip_body {
			if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
				self.pending.headers.insert(http::header::CONTENT_LENGTH, value);
			}
		}

		let body = if strip_body { Body::empty() } else { Body::from(bytes) };

		let mut response = Response::new(body);
		*response.status_mut() = status;
		response
	}

	// --------------------------------------------------
	// Terminal senders

	/// `res.json(value)`.
	pub fn json<T: Serialize>(&mut self, value: &T) -> Result<Response, BoxedErrorResponse> {
		let json_value = serde_json::to_value(value).map_err(ResponseError::from_error)?;
		let bytes = self.json_bytes(&json_value);
		Ok(self.finalize_buffer(bytes, "application/json"))
	}

	/// `res.jsonp(value)` — wraps the serialized JSON in a callback named by the
	/// `callback` query parameter, filtered to `[\w$.\[\]]+`.
	pub fn jsonp<T: Serialize>(&mut self, value: &T) -> Result<Response, BoxedErrorResponse> {
		let json_value = serde_json::to_value(value).map_err(ResponseError::from_error)?;
		let body = self.json_bytes(&json_value);
		let body = String::from_utf8(body).expect(SCOPE_VALIDITY);

		let callback = self
			.query()
			.get("callback")
			.map(|v| v.as_str())
			.map(|name| {
				name
					.chars()
					.filter(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
					.collect::<String>()
			})
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| "callback".to_owned());

		let wrapped = format!("/**/ typeof {callback} === 'function' && {callback}({body});");

		self.pending.headers.insert(
			http::HeaderName::from_static("x-content-type-options"),
			HeaderValue::from_static("nosniff"),
		);

		Ok(self.finalize_buffer(wrapped.into_bytes(), "text/javascript"))
	}

	/// `res.send(body)` — dispatches by body type per spec.
	pub fn send(&mut self, body: impl Into<SendBody>) -> Result<Response, BoxedErrorResponse> {
		match body.into() {
			SendBody::Bytes(bytes) => Ok(self.finalize_buffer(bytes, "application/octet-stream")),
			SendBody::Text(text) => {
				let content_type = if text.trim_start().starts_with('<') {
					"text/html"
				} else {
					"text/plain"
				};
				Ok(self.finalize_buffer(text.into_bytes(), content_type))
			}
			SendBody::Number(n) => {
				let text = if n.fract() == 0.0 {
					format!("{n}")
				} else {
					n.to_string()
				};
				Ok(self.finalize_buffer(text.into_bytes(), "text/plain"))
			}
			SendBody::Bool(b) => Ok(self.finalize_buffer(b.to_string().into_bytes(), "text/plain")),
			SendBody::Null => Ok(self.finalize_buffer(Vec::new(), "text/plain")),
			SendBody::Json(value) => {
				let bytes = self.json_bytes(&value);
				Ok(self.finalize_buffer(bytes, "application/json"))
			}
		}
	}

	/// `res.sendStatus(code)` — sets the status and sends its canonical reason phrase
	/// as a plain-text body.
	pub fn send_status(&mut self, code: StatusCode) -> Response {
		self.status(code);
		let reason = code.canonical_reason().unwrap_or("").to_owned();
		self.finalize_buffer(reason.into_bytes(), "text/plain")
	}

	/// `res.redirect([code,] url)`. `url == "back"` resolves to `Referer`, or `/`.
	pub fn redirect(&mut self, code: Option<StatusCode>, url: &str) -> Response {
		let target = self.resolve_back(url);

		self.status(code.unwrap_or(StatusCode::FOUND));

		if let Ok(value) = HeaderValue::from_str(&target) {
			self.pending.headers.insert(http::header::LOCATION, value);
		}

		let accept = self.get("accept").map(str::to_owned);
		let format = best_match(accept.as_deref(), &["text/html", "text/plain"]).unwrap_or("text/plain");

		if format == "text/html" {
			let escaped = html_escape(&target);
			let body = format!(
				"<!DOCTYPE html><html><head></head><body>Redirecting to <a href=\"{escaped}\">{escaped}</a>.</body></html>"
			);
			self.finalize_buffer(body.into_bytes(), "text/html")
		} else {
			let body = format!("Redirecting to {target}.");
			self.finalize_buffer(body.into_bytes(), "text/plain")
		}
	}

	/// `res.location(url)` — sets `Location` without touching status or body.
	pub fn location(&mut self, url: &str) -> &mut Self {
		let target = self.resolve_back(url);

		if let Ok(value) = HeaderValue::from_str(&target) {
			self.pending.headers.insert(http::header::LOCATION, value);
		}

		self
	}

	fn resolve_back(&self, url: &str) -> String {
		if url == "back" {
			self.get("referer").map(str::to_owned).unwrap_or_else(|| "/".to_owned())
		} else {
			url.to_owned()
		}
	}

	/// `res.links({rel: url, ...})` — appends a `Link` header entry per pair.
	pub fn links(&mut self, map: &[(&str, &str)]) -> &mut Self {
		let joined = map
			.iter()
			.map(|(rel, url)| format!("<{url}>; rel=\"{rel}\""))
			.collect::<Vec<_>>()
			.join(", ");

		if !joined.is_empty() {
			if let Ok(value) = HeaderValue::from_str(&joined) {
				self.pending.headers.append(http::header::LINK, value);
			}
		}

		self
	}

	/// `res.format(handlers, default)` — content-negotiates a handler via `Accept`,
	/// responding 406 if nothing matches and no `default` was given. Always sets
	/// `Vary: Accept`.
	pub fn format<'a>(
		&mut self,
		mut handlers: Vec<(&'a str, FormatHandler<'a>)>,
		default: Option<FormatHandler<'a>>,
	) -> Result<Response, BoxedErrorResponse> {
		self.vary("Accept");

		let keys: Vec<&str> = handlers.iter().map(|(key, _)| *key).collect();
		let accept = self.get("accept").map(str::to_owned);
		let matched = best_match(accept.as_deref(), &keys).map(str::to_owned);

		if let Some(matched) = matched {
			if let Some(position) = handlers.iter().position(|(key, _)| *key == matched) {
				let (_, handler) = handlers.remove(position);
				return handler(self);
			}
		}

		if let Some(default) = default {
			return default(self);
		}

		Ok(self.send_status(StatusCode::NOT_ACCEPTABLE))
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Arc;

	fn ctx() -> RequestContext {
		let request = conduit_core::request::Request::builder()
			.method("GET")
			.uri("/")
			.body(Body::empty())
			.unwrap();

		RequestContext::new(request, None, false, Arc::new(crate::application::AppContext::default()))
	}

	#[test]
	fn json_sets_content_type_and_length() {
		let mut ctx = ctx();
		let response = ctx.json(&serde_json::json!({"ok": true})).unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			ctx.pending.headers.get(http::header::CONTENT_TYPE).unwrap(),
			"application/json; charset=utf-8"
		);
		assert!(ctx.pending.headers.get(http::header::CONTENT_LENGTH).is_some());
	}

	#[test]
	fn send_detects_html_by_leading_angle_bracket() {
		let mut ctx = ctx();
		ctx.send("<p>hi</p>").unwrap();
		assert_eq!(
			ctx.pending.headers.get(http::header::CONTENT_TYPE).unwrap(),
			"text/html; charset=utf-8"
		);
	}

	#[test]
	fn send_status_uses_canonical_reason() {
		let mut ctx = ctx();
		let response = ctx.send_status(StatusCode::NOT_FOUND);
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn redirect_back_falls_back_to_root() {
		let mut ctx = ctx();
		let response = ctx.redirect(None, "back");
		assert_eq!(response.status(), StatusCode::FOUND);
		assert_eq!(ctx.pending.headers.get(http::header::LOCATION).unwrap(), "/");
	}

	#[test]
	fn vary_does_not_duplicate_fields() {
		let mut ctx = ctx();
		ctx.vary("Accept");
		ctx.vary("accept");
		assert_eq!(ctx.pending.headers.get(http::header::VARY).unwrap(), "Accept");
	}
}
