//! Header parsing helpers shared by request content-negotiation and body parsers.

// ----------

use http::{
	header::{ToStrError, CONTENT_TYPE, HOST},
	HeaderMap, HeaderValue, StatusCode,
};

use conduit_core::response::{IntoResponse, Response};

use super::ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub(crate) fn content_type(headers: &HeaderMap) -> Result<&str, ContentTypeError> {
	let value = headers.get(CONTENT_TYPE).ok_or(ContentTypeError::Missing)?;

	value.to_str().map_err(Into::into)
}

#[derive(Debug, ImplError)]
pub(crate) enum ContentTypeError {
	#[error("missing Content-Type")]
	Missing,
	#[error(transparent)]
	InvalidValue(#[from] ToStrError),
}

impl IntoResponse for ContentTypeError {
	fn into_response(self) -> Response {
		StatusCode::BAD_REQUEST.into_response()
	}
}

// --------------------------------------------------------------------------------
// Host header

pub(crate) fn host_header_value(headers: &HeaderMap) -> Result<&str, HostHeaderError> {
	let value = headers.get(HOST).ok_or(HostHeaderError::Missing)?;

	strip_port(value.to_str()?)
}

fn strip_port(authority: &str) -> Result<&str, HostHeaderError> {
	if let Some(bracket_end) = authority.strip_prefix('[') {
		// IPv6 literal, e.g. "[::1]:8080" or "[::1]".
		return bracket_end
			.split(']')
			.next()
			.ok_or(HostHeaderError::Missing);
	}

	Ok(authority.rsplit_once(':').map_or(authority, |(host, _)| host))
}

#[derive(Debug, ImplError)]
pub(crate) enum HostHeaderError {
	#[error("missing Host header")]
	Missing,
	#[error(transparent)]
	InvalidValue(#[from] ToStrError),
}

impl IntoResponse for HostHeaderError {
	fn into_response(self) -> Response {
		StatusCode::BAD_REQUEST.into_response()
	}
}

// --------------------------------------------------------------------------------
// Short MIME names (used by `Request::is` and `Response::type_`)

/// Expands a short type name or extension (`json`, `html`, `.png`) to a full MIME
/// type. Returns the input unchanged (assumed to already be a MIME type or a type
/// pattern like `text/*`) when it isn't recognized.
pub(crate) fn expand_mime_shorthand(name: &str) -> &str {
	match name {
		"json" => "application/json",
		"urlencoded" | "form" => "application/x-www-form-urlencoded",
		"html" => "text/html",
		"text" => "text/plain",
		"xml" => "application/xml",
		"multipart" => "multipart/form-data",
		"js" | "javascript" => "text/javascript",
		"css" => "text/css",
		"csv" => "text/csv",
		"png" | ".png" => "image/png",
		"jpg" | "jpeg" | ".jpg" | ".jpeg" => "image/jpeg",
		"gif" | ".gif" => "image/gif",
		"bin" | ".bin" => "application/octet-stream",
		"pdf" | ".pdf" => "application/pdf",
		other => other,
	}
}

/// Matches a `Content-Type` value (ignoring any `;` parameters) against a type spec
/// as used by `Request::is`: an exact MIME type, a short name/extension, or a
/// wildcard pattern (`text/*`, `*/json`).
pub(crate) fn mime_is(content_type: &str, spec: &str) -> bool {
	let essence = content_type.split(';').next().unwrap_or(content_type).trim();
	let expanded = expand_mime_shorthand(spec);

	if expanded == "*/*" {
		return true;
	}

	let Some((spec_type, spec_subtype)) = expanded.split_once('/') else {
		return essence.eq_ignore_ascii_case(expanded);
	};
	let Some((ct_type, ct_subtype)) = essence.split_once('/') else {
		return false;
	};

	let type_matches = spec_type == "*" || spec_type.eq_ignore_ascii_case(ct_type);
	let subtype_matches = spec_subtype == "*" || spec_subtype.eq_ignore_ascii_case(ct_subtype);

	type_matches && subtype_matches
}

// --------------------------------------------------------------------------------
// Accept-* header parsing with q-values

#[derive(Debug, Clone)]
pub(crate) struct QualifiedValue {
	pub value: String,
	pub q: f32,
	/// Order of appearance, used as a tiebreaker so parsing is stable.
	pub order: usize,
}

/// Parses a comma-separated `Accept`-family header value into values ordered by
/// descending `q` (ties broken by order of appearance), per RFC 7231 §5.3.
pub(crate) fn parse_qualified_list(header_value: &str) -> Vec<QualifiedValue> {
	let mut items: Vec<QualifiedValue> = header_value
		.split(',')
		.map(trim_str)
		.filter(|s| !s.is_empty())
		.enumerate()
		.map(|(order, part)| {
			let mut segments = part.split(';').map(trim_str);
			let value = segments.next().unwrap_or("").to_owned();
			let mut q = 1.0f32;

			for param in segments {
				if let Some(q_str) = param.strip_prefix("q=") {
					q = q_str.trim().parse().unwrap_or(1.0);
				}
			}

			QualifiedValue { value, q, order }
		})
		.collect();

	items.sort_by(|a, b| {
		b.q
			.partial_cmp(&a.q)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then(a.order.cmp(&b.order))
	});

	items
}

use super::trim_str;

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn strips_port_from_host() {
		assert_eq!(strip_port("example.com:8080").unwrap(), "example.com");
		assert_eq!(strip_port("example.com").unwrap(), "example.com");
		assert_eq!(strip_port("[::1]:8080").unwrap(), "::1");
		assert_eq!(strip_port("[::1]").unwrap(), "::1");
	}

	#[test]
	fn mime_is_handles_shorthand_and_wildcards() {
		assert!(mime_is("application/json; charset=utf-8", "json"));
		assert!(mime_is("text/html", "html"));
		assert!(mime_is("text/plain", "text/*"));
		assert!(mime_is("application/json", "*/json"));
		assert!(!mime_is("application/json", "text/*"));
	}

	#[test]
	fn parses_q_values_in_descending_order() {
		let parsed = parse_qualified_list("text/html;q=0.8, application/json, text/plain;q=0.9");
		assert_eq!(parsed[0].value, "application/json");
		assert_eq!(parsed[1].value, "text/plain");
		assert_eq!(parsed[2].value, "text/html");
	}
}
