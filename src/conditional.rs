//! RFC 7232 conditional-request helpers: `fresh`/`stale` over `ETag`/`Last-Modified`
//! response validators against `If-None-Match`/`If-Modified-Since` request headers.
//!
//! This covers the common subset used by the vast majority of HTTP caches: exact and
//! weak `ETag` comparison, and second-precision `Last-Modified` comparison. `If-Match`/
//! `If-Unmodified-Since` (write preconditions) are out of scope, as is `Cache-Control:
//! no-cache` forcing a response to always be considered stale.

// ----------

use http::HeaderMap;
use httpdate::parse_http_date;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
	if if_none_match.trim() == "*" {
		return true;
	}

	let etag_tag = etag.strip_prefix("W/").unwrap_or(etag);

	if_none_match.split(',').map(str::trim).any(|candidate| {
		let candidate_tag = candidate.strip_prefix("W/").unwrap_or(candidate);
		candidate_tag == etag_tag
	})
}

/// Whether a response with the given validators is still fresh for a request carrying
/// the given conditional headers. A response with neither `ETag` nor `Last-Modified`
/// is never fresh — there is nothing to compare against.
pub fn is_fresh(request_headers: &HeaderMap, response_headers: &HeaderMap) -> bool {
	let if_none_match = request_headers.get(http::header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
	let if_modified_since = request_headers
		.get(http::header::IF_MODIFIED_SINCE)
		.and_then(|v| v.to_str().ok());

	if if_none_match.is_none() && if_modified_since.is_none() {
		return false;
	}

	let mut fresh = true;

	if let Some(if_none_match) = if_none_match {
		fresh = response_headers
			.get(http::header::ETAG)
			.and_then(|v| v.to_str().ok())
			.map(|etag| etag_matches(if_none_match, etag))
			.unwrap_or(false);
	}

	if fresh {
		if let Some(if_modified_since) = if_modified_since {
			fresh = match (
				parse_http_date(if_modified_since),
				response_headers
					.get(http::header::LAST_MODIFIED)
					.and_then(|v| v.to_str().ok())
					.and_then(|v| parse_http_date(v).ok()),
			) {
				(Ok(since), Some(last_modified)) => last_modified <= since,
				_ => false,
			};
		}
	}

	fresh
}

/// The inverse of [`is_fresh`].
pub fn is_stale(request_headers: &HeaderMap, response_headers: &HeaderMap) -> bool {
	!is_fresh(request_headers, response_headers)
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;
	use http::HeaderValue;

	fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in pairs {
			map.insert(
				http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
				HeaderValue::from_str(value).unwrap(),
			);
		}
		map
	}

	#[test]
	fn matching_etag_is_fresh() {
		let request = headers(&[("if-none-match", "\"abc\"")]);
		let response = headers(&[("etag", "\"abc\"")]);
		assert!(is_fresh(&request, &response));
	}

	#[test]
	fn weak_etag_comparison_ignores_prefix() {
		let request = headers(&[("if-none-match", "W/\"abc\"")]);
		let response = headers(&[("etag", "\"abc\"")]);
		assert!(is_fresh(&request, &response));
	}

	#[test]
	fn mismatched_etag_is_stale() {
		let request = headers(&[("if-none-match", "\"abc\"")]);
		let response = headers(&[("etag", "\"xyz\"")]);
		assert!(is_stale(&request, &response));
	}

	#[test]
	fn no_conditional_headers_is_stale() {
		let request = headers(&[]);
		let response = headers(&[("etag", "\"abc\"")]);
		assert!(is_stale(&request, &response));
	}

	#[test]
	fn unmodified_since_is_fresh() {
		let request = headers(&[("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT")]);
		let response = headers(&[("last-modified", "Sun, 06 Nov 1994 08:49:37 GMT")]);
		assert!(is_fresh(&request, &response));
	}
}
