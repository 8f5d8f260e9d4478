//! Content negotiation shared by `req.accepts`/`req.is` and `res.format`.

// ----------

use crate::common::header_utils::{mime_is, parse_qualified_list};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// Returns the first candidate (in caller-supplied priority order) acceptable under
/// the `Accept` header, or `None` if none qualify. A missing/empty `Accept` header
/// accepts anything, so the first candidate wins.
pub(crate) fn best_match<'a>(accept_header: Option<&str>, candidates: &[&'a str]) -> Option<&'a str> {
	let Some(accept_header) = accept_header.filter(|h| !h.trim().is_empty()) else {
		return candidates.first().copied();
	};

	let accepted = parse_qualified_list(accept_header);

	candidates
		.iter()
		.copied()
		.find(|candidate| accepted.iter().any(|a| a.q > 0.0 && mime_is(candidate, &a.value)))
}

/// `req.acceptsEncodings` — same priority rule as [`best_match`], but candidates are
/// plain tokens (`gzip`, `br`, ...) matched by case-insensitive equality or a `*`
/// wildcard instead of MIME matching. A missing `Accept-Encoding` header means only
/// `identity` is acceptable (RFC 7231 §5.3.4).
pub(crate) fn best_match_encoding<'a>(header: Option<&str>, candidates: &[&'a str]) -> Option<&'a str> {
	let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
		return candidates
			.iter()
			.copied()
			.find(|c| c.eq_ignore_ascii_case("identity"))
			.or_else(|| candidates.first().copied());
	};

	let accepted = parse_qualified_list(header);

	candidates.iter().copied().find(|candidate| {
		accepted
			.iter()
			.any(|a| a.q > 0.0 && (a.value == "*" || a.value.eq_ignore_ascii_case(candidate)))
	})
}

/// `req.acceptsLanguages` — same priority rule as [`best_match`], matching language
/// tags with RFC 4647 basic filtering: a range matches the tag itself, a `*` wildcard,
/// or a tag it is a case-insensitive prefix of up to a `-` boundary (`en` matches
/// `en-US`).
pub(crate) fn best_match_language<'a>(header: Option<&str>, candidates: &[&'a str]) -> Option<&'a str> {
	let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
		return candidates.first().copied();
	};

	let accepted = parse_qualified_list(header);

	candidates
		.iter()
		.copied()
		.find(|candidate| accepted.iter().any(|a| a.q > 0.0 && language_range_matches(&a.value, candidate)))
}

fn language_range_matches(range: &str, tag: &str) -> bool {
	if range == "*" || range.eq_ignore_ascii_case(tag) {
		return true;
	}

	tag.len() > range.len()
		&& tag.as_bytes()[range.len()] == b'-'
		&& tag[..range.len()].eq_ignore_ascii_case(range)
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn picks_highest_priority_acceptable_candidate() {
		let picked = best_match(Some("text/html, application/json;q=0.9"), &["application/json", "text/html"]);
		assert_eq!(picked, Some("application/json"));
	}

	#[test]
	fn falls_back_to_first_when_header_absent() {
		assert_eq!(best_match(None, &["text/html", "application/json"]), Some("text/html"));
	}

	#[test]
	fn returns_none_when_nothing_matches() {
		assert_eq!(best_match(Some("application/xml"), &["text/html"]), None);
	}

	#[test]
	fn encoding_match_honors_wildcard_and_priority() {
		let picked = best_match_encoding(Some("gzip;q=0.5, br, *;q=0.1"), &["br", "gzip"]);
		assert_eq!(picked, Some("br"));
	}

	#[test]
	fn encoding_match_falls_back_to_identity_when_header_absent() {
		assert_eq!(best_match_encoding(None, &["gzip", "identity"]), Some("identity"));
		assert_eq!(best_match_encoding(None, &["gzip", "br"]), Some("gzip"));
	}

	#[test]
	fn language_match_uses_prefix_filtering() {
		let picked = best_match_language(Some("en-GB;q=0.8, en;q=0.9"), &["en-US", "fr"]);
		assert_eq!(picked, Some("en-US"));
	}

	#[test]
	fn language_match_respects_wildcard() {
		assert_eq!(best_match_language(Some("*"), &["de", "fr"]), Some("de"));
	}
}
