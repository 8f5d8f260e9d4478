//! The per-request context threaded through the dispatch loop: request data plus the
//! response state middleware stage before a terminal handler finishes it.

// ----------

use std::{collections::HashMap, net::IpAddr, net::SocketAddr, sync::Arc};

use http::{header, HeaderMap, Method, Uri, Version};

use conduit_core::body::Body;

use crate::{
	application::AppContext, body_parsers::ParsedBody, common::header_utils, cookies::CookieValue,
	response::PendingResponse,
};

#[cfg(feature = "signed-cookies")]
use crate::session::{Session, SessionConfig};

pub mod query;
pub mod trust_proxy;

use query::{parse_query, QueryValue};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// The request and in-flight response state a handler operates on.
///
/// `path`/`base_url` are mutated as mount-prefix stripping descends into nested
/// routers; `original_url` never changes after construction.
pub struct RequestContext {
	pub(crate) method: Method,
	pub(crate) version: Version,
	pub(crate) headers: HeaderMap,
	pub(crate) remote_addr: Option<SocketAddr>,
	pub(crate) is_tls: bool,

	pub(crate) original_url: String,
	pub(crate) path: String,
	pub(crate) base_url: String,
	query_string: String,
	query: HashMap<String, QueryValue>,

	pub(crate) params: Vec<(String, String)>,
	pub(crate) bound_params: std::collections::HashSet<String>,

	body: Option<Body>,
	parsed_body: Option<ParsedBody>,

	cookies: Option<HashMap<String, CookieValue>>,
	signed_cookies: Option<HashMap<String, CookieValue>>,

	pub(crate) extensions: http::Extensions,

	pub(crate) app: Arc<AppContext>,

	#[cfg(feature = "signed-cookies")]
	pub(crate) session: Option<Session>,
	#[cfg(feature = "signed-cookies")]
	pub(crate) session_config: Option<Arc<SessionConfig>>,

	pub(crate) pending: PendingResponse,
}

impl RequestContext {
	pub(crate) fn new(
		request: conduit_core::request::Request,
		remote_addr: Option<SocketAddr>,
		is_tls: bool,
		app: Arc<AppContext>,
	) -> Self {
		let (parts, body) = request.into_parts();
		let uri: Uri = parts.uri;

		let path = uri.path().to_owned();
		let query_string = uri.query().unwrap_or("").to_owned();
		let query = parse_query(&query_string);

		let original_url = match uri.query() {
			Some(q) => format!("{}?{}", uri.path(), q),
			None => uri.path().to_owned(),
		};

		let mut pending = PendingResponse::default();
		pending.cookie_secret = app.cookie_secret.clone();

		Self {
			method: parts.method,
			version: parts.version,
			headers: parts.headers,
			remote_addr,
			is_tls,
			original_url,
			path,
			base_url: String::new(),
			query_string,
			query,
			params: Vec::new(),
			bound_params: std::collections::HashSet::new(),
			body: Some(body),
			parsed_body: None,
			cookies: None,
			signed_cookies: None,
			extensions: parts.extensions,
			app,
			#[cfg(feature = "signed-cookies")]
			session: None,
			#[cfg(feature = "signed-cookies")]
			session_config: None,
			pending,
		}
	}

	// --------------------------------------------------
	// Basics

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn version(&self) -> Version {
		self.version
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// The unconsumed portion of the path. Equal to `original_url`'s path component
	/// at the top-level router; shrinks as nested routers strip their mount prefix.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// The mount-prefix consumed so far.
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// The full request-target as it was received, unaffected by mount stripping.
	pub fn original_url(&self) -> &str {
		&self.original_url
	}

	pub fn query_string(&self) -> &str {
		&self.query_string
	}

	pub fn query(&self) -> &HashMap<String, QueryValue> {
		&self.query
	}

	/// Takes the request body, leaving `Body::empty()` behind. Body parsers call this
	/// once; a second parser on the same request sees an empty body.
	pub(crate) fn take_body(&mut self) -> Body {
		self.body.take().unwrap_or_else(Body::empty)
	}

	pub(crate) fn put_body(&mut self, body: Body) {
		self.body = Some(body);
	}

	/// Whether a body parser has already populated `req.body` this request — body
	/// parsers check this to stay idempotent.
	pub(crate) fn parsed_body(&self) -> Option<&ParsedBody> {
		self.parsed_body.as_ref()
	}

	pub(crate) fn set_parsed_body(&mut self, parsed: ParsedBody) {
		self.parsed_body = Some(parsed);
	}

	/// `req.body` after `body_parsers::json`.
	pub fn body_json(&self) -> Option<&serde_json::Value> {
		match &self.parsed_body {
			Some(ParsedBody::Json(value)) => Some(value),
			_ => None,
		}
	}

	/// `req.body` after `body_parsers::urlencoded`.
	pub fn body_form(&self) -> Option<&serde_json::Value> {
		match &self.parsed_body {
			Some(ParsedBody::Form(value)) => Some(value),
			_ => None,
		}
	}

	/// `req.body` after `body_parsers::text`.
	pub fn body_text(&self) -> Option<&str> {
		match &self.parsed_body {
			Some(ParsedBody::Text(value)) => Some(value),
			_ => None,
		}
	}

	/// `req.body` after `body_parsers::raw`.
	pub fn body_raw(&self) -> Option<&[u8]> {
		match &self.parsed_body {
			Some(ParsedBody::Raw(value)) => Some(value),
			_ => None,
		}
	}

	// --------------------------------------------------
	// Params

	pub fn param(&self, name: &str) -> Option<&str> {
		self
			.params
			.iter()
			.rev()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn params(&self) -> &[(String, String)] {
		&self.params
	}

	// --------------------------------------------------
	// Session, locals

	#[cfg(feature = "signed-cookies")]
	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	#[cfg(feature = "signed-cookies")]
	pub fn session_mut(&mut self) -> Option<&mut Session> {
		self.session.as_mut()
	}

	pub fn extensions(&self) -> &http::Extensions {
		&self.extensions
	}

	pub fn extensions_mut(&mut self) -> &mut http::Extensions {
		&mut self.extensions
	}

	/// `app.locals` as seen from a handler: the process-wide bag set up via
	/// `Application::locals_mut` before the application started serving.
	pub fn locals(&self) -> &http::Extensions {
		&self.app.locals
	}

	// --------------------------------------------------
	// Cookies

	fn ensure_cookies_parsed(&mut self) {
		if self.cookies.is_some() {
			return;
		}

		let mut plain = HashMap::new();
		let mut signed = HashMap::new();

		for header in self.headers.get_all(header::COOKIE) {
			let Ok(header_str) = header.to_str() else {
				continue;
			};

			for (name, raw_value) in crate::cookies::parse_cookie_header(header_str) {
				#[cfg(feature = "signed-cookies")]
				if let Some(secret) = self.app.cookie_secret.as_deref() {
					if let Ok(verified) = crate::cookies::verify_signed(&raw_value, secret) {
						signed.insert(name.clone(), crate::cookies::decode(&verified));
						continue;
					}
				}

				plain.insert(name, crate::cookies::decode(&raw_value));
			}
		}

		self.cookies = Some(plain);
		self.signed_cookies = Some(signed);
	}

	pub fn cookies(&mut self) -> &HashMap<String, CookieValue> {
		self.ensure_cookies_parsed();
		self.cookies.as_ref().expect(crate::common::SCOPE_VALIDITY)
	}

	pub fn signed_cookies(&mut self) -> &HashMap<String, CookieValue> {
		self.ensure_cookies_parsed();
		self
			.signed_cookies
			.as_ref()
			.expect(crate::common::SCOPE_VALIDITY)
	}

	// --------------------------------------------------
	// Header / content-type helpers (spec 4.4)

	/// `req.get(field)` — case-insensitive header lookup, with `Referrer`/`Referer`
	/// treated as aliases.
	pub fn get(&self, field: &str) -> Option<&str> {
		let field = if field.eq_ignore_ascii_case("referrer") {
			"referer"
		} else {
			field
		};

		self.headers.get(field).and_then(|v| v.to_str().ok())
	}

	fn content_type(&self) -> Option<&str> {
		header_utils::content_type(&self.headers).ok()
	}

	/// `req.is(type)` — whether the request body's declared `Content-Type` matches.
	pub fn is(&self, type_spec: &str) -> bool {
		self
			.content_type()
			.map(|ct| header_utils::mime_is(ct, type_spec))
			.unwrap_or(false)
	}

	/// `req.accepts(types)` — best type the client's `Accept` header permits, in the
	/// caller's priority order.
	pub fn accepts<'a>(&self, types: &[&'a str]) -> Option<&'a str> {
		crate::response::format::best_match(self.get("accept"), types)
	}

	/// `req.acceptsEncodings(encodings)` — best encoding the client's
	/// `Accept-Encoding` header permits, in the caller's priority order.
	pub fn accepts_encodings<'a>(&self, encodings: &[&'a str]) -> Option<&'a str> {
		crate::response::format::best_match_encoding(self.get("accept-encoding"), encodings)
	}

	/// `req.acceptsLanguages(languages)` — best language tag the client's
	/// `Accept-Language` header permits, in the caller's priority order.
	pub fn accepts_languages<'a>(&self, languages: &[&'a str]) -> Option<&'a str> {
		crate::response::format::best_match_language(self.get("accept-language"), languages)
	}

	pub fn xhr(&self) -> bool {
		self
			.get("x-requested-with")
			.map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
			.unwrap_or(false)
	}

	// --------------------------------------------------
	// Proxy-aware derived values (spec 4.6)

	fn forwarded_for_chain(&self) -> Vec<IpAddr> {
		self
			.get("x-forwarded-for")
			.map(|header| {
				header
					.split(',')
					.filter_map(|part| part.trim().parse().ok())
					.collect()
			})
			.unwrap_or_default()
	}

	/// The client's remote socket address, or the nearest untrusted proxy hop from
	/// `X-Forwarded-For` when `trust proxy` is configured.
	pub fn ip(&self) -> Option<IpAddr> {
		self.ips().into_iter().next()
	}

	/// `[client, proxy1, proxy2, ...]` — the `X-Forwarded-For` chain truncated at the
	/// trust boundary, nearest-to-client first, per the `trust proxy` setting.
	pub fn ips(&self) -> Vec<IpAddr> {
		let Some(remote) = self.remote_addr.map(|a| a.ip()) else {
			return Vec::new();
		};

		let chain = self.forwarded_for_chain();
		if chain.is_empty() || !self.app.trust_proxy.trusts(remote, 0) {
			return vec![remote];
		}

		// X-Forwarded-For is written nearest-proxy-last; walk it from the end (closest
		// to our own socket) toward the client, trusting each hop in turn. The first hop
		// that isn't trusted is the address the request is attributed to; it and
		// everything closer to the client are what's returned.
		let mut hop_index = 0usize;
		let mut addr = remote;
		let mut boundary = 0usize;

		for (i, candidate) in chain.iter().enumerate().rev() {
			boundary = i;
			if !self.app.trust_proxy.trusts(addr, hop_index) {
				break;
			}
			addr = *candidate;
			hop_index += 1;
		}

		chain[..=boundary].to_vec()
	}

	/// `req.protocol` — `"https"` or `"http"`, honoring `X-Forwarded-Proto` when the
	/// immediate peer is a trusted proxy.
	pub fn protocol(&self) -> &'static str {
		if let Some(remote) = self.remote_addr.map(|a| a.ip()) {
			if self.app.trust_proxy.trusts(remote, 0) {
				if let Some(forwarded) = self.get("x-forwarded-proto") {
					let first = forwarded.split(',').next().unwrap_or("").trim();
					if first.eq_ignore_ascii_case("https") {
						return "https";
					} else if first.eq_ignore_ascii_case("http") {
						return "http";
					}
				}
			}
		}

		if self.is_tls {
			"https"
		} else {
			"http"
		}
	}

	pub fn secure(&self) -> bool {
		self.protocol() == "https"
	}

	/// `req.hostname` — the `Host` header (port stripped), honoring `X-Forwarded-Host`
	/// when the immediate peer is trusted.
	pub fn hostname(&self) -> Option<&str> {
		if let Some(remote) = self.remote_addr.map(|a| a.ip()) {
			if self.app.trust_proxy.trusts(remote, 0) {
				if let Some(forwarded) = self.get("x-forwarded-host") {
					let first = forwarded.split(',').next().unwrap_or("").trim();
					if !first.is_empty() {
						return Some(first.rsplit_once(':').map_or(first, |(host, _)| host));
					}
				}
			}
		}

		header_utils::host_header_value(&self.headers).ok()
	}

	/// `req.subdomains` — labels of the hostname before the registered domain,
	/// most-specific first, per the `subdomain offset` setting.
	pub fn subdomains(&self) -> Vec<&str> {
		let Some(hostname) = self.hostname() else {
			return Vec::new();
		};

		if hostname.parse::<IpAddr>().is_ok() {
			return Vec::new();
		}

		let mut labels: Vec<&str> = hostname.split('.').collect();
		labels.reverse();

		if labels.len() <= self.app.subdomain_offset {
			return Vec::new();
		}

		labels.drain(self.app.subdomain_offset..).collect()
	}

	// --------------------------------------------------
	// Range (basic byte-range parsing, RFC 7233)

	/// Parses a `Range: bytes=...` header against a resource of `total_len` bytes.
	/// Returns `None` if there is no Range header, `Some(Err(()))` if it is present but
	/// unsatisfiable, `Some(Ok(ranges))` otherwise.
	pub fn range(&self, total_len: u64) -> Option<Result<Vec<(u64, u64)>, ()>> {
		let header = self.get("range")?;
		let spec = header.strip_prefix("bytes=")?;

		let mut ranges = Vec::new();
		for part in spec.split(',') {
			let part = part.trim();
			let Some((start, end)) = part.split_once('-') else {
				return Some(Err(()));
			};

			let range = if start.is_empty() {
				let suffix_len: u64 = match end.parse() {
					Ok(n) => n,
					Err(_) => return Some(Err(())),
				};
				let start = total_len.saturating_sub(suffix_len);
				(start, total_len.saturating_sub(1))
			} else {
				let start: u64 = match start.parse() {
					Ok(n) => n,
					Err(_) => return Some(Err(())),
				};
				let end: u64 = if end.is_empty() {
					total_len.saturating_sub(1)
				} else {
					match end.parse() {
						Ok(n) => n,
						Err(_) => return Some(Err(())),
					}
				};
				(start, end)
			};

			if range.0 > range.1 || range.0 >= total_len {
				return Some(Err(()));
			}

			ranges.push((range.0, range.1.min(total_len.saturating_sub(1))));
		}

		if ranges.is_empty() {
			Some(Err(()))
		} else {
			Some(Ok(ranges))
		}
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	fn ctx(uri: &str) -> RequestContext {
		let request = conduit_core::request::Request::builder()
			.method("GET")
			.uri(uri)
			.body(Body::empty())
			.unwrap();

		RequestContext::new(request, None, false, Arc::new(AppContext::default()))
	}

	#[test]
	fn splits_path_and_query() {
		let ctx = ctx("/search?q=rust&q=lang");
		assert_eq!(ctx.path(), "/search");
		assert_eq!(ctx.query().get("q").unwrap().as_vec(), vec!["rust", "lang"]);
	}

	#[test]
	fn original_url_is_stable_and_path_is_not() {
		let mut ctx = ctx("/api/users/1");
		ctx.path = "/users/1".to_owned();
		ctx.base_url = "/api".to_owned();
		assert_eq!(ctx.original_url(), "/api/users/1");
	}

	fn ctx_with_header(uri: &str, name: &str, value: &str) -> RequestContext {
		let request = conduit_core::request::Request::builder()
			.method("GET")
			.uri(uri)
			.header(name, value)
			.body(Body::empty())
			.unwrap();

		RequestContext::new(request, None, false, Arc::new(AppContext::default()))
	}

	#[test]
	fn accepts_encodings_picks_highest_priority_acceptable_encoding() {
		let ctx = ctx_with_header("/", "accept-encoding", "gzip;q=0.5, br;q=0.9");
		assert_eq!(ctx.accepts_encodings(&["br", "gzip"]), Some("br"));
	}

	#[test]
	fn accepts_encodings_defaults_to_identity_without_a_header() {
		let ctx = ctx("/");
		assert_eq!(ctx.accepts_encodings(&["gzip", "identity"]), Some("identity"));
	}

	#[test]
	fn accepts_languages_matches_a_region_by_its_primary_subtag() {
		let ctx = ctx_with_header("/", "accept-language", "en;q=0.9");
		assert_eq!(ctx.accepts_languages(&["fr-FR", "en-US"]), Some("en-US"));
	}
}
