//! Cookie header parsing, signing, and serialization.
//!
//! The signed-cookie wire format (`s:<value>.<base64url(hmac-sha256(secret, value))>`)
//! is a fixed interop contract, not something the `cookie` crate's own signed jars
//! produce, so it is implemented directly against `hmac`+`sha2`+`base64` rather than
//! through `cookie::CookieJar::signed()`.

// ----------

use std::time::{Duration, SystemTime};

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::common::ImplError;

type HmacSha256 = Hmac<Sha256>;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// A cookie value as decoded from the `Cookie` header: either plain text, or a
/// `j:`-prefixed JSON payload (mirroring `cookie-parser`'s object-cookie support).
#[derive(Debug, Clone, PartialEq)]
pub enum CookieValue {
	Plain(String),
	Json(serde_json::Value),
}

impl CookieValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			CookieValue::Plain(value) => Some(value),
			CookieValue::Json(_) => None,
		}
	}

	pub fn json(&self) -> Option<&serde_json::Value> {
		match self {
			CookieValue::Json(value) => Some(value),
			CookieValue::Plain(_) => None,
		}
	}
}

/// Decodes a single cookie's value: unwraps `j:`-prefixed JSON, otherwise plain text.
fn decode_value(raw: &str) -> CookieValue {
	if let Some(json_part) = raw.strip_prefix("j:") {
		if let Ok(value) = serde_json::from_str(json_part) {
			return CookieValue::Json(value);
		}
	}

	CookieValue::Plain(raw.to_owned())
}

/// Parses a `Cookie` request header into name -> decoded value pairs. Values that
/// carry the `s:` signed-cookie prefix are returned unmodified here; verifying and
/// stripping the signature is [`verify_signed`]'s job, since it requires a secret.
pub(crate) fn parse_cookie_header(header_value: &str) -> Vec<(String, String)> {
	header_value
		.split(';')
		.filter_map(|part| {
			let part = part.trim();
			let (name, value) = part.split_once('=')?;
			Some((
				percent_decode(name.trim()),
				percent_decode(value.trim()),
			))
		})
		.collect()
}

fn percent_decode(s: &str) -> String {
	percent_encoding::percent_decode_str(s)
		.decode_utf8()
		.map(|cow| cow.into_owned())
		.unwrap_or_else(|_| s.to_owned())
}

pub(crate) fn decode(raw: &str) -> CookieValue {
	decode_value(raw)
}

// --------------------------------------------------------------------------------
// Signing

#[cfg(feature = "signed-cookies")]
#[derive(Debug, ImplError)]
pub enum SignatureError {
	#[error("cookie value is not signed")]
	NotSigned,
	#[error("cookie signature does not match")]
	Mismatch,
}

/// Produces the `s:<value>.<signature>` wire value for a cookie that should be signed.
#[cfg(feature = "signed-cookies")]
pub(crate) fn sign(value: &str, secret: &[u8]) -> String {
	let signature = hmac_base64(value.as_bytes(), secret);
	format!("s:{value}.{signature}")
}

/// Verifies and strips a `s:<value>.<signature>` wire value, returning the original
/// value on success.
#[cfg(feature = "signed-cookies")]
pub(crate) fn verify_signed(raw: &str, secret: &[u8]) -> Result<String, SignatureError> {
	let rest = raw.strip_prefix("s:").ok_or(SignatureError::NotSigned)?;
	let (value, signature) = rest.rsplit_once('.').ok_or(SignatureError::NotSigned)?;

	let expected = hmac_base64(value.as_bytes(), secret);

	if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
		Ok(value.to_owned())
	} else {
		Err(SignatureError::Mismatch)
	}
}

#[cfg(feature = "signed-cookies")]
fn hmac_base64(value: &[u8], secret: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
	mac.update(value);
	BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(feature = "signed-cookies")]
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}

	a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// --------------------------------------------------------------------------------
// Outgoing cookies (Set-Cookie)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// Attributes for an outgoing `Set-Cookie` header, built fluently from
/// `RequestContext::cookie`.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
	pub max_age: Option<Duration>,
	pub expires: Option<SystemTime>,
	pub path: Option<String>,
	pub domain: Option<String>,
	pub secure: bool,
	pub http_only: bool,
	pub same_site: Option<SameSite>,
	pub signed: bool,
}

impl CookieOptions {
	pub fn max_age(mut self, duration: Duration) -> Self {
		self.max_age = Some(duration);
		self
	}

	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	pub fn secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;
		self
	}

	pub fn same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);
		self
	}

	pub fn signed(mut self, signed: bool) -> Self {
		self.signed = signed;
		self
	}
}

pub(crate) struct OutgoingCookie {
	pub name: String,
	pub value: String,
	pub options: CookieOptions,
}

/// Serializes an outgoing cookie to a single `Set-Cookie` header value.
pub(crate) fn serialize(cookie: &OutgoingCookie, secret: Option<&[u8]>) -> String {
	#[cfg(feature = "signed-cookies")]
	let value = if cookie.options.signed {
		let secret = secret.expect("signed cookie requires a configured secret");
		sign(&cookie.value, secret)
	} else {
		cookie.value.clone()
	};

	#[cfg(not(feature = "signed-cookies"))]
	let value = {
		let _ = secret;
		cookie.value.clone()
	};

	let mut out = format!(
		"{}={}",
		percent_encoding::utf8_percent_encode(&cookie.name, percent_encoding::NON_ALPHANUMERIC),
		percent_encoding::utf8_percent_encode(&value, percent_encoding::NON_ALPHANUMERIC),
	);

	let path = cookie.options.path.as_deref().unwrap_or("/");
	out.push_str("; Path=");
	out.push_str(path);

	if let Some(domain) = &cookie.options.domain {
		out.push_str("; Domain=");
		out.push_str(domain);
	}

	if let Some(max_age) = cookie.options.max_age {
		out.push_str(&format!("; Max-Age={}", max_age.as_secs()));
		let expires = SystemTime::now() + max_age;
		out.push_str("; Expires=");
		out.push_str(&httpdate::fmt_http_date(expires));
	} else if let Some(expires) = cookie.options.expires {
		out.push_str("; Expires=");
		out.push_str(&httpdate::fmt_http_date(expires));
	}

	if cookie.options.secure {
		out.push_str("; Secure");
	}

	if cookie.options.http_only {
		out.push_str("; HttpOnly");
	}

	match cookie.options.same_site {
		Some(SameSite::Strict) => out.push_str("; SameSite=Strict"),
		Some(SameSite::Lax) => out.push_str("; SameSite=Lax"),
		Some(SameSite::None) => out.push_str("; SameSite=None"),
		None => {}
	}

	out
}

/// Builds the `Set-Cookie` value that clears a previously-set cookie.
pub(crate) fn serialize_clear(name: &str, path: Option<&str>, domain: Option<&str>) -> String {
	let cookie = OutgoingCookie {
		name: name.to_owned(),
		value: String::new(),
		options: CookieOptions {
			max_age: Some(Duration::from_secs(0)),
			expires: Some(SystemTime::UNIX_EPOCH),
			path: path.map(str::to_owned),
			domain: domain.map(str::to_owned),
			..Default::default()
		},
	};

	serialize(&cookie, None)
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	#[cfg(feature = "signed-cookies")]
	fn sign_and_verify_round_trip() {
		let signed = sign("abc123", b"secret");
		assert!(signed.starts_with("s:abc123."));
		assert_eq!(verify_signed(&signed, b"secret").unwrap(), "abc123");
	}

	#[test]
	#[cfg(feature = "signed-cookies")]
	fn tampered_signature_is_rejected() {
		let mut signed = sign("abc123", b"secret");
		signed.push('x');
		assert!(verify_signed(&signed, b"secret").is_err());
	}

	#[test]
	#[cfg(feature = "signed-cookies")]
	fn wrong_secret_is_rejected() {
		let signed = sign("abc123", b"secret");
		assert!(verify_signed(&signed, b"other").is_err());
	}

	#[test]
	fn parses_multiple_cookies() {
		let parsed = parse_cookie_header("a=1; b=2; c=hello%20world");
		assert_eq!(
			parsed,
			vec![
				("a".to_owned(), "1".to_owned()),
				("b".to_owned(), "2".to_owned()),
				("c".to_owned(), "hello world".to_owned()),
			]
		);
	}

	#[test]
	fn decodes_object_cookies() {
		let value = decode("j:{\"a\":1}");
		assert_eq!(value.json().unwrap()["a"], 1);
	}
}
