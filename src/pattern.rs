//! Path pattern compilation and matching.
//!
//! A pattern such as `/users/:id/posts/:postId` or `/files/*` is compiled once, at
//! registration time, into a [`Pattern`]: a regular expression plus the ordered list
//! of parameter keys the expression's capture groups correspond to. Compilation never
//! happens on the request path; only [`Pattern::matches`] runs per request.

// ----------

use regex::Regex;

use crate::common::ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// The modifier a `:name` token was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
	/// `:name` — exactly one segment, required.
	None,
	/// `:name?` — exactly one segment, optional.
	Optional,
	/// `:name*` — zero or more segments.
	ZeroOrMore,
	/// `:name+` — one or more segments.
	OneOrMore,
}

/// The name a capture group is reported under: a written `:name`, or the numeric
/// index of a bare `*` wildcard (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyName {
	Named(String),
	Index(usize),
}

impl KeyName {
	pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
		match self {
			KeyName::Named(name) => std::borrow::Cow::Borrowed(name),
			KeyName::Index(index) => std::borrow::Cow::Owned(index.to_string()),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Key {
	pub name: KeyName,
	pub modifier: Modifier,
}

/// Flags controlling how a pattern is compiled. `end = false` compiles a prefix
/// (middleware) matcher; `end = true` compiles an exact (route) matcher.
#[derive(Debug, Clone, Copy)]
pub struct PatternFlags {
	pub sensitive: bool,
	pub strict: bool,
	pub end: bool,
}

impl Default for PatternFlags {
	fn default() -> Self {
		Self {
			sensitive: false,
			strict: false,
			end: true,
		}
	}
}

// --------------------------------------------------------------------------------

#[derive(Debug, ImplError)]
pub enum PatternError {
	#[error("empty parameter name in pattern at byte {0}")]
	EmptyParamName(usize),
	#[error("invalid regular expression compiled from pattern: {0}")]
	Regex(#[from] regex::Error),
}

// --------------------------------------------------------------------------------
// Pattern

/// A compiled path pattern. See the module documentation.
#[derive(Debug, Clone)]
pub struct Pattern {
	source: String,
	regex: Regex,
	keys: Vec<Key>,
	end: bool,
}

/// The result of a successful [`Pattern::matches`] call.
#[derive(Debug)]
pub struct PathMatch {
	/// Parameter values in the order their keys were declared, URL-decoded.
	pub params: Vec<(KeyName, String)>,
	/// Byte length of `path` consumed by the match; for a `!end` pattern this is the
	/// prefix length middleware should strip.
	pub matched_len: usize,
}

impl Pattern {
	/// The literal path string this pattern was compiled from (used for `use('/',...)`
	/// style bookkeeping and diagnostics, never re-parsed at request time).
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn is_root(&self) -> bool {
		self.source == "/" || self.source.is_empty()
	}

	pub fn compile(path: &str, flags: PatternFlags) -> Result<Pattern, PatternError> {
		let mut regex_str = String::from("^");
		let mut keys = Vec::new();
		let mut wildcard_index = 0usize;

		let chars: Vec<char> = path.chars().collect();
		let mut i = 0usize;
		let mut literal = String::new();

		fn flush_literal(regex_str: &mut String, literal: &mut String) {
			if !literal.is_empty() {
				regex_str.push_str(&regex::escape(literal));
				literal.clear();
			}
		}

		while i < chars.len() {
			let c = chars[i];

			if c == ':' {
				flush_literal(&mut regex_str, &mut literal);

				i += 1;
				let name_start = i;
				while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
					i += 1;
				}

				if i == name_start {
					return Err(PatternError::EmptyParamName(name_start));
				}

				let name: String = chars[name_start..i].iter().collect();

				let modifier = match chars.get(i) {
					Some('?') => {
						i += 1;
						Modifier::Optional
					}
					Some('+') => {
						i += 1;
						Modifier::OneOrMore
					}
					Some('*') => {
						i += 1;
						Modifier::ZeroOrMore
					}
					_ => Modifier::None,
				};

				// Fold a preceding literal '/' into optional/repeating groups so that
				// e.g. "/users/:id?" doesn't leave a dangling slash when :id is absent.
				let fold_slash = !matches!(modifier, Modifier::None) && regex_str.ends_with('/');

				if fold_slash {
					regex_str.pop();
				}

				let group = match modifier {
					Modifier::None => "([^/]+)".to_owned(),
					Modifier::Optional if fold_slash => "(?:/([^/]+))?".to_owned(),
					Modifier::Optional => "([^/]+)?".to_owned(),
					Modifier::OneOrMore if fold_slash => "(?:/([^/]+(?:/[^/]+)*))".to_owned(),
					Modifier::OneOrMore => "([^/]+(?:/[^/]+)*)".to_owned(),
					Modifier::ZeroOrMore if fold_slash => "(?:/([^/]+(?:/[^/]+)*))?".to_owned(),
					Modifier::ZeroOrMore => "([^/]+(?:/[^/]+)*)?".to_owned(),
				};

				regex_str.push_str(&group);
				keys.push(Key {
					name: KeyName::Named(name),
					modifier,
				});
			} else if c == '*' {
				flush_literal(&mut regex_str, &mut literal);
				i += 1;

				let fold_slash = regex_str.ends_with('/');
				if fold_slash {
					regex_str.pop();
					regex_str.push_str("(?:/(.*))?");
				} else {
					regex_str.push_str("(.*)");
				}

				keys.push(Key {
					name: KeyName::Index(wildcard_index),
					modifier: Modifier::ZeroOrMore,
				});
				wildcard_index += 1;
			} else {
				literal.push(c);
				i += 1;
			}
		}

		flush_literal(&mut regex_str, &mut literal);

		if flags.end {
			if !flags.strict {
				regex_str.push_str("/?");
			}
			regex_str.push('$');
		}

		let mut full = regex_str;
		if !flags.sensitive {
			full = format!("(?i){full}");
		}

		let regex = Regex::new(&full)?;

		Ok(Pattern {
			source: path.to_owned(),
			regex,
			keys,
			end: flags.end,
		})
	}

	/// Attempts to match `path`. On success, returns the captured parameters
	/// (URL-decoded) and the byte length of `path` that the match consumed.
	pub fn matches(&self, path: &str) -> Option<PathMatch> {
		let captures = self.regex.captures(path)?;
		let whole = captures.get(0)?;

		if !self.end {
			// A prefix match is only valid if it ends at a path segment boundary:
			// "/api" must not match "/apiary".
			let end = whole.end();
			if end != path.len() {
				let next = path.as_bytes().get(end);
				if next != Some(&b'/') {
					return None;
				}
			}
		}

		let mut params = Vec::with_capacity(self.keys.len());

		for (index, key) in self.keys.iter().enumerate() {
			// Capture group 0 is the whole match, so keys are offset by one.
			if let Some(matched) = captures.get(index + 1) {
				let decoded = decode_param(matched.as_str());
				params.push((key.name.clone(), decoded));
			}
			// Unmatched optional groups contribute no entry, matching the invariant
			// that absent optional parameters are absent from `params`.
		}

		Some(PathMatch {
			params,
			matched_len: whole.end(),
		})
	}
}

fn decode_param(raw: &str) -> String {
	percent_encoding::percent_decode_str(raw)
		.decode_utf8()
		.map(|cow| cow.into_owned())
		.unwrap_or_else(|_| raw.to_owned())
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	fn route(path: &str) -> Pattern {
		Pattern::compile(
			path,
			PatternFlags {
				sensitive: false,
				strict: false,
				end: true,
			},
		)
		.unwrap()
	}

	fn middleware(path: &str) -> Pattern {
		Pattern::compile(
			path,
			PatternFlags {
				sensitive: false,
				strict: false,
				end: false,
			},
		)
		.unwrap()
	}

	#[test]
	fn matches_simple_params() {
		let pattern = route("/users/:id/posts/:postId");
		let m = pattern.matches("/users/42/posts/abc").unwrap();

		assert_eq!(
			m.params,
			vec![
				(KeyName::Named("id".into()), "42".into()),
				(KeyName::Named("postId".into()), "abc".into()),
			]
		);
	}

	#[test]
	fn route_pattern_rejects_extra_segments() {
		let pattern = route("/users/:id");
		assert!(pattern.matches("/users/42/posts").is_none());
	}

	#[test]
	fn middleware_pattern_requires_segment_boundary() {
		let pattern = middleware("/api");
		assert!(pattern.matches("/api/users").is_some());
		assert!(pattern.matches("/apiary").is_none());
		let m = pattern.matches("/api").unwrap();
		assert_eq!(m.matched_len, 4);
	}

	#[test]
	fn root_pattern_matches_everything_as_prefix() {
		let pattern = middleware("/");
		let m = pattern.matches("/anything/at/all").unwrap();
		assert_eq!(m.matched_len, 0);
	}

	#[test]
	fn optional_param_is_absent_when_unmatched() {
		let pattern = route("/users/:id?");
		let m = pattern.matches("/users").unwrap();
		assert!(m.params.is_empty());

		let m = pattern.matches("/users/7").unwrap();
		assert_eq!(m.params, vec![(KeyName::Named("id".into()), "7".into())]);
	}

	#[test]
	fn wildcard_captures_trailing_segments() {
		let pattern = route("/files/*");
		let m = pattern.matches("/files/a/b/c.txt").unwrap();
		assert_eq!(m.params, vec![(KeyName::Index(0), "a/b/c.txt".into())]);
	}

	#[test]
	fn decodes_percent_encoded_values() {
		let pattern = route("/search/:term");
		let m = pattern.matches("/search/hello%20world").unwrap();
		assert_eq!(
			m.params,
			vec![(KeyName::Named("term".into()), "hello world".into())]
		);
	}

	#[test]
	fn case_sensitivity_flag() {
		let sensitive = Pattern::compile(
			"/Users",
			PatternFlags {
				sensitive: true,
				strict: false,
				end: true,
			},
		)
		.unwrap();

		assert!(sensitive.matches("/Users").is_some());
		assert!(sensitive.matches("/users").is_none());
	}

	#[test]
	fn strict_trailing_slash_flag() {
		let lenient = route("/users");
		assert!(lenient.matches("/users/").is_some());

		let strict = Pattern::compile(
			"/users",
			PatternFlags {
				sensitive: false,
				strict: true,
				end: true,
			},
		)
		.unwrap();

		assert!(strict.matches("/users/").is_none());
		assert!(strict.matches("/users").is_some());
	}
}
