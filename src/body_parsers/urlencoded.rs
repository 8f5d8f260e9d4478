//! `body_parsers::urlencoded` — parses `application/x-www-form-urlencoded` bodies.
//!
//! Simple mode (the default) flattens repeated keys the way `serde_urlencoded` naturally
//! would; extended mode additionally expands `a[b][c]=x`-style bracket nesting into a
//! JSON object tree, mirroring the `qs`-backed extended parser.

// ----------

use serde_json::{Map, Value};

use crate::{
	body_parsers::{check_charset, parse_failed, read_body_with_limit, request_has_body, too_many_parameters, ParsedBody, TypeMatch},
	common::size::parse_size,
	handler::{mw, Handler, HandlerOutcome},
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Clone)]
pub struct UrlencodedOptions {
	pub limit: usize,
	pub type_match: TypeMatch,
	pub extended: bool,
	pub parameter_limit: usize,
}

impl Default for UrlencodedOptions {
	fn default() -> Self {
		Self {
			limit: parse_size("100kb").expect(crate::common::SCOPE_VALIDITY),
			type_match: TypeMatch::Single("application/x-www-form-urlencoded".to_owned()),
			extended: true,
			parameter_limit: 1000,
		}
	}
}

impl UrlencodedOptions {
	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = limit;
		self
	}

	pub fn type_(mut self, type_match: impl Into<TypeMatch>) -> Self {
		self.type_match = type_match.into();
		self
	}

	pub fn extended(mut self, extended: bool) -> Self {
		self.extended = extended;
		self
	}

	pub fn parameter_limit(mut self, limit: usize) -> Self {
		self.parameter_limit = limit;
		self
	}
}

/// Builds the urlencoded body parser middleware.
pub fn urlencoded(options: UrlencodedOptions) -> impl Handler {
	mw(move |mut ctx: RequestContext| {
		let options = options.clone();
		async move {
			if ctx.parsed_body().is_some() || !request_has_body(&ctx) || !options.type_match.matches(&ctx) {
				return (ctx, Ok(HandlerOutcome::Next));
			}

			if let Err(error) = check_charset(&ctx) {
				return (ctx, Err(error));
			}

			let bytes = match read_body_with_limit(&mut ctx, options.limit).await {
				Ok(bytes) => bytes,
				Err(error) => return (ctx, Err(error)),
			};

			if bytes.is_empty() {
				ctx.set_parsed_body(ParsedBody::Form(Value::Object(Map::new())));
				return (ctx, Ok(HandlerOutcome::Next));
			}

			let pairs: Vec<(String, String)> = match serde_urlencoded::from_bytes(&bytes) {
				Ok(pairs) => pairs,
				Err(error) => return (ctx, Err(parse_failed(error.to_string()))),
			};

			if pairs.len() > options.parameter_limit {
				return (ctx, Err(too_many_parameters(options.parameter_limit)));
			}

			let value = if options.extended {
				extended_object(&pairs)
			} else {
				simple_object(&pairs)
			};

			ctx.set_parsed_body(ParsedBody::Form(value));
			(ctx, Ok(HandlerOutcome::Next))
		}
	})
}

// --------------------------------------------------------------------------------
// Flattening / nesting

fn simple_object(pairs: &[(String, String)]) -> Value {
	let mut map = Map::new();
	for (key, value) in pairs {
		map.insert(key.clone(), Value::String(value.clone()));
	}
	Value::Object(map)
}

/// Expands `a[b][c]=x` into nested objects and `a[]=x` into arrays, in the order keys
/// first appear.
fn extended_object(pairs: &[(String, String)]) -> Value {
	let mut root = Value::Object(Map::new());

	for (raw_key, value) in pairs {
		let segments = split_key(raw_key);
		assign(&mut root, &segments, value.clone());
	}

	root
}

enum Segment {
	Name(String),
	Index,
}

fn split_key(raw_key: &str) -> Vec<Segment> {
	let mut segments = Vec::new();
	let mut rest = raw_key;

	if let Some(bracket) = rest.find('[') {
		segments.push(Segment::Name(rest[..bracket].to_owned()));
		rest = &rest[bracket..];
	} else {
		segments.push(Segment::Name(rest.to_owned()));
		return segments;
	}

	while let Some(stripped) = rest.strip_prefix('[') {
		let Some(end) = stripped.find(']') else { break };
		let (inner, remainder) = stripped.split_at(end);
		segments.push(if inner.is_empty() { Segment::Index } else { Segment::Name(inner.to_owned()) });
		rest = &remainder[1..];
	}

	segments
}

fn assign(node: &mut Value, segments: &[Segment], value: String) {
	let Some((head, tail)) = segments.split_first() else { return };

	match head {
		Segment::Name(name) => {
			if !node.is_object() {
				*node = Value::Object(Map::new());
			}
			let map = node.as_object_mut().expect(crate::common::SCOPE_VALIDITY);
			let entry = map.entry(name.clone()).or_insert(Value::Null);

			if tail.is_empty() {
				*entry = Value::String(value);
			} else {
				assign(entry, tail, value);
			}
		}
		Segment::Index => {
			if !node.is_array() {
				*node = Value::Array(Vec::new());
			}
			let array = node.as_array_mut().expect(crate::common::SCOPE_VALIDITY);

			if tail.is_empty() {
				array.push(Value::String(value));
			} else {
				let mut child = Value::Null;
				assign(&mut child, tail, value);
				array.push(child);
			}
		}
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn simple_mode_flattens_keys() {
		let pairs = vec![("a".to_owned(), "1".to_owned()), ("b".to_owned(), "2".to_owned())];
		let value = simple_object(&pairs);
		assert_eq!(value["a"], "1");
		assert_eq!(value["b"], "2");
	}

	#[test]
	fn extended_mode_nests_brackets() {
		let pairs = vec![("user[name]".to_owned(), "ada".to_owned())];
		let value = extended_object(&pairs);
		assert_eq!(value["user"]["name"], "ada");
	}

	#[test]
	fn extended_mode_builds_arrays() {
		let pairs = vec![("tags[]".to_owned(), "a".to_owned()), ("tags[]".to_owned(), "b".to_owned())];
		let value = extended_object(&pairs);
		assert_eq!(value["tags"], serde_json::json!(["a", "b"]));
	}
}
