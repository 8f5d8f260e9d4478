//! `body_parsers::json` — parses a JSON request body into `req.body`.

// ----------

use crate::{
	body_parsers::{check_charset, parse_failed, read_body_with_limit, request_has_body, ParsedBody, TypeMatch},
	common::size::parse_size,
	handler::{mw, Handler, HandlerOutcome},
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Clone)]
pub struct JsonOptions {
	pub limit: usize,
	pub type_match: TypeMatch,
	/// When set, parsing only runs if this returns `true` for the strict-JSON-top-level
	/// check (objects and arrays only) — mirrors the `strict` option.
	pub strict: bool,
}

impl Default for JsonOptions {
	fn default() -> Self {
		Self {
			limit: parse_size("100kb").expect(crate::common::SCOPE_VALIDITY),
			type_match: TypeMatch::Single("application/json".to_owned()),
			strict: true,
		}
	}
}

impl JsonOptions {
	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = limit;
		self
	}

	pub fn type_(mut self, type_match: impl Into<TypeMatch>) -> Self {
		self.type_match = type_match.into();
		self
	}

	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}
}

/// Builds the JSON body parser middleware.
pub fn json(options: JsonOptions) -> impl Handler {
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
				ctx.set_parsed_body(ParsedBody::Json(serde_json::Value::Object(serde_json::Map::new())));
				return (ctx, Ok(HandlerOutcome::Next));
			}

			if options.strict {
				let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
				if !matches!(first, Some(b'{') | Some(b'[')) {
					return (ctx, Err(parse_failed("expected an object or array")));
				}
			}

			match serde_json::from_slice::<serde_json::Value>(&bytes) {
				Ok(value) => {
					ctx.set_parsed_body(ParsedBody::Json(value));
					(ctx, Ok(HandlerOutcome::Next))
				}
				Err(error) => (ctx, Err(parse_failed(error.to_string()))),
			}
		}
	})
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn default_limit_is_100kb() {
		assert_eq!(JsonOptions::default().limit, 100 * 1024);
	}
}
