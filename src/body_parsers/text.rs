//! `body_parsers::text` — collects the request body and decodes it as UTF-8 text,
//! without attempting any further structure.

// ----------

use crate::{
	body_parsers::{check_charset, decode_utf8, read_body_with_limit, request_has_body, ParsedBody, TypeMatch},
	common::size::parse_size,
	handler::{mw, Handler, HandlerOutcome},
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Clone)]
pub struct TextOptions {
	pub limit: usize,
	pub type_match: TypeMatch,
}

impl Default for TextOptions {
	fn default() -> Self {
		Self {
			limit: parse_size("100kb").expect(crate::common::SCOPE_VALIDITY),
			type_match: TypeMatch::Single("text/plain".to_owned()),
		}
	}
}

impl TextOptions {
	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = limit;
		self
	}

	pub fn type_(mut self, type_match: impl Into<TypeMatch>) -> Self {
		self.type_match = type_match.into();
		self
	}
}

/// Builds the text body parser middleware.
pub fn text(options: TextOptions) -> impl Handler {
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

			match decode_utf8(bytes) {
				Ok(text) => {
					ctx.set_parsed_body(ParsedBody::Text(text));
					(ctx, Ok(HandlerOutcome::Next))
				}
				Err(error) => (ctx, Err(error)),
			}
		}
	})
}
