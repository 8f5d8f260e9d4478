//! `body_parsers::raw` — collects the request body as an opaque byte buffer, without
//! any decoding. Useful for webhook signature verification and binary uploads.

// ----------

use crate::{
	body_parsers::{read_body_with_limit, request_has_body, ParsedBody, TypeMatch},
	common::size::parse_size,
	handler::{mw, Handler, HandlerOutcome},
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Clone)]
pub struct RawOptions {
	pub limit: usize,
	pub type_match: TypeMatch,
}

impl Default for RawOptions {
	fn default() -> Self {
		Self {
			limit: parse_size("100kb").expect(crate::common::SCOPE_VALIDITY),
			type_match: TypeMatch::Single("application/octet-stream".to_owned()),
		}
	}
}

impl RawOptions {
	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = limit;
		self
	}

	pub fn type_(mut self, type_match: impl Into<TypeMatch>) -> Self {
		self.type_match = type_match.into();
		self
	}
}

/// Builds the raw body parser middleware.
pub fn raw(options: RawOptions) -> impl Handler {
	mw(move |mut ctx: RequestContext| {
		let options = options.clone();
		async move {
			if ctx.parsed_body().is_some() || !request_has_body(&ctx) || !options.type_match.matches(&ctx) {
				return (ctx, Ok(HandlerOutcome::Next));
			}

			match read_body_with_limit(&mut ctx, options.limit).await {
				Ok(bytes) => {
					ctx.set_parsed_body(ParsedBody::Raw(bytes));
					(ctx, Ok(HandlerOutcome::Next))
				}
				Err(error) => (ctx, Err(error)),
			}
		}
	})
}
