//! The final fallback: what answers a request when no route matched (404) or no
//! error handler resolved a pending error (500-class). Both negotiate a body format
//! from `Accept`, and the error path redacts details outside development.

// ----------

use http::StatusCode;
use http_body_util::Full;

use conduit_core::{
	body::Body,
	response::{BoxedErrorResponse, Response, ResponseError},
};

use crate::{application::Environment, request::RequestContext, response::format::best_match};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

const FORMATS: &[&str] = &["application/json", "text/html", "text/plain"];

fn negotiated_body(ctx: &RequestContext, status: StatusCode, message: &str) -> Response {
	let format = best_match(ctx.get("accept"), FORMATS).unwrap_or("text/plain");

	let (content_type, body) = match format {
		"application/json" => (
			"application/json; charset=utf-8",
			serde_json::json!({ "error": { "status": status.as_u16(), "message": message } })
				.to_string(),
		),
		"text/html" => (
			"text/html; charset=utf-8",
			format!(
				"<!DOCTYPE html><html><head><title>{status}</title></head><body><pre>{}</pre></body></html>",
				html_escape(message)
			),
		),
		_ => ("text/plain; charset=utf-8", message.to_owned()),
	};

	let mut response = Response::new(Body::new(Full::from(body)));
	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(http::header::CONTENT_TYPE, content_type.parse().expect("valid content-type"));

	response
}

pub(crate) fn html_escape(input: &str) -> String {
	input
		.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

/// The response produced when the router's layer stack is exhausted without a
/// matching route.
pub(crate) fn default_not_found(ctx: &RequestContext) -> Response {
	negotiated_body(
		ctx,
		StatusCode::NOT_FOUND,
		&format!("Cannot {} {}", ctx.method(), ctx.original_url()),
	)
}

/// The response produced when a pending error reaches the end of the stack without
/// being resolved by an error handler.
pub(crate) fn default_error_response(ctx: &RequestContext, error: BoxedErrorResponse) -> Response {
	let status = error
		.downcast_ref::<ResponseError>()
		.map(|e| e.status_code())
		.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

	if ctx.app.env.is_production() {
		let message = status
			.canonical_reason()
			.unwrap_or("Internal Server Error")
			.to_owned();
		negotiated_body(ctx, status, &message)
	} else {
		let message = error.to_string();
		negotiated_body(ctx, status, &message)
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Arc;

	fn ctx() -> RequestContext {
		let request = conduit_core::request::Request::builder()
			.method("GET")
			.uri("/missing")
			.body(Body::empty())
			.unwrap();

		RequestContext::new(request, None, false, Arc::new(crate::application::AppContext::default()))
	}

	#[test]
	fn not_found_defaults_to_plain_text() {
		let response = default_not_found(&ctx());
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn production_error_hides_message() {
		let mut context = ctx();
		context.app = Arc::new(crate::application::AppContext {
			env: Environment::Production,
			..crate::application::AppContext::default()
		});

		let error: BoxedErrorResponse = ResponseError::from(StatusCode::BAD_GATEWAY).into();
		let response = default_error_response(&context, error);
		assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
	}
}
