//! End-to-end tests driving a full `Application` (no socket involved), covering the
//! dispatch scenarios for param extraction, mount-prefix stripping, the error channel,
//! signed cookies, trust-proxy resolution, and body-parser limits.

use std::net::SocketAddr;

use http_body_util::BodyExt;

use conduit::prelude::*;
use conduit::request::trust_proxy::TrustProxySetting;
use conduit::{Body, Request};

async fn body_bytes(response: conduit::Response) -> Vec<u8> {
	response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn get(path: &str) -> Request {
	Request::builder().method("GET").uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn param_extraction_and_method_filter() {
	let mut app = Application::new();
	app.router_mut().get(
		"/users/:id/posts/:postId",
		handler(|ctx: RequestContext| async move {
			let body = format!(
				"{{\"id\":\"{}\",\"postId\":\"{}\"}}",
				ctx.param("id").unwrap(),
				ctx.param("postId").unwrap()
			);
			(ctx, body)
		}),
	);

	let response = app.handle(get("/users/42/posts/abc"), None, false).await;
	assert_eq!(response.status(), http::StatusCode::OK);
	assert_eq!(body_bytes(response).await, b"{\"id\":\"42\",\"postId\":\"abc\"}");

	let post = Request::builder()
		.method("POST")
		.uri("/users/42/posts/abc")
		.body(Body::empty())
		.unwrap();
	let response = app.handle(post, None, false).await;
	assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn middleware_mount_strips_prefix() {
	let mut sub = Router::new();
	sub.get(
		"/users",
		handler(|ctx: RequestContext| async move {
			let body = format!("{{\"baseUrl\":\"{}\",\"path\":\"{}\"}}", ctx.base_url(), ctx.path());
			(ctx, body)
		}),
	);

	let mut app = Application::new();
	app.router_mut().use_router("/api", sub);

	let response = app.handle(get("/api/users"), None, false).await;
	assert_eq!(response.status(), http::StatusCode::OK);
	assert_eq!(body_bytes(response).await, br#"{"baseUrl":"/api","path":"/users"}"#);
}

#[tokio::test]
async fn error_channel_reaches_the_error_handler_and_skips_downstream_middleware() {
	let mut app = Application::new();
	app.router_mut().use_all(mw(|ctx: RequestContext| async move {
		(
			ctx,
			Err::<HandlerOutcome, _>(conduit_core::response::ResponseError::new(
				http::StatusCode::INTERNAL_SERVER_ERROR,
				std::io::Error::new(std::io::ErrorKind::Other, "boom"),
			)),
		)
	}));
	app.router_mut().use_error(
		"/",
		error_handler(|_err, mut ctx: RequestContext| async move {
			ctx.status(http::StatusCode::INTERNAL_SERVER_ERROR);
			let response = ctx.json(&serde_json::json!({ "error": "boom" })).unwrap();
			(ctx, Ok::<_, conduit_core::response::ResponseError>(ErrorOutcome::Response(response)))
		}),
	);

	let response = app.handle(get("/anything"), None, false).await;
	assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body_bytes(response).await, br#"{"error":"boom"}"#);
}

#[tokio::test]
async fn signed_cookie_tampering_is_rejected() {
	let mut app = Application::new();
	app.set_cookie_secret(b"super-secret".to_vec());
	app.router_mut().get(
		"/set",
		handler(|mut ctx: RequestContext| async move {
			ctx.cookie("uid", "42", CookieOptions::default().signed(true));
			(ctx, "ok")
		}),
	);
	app.router_mut().get(
		"/read",
		handler(|mut ctx: RequestContext| async move {
			let value = ctx
				.signed_cookies()
				.get("uid")
				.and_then(|v| v.as_str())
				.map(str::to_owned);
			(ctx, value.unwrap_or_default())
		}),
	);

	let set_response = app.handle(get("/set"), None, false).await;
	let set_cookie = set_response
		.headers()
		.get(http::header::SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap()
		.to_owned();
	let serialized = set_cookie.split(';').next().unwrap().to_owned(); // "uid=s%3A42%2E<sig>"
	let (_, signed_value) = serialized.split_once('=').unwrap();

	let good = Request::builder()
		.method("GET")
		.uri("/read")
		.header(http::header::COOKIE, format!("uid={signed_value}"))
		.body(Body::empty())
		.unwrap();
	let response = app.handle(good, None, false).await;
	assert_eq!(body_bytes(response).await, b"42");

	// Flip the value but keep the original signature: verification must fail.
	let tampered = signed_value.replacen("42", "99", 1);
	let bad = Request::builder()
		.method("GET")
		.uri("/read")
		.header(http::header::COOKIE, format!("uid={tampered}"))
		.body(Body::empty())
		.unwrap();
	let response = app.handle(bad, None, false).await;
	assert_eq!(body_bytes(response).await, b"");
}

#[tokio::test]
async fn trust_proxy_hop_count_picks_the_first_untrusted_hop() {
	let mut app = Application::new();
	app.set_trust_proxy(TrustProxySetting::HopCount(2));
	app.router_mut().get(
		"/",
		handler(|ctx: RequestContext| async move {
			let ip = ctx.ip().map(|ip| ip.to_string()).unwrap_or_default();
			(ctx, ip)
		}),
	);

	let request = Request::builder()
		.method("GET")
		.uri("/")
		.header("x-forwarded-for", "1.1.1.1, 2.2.2.2, 3.3.3.3")
		.body(Body::empty())
		.unwrap();

	let remote: SocketAddr = "10.0.0.1:9000".parse().unwrap();
	let response = app.handle(request, Some(remote), false).await;
	assert_eq!(body_bytes(response).await, b"1.1.1.1");
}

#[tokio::test]
async fn json_body_parser_rejects_a_request_over_the_configured_limit() {
	let mut app = Application::new();
	app.router_mut().use_all(json(JsonOptions::default().limit(100)));
	app.router_mut().post(
		"/",
		handler(|ctx: RequestContext| async move {
			let echoed = ctx.body_json().map(|v| v.to_string()).unwrap_or_default();
			(ctx, echoed)
		}),
	);

	let request = Request::builder()
		.method("POST")
		.uri("/")
		.header(http::header::CONTENT_TYPE, "application/json")
		.header(http::header::CONTENT_LENGTH, "200")
		.body(Body::empty())
		.unwrap();

	let response = app.handle(request, None, false).await;
	assert_eq!(response.status(), http::StatusCode::PAYLOAD_TOO_LARGE);

	let body = body_bytes(response).await;
	let needle = b"entity.too.large";
	assert!(body.windows(needle.len()).any(|w| w == needle));
}
