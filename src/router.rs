//! The dispatch algorithm: an ordered stack of layers walked by a cursor, rather than
//! an opaque `next` callback threaded through closures. Each layer decides whether the
//! cursor advances, jumps past a route, switches to the error channel, or the whole
//! dispatch resolves.

// ----------

use std::{collections::HashMap, sync::Arc};

use http::Method;
use tracing::trace;

use conduit_core::response::{BoxedErrorResponse, Response};

use crate::{
	error::{default_error_response, default_not_found},
	handler::{ErrorHandler, ErrorOutcome, Handler, HandlerOutcome},
	middleware::{BoxedParamHandler, Layer, LayerHandler},
	pattern::{Pattern, PatternFlags},
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// What running a mounted [`Router`] as a single middleware layer produced.
pub(crate) enum MountOutcome {
	Response(Response),
	FellThrough,
}

/// An ordered stack of middleware, routes, and error handlers, plus the per-name
/// parameter preprocessors registered with [`Router::param`].
pub struct Router {
	layers: Vec<Layer>,
	params: HashMap<String, Vec<BoxedParamHandler>>,
	sensitive: bool,
	strict: bool,
}

impl Router {
	pub fn new() -> Self {
		Self {
			layers: Vec::new(),
			params: HashMap::new(),
			sensitive: false,
			strict: false,
		}
	}

	pub fn set_case_sensitive(&mut self, value: bool) -> &mut Self {
		self.sensitive = value;
		self
	}

	pub fn set_strict(&mut self, value: bool) -> &mut Self {
		self.strict = value;
		self
	}

	fn flags(&self, end: bool) -> PatternFlags {
		PatternFlags {
			sensitive: self.sensitive,
			strict: self.strict,
			end,
		}
	}

	// --------------------------------------------------
	// Registration

	/// `router.use(path, middleware)` — a prefix-matched layer on the normal channel.
	pub fn use_mw(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		let pattern = Pattern::compile(path, self.flags(false)).expect("invalid middleware path pattern");

		self.layers.push(Layer {
			pattern,
			handler: LayerHandler::Middleware(Arc::new(handler)),
		});

		self
	}

	/// `router.use(middleware)` mounted at the root.
	pub fn use_all(&mut self, handler: impl Handler + 'static) -> &mut Self {
		self.use_mw("/", handler)
	}

	/// `router.use(path, subRouter)` — mounts a nested router at a prefix.
	pub fn use_router(&mut self, path: &str, router: Router) -> &mut Self {
		self.use_mw(path, MountedRouter(Arc::new(router)))
	}

	fn register_route(&mut self, method: Option<Method>, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
		let pattern = Pattern::compile(path, self.flags(true)).expect("invalid route path pattern");

		self.layers.push(Layer {
			pattern,
			handler: LayerHandler::Route { method, handler },
		});

		self
	}

	pub fn get(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::GET), path, Arc::new(handler))
	}

	pub fn post(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::POST), path, Arc::new(handler))
	}

	pub fn put(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::PUT), path, Arc::new(handler))
	}

	pub fn patch(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::PATCH), path, Arc::new(handler))
	}

	pub fn delete(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::DELETE), path, Arc::new(handler))
	}

	pub fn head(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::HEAD), path, Arc::new(handler))
	}

	pub fn options(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(Some(Method::OPTIONS), path, Arc::new(handler))
	}

	/// `router.all(path, handler)` — matches every method.
	pub fn all(&mut self, path: &str, handler: impl Handler + 'static) -> &mut Self {
		self.register_route(None, path, Arc::new(handler))
	}

	/// `router.use([path, ]errorHandler)` — an error-channel layer.
	pub fn use_error(&mut self, path: &str, handler: impl ErrorHandler + 'static) -> &mut Self {
		let pattern = Pattern::compile(path, self.flags(false)).expect("invalid error handler path pattern");

		self.layers.push(Layer {
			pattern,
			handler: LayerHandler::ErrorHandler(Arc::new(handler)),
		});

		self
	}

	/// Registers a parameter preprocessor for `:name`, run once per request the first
	/// time a matched route binds that name (scoped to this router).
	pub fn param(&mut self, name: &str, handler: impl crate::middleware::ParamHandler + 'static) -> &mut Self {
		self
			.params
			.entry(name.to_owned())
			.or_default()
			.push(Arc::new(handler));

		self
	}

	/// A fluent per-path builder: `router.route("/users/:id").get(h1).delete(h2)`.
	pub fn route<'r>(&'r mut self, path: &str) -> RouteBuilder<'r> {
		RouteBuilder {
			router: self,
			path: path.to_owned(),
		}
	}

	// --------------------------------------------------
	// Dispatch

	/// Entry point for a top-level `Application`.
	pub(crate) async fn dispatch(&self, ctx: RequestContext) -> Response {
		let (mut ctx, outcome) = self.run(ctx).await;

		let response = match outcome {
			Ok(MountOutcome::Response(response)) => response,
			Ok(MountOutcome::FellThrough) => default_not_found(&ctx),
			Err(error) => default_error_response(&ctx, error),
		};

		#[cfg(feature = "signed-cookies")]
		ctx.persist_session().await;

		let pending = std::mem::take(&mut ctx.pending);
		crate::response::finish(pending, response)
	}

	/// Runs this router's own layer stack. Returns `FellThrough` when no layer
	/// terminated the request (the caller decides what that means — a 404 at the top
	/// level, or "continue past the mount point" when nested).
	pub(crate) async fn run(
		&self,
		mut ctx: RequestContext,
	) -> (RequestContext, Result<MountOutcome, BoxedErrorResponse>) {
		let mut pending_error: Option<BoxedErrorResponse> = None;
		let mut cursor = 0usize;

		while cursor < self.layers.len() {
			let layer = &self.layers[cursor];

			let Some(path_match) = layer.pattern.matches(&ctx.path) else {
				cursor += 1;
				continue;
			};

			match (&layer.handler, pending_error.take()) {
				(LayerHandler::ErrorHandler(handler), Some(error)) => {
					let saved_path = ctx.path.clone();
					let saved_base_url = ctx.base_url.clone();
					bind_match(&mut ctx, &path_match);

					let (next_ctx, result) = handler.call(error, ctx).await;
					ctx = next_ctx;
					ctx.path = saved_path;
					ctx.base_url = saved_base_url;

					match result {
						Ok(ErrorOutcome::Response(response)) => {
							return (ctx, Ok(MountOutcome::Response(response)))
						}
						Ok(ErrorOutcome::Cleared) => {}
						Err(error) => pending_error = Some(error),
					}

					cursor += 1;
				}
				(_, Some(error)) => {
					// Not an error-handling layer: errors only stop at error handlers.
					pending_error = Some(error);
					cursor += 1;
				}
				(LayerHandler::ErrorHandler(_), None) => {
					// No pending error: error-handling layers are skipped.
					cursor += 1;
				}
				(LayerHandler::Middleware(handler), None) => {
					let saved_path = ctx.path.clone();
					let saved_base_url = ctx.base_url.clone();
					bind_match(&mut ctx, &path_match);

					let (next_ctx, param_result) = run_param_preprocessors(ctx, &self.params, &path_match).await;
					ctx = next_ctx;

					match param_result {
						Ok(ParamRunOutcome::Continue) => {}
						Ok(ParamRunOutcome::Response(response)) => {
							ctx.path = saved_path;
							ctx.base_url = saved_base_url;
							return (ctx, Ok(MountOutcome::Response(response)));
						}
						Err(error) => {
							ctx.path = saved_path;
							ctx.base_url = saved_base_url;
							pending_error = Some(error);
							cursor += 1;
							continue;
						}
					}

					let (next_ctx, result) = handler.call(ctx).await;
					ctx = next_ctx;
					ctx.path = saved_path;
					ctx.base_url = saved_base_url;

					match result {
						Ok(HandlerOutcome::Response(response)) => {
							return (ctx, Ok(MountOutcome::Response(response)))
						}
						Ok(HandlerOutcome::Next) | Ok(HandlerOutcome::NextRoute) => {}
						Err(error) => pending_error = Some(error),
					}

					cursor += 1;
				}
				(LayerHandler::Route { method, handler }, None) => {
					if let Some(method) = method {
						if method != ctx.method() {
							cursor += 1;
							continue;
						}
					}

					let saved_path = ctx.path.clone();
					let saved_base_url = ctx.base_url.clone();
					bind_match(&mut ctx, &path_match);

					let (next_ctx, param_result) = run_param_preprocessors(ctx, &self.params, &path_match).await;
					ctx = next_ctx;

					match param_result {
						Ok(ParamRunOutcome::Continue) => {}
						Ok(ParamRunOutcome::Response(response)) => return (ctx, Ok(MountOutcome::Response(response))),
						Err(error) => {
							ctx.path = saved_path;
							ctx.base_url = saved_base_url;
							pending_error = Some(error);
							cursor += 1;
							continue;
						}
					}

					let (next_ctx, result) = handler.call(ctx).await;
					ctx = next_ctx;
					ctx.path = saved_path;
					ctx.base_url = saved_base_url;

					match result {
						Ok(HandlerOutcome::Response(response)) => {
							return (ctx, Ok(MountOutcome::Response(response)))
						}
						Ok(HandlerOutcome::Next) | Ok(HandlerOutcome::NextRoute) => {}
						Err(error) => pending_error = Some(error),
					}

					cursor += 1;
				}
			}
		}

		trace!(fell_through = true, "router exhausted its layer stack");

		match pending_error {
			Some(error) => (ctx, Err(error)),
			None => (ctx, Ok(MountOutcome::FellThrough)),
		}
	}
}

impl Default for Router {
	fn default() -> Self {
		Self::new()
	}
}

fn bind_match(ctx: &mut RequestContext, path_match: &crate::pattern::PathMatch) {
	for (name, value) in &path_match.params {
		ctx.params.push((name.as_str().into_owned(), value.clone()));
	}

	let stripped = &ctx.path[..path_match.matched_len];
	ctx.base_url = format!("{}{}", ctx.base_url, stripped);
	ctx.path = ctx.path[path_match.matched_len..].to_owned();
	if ctx.path.is_empty() {
		ctx.path = "/".to_owned();
	}
}

/// What running the param preprocessors newly bound on this dispatch step produced.
pub(crate) enum ParamRunOutcome {
	Continue,
	Response(Response),
}

async fn run_param_preprocessors(
	mut ctx: RequestContext,
	params: &HashMap<String, Vec<BoxedParamHandler>>,
	path_match: &crate::pattern::PathMatch,
) -> (RequestContext, Result<ParamRunOutcome, BoxedErrorResponse>) {
	for (name, value) in &path_match.params {
		let name = name.as_str().into_owned();
		if ctx.bound_params.contains(&name) {
			continue;
		}
		ctx.bound_params.insert(name.clone());

		let Some(handlers) = params.get(&name) else {
			continue;
		};

		for handler in handlers {
			let (next_ctx, result) = handler.call(ctx, value.clone()).await;
			ctx = next_ctx;

			match result {
				Ok(crate::middleware::ParamOutcome::Continue) => {}
				Ok(crate::middleware::ParamOutcome::Response(response)) => {
					return (ctx, Ok(ParamRunOutcome::Response(response)))
				}
				Err(error) => return (ctx, Err(error)),
			}
		}
	}

	(ctx, Ok(ParamRunOutcome::Continue))
}

// --------------------------------------------------------------------------------
// Mounting a Router as a middleware layer

/// Wraps an `Arc<Router>` as a single [`Handler`], so a sub-router can be registered
/// with `Router::use_mw` like any other middleware. The router runs its own dispatch
/// loop; only when that loop exhausts without resolving does control (and any still
/// pending error) return to the mounting router to continue past the mount point.
pub(crate) struct MountedRouter(Arc<Router>);

impl Handler for MountedRouter {
	fn call(&self, ctx: RequestContext) -> conduit_core::BoxedFuture<(RequestContext, Result<HandlerOutcome, BoxedErrorResponse>)> {
		let router = Arc::clone(&self.0);

		Box::pin(async move {
			let (ctx, result) = router.run(ctx).await;

			match result {
				Ok(MountOutcome::Response(response)) => (ctx, Ok(HandlerOutcome::Response(response))),
				Ok(MountOutcome::FellThrough) => (ctx, Ok(HandlerOutcome::Next)),
				Err(error) => (ctx, Err(error)),
			}
		})
	}
}

// --------------------------------------------------------------------------------
// Fluent route builder

pub struct RouteBuilder<'r> {
	router: &'r mut Router,
	path: String,
}

impl<'r> RouteBuilder<'r> {
	pub fn get(self, handler: impl Handler + 'static) -> Self {
		self.router.get(&self.path, handler);
		self
	}

	pub fn post(self, handler: impl Handler + 'static) -> Self {
		self.router.post(&self.path, handler);
		self
	}

	pub fn put(self, handler: impl Handler + 'static) -> Self {
		self.router.put(&self.path, handler);
		self
	}

	pub fn patch(self, handler: impl Handler + 'static) -> Self {
		self.router.patch(&self.path, handler);
		self
	}

	pub fn delete(self, handler: impl Handler + 'static) -> Self {
		self.router.delete(&self.path, handler);
		self
	}

	pub fn all(self, handler: impl Handler + 'static) -> Self {
		self.router.all(&self.path, handler);
		self
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use std::sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	};

	use conduit_core::response::{IntoResponse, ResponseError};
	use http::StatusCode;

	use super::*;
	use crate::{
		application::AppContext,
		handler::{error_handler, handler, mw},
	};

	fn ctx(method: &str, path: &str) -> RequestContext {
		let request = conduit_core::request::Request::builder()
			.method(method)
			.uri(path)
			.body(conduit_core::body::Body::empty())
			.unwrap();

		RequestContext::new(request, None, false, Arc::new(AppContext::default()))
	}

	fn expect_response(outcome: Result<MountOutcome, BoxedErrorResponse>) -> Response {
		match outcome {
			Ok(MountOutcome::Response(response)) => response,
			Ok(MountOutcome::FellThrough) => panic!("expected a response, router fell through"),
			Err(_) => panic!("expected a response, got an unhandled error"),
		}
	}

	#[tokio::test]
	async fn param_extraction_and_method_filter() {
		let mut router = Router::new();
		router.get(
			"/users/:id/posts/:postId",
			handler(|ctx: RequestContext| async move {
				let id = ctx.param("id").unwrap().to_owned();
				let post_id = ctx.param("postId").unwrap().to_owned();
				(ctx, format!("{id}:{post_id}"))
			}),
		);

		let (_, outcome) = router.run(ctx("GET", "/users/42/posts/abc")).await;
		assert_eq!(expect_response(outcome).status(), StatusCode::OK);

		let (_, outcome) = router.run(ctx("POST", "/users/42/posts/abc")).await;
		assert!(matches!(outcome, Ok(MountOutcome::FellThrough)));
	}

	#[tokio::test]
	async fn middleware_mount_strips_prefix() {
		let mut sub = Router::new();
		sub.get(
			"/users",
			handler(|ctx: RequestContext| async move {
				assert_eq!(ctx.base_url(), "/api");
				assert_eq!(ctx.path(), "/users");
				(ctx, StatusCode::OK)
			}),
		);

		let mut root = Router::new();
		root.use_router("/api", sub);

		let ctx = ctx("GET", "/api/users");
		let (ctx, outcome) = root.run(ctx).await;
		assert_eq!(expect_response(outcome).status(), StatusCode::OK);
		// restored after the mounted subtree returns
		assert_eq!(ctx.base_url(), "");
		assert_eq!(ctx.path(), "/api/users");
	}

	#[tokio::test]
	async fn unmatched_mount_falls_through_to_404() {
		let mut sub = Router::new();
		sub.get("/users", handler(|ctx: RequestContext| async move { (ctx, StatusCode::OK) }));

		let mut root = Router::new();
		root.use_router("/api", sub);

		let (_, outcome) = root.run(ctx("GET", "/other")).await;
		assert!(matches!(outcome, Ok(MountOutcome::FellThrough)));
	}

	#[tokio::test]
	async fn error_channel_skips_intervening_middleware() {
		let ran_second_middleware = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&ran_second_middleware);

		let mut router = Router::new();
		router.use_all(mw(|ctx: RequestContext| async move {
			(ctx, Err::<HandlerOutcome, _>(ResponseError::from(StatusCode::INTERNAL_SERVER_ERROR)))
		}));
		router.use_all(mw(move |ctx: RequestContext| {
			let flag = Arc::clone(&flag);
			async move {
				flag.store(true, Ordering::SeqCst);
				(ctx, Ok::<_, ResponseError>(HandlerOutcome::Next))
			}
		}));
		router.use_error(
			"/",
			error_handler(|_err, ctx: RequestContext| async move {
				(
					ctx,
					Ok::<_, ResponseError>(ErrorOutcome::Response(StatusCode::INTERNAL_SERVER_ERROR.into_response())),
				)
			}),
		);

		let (_, outcome) = router.run(ctx("GET", "/")).await;
		assert_eq!(expect_response(outcome).status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(!ran_second_middleware.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn next_route_skips_remaining_handlers_in_the_same_route_only() {
		let ran_third = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&ran_third);

		let mut router = Router::new();
		router.get(
			"/items",
			crate::handler::chain(vec![
				Arc::new(mw(|ctx: RequestContext| async move {
					(ctx, Ok::<_, ResponseError>(HandlerOutcome::NextRoute))
				})) as Arc<dyn Handler>,
				Arc::new(mw(move |ctx: RequestContext| {
					let flag = Arc::clone(&flag);
					async move {
						flag.store(true, Ordering::SeqCst);
						(ctx, Ok::<_, ResponseError>(HandlerOutcome::Next))
					}
				})) as Arc<dyn Handler>,
			]),
		);
		router.get("/items", handler(|ctx: RequestContext| async move { (ctx, StatusCode::OK) }));

		let (_, outcome) = router.run(ctx("GET", "/items")).await;
		assert_eq!(expect_response(outcome).status(), StatusCode::OK);
		assert!(!ran_third.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn case_sensitive_router_distinguishes_casing() {
		let mut router = Router::new();
		router.set_case_sensitive(true);
		router.get("/Foo", handler(|ctx: RequestContext| async move { (ctx, StatusCode::OK) }));

		let (_, outcome) = router.run(ctx("GET", "/Foo")).await;
		assert_eq!(expect_response(outcome).status(), StatusCode::OK);

		let (_, outcome) = router.run(ctx("GET", "/foo")).await;
		assert!(matches!(outcome, Ok(MountOutcome::FellThrough)));
	}
}
