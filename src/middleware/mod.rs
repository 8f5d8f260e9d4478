//! Layers: the unit the router dispatch loop steps through.

// ----------

use std::{future::Future, sync::Arc};

use http::Method;

use conduit_core::{response::BoxedErrorResponse, response::Response, BoxedFuture};

use crate::{
	handler::{BoxedErrorHandler, BoxedHandler},
	pattern::Pattern,
	request::RequestContext,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub(crate) enum LayerHandler {
	Middleware(BoxedHandler),
	Route {
		method: Option<Method>,
		handler: BoxedHandler,
	},
	ErrorHandler(BoxedErrorHandler),
}

/// A single entry in a [`crate::router::Router`]'s stack: a compiled pattern plus the
/// handler to run when it matches. `next('route')` is handled within
/// [`crate::handler::chain`] rather than at this level.
pub(crate) struct Layer {
	pub(crate) pattern: Pattern,
	pub(crate) handler: LayerHandler,
}

// --------------------------------------------------------------------------------
// Param preprocessors (`router.param(name, ...)`)

pub enum ParamOutcome {
	Continue,
	Response(Response),
}

pub type ParamHandlerFuture = BoxedFuture<(RequestContext, Result<ParamOutcome, BoxedErrorResponse>)>;

pub trait ParamHandler: Send + Sync {
	fn call(&self, ctx: RequestContext, value: String) -> ParamHandlerFuture;
}

pub(crate) type BoxedParamHandler = Arc<dyn ParamHandler>;

struct ParamHandlerFn<F>(F);

impl<F, Fut, E> ParamHandler for ParamHandlerFn<F>
where
	F: Fn(RequestContext, String) -> Fut + Send + Sync,
	Fut: Future<Output = (RequestContext, Result<ParamOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	fn call(&self, ctx: RequestContext, value: String) -> ParamHandlerFuture {
		let fut = (self.0)(ctx, value);
		Box::pin(async move {
			let (ctx, result) = fut.await;
			(ctx, result.map_err(Into::into))
		})
	}
}

/// Wraps a closure as a param preprocessor for `Router::param`.
pub fn param_fn<F, Fut, E>(f: F) -> impl ParamHandler
where
	F: Fn(RequestContext, String) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = (RequestContext, Result<ParamOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	ParamHandlerFn(f)
}

// --------------------------------------------------------------------------------
