//! The [`Handler`] trait and the `next` continuation primitive.
//!
//! Per the design notes, `next` is implemented as a dispatcher loop (router::dispatch)
//! rather than as an opaque callback passed into user code: a handler is simply an
//! async function from a [`RequestContext`] to an updated context plus an outcome.
//! Returning the context by value (instead of borrowing it) sidesteps the lifetime
//! gymnastics of an async closure that borrows its argument, at the cost of handlers
//! having to hand the context back — the same tradeoff `RequestContext` -> `Request`
//! round-tripping makes in `argan`'s own `Handler::handle`.

// ----------

use std::{future::Future, sync::Arc};

use conduit_core::{response::BoxedErrorResponse, response::IntoResponseResult, BoxedFuture};

use crate::request::RequestContext;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// What a handler decided to do after running.
pub enum HandlerOutcome {
	/// Terminates the dispatch for this request.
	Response(conduit_core::response::Response),
	/// Resume the non-error channel at the next layer (`next()`).
	Next,
	/// Skip the remainder of the current route's handlers (`next('route')`).
	NextRoute,
}

pub type HandlerFuture = BoxedFuture<(RequestContext, Result<HandlerOutcome, BoxedErrorResponse>)>;

/// A layer in the normal channel: middleware or a terminal route handler.
pub trait Handler: Send + Sync {
	fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
	fn call(&self, ctx: RequestContext) -> HandlerFuture {
		(**self).call(ctx)
	}
}

pub(crate) type BoxedHandler = Arc<dyn Handler>;

// --------------------------------------------------
// Error channel

/// What an error handler decided to do after running.
pub enum ErrorOutcome {
	/// Terminates the dispatch for this request.
	Response(conduit_core::response::Response),
	/// Clears the pending error and resumes the normal channel (`next()`).
	Cleared,
}

pub type ErrorHandlerFuture =
	BoxedFuture<(RequestContext, Result<ErrorOutcome, BoxedErrorResponse>)>;

/// A layer in the error channel. `Err(e)` forwards a (possibly new) error onward
/// (`next(err)`); `Ok(Cleared)` rejoins the normal channel (`next()`).
pub trait ErrorHandler: Send + Sync {
	fn call(&self, err: BoxedErrorResponse, ctx: RequestContext) -> ErrorHandlerFuture;
}

impl<H: ErrorHandler + ?Sized> ErrorHandler for Arc<H> {
	fn call(&self, err: BoxedErrorResponse, ctx: RequestContext) -> ErrorHandlerFuture {
		(**self).call(err, ctx)
	}
}

pub(crate) type BoxedErrorHandler = Arc<dyn ErrorHandler>;

// --------------------------------------------------------------------------------
// Closure wrappers

/// A middleware handler built from an `async fn(RequestContext) -> (RequestContext,
/// Result<HandlerOutcome, E>)` closure. See [`mw`].
struct MiddlewareFn<F>(F);

impl<F, Fut, E> Handler for MiddlewareFn<F>
where
	F: Fn(RequestContext) -> Fut + Send + Sync,
	Fut: Future<Output = (RequestContext, Result<HandlerOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	fn call(&self, ctx: RequestContext) -> HandlerFuture {
		let fut = (self.0)(ctx);
		Box::pin(async move {
			let (ctx, result) = fut.await;
			(ctx, result.map_err(Into::into))
		})
	}
}

/// Wraps a closure as middleware: it receives the context and decides whether to
/// terminate, continue (`Next`), or skip the rest of the current route (`NextRoute`).
pub fn mw<F, Fut, E>(f: F) -> impl Handler
where
	F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = (RequestContext, Result<HandlerOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	MiddlewareFn(f)
}

/// A terminal route handler built from an `async fn(RequestContext) -> (RequestContext,
/// R)` closure where `R: IntoResponseResult`. Always produces `HandlerOutcome::Response`
/// (or propagates `R`'s error into the error channel) — it can never call `next`.
struct TerminalFn<F>(F);

impl<F, Fut, R> Handler for TerminalFn<F>
where
	F: Fn(RequestContext) -> Fut + Send + Sync,
	Fut: Future<Output = (RequestContext, R)> + Send + 'static,
	R: IntoResponseResult,
{
	fn call(&self, ctx: RequestContext) -> HandlerFuture {
		let fut = (self.0)(ctx);
		Box::pin(async move {
			let (ctx, result) = fut.await;
			match result.into_response_result() {
				Ok(response) => (ctx, Ok(HandlerOutcome::Response(response))),
				Err(error) => (ctx, Err(error)),
			}
		})
	}
}

/// Wraps a closure as a terminal route handler: it always produces a response (or an
/// error), and can never itself call `next`.
pub fn handler<F, Fut, R>(f: F) -> impl Handler
where
	F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = (RequestContext, R)> + Send + 'static,
	R: IntoResponseResult,
{
	TerminalFn(f)
}

// --------------------------------------------------

struct ErrorHandlerFn<F>(F);

impl<F, Fut, E> ErrorHandler for ErrorHandlerFn<F>
where
	F: Fn(BoxedErrorResponse, RequestContext) -> Fut + Send + Sync,
	Fut: Future<Output = (RequestContext, Result<ErrorOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	fn call(&self, err: BoxedErrorResponse, ctx: RequestContext) -> ErrorHandlerFuture {
		let fut = (self.0)(err, ctx);
		Box::pin(async move {
			let (ctx, result) = fut.await;
			(ctx, result.map_err(Into::into))
		})
	}
}

/// Wraps a closure as an error-channel handler.
pub fn error_handler<F, Fut, E>(f: F) -> impl ErrorHandler
where
	F: Fn(BoxedErrorResponse, RequestContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = (RequestContext, Result<ErrorOutcome, E>)> + Send + 'static,
	E: Into<BoxedErrorResponse>,
{
	ErrorHandlerFn(f)
}

// --------------------------------------------------------------------------------
// Chains (multiple handlers registered for one route)

/// Runs a fixed sequence of handlers for a single route, absorbing `next('route')`
/// internally: it stops running the sequence and reports `Next` to the enclosing
/// router, which is exactly "skip the rest of this route's handlers".
struct HandlerChain(Vec<Arc<dyn Handler>>);

impl Handler for HandlerChain {
	fn call(&self, ctx: RequestContext) -> HandlerFuture {
		let handlers = self.0.clone();
		Box::pin(async move {
			let mut ctx = ctx;
			for handler in handlers {
				let (next_ctx, result) = handler.call(ctx).await;
				ctx = next_ctx;

				match result {
					Ok(HandlerOutcome::Next) => continue,
					Ok(HandlerOutcome::NextRoute) => return (ctx, Ok(HandlerOutcome::Next)),
					other => return (ctx, other),
				}
			}

			(ctx, Ok(HandlerOutcome::Next))
		})
	}
}

/// Combines multiple handlers registered together for one route (`router.get(path,
/// chain(vec![h1, h2, h3]))`), so `next('route')` called from any of them skips only
/// the rest of this group.
pub fn chain(handlers: Vec<Arc<dyn Handler>>) -> impl Handler {
	HandlerChain(handlers)
}

// --------------------------------------------------------------------------------
