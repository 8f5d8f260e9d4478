//! A small hyper-based server that drives [`Application::handle`] for each accepted
//! connection, with graceful shutdown on `Ctrl+C`/`SIGTERM`.

// ----------

use std::{io::Error as IoError, net::ToSocketAddrs, pin::pin, sync::Arc, time::Duration};

use hyper::{body::Incoming, service::Service};
use hyper_util::{
	rt::{TokioExecutor, TokioIo},
	server::{conn::auto::Builder, graceful::GracefulShutdown},
};
use tokio::net::TcpListener;

use conduit_core::{body::Body, request::Request, response::Response};

use crate::{application::Application, common::ImplError};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// Wraps an [`Application`] behind the [`hyper::service::Service`] trait hyper's
/// connection builder expects, recording the peer address and TLS status of the
/// connection it was cloned for.
#[derive(Clone)]
struct ApplicationService {
	app: Arc<Application>,
	remote_addr: Option<std::net::SocketAddr>,
	is_tls: bool,
}

impl Service<Request<Incoming>> for ApplicationService {
	type Response = Response;
	type Error = std::convert::Infallible;
	type Future = conduit_core::BoxedFuture<Result<Response, std::convert::Infallible>>;

	fn call(&self, request: Request<Incoming>) -> Self::Future {
		let app = Arc::clone(&self.app);
		let remote_addr = self.remote_addr;
		let is_tls = self.is_tls;

		Box::pin(async move {
			let request = request.map(Body::new);
			Ok(app.handle(request, remote_addr, is_tls).await)
		})
	}
}

// --------------------------------------------------------------------------------
// Server

/// Serves an [`Application`] over plain HTTP, accepting connections on the first
/// address in `listener_addresses` that can be bound.
pub struct Server {
	connection_builder: Builder<TokioExecutor>,
	some_shutdown_duration: Option<Duration>,
}

impl Server {
	pub fn new() -> Self {
		Self {
			connection_builder: Builder::new(TokioExecutor::new()),
			some_shutdown_duration: None,
		}
	}

	/// Bounds how long in-flight connections are given to finish after a shutdown
	/// signal arrives. Without this, shutdown is immediate.
	pub fn with_graceful_shutdown_duration(mut self, duration: Duration) -> Self {
		self.some_shutdown_duration = Some(duration);
		self
	}

	/// Binds `listener_addresses` and serves `app` until `Ctrl+C`/`SIGTERM`.
	///
	/// # Panics
	/// If none of `listener_addresses` can be bound.
	pub async fn serve<A>(&self, app: Application, listener_addresses: A) -> Result<(), ServerError>
	where
		A: ToSocketAddrs,
	{
		let app = Arc::new(app);

		let mut addresses = listener_addresses.to_socket_addrs()?;
		let some_listener = loop {
			let Some(address) = addresses.next() else {
				panic!("no valid address with an unbound port given");
			};

			if let Ok(listener) = TcpListener::bind(address).await {
				break Some(listener);
			}
		};

		let Some(listener) = some_listener else {
			panic!("no valid address with an unbound port given");
		};

		let mut accept_error_count = 0;
		let mut pinned_ctrl_c = pin!(tokio::signal::ctrl_c());

		#[cfg(unix)]
		let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("couldn't get the unix signal listener");

		#[cfg(unix)]
		let mut pinned_terminate = pin!(signal.recv());

		#[cfg(not(unix))]
		let mut pinned_terminate = pin!(std::future::pending::<()>());

		let graceful_shutdown_watcher = GracefulShutdown::new();

		loop {
			tokio::select! {
				connection = listener.accept() => {
					match connection {
						Ok((stream, peer_address)) => {
							let service = ApplicationService {
								app: Arc::clone(&app),
								remote_addr: Some(peer_address),
								is_tls: false,
							};

							let connection = self
								.connection_builder
								.serve_connection_with_upgrades(TokioIo::new(stream), service);

							let connection = graceful_shutdown_watcher.watch(connection.into_owned());

							tokio::spawn(connection);
						}
						Err(error) => {
							tokio::time::sleep(Duration::from_secs(1)).await;

							if accept_error_count < 3 {
								accept_error_count += 1;
								continue;
							}

							return Err(ServerError::from(error));
						}
					}
				},
				_ = pinned_ctrl_c.as_mut() => break,
				_ = pinned_terminate.as_mut() => break,
			}
		}

		if let Some(duration) = self.some_shutdown_duration {
			tokio::select! {
				_ = graceful_shutdown_watcher.shutdown() => {},
				_ = tokio::time::sleep(duration) => {},
			}
		}

		Ok(())
	}
}

impl Default for Server {
	fn default() -> Self {
		Self::new()
	}
}

// --------------------------------------------------------------------------------

#[derive(Debug, ImplError)]
#[error(transparent)]
pub struct ServerError(#[from] IoError);
