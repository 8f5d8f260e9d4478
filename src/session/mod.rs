//! Session lifecycle over a pluggable store: cookie <-> store id, regeneration,
//! destruction.
//!
//! The session cookie uses the same signed wire format as [`crate::cookies`], but
//! under its own secret and cookie name (`SessionConfig::secret`/`cookie_name`), kept
//! independent from the application's general cookie secret. Persisting the session is
//! not a layer in the normal middleware stack — the same way `express-session` patches
//! `res.end` to flush just before the response leaves, here [`RequestContext::persist_session`]
//! runs once, in [`crate::router::Router::dispatch`], right before the staged response
//! state is merged onto the final response.

// ----------

use std::{collections::HashMap, sync::Arc, time::{Duration, SystemTime}};

use base64::Engine;
use rand::RngCore;
use tracing::trace;

use conduit_core::BoxedFuture;

use crate::{
	cookies::CookieOptions,
	handler::{mw, Handler, HandlerOutcome},
	request::RequestContext,
};

pub mod memory;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

/// What a [`SessionStore`] persists for one session id.
#[derive(Debug, Clone)]
pub struct SessionRecord {
	pub data: HashMap<String, serde_json::Value>,
	pub expires_at: SystemTime,
}

/// Pluggable session storage backend. Expired records must not be returned from `get`.
/// Implementations must be safe under concurrent access; the core makes no stronger
/// guarantee than last-writer-wins across concurrent requests sharing one session id.
pub trait SessionStore: Send + Sync {
	fn get(&self, id: &str) -> BoxedFuture<Option<SessionRecord>>;
	fn set(&self, id: String, record: SessionRecord) -> BoxedFuture<()>;
	fn destroy(&self, id: &str) -> BoxedFuture<()>;
	fn touch(&self, id: &str, expires_at: SystemTime) -> BoxedFuture<()>;
	fn all(&self) -> BoxedFuture<Vec<String>>;
	fn length(&self) -> BoxedFuture<usize>;
	fn clear(&self) -> BoxedFuture<()>;
}

/// Configuration for [`session_middleware`], read-only once the application starts
/// serving and shared across every request via an `Arc`.
pub struct SessionConfig {
	pub cookie_name: String,
	pub secret: Vec<u8>,
	pub max_age: Duration,
	/// Persist a brand-new, unmodified session. `false` mirrors `express-session`'s
	/// `saveUninitialized: false`.
	pub save_uninitialized: bool,
	/// Re-persist a session that wasn't modified this request.
	pub resave: bool,
	/// Refresh the cookie's expiry on every response, even when the session store
	/// write itself was skipped.
	pub rolling: bool,
	pub path: String,
	pub http_only: bool,
	pub secure: bool,
	pub store: Arc<dyn SessionStore>,
}

impl SessionConfig {
	pub fn new(secret: impl Into<Vec<u8>>, store: Arc<dyn SessionStore>) -> Self {
		Self {
			cookie_name: "connect.sid".to_owned(),
			secret: secret.into(),
			max_age: Duration::from_secs(24 * 60 * 60),
			save_uninitialized: true,
			resave: true,
			rolling: false,
			path: "/".to_owned(),
			http_only: true,
			secure: false,
			store,
		}
	}

	pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
		self.cookie_name = name.into();
		self
	}

	pub fn max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;
		self
	}

	pub fn save_uninitialized(mut self, value: bool) -> Self {
		self.save_uninitialized = value;
		self
	}

	pub fn resave(mut self, value: bool) -> Self {
		self.resave = value;
		self
	}

	pub fn rolling(mut self, value: bool) -> Self {
		self.rolling = value;
		self
	}
}

fn generate_id() -> String {
	let mut bytes = [0u8; 24];
	rand::thread_rng().fill_bytes(&mut bytes);
	BASE64.encode(bytes)
}

// --------------------------------------------------------------------------------
// Session

/// The per-request session handle attached to `RequestContext` by [`session_middleware`].
/// The client only ever sees `id` (inside the signed cookie); `data` never crosses the
/// wire directly.
pub struct Session {
	id: String,
	is_new: bool,
	modified: bool,
	destroy_requested: bool,
	regenerate_requested: bool,
	data: HashMap<String, serde_json::Value>,
}

impl Session {
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn is_new(&self) -> bool {
		self.is_new
	}

	pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
		self.data.get(key)
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
		self.data.insert(key.into(), value.into());
		self.modified = true;
		self
	}

	pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
		self.modified = true;
		self.data.remove(key)
	}

	pub fn data(&self) -> &HashMap<String, serde_json::Value> {
		&self.data
	}

	/// Resets the expiry clock without otherwise marking the session modified (unless
	/// the store write that follows is itself triggered by `resave`/`rolling`).
	pub fn touch(&mut self) {
		self.modified = true;
	}

	/// Removes the store entry and clears the cookie when the response is finalized.
	pub fn destroy(&mut self) {
		self.destroy_requested = true;
	}

	/// Destroys the current store entry and assigns a fresh id, keeping the data
	/// gathered so far, when the response is finalized.
	pub fn regenerate(&mut self) {
		self.regenerate_requested = true;
		self.modified = true;
	}
}

// --------------------------------------------------------------------------------
// Middleware

fn raw_cookie(ctx: &RequestContext, name: &str) -> Option<String> {
	for header in ctx.headers().get_all(http::header::COOKIE) {
		let Ok(header_str) = header.to_str() else { continue };

		for (cookie_name, value) in crate::cookies::parse_cookie_header(header_str) {
			if cookie_name == name {
				return Some(value);
			}
		}
	}

	None
}

/// Builds the session middleware: on each request, resolves (or starts) a session and
/// attaches it to `ctx.session`. Persistence happens later, not here — see the module
/// documentation.
pub fn session_middleware(config: Arc<SessionConfig>) -> impl Handler {
	mw(move |mut ctx: RequestContext| {
		let config = Arc::clone(&config);

		async move {
			let now = SystemTime::now();

			let existing_id =
				raw_cookie(&ctx, &config.cookie_name).and_then(|raw| crate::cookies::verify_signed(&raw, &config.secret).ok());

			let session = match existing_id {
				Some(id) => match config.store.get(&id).await {
					Some(record) if record.expires_at > now => Session {
						id,
						is_new: false,
						modified: false,
						destroy_requested: false,
						regenerate_requested: false,
						data: record.data,
					},
					_ => {
						trace!(session_id = %id, "session record missing or expired, starting new session");
						Session {
							id,
							is_new: true,
							modified: false,
							destroy_requested: false,
							regenerate_requested: false,
							data: HashMap::new(),
						}
					}
				},
				None => Session {
					id: generate_id(),
					is_new: true,
					modified: false,
					destroy_requested: false,
					regenerate_requested: false,
					data: HashMap::new(),
				},
			};

			ctx.session = Some(session);
			ctx.session_config = Some(config);

			let outcome: Result<HandlerOutcome, conduit_core::response::BoxedErrorResponse> = Ok(HandlerOutcome::Next);
			(ctx, outcome)
		}
	})
}

impl RequestContext {
	/// Decides whether to persist the session and stages the signed session cookie,
	/// per the save/resave/rolling rules. Called once, by `Router::dispatch`, after the
	/// layer stack has run and before the staged response state is merged in.
	pub(crate) async fn persist_session(&mut self) {
		let Some(config) = self.session_config.take() else {
			return;
		};
		let Some(mut session) = self.session.take() else {
			return;
		};

		if session.destroy_requested {
			config.store.destroy(&session.id).await;
			self.clear_cookie(&config.cookie_name, Some(&config.path), None);
			return;
		}

		if session.regenerate_requested {
			config.store.destroy(&session.id).await;
			session.id = generate_id();
			session.is_new = true;
		}

		let should_write = if session.is_new {
			config.save_uninitialized || session.modified
		} else {
			config.resave || session.modified
		};

		if should_write {
			let expires_at = SystemTime::now() + config.max_age;
			config
				.store
				.set(
					session.id.clone(),
					SessionRecord { data: session.data.clone(), expires_at },
				)
				.await;
		} else if config.rolling {
			config.store.touch(&session.id, SystemTime::now() + config.max_age).await;
		} else {
			return;
		}

		let signed = crate::cookies::sign(&session.id, &config.secret);
		self.cookie(
			&config.cookie_name,
			signed,
			CookieOptions::default()
				.path(config.path.clone())
				.http_only(config.http_only)
				.secure(config.secure)
				.max_age(config.max_age),
		);
	}
}

// --------------------------------------------------------------------------------
