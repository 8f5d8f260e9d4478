//! The top-level `Application`: settings, the root router, and the entry point the
//! server hands each incoming request to.

// ----------

use std::{
	collections::HashMap,
	net::SocketAddr,
	sync::{Arc, OnceLock},
};

use tracing::instrument;

use conduit_core::response::Response;

use crate::{
	request::{
		trust_proxy::{TrustProxy, TrustProxySetting},
		RequestContext,
	},
	router::Router,
};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
	Development,
	Production,
	Custom(String),
}

impl Environment {
	pub fn is_production(&self) -> bool {
		matches!(self, Environment::Production)
	}

	fn from_str(value: &str) -> Self {
		match value {
			"development" => Environment::Development,
			"production" => Environment::Production,
			other => Environment::Custom(other.to_owned()),
		}
	}
}

impl Default for Environment {
	fn default() -> Self {
		std::env::var("CONDUIT_ENV")
			.or_else(|_| std::env::var("NODE_ENV"))
			.map(|value| Environment::from_str(&value))
			.unwrap_or(Environment::Development)
	}
}

/// An arbitrary application setting, as stored by `Application::set`.
#[derive(Clone)]
pub enum SettingValue {
	Bool(bool),
	Number(f64),
	String(String),
	Json(serde_json::Value),
}

impl SettingValue {
	fn as_bool(&self) -> Option<bool> {
		match self {
			SettingValue::Bool(b) => Some(*b),
			_ => None,
		}
	}

	fn as_number(&self) -> Option<f64> {
		match self {
			SettingValue::Number(n) => Some(*n),
			_ => None,
		}
	}

	fn as_str(&self) -> Option<&str> {
		match self {
			SettingValue::String(s) => Some(s),
			_ => None,
		}
	}
}

impl From<bool> for SettingValue {
	fn from(value: bool) -> Self {
		SettingValue::Bool(value)
	}
}

impl From<&str> for SettingValue {
	fn from(value: &str) -> Self {
		SettingValue::String(value.to_owned())
	}
}

impl From<String> for SettingValue {
	fn from(value: String) -> Self {
		SettingValue::String(value)
	}
}

impl From<usize> for SettingValue {
	fn from(value: usize) -> Self {
		SettingValue::Number(value as f64)
	}
}

/// The compiled, immutable-per-listen view of an application's settings, shared with
/// every [`RequestContext`] via an `Arc`.
pub struct AppContext {
	pub(crate) env: Environment,
	pub(crate) trust_proxy: TrustProxy,
	pub(crate) json_spaces: usize,
	pub(crate) json_escape: bool,
	pub(crate) x_powered_by: bool,
	pub(crate) case_sensitive_routing: bool,
	pub(crate) strict_routing: bool,
	pub(crate) subdomain_offset: usize,
	pub(crate) cookie_secret: Option<Vec<u8>>,
	pub(crate) locals: Arc<http::Extensions>,
}

impl Default for AppContext {
	fn default() -> Self {
		Self {
			env: Environment::default(),
			trust_proxy: TrustProxy::default(),
			json_spaces: 0,
			json_escape: false,
			x_powered_by: true,
			case_sensitive_routing: false,
			strict_routing: false,
			subdomain_offset: 2,
			cookie_secret: None,
			locals: Arc::new(http::Extensions::new()),
		}
	}
}

// --------------------------------------------------------------------------------
// Settings

/// The mutable settings bag an `Application` is configured with before it starts
/// listening. `Application::set`/`get` dispatch the well-known keys (`"env"`,
/// `"trust proxy"`, `"json spaces"`, `"json escape"`, `"x-powered-by"`,
/// `"case sensitive routing"`, `"strict routing"`, `"subdomain offset"`) to typed
/// fields; anything else is stored generically, exactly as Express allows arbitrary
/// application settings.
#[derive(Default)]
struct Settings {
	env: Option<Environment>,
	trust_proxy: Option<TrustProxySetting>,
	json_spaces: Option<usize>,
	json_escape: Option<bool>,
	x_powered_by: Option<bool>,
	case_sensitive_routing: Option<bool>,
	strict_routing: Option<bool>,
	subdomain_offset: Option<usize>,
	cookie_secret: Option<Vec<u8>>,
	other: HashMap<String, SettingValue>,
}

impl Settings {
	fn compile(&self, locals: Arc<http::Extensions>) -> AppContext {
		let defaults = AppContext::default();

		AppContext {
			env: self.env.clone().unwrap_or(defaults.env),
			trust_proxy: self
				.trust_proxy
				.as_ref()
				.map(TrustProxy::compile)
				.unwrap_or_default(),
			json_spaces: self.json_spaces.unwrap_or(defaults.json_spaces),
			json_escape: self.json_escape.unwrap_or(defaults.json_escape),
			x_powered_by: self.x_powered_by.unwrap_or(defaults.x_powered_by),
			case_sensitive_routing: self
				.case_sensitive_routing
				.unwrap_or(defaults.case_sensitive_routing),
			strict_routing: self.strict_routing.unwrap_or(defaults.strict_routing),
			subdomain_offset: self.subdomain_offset.unwrap_or(defaults.subdomain_offset),
			cookie_secret: self.cookie_secret.clone(),
			locals,
		}
	}
}

// --------------------------------------------------------------------------------
// Application

/// The entry point: a root [`Router`] plus settings and per-process locals.
pub struct Application {
	router: Router,
	settings: Settings,
	locals: Arc<http::Extensions>,
	compiled: OnceLock<Arc<AppContext>>,
}

impl Application {
	pub fn new() -> Self {
		Self {
			router: Router::new(),
			settings: Settings::default(),
			locals: Arc::new(http::Extensions::new()),
			compiled: OnceLock::new(),
		}
	}

	pub fn router_mut(&mut self) -> &mut Router {
		&mut self.router
	}

	/// `app.locals` — a process-wide bag handlers can read via
	/// [`RequestContext::locals`]. Must be populated before the application starts
	/// serving requests; mutating it afterwards panics (mirrors the "settings are
	/// frozen once serving begins" rule in spec.md §5).
	pub fn locals_mut(&mut self) -> &mut http::Extensions {
		Arc::get_mut(&mut self.locals)
			.expect("Application::locals_mut called after the application started serving requests")
	}

	/// `app.set(name, value)` — well-known setting names are parsed into typed fields;
	/// anything else is stored under its literal key.
	pub fn set(&mut self, name: &str, value: impl Into<SettingValue>) -> &mut Self {
		let value = value.into();

		match name {
			"env" => {
				if let Some(s) = value.as_str() {
					self.settings.env = Some(Environment::from_str(s));
				}
			}
			"json spaces" => self.settings.json_spaces = value.as_number().map(|n| n as usize),
			"json escape" => self.settings.json_escape = value.as_bool(),
			"x-powered-by" => self.settings.x_powered_by = value.as_bool(),
			"case sensitive routing" => {
				self.settings.case_sensitive_routing = value.as_bool();
				if let Some(sensitive) = value.as_bool() {
					self.router.set_case_sensitive(sensitive);
				}
			}
			"strict routing" => {
				self.settings.strict_routing = value.as_bool();
				if let Some(strict) = value.as_bool() {
					self.router.set_strict(strict);
				}
			}
			"subdomain offset" => self.settings.subdomain_offset = value.as_number().map(|n| n as usize),
			_ => {
				self.settings.other.insert(name.to_owned(), value);
			}
		}

		self
	}

	pub fn set_trust_proxy(&mut self, setting: TrustProxySetting) -> &mut Self {
		self.settings.trust_proxy = Some(setting);
		self
	}

	pub fn set_cookie_secret(&mut self, secret: impl Into<Vec<u8>>) -> &mut Self {
		self.settings.cookie_secret = Some(secret.into());
		self
	}

	/// `app.get(name)` — reads back a setting, whether it was parsed into one of the
	/// well-known typed fields or stored generically.
	pub fn get(&self, name: &str) -> Option<SettingValue> {
		match name {
			"env" => self.settings.env.as_ref().map(|env| match env {
				Environment::Development => SettingValue::String("development".to_owned()),
				Environment::Production => SettingValue::String("production".to_owned()),
				Environment::Custom(value) => SettingValue::String(value.clone()),
			}),
			"json spaces" => self.settings.json_spaces.map(SettingValue::from),
			"json escape" => self.settings.json_escape.map(SettingValue::from),
			"x-powered-by" => self.settings.x_powered_by.map(SettingValue::from),
			"case sensitive routing" => self.settings.case_sensitive_routing.map(SettingValue::from),
			"strict routing" => self.settings.strict_routing.map(SettingValue::from),
			"subdomain offset" => self.settings.subdomain_offset.map(SettingValue::from),
			_ => self.settings.other.get(name).cloned(),
		}
	}

	/// `app.enabled(name)` / `app.disabled(name)`.
	pub fn enabled(&self, name: &str) -> bool {
		self.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
	}

	/// Compiles the current settings on the first call and dispatches a single request,
	/// reusing the compiled [`AppContext`] on every later call. Settings are expected to
	/// be frozen once serving begins (same rule [`Application::locals_mut`] enforces),
	/// so compiling once instead of per-request avoids redoing the `trust proxy`
	/// compilation and the `env`-variable lookup on every request. Shared by the
	/// hyper-based server in [`crate::server`] and by tests that drive the application
	/// directly without a socket.
	#[instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
	pub async fn handle(
		&self,
		request: conduit_core::request::Request,
		remote_addr: Option<SocketAddr>,
		is_tls: bool,
	) -> Response {
		let app_context = Arc::clone(
			self
				.compiled
				.get_or_init(|| Arc::new(self.settings.compile(Arc::clone(&self.locals)))),
		);

		let ctx = RequestContext::new(request, remote_addr, is_tls, app_context);

		let response = self.router.dispatch(ctx).await;

		self.finalize(response)
	}

	fn finalize(&self, mut response: Response) -> Response {
		if self.settings.x_powered_by.unwrap_or(true) {
			response
				.headers_mut()
				.insert("x-powered-by", http::HeaderValue::from_static("conduit"));
		}

		response
	}
}

impl Default for Application {
	fn default() -> Self {
		Self::new()
	}
}

// --------------------------------------------------------------------------------

#[cfg(test)]
mod test {
	use http_body_util::BodyExt;

	use super::*;
	use crate::{handler::handler, request::RequestContext};

	fn get(path: &str) -> conduit_core::request::Request {
		conduit_core::request::Request::builder()
			.method("GET")
			.uri(path)
			.body(conduit_core::body::Body::empty())
			.unwrap()
	}

	#[tokio::test]
	async fn locals_set_before_serving_are_readable_from_a_handler() {
		let mut app = Application::new();
		app.locals_mut().insert("build-7".to_owned());

		app.router_mut().get(
			"/",
			handler(|ctx: RequestContext| async move {
				let found = ctx.locals().get::<String>().cloned().unwrap_or_default();
				(ctx, found)
			}),
		);

		let response = app.handle(get("/"), None, false).await;
		assert_eq!(response.status(), http::StatusCode::OK);

		let body = response.into_body().collect().await.unwrap().to_bytes();
		assert_eq!(&body[..], b"build-7");
	}

	#[tokio::test]
	async fn case_sensitive_routing_setting_is_applied_to_the_root_router() {
		let mut app = Application::new();
		app.set("case sensitive routing", true);
		app
			.router_mut()
			.get("/Foo", handler(|ctx: RequestContext| async move { (ctx, http::StatusCode::OK) }));

		let hit = app.handle(get("/Foo"), None, false).await;
		assert_eq!(hit.status(), http::StatusCode::OK);

		let miss = app.handle(get("/foo"), None, false).await;
		assert_eq!(miss.status(), http::StatusCode::NOT_FOUND);
	}

	#[test]
	fn locals_mut_is_unavailable_while_a_compiled_context_still_holds_the_arc() {
		let mut app = Application::new();
		let compiled = app.settings.compile(Arc::clone(&app.locals));

		assert!(Arc::get_mut(&mut app.locals).is_none());

		drop(compiled);
		assert!(Arc::get_mut(&mut app.locals).is_some());
	}

	#[test]
	fn get_reads_back_a_well_known_typed_setting() {
		let mut app = Application::new();
		app.set("x-powered-by", false);
		assert!(!app.enabled("x-powered-by"));

		app.set("subdomain offset", 3usize);
		assert_eq!(app.get("subdomain offset").unwrap().as_number(), Some(3.0));
	}

	#[test]
	fn get_still_reads_back_a_generic_setting() {
		let mut app = Application::new();
		app.set("title", "conduit demo");
		assert_eq!(app.get("title").unwrap().as_str(), Some("conduit demo"));
	}
}
