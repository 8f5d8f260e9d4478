use std::{
	any::{Any, TypeId},
	fmt::{self, Display, Formatter},
};

use http::StatusCode;
use http_body_util::Full;

use crate::{body::Body, mark, BoxedError, StdError, SCOPE_VALIDITY};

use super::{BoxedErrorResponse, IntoResponse, Response};

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

// --------------------------------------------------
// ResponseError

/// A status code paired with an optional underlying error, used as the error type of
/// the final fallback and of any handler that only needs a status hint.
#[derive(Debug)]
pub struct ResponseError {
	status_code: StatusCode,
	some_boxed_error: Option<BoxedError>,
}

impl ResponseError {
	pub fn new<E>(status_code: StatusCode, error: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		ResponseError {
			status_code,
			some_boxed_error: Some(error.into()),
		}
	}

	pub fn from_error<E>(error: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		ResponseError {
			status_code: StatusCode::INTERNAL_SERVER_ERROR,
			some_boxed_error: Some(error.into()),
		}
	}

	pub fn status_code(&self) -> StatusCode {
		self.status_code
	}
}

impl From<StatusCode> for ResponseError {
	fn from(status_code: StatusCode) -> Self {
		ResponseError {
			status_code,
			some_boxed_error: None,
		}
	}
}

impl Display for ResponseError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]", self.status_code)?;

		if let Some(boxed_error) = self.some_boxed_error.as_ref() {
			write!(f, " {boxed_error}")?;
		}

		Ok(())
	}
}

impl StdError for ResponseError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self
			.some_boxed_error
			.as_ref()
			.map(|boxed_error| boxed_error.as_ref() as &(dyn StdError + 'static))
	}
}

impl IntoResponse for ResponseError {
	fn into_response(self) -> Response {
		let mut response = self.status_code.into_response();

		if let Some(boxed_error) = self.some_boxed_error {
			*response.body_mut() = Body::new(Full::from(boxed_error.to_string()));
		}

		response
	}
}

// --------------------------------------------------
// ErrorResponse

/// A type-erased, downcastable error that knows how to turn itself into a [`Response`].
///
/// This is what `next(err)` carries in spirit: an arbitrary error value, inspected only
/// for the conventional `status`/`statusCode`/`type` fields the router understands.
pub trait ErrorResponse: StdError + IntoResponse + 'static {
	#[doc(hidden)]
	fn concrete_type_id(&self, _: mark::Private) -> TypeId {
		TypeId::of::<Self>()
	}

	#[doc(hidden)]
	fn as_any(self: Box<Self>, _: mark::Private) -> Box<dyn Any>;

	#[doc(hidden)]
	fn as_any_ref(&self, _: mark::Private) -> &dyn Any;

	#[doc(hidden)]
	fn as_any_mut(&mut self, _: mark::Private) -> &mut dyn Any;

	#[doc(hidden)]
	fn into_response_boxed(self: Box<Self>, _: mark::Private) -> Response;
}

impl dyn ErrorResponse + 'static {
	pub fn implementor_type_id(&self) -> TypeId {
		ErrorResponse::concrete_type_id(self, mark::Private)
	}

	/// Renders a type-erased error into its final response, for the final fallback
	/// that runs when no error handler resolved it.
	pub fn render(self: Box<Self>) -> Response {
		ErrorResponse::into_response_boxed(self, mark::Private)
	}

	pub fn is<E: Any + 'static>(&self) -> bool {
		let self_id = ErrorResponse::concrete_type_id(self, mark::Private);
		let param_id = TypeId::of::<E>();

		self_id == param_id
	}

	pub fn downcast<E: Any + 'static>(self: Box<Self>) -> Result<Box<E>, Box<Self>> {
		if self.is::<E>() {
			Ok(self.as_any(mark::Private).downcast().expect(SCOPE_VALIDITY))
		} else {
			Err(self)
		}
	}

	pub fn downcast_ref<E: Any + 'static>(&self) -> Option<&E> {
		self.as_any_ref(mark::Private).downcast_ref()
	}

	pub fn downcast_mut<E: Any + 'static>(&mut self) -> Option<&mut E> {
		self.as_any_mut(mark::Private).downcast_mut()
	}
}

impl dyn ErrorResponse + Send + Sync + 'static {
	pub fn implementor_type_id(&self) -> TypeId {
		ErrorResponse::concrete_type_id(self, mark::Private)
	}

	/// Renders a type-erased error into its final response, for the final fallback
	/// that runs when no error handler resolved it.
	pub fn render(self: Box<Self>) -> Response {
		ErrorResponse::into_response_boxed(self, mark::Private)
	}

	pub fn is<E: Any + 'static>(&self) -> bool {
		let self_id = ErrorResponse::concrete_type_id(self, mark::Private);
		let param_id = TypeId::of::<E>();

		self_id == param_id
	}

	pub fn downcast<E: Any + 'static>(self: Box<Self>) -> Result<Box<E>, Box<Self>> {
		if self.is::<E>() {
			Ok(self.as_any(mark::Private).downcast().expect(SCOPE_VALIDITY))
		} else {
			Err(self)
		}
	}

	pub fn downcast_ref<E: Any + 'static>(&self) -> Option<&E> {
		self.as_any_ref(mark::Private).downcast_ref()
	}

	pub fn downcast_mut<E: Any + 'static>(&mut self) -> Option<&mut E> {
		self.as_any_mut(mark::Private).downcast_mut()
	}
}

impl<E> ErrorResponse for E
where
	E: StdError + IntoResponse + 'static,
{
	#[doc(hidden)]
	fn as_any(self: Box<Self>, _: mark::Private) -> Box<dyn Any> {
		self
	}

	#[doc(hidden)]
	fn as_any_ref(&self, _: mark::Private) -> &dyn Any {
		self
	}

	#[doc(hidden)]
	fn as_any_mut(&mut self, _: mark::Private) -> &mut dyn Any {
		self
	}

	#[doc(hidden)]
	fn into_response_boxed(self: Box<Self>, _: mark::Private) -> Response {
		(*self).into_response()
	}
}

impl<E: ErrorResponse + Send + Sync> From<E> for BoxedErrorResponse {
	fn from(error_response: E) -> Self {
		Box::new(error_response)
	}
}

// --------------------------------------------------------------------------------
