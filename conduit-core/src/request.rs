//! Request type aliases and the body-extractor trait.

// ----------

use std::future::Future;

use crate::{body::Body, response::BoxedErrorResponse};

// ----------

pub use http::request::Builder;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

pub type Request<B = Body> = http::request::Request<B>;
pub type RequestHeadParts = http::request::Parts;

// --------------------------------------------------
// FromRequest

/// A trait for types that can be extracted by consuming a request body.
///
/// Body-parser middleware in `conduit` populates `req.body` with a boxed value;
/// `FromRequest` is the lower-level trait those middleware are built on, kept public
/// so applications can write their own body-consuming extractors in the same style.
pub trait FromRequest<B = Body>: Sized {
	type Error: Into<BoxedErrorResponse>;

	fn from_request(
		head_parts: &mut RequestHeadParts,
		body: B,
	) -> impl Future<Output = Result<Self, Self::Error>> + Send;
}

// --------------------------------------------------------------------------------
