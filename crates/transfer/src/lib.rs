//! Turning a job into bytes on the wire.
//!
//! [`Serializer`] concatenates G-code lines while periodically reporting
//! progress and yielding to the runtime; [`MultipartForm`] wraps the result
//! in a `multipart/form-data` body.

mod multipart;
mod serializer;

pub use multipart::{MultipartBody, MultipartForm};
pub use serializer::Serializer;

/// Size of the slices an encoded body is streamed in: 64 KiB.
///
/// Upload progress is reported once per slice.
pub const BODY_CHUNK_SIZE: usize = 64 * 1024;
