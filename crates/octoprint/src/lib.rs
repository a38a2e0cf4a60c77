//! OctoPrint upload transport.
//!
//! Implements [`HttpTransport`](printpush_upload::HttpTransport) with
//! `reqwest`: the multipart body is streamed in slices so upload progress
//! can be reported, TLS failures and authentication challenges are
//! classified and signalled to the session.

pub mod client;

pub use client::{OctoPrintTransport, session};
