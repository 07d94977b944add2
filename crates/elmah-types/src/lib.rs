//! Foundation types for ELMAH error logs.
//!
//! This crate provides the domain snapshot of a single failure event and the
//! small value types it is built from. Every other ELMAH crate depends on
//! `elmah-types`.
//!
//! # Key Types
//!
//! - [`CapturedError`] -- Immutable snapshot of one failure event
//! - [`ExceptionInfo`] -- Flattened, acyclic exception chain (outermost first)
//! - [`NameValueCollection`] -- Ordered multimap for request data
//! - [`ErrorId`] -- Externally-visible identifier assigned at log time
//! - [`ErrorParam`] / [`LogMessageEntry`] -- Auxiliary diagnostic lists

pub mod collection;
pub mod error;
pub mod exception;
pub mod id;
pub mod record;

pub use collection::NameValueCollection;
pub use error::TypeError;
pub use exception::{ExceptionInfo, MAX_EXCEPTION_DEPTH};
pub use id::ErrorId;
pub use record::{CapturedError, ErrorParam, LogMessageEntry};
