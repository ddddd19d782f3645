//! Shared primitives for Sluice crates

mod error;

pub use error::{ErrorBody, ErrorPayload, HttpError};
