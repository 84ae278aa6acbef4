#![allow(clippy::must_use_candidate)]

mod document;
mod error;
pub mod refs;

pub use document::Document;
pub use error::SurfaceError;
