//! Durable state for surveys and uploaded blobs.
//!
//! - [`document`]: the survey/response document, rewritten on every mutation.
//! - [`blob`]: a key/value blob store namespaced by prefix.

pub mod blob;
pub mod document;

pub use blob::LocalBlobStore;
pub use document::{JsonFileStore, MemoryStore, SurveyDb, SurveyStore};
