//! th-types: value objects shared by every other Trans-Hub crate.
//!
//! Nothing in here talks to a database, an engine, or the network. This
//! crate is the vocabulary (§4.1 Core Types): the translation status
//! machine, the tagged engine result, the context spec, and the two DTOs
//! that cross the persistence/coordinator boundary.

pub mod constants;
pub mod context;
pub mod engine_result;
pub mod items;
pub mod status;

pub use constants::GLOBAL_CONTEXT_SENTINEL;
pub use context::ContextSpec;
pub use engine_result::EngineResult;
pub use items::{ContentItem, TranslationResult};
pub use status::TranslationStatus;
