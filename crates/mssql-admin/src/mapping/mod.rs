//! Row tracking through entity models synthesized at runtime.
//!
//! - [`model`]: descriptors, schema signatures and the model cache
//! - [`entity`]: the in-memory tracked row and its snapshots
//! - [`session`]: a tracked row bound to its live connection
//! - [`engine`]: the mapping backend

pub mod engine;
pub mod entity;
pub mod model;
pub mod session;

pub use engine::{tracking_key, MappedEngine, MAPPED_PROVIDER};
pub use entity::{EntityState, TrackedEntity, TrackingSnapshot};
pub use model::{entity_name, EntityModel, ModelCache, SchemaSignature, TrackingModelDescriptor};
pub use session::RowTrackingSession;
