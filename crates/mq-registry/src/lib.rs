//! # mq-registry
//!
//! Entity types, entity persistence, and the apply routine that writes a
//! proposal's raw field values into a real entity.
//!
//! ## Key components
//!
//! - [`EntityRegistry`] — frozen table of moderatable types, with a
//!   reverse-reference lookup used to find dependent proposals
//! - [`EntityStore`] / [`TagStore`] — the persistence seam the moderation
//!   core talks to
//! - [`Applier`] — resolves relations, wraps file names, parses tags, and
//!   disambiguates unique text before issuing a partial write
//! - [`MemoryEntityStore`] — constraint-checking in-memory backend with
//!   JSON snapshots

pub mod apply;
pub mod backend;
pub mod error;
pub mod memory;
pub mod registry;
pub mod tags;

pub use apply::{
    disambiguate_slug, AppliedChange, Applier, ApplyOptions, PreparedWrite,
    DEFAULT_SLUG_MAX_ATTEMPTS, DEFAULT_SLUG_MAX_LENGTH,
};
pub use backend::{EntityRecord, EntityStore, TagStore, Visibility};
pub use error::{ApplyError, EntityStoreError, RegistryError};
pub use memory::MemoryEntityStore;
pub use registry::{EntityRegistry, Referrer, RegistryBuilder};
pub use tags::{format_tags, parse_tags};
