//! Cairn World -- the world-object layer of the Cairn engine.
//!
//! Long-lived simulation objects are spawned by type name. Each class
//! registers once with the [`EntityFactory`](factory::EntityFactory), which
//! runs its constructor in describe mode to discover the components it
//! declares; the resulting [`ClassDefaultObject`](cdo::ClassDefaultObject)
//! records the class layout and the ordered component schema.
//!
//! The layout is a contract: an instance's own state occupies the first
//! `class_size` bytes of its storage, and its declared components live in a
//! window immediately after it, sub-allocated by the object's
//! [`ComponentArena`](arena::ComponentArena). Object plus components form
//! one contiguous, cache-friendly block.
//!
//! # Quick Start
//!
//! ```
//! use cairn_world::prelude::*;
//!
//! struct Lantern {
//!     core: ObjectCore,
//!     fuel: ComponentBox<f32>,
//! }
//!
//! impl WorldObject for Lantern {
//!     fn core(&self) -> &ObjectCore {
//!         &self.core
//!     }
//!     fn core_mut(&mut self) -> &mut ObjectCore {
//!         &mut self.core
//!     }
//! }
//!
//! impl EntityClass for Lantern {
//!     fn construct(builder: &mut ObjectBuilder<'_>) -> Self {
//!         let fuel = builder.new_component(100.0f32);
//!         Lantern { core: builder.finish(false), fuel }
//!     }
//! }
//!
//! let mut factory = EntityFactory::new();
//! factory.register_class::<Lantern>("Lantern");
//!
//! let cdo = factory.cdo("Lantern");
//! assert_eq!(cdo.class_size(), std::mem::size_of::<Lantern>());
//! assert_eq!(cdo.components().len(), 1);
//! ```
//!
//! Everything is single-threaded; an external world manager owns spawning,
//! ticking, and the destroy sweep.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod arena;
pub mod cdo;
#[allow(unsafe_code)]
pub mod factory;
pub mod id;
pub mod object;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the world layer.
///
/// Contract violations (unknown class names, duplicate registration,
/// misaligned storage, malformed component layouts) panic immediately
/// instead of surfacing here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The id generator ran out of ids.
    #[error("id space exhausted: every id up to {limit} is or was in use")]
    IdSpaceExhausted {
        limit: u64,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::arena::{ComponentArena, ComponentBox};
    pub use crate::cdo::{ClassDefaultObject, ComponentMetadata};
    pub use crate::factory::EntityFactory;
    pub use crate::id::IdGenerator;
    pub use crate::object::{
        EntityClass, ObjectBuilder, ObjectCore, ObjectRef, PendingDestroyNotifier, WorldObject,
    };
    pub use crate::WorldError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
