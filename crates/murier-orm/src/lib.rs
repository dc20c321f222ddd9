//! # Murier ORM
//!
//! The unit-of-work / change-tracking core: entities are plain values the
//! application owns; a [`UnitOfWork`] tracks their identity, lifecycle
//! state and original-value snapshots, computes minimal change sets, and
//! synchronizes them with MySQL in one atomic, topologically ordered
//! flush per call.
//!
//! The supporting pieces — identity map, state machine, tracked
//! collections, change detection, event bus, statement rendering and the
//! flush scheduler — live in their own modules and are reusable on their
//! own.

pub mod changeset;
pub mod collection;
pub mod entity;
pub mod error;
pub mod events;
pub mod identity;
pub mod renderer;
pub mod scheduler;
pub mod state;
pub mod uow;

pub use changeset::{ChangeDetector, ChangeSet, FieldChange, Snapshot};
pub use collection::TrackedCollection;
pub use entity::{CollectionDelta, Entity, EntityRef, ManagedRef, shared};
pub use error::OrmError;
pub use events::{EntityListener, EventBus};
pub use identity::{Identity, IdentityMap, PkValue};
pub use renderer::{SqlRenderer, Statement};
pub use state::{EntityState, ensure_transition};
pub use uow::UnitOfWork;
