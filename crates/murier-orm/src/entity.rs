//! The accessor contract between user-owned entity values and the unit of
//! work.
//!
//! Entities are plain values owned by application code, shared with the
//! unit of work behind `Arc<RwLock<_>>`. The unit of work reads them
//! through [`Entity`]'s property accessors and never mutates them except
//! to assign the primary key after an insert.

use crate::identity::PkValue;
use indexmap::IndexMap;
use murier_metadata::entity::EntityMetadata;
use murier_metadata::value::PropertyValue;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

/// A tracked entity as the unit of work sees it.
pub type EntityRef = Arc<RwLock<dyn Entity>>;

/// Contract implemented by every mapped entity type.
pub trait Entity: Send + Sync + 'static {
	/// The registered type name.
	fn entity_name() -> &'static str
	where
		Self: Sized;

	/// Build the metadata declaration for this type, registered at startup.
	fn metadata() -> EntityMetadata
	where
		Self: Sized;

	/// Object-safe access to the type name.
	fn type_name(&self) -> &'static str;

	/// The primary-key value, when assigned.
	fn primary_key(&self) -> Option<PkValue>;

	/// Assign or clear the primary key. Called by the unit of work after an
	/// insert (and to unwind a failed flush); applications never call it.
	fn set_primary_key(&mut self, pk: Option<PkValue>);

	/// Read one property in application form.
	fn get(&self, property: &str) -> PropertyValue;

	/// Write one property. Used when hydrating and merging.
	fn set(&mut self, property: &str, value: PropertyValue);

	/// Construct an instance from hydrated property values.
	fn hydrate(values: &IndexMap<String, PropertyValue>) -> Self
	where
		Self: Sized;

	/// The target of a to-one relation property, when one is set.
	fn related(&self, _property: &str) -> Option<ManagedRef> {
		None
	}

	/// Pending additions/removals of a to-many relation property.
	fn relation_delta(&self, _property: &str) -> Option<CollectionDelta> {
		None
	}

	/// Forget all pending collection deltas. Called after a successful flush.
	fn commit_relation_deltas(&mut self) {}
}

/// A shared entity reference carrying both its trait-object view and a
/// typed handle that can be recovered with [`ManagedRef::downcast`].
#[derive(Clone)]
pub struct ManagedRef {
	pub entity: EntityRef,
	typed: Arc<dyn Any + Send + Sync>,
}

impl ManagedRef {
	pub fn new<E: Entity>(handle: &Arc<RwLock<E>>) -> Self {
		let entity: EntityRef = handle.clone();
		Self {
			entity,
			typed: Arc::new(Arc::clone(handle)),
		}
	}

	/// Recover the typed handle, when `E` is the entity's concrete type.
	pub fn downcast<E: Entity>(&self) -> Option<Arc<RwLock<E>>> {
		self.typed.downcast_ref::<Arc<RwLock<E>>>().cloned()
	}

	/// Stable per-instance key, valid while the entity is alive.
	pub fn ptr_key(&self) -> usize {
		Arc::as_ptr(&self.entity) as *const () as usize
	}
}

impl std::fmt::Debug for ManagedRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ManagedRef")
			.field("ptr", &self.ptr_key())
			.finish()
	}
}

/// Wrap a plain entity value for sharing with a unit of work.
pub fn shared<E: Entity>(entity: E) -> Arc<RwLock<E>> {
	Arc::new(RwLock::new(entity))
}

/// Pending mutations of one tracked to-many collection.
#[derive(Default)]
pub struct CollectionDelta {
	pub added: Vec<ManagedRef>,
	pub removed: Vec<ManagedRef>,
}

impl CollectionDelta {
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty()
	}
}
