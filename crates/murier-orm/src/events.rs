//! Lifecycle event dispatch.
//!
//! Listeners are synchronous and fire in registration order. For one
//! entity within a flush the order is fixed:
//! `pre_state_transition → pre_X → (DB write) → post_X →
//! post_state_transition`, and `post_flush` fires at most once per
//! successful flush, after commit.

use crate::changeset::ChangeSet;
use crate::entity::EntityRef;
use crate::state::EntityState;
use std::sync::Arc;

/// Hooks into the unit-of-work lifecycle. Every method has a no-op
/// default, so listeners implement only what they observe.
pub trait EntityListener: Send + Sync {
	fn pre_flush(&self) {}
	fn post_flush(&self) {}

	fn pre_persist(&self, _entity: &EntityRef) {}
	fn post_persist(&self, _entity: &EntityRef) {}

	fn pre_update(&self, _entity: &EntityRef, _changes: &ChangeSet) {}
	fn post_update(&self, _entity: &EntityRef) {}

	fn pre_remove(&self, _entity: &EntityRef) {}
	fn post_remove(&self, _entity: &EntityRef) {}

	/// `None` on either side stands for the untracked state.
	fn pre_state_transition(
		&self,
		_entity: &EntityRef,
		_from: Option<EntityState>,
		_to: Option<EntityState>,
	) {
	}
	fn post_state_transition(
		&self,
		_entity: &EntityRef,
		_from: Option<EntityState>,
		_to: Option<EntityState>,
	) {
	}
}

/// Registration-ordered fan-out to listeners.
#[derive(Default, Clone)]
pub struct EventBus {
	listeners: Vec<Arc<dyn EntityListener>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, listener: Arc<dyn EntityListener>) {
		self.listeners.push(listener);
	}

	pub fn pre_flush(&self) {
		for listener in &self.listeners {
			listener.pre_flush();
		}
	}

	pub fn post_flush(&self) {
		for listener in &self.listeners {
			listener.post_flush();
		}
	}

	pub fn pre_persist(&self, entity: &EntityRef) {
		for listener in &self.listeners {
			listener.pre_persist(entity);
		}
	}

	pub fn post_persist(&self, entity: &EntityRef) {
		for listener in &self.listeners {
			listener.post_persist(entity);
		}
	}

	pub fn pre_update(&self, entity: &EntityRef, changes: &ChangeSet) {
		for listener in &self.listeners {
			listener.pre_update(entity, changes);
		}
	}

	pub fn post_update(&self, entity: &EntityRef) {
		for listener in &self.listeners {
			listener.post_update(entity);
		}
	}

	pub fn pre_remove(&self, entity: &EntityRef) {
		for listener in &self.listeners {
			listener.pre_remove(entity);
		}
	}

	pub fn post_remove(&self, entity: &EntityRef) {
		for listener in &self.listeners {
			listener.post_remove(entity);
		}
	}

	pub fn pre_state_transition(
		&self,
		entity: &EntityRef,
		from: Option<EntityState>,
		to: Option<EntityState>,
	) {
		for listener in &self.listeners {
			listener.pre_state_transition(entity, from, to);
		}
	}

	pub fn post_state_transition(
		&self,
		entity: &EntityRef,
		from: Option<EntityState>,
		to: Option<EntityState>,
	) {
		for listener in &self.listeners {
			listener.post_state_transition(entity, from, to);
		}
	}
}
