//! Mutation-tracked to-many collections.

use crate::entity::{CollectionDelta, Entity, ManagedRef};
use parking_lot::RwLock;
use std::sync::Arc;

/// Holder for a to-many relation that records additions and removals as
/// they happen, so change detection never needs a structural comparison.
pub struct TrackedCollection<E: Entity> {
	items: Vec<Arc<RwLock<E>>>,
	added: Vec<Arc<RwLock<E>>>,
	removed: Vec<Arc<RwLock<E>>>,
}

impl<E: Entity> Default for TrackedCollection<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: Entity> TrackedCollection<E> {
	pub fn new() -> Self {
		Self {
			items: Vec::new(),
			added: Vec::new(),
			removed: Vec::new(),
		}
	}

	/// Build a collection from already-persisted items; hydration does not
	/// count as mutation.
	pub fn from_items(items: Vec<Arc<RwLock<E>>>) -> Self {
		Self {
			items,
			added: Vec::new(),
			removed: Vec::new(),
		}
	}

	pub fn add(&mut self, item: Arc<RwLock<E>>) {
		if self.contains(&item) {
			return;
		}
		self.items.push(Arc::clone(&item));
		// Re-adding something removed in this session cancels the removal.
		if let Some(pos) = self.removed.iter().position(|r| Arc::ptr_eq(r, &item)) {
			self.removed.swap_remove(pos);
		} else {
			self.added.push(item);
		}
	}

	pub fn remove(&mut self, item: &Arc<RwLock<E>>) -> bool {
		let Some(pos) = self.items.iter().position(|i| Arc::ptr_eq(i, item)) else {
			return false;
		};
		self.items.remove(pos);
		if let Some(added_pos) = self.added.iter().position(|a| Arc::ptr_eq(a, item)) {
			self.added.swap_remove(added_pos);
		} else {
			self.removed.push(Arc::clone(item));
		}
		true
	}

	pub fn contains(&self, item: &Arc<RwLock<E>>) -> bool {
		self.items.iter().any(|i| Arc::ptr_eq(i, item))
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<RwLock<E>>> {
		self.items.iter()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Items added since the last snapshot point.
	pub fn added(&self) -> &[Arc<RwLock<E>>] {
		&self.added
	}

	/// Items removed since the last snapshot point.
	pub fn removed(&self) -> &[Arc<RwLock<E>>] {
		&self.removed
	}

	/// The pending delta in unit-of-work form.
	pub fn delta(&self) -> CollectionDelta {
		CollectionDelta {
			added: self.added.iter().map(ManagedRef::new).collect(),
			removed: self.removed.iter().map(ManagedRef::new).collect(),
		}
	}

	/// Forget the pending delta; the current membership becomes the new
	/// snapshot point.
	pub fn commit(&mut self) {
		self.added.clear();
		self.removed.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::shared;
	use crate::identity::PkValue;
	use indexmap::IndexMap;
	use murier_metadata::builder::EntityMetadataBuilder;
	use murier_metadata::column::ColumnMetadata;
	use murier_metadata::entity::EntityMetadata;
	use murier_metadata::types::{ColumnKey, ColumnType};
	use murier_metadata::value::PropertyValue;

	struct Tag {
		id: Option<i64>,
		label: String,
	}

	impl Entity for Tag {
		fn entity_name() -> &'static str {
			"Tag"
		}

		fn metadata() -> EntityMetadata {
			EntityMetadataBuilder::new("Tag")
				.column(
					ColumnMetadata::new("id", "id", ColumnType::Int)
						.unsigned(true)
						.with_key(ColumnKey::Primary)
						.with_extra("auto_increment"),
				)
				.column(ColumnMetadata::new("label", "label", ColumnType::VarChar).with_length(64))
				.build()
				.expect("valid tag metadata")
		}

		fn type_name(&self) -> &'static str {
			"Tag"
		}

		fn primary_key(&self) -> Option<PkValue> {
			self.id.map(PkValue::Int)
		}

		fn set_primary_key(&mut self, pk: Option<PkValue>) {
			self.id = match pk {
				Some(PkValue::Int(v)) => Some(v),
				_ => None,
			};
		}

		fn get(&self, property: &str) -> PropertyValue {
			match property {
				"id" => self.id.into(),
				"label" => PropertyValue::String(self.label.clone()),
				_ => PropertyValue::Null,
			}
		}

		fn set(&mut self, property: &str, value: PropertyValue) {
			match (property, value) {
				("id", PropertyValue::Int(v)) => self.id = Some(v),
				("label", PropertyValue::String(s)) => self.label = s,
				_ => {}
			}
		}

		fn hydrate(values: &IndexMap<String, PropertyValue>) -> Self {
			let mut tag = Tag {
				id: None,
				label: String::new(),
			};
			for (property, value) in values {
				tag.set(property, value.clone());
			}
			tag
		}
	}

	#[test]
	fn add_and_remove_track_deltas() {
		let mut collection = TrackedCollection::new();
		let a = shared(Tag {
			id: None,
			label: "a".into(),
		});
		let b = shared(Tag {
			id: Some(2),
			label: "b".into(),
		});
		collection.add(Arc::clone(&a));
		collection.add(Arc::clone(&b));
		assert_eq!(collection.added().len(), 2);

		assert!(collection.remove(&a));
		assert_eq!(collection.added().len(), 1);
		assert!(collection.removed().is_empty());

		collection.commit();
		assert!(collection.remove(&b));
		assert_eq!(collection.removed().len(), 1);
	}

	#[test]
	fn re_adding_a_removed_item_cancels_the_removal() {
		let mut collection = TrackedCollection::new();
		let a = shared(Tag {
			id: Some(1),
			label: "a".into(),
		});
		collection.add(Arc::clone(&a));
		collection.commit();

		assert!(collection.remove(&a));
		collection.add(Arc::clone(&a));
		assert!(collection.added().is_empty());
		assert!(collection.removed().is_empty());
		assert_eq!(collection.len(), 1);
	}

	#[test]
	fn duplicate_add_is_ignored() {
		let mut collection = TrackedCollection::new();
		let a = shared(Tag {
			id: Some(1),
			label: "a".into(),
		});
		collection.add(Arc::clone(&a));
		collection.add(Arc::clone(&a));
		assert_eq!(collection.len(), 1);
		assert_eq!(collection.added().len(), 1);
	}
}
