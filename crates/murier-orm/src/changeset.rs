//! Snapshots and change detection.
//!
//! Snapshots hold codec-normalized column values, so comparisons inherit
//! the codec's precision rules: decimals at declared scale, datetimes at
//! second resolution, binary byte-wise, JSON structurally.

use crate::entity::{CollectionDelta, Entity};
use crate::error::OrmError;
use indexmap::IndexMap;
use murier_metadata::codec::ValueCodec;
use murier_metadata::entity::EntityMetadata;
use murier_metadata::value::ColumnValue;

/// Last-observed persisted state of one entity, keyed by property.
pub type Snapshot = IndexMap<String, ColumnValue>;

/// One scalar modification.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
	pub old: ColumnValue,
	pub new: ColumnValue,
}

/// The minimal description of modifications to a single managed entity
/// since its snapshot.
#[derive(Default)]
pub struct ChangeSet {
	/// property → (old, new), in declaration order.
	pub fields: IndexMap<String, FieldChange>,
	/// to-many relation property → pending collection delta.
	pub collections: IndexMap<String, CollectionDelta>,
}

impl ChangeSet {
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty() && self.collections.values().all(CollectionDelta::is_empty)
	}

	pub fn has_field_changes(&self) -> bool {
		!self.fields.is_empty()
	}
}

impl std::fmt::Debug for ChangeSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChangeSet")
			.field("fields", &self.fields)
			.field("collections", &self.collections.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Computes snapshots and change sets by reading entities through their
/// accessor contract.
pub struct ChangeDetector;

impl ChangeDetector {
	/// Capture the codec-normalized current state of every column.
	pub fn snapshot(entity: &dyn Entity, metadata: &EntityMetadata) -> Result<Snapshot, OrmError> {
		let mut snapshot = Snapshot::new();
		for column in &metadata.columns {
			let value = ValueCodec::to_column(&entity.get(&column.property), column)?;
			snapshot.insert(column.property.clone(), value);
		}
		Ok(snapshot)
	}

	/// Compare current field values against a snapshot.
	///
	/// The primary key never appears in the change set; collection deltas
	/// come straight from the entity's tracked collections.
	pub fn compute(
		entity: &dyn Entity,
		metadata: &EntityMetadata,
		snapshot: &Snapshot,
	) -> Result<ChangeSet, OrmError> {
		let mut changes = ChangeSet::default();
		for column in &metadata.columns {
			if column.is_primary() {
				continue;
			}
			// Join columns backed by a live relation target resolve at
			// write time, once the target's primary key exists.
			let relation_backed = metadata
				.relations
				.iter()
				.filter(|r| r.join_column.as_deref() == Some(column.name.as_str()))
				.any(|r| entity.related(&r.property).is_some());
			if relation_backed {
				continue;
			}
			let current = ValueCodec::to_column(&entity.get(&column.property), column)?;
			let old = snapshot
				.get(&column.property)
				.cloned()
				.unwrap_or(ColumnValue::Null);
			if current != old {
				changes.insert_field(&column.property, old, current);
			}
		}
		for relation in metadata.to_many_relations() {
			if let Some(delta) = entity.relation_delta(&relation.property) {
				if !delta.is_empty() {
					changes.collections.insert(relation.property.clone(), delta);
				}
			}
		}
		Ok(changes)
	}
}

impl ChangeSet {
	fn insert_field(&mut self, property: &str, old: ColumnValue, new: ColumnValue) {
		self.fields
			.insert(property.to_string(), FieldChange { old, new });
	}
}
