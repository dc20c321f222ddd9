//! Relation declarations between entities.

/// Relation arity, from the owning side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
	OneToOne,
	OneToMany,
	ManyToOne,
	ManyToMany,
}

impl RelationKind {
	/// Whether the owning side holds a collection.
	pub fn is_to_many(&self) -> bool {
		matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
	}
}

/// Operations that propagate across the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeSet {
	pub persist: bool,
	pub remove: bool,
	pub detach: bool,
}

impl CascadeSet {
	pub const NONE: CascadeSet = CascadeSet {
		persist: false,
		remove: false,
		detach: false,
	};

	pub const ALL: CascadeSet = CascadeSet {
		persist: true,
		remove: true,
		detach: true,
	};

	pub fn persist() -> Self {
		CascadeSet {
			persist: true,
			..CascadeSet::NONE
		}
	}
}

/// Join table backing a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableMetadata {
	pub table: String,
	/// Column referencing the owning entity's primary key.
	pub owner_column: String,
	/// Column referencing the target entity's primary key.
	pub target_column: String,
}

/// One declared relation.
///
/// To-one relations (`ManyToOne`, owning `OneToOne`) carry a join column
/// on the owning table; `ManyToMany` carries a join table; `OneToMany` is
/// always the inverse side and carries neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMetadata {
	pub property: String,
	pub kind: RelationKind,
	pub target_entity: String,
	pub inverse_property: Option<String>,
	pub join_column: Option<String>,
	pub join_table: Option<JoinTableMetadata>,
	pub cascade: CascadeSet,
}

impl RelationMetadata {
	pub fn new(
		property: impl Into<String>,
		kind: RelationKind,
		target_entity: impl Into<String>,
	) -> Self {
		Self {
			property: property.into(),
			kind,
			target_entity: target_entity.into(),
			inverse_property: None,
			join_column: None,
			join_table: None,
			cascade: CascadeSet::NONE,
		}
	}

	pub fn inverse(mut self, property: impl Into<String>) -> Self {
		self.inverse_property = Some(property.into());
		self
	}

	pub fn join_column(mut self, column: impl Into<String>) -> Self {
		self.join_column = Some(column.into());
		self
	}

	pub fn join_table(mut self, join_table: JoinTableMetadata) -> Self {
		self.join_table = Some(join_table);
		self
	}

	pub fn cascade(mut self, cascade: CascadeSet) -> Self {
		self.cascade = cascade;
		self
	}
}
