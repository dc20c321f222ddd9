//! ORM-level failures.

use crate::state::EntityState;
use murier_backends::BackendError;
use murier_core::exception::{CodecError, MetadataError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrmError {
	#[error(transparent)]
	Metadata(#[from] MetadataError),

	#[error(transparent)]
	Codec(#[from] CodecError),

	#[error(transparent)]
	Backend(#[from] BackendError),

	/// An illegal lifecycle move. `None` stands for the untracked state on
	/// either side of the transition table.
	#[error("invalid state transition {from:?} -> {to:?}")]
	InvalidStateTransition {
		from: Option<EntityState>,
		to: Option<EntityState>,
	},

	/// An unresolvable foreign-key cycle among the entities of one flush.
	#[error("cyclic foreign-key dependency: {cycle}")]
	CyclicDependency { cycle: String },

	/// A constraint error reported by the database during a flush, carrying
	/// the identity of the offending entity.
	#[error("constraint violation on `{entity}`: {source}")]
	ConstraintViolation {
		entity: String,
		#[source]
		source: BackendError,
	},

	/// A to-one reference to an entity that is neither persisted nor
	/// scheduled, so no foreign-key value can ever be produced for it.
	#[error("unresolved reference `{property}` on `{entity}`: target is not managed")]
	UnresolvedReference { entity: String, property: String },
}
