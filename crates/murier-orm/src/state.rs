//! Entity lifecycle states and the legal transition table.

use crate::error::OrmError;

/// Lifecycle state of a tracked entity.
///
/// ```text
/// none      --persist-->     NEW
/// NEW       --flush insert-> MANAGED   (pk populated)
/// MANAGED   --remove-->      REMOVED
/// REMOVED   --flush delete-> none
/// MANAGED   --detach-->      DETACHED
/// DETACHED  --merge-->       MANAGED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
	/// Scheduled for insertion; primary key not yet assigned.
	New,
	/// Tracked with an assigned primary key.
	Managed,
	/// Scheduled for deletion on the next flush.
	Removed,
	/// No longer tracked; an independent instance.
	Detached,
}

/// Check a lifecycle move against the transition table. `None` stands for
/// the untracked state.
pub fn ensure_transition(
	from: Option<EntityState>,
	to: Option<EntityState>,
) -> Result<(), OrmError> {
	let legal = matches!(
		(from, to),
		(None, Some(EntityState::New))
			| (Some(EntityState::New), Some(EntityState::Managed))
			| (Some(EntityState::Managed), Some(EntityState::Removed))
			| (Some(EntityState::Removed), None)
			| (Some(EntityState::Managed), Some(EntityState::Detached))
			| (Some(EntityState::Detached), Some(EntityState::Managed))
	);
	if legal {
		Ok(())
	} else {
		Err(OrmError::InvalidStateTransition { from, to })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legal_moves_pass() {
		ensure_transition(None, Some(EntityState::New)).unwrap();
		ensure_transition(Some(EntityState::New), Some(EntityState::Managed)).unwrap();
		ensure_transition(Some(EntityState::Managed), Some(EntityState::Removed)).unwrap();
		ensure_transition(Some(EntityState::Removed), None).unwrap();
		ensure_transition(Some(EntityState::Managed), Some(EntityState::Detached)).unwrap();
		ensure_transition(Some(EntityState::Detached), Some(EntityState::Managed)).unwrap();
	}

	#[test]
	fn illegal_moves_fail() {
		assert!(matches!(
			ensure_transition(Some(EntityState::Detached), Some(EntityState::Removed)),
			Err(OrmError::InvalidStateTransition { .. })
		));
		assert!(matches!(
			ensure_transition(Some(EntityState::New), Some(EntityState::Removed)),
			Err(OrmError::InvalidStateTransition { .. })
		));
		assert!(matches!(
			ensure_transition(None, Some(EntityState::Managed)),
			Err(OrmError::InvalidStateTransition { .. })
		));
	}
}
