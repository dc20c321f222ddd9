//! Identity of managed entities and the per-unit-of-work identity map.

use std::collections::HashMap;
use std::fmt;

/// A primary-key value. Composite keys are out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PkValue {
	Int(i64),
	Str(String),
}

impl fmt::Display for PkValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PkValue::Int(v) => write!(f, "{v}"),
			PkValue::Str(s) => f.write_str(s),
		}
	}
}

impl From<i64> for PkValue {
	fn from(v: i64) -> Self {
		PkValue::Int(v)
	}
}

impl From<i32> for PkValue {
	fn from(v: i32) -> Self {
		PkValue::Int(i64::from(v))
	}
}

impl From<u64> for PkValue {
	fn from(v: u64) -> Self {
		PkValue::Int(v as i64)
	}
}

impl From<&str> for PkValue {
	fn from(v: &str) -> Self {
		PkValue::Str(v.to_string())
	}
}

impl From<String> for PkValue {
	fn from(v: String) -> Self {
		PkValue::Str(v)
	}
}

/// `(type, primary key)` identity of a managed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
	pub type_name: String,
	pub pk: PkValue,
}

impl Identity {
	pub fn new(type_name: impl Into<String>, pk: impl Into<PkValue>) -> Self {
		Self {
			type_name: type_name.into(),
			pk: pk.into(),
		}
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.type_name, self.pk)
	}
}

/// Maps identities to instance slots. At most one live instance exists per
/// identity while its primary key is assigned; the map is local to one
/// unit of work and never shared.
#[derive(Debug, Default)]
pub struct IdentityMap {
	slots: HashMap<Identity, usize>,
}

impl IdentityMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an identity. Returns the previously mapped slot when the
	/// identity was already present (the caller decides whether that is a
	/// replacement or a bug).
	pub fn insert(&mut self, identity: Identity, slot: usize) -> Option<usize> {
		self.slots.insert(identity, slot)
	}

	pub fn get(&self, identity: &Identity) -> Option<usize> {
		self.slots.get(identity).copied()
	}

	pub fn contains(&self, identity: &Identity) -> bool {
		self.slots.contains_key(identity)
	}

	pub fn remove(&mut self, identity: &Identity) -> Option<usize> {
		self.slots.remove(identity)
	}

	pub fn clear(&mut self) {
		self.slots.clear();
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}
