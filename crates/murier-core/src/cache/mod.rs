//! Keyed, taggable caches.
//!
//! Each cache holds string-keyed values, keeps a tag → key inverted index
//! so whole groups can be dropped at once, and evicts according to the
//! policy selected in its [`CacheConfig`] when capacity is reached.
//!
//! # Examples
//!
//! ```
//! use murier_core::cache::{CacheConfig, EvictionPolicy, TaggedCache};
//!
//! let cache: TaggedCache<String> = TaggedCache::new(CacheConfig {
//! 	capacity: 2,
//! 	policy: EvictionPolicy::Lru,
//! });
//! cache.set_tagged("users:1", "alice".to_string(), &["users"]);
//! cache.set_tagged("units:3", "ops".to_string(), &["units"]);
//! assert_eq!(cache.get("users:1"), Some("alice".to_string()));
//!
//! cache.invalidate_tag("users");
//! assert_eq!(cache.get("users:1"), None);
//! assert_eq!(cache.get("units:3"), Some("ops".to_string()));
//! ```

mod policy;

pub use policy::EvictionPolicy;

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Capacity and eviction policy for one cache instance.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
	/// Maximum number of live entries. Zero means unbounded.
	pub capacity: usize,
	pub policy: EvictionPolicy,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			capacity: 0,
			policy: EvictionPolicy::Lru,
		}
	}
}

#[derive(Debug, Clone)]
struct Entry<V> {
	value: V,
	tags: Vec<String>,
	inserted_at: u64,
	touched_at: u64,
	hits: u64,
}

#[derive(Debug)]
struct CacheState<V> {
	entries: IndexMap<String, Entry<V>>,
	by_tag: HashMap<String, HashSet<String>>,
	clock: u64,
}

/// String-keyed cache with tag invalidation and bounded capacity.
#[derive(Debug)]
pub struct TaggedCache<V> {
	config: CacheConfig,
	state: RwLock<CacheState<V>>,
}

impl<V: Clone> TaggedCache<V> {
	pub fn new(config: CacheConfig) -> Self {
		Self {
			config,
			state: RwLock::new(CacheState {
				entries: IndexMap::new(),
				by_tag: HashMap::new(),
				clock: 0,
			}),
		}
	}

	/// Fetch a value, updating recency and frequency bookkeeping.
	pub fn get(&self, key: &str) -> Option<V> {
		let mut state = self.state.write();
		state.clock += 1;
		let clock = state.clock;
		let entry = state.entries.get_mut(key)?;
		entry.touched_at = clock;
		entry.hits += 1;
		Some(entry.value.clone())
	}

	/// Insert a value with no tags.
	pub fn set(&self, key: &str, value: V) {
		self.set_tagged(key, value, &[]);
	}

	/// Insert a value under the given tags, evicting if at capacity.
	pub fn set_tagged(&self, key: &str, value: V, tags: &[&str]) {
		let mut state = self.state.write();
		state.clock += 1;
		let clock = state.clock;

		if !state.entries.contains_key(key)
			&& self.config.capacity > 0
			&& state.entries.len() >= self.config.capacity
		{
			if let Some(victim) = self.config.policy.select_victim(&state.entries) {
				Self::remove_entry(&mut state, &victim);
			}
		}

		if let Some(old) = state.entries.shift_remove(key) {
			Self::unindex_tags(&mut state, key, &old.tags);
		}
		let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
		for tag in &tags {
			state
				.by_tag
				.entry(tag.clone())
				.or_default()
				.insert(key.to_string());
		}
		state.entries.insert(
			key.to_string(),
			Entry {
				value,
				tags,
				inserted_at: clock,
				touched_at: clock,
				hits: 0,
			},
		);
	}

	/// Drop one entry. Returns whether it existed.
	pub fn delete(&self, key: &str) -> bool {
		let mut state = self.state.write();
		Self::remove_entry(&mut state, key)
	}

	/// Drop everything, including the tag index.
	pub fn clear(&self) {
		let mut state = self.state.write();
		state.entries.clear();
		state.by_tag.clear();
	}

	/// Drop every entry carrying the tag. Returns the number removed.
	pub fn invalidate_tag(&self, tag: &str) -> usize {
		let mut state = self.state.write();
		let keys: Vec<String> = state
			.by_tag
			.get(tag)
			.map(|set| set.iter().cloned().collect())
			.unwrap_or_default();
		let mut removed = 0;
		for key in keys {
			if Self::remove_entry(&mut state, &key) {
				removed += 1;
			}
		}
		removed
	}

	pub fn len(&self) -> usize {
		self.state.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().entries.is_empty()
	}

	fn remove_entry(state: &mut CacheState<V>, key: &str) -> bool {
		match state.entries.shift_remove(key) {
			Some(entry) => {
				Self::unindex_tags(state, key, &entry.tags);
				true
			}
			None => false,
		}
	}

	fn unindex_tags(state: &mut CacheState<V>, key: &str, tags: &[String]) {
		for tag in tags {
			if let Some(set) = state.by_tag.get_mut(tag) {
				set.remove(key);
				if set.is_empty() {
					state.by_tag.remove(tag);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lru(capacity: usize) -> TaggedCache<i32> {
		TaggedCache::new(CacheConfig {
			capacity,
			policy: EvictionPolicy::Lru,
		})
	}

	#[test]
	fn get_set_delete_roundtrip() {
		let cache = lru(0);
		cache.set("a", 1);
		assert_eq!(cache.get("a"), Some(1));
		assert!(cache.delete("a"));
		assert!(!cache.delete("a"));
		assert_eq!(cache.get("a"), None);
	}

	#[test]
	fn overwrite_replaces_tags() {
		let cache = lru(0);
		cache.set_tagged("a", 1, &["x"]);
		cache.set_tagged("a", 2, &["y"]);
		assert_eq!(cache.invalidate_tag("x"), 0);
		assert_eq!(cache.invalidate_tag("y"), 1);
		assert_eq!(cache.get("a"), None);
	}

	#[test]
	fn lru_evicts_least_recently_used() {
		let cache = lru(2);
		cache.set("a", 1);
		cache.set("b", 2);
		cache.get("a");
		cache.set("c", 3);
		assert_eq!(cache.get("b"), None);
		assert_eq!(cache.get("a"), Some(1));
		assert_eq!(cache.get("c"), Some(3));
	}

	#[test]
	fn lfu_evicts_least_frequently_used() {
		let cache = TaggedCache::new(CacheConfig {
			capacity: 2,
			policy: EvictionPolicy::Lfu,
		});
		cache.set("a", 1);
		cache.set("b", 2);
		cache.get("a");
		cache.get("a");
		cache.get("b");
		cache.set("c", 3);
		assert_eq!(cache.get("b"), None);
		assert_eq!(cache.get("a"), Some(1));
	}

	#[test]
	fn fifo_evicts_oldest_insertion() {
		let cache = TaggedCache::new(CacheConfig {
			capacity: 2,
			policy: EvictionPolicy::Fifo,
		});
		cache.set("a", 1);
		cache.set("b", 2);
		cache.get("a");
		cache.set("c", 3);
		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("b"), Some(2));
	}

	#[test]
	fn invalidate_tag_spares_other_tags() {
		let cache = lru(0);
		cache.set_tagged("u1", 1, &["users"]);
		cache.set_tagged("u2", 2, &["users"]);
		cache.set_tagged("t1", 3, &["units"]);
		assert_eq!(cache.invalidate_tag("users"), 2);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get("t1"), Some(3));
	}

	#[test]
	fn clear_empties_everything() {
		let cache = lru(0);
		cache.set_tagged("a", 1, &["x"]);
		cache.clear();
		assert!(cache.is_empty());
		assert_eq!(cache.invalidate_tag("x"), 0);
	}
}
