//! Eviction policies for capacity-bounded caches.

use super::Entry;
use indexmap::IndexMap;

/// How a full cache picks the entry to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
	/// Least recently used: smallest access timestamp goes first.
	Lru,
	/// Least frequently used: fewest hits goes first, ties broken by recency.
	Lfu,
	/// First in, first out: earliest insertion goes first.
	Fifo,
}

impl EvictionPolicy {
	pub(super) fn select_victim<V>(&self, entries: &IndexMap<String, Entry<V>>) -> Option<String> {
		let mut victim: Option<(&String, &Entry<V>)> = None;
		for (key, entry) in entries {
			let replace = match victim {
				None => true,
				Some((_, best)) => match self {
					EvictionPolicy::Lru => entry.touched_at < best.touched_at,
					EvictionPolicy::Lfu => {
						entry.hits < best.hits
							|| (entry.hits == best.hits && entry.touched_at < best.touched_at)
					}
					EvictionPolicy::Fifo => entry.inserted_at < best.inserted_at,
				},
			};
			if replace {
				victim = Some((key, entry));
			}
		}
		victim.map(|(key, _)| key.clone())
	}
}
