//! Flush ordering.
//!
//! Tables involved in a flush are ordered topologically along declared
//! foreign keys, referenced tables first. Self-referential edges never
//! enter the graph (those columns resolve through the second UPDATE
//! pass), and when a cross-table cycle remains, edges whose foreign-key
//! column is nullable are dropped the same way. A cycle that survives
//! both breaks is unresolvable.

use crate::error::OrmError;
use murier_metadata::registry::MetadataRegistry;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Order the given tables so every foreign-key target precedes its owner.
///
/// The order is deterministic for a given table set: nodes enter the
/// graph sorted by name, and the sort is stable across runs.
pub fn order_tables(
	registry: &MetadataRegistry,
	tables: &BTreeSet<String>,
) -> Result<Vec<String>, OrmError> {
	let order = try_order(registry, tables, false)?;
	if let Some(order) = order {
		return Ok(order);
	}
	debug!("foreign-key cycle detected, retrying without nullable edges");
	match try_order(registry, tables, true)? {
		Some(order) => Ok(order),
		None => Err(OrmError::CyclicDependency {
			cycle: describe_cycle(registry, tables)?,
		}),
	}
}

fn try_order(
	registry: &MetadataRegistry,
	tables: &BTreeSet<String>,
	skip_nullable: bool,
) -> Result<Option<Vec<String>>, OrmError> {
	let (graph, _) = build_graph(registry, tables, skip_nullable)?;
	match toposort(&graph, None) {
		Ok(sorted) => Ok(Some(
			sorted.into_iter().map(|node| graph[node].clone()).collect(),
		)),
		Err(_) => Ok(None),
	}
}

fn build_graph(
	registry: &MetadataRegistry,
	tables: &BTreeSet<String>,
	skip_nullable: bool,
) -> Result<(DiGraph<String, ()>, HashMap<String, NodeIndex>), OrmError> {
	let mut graph = DiGraph::new();
	let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
	for table in tables {
		nodes.insert(table.clone(), graph.add_node(table.clone()));
	}
	for table in tables {
		let metadata = registry.entity_for_table(table)?;
		for fk in &metadata.foreign_keys {
			if fk.referenced_table == *table {
				continue;
			}
			if skip_nullable {
				let nullable = metadata
					.column_by_name(&fk.column)
					.is_some_and(|c| c.nullable);
				if nullable {
					continue;
				}
			}
			if let Some(&referenced) = nodes.get(&fk.referenced_table) {
				graph.add_edge(referenced, nodes[table], ());
			}
		}
	}
	Ok((graph, nodes))
}

fn describe_cycle(
	registry: &MetadataRegistry,
	tables: &BTreeSet<String>,
) -> Result<String, OrmError> {
	let (graph, _) = build_graph(registry, tables, true)?;
	let mut cycles: Vec<String> = tarjan_scc(&graph)
		.into_iter()
		.filter(|component| component.len() > 1)
		.map(|component| {
			let mut names: Vec<String> =
				component.iter().map(|&node| graph[node].clone()).collect();
			names.sort();
			names.join(" -> ")
		})
		.collect();
	cycles.sort();
	Ok(cycles.join("; "))
}

#[cfg(test)]
mod tests {
	use super::*;
	use murier_metadata::builder::EntityMetadataBuilder;
	use murier_metadata::column::ColumnMetadata;
	use murier_metadata::foreign_key::ForeignKeyMetadata;
	use murier_metadata::registry::MetadataRegistryBuilder;
	use murier_metadata::types::{ColumnKey, ColumnType};

	fn pk() -> ColumnMetadata {
		ColumnMetadata::new("id", "id", ColumnType::Int)
			.unsigned(true)
			.with_key(ColumnKey::Primary)
			.with_extra("auto_increment")
	}

	fn registry_with_chain() -> MetadataRegistry {
		// orders -> users -> units
		MetadataRegistryBuilder::new()
			.register(
				EntityMetadataBuilder::new("Unit")
					.table("units")
					.column(pk())
					.build()
					.unwrap(),
			)
			.register(
				EntityMetadataBuilder::new("User")
					.table("users")
					.column(pk())
					.column(
						ColumnMetadata::new("unitId", "unit_id", ColumnType::Int).unsigned(true),
					)
					.foreign_key(ForeignKeyMetadata::new("unit_id", "units", "id"))
					.build()
					.unwrap(),
			)
			.register(
				EntityMetadataBuilder::new("Order")
					.table("orders")
					.column(pk())
					.column(
						ColumnMetadata::new("userId", "user_id", ColumnType::Int).unsigned(true),
					)
					.foreign_key(ForeignKeyMetadata::new("user_id", "users", "id"))
					.build()
					.unwrap(),
			)
			.build()
			.unwrap()
	}

	#[test]
	fn chain_orders_referenced_first() {
		let registry = registry_with_chain();
		let tables: BTreeSet<String> = ["orders", "users", "units"]
			.iter()
			.map(|s| s.to_string())
			.collect();
		let order = order_tables(&registry, &tables).unwrap();
		let position = |t: &str| order.iter().position(|x| x == t).unwrap();
		assert!(position("units") < position("users"));
		assert!(position("users") < position("orders"));
	}

	#[test]
	fn self_reference_is_not_a_cycle() {
		let registry = MetadataRegistryBuilder::new()
			.register(
				EntityMetadataBuilder::new("User")
					.table("users")
					.column(pk())
					.column(
						ColumnMetadata::new("managerId", "manager_id", ColumnType::Int)
							.unsigned(true)
							.nullable(true),
					)
					.foreign_key(ForeignKeyMetadata::new("manager_id", "users", "id"))
					.build()
					.unwrap(),
			)
			.build()
			.unwrap();
		let tables: BTreeSet<String> = ["users".to_string()].into_iter().collect();
		assert_eq!(order_tables(&registry, &tables).unwrap(), vec!["users"]);
	}

	#[test]
	fn nullable_cycle_breaks() {
		// a.b_id (nullable) -> b, b.a_id (not null) -> a
		let registry = MetadataRegistryBuilder::new()
			.register(
				EntityMetadataBuilder::new("Alpha")
					.table("alpha")
					.column(pk())
					.column(
						ColumnMetadata::new("betaId", "beta_id", ColumnType::Int)
							.unsigned(true)
							.nullable(true),
					)
					.foreign_key(ForeignKeyMetadata::new("beta_id", "beta", "id"))
					.build()
					.unwrap(),
			)
			.register(
				EntityMetadataBuilder::new("Beta")
					.table("beta")
					.column(pk())
					.column(
						ColumnMetadata::new("alphaId", "alpha_id", ColumnType::Int).unsigned(true),
					)
					.foreign_key(ForeignKeyMetadata::new("alpha_id", "alpha", "id"))
					.build()
					.unwrap(),
			)
			.build()
			.unwrap();
		let tables: BTreeSet<String> = ["alpha".to_string(), "beta".to_string()]
			.into_iter()
			.collect();
		let order = order_tables(&registry, &tables).unwrap();
		assert_eq!(order, vec!["alpha", "beta"]);
	}

	#[test]
	fn non_nullable_cycle_fails() {
		let registry = MetadataRegistryBuilder::new()
			.register(
				EntityMetadataBuilder::new("Alpha")
					.table("alpha")
					.column(pk())
					.column(
						ColumnMetadata::new("betaId", "beta_id", ColumnType::Int).unsigned(true),
					)
					.foreign_key(ForeignKeyMetadata::new("beta_id", "beta", "id"))
					.build()
					.unwrap(),
			)
			.register(
				EntityMetadataBuilder::new("Beta")
					.table("beta")
					.column(pk())
					.column(
						ColumnMetadata::new("alphaId", "alpha_id", ColumnType::Int).unsigned(true),
					)
					.foreign_key(ForeignKeyMetadata::new("alpha_id", "alpha", "id"))
					.build()
					.unwrap(),
			)
			.build()
			.unwrap();
		let tables: BTreeSet<String> = ["alpha".to_string(), "beta".to_string()]
			.into_iter()
			.collect();
		let err = order_tables(&registry, &tables).unwrap_err();
		match err {
			OrmError::CyclicDependency { cycle } => {
				assert!(cycle.contains("alpha"));
				assert!(cycle.contains("beta"));
			}
			other => panic!("expected cyclic dependency, got {other:?}"),
		}
	}
}
