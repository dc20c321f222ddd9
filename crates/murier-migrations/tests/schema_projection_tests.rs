//! Projection of declared metadata into the normalized schema form, and
//! diffing that projection against synthetic live schemas.

use murier_metadata::builder::EntityMetadataBuilder;
use murier_metadata::column::ColumnMetadata;
use murier_metadata::foreign_key::ForeignKeyMetadata;
use murier_metadata::index::IndexMetadata;
use murier_metadata::registry::{MetadataRegistry, MetadataRegistryBuilder};
use murier_metadata::types::{ColumnKey, ColumnType, ReferentialRule};
use murier_migrations::comparer::SchemaComparer;
use murier_migrations::renderer::DdlRenderer;
use murier_migrations::schema::DatabaseSchema;

fn registry() -> MetadataRegistry {
	MetadataRegistryBuilder::new()
		.register(
			EntityMetadataBuilder::new("Unit")
				.table("units")
				.column(
					ColumnMetadata::new("id", "id", ColumnType::Int)
						.unsigned(true)
						.with_key(ColumnKey::Primary)
						.with_extra("auto_increment"),
				)
				.column(ColumnMetadata::new("name", "name", ColumnType::VarChar).with_length(255))
				.build()
				.unwrap(),
		)
		.register(
			EntityMetadataBuilder::new("User")
				.table("users")
				.column(
					ColumnMetadata::new("id", "id", ColumnType::Int)
						.unsigned(true)
						.with_key(ColumnKey::Primary)
						.with_extra("auto_increment"),
				)
				.column(
					ColumnMetadata::new("username", "username", ColumnType::VarChar)
						.with_length(255)
						.with_key(ColumnKey::Unique),
				)
				.column(
					ColumnMetadata::new("unitId", "unit_id", ColumnType::Int)
						.unsigned(true)
						.nullable(true),
				)
				.foreign_key(
					ForeignKeyMetadata::new("unit_id", "units", "id")
						.on_delete(ReferentialRule::SetNull),
				)
				.index(IndexMetadata::new(
					"idx_users_unit_id",
					vec!["unit_id".to_string()],
					false,
				))
				.build()
				.unwrap(),
		)
		.build()
		.unwrap()
}

#[test]
fn projection_keeps_declaration_order_and_names() {
	let schema = DatabaseSchema::from_registry(&registry());
	assert_eq!(
		schema.tables.keys().collect::<Vec<_>>(),
		vec!["units", "users"]
	);

	let users = &schema.tables["users"];
	let columns: Vec<&String> = users.columns.keys().collect();
	assert_eq!(columns, vec!["id", "username", "unit_id"]);
	assert!(users.foreign_keys.contains_key("fk_users_unit_id_units"));
}

#[test]
fn unique_key_tag_becomes_an_index() {
	let schema = DatabaseSchema::from_registry(&registry());
	let users = &schema.tables["users"];
	let index = &users.indexes["username"];
	assert!(index.unique);
	assert_eq!(index.columns, vec!["username".to_string()]);
	assert!(users.indexes.contains_key("idx_users_unit_id"));
}

#[test]
fn empty_live_schema_generates_dependency_ordered_creates() {
	let declared = DatabaseSchema::from_registry(&registry());
	let diff = SchemaComparer::new()
		.compare(&declared, &DatabaseSchema::new())
		.unwrap();

	let created: Vec<&str> = diff
		.tables_to_create
		.iter()
		.map(|t| t.name.as_str())
		.collect();
	assert_eq!(created, vec!["units", "users"]);

	let up = DdlRenderer::render_up(&diff);
	assert_eq!(up.len(), 2);
	assert!(up[0].contains("CREATE TABLE `units`"));
	assert!(up[1].contains("CREATE TABLE `users`"));
	assert!(up[1].contains("CONSTRAINT `fk_users_unit_id_units`"));
	assert!(up[1].contains("ON DELETE SET NULL"));
}

#[test]
fn applying_the_projection_to_itself_is_a_fixpoint() {
	let declared = DatabaseSchema::from_registry(&registry());
	let diff = SchemaComparer::new().compare(&declared, &declared).unwrap();
	assert!(diff.is_empty());
}

#[test]
fn down_of_a_create_drops_in_reverse_order() {
	let declared = DatabaseSchema::from_registry(&registry());
	let diff = SchemaComparer::new()
		.compare(&declared, &DatabaseSchema::new())
		.unwrap();
	let down = DdlRenderer::render_down(&diff);
	assert_eq!(down.len(), 2);
	assert!(down[0].contains("DROP TABLE `users`"));
	assert!(down[1].contains("DROP TABLE `units`"));
}
