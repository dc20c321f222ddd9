//! # Murier
//!
//! Entity-centric relational data-access layer for MySQL-family
//! databases: a declarative metadata model, a unit-of-work ORM core with
//! change tracking, and a schema-diff migration engine — all reading one
//! shared metadata registry.
//!
//! The facade re-exports the member crates:
//!
//! - [`metadata`]: entity metadata, registry and the value codec
//! - [`backends`]: connection options and the MySQL connection facade
//! - [`orm`]: identity map, change detection, events and the unit of work
//! - [`migrations`]: introspection, schema diffing and migration running
//! - [`core`]: shared error kinds and the tagged cache

pub use murier_backends as backends;
pub use murier_core as core;
pub use murier_metadata as metadata;
pub use murier_migrations as migrations;
pub use murier_orm as orm;

pub use murier_backends::{BackendError, Connection, ConnectionOptions};
pub use murier_core::exception::{CodecError, MetadataError};
pub use murier_metadata::{
	ColumnKey, ColumnMetadata, ColumnType, ColumnValue, EntityMetadata, EntityMetadataBuilder,
	ForeignKeyMetadata, IndexMetadata, MetadataRegistry, PropertyValue, ReferentialRule,
	RelationKind, RelationMetadata, ValueCodec,
};
pub use murier_migrations::{
	Migration, MigrationEngine, MigrationError, MigrationRegistry, SchemaComparer,
	SchemaDifference, SchemaIntrospector, SqlExecutor,
};
pub use murier_orm::{
	ChangeDetector, ChangeSet, Entity, EntityListener, EntityState, IdentityMap, OrmError,
	PkValue, TrackedCollection, UnitOfWork, shared,
};

use thiserror::Error;

/// Umbrella error for callers that funnel every layer through one type.
#[derive(Debug, Error)]
pub enum DataError {
	#[error(transparent)]
	Metadata(#[from] MetadataError),

	#[error(transparent)]
	Codec(#[from] CodecError),

	#[error(transparent)]
	Backend(#[from] BackendError),

	#[error(transparent)]
	Orm(#[from] OrmError),

	#[error(transparent)]
	Migration(#[from] MigrationError),
}
