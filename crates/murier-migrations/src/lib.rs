//! # Murier Migrations
//!
//! Schema-diff and migration engine: introspects the live MySQL schema
//! from `information_schema`, compares it against the declared metadata,
//! renders the difference to DDL, and runs ordered, durable migration
//! steps with history tracking in `migration_history`.

pub mod comparer;
pub mod diff;
pub mod engine;
pub mod error;
pub mod introspector;
pub mod migration;
pub mod recorder;
pub mod registry;
pub mod renderer;
pub mod schema;
pub mod writer;

pub use comparer::SchemaComparer;
pub use diff::{ColumnField, ColumnModification, SchemaDifference, TableDifference};
pub use engine::{GeneratedMigration, MigrationEngine, MigrationReport};
pub use error::MigrationError;
pub use introspector::SchemaIntrospector;
pub use migration::{Migration, SqlExecutor, SqlMigration, is_valid_version};
pub use recorder::{HISTORY_TABLE, MigrationRecord, MigrationRecorder};
pub use registry::MigrationRegistry;
pub use renderer::DdlRenderer;
pub use schema::{ColumnSchema, DatabaseSchema, ForeignKeySchema, IndexSchema, TableSchema};
pub use writer::MigrationWriter;
