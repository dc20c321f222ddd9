//! # Murier Metadata
//!
//! Declarative mapping from application types to MySQL table schema: the
//! metadata records, the registry that owns them, and the value codec that
//! converts between application values and column-native values.
//!
//! Declarations are registered at startup through
//! [`builder::EntityMetadataBuilder`] and sealed into a
//! [`registry::MetadataRegistry`]; both the ORM core and the migration
//! engine read the same records, so the declared schema has a single
//! source of truth.

pub mod builder;
pub mod codec;
pub mod column;
pub mod entity;
pub mod foreign_key;
pub mod index;
pub mod naming;
pub mod registry;
pub mod relation;
pub mod types;
pub mod value;

pub use builder::EntityMetadataBuilder;
pub use codec::ValueCodec;
pub use column::ColumnMetadata;
pub use entity::EntityMetadata;
pub use foreign_key::ForeignKeyMetadata;
pub use index::IndexMetadata;
pub use registry::{MetadataRegistry, MetadataRegistryBuilder};
pub use relation::{CascadeSet, JoinTableMetadata, RelationKind, RelationMetadata};
pub use types::{ColumnKey, ColumnType, ParsedColumnType, ReferentialRule, TypeFamily};
pub use value::{ColumnValue, PropertyValue};

pub use murier_core::exception::{CodecError, MetadataError};
