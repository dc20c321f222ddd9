//! The unit of work: persist/remove/detach/merge/find and the atomic
//! flush pipeline.
//!
//! A flush runs in a fixed sequence: change-set computation and cascade
//! discovery, classification, topological ordering, then one transaction
//! in which inserts, updates, the second pass for deferred foreign keys,
//! join-table deltas and deletes execute in order. All state the flush
//! would leave behind (snapshots, lifecycle transitions, identity-map
//! entries) is staged in a scratch buffer and applied only after commit,
//! so a rolled-back flush leaves every snapshot and state untouched and a
//! later `flush()` retries the same change set.

use crate::changeset::{ChangeDetector, ChangeSet, Snapshot};
use crate::entity::{CollectionDelta, Entity, EntityRef, ManagedRef};
use crate::error::OrmError;
use crate::events::{EntityListener, EventBus};
use crate::identity::{Identity, IdentityMap, PkValue};
use crate::renderer::SqlRenderer;
use crate::scheduler::order_tables;
use crate::state::{EntityState, ensure_transition};
use indexmap::IndexMap;
use murier_backends::{BackendError, Connection, decode_column};
use murier_metadata::codec::ValueCodec;
use murier_metadata::entity::EntityMetadata;
use murier_metadata::registry::MetadataRegistry;
use murier_metadata::relation::RelationKind;
use murier_metadata::value::{ColumnValue, PropertyValue};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A tracked entity slot: identity, live reference, lifecycle state and
/// original-value snapshot.
pub(crate) struct ManagedEntity {
	pub(crate) href: ManagedRef,
	pub(crate) type_name: String,
	pub(crate) state: EntityState,
	pub(crate) snapshot: Snapshot,
}

/// State the flush pipeline stages and applies only after commit.
#[derive(Default)]
struct FlushScratch {
	snapshot_merges: Vec<(usize, Vec<(String, ColumnValue)>)>,
	transitions: Vec<(usize, EntityState)>,
	identity_inserts: Vec<(Identity, usize)>,
	identity_removals: Vec<Identity>,
	slot_removals: Vec<usize>,
	assigned_pks: Vec<usize>,
	collection_commits: Vec<usize>,
}

/// A foreign-key column written as NULL during insert, resolved by the
/// second UPDATE pass once its target row exists.
struct DeferredFk {
	key: usize,
	column: String,
	property: String,
	target: ManagedRef,
}

struct InsertPlan {
	columns: Vec<String>,
	params: Vec<ColumnValue>,
	merges: Vec<(String, ColumnValue)>,
	deferred: Vec<DeferredFk>,
}

/// Coordinates tracked entities and synchronizes them with the database.
pub struct UnitOfWork {
	registry: Arc<MetadataRegistry>,
	connection: Arc<Connection>,
	slots: IndexMap<usize, ManagedEntity>,
	identity: IdentityMap,
	events: EventBus,
}

impl UnitOfWork {
	pub fn new(registry: Arc<MetadataRegistry>, connection: Arc<Connection>) -> Self {
		Self {
			registry,
			connection,
			slots: IndexMap::new(),
			identity: IdentityMap::new(),
			events: EventBus::new(),
		}
	}

	/// Register a lifecycle listener.
	pub fn register_listener(&mut self, listener: Arc<dyn EntityListener>) {
		self.events.register(listener);
	}

	pub fn connection(&self) -> &Arc<Connection> {
		&self.connection
	}

	/// Schedule an entity for insertion. Persisting an already-tracked
	/// entity is a no-op; persisting a removed one is illegal.
	pub fn persist<E: Entity>(&mut self, handle: &Arc<RwLock<E>>) -> Result<(), OrmError> {
		self.persist_ref(ManagedRef::new(handle))
	}

	fn persist_ref(&mut self, href: ManagedRef) -> Result<(), OrmError> {
		let key = href.ptr_key();
		if let Some(slot) = self.slots.get(&key) {
			return match slot.state {
				EntityState::New | EntityState::Managed => Ok(()),
				state => Err(OrmError::InvalidStateTransition {
					from: Some(state),
					to: Some(EntityState::New),
				}),
			};
		}
		ensure_transition(None, Some(EntityState::New))?;
		let type_name = href.entity.read().type_name().to_string();
		self.registry.get(&type_name)?;
		self.events
			.pre_state_transition(&href.entity, None, Some(EntityState::New));
		let entity = Arc::clone(&href.entity);
		self.slots.insert(
			key,
			ManagedEntity {
				href,
				type_name,
				state: EntityState::New,
				snapshot: Snapshot::new(),
			},
		);
		self.events
			.post_state_transition(&entity, None, Some(EntityState::New));
		Ok(())
	}

	/// Schedule a managed entity for deletion on the next flush.
	pub fn remove<E: Entity>(&mut self, handle: &Arc<RwLock<E>>) -> Result<(), OrmError> {
		let key = ptr_key_of(handle);
		let state = self.slots.get(&key).map(|slot| slot.state);
		ensure_transition(state, Some(EntityState::Removed))?;
		let entity = {
			let slot = self.slots.get(&key).ok_or(OrmError::InvalidStateTransition {
				from: None,
				to: Some(EntityState::Removed),
			})?;
			Arc::clone(&slot.href.entity)
		};
		self.events
			.pre_state_transition(&entity, state, Some(EntityState::Removed));
		if let Some(slot) = self.slots.get_mut(&key) {
			slot.state = EntityState::Removed;
		}
		self.events
			.post_state_transition(&entity, state, Some(EntityState::Removed));
		Ok(())
	}

	/// Stop tracking a managed entity; the instance lives on independently.
	pub fn detach<E: Entity>(&mut self, handle: &Arc<RwLock<E>>) -> Result<(), OrmError> {
		let key = ptr_key_of(handle);
		let state = self.slots.get(&key).map(|slot| slot.state);
		ensure_transition(state, Some(EntityState::Detached))?;
		let entity = {
			let slot = self.slots.get(&key).ok_or(OrmError::InvalidStateTransition {
				from: None,
				to: Some(EntityState::Detached),
			})?;
			Arc::clone(&slot.href.entity)
		};
		self.events
			.pre_state_transition(&entity, state, Some(EntityState::Detached));
		if let Some(slot) = self.slots.shift_remove(&key) {
			if let Some(pk) = slot.href.entity.read().primary_key() {
				self.identity.remove(&Identity::new(slot.type_name, pk));
			}
		}
		self.events
			.post_state_transition(&entity, state, Some(EntityState::Detached));
		Ok(())
	}

	/// Re-attach a detached entity. Its current field values are taken as
	/// the in-sync state; a previously tracked instance with the same
	/// identity is displaced.
	pub fn merge<E: Entity>(&mut self, handle: &Arc<RwLock<E>>) -> Result<(), OrmError> {
		let key = ptr_key_of(handle);
		if let Some(slot) = self.slots.get(&key) {
			return match slot.state {
				EntityState::Managed => Ok(()),
				state => Err(OrmError::InvalidStateTransition {
					from: Some(state),
					to: Some(EntityState::Managed),
				}),
			};
		}
		let href = ManagedRef::new(handle);
		let (type_name, pk) = {
			let guard = href.entity.read();
			(guard.type_name().to_string(), guard.primary_key())
		};
		let pk = pk.ok_or(OrmError::InvalidStateTransition {
			from: None,
			to: Some(EntityState::Managed),
		})?;
		ensure_transition(Some(EntityState::Detached), Some(EntityState::Managed))?;
		let metadata = self.registry.get(&type_name)?;
		self.events.pre_state_transition(
			&href.entity,
			Some(EntityState::Detached),
			Some(EntityState::Managed),
		);
		let snapshot = ChangeDetector::snapshot(&*href.entity.read(), &metadata)?;
		let identity = Identity::new(type_name.clone(), pk);
		if let Some(displaced) = self.identity.remove(&identity) {
			self.slots.shift_remove(&displaced);
		}
		self.identity.insert(identity, key);
		let entity = Arc::clone(&href.entity);
		self.slots.insert(
			key,
			ManagedEntity {
				href,
				type_name,
				state: EntityState::Managed,
				snapshot,
			},
		);
		self.events.post_state_transition(
			&entity,
			Some(EntityState::Detached),
			Some(EntityState::Managed),
		);
		Ok(())
	}

	/// Drop all tracked state. Entities themselves are untouched.
	pub fn clear(&mut self) {
		self.slots.clear();
		self.identity.clear();
	}

	/// Lifecycle state of an instance, when tracked.
	pub fn state_of<E: Entity>(&self, handle: &Arc<RwLock<E>>) -> Option<EntityState> {
		self.slots.get(&ptr_key_of(handle)).map(|slot| slot.state)
	}

	pub fn contains<E: Entity>(&self, handle: &Arc<RwLock<E>>) -> bool {
		self.slots.contains_key(&ptr_key_of(handle))
	}

	/// Whether the identity map holds an instance for `(type, pk)`.
	pub fn is_loaded(&self, type_name: &str, pk: impl Into<PkValue>) -> bool {
		self.identity.contains(&Identity::new(type_name, pk))
	}

	/// Find by primary key. Returns the already-managed instance when the
	/// identity map holds one, otherwise loads and starts tracking it.
	pub async fn find<E: Entity>(
		&mut self,
		pk: impl Into<PkValue>,
	) -> Result<Option<Arc<RwLock<E>>>, OrmError> {
		let pk = pk.into();
		let metadata = self.registry.get(E::entity_name())?;
		let identity = Identity::new(E::entity_name(), pk.clone());
		if let Some(slot_key) = self.identity.get(&identity) {
			if let Some(slot) = self.slots.get(&slot_key) {
				return Ok(slot.href.downcast::<E>());
			}
		}

		let pk_column = primary_column(&metadata)?;
		let columns: Vec<String> = metadata.columns.iter().map(|c| c.name.clone()).collect();
		let statement = SqlRenderer::select_by_pk(
			&metadata.table,
			&columns,
			&pk_column.name,
			pk_to_column(&pk),
		);
		let Some(row) = self
			.connection
			.fetch_optional(&statement.sql, &statement.params)
			.await?
		else {
			return Ok(None);
		};
		Ok(Some(self.install_row::<E>(&row, &metadata)?))
	}

	/// Load every row of the entity's table.
	pub async fn find_all<E: Entity>(&mut self) -> Result<Vec<Arc<RwLock<E>>>, OrmError> {
		self.find_by::<E>(&[]).await
	}

	/// Load rows matching equality criteria over entity properties.
	/// Rows whose identity is already managed come back as the existing
	/// instance, not a fresh copy.
	pub async fn find_by<E: Entity>(
		&mut self,
		criteria: &[(&str, PropertyValue)],
	) -> Result<Vec<Arc<RwLock<E>>>, OrmError> {
		let metadata = self.registry.get(E::entity_name())?;
		let columns: Vec<String> = metadata.columns.iter().map(|c| c.name.clone()).collect();
		let mut filter_columns: Vec<String> = Vec::new();
		let mut params: Vec<ColumnValue> = Vec::new();
		for (property, value) in criteria {
			let column = metadata.column_for_property(property).ok_or_else(|| {
				OrmError::Metadata(murier_core::exception::MetadataError::UnknownProperty {
					type_name: E::entity_name().to_string(),
					property: property.to_string(),
				})
			})?;
			params.push(ValueCodec::to_column(value, column)?);
			filter_columns.push(column.name.clone());
		}
		let statement =
			SqlRenderer::select_where(&metadata.table, &columns, &filter_columns, params);
		let rows = self
			.connection
			.fetch_all(&statement.sql, &statement.params)
			.await?;
		let mut entities = Vec::with_capacity(rows.len());
		for row in &rows {
			entities.push(self.install_row::<E>(row, &metadata)?);
		}
		Ok(entities)
	}

	/// Decode one row, reusing the already-managed instance when the
	/// identity map holds it, otherwise hydrating and tracking a new one.
	fn install_row<E: Entity>(
		&mut self,
		row: &sqlx::mysql::MySqlRow,
		metadata: &EntityMetadata,
	) -> Result<Arc<RwLock<E>>, OrmError> {
		let pk_column = primary_column(metadata)?;
		let mut snapshot = Snapshot::new();
		let mut properties: IndexMap<String, PropertyValue> = IndexMap::new();
		for column in &metadata.columns {
			let value = decode_column(row, column)?;
			properties.insert(
				column.property.clone(),
				ValueCodec::from_column_implicit(&value, column),
			);
			snapshot.insert(column.property.clone(), value);
		}

		let pk = match snapshot.get(&pk_column.property) {
			Some(ColumnValue::Int(v)) => PkValue::Int(*v),
			Some(ColumnValue::UInt(v)) => PkValue::Int(*v as i64),
			Some(ColumnValue::Text(s)) => PkValue::Str(s.clone()),
			_ => {
				return Err(OrmError::UnresolvedReference {
					entity: metadata.type_name.clone(),
					property: pk_column.property.clone(),
				});
			}
		};
		let identity = Identity::new(metadata.type_name.clone(), pk.clone());
		if let Some(slot_key) = self.identity.get(&identity) {
			if let Some(existing) = self
				.slots
				.get(&slot_key)
				.and_then(|slot| slot.href.downcast::<E>())
			{
				return Ok(existing);
			}
		}

		let mut entity = E::hydrate(&properties);
		entity.set_primary_key(Some(pk));
		let handle = Arc::new(RwLock::new(entity));
		let href = ManagedRef::new(&handle);
		let key = href.ptr_key();
		self.identity.insert(identity, key);
		self.slots.insert(
			key,
			ManagedEntity {
				href,
				type_name: metadata.type_name.clone(),
				state: EntityState::Managed,
				snapshot,
			},
		);
		Ok(handle)
	}

	/// Synchronize all tracked changes with the database in one atomic
	/// transaction.
	pub async fn flush(&mut self) -> Result<(), OrmError> {
		self.events.pre_flush();

		self.discover_cascades()?;

		// Change sets for managed entities; collection deltas for new ones.
		let mut changesets: HashMap<usize, ChangeSet> = HashMap::new();
		let mut fk_followups: HashSet<usize> = HashSet::new();
		let new_keys: HashSet<usize> = self
			.slots
			.iter()
			.filter(|(_, slot)| slot.state == EntityState::New)
			.map(|(key, _)| *key)
			.collect();
		for (key, slot) in &self.slots {
			let metadata = self.registry.get(&slot.type_name)?;
			match slot.state {
				EntityState::Managed => {
					let guard = slot.href.entity.read();
					let changes = ChangeDetector::compute(&*guard, &metadata, &slot.snapshot)?;
					if has_pending_fk(&*guard, &slot.href.entity, &metadata, &slot.snapshot, &new_keys)
					{
						fk_followups.insert(*key);
					}
					if !changes.is_empty() {
						changesets.insert(*key, changes);
					}
				}
				EntityState::New => {
					let deltas = collect_collections(&*slot.href.entity.read(), &metadata);
					if !deltas.is_empty() {
						let mut changes = ChangeSet::default();
						changes.collections = deltas;
						changesets.insert(*key, changes);
					}
				}
				_ => {}
			}
		}

		// Classification.
		let mut inserts: Vec<usize> = Vec::new();
		let mut updates: Vec<usize> = Vec::new();
		let mut deletes: Vec<usize> = Vec::new();
		let mut join_work: Vec<usize> = Vec::new();
		for (key, slot) in &self.slots {
			match slot.state {
				EntityState::New => inserts.push(*key),
				EntityState::Managed => {
					let field_changes = changesets
						.get(key)
						.map(ChangeSet::has_field_changes)
						.unwrap_or(false);
					if field_changes || fk_followups.contains(key) {
						updates.push(*key);
					}
				}
				EntityState::Removed => deletes.push(*key),
				EntityState::Detached => {}
			}
			if changesets
				.get(key)
				.is_some_and(|c| !c.collections.is_empty())
				&& slot.state != EntityState::Removed
			{
				join_work.push(*key);
			}
		}

		if inserts.is_empty() && updates.is_empty() && deletes.is_empty() && join_work.is_empty() {
			self.events.post_flush();
			return Ok(());
		}

		// Topological ordering over the tables involved.
		let mut tables: BTreeSet<String> = BTreeSet::new();
		for key in inserts.iter().chain(&updates).chain(&deletes) {
			tables.insert(self.registry.get(&self.slots[key].type_name)?.table.clone());
		}
		let table_order = order_tables(&self.registry, &tables)?;
		let rank: HashMap<&str, usize> = table_order
			.iter()
			.enumerate()
			.map(|(i, t)| (t.as_str(), i))
			.collect();
		let rank_of = |uow: &Self, key: &usize| -> usize {
			let table = &uow
				.registry
				.get(&uow.slots[key].type_name)
				.map(|m| m.table.clone())
				.unwrap_or_default();
			rank.get(table.as_str()).copied().unwrap_or(usize::MAX)
		};
		inserts.sort_by_key(|key| rank_of(self, key));
		updates.sort_by_key(|key| rank_of(self, key));
		deletes.sort_by_key(|key| std::cmp::Reverse(rank_of(self, key)));

		debug!(
			inserts = inserts.len(),
			updates = updates.len(),
			deletes = deletes.len(),
			"flush scheduled"
		);

		// One transaction around the whole pipeline.
		self.connection.begin().await?;
		let mut scratch = FlushScratch::default();
		let result = self
			.run_pipeline(
				&inserts,
				&updates,
				&deletes,
				&join_work,
				&new_keys,
				&changesets,
				&mut scratch,
			)
			.await;
		match result {
			Ok(()) => match self.connection.commit().await {
				Ok(()) => {
					self.apply_scratch(scratch);
					self.events.post_flush();
					Ok(())
				}
				Err(e) => {
					self.revert_assigned_pks(&scratch);
					Err(e.into())
				}
			},
			Err(e) => {
				if let Err(rollback_err) = self.connection.rollback().await {
					debug!(error = %rollback_err, "rollback after failed flush also failed");
				}
				self.revert_assigned_pks(&scratch);
				Err(e)
			}
		}
	}

	/// Breadth-first discovery of cascaded persists on to-many relations.
	fn discover_cascades(&mut self) -> Result<(), OrmError> {
		let mut frontier: Vec<usize> = self.slots.keys().copied().collect();
		while !frontier.is_empty() {
			let mut next = Vec::new();
			for key in frontier {
				let Some(slot) = self.slots.get(&key) else {
					continue;
				};
				if slot.state == EntityState::Removed {
					continue;
				}
				let metadata = self.registry.get(&slot.type_name)?;
				let entity = Arc::clone(&slot.href.entity);
				let cascaded: Vec<ManagedRef> = {
					let guard = entity.read();
					metadata
						.to_many_relations()
						.filter(|relation| relation.cascade.persist)
						.filter_map(|relation| guard.relation_delta(&relation.property))
						.flat_map(|delta| delta.added)
						.collect()
				};
				for target in cascaded {
					let target_key = target.ptr_key();
					if self.slots.contains_key(&target_key) {
						continue;
					}
					if target.entity.read().primary_key().is_some() {
						continue;
					}
					self.persist_ref(target)?;
					next.push(target_key);
				}
			}
			frontier = next;
		}
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	async fn run_pipeline(
		&self,
		inserts: &[usize],
		updates: &[usize],
		deletes: &[usize],
		join_work: &[usize],
		new_keys: &HashSet<usize>,
		changesets: &HashMap<usize, ChangeSet>,
		scratch: &mut FlushScratch,
	) -> Result<(), OrmError> {
		let mut deferred: Vec<DeferredFk> = Vec::new();

		for &key in inserts {
			self.execute_insert(key, new_keys, scratch, &mut deferred)
				.await?;
		}
		for &key in updates {
			self.execute_update(key, changesets.get(&key), scratch)
				.await?;
		}
		self.execute_deferred(&deferred, scratch).await?;
		for &key in join_work {
			self.execute_join_deltas(key, changesets, scratch).await?;
		}
		for &key in deletes {
			self.execute_delete(key, scratch).await?;
		}
		Ok(())
	}

	async fn execute_insert(
		&self,
		key: usize,
		new_keys: &HashSet<usize>,
		scratch: &mut FlushScratch,
		deferred: &mut Vec<DeferredFk>,
	) -> Result<(), OrmError> {
		let slot = &self.slots[&key];
		let metadata = self.registry.get(&slot.type_name)?;
		let entity = &slot.href.entity;

		self.events
			.pre_state_transition(entity, Some(EntityState::New), Some(EntityState::Managed));
		self.events.pre_persist(entity);

		let plan = {
			let guard = entity.read();
			self.build_insert_plan(key, &*guard, entity, &metadata, new_keys)?
		};
		let InsertPlan {
			columns,
			params,
			mut merges,
			deferred: plan_deferred,
		} = plan;
		deferred.extend(plan_deferred);

		let statement = SqlRenderer::insert(&metadata.table, &columns, params);
		let result = self
			.connection
			.execute(&statement.sql, &statement.params)
			.await
			.map_err(|e| wrap_db_error(&slot.type_name, e))?;

		let pk_column = primary_column(&metadata)?;
		let pk = if pk_column.is_auto_increment() {
			let pk = PkValue::Int(result.last_insert_id as i64);
			entity.write().set_primary_key(Some(pk.clone()));
			scratch.assigned_pks.push(key);
			merges.push((
				pk_column.property.clone(),
				ColumnValue::Int(result.last_insert_id as i64),
			));
			pk
		} else {
			entity
				.read()
				.primary_key()
				.ok_or_else(|| OrmError::UnresolvedReference {
					entity: slot.type_name.clone(),
					property: pk_column.property.clone(),
				})?
		};

		scratch
			.identity_inserts
			.push((Identity::new(slot.type_name.clone(), pk), key));
		scratch.snapshot_merges.push((key, merges));
		scratch.transitions.push((key, EntityState::Managed));

		self.events.post_persist(entity);
		self.events
			.post_state_transition(entity, Some(EntityState::New), Some(EntityState::Managed));
		Ok(())
	}

	fn build_insert_plan(
		&self,
		key: usize,
		entity: &dyn Entity,
		owner: &EntityRef,
		metadata: &EntityMetadata,
		new_keys: &HashSet<usize>,
	) -> Result<InsertPlan, OrmError> {
		let mut plan = InsertPlan {
			columns: Vec::new(),
			params: Vec::new(),
			merges: Vec::new(),
			deferred: Vec::new(),
		};
		for column in &metadata.columns {
			if column.is_primary() && column.is_auto_increment() {
				continue;
			}
			let relation = metadata
				.relations
				.iter()
				.find(|r| r.join_column.as_deref() == Some(column.name.as_str()));
			let value = match relation.and_then(|r| entity.related(&r.property).map(|t| (r, t))) {
				Some((relation, target)) => {
					let target_key = target.ptr_key();
					let target_pk = resolve_target_pk(entity, owner, &target);
					if new_keys.contains(&target_key) && column.nullable {
						plan.deferred.push(DeferredFk {
							key,
							column: column.name.clone(),
							property: column.property.clone(),
							target,
						});
						ColumnValue::Null
					} else {
						match target_pk {
							Some(pk) => pk_to_column(&pk),
							None if new_keys.contains(&target_key) => {
								return Err(OrmError::CyclicDependency {
									cycle: format!(
										"{} -> {} via non-nullable `{}`.`{}`",
										metadata.table,
										relation.target_entity,
										metadata.table,
										column.name
									),
								});
							}
							None => {
								return Err(OrmError::UnresolvedReference {
									entity: metadata.type_name.clone(),
									property: relation.property.clone(),
								});
							}
						}
					}
				}
				None => ValueCodec::to_column(&entity.get(&column.property), column)?,
			};
			plan.columns.push(column.name.clone());
			plan.params.push(value.clone());
			plan.merges.push((column.property.clone(), value));
		}
		Ok(plan)
	}

	async fn execute_update(
		&self,
		key: usize,
		changes: Option<&ChangeSet>,
		scratch: &mut FlushScratch,
	) -> Result<(), OrmError> {
		let slot = &self.slots[&key];
		let metadata = self.registry.get(&slot.type_name)?;
		let entity = &slot.href.entity;

		let empty = ChangeSet::default();
		let changes = changes.unwrap_or(&empty);
		self.events.pre_update(entity, changes);

		let mut columns: Vec<String> = Vec::new();
		let mut params: Vec<ColumnValue> = Vec::new();
		let mut merges: Vec<(String, ColumnValue)> = Vec::new();
		{
			let guard = entity.read();
			// Join columns with a live target resolve here, after inserts
			// assigned their primary keys.
			let mut overridden: HashSet<&str> = HashSet::new();
			for relation in metadata.relations.iter().filter(|r| r.join_column.is_some()) {
				let Some(join_column) = relation.join_column.as_deref() else {
					continue;
				};
				let Some(column) = metadata.column_by_name(join_column) else {
					continue;
				};
				let Some(target) = guard.related(&relation.property) else {
					continue;
				};
				overridden.insert(join_column);
				let pk = resolve_target_pk(&*guard, entity, &target).ok_or_else(|| {
					OrmError::UnresolvedReference {
						entity: slot.type_name.clone(),
						property: relation.property.clone(),
					}
				})?;
				let value = pk_to_column(&pk);
				if slot.snapshot.get(&column.property) != Some(&value) {
					columns.push(column.name.clone());
					params.push(value.clone());
					merges.push((column.property.clone(), value));
				}
			}
			for (property, change) in &changes.fields {
				let Some(column) = metadata.column_for_property(property) else {
					continue;
				};
				if overridden.contains(column.name.as_str()) {
					continue;
				}
				columns.push(column.name.clone());
				params.push(change.new.clone());
				merges.push((property.clone(), change.new.clone()));
			}
		}

		if !columns.is_empty() {
			let pk_column = primary_column(&metadata)?;
			let pk = entity
				.read()
				.primary_key()
				.ok_or_else(|| OrmError::UnresolvedReference {
					entity: slot.type_name.clone(),
					property: pk_column.property.clone(),
				})?;
			let statement = SqlRenderer::update(
				&metadata.table,
				&columns,
				params,
				&pk_column.name,
				pk_to_column(&pk),
			);
			self.connection
				.execute(&statement.sql, &statement.params)
				.await
				.map_err(|e| wrap_db_error(&slot.type_name, e))?;
			scratch.snapshot_merges.push((key, merges));
		}

		self.events.post_update(entity);
		Ok(())
	}

	/// The second UPDATE pass for foreign-key columns deferred at insert.
	async fn execute_deferred(
		&self,
		deferred: &[DeferredFk],
		scratch: &mut FlushScratch,
	) -> Result<(), OrmError> {
		let mut grouped: IndexMap<usize, Vec<&DeferredFk>> = IndexMap::new();
		for entry in deferred {
			grouped.entry(entry.key).or_default().push(entry);
		}
		for (key, entries) in grouped {
			let slot = &self.slots[&key];
			let metadata = self.registry.get(&slot.type_name)?;
			let pk_column = primary_column(&metadata)?;
			let pk = slot.href.entity.read().primary_key().ok_or_else(|| {
				OrmError::UnresolvedReference {
					entity: slot.type_name.clone(),
					property: pk_column.property.clone(),
				}
			})?;

			let mut columns: Vec<String> = Vec::new();
			let mut params: Vec<ColumnValue> = Vec::new();
			let mut merges: Vec<(String, ColumnValue)> = Vec::new();
			for entry in entries {
				let target_pk = entry.target.entity.read().primary_key().ok_or_else(|| {
					OrmError::UnresolvedReference {
						entity: slot.type_name.clone(),
						property: entry.property.clone(),
					}
				})?;
				let value = pk_to_column(&target_pk);
				columns.push(entry.column.clone());
				params.push(value.clone());
				merges.push((entry.property.clone(), value));
			}

			let statement = SqlRenderer::update(
				&metadata.table,
				&columns,
				params,
				&pk_column.name,
				pk_to_column(&pk),
			);
			self.connection
				.execute(&statement.sql, &statement.params)
				.await
				.map_err(|e| wrap_db_error(&slot.type_name, e))?;
			scratch.snapshot_merges.push((key, merges));
		}
		Ok(())
	}

	/// Apply join-table deltas of many-to-many relations, after the
	/// owning-side writes.
	async fn execute_join_deltas(
		&self,
		key: usize,
		changesets: &HashMap<usize, ChangeSet>,
		scratch: &mut FlushScratch,
	) -> Result<(), OrmError> {
		let Some(changes) = changesets.get(&key) else {
			return Ok(());
		};
		let slot = &self.slots[&key];
		let metadata = self.registry.get(&slot.type_name)?;
		let owner_pk = slot.href.entity.read().primary_key().ok_or_else(|| {
			OrmError::UnresolvedReference {
				entity: slot.type_name.clone(),
				property: "primary key".to_string(),
			}
		})?;

		let mut touched = false;
		for relation in &metadata.relations {
			if relation.kind != RelationKind::ManyToMany {
				continue;
			}
			let Some(join_table) = &relation.join_table else {
				continue;
			};
			let Some(delta) = changes.collections.get(&relation.property) else {
				continue;
			};
			for target in &delta.added {
				let target_pk = target.entity.read().primary_key().ok_or_else(|| {
					OrmError::UnresolvedReference {
						entity: slot.type_name.clone(),
						property: relation.property.clone(),
					}
				})?;
				let statement = SqlRenderer::join_insert(
					&join_table.table,
					&join_table.owner_column,
					&join_table.target_column,
					pk_to_column(&owner_pk),
					pk_to_column(&target_pk),
				);
				self.connection
					.execute(&statement.sql, &statement.params)
					.await
					.map_err(|e| wrap_db_error(&slot.type_name, e))?;
				touched = true;
			}
			for target in &delta.removed {
				let Some(target_pk) = target.entity.read().primary_key() else {
					continue;
				};
				let statement = SqlRenderer::join_delete(
					&join_table.table,
					&join_table.owner_column,
					&join_table.target_column,
					pk_to_column(&owner_pk),
					pk_to_column(&target_pk),
				);
				self.connection
					.execute(&statement.sql, &statement.params)
					.await
					.map_err(|e| wrap_db_error(&slot.type_name, e))?;
				touched = true;
			}
		}
		if touched || !changes.collections.is_empty() {
			scratch.collection_commits.push(key);
		}
		Ok(())
	}

	async fn execute_delete(&self, key: usize, scratch: &mut FlushScratch) -> Result<(), OrmError> {
		let slot = &self.slots[&key];
		let metadata = self.registry.get(&slot.type_name)?;
		let entity = &slot.href.entity;
		let pk_column = primary_column(&metadata)?;
		let pk = entity
			.read()
			.primary_key()
			.ok_or_else(|| OrmError::UnresolvedReference {
				entity: slot.type_name.clone(),
				property: pk_column.property.clone(),
			})?;

		self.events
			.pre_state_transition(entity, Some(EntityState::Removed), None);
		self.events.pre_remove(entity);

		let statement = SqlRenderer::delete(&metadata.table, &pk_column.name, pk_to_column(&pk));
		self.connection
			.execute(&statement.sql, &statement.params)
			.await
			.map_err(|e| wrap_db_error(&slot.type_name, e))?;

		scratch
			.identity_removals
			.push(Identity::new(slot.type_name.clone(), pk));
		scratch.slot_removals.push(key);

		self.events.post_remove(entity);
		self.events
			.post_state_transition(entity, Some(EntityState::Removed), None);
		Ok(())
	}

	fn apply_scratch(&mut self, scratch: FlushScratch) {
		for (key, merges) in scratch.snapshot_merges {
			if let Some(slot) = self.slots.get_mut(&key) {
				for (property, value) in merges {
					slot.snapshot.insert(property, value);
				}
			}
		}
		for (key, state) in scratch.transitions {
			if let Some(slot) = self.slots.get_mut(&key) {
				slot.state = state;
			}
		}
		for (identity, key) in scratch.identity_inserts {
			self.identity.insert(identity, key);
		}
		for key in scratch.collection_commits {
			if let Some(slot) = self.slots.get(&key) {
				slot.href.entity.write().commit_relation_deltas();
			}
		}
		for identity in scratch.identity_removals {
			self.identity.remove(&identity);
		}
		for key in scratch.slot_removals {
			self.slots.shift_remove(&key);
		}
	}

	fn revert_assigned_pks(&self, scratch: &FlushScratch) {
		for key in &scratch.assigned_pks {
			if let Some(slot) = self.slots.get(key) {
				slot.href.entity.write().set_primary_key(None);
			}
		}
	}
}

fn ptr_key_of<E: Entity>(handle: &Arc<RwLock<E>>) -> usize {
	Arc::as_ptr(handle) as *const () as usize
}

fn pk_to_column(pk: &PkValue) -> ColumnValue {
	match pk {
		PkValue::Int(v) => ColumnValue::Int(*v),
		PkValue::Str(s) => ColumnValue::Text(s.clone()),
	}
}

fn primary_column(metadata: &EntityMetadata) -> Result<&murier_metadata::ColumnMetadata, OrmError> {
	metadata.primary_key().ok_or_else(|| {
		OrmError::Metadata(murier_core::exception::MetadataError::InvalidEntity {
			type_name: metadata.type_name.clone(),
			reason: "no primary-key column".to_string(),
		})
	})
}

/// Resolve the target's primary key without re-locking the owner when the
/// relation is self-referential.
fn resolve_target_pk(
	owner_guard: &dyn Entity,
	owner: &EntityRef,
	target: &ManagedRef,
) -> Option<PkValue> {
	if Arc::ptr_eq(owner, &target.entity) {
		owner_guard.primary_key()
	} else {
		target.entity.read().primary_key()
	}
}

/// Whether any to-one relation needs a foreign-key write this flush: the
/// target is scheduled for insert (its key arrives late), or its resolved
/// primary key no longer matches the snapshot.
fn has_pending_fk(
	entity: &dyn Entity,
	owner: &EntityRef,
	metadata: &EntityMetadata,
	snapshot: &Snapshot,
	new_keys: &HashSet<usize>,
) -> bool {
	metadata
		.relations
		.iter()
		.filter(|r| r.join_column.is_some())
		.any(|relation| {
			let Some(target) = entity.related(&relation.property) else {
				return false;
			};
			match resolve_target_pk(entity, owner, &target) {
				None => new_keys.contains(&target.ptr_key()),
				Some(pk) => {
					let property = relation
						.join_column
						.as_deref()
						.and_then(|c| metadata.column_by_name(c))
						.map(|c| c.property.as_str());
					match property {
						Some(property) => snapshot.get(property) != Some(&pk_to_column(&pk)),
						None => false,
					}
				}
			}
		})
}

fn collect_collections(
	entity: &dyn Entity,
	metadata: &EntityMetadata,
) -> IndexMap<String, CollectionDelta> {
	let mut deltas = IndexMap::new();
	for relation in metadata.to_many_relations() {
		if let Some(delta) = entity.relation_delta(&relation.property) {
			if !delta.is_empty() {
				deltas.insert(relation.property.clone(), delta);
			}
		}
	}
	deltas
}

fn wrap_db_error(entity: &str, error: BackendError) -> OrmError {
	if let BackendError::Database(sqlx::Error::Database(db_error)) = &error {
		use sqlx::error::ErrorKind;
		match db_error.kind() {
			ErrorKind::UniqueViolation
			| ErrorKind::ForeignKeyViolation
			| ErrorKind::NotNullViolation
			| ErrorKind::CheckViolation => {
				return OrmError::ConstraintViolation {
					entity: entity.to_string(),
					source: error,
				};
			}
			_ => {}
		}
	}
	OrmError::Backend(error)
}
