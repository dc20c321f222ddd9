//! The connection facade owned by a unit of work or migration engine.
//!
//! One `Connection` wraps one MySQL pool. Transactions coalesce: `begin`
//! nests by counting depth, only the outermost `commit` commits, and
//! `rollback` unwinds everything opened since the outermost `begin`.
//! While a transaction is open every statement routes through it.

use crate::error::BackendError;
use crate::options::ConnectionOptions;
use murier_metadata::value::ColumnValue;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
	pub rows_affected: u64,
	pub last_insert_id: u64,
}

#[derive(Default)]
struct TxState {
	tx: Option<Transaction<'static, MySql>>,
	depth: u32,
}

/// Facade over one MySQL pool with coalesced transaction handling.
pub struct Connection {
	pool: MySqlPool,
	state: Mutex<TxState>,
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection").finish_non_exhaustive()
	}
}

impl Connection {
	/// Open a pool from explicit options.
	pub async fn connect(options: &ConnectionOptions) -> Result<Self, BackendError> {
		let mut connect = MySqlConnectOptions::new();
		if let Some(socket) = &options.unix_socket {
			connect = connect.socket(socket);
		} else {
			if let Some(host) = &options.host {
				connect = connect.host(host);
			}
			if let Some(port) = options.port {
				connect = connect.port(port);
			}
		}
		if let Some(user) = &options.user {
			connect = connect.username(user);
		}
		if let Some(pass) = &options.pass {
			connect = connect.password(pass);
		}
		if let Some(dbname) = &options.dbname {
			connect = connect.database(dbname);
		}
		if let Some(charset) = &options.charset {
			connect = connect.charset(charset);
		}

		let pool = MySqlPoolOptions::new()
			.max_connections(5)
			.connect_with(connect)
			.await?;
		Ok(Self::from_pool(pool))
	}

	/// Wrap an existing pool.
	pub fn from_pool(pool: MySqlPool) -> Self {
		Self {
			pool,
			state: Mutex::new(TxState::default()),
		}
	}

	pub fn pool(&self) -> &MySqlPool {
		&self.pool
	}

	/// Start (or join) a transaction.
	pub async fn begin(&self) -> Result<(), BackendError> {
		let mut state = self.state.lock().await;
		if state.depth == 0 {
			state.tx = Some(self.pool.begin().await?);
		}
		state.depth += 1;
		Ok(())
	}

	/// Commit the current nesting level; only the outermost level commits
	/// to the database.
	pub async fn commit(&self) -> Result<(), BackendError> {
		let mut state = self.state.lock().await;
		if state.depth == 0 {
			return Err(BackendError::TransactionState {
				message: "commit without begin".to_string(),
			});
		}
		state.depth -= 1;
		if state.depth == 0 {
			if let Some(tx) = state.tx.take() {
				tx.commit().await?;
			}
		}
		Ok(())
	}

	/// Roll back everything since the outermost `begin`.
	pub async fn rollback(&self) -> Result<(), BackendError> {
		let mut state = self.state.lock().await;
		if state.depth == 0 {
			return Err(BackendError::TransactionState {
				message: "rollback without begin".to_string(),
			});
		}
		state.depth = 0;
		if let Some(tx) = state.tx.take() {
			tx.rollback().await?;
		}
		Ok(())
	}

	pub async fn in_transaction(&self) -> bool {
		self.state.lock().await.depth > 0
	}

	/// Execute a write statement with bound parameters.
	pub async fn execute(
		&self,
		sql: &str,
		params: &[ColumnValue],
	) -> Result<ExecResult, BackendError> {
		debug!(sql, params = params.len(), "execute");
		let mut query = sqlx::query(sql);
		for value in params {
			query = bind_value(query, value);
		}
		let mut state = self.state.lock().await;
		let result = match state.tx.as_mut() {
			Some(tx) => query.execute(&mut **tx).await?,
			None => query.execute(&self.pool).await?,
		};
		Ok(ExecResult {
			rows_affected: result.rows_affected(),
			last_insert_id: result.last_insert_id(),
		})
	}

	/// Fetch all rows of a query with bound parameters.
	pub async fn fetch_all(
		&self,
		sql: &str,
		params: &[ColumnValue],
	) -> Result<Vec<MySqlRow>, BackendError> {
		debug!(sql, params = params.len(), "fetch_all");
		let mut query = sqlx::query(sql);
		for value in params {
			query = bind_value(query, value);
		}
		let mut state = self.state.lock().await;
		let rows = match state.tx.as_mut() {
			Some(tx) => query.fetch_all(&mut **tx).await?,
			None => query.fetch_all(&self.pool).await?,
		};
		Ok(rows)
	}

	/// Fetch at most one row.
	pub async fn fetch_optional(
		&self,
		sql: &str,
		params: &[ColumnValue],
	) -> Result<Option<MySqlRow>, BackendError> {
		debug!(sql, params = params.len(), "fetch_optional");
		let mut query = sqlx::query(sql);
		for value in params {
			query = bind_value(query, value);
		}
		let mut state = self.state.lock().await;
		let row = match state.tx.as_mut() {
			Some(tx) => query.fetch_optional(&mut **tx).await?,
			None => query.fetch_optional(&self.pool).await?,
		};
		Ok(row)
	}
}

/// Bind one column-native value to the next statement parameter.
fn bind_value<'q>(
	query: Query<'q, MySql, MySqlArguments>,
	value: &ColumnValue,
) -> Query<'q, MySql, MySqlArguments> {
	match value {
		ColumnValue::Null => query.bind(Option::<String>::None),
		ColumnValue::Int(v) => query.bind(*v),
		ColumnValue::UInt(v) => query.bind(*v),
		ColumnValue::Float(v) => query.bind(*v),
		ColumnValue::Decimal(d) => query.bind(*d),
		ColumnValue::Text(s) => query.bind(s.clone()),
		ColumnValue::Bytes(b) => query.bind(b.clone()),
		ColumnValue::Date(d) => query.bind(*d),
		ColumnValue::DateTime(dt) => query.bind(*dt),
		ColumnValue::Time(t) => query.bind(*t),
		ColumnValue::Json(v) => query.bind(v.clone()),
	}
}
