use std::{str::FromStr, time::Duration};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{Result, schema};

pub struct Db {
	pub pool: SqlitePool,
}
impl Db {
	pub async fn connect(cfg: &nb_config::Sqlite) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(&cfg.dsn)?
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal)
			.busy_timeout(Duration::from_secs(5));
		let pool =
			SqlitePoolOptions::new().max_connections(cfg.pool_max_conns).connect_with(options).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
