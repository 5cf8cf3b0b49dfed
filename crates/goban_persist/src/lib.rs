//! Optional Postgres persistence for rooms, accepted/rejected moves, and
//! board snapshots.
//!
//! The in-memory core never depends on this crate; [`RoomActor`](goban_room::RoomActor)
//! talks to persistence only through the [`goban_room::RoomPersistence`]
//! trait, whose default implementation is a no-op. This mirrors
//! `valence_network`'s best-effort, non-blocking callback design: a fallible
//! side effect the core invokes without depending on its success.

mod schema;

use async_trait::async_trait;
use goban_core::Cell;
use goban_room::RoomPersistence;
use schema::SCHEMA_SQL;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Errors that can occur setting up the persistence adapter itself.
/// Per-event write failures are logged, not surfaced through this type.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to connect to postgres")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply schema")]
    Schema(#[source] sqlx::Error),
}

/// A Postgres-backed [`RoomPersistence`] adapter.
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Connects to `database_url` and ensures the schema described in
    /// `schema.rs` exists.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(PersistenceError::Connect)?;
        let adapter = Self { pool };
        adapter.ensure_schema().await?;
        Ok(adapter)
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::Schema)?;
        Ok(())
    }

    /// Finds the room row for `room_id`, creating it on first reference.
    async fn room_row_id(&self, room_id: &str) -> Result<Uuid, sqlx::Error> {
        if let Some(row) = sqlx::query("SELECT id FROM rooms WHERE name = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
        {
            return row.try_get("id");
        }

        let row = sqlx::query(
            "INSERT INTO rooms (name, created_at, updated_at)
             VALUES ($1, now(), now())
             ON CONFLICT (name) DO UPDATE SET updated_at = now()
             RETURNING id",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        row.try_get("id")
    }
}

#[async_trait]
impl RoomPersistence for PostgresPersistence {
    async fn on_move(&self, room_id: &str, x: i64, y: i64, color_byte: u8, accepted: bool, server_seq: u64) {
        let room = match self.room_row_id(room_id).await {
            Ok(id) => id,
            Err(error) => {
                warn!(room = room_id, %error, "failed to resolve room row for move");
                return;
            }
        };

        #[allow(clippy::cast_possible_wrap)]
        let server_seq = server_seq as i64;
        let color = i16::from(color_byte);

        let result = sqlx::query(
            "INSERT INTO moves (room_id, x, y, color, server_seq, accepted)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(room)
        .bind(x)
        .bind(y)
        .bind(color)
        .bind(server_seq)
        .bind(accepted)
        .execute(&self.pool)
        .await;

        if let Err(error) = result {
            warn!(room = room_id, %error, "failed to record move");
            return;
        }

        if accepted {
            if let Err(error) = sqlx::query("UPDATE rooms SET server_seq = $1, updated_at = now() WHERE id = $2")
                .bind(server_seq)
                .bind(room)
                .execute(&self.pool)
                .await
            {
                warn!(room = room_id, %error, "failed to update room sequence");
            }
        }
    }

    async fn on_reset(&self, room_id: &str, server_seq: u64) {
        let Ok(room) = self.room_row_id(room_id).await else {
            warn!(room = room_id, "failed to resolve room row for reset");
            return;
        };

        #[allow(clippy::cast_possible_wrap)]
        let server_seq = server_seq as i64;
        if let Err(error) = sqlx::query("UPDATE rooms SET server_seq = $1, updated_at = now() WHERE id = $2")
            .bind(server_seq)
            .bind(room)
            .execute(&self.pool)
            .await
        {
            warn!(room = room_id, %error, "failed to record reset");
        }
    }

    async fn on_presence_change(&self, room_id: &str, connection_count: usize) {
        let Ok(room) = self.room_row_id(room_id).await else {
            warn!(room = room_id, "failed to resolve room row for presence change");
            return;
        };

        #[allow(clippy::cast_possible_wrap)]
        let count = connection_count as i32;
        if let Err(error) = sqlx::query("UPDATE rooms SET current_players = $1, updated_at = now() WHERE id = $2")
            .bind(count)
            .bind(room)
            .execute(&self.pool)
            .await
        {
            warn!(room = room_id, %error, "failed to record presence change");
        }
    }

    async fn on_snapshot(&self, room_id: &str, server_seq: u64, cells: &[Cell]) {
        let Ok(room) = self.room_row_id(room_id).await else {
            warn!(room = room_id, "failed to resolve room row for snapshot");
            return;
        };

        let state_data = match serde_json::to_value(cells) {
            Ok(value) => value,
            Err(error) => {
                warn!(room = room_id, %error, "failed to serialize snapshot");
                return;
            }
        };

        #[allow(clippy::cast_possible_wrap)]
        let server_seq = server_seq as i64;
        let result = sqlx::query(
            "INSERT INTO game_states (room_id, server_seq, state_data)
             VALUES ($1, $2, $3)
             ON CONFLICT (room_id, server_seq) DO NOTHING",
        )
        .bind(room)
        .bind(server_seq)
        .bind(state_data)
        .execute(&self.pool)
        .await;

        if let Err(error) = result {
            warn!(room = room_id, %error, "failed to record snapshot");
        }
    }
}
