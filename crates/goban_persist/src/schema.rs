//! Schema for the optional persistence layer, translated from the original
//! implementation's GORM models (`rooms`, `game_states`, `chunks`, `moves`,
//! `players`) into plain `CREATE TABLE IF NOT EXISTS` statements so the
//! adapter can bring up its own schema without a separate migration tool.

pub(crate) const SCHEMA_SQL: &str = r"
CREATE EXTENSION IF NOT EXISTS pgcrypto;

CREATE TABLE IF NOT EXISTS rooms (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    is_active BOOLEAN NOT NULL DEFAULT true,
    max_players INTEGER NOT NULL DEFAULT 0,
    current_players INTEGER NOT NULL DEFAULT 0,
    server_seq BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS game_states (
    id BIGSERIAL PRIMARY KEY,
    room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    server_seq BIGINT NOT NULL,
    state_data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (room_id, server_seq)
);

CREATE TABLE IF NOT EXISTS chunks (
    id BIGSERIAL PRIMARY KEY,
    room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    chunk_x INTEGER NOT NULL,
    chunk_y INTEGER NOT NULL,
    cells JSONB NOT NULL,
    stone_count INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (room_id, chunk_x, chunk_y)
);

CREATE TABLE IF NOT EXISTS moves (
    id BIGSERIAL PRIMARY KEY,
    room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    player_id TEXT,
    x BIGINT NOT NULL,
    y BIGINT NOT NULL,
    color SMALLINT NOT NULL,
    server_seq BIGINT NOT NULL,
    accepted BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS players (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    color SMALLINT,
    stone_count INTEGER NOT NULL DEFAULT 0,
    connected_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    last_seen_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    is_connected BOOLEAN NOT NULL DEFAULT true
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_every_table_from_the_original_models() {
        for table in ["rooms", "game_states", "chunks", "moves", "players"] {
            assert!(
                SCHEMA_SQL.contains(&format!("TABLE IF NOT EXISTS {table}")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn cascading_tables_reference_rooms_on_delete() {
        for table_marker in ["game_states", "chunks", "moves", "players"] {
            let section_start = SCHEMA_SQL.find(table_marker).unwrap();
            let section = &SCHEMA_SQL[section_start..];
            assert!(section.contains("REFERENCES rooms(id) ON DELETE CASCADE"));
        }
    }
}
