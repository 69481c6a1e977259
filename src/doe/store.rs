//! The DOE persistence contract (spec §4.5/§6.5) and a `rusqlite`-backed
//! implementation, generalizing `database/init.rs` / `database/chess_table.rs`'s
//! schema-and-connection pattern from a chess-specific FEN/moves table
//! to a generic node table.

use std::path::{Path, PathBuf};

use directories_next::ProjectDirs;
use rusqlite::{params, Connection};

use crate::error::EngineError;

use super::node::DoeNode;

/// A transactional key-value mapping `id -> DoeNode`. Writes are
/// buffered until `commit()`; the root's id is always `1`.
pub trait Store {
    fn read(&mut self, id: u64) -> Result<Option<DoeNode>, EngineError>;
    /// Persists `node`. If `node.id == 0`, the store assigns a fresh id
    /// and returns it; otherwise `node.id` is used as given (this is how
    /// the root is pinned to id `1`).
    fn write(&mut self, node: &DoeNode) -> Result<u64, EngineError>;
    fn contains(&mut self, id: u64) -> Result<bool, EngineError>;
    fn values(&mut self) -> Result<Vec<DoeNode>, EngineError>;
    fn count(&mut self) -> Result<usize, EngineError>;
    fn commit(&mut self) -> Result<(), EngineError>;
    fn rollback(&mut self) -> Result<(), EngineError>;
    fn close(self) -> Result<(), EngineError>;
}

fn store_err(e: rusqlite::Error) -> EngineError {
    EngineError::StoreFailure(e.to_string())
}

/// The platform data directory's opening-book database, following
/// `database::init::get_db_path`'s `ProjectDirs` convention.
pub fn default_store_path() -> PathBuf {
    let dirs = ProjectDirs::from("com", "negauct", "negauct")
        .expect("could not determine the platform data directory");
    std::fs::create_dir_all(dirs.data_dir()).expect("failed to create data directory");
    dirs.data_dir().join("doe_tree.sqlite")
}

pub struct SqliteStore {
    conn: Connection,
    next_id: u64,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                parent INTEGER,
                children TEXT NOT NULL,
                hash INTEGER NOT NULL,
                mv INTEGER NOT NULL,
                moves TEXT NOT NULL,
                turn INTEGER NOT NULL,
                evaluated INTEGER NOT NULL,
                terminal INTEGER NOT NULL,
                expanded INTEGER NOT NULL,
                cursor INTEGER NOT NULL,
                reset_cursor INTEGER NOT NULL,
                count INTEGER NOT NULL,
                score REAL NOT NULL
            );
            BEGIN;",
        )
        .map_err(store_err)?;

        let next_id: u64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM nodes", [], |row| row.get(0))
            .map_err(store_err)?;

        Ok(SqliteStore {
            conn,
            next_id: next_id.max(1),
        })
    }

    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<DoeNode> {
        let children_json: String = row.get("children")?;
        let moves_json: String = row.get("moves")?;
        let turn_raw: i32 = row.get("turn")?;
        Ok(DoeNode {
            id: row.get("id")?,
            parent: row.get("parent")?,
            children: serde_json::from_str(&children_json).unwrap_or_default(),
            hash: row.get::<_, i64>("hash")? as u64,
            mv: row.get("mv")?,
            moves: serde_json::from_str(&moves_json).unwrap_or_default(),
            turn: if turn_raw >= 0 {
                crate::game::Player::South
            } else {
                crate::game::Player::North
            },
            evaluated: row.get::<_, i64>("evaluated")? != 0,
            terminal: row.get::<_, i64>("terminal")? != 0,
            expanded: row.get::<_, i64>("expanded")? != 0,
            cursor: row.get("cursor")?,
            reset_cursor: row.get("reset_cursor")?,
            count: row.get::<_, i64>("count")? as u64,
            score: row.get("score")?,
        })
    }
}

impl Store for SqliteStore {
    fn read(&mut self, id: u64) -> Result<Option<DoeNode>, EngineError> {
        self.conn
            .query_row(
                "SELECT * FROM nodes WHERE id = ?1",
                params![id as i64],
                Self::row_to_node,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })
    }

    fn write(&mut self, node: &DoeNode) -> Result<u64, EngineError> {
        let id = if node.id == 0 {
            self.next_id += 1;
            self.next_id
        } else {
            node.id
        };
        let children_json = serde_json::to_string(&node.children)
            .map_err(|e| EngineError::StoreFailure(e.to_string()))?;
        let moves_json = serde_json::to_string(&node.moves)
            .map_err(|e| EngineError::StoreFailure(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO nodes (id, parent, children, hash, mv, moves, turn, evaluated, terminal, expanded, cursor, reset_cursor, count, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                    parent=excluded.parent, children=excluded.children, hash=excluded.hash,
                    mv=excluded.mv, moves=excluded.moves, turn=excluded.turn,
                    evaluated=excluded.evaluated, terminal=excluded.terminal, expanded=excluded.expanded,
                    cursor=excluded.cursor, reset_cursor=excluded.reset_cursor, count=excluded.count, score=excluded.score",
                params![
                    id as i64,
                    node.parent.map(|p| p as i64),
                    children_json,
                    node.hash as i64,
                    node.mv,
                    moves_json,
                    node.turn as i32,
                    node.evaluated as i64,
                    node.terminal as i64,
                    node.expanded as i64,
                    node.cursor,
                    node.reset_cursor,
                    node.count as i64,
                    node.score,
                ],
            )
            .map_err(store_err)?;
        Ok(id)
    }

    fn contains(&mut self, id: u64) -> Result<bool, EngineError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE id = ?1",
                params![id as i64],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(count > 0)
    }

    fn values(&mut self) -> Result<Vec<DoeNode>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM nodes")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], Self::row_to_node)
            .map_err(store_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(store_err)?);
        }
        Ok(out)
    }

    fn count(&mut self) -> Result<usize, EngineError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(count as usize)
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.conn.execute_batch("COMMIT; BEGIN;").map_err(store_err)
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        self.conn.execute_batch("ROLLBACK; BEGIN;").map_err(store_err)
    }

    fn close(self) -> Result<(), EngineError> {
        self.conn.execute_batch("COMMIT;").map_err(store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;

    #[test]
    fn root_round_trips_at_id_one() {
        let mut store = SqliteStore::open(Path::new(":memory:")).unwrap();
        let root = DoeNode::root(42, Player::South, 0);
        let id = store.write(&root).unwrap();
        assert_eq!(id, 1);
        store.commit().unwrap();

        let fetched = store.read(1).unwrap().unwrap();
        assert_eq!(fetched.hash, 42);
        assert!(fetched.evaluated);
    }

    #[test]
    fn unassigned_ids_are_allocated_sequentially() {
        let mut store = SqliteStore::open(Path::new(":memory:")).unwrap();
        let root = DoeNode::root(1, Player::South, 0);
        store.write(&root).unwrap();

        let child = DoeNode::child(1, vec![0], 0, 2, Player::North);
        let id = store.write(&child).unwrap();
        assert_eq!(id, 2);
        store.commit().unwrap();
        assert!(store.contains(2).unwrap());
    }

    #[test]
    fn rollback_discards_uncommitted_writes() {
        let mut store = SqliteStore::open(Path::new(":memory:")).unwrap();
        let root = DoeNode::root(1, Player::South, 0);
        store.write(&root).unwrap();
        store.commit().unwrap();

        let mut dirty = store.read(1).unwrap().unwrap();
        dirty.score = 99.0;
        store.write(&dirty).unwrap();
        store.rollback().unwrap();

        let reread = store.read(1).unwrap().unwrap();
        assert_eq!(reread.score, 0.0);
    }
}
