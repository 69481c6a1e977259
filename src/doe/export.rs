//! Opening-book export (spec §6.5): flattens a persisted DOE tree into a
//! portable, serde-friendly format external tooling (UCI adapters, book
//! loaders) can consume without depending on the store backend.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::EngineError;
use crate::game::Move;

use super::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct BookEntry {
    pub hash: u64,
    pub mv: Move,
    pub score: f64,
    pub count: u64,
    pub parent_hash: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookExport {
    pub signature: &'static str,
    pub generated_at: u64,
    pub entry_count: usize,
    pub entries: Vec<BookEntry>,
}

const BOOK_SIGNATURE: &str = "negauct-opening-book-v1";

/// Flattens every evaluated, non-root node in `store` into a `BookExport`.
/// `generated_at` is a caller-supplied Unix timestamp (this crate never
/// calls `SystemTime::now()` itself so callers control how time enters
/// the export).
pub fn export_book<S: Store>(store: &mut S, generated_at: u64) -> Result<BookExport, EngineError> {
    let nodes = store.values()?;
    let hash_by_id: HashMap<u64, u64> = nodes.iter().map(|n| (n.id, n.hash)).collect();

    let entries = nodes
        .iter()
        .filter(|n| n.id != 1 && n.evaluated)
        .map(|n| BookEntry {
            hash: n.hash,
            mv: n.mv,
            score: n.score,
            count: n.count,
            parent_hash: n.parent.and_then(|p| hash_by_id.get(&p).copied()),
        })
        .collect::<Vec<_>>();

    Ok(BookExport {
        signature: BOOK_SIGNATURE,
        generated_at,
        entry_count: entries.len(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doe::node::DoeNode;
    use crate::doe::store::SqliteStore;
    use crate::game::Player;
    use std::path::Path;

    #[test]
    fn export_skips_root_and_unevaluated_nodes() {
        let mut store = SqliteStore::open(Path::new(":memory:")).unwrap();
        let root = DoeNode::root(1, Player::South, 0);
        store.write(&root).unwrap();

        let mut evaluated_child = DoeNode::child(1, vec![3], 3, 2, Player::North);
        evaluated_child.evaluated = true;
        evaluated_child.init_score(0.5);
        let evaluated_id = store.write(&evaluated_child).unwrap();

        let mut pending_child = DoeNode::child(1, vec![4], 4, 9, Player::North);
        pending_child.evaluated = false;
        store.write(&pending_child).unwrap();
        store.commit().unwrap();

        let book = export_book(&mut store, 1_700_000_000).unwrap();
        assert_eq!(book.entry_count, 1);
        assert_eq!(book.entries[0].hash, 2);
        assert_eq!(book.entries[0].parent_hash, Some(1));
        let _ = evaluated_id;
    }
}
