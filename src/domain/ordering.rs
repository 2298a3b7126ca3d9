//! Deterministic display ordering for content blocks.
//!
//! System blocks occupy fixed ranks 1–6, user-created `custom` blocks follow
//! contiguously from 7 in their stored sequence, and the trailing video and
//! contact sections sit at 50/51 so custom blocks never collide with them.
//! Every other block keeps the order it was stored with.

use super::content::{Block, ContentSnapshot};

/// Fixed ranks for system blocks, matched by id.
pub const RESERVED_ORDERS: [(&str, i64); 6] = [
    ("hero", 1),
    ("features", 2),
    ("modules", 3),
    ("can-module", 4),
    ("analog-module", 5),
    ("ops-module", 6),
];

/// Rank assigned to the first custom block.
pub const CUSTOM_ORDER_START: i64 = 7;

/// Fixed ranks for trailing blocks, matched by id.
pub const TRAILING_ORDERS: [(&str, i64); 2] = [("videos", 50), ("contacts", 51)];

fn reserved_order(id: &str) -> Option<i64> {
    RESERVED_ORDERS
        .iter()
        .find(|(reserved, _)| *reserved == id)
        .map(|(_, order)| *order)
}

fn trailing_order(id: &str) -> Option<i64> {
    TRAILING_ORDERS
        .iter()
        .find(|(trailing, _)| *trailing == id)
        .map(|(_, order)| *order)
}

/// Return a copy of `snapshot` whose block orders satisfy the display layout.
///
/// The block sequence itself is left as stored; only `order` values change.
/// Applying this twice yields the same orders as applying it once.
pub fn normalize_order(snapshot: &ContentSnapshot) -> ContentSnapshot {
    let mut next_custom = CUSTOM_ORDER_START;

    let blocks = snapshot
        .blocks
        .iter()
        .map(|block| {
            if let Some(order) = reserved_order(&block.id) {
                return block.reordered(order);
            }
            if block.kind.is_custom() {
                let order = next_custom;
                next_custom += 1;
                return block.reordered(order);
            }
            if let Some(order) = trailing_order(&block.id) {
                return block.reordered(order);
            }
            block.clone()
        })
        .collect::<Vec<Block>>();

    ContentSnapshot {
        blocks,
        metadata: snapshot.metadata.clone(),
    }
}
