//! Site content snapshot and its blocks.
//!
//! A snapshot is the whole editable state of the site. Fields the persistence
//! layer does not interpret (block bodies, images, top-level metadata) are kept
//! verbatim in the `extra`/`metadata` maps so that a load/save cycle never drops
//! data written by a newer editor.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use super::error::DomainError;

/// Kind of a content block. Unknown kinds round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Hero,
    Features,
    Modules,
    Module,
    Videos,
    Contacts,
    Custom,
    Other(String),
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Hero => "hero",
            BlockType::Features => "features",
            BlockType::Modules => "modules",
            BlockType::Module => "module",
            BlockType::Videos => "videos",
            BlockType::Contacts => "contacts",
            BlockType::Custom => "custom",
            BlockType::Other(value) => value.as_str(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, BlockType::Custom)
    }
}

impl From<String> for BlockType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "hero" => BlockType::Hero,
            "features" => BlockType::Features,
            "modules" => BlockType::Modules,
            "module" => BlockType::Module,
            "videos" => BlockType::Videos,
            "contacts" => BlockType::Contacts,
            "custom" => BlockType::Custom,
            _ => BlockType::Other(value),
        }
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One editable section of the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "price_from_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            price: None,
            order: 0,
            extra: Map::new(),
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Copy of this block placed at `order`.
    pub fn reordered(&self, order: i64) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }
}

// Older editors stored prices as JSON numbers.
fn price_from_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(price)) => Ok(Some(price)),
        Some(Value::Number(price)) => Ok(Some(price.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "price must be a string or number, got `{other}`"
        ))),
    }
}

/// Complete editable state of the site at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ContentSnapshot {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            metadata: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    /// Blocks sorted by display order; ties keep their stored sequence.
    pub fn sorted_blocks(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.blocks.iter().collect();
        blocks.sort_by_key(|block| block.order);
        blocks
    }

    /// Check that block ids are unique.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(DomainError::duplicate_block(block.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_block_types_round_trip() {
        let json = r#"{"id":"promo","type":"banner","title":"Sale","order":9}"#;
        let block: Block = serde_json::from_str(json).expect("parse block");
        assert_eq!(block.kind, BlockType::Other("banner".into()));

        let encoded = serde_json::to_value(&block).expect("encode block");
        assert_eq!(encoded["type"], "banner");
    }

    #[test]
    fn extra_fields_are_preserved() {
        let json = r#"{
            "blocks": [{"id":"hero","type":"hero","title":"Hi","order":1,"subtitle":"More","images":["a.png"]}],
            "lastModified": "2024-05-01"
        }"#;
        let snapshot: ContentSnapshot = serde_json::from_str(json).expect("parse snapshot");

        let hero = snapshot.block("hero").expect("hero present");
        assert_eq!(hero.extra["subtitle"], "More");
        assert_eq!(snapshot.metadata["lastModified"], "2024-05-01");

        let encoded = serde_json::to_value(&snapshot).expect("encode snapshot");
        assert_eq!(encoded["blocks"][0]["images"][0], "a.png");
        assert_eq!(encoded["lastModified"], "2024-05-01");
    }

    #[test]
    fn numeric_prices_are_read_as_strings() {
        let json = r#"{"id":"can-module","type":"module","title":"CAN","price":2500,"order":4}"#;
        let block: Block = serde_json::from_str(json).expect("parse block");
        assert_eq!(block.price.as_deref(), Some("2500"));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let snapshot = ContentSnapshot::new(vec![
            Block::new("hero", BlockType::Hero, "One"),
            Block::new("hero", BlockType::Hero, "Two"),
        ]);

        let err = snapshot.validate().expect_err("duplicate ids");
        assert!(matches!(err, DomainError::DuplicateBlock { ref id } if id == "hero"));
    }

    #[test]
    fn sorted_blocks_orders_by_rank() {
        let snapshot = ContentSnapshot::new(vec![
            Block::new("contacts", BlockType::Contacts, "").with_order(51),
            Block::new("hero", BlockType::Hero, "").with_order(1),
            Block::new("extra", BlockType::Custom, "").with_order(7),
        ]);

        let ids: Vec<&str> = snapshot
            .sorted_blocks()
            .into_iter()
            .map(|block| block.id.as_str())
            .collect();
        assert_eq!(ids, ["hero", "extra", "contacts"]);
    }

    #[test]
    fn reordered_leaves_original_untouched() {
        let block = Block::new("hero", BlockType::Hero, "Title").with_order(4);
        let moved = block.reordered(1);
        assert_eq!(block.order, 4);
        assert_eq!(moved.order, 1);
        assert_eq!(moved.title, "Title");
    }
}
