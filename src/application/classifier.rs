//! Placeholder-content detection.
//!
//! A snapshot is scored against a table of weighted rules describing the
//! packaged baseline. When the score reaches the threshold the snapshot is
//! treated as "basically default": it must not be persisted, and a stored
//! record that looks like this is not trusted. Partial matches are intended,
//! so a baseline with one unrelated edit is still caught while a heavily
//! customised site is not.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::content::{Block, ContentSnapshot};

pub const DEFAULT_THRESHOLD: u32 = 3;

const BASELINE_HERO_TITLE: &str = "ПІДМОТКА СПІДОМЕТРА — У ВАШИХ РУКАХ";
const BASELINE_MODULE_IDS: [&str; 3] = ["can-module", "analog-module", "ops-module"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("block id `{id}` is ambiguous: it appears more than once")]
    AmbiguousBlock { id: String },
    #[error("invalid field path `{path}`: expected `<block-id>.<title|price>`")]
    InvalidFieldPath { path: String },
    #[error("threshold {threshold} exceeds the total rule weight {total}")]
    UnreachableThreshold { threshold: u32, total: u32 },
    #[error("rule table is empty")]
    EmptyRuleTable,
    #[error("rule weights overflow")]
    WeightOverflow,
}

/// What to answer when a snapshot cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Treat the snapshot as user content; saves keep flowing.
    #[default]
    Permissive,
    /// Treat the snapshot as placeholder content; saves are blocked.
    Strict,
}

impl FallbackPolicy {
    pub fn as_verdict(self) -> bool {
        matches!(self, FallbackPolicy::Strict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FallbackPolicy::Permissive => "permissive",
            FallbackPolicy::Strict => "strict",
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown fallback policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockField {
    Title,
    Price,
}

impl BlockField {
    fn read(self, block: &Block) -> Option<&str> {
        match self {
            BlockField::Title => Some(block.title.as_str()),
            BlockField::Price => block.price.as_deref(),
        }
    }
}

/// `<block-id>.<field>`, split on the last dot so ids may contain dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub block_id: String,
    pub field: BlockField,
}

impl FromStr for FieldPath {
    type Err = ClassifyError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let invalid = || ClassifyError::InvalidFieldPath {
            path: path.to_string(),
        };
        let (block_id, field) = path.rsplit_once('.').ok_or_else(invalid)?;
        if block_id.is_empty() {
            return Err(invalid());
        }
        let field = match field {
            "title" => BlockField::Title,
            "price" => BlockField::Price,
            _ => return Err(invalid()),
        };
        Ok(Self {
            block_id: block_id.to_string(),
            field,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The block at `path` exists and its field equals `expected`.
    FieldEquals { path: String, expected: String },
    /// Exactly these ids are present among the blocks, no more, no fewer.
    /// Repeated ids in the list count once.
    ExactlyPresent { ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub condition: Condition,
    pub weight: u32,
}

impl Rule {
    pub fn field_equals(path: impl Into<String>, expected: impl Into<String>, weight: u32) -> Self {
        Self {
            condition: Condition::FieldEquals {
                path: path.into(),
                expected: expected.into(),
            },
            weight,
        }
    }

    pub fn exactly_present<I, S>(ids: I, weight: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self {
            condition: Condition::ExactlyPresent { ids },
            weight,
        }
    }

    pub fn label(&self) -> String {
        match &self.condition {
            Condition::FieldEquals { path, .. } => path.clone(),
            Condition::ExactlyPresent { ids } => format!("present[{}]", ids.join(",")),
        }
    }

    fn matches(&self, snapshot: &ContentSnapshot) -> Result<bool, ClassifyError> {
        match &self.condition {
            Condition::FieldEquals { path, expected } => {
                let path: FieldPath = path.parse()?;
                let mut candidates = snapshot
                    .blocks
                    .iter()
                    .filter(|block| block.id == path.block_id);
                let block = candidates.next();
                if candidates.next().is_some() {
                    return Err(ClassifyError::AmbiguousBlock { id: path.block_id });
                }
                Ok(block
                    .and_then(|block| path.field.read(block))
                    .is_some_and(|value| value == expected))
            }
            Condition::ExactlyPresent { ids } => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let present = snapshot
                    .blocks
                    .iter()
                    .filter(|block| wanted.contains(block.id.as_str()))
                    .count();
                Ok(present == wanted.len())
            }
        }
    }
}

/// Ordered set of weighted rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules describing the packaged baseline: hero title, the three module
    /// prices, and the presence of exactly the three pricing modules.
    pub fn standard() -> Self {
        Self::new(vec![
            Rule::field_equals("hero.title", BASELINE_HERO_TITLE, 1),
            Rule::field_equals("can-module.price", "2500", 1),
            Rule::field_equals("analog-module.price", "1800", 1),
            Rule::field_equals("ops-module.price", "3200", 1),
            Rule::exactly_present(BASELINE_MODULE_IDS, 1),
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn total_weight(&self) -> Result<u32, ClassifyError> {
        self.rules.iter().try_fold(0u32, |total, rule| {
            total
                .checked_add(rule.weight)
                .ok_or(ClassifyError::WeightOverflow)
        })
    }
}

/// Outcome of scoring one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: u32,
    pub threshold: u32,
    pub total_weight: u32,
    pub matched: Vec<String>,
}

impl Verdict {
    pub fn is_default(&self) -> bool {
        self.score >= self.threshold
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (threshold {}): {}",
            self.score,
            self.total_weight,
            self.threshold,
            if self.is_default() { "default" } else { "user content" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    table: RuleTable,
    threshold: NonZeroU32,
    fallback: FallbackPolicy,
}

impl DefaultClassifier {
    pub fn new(
        table: RuleTable,
        threshold: NonZeroU32,
        fallback: FallbackPolicy,
    ) -> Result<Self, ClassifyError> {
        if table.rules.is_empty() {
            return Err(ClassifyError::EmptyRuleTable);
        }
        let total = table.total_weight()?;
        if threshold.get() > total {
            return Err(ClassifyError::UnreachableThreshold {
                threshold: threshold.get(),
                total,
            });
        }
        Ok(Self {
            table,
            threshold,
            fallback,
        })
    }

    /// Standard rule table, threshold 3 of 5, permissive fallback.
    pub fn standard() -> Self {
        Self {
            table: RuleTable::standard(),
            threshold: NonZeroU32::new(DEFAULT_THRESHOLD).unwrap_or(NonZeroU32::MIN),
            fallback: FallbackPolicy::Permissive,
        }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.get()
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Score `snapshot` against the rule table.
    ///
    /// Duplicate block ids only fail the evaluation when a field rule reads
    /// one of them; elsewhere the snapshot is scored as usual.
    pub fn evaluate(&self, snapshot: &ContentSnapshot) -> Result<Verdict, ClassifyError> {
        let mut score = 0u32;
        let mut matched = Vec::new();
        for rule in &self.table.rules {
            if rule.matches(snapshot)? {
                score = score
                    .checked_add(rule.weight)
                    .ok_or(ClassifyError::WeightOverflow)?;
                matched.push(rule.label());
            }
        }

        Ok(Verdict {
            score,
            threshold: self.threshold.get(),
            total_weight: self.table.total_weight()?,
            matched,
        })
    }

    /// Whether `snapshot` is placeholder content. Never fails: when the
    /// snapshot cannot be scored the configured fallback answers.
    pub fn is_default(&self, snapshot: &ContentSnapshot) -> bool {
        match self.evaluate(snapshot) {
            Ok(verdict) if verdict.is_default() => {
                info!(
                    score = verdict.score,
                    threshold = verdict.threshold,
                    matched = ?verdict.matched,
                    "Snapshot classified as default content"
                );
                true
            }
            Ok(verdict) => {
                debug!(
                    score = verdict.score,
                    threshold = verdict.threshold,
                    "Snapshot classified as user content"
                );
                false
            }
            Err(error) => {
                let verdict = self.fallback.as_verdict();
                warn!(
                    error = %error,
                    fallback = self.fallback.as_str(),
                    is_default = verdict,
                    "Default-content check failed; applying fallback"
                );
                verdict
            }
        }
    }
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        Self::standard()
    }
}
