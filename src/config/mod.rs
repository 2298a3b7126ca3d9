//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::classifier::{
    ClassifyError, DEFAULT_THRESHOLD, DefaultClassifier, FallbackPolicy, FieldPath, Rule,
    RuleTable,
};

mod cli;

pub use cli::{
    CheckArgs, CliArgs, Command, CommonOverrides, ExportArgs, ImportArgs, ResetArgs, ShowArgs,
    SyncArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "blockvault";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_RECORD_ID: &str = "main";
const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
const DEFAULT_EVENT_CAPACITY: usize = 16;
const DEFAULT_RULE_WEIGHT: u32 = 1;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub classifier: ClassifierSettings,
    pub reconciler: ReconcilerSettings,
    pub baseline: BaselineSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` leaves the store unconfigured: loads find nothing, writes fail.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    /// Key of the single content record.
    pub record_id: String,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub threshold: NonZeroU32,
    pub fallback: FallbackPolicy,
    pub rules: RuleTable,
}

impl ClassifierSettings {
    pub fn build(&self) -> Result<DefaultClassifier, ClassifyError> {
        DefaultClassifier::new(self.rules.clone(), self.threshold, self.fallback)
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub debounce: Duration,
    pub reject_default_on_load: bool,
    pub reset_persists: bool,
    pub event_capacity: NonZeroUsize,
}

#[derive(Debug, Clone, Default)]
pub struct BaselineSettings {
    /// Replacement baseline file; the packaged baseline is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BLOCKVAULT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(command) => raw.apply_overrides(command.overrides()),
        None => raw.apply_overrides(&CommonOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    classifier: RawClassifierSettings,
    reconciler: RawReconcilerSettings,
    baseline: RawBaselineSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            classifier,
            reconciler,
            baseline,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let classifier = build_classifier_settings(classifier)?;
        let reconciler = build_reconciler_settings(reconciler)?;
        let baseline = build_baseline_settings(baseline)?;

        Ok(Self {
            logging,
            database,
            classifier,
            reconciler,
            baseline,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    let record_id = database
        .record_id
        .unwrap_or_else(|| DEFAULT_RECORD_ID.to_string());
    if record_id.trim().is_empty() {
        return Err(LoadError::invalid(
            "database.record_id",
            "record id must not be empty",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        record_id,
    })
}

fn build_classifier_settings(
    classifier: RawClassifierSettings,
) -> Result<ClassifierSettings, LoadError> {
    let threshold = non_zero_u32(
        classifier.threshold.unwrap_or(DEFAULT_THRESHOLD).into(),
        "classifier.threshold",
    )?;

    let fallback = match classifier.fallback {
        Some(value) => FallbackPolicy::from_str(&value)
            .map_err(|reason| LoadError::invalid("classifier.fallback", reason))?,
        None => FallbackPolicy::default(),
    };

    let rules = match classifier.rules {
        Some(rules) => RuleTable::new(
            rules
                .into_iter()
                .map(build_rule)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => RuleTable::standard(),
    };

    let settings = ClassifierSettings {
        threshold,
        fallback,
        rules,
    };
    settings
        .build()
        .map_err(|err| LoadError::invalid("classifier", err.to_string()))?;

    Ok(settings)
}

fn build_rule(rule: RawRuleSettings) -> Result<Rule, LoadError> {
    let weight = rule.weight.unwrap_or(DEFAULT_RULE_WEIGHT);
    if weight == 0 {
        return Err(LoadError::invalid(
            "classifier.rules.weight",
            "must be greater than zero",
        ));
    }

    match (rule.field, rule.equals, rule.present) {
        (Some(field), Some(expected), None) => {
            field
                .parse::<FieldPath>()
                .map_err(|err| LoadError::invalid("classifier.rules.field", err.to_string()))?;
            Ok(Rule::field_equals(field, expected, weight))
        }
        // Repeated ids are folded by `Rule::exactly_present`.
        (None, None, Some(ids)) if !ids.is_empty() => Ok(Rule::exactly_present(ids, weight)),
        (None, None, Some(_)) => Err(LoadError::invalid(
            "classifier.rules.present",
            "must list at least one block id",
        )),
        _ => Err(LoadError::invalid(
            "classifier.rules",
            "each rule needs either `field` with `equals`, or `present`",
        )),
    }
}

fn build_reconciler_settings(
    reconciler: RawReconcilerSettings,
) -> Result<ReconcilerSettings, LoadError> {
    let debounce = Duration::from_millis(reconciler.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));

    let capacity = reconciler.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
    let event_capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
        LoadError::invalid("reconciler.event_capacity", "must be greater than zero")
    })?;

    Ok(ReconcilerSettings {
        debounce,
        reject_default_on_load: reconciler.reject_default_on_load.unwrap_or(true),
        reset_persists: reconciler.reset_persists.unwrap_or(false),
        event_capacity,
    })
}

fn build_baseline_settings(baseline: RawBaselineSettings) -> Result<BaselineSettings, LoadError> {
    if let Some(path) = baseline.path.as_ref()
        && path.as_os_str().is_empty()
    {
        return Err(LoadError::invalid("baseline.path", "path must not be empty"));
    }

    Ok(BaselineSettings {
        path: baseline.path,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    record_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawClassifierSettings {
    threshold: Option<u32>,
    fallback: Option<String>,
    rules: Option<Vec<RawRuleSettings>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRuleSettings {
    field: Option<String>,
    equals: Option<String>,
    present: Option<Vec<String>>,
    weight: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReconcilerSettings {
    debounce_ms: Option<u64>,
    reject_default_on_load: Option<bool>,
    reset_persists: Option<bool>,
    event_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBaselineSettings {
    path: Option<PathBuf>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
