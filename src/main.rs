use std::{path::Path, process};

use blockvault::{
    application::{
        classifier::Verdict,
        error::AppError,
        interchange,
        reconciler::{ContentReconciler, ContentSource, ReconcilerConfig, SaveOutcome},
        repos::RepoError,
    },
    config,
    domain::content::ContentSnapshot,
    infra::{baseline, db, error::InfraError, telemetry},
};
use serde_json::{Value, json};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?error.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?error.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args.command_or_default();

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let reconciler = build_reconciler(&settings)?;

    let result = match command {
        config::Command::Show(args) => run_show(&reconciler, args.sorted).await,
        config::Command::Export(args) => run_export(&reconciler, &args.file).await,
        config::Command::Import(args) => run_import(&reconciler, &args.file, args.debounced).await,
        config::Command::Check(args) => run_check(&reconciler, &args.file).await,
        config::Command::Reset(_) => run_reset(&reconciler).await,
        config::Command::Sync(_) => run_sync(&reconciler).await,
    };

    if let Some(outcome) = reconciler.flush().await {
        info!(?outcome, "Flushed pending save before exit");
    }

    result
}

fn build_reconciler(settings: &config::Settings) -> Result<ContentReconciler, AppError> {
    let store = db::content_store(&settings.database)?;
    let baseline = baseline::load(&settings.baseline)?;
    let classifier = settings.classifier.build()?;
    let store_kind = if settings.database.url.is_some() {
        "postgres"
    } else {
        "unconfigured"
    };

    info!(
        store = store_kind,
        threshold = classifier.threshold(),
        fallback = classifier.fallback().as_str(),
        debounce = ?settings.reconciler.debounce,
        "Content reconciler ready"
    );

    Ok(ContentReconciler::new(
        store,
        classifier,
        baseline,
        ReconcilerConfig::from(&settings.reconciler),
    ))
}

async fn run_show(reconciler: &ContentReconciler, sorted: bool) -> Result<(), AppError> {
    let loaded = reconciler.load_with_source().await;
    match loaded.source {
        ContentSource::Stored => info!("Showing stored content"),
        ContentSource::Baseline(reason) => {
            info!(reason = reason.as_str(), "Showing baseline content")
        }
    }

    let snapshot = if sorted {
        ContentSnapshot {
            blocks: loaded.snapshot.sorted_blocks().into_iter().cloned().collect(),
            metadata: loaded.snapshot.metadata.clone(),
        }
    } else {
        loaded.snapshot
    };

    print_text(&interchange::export_content(&snapshot)?);
    Ok(())
}

async fn run_export(reconciler: &ContentReconciler, path: &Path) -> Result<(), AppError> {
    info!(
        target = "blockvault::export",
        path = %path.display(),
        "Starting export"
    );

    let text = reconciler.export_current().await?;
    tokio::fs::write(path, text)
        .await
        .map_err(|err| InfraError::file(path, err))?;

    info!(target = "blockvault::export", "Export completed");
    Ok(())
}

async fn run_import(
    reconciler: &ContentReconciler,
    path: &Path,
    debounced: bool,
) -> Result<(), AppError> {
    info!(
        target = "blockvault::import",
        path = %path.display(),
        debounced,
        "Starting import"
    );

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| InfraError::file(path, err))?;

    let mut events = reconciler.subscribe();
    let outcome = match reconciler.import_and_save(&text, !debounced).await? {
        SaveOutcome::Scheduled => match events.recv().await {
            Ok(event) if event.success => SaveOutcome::Written,
            Ok(event) => SaveOutcome::Failed {
                error: event.error.unwrap_or_default(),
            },
            Err(err) => return Err(AppError::unexpected(format!("save event lost: {err}"))),
        },
        other => other,
    };

    match outcome {
        SaveOutcome::Written => {
            info!(target = "blockvault::import", "Import completed");
            print_json(&json!({ "saved": true }));
            Ok(())
        }
        SaveOutcome::Blocked(reason) => {
            warn!(
                target = "blockvault::import",
                reason = reason.as_str(),
                "Import was not saved"
            );
            print_json(&json!({ "saved": false, "reason": reason.as_str() }));
            Err(AppError::validation(format!(
                "content was not saved: {}",
                reason.as_str()
            )))
        }
        SaveOutcome::Failed { error } => Err(RepoError::from_persistence(error).into()),
        SaveOutcome::Scheduled => Err(AppError::unexpected("save left pending")),
    }
}

async fn run_check(reconciler: &ContentReconciler, path: &Path) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| InfraError::file(path, err))?;
    let snapshot = interchange::import_content(&text)?;
    let verdict = reconciler.verdict(&snapshot)?;

    info!(verdict = %verdict, "Classified content");
    print_json(&verdict_json(&verdict));
    Ok(())
}

async fn run_reset(reconciler: &ContentReconciler) -> Result<(), AppError> {
    let baseline = reconciler.reset().await;
    print_text(&interchange::export_content(&baseline)?);
    Ok(())
}

async fn run_sync(reconciler: &ContentReconciler) -> Result<(), AppError> {
    let synced = reconciler.sync_with_store().await;
    print_json(&json!({ "synced": synced }));
    Ok(())
}

fn verdict_json(verdict: &Verdict) -> Value {
    json!({
        "default": verdict.is_default(),
        "score": verdict.score,
        "threshold": verdict.threshold,
        "total_weight": verdict.total_weight,
        "matched": verdict.matched,
    })
}

fn print_json(value: &Value) {
    println!("{value}");
}

fn print_text(text: &str) {
    println!("{text}");
}
