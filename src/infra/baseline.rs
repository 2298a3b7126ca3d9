//! Baseline content source.

use std::fs;

use tracing::info;

use crate::config::BaselineSettings;
use crate::domain::{baseline, content::ContentSnapshot, error::DomainError};

use super::error::InfraError;

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error(transparent)]
    Read(#[from] InfraError),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Load the baseline from the configured file, or the packaged one.
pub fn load(settings: &BaselineSettings) -> Result<ContentSnapshot, BaselineError> {
    match settings.path.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|err| InfraError::file(path, err))?;
            let snapshot = baseline::parse(&text)?;
            info!(path = %path.display(), blocks = snapshot.blocks.len(), "Loaded baseline file");
            Ok(snapshot)
        }
        None => Ok(baseline::builtin()?),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn falls_back_to_packaged_baseline() {
        let settings = BaselineSettings { path: None };
        let snapshot = load(&settings).expect("packaged baseline");
        assert!(snapshot.block("hero").is_some());
    }

    #[test]
    fn reads_baseline_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"blocks": [{{"id": "hero", "type": "hero", "title": "Placeholder", "order": 1}}]}}"#
        )
        .expect("write baseline");

        let settings = BaselineSettings {
            path: Some(file.path().to_path_buf()),
        };
        let snapshot = load(&settings).expect("file baseline");
        assert_eq!(snapshot.blocks.len(), 1);
        assert_eq!(snapshot.blocks[0].title, "Placeholder");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let settings = BaselineSettings {
            path: Some("/nonexistent/blockvault/baseline.json".into()),
        };
        assert!(matches!(load(&settings), Err(BaselineError::Read(_))));
    }
}
