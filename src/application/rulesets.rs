//! Atomically swappable ruleset snapshot.
//!
//! Consumers read the catalog through an immutable snapshot pointer;
//! reload builds and validates a fresh catalog, then swaps the pointer.
//! A failed reload leaves the previous snapshot serving, so a bad edit
//! to the ruleset file never takes the pipeline down.

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{RulesetCatalog, RulesetError};

use super::StepRegistry;

/// Shared handle to the active ruleset catalog.
#[derive(Debug)]
pub struct RulesetHandle {
    current: ArcSwap<RulesetCatalog>,
    path: PathBuf,
}

impl RulesetHandle {
    pub fn new(catalog: RulesetCatalog, path: impl Into<PathBuf>) -> Self {
        Self {
            current: ArcSwap::from_pointee(catalog),
            path: path.into(),
        }
    }

    /// Loads, validates, and installs the catalog at `path`. Used at
    /// startup, where a failure is fatal.
    pub fn load(path: impl Into<PathBuf>, registry: &StepRegistry) -> Result<Self, RulesetError> {
        let path = path.into();
        let catalog = load_validated(&path, registry)?;
        Ok(Self::new(catalog, path))
    }

    /// The active snapshot. Cheap; safe to call per event.
    pub fn current(&self) -> Arc<RulesetCatalog> {
        self.current.load_full()
    }

    /// Re-reads the ruleset file and swaps the snapshot in atomically.
    ///
    /// On error the previous snapshot keeps serving; the caller decides
    /// how loudly to complain.
    pub fn reload(&self, registry: &StepRegistry) -> Result<usize, RulesetError> {
        let catalog = load_validated(&self.path, registry)?;
        let count = catalog.rulesets().len();
        self.current.store(Arc::new(catalog));
        Ok(count)
    }
}

fn load_validated(path: &Path, registry: &StepRegistry) -> Result<RulesetCatalog, RulesetError> {
    let catalog = RulesetCatalog::load(path)?;
    catalog.validate_steps(registry.names())?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepError;
    use crate::ports::{IndexingStep, StepContext};
    use async_trait::async_trait;
    use std::io::Write;

    struct NoopStep(&'static str);

    #[async_trait]
    impl IndexingStep for NoopStep {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _ctx: &StepContext) -> Result<(), StepError> {
            Ok(())
        }
    }

    fn registry() -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(NoopStep("search_index")));
        registry
    }

    fn write_rulesets(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_validates_against_registry() {
        let file = write_rulesets("rulesets:\n  - name: all\n    pipeline: [search_index]\n");
        let handle = RulesetHandle::load(file.path(), &registry()).unwrap();
        assert_eq!(handle.current().rulesets().len(), 1);
    }

    #[test]
    fn load_rejects_unknown_step() {
        let file = write_rulesets("rulesets:\n  - name: all\n    pipeline: [reticulate]\n");
        let err = RulesetHandle::load(file.path(), &registry()).unwrap_err();
        assert!(matches!(err, RulesetError::UnknownStep { .. }));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let file = write_rulesets("rulesets:\n  - name: all\n    pipeline: [search_index]\n");
        let handle = RulesetHandle::load(file.path(), &registry()).unwrap();

        std::fs::write(file.path(), "rulesets: [ {name: broken, pipeline: [nope]} ]").unwrap();
        assert!(handle.reload(&registry()).is_err());

        let snapshot = handle.current();
        assert_eq!(snapshot.rulesets()[0].name, "all");
    }

    #[test]
    fn successful_reload_swaps_snapshot() {
        let file = write_rulesets("rulesets:\n  - name: all\n    pipeline: [search_index]\n");
        let handle = RulesetHandle::load(file.path(), &registry()).unwrap();

        std::fs::write(
            file.path(),
            "rulesets:\n  - name: rfc\n    conditions: { document_type: RFC }\n    pipeline: [search_index]\n",
        )
        .unwrap();

        assert_eq!(handle.reload(&registry()).unwrap(), 1);
        assert_eq!(handle.current().rulesets()[0].name, "rfc");
    }
}
