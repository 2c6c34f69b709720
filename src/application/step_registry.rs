//! Step registry - name-keyed lookup of processing steps.
//!
//! Populated once at startup from the active configuration, then shared
//! behind an `Arc` and only read. Ruleset validation cross-checks
//! pipeline names against `names()` before anything runs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::IndexingStep;

/// Registry of the steps rulesets may name in their pipelines.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<&'static str, Arc<dyn IndexingStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step under its own name. A step registered twice
    /// replaces the earlier instance.
    pub fn register(&mut self, step: Arc<dyn IndexingStep>) {
        self.steps.insert(step.name(), step);
    }

    /// Removes a step, returning it if it was registered.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn IndexingStep>> {
        self.steps.remove(name)
    }

    /// Looks a step up by the name rulesets use.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn IndexingStep>> {
        self.steps.get(name).cloned()
    }

    /// Registered step names, for ruleset validation.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepError;
    use crate::ports::StepContext;
    use async_trait::async_trait;

    struct NamedStep(&'static str);

    #[async_trait]
    impl IndexingStep for NamedStep {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _ctx: &StepContext) -> Result<(), StepError> {
            Ok(())
        }
    }

    #[test]
    fn register_and_lookup_by_name() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(NamedStep("search_index")));
        registry.register(Arc::new(NamedStep("embeddings")));

        assert!(registry.lookup("search_index").is_some());
        assert!(registry.lookup("llm_summary").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_removes_the_step() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(NamedStep("search_index")));

        assert!(registry.unregister("search_index").is_some());
        assert!(registry.lookup("search_index").is_none());
        assert!(registry.unregister("search_index").is_none());
    }

    #[test]
    fn names_reflect_registered_steps() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(NamedStep("a")));
        registry.register(Arc::new(NamedStep("b")));

        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, ["a", "b"]);
    }
}
