//! Scenario catalogs: the read-only source of scripted responses.
//!
//! The playback scheduler only ever asks a catalog for its scenario list and
//! picks one uniformly at random. The built-in catalog is embedded at compile
//! time from `assets/scenarios.ron`; custom catalogs use the same format.

use std::path::Path;

use rand::RngCore;
use rand::seq::SliceRandom;

use iterate_types::Scenario;

use crate::error::CatalogError;

const BUILTIN_SCENARIOS: &str = include_str!("../assets/scenarios.ron");

/// Read-only source of scenarios.
pub trait ScenarioCatalog: Send + Sync {
    /// All scenarios, in catalog order.
    fn scenarios(&self) -> &[Scenario];

    /// Pick one scenario uniformly at random. `None` only for an empty catalog.
    fn choose(&self, rng: &mut dyn RngCore) -> Option<&Scenario> {
        SliceRandom::choose(self.scenarios(), rng)
    }
}

/// A fixed, in-memory list of scenarios.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    scenarios: Vec<Scenario>,
}

impl StaticCatalog {
    /// Build from a non-empty list.
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self, CatalogError> {
        if scenarios.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { scenarios })
    }

    /// The prototype scenarios shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_ron_str(BUILTIN_SCENARIOS)
    }

    /// Parse a RON list of scenarios.
    pub fn from_ron_str(content: &str) -> Result<Self, CatalogError> {
        let scenarios: Vec<Scenario> =
            ron::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(scenarios)
    }

    /// Load a RON catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_ron_str(&content)?;
        tracing::info!(
            path = %path.display(),
            scenarios = catalog.scenarios.len(),
            "loaded scenario catalog"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl ScenarioCatalog for StaticCatalog {
    fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use iterate_types::{FileAction, ScenarioStep};

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = StaticCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 5);

        let first = &catalog.scenarios()[0];
        assert_eq!(first.steps.len(), 1);
        assert!(first.summary.starts_with("Perfect!"));
        match &first.steps[0] {
            ScenarioStep::FileChanges(changes) => {
                assert_eq!(changes[0].filename, "src/components/ProductCard.tsx");
                assert_eq!(changes[0].action, FileAction::Creating);
                assert_eq!(changes[0].changes.len(), 3);
                assert!(changes[0].is_loading);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_builtin_has_modifying_and_multi_card_bursts() {
        let catalog = StaticCatalog::builtin().unwrap();
        let all_changes: Vec<_> = catalog
            .scenarios()
            .iter()
            .flat_map(|s| &s.steps)
            .filter_map(|s| match s {
                ScenarioStep::FileChanges(c) => Some(c),
                ScenarioStep::Thinking(_) => None,
            })
            .collect();
        assert!(all_changes.iter().any(|burst| burst.len() == 2));
        assert!(
            all_changes
                .iter()
                .flat_map(|b| b.iter())
                .any(|c| c.action == FileAction::Modifying)
        );
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(StaticCatalog::new(vec![]), Err(CatalogError::Empty)));
        assert!(matches!(StaticCatalog::from_ron_str("[]"), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_parse_error_reported() {
        let err = StaticCatalog::from_ron_str("[(steps: [Nope(1)], summary: \"x\")]").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticCatalog::load(&dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_load_custom_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.ron");
        std::fs::write(&path, r#"[(steps: [Thinking("hmm")], summary: "done")]"#).unwrap();
        let catalog = StaticCatalog::load(&path).unwrap();
        assert_eq!(catalog.scenarios()[0].steps[0], ScenarioStep::Thinking("hmm".into()));
    }

    #[test]
    fn test_choose_is_seeded_and_covers_catalog() {
        let catalog = StaticCatalog::builtin().unwrap();

        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(catalog.choose(&mut a), catalog.choose(&mut b));
        }

        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<_> = (0..200)
            .map(|_| catalog.choose(&mut rng).unwrap().summary.clone())
            .collect();
        assert_eq!(seen.len(), catalog.len());
    }
}
