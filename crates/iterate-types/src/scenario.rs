//! Scripted assistant responses.
//!
//! A [`Scenario`] is read-only input: an ordered list of steps followed by a
//! summary. Each step is either a thinking note or a burst of file changes.

use serde::{Deserialize, Serialize};

use crate::message::FileChange;

/// One step of a scripted response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// A short note shown as a plain assistant message.
    Thinking(String),
    /// File-change cards appended together in one assistant message.
    FileChanges(Vec<FileChange>),
}

impl ScenarioStep {
    pub fn is_thinking(&self) -> bool {
        matches!(self, ScenarioStep::Thinking(_))
    }
}

/// A complete scripted response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    pub summary: String,
}

impl Scenario {
    pub fn new(steps: Vec<ScenarioStep>, summary: impl Into<String>) -> Self {
        Self {
            steps,
            summary: summary.into(),
        }
    }

    /// Total number of file-change cards across all bursts.
    pub fn file_change_count(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s {
                ScenarioStep::FileChanges(changes) => changes.len(),
                ScenarioStep::Thinking(_) => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FileAction;

    #[test]
    fn test_file_change_count() {
        let scenario = Scenario::new(
            vec![
                ScenarioStep::FileChanges(vec![
                    FileChange::new("1", "a.ts", FileAction::Creating, vec![]),
                    FileChange::new("2", "b.ts", FileAction::Creating, vec![]),
                ]),
                ScenarioStep::Thinking("hmm".into()),
                ScenarioStep::FileChanges(vec![FileChange::new(
                    "3",
                    "a.ts",
                    FileAction::Modifying,
                    vec![],
                )]),
            ],
            "done",
        );
        assert_eq!(scenario.file_change_count(), 3);
        assert!(scenario.steps[1].is_thinking());
    }

    #[test]
    fn test_missing_steps_default_to_empty() {
        let scenario: Scenario = serde_json::from_str(r#"{"summary":"only this"}"#).unwrap();
        assert!(scenario.steps.is_empty());
        assert_eq!(scenario.summary, "only this");
    }
}
