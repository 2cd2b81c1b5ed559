//! Maps pipeline events to human-readable progress updates.

use std::fmt;

use serde::Serialize;

use crate::core::types::{PipelineEvent, StageName};

/// Tool name raised by the Exit-Check stage when the loop ends on approval.
pub const EXIT_LOOP_TOOL: &str = "exit_loop";

/// A progress update shown to the user while a query runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// The active stage changed to a stage with a label.
    Stage { stage: StageName, label: String },
    /// A tool was invoked by the active stage.
    Tool { stage: StageName, note: String },
}

impl ProgressUpdate {
    pub fn text(&self) -> &str {
        match self {
            ProgressUpdate::Stage { label, .. } => label,
            ProgressUpdate::Tool { note, .. } => note,
        }
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Label shown when `stage` becomes active. Exit-Check has none.
pub fn stage_label(stage: StageName) -> Option<&'static str> {
    match stage {
        StageName::Search => Some("Searching the web for a source..."),
        StageName::Validation => Some("Checking the source's credibility..."),
        StageName::Refinement => Some("Refining the search for a better source..."),
        StageName::Synthesis => Some("Writing the summary..."),
        StageName::ExitCheck => None,
    }
}

/// Note shown for a tool invocation.
pub fn tool_note(tool: &str) -> String {
    if tool == EXIT_LOOP_TOOL {
        "Trusted source approved, finishing research.".to_string()
    } else {
        format!("Using tool: {tool}")
    }
}

/// Tracks the active stage across a run's events.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    active: Option<StageName>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<StageName> {
        self.active
    }

    /// Updates produced by one event: a label on stage change, then one note per tool.
    pub fn observe(&mut self, event: &PipelineEvent) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();
        if self.active != Some(event.stage) {
            self.active = Some(event.stage);
            if let Some(label) = stage_label(event.stage) {
                updates.push(ProgressUpdate::Stage {
                    stage: event.stage,
                    label: label.to_string(),
                });
            }
        }
        updates.extend(event.tool_calls.iter().map(|tool| ProgressUpdate::Tool {
            stage: event.stage,
            note: tool_note(tool),
        }));
        updates
    }
}
