//! Core domain types: target records, field values, and the enrichment stages.

use std::fmt;

use crate::error::{ProspectorError, Result};

/// Sentinel stored in a field that could not be produced because of an
/// upstream failure. Distinct from an empty cell, which means "not yet attempted".
pub const UNRESOLVED_MARKER: &str = "N/A";

/// Persisted column holding the scraped homepage text.
pub const CONTENT_COLUMN: &str = "content";

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// One enrichment cell of a [`TargetRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field {
    /// Not yet attempted.
    #[default]
    Empty,
    /// Could not be produced because of an upstream failure.
    Unresolved,
    /// Populated content.
    Text(String),
}

impl Field {
    /// Parse a tabular cell. Blank cells are [`Field::Empty`], the
    /// [`UNRESOLVED_MARKER`] is [`Field::Unresolved`], anything else is text.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else if trimmed == UNRESOLVED_MARKER {
            Self::Unresolved
        } else {
            Self::Text(cell.to_string())
        }
    }

    /// Render back to the tabular cell representation.
    pub fn as_cell(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Unresolved => UNRESOLVED_MARKER,
            Self::Text(text) => text,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    /// The populated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cell())
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One of the three chained text-generation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Summary,
    Opportunity,
    Email,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Summary, Stage::Opportunity, Stage::Email];

    /// Pipeline-internal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Opportunity => "sales_opportunity",
            Self::Email => "outreach_email",
        }
    }

    /// Positional column name used when persisting.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Summary => "response1",
            Self::Opportunity => "response2",
            Self::Email => "response3",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ---------------------------------------------------------------------------
// RecordState
// ---------------------------------------------------------------------------

/// Where a record sits in the enrichment lifecycle.
///
/// `Untried -> {Unresolved | ContentReady -> Summarized -> OpportunityDrafted
/// -> EmailDrafted}`; `PartiallyFailed` is entered from any post-content state
/// when a stage exhausts its retries and the run isolates the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Untried,
    Unresolved,
    ContentReady,
    Summarized,
    OpportunityDrafted,
    EmailDrafted,
    PartiallyFailed,
}

impl RecordState {
    /// Whether no further work will be done on this record by a re-run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unresolved | Self::EmailDrafted | Self::PartiallyFailed
        )
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Untried => "untried",
            Self::Unresolved => "unresolved",
            Self::ContentReady => "content-ready",
            Self::Summarized => "summarized",
            Self::OpportunityDrafted => "opportunity-drafted",
            Self::EmailDrafted => "email-drafted",
            Self::PartiallyFailed => "partially-failed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// TargetRecord
// ---------------------------------------------------------------------------

/// One row of the working dataset. The website URL is the natural key
/// within a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRecord {
    /// Company homepage URL.
    pub website_url: String,
    /// Cleaned homepage text.
    pub raw_content: Field,
    /// Stage 1 output (`response1`).
    pub summary: Field,
    /// Stage 2 output (`response2`).
    pub sales_opportunity: Field,
    /// Stage 3 output (`response3`).
    pub outreach_email: Field,
    /// Other input columns, carried through unchanged in source order.
    pub extra: Vec<(String, String)>,
}

impl TargetRecord {
    /// A fresh, untried record for `website_url`.
    pub fn new(website_url: impl Into<String>) -> Self {
        Self {
            website_url: website_url.into(),
            ..Default::default()
        }
    }

    /// The field written by `stage`.
    pub fn stage_field(&self, stage: Stage) -> &Field {
        match stage {
            Stage::Summary => &self.summary,
            Stage::Opportunity => &self.sales_opportunity,
            Stage::Email => &self.outreach_email,
        }
    }

    pub fn stage_field_mut(&mut self, stage: Stage) -> &mut Field {
        match stage {
            Stage::Summary => &mut self.summary,
            Stage::Opportunity => &mut self.sales_opportunity,
            Stage::Email => &mut self.outreach_email,
        }
    }

    /// Mark content and every stage as unresolved (scrape failure).
    pub fn mark_unresolved(&mut self) {
        self.raw_content = Field::Unresolved;
        for stage in Stage::ALL {
            *self.stage_field_mut(stage) = Field::Unresolved;
        }
    }

    /// Whether a pipeline run should leave this record alone.
    pub fn is_attempted(&self) -> bool {
        !self.raw_content.is_empty()
    }

    /// Derive the lifecycle state from the field values.
    pub fn state(&self) -> RecordState {
        match &self.raw_content {
            Field::Empty => RecordState::Untried,
            Field::Unresolved => RecordState::Unresolved,
            Field::Text(_) => {
                let stages = Stage::ALL.map(|s| self.stage_field(s));
                if stages.iter().any(|f| f.is_unresolved()) {
                    return RecordState::PartiallyFailed;
                }
                match stages.iter().filter(|f| f.text().is_some()).count() {
                    0 => RecordState::ContentReady,
                    1 => RecordState::Summarized,
                    2 => RecordState::OpportunityDrafted,
                    _ => RecordState::EmailDrafted,
                }
            }
        }
    }

    /// Validate the record invariants:
    /// - the URL is non-empty;
    /// - untried content means no stage output;
    /// - unresolved content means every stage is unresolved;
    /// - after real content, stages fill strictly left to right, and once a
    ///   stage is empty (or unresolved) every later stage is too.
    pub fn check(&self) -> Result<()> {
        if self.website_url.trim().is_empty() {
            return Err(ProspectorError::validation("record has an empty website URL"));
        }

        let url = &self.website_url;
        match &self.raw_content {
            Field::Empty => {
                if let Some(stage) = Stage::ALL
                    .into_iter()
                    .find(|s| !self.stage_field(*s).is_empty())
                {
                    return Err(ProspectorError::validation(format!(
                        "{url}: {stage} is set but content was never fetched"
                    )));
                }
            }
            Field::Unresolved => {
                if let Some(stage) = Stage::ALL
                    .into_iter()
                    .find(|s| !self.stage_field(*s).is_unresolved())
                {
                    return Err(ProspectorError::validation(format!(
                        "{url}: content is unresolved but {stage} is not"
                    )));
                }
            }
            Field::Text(_) => {
                #[derive(PartialEq)]
                enum Phase {
                    Filled,
                    Pending,
                    Failed,
                }
                let mut phase = Phase::Filled;
                for stage in Stage::ALL {
                    let next = match (self.stage_field(stage), &phase) {
                        (Field::Text(_), Phase::Filled) => Phase::Filled,
                        (Field::Empty, Phase::Filled | Phase::Pending) => Phase::Pending,
                        (Field::Unresolved, Phase::Filled | Phase::Failed) => Phase::Failed,
                        _ => {
                            return Err(ProspectorError::validation(format!(
                                "{url}: {stage} breaks left-to-right stage order"
                            )));
                        }
                    };
                    phase = next;
                }
            }
        }
        Ok(())
    }
}
