use serde::{Deserialize, Serialize};

/// Extracted text of one uploaded PDF, page order preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentText {
    pub file_name: String,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageText {
    pub number: usize,
    pub text: String,
}

impl DocumentText {
    /// All pages concatenated in page order, with no separator.
    pub fn full_text(&self) -> String {
        self.pages.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Which slot an uploaded document fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Action,
    Reference,
    FiledApplication,
    PendingClaims,
}

impl DocumentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "action" => Some(Self::Action),
            "reference" => Some(Self::Reference),
            "filed-application" => Some(Self::FiledApplication),
            "pending-claims" => Some(Self::PendingClaims),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Reference => "reference",
            Self::FiledApplication => "filed-application",
            Self::PendingClaims => "pending-claims",
        }
    }
}

/// Structured outcome of the conflict-extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictFindings {
    pub foundational_claim: String,
    pub documents_referenced: Vec<String>,
    pub figures: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigureDetail {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub technical_details: String,
    #[serde(default)]
    pub importance: String,
}

/// Per-figure records plus the paragraph text cited by the foundational
/// claim. `raw` keeps the model's reply for display next to the records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FigureAnalysis {
    #[serde(default)]
    pub figures: Vec<FigureDetail>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub raw: String,
}

impl FigureAnalysis {
    /// Text handed to the next stage's prompt: the raw reply when present,
    /// otherwise a rendering of the parsed records.
    pub fn display_text(&self) -> String {
        if !self.raw.trim().is_empty() {
            return self.raw.clone();
        }
        let mut out = String::new();
        for figure in &self.figures {
            out.push_str(&format!(
                "Figure {} ({}): {} Importance: {}\n",
                figure.number, figure.title, figure.technical_details, figure.importance
            ));
        }
        for paragraph in &self.paragraphs {
            out.push_str(paragraph);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmendmentProposal {
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub original_wording: String,
    #[serde(default)]
    pub proposed_wording: String,
}

/// Structured rebuttal-or-concurrence report for the filed-application and
/// pending-claims stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RebuttalReport {
    #[serde(default)]
    pub claim_key_features: Vec<String>,
    #[serde(default)]
    pub reference_key_features: Vec<String>,
    #[serde(default)]
    pub examiner_rationale: String,
    #[serde(default)]
    pub novelty_analysis: String,
    #[serde(default)]
    pub nonobviousness_analysis: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub distinguishing_features: Vec<String>,
    #[serde(default)]
    pub amendments: Vec<AmendmentProposal>,
}

impl RebuttalReport {
    pub fn is_empty(&self) -> bool {
        self.claim_key_features.is_empty()
            && self.reference_key_features.is_empty()
            && self.examiner_rationale.is_empty()
            && self.novelty_analysis.is_empty()
            && self.nonobviousness_analysis.is_empty()
            && self.conclusion.is_empty()
            && self.distinguishing_features.is_empty()
            && self.amendments.is_empty()
    }

    /// Render the report as the lightweight markup the exporter understands.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();

        push_bullet_section(&mut out, "Key Features of the Foundational Claim", &self.claim_key_features);
        push_bullet_section(&mut out, "Key Features of the Cited Reference", &self.reference_key_features);
        push_text_section(&mut out, "Examiner's Rationale", &self.examiner_rationale);
        push_text_section(&mut out, "Novelty Analysis", &self.novelty_analysis);
        push_text_section(&mut out, "Non-Obviousness Analysis", &self.nonobviousness_analysis);
        push_text_section(&mut out, "Conclusion", &self.conclusion);
        push_bullet_section(&mut out, "Distinguishing Features", &self.distinguishing_features);

        if !self.amendments.is_empty() {
            out.push_str("## Proposed Amendments\n");
            for (i, amendment) in self.amendments.iter().enumerate() {
                out.push_str(&format!(
                    "{}. **{}** Original: {} Proposed: {}\n",
                    i + 1,
                    amendment.feature,
                    amendment.original_wording,
                    amendment.proposed_wording
                ));
            }
        }

        out
    }
}

fn push_text_section(out: &mut String, heading: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    out.push_str(&format!("## {heading}\n{body}\n"));
}

fn push_bullet_section(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("## {heading}\n"));
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
}

/// Filed-application / pending-claims result: structured when the reply
/// parses, otherwise the raw narrative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplicationAnalysis {
    Structured(RebuttalReport),
    Narrative { text: String },
}

impl ApplicationAnalysis {
    pub fn report_text(&self) -> String {
        match self {
            Self::Structured(report) => report.to_markup(),
            Self::Narrative { text } => text.clone(),
        }
    }
}

/// Everything known about one analysis session: one field per upload slot and
/// per stage result. Stages read it, build a new value, and store it back;
/// earlier results are never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaseFile {
    pub action_document: Option<DocumentText>,
    pub reference_documents: Vec<DocumentText>,
    pub filed_application: Option<DocumentText>,
    pub pending_claims: Option<DocumentText>,
    pub domain_expertise: Option<String>,
    pub conflict_findings: Option<ConflictFindings>,
    pub figure_analysis: Option<FigureAnalysis>,
    pub filed_application_analysis: Option<ApplicationAnalysis>,
    pub pending_claims_analysis: Option<ApplicationAnalysis>,
    /// Most recent raw model reply, kept for diagnostics when parsing fails.
    pub last_raw_reply: Option<String>,
}

impl CaseFile {
    /// Referenced documents concatenated under their file names, the form the
    /// conflict and figure prompts expect.
    pub fn combined_reference_text(&self) -> String {
        self.reference_documents
            .iter()
            .map(|d| format!("{}:\n{}\n\n", d.file_name, d.full_text()))
            .collect()
    }
}

// API types

#[derive(Debug, Serialize, Deserialize)]
pub struct CaseCreatedResponse {
    pub session_id: String,
    pub current_stage: String,
    pub stages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub kind: DocumentKind,
    pub file_name: String,
    pub pages: usize,
    pub chars: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageRunResponse {
    pub session_id: String,
    pub stage: String,
    pub status: String,
    pub response: Option<String>,
    pub status_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_name: String,
    pub pages: usize,
    pub chars: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaseStatusResponse {
    pub session_id: String,
    pub current_stage: String,
    pub completed_stages: Vec<String>,
    pub status_message: Option<String>,
    pub action_document: Option<DocumentSummary>,
    pub reference_documents: Vec<DocumentSummary>,
    pub filed_application: Option<DocumentSummary>,
    pub pending_claims: Option<DocumentSummary>,
    pub domain_expertise: Option<String>,
    pub conflict_findings: Option<ConflictFindings>,
    pub figure_analysis: Option<FigureAnalysis>,
    pub filed_application_analysis: Option<ApplicationAnalysis>,
    pub pending_claims_analysis: Option<ApplicationAnalysis>,
}

pub mod session_keys {
    pub const CASE_FILE: &str = "case_file";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_concatenates_pages_in_order() {
        let doc = DocumentText {
            file_name: "action.pdf".to_string(),
            pages: vec![
                PageText { number: 1, text: "abc".to_string() },
                PageText { number: 2, text: "defg".to_string() },
            ],
        };
        assert_eq!(doc.full_text(), "abcdefg");
        assert_eq!(doc.char_count(), doc.full_text().chars().count());
    }

    #[test]
    fn document_kind_round_trips_from_path_segment() {
        for kind in [
            DocumentKind::Action,
            DocumentKind::Reference,
            DocumentKind::FiledApplication,
            DocumentKind::PendingClaims,
        ] {
            assert_eq!(DocumentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DocumentKind::parse("unknown"), None);
    }

    #[test]
    fn rebuttal_report_markup_has_headings_and_amendments() {
        let report = RebuttalReport {
            conclusion: "The rejection is not justified.".to_string(),
            distinguishing_features: vec!["adaptive threshold".to_string()],
            amendments: vec![AmendmentProposal {
                feature: "adaptive threshold".to_string(),
                original_wording: "a threshold".to_string(),
                proposed_wording: "an adaptive threshold".to_string(),
            }],
            ..Default::default()
        };

        let markup = report.to_markup();
        assert!(markup.contains("## Conclusion"));
        assert!(markup.contains("- adaptive threshold"));
        assert!(markup.contains("1. **adaptive threshold** Original: a threshold"));
    }

    #[test]
    fn narrative_analysis_reports_its_own_text() {
        let analysis = ApplicationAnalysis::Narrative {
            text: "plain report".to_string(),
        };
        assert_eq!(analysis.report_text(), "plain report");
    }
}
