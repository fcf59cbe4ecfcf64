//! Reply parsing: the labeled-section scanner and the fenced-JSON parser.
//!
//! Model replies drift: extra prose around the expected content, markdown
//! code fences the prompt asked the model not to emit, loose whitespace.
//! Both strategies here tolerate that drift: the labeled scanner substitutes
//! an explicit fallback string per missing section, and the JSON parser
//! strips fences and surrounding prose before deserializing. Each rule is a
//! pure function and independently testable.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{ApplicationAnalysis, ConflictFindings, FigureAnalysis, RebuttalReport};

/// Which reply contract the conflict stage expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStrategy {
    /// Four labeled plain-text sections in fixed order
    LabeledSections,
    /// A fenced or bare JSON object per stage shape
    #[default]
    Json,
}

impl ParseStrategy {
    /// Strategy selection, fixed once at startup.
    pub fn from_env() -> Self {
        match std::env::var("OFFICE_ACTION_PARSER").ok().as_deref() {
            Some("labeled") | Some("labeled-sections") => Self::LabeledSections,
            _ => Self::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// The reply was not the expected JSON shape. The raw reply is retained
    /// for diagnostics.
    #[error("reply did not match the expected JSON shape: {detail}")]
    InvalidJson { detail: String, raw: String },
}

/// Fallback strings substituted when a labeled section is missing.
pub mod fallbacks {
    pub const FOUNDATIONAL_CLAIM: &str = "No foundational claim found.";
    pub const DOCUMENTS_REFERENCED: &str = "No documents referenced.";
    pub const FIGURES: &str = "No figure details found.";
    pub const TEXT: &str = "No technical text found.";
}

static RE_FOUNDATIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)FOUNDATIONAL CLAIM:\s*(.*?)(?:DOCUMENTS REFERENCED:|FIG:|TEXT:|$)").unwrap()
});
static RE_DOCUMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)DOCUMENTS REFERENCED:\s*(.*?)(?:FIG:|TEXT:|$)").unwrap());
static RE_FIG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)FIG:\s*(.*?)(?:TEXT:|$)").unwrap());
static RE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)TEXT:\s*(.*)").unwrap());

/// Raw section strings produced by the labeled-section scan, fallbacks
/// substituted where a marker is missing or empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSections {
    pub foundational_claim: String,
    pub documents_referenced: String,
    pub figures: String,
    pub text: String,
}

impl LabeledSections {
    /// Canonical findings: fallback sections become empty lists.
    pub fn into_findings(self) -> ConflictFindings {
        ConflictFindings {
            foundational_claim: self.foundational_claim,
            documents_referenced: split_list(
                &self.documents_referenced,
                fallbacks::DOCUMENTS_REFERENCED,
            ),
            figures: split_list(&self.figures, fallbacks::FIGURES),
            text: self.text,
        }
    }
}

/// Scan for the four markers in fixed order, taking everything up to the
/// next known marker. Extraneous prose before the first marker is ignored;
/// no exact-whitespace assumptions are made.
pub fn scan_labeled_sections(raw: &str) -> LabeledSections {
    let grab = |re: &Regex, fallback: &str| {
        re.captures(raw)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    LabeledSections {
        foundational_claim: grab(&RE_FOUNDATIONAL, fallbacks::FOUNDATIONAL_CLAIM),
        documents_referenced: grab(&RE_DOCUMENTS, fallbacks::DOCUMENTS_REFERENCED),
        figures: grab(&RE_FIG, fallbacks::FIGURES),
        text: grab(&RE_TEXT, fallbacks::TEXT),
    }
}

fn split_list(section: &str, fallback: &str) -> Vec<String> {
    if section == fallback {
        return Vec::new();
    }
    section
        .lines()
        .flat_map(|l| l.split(','))
        .map(|item| item.trim().trim_start_matches(['-', '*']).trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").unwrap());

/// Strip a Markdown code fence, tolerating prose before and after it; a
/// fenceless reply passes through trimmed.
pub fn strip_code_fence(raw: &str) -> String {
    if let Some(caps) = RE_CODE_FENCE.captures(raw) {
        caps[1].trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Best-effort JSON body: fence stripped, then narrowed to the outermost
/// braces when prose still surrounds the object.
fn json_candidate(raw: &str) -> String {
    let stripped = strip_code_fence(raw);
    if stripped.starts_with('{') {
        return stripped;
    }
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if end > start => stripped[start..=end].to_string(),
        _ => stripped,
    }
}

pub fn parse_conflict_json(raw: &str) -> Result<ConflictFindings, ParseError> {
    serde_json::from_str(&json_candidate(raw)).map_err(|e| ParseError::InvalidJson {
        detail: e.to_string(),
        raw: raw.to_string(),
    })
}

pub fn parse_conflict_reply(
    raw: &str,
    strategy: ParseStrategy,
) -> Result<ConflictFindings, ParseError> {
    match strategy {
        ParseStrategy::LabeledSections => Ok(scan_labeled_sections(raw).into_findings()),
        ParseStrategy::Json => parse_conflict_json(raw),
    }
}

pub fn parse_figure_analysis(raw: &str) -> Result<FigureAnalysis, ParseError> {
    let mut analysis: FigureAnalysis =
        serde_json::from_str(&json_candidate(raw)).map_err(|e| ParseError::InvalidJson {
            detail: e.to_string(),
            raw: raw.to_string(),
        })?;
    analysis.raw = raw.to_string();
    Ok(analysis)
}

/// Narrative stages never fail on shape: a reply that is not a usable
/// structured report comes back as unstructured text.
pub fn parse_application_analysis(raw: &str) -> ApplicationAnalysis {
    match serde_json::from_str::<RebuttalReport>(&json_candidate(raw)) {
        Ok(report) if !report.is_empty() => ApplicationAnalysis::Structured(report),
        _ => ApplicationAnalysis::Narrative {
            text: raw.trim().to_string(),
        },
    }
}

/// The persona sentence, with any fence or surrounding quotes removed.
pub fn parse_domain_expertise(raw: &str) -> String {
    strip_code_fence(raw).trim().trim_matches('"').trim().to_string()
}

/// Apply the two mandated lexical substitutions. Idempotent: text that
/// already carries the labels is left with exactly one label.
pub fn label_statutes(text: &str) -> String {
    let labeled = text
        .replace("U.S.C 102", "U.S.C 102 (Lack of Novelty)")
        .replace("U.S.C 103", "U.S.C 103 (Obviousness)");
    labeled
        .replace(
            "U.S.C 102 (Lack of Novelty) (Lack of Novelty)",
            "U.S.C 102 (Lack of Novelty)",
        )
        .replace(
            "U.S.C 103 (Obviousness) (Obviousness)",
            "U.S.C 103 (Obviousness)",
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED_REPLY: &str = "FOUNDATIONAL CLAIM:\nClaim 1, a sensor housing.\n\
DOCUMENTS REFERENCED:\nReference B\nFIG:\nFIG. 3\nTEXT:\nParagraph [0042] describes the housing.";

    #[test]
    fn labeled_sections_are_scanned_in_order() {
        let findings = scan_labeled_sections(WELL_FORMED_REPLY).into_findings();
        assert_eq!(findings.foundational_claim, "Claim 1, a sensor housing.");
        assert_eq!(findings.documents_referenced, vec!["Reference B"]);
        assert_eq!(findings.figures, vec!["FIG. 3"]);
        assert_eq!(findings.text, "Paragraph [0042] describes the housing.");
    }

    #[test]
    fn anticipation_reply_names_one_claim_and_the_reference() {
        let raw = "Some preamble from the model.\n\
FOUNDATIONAL CLAIM:\nClaim 1 is rejected as anticipated.\n\
DOCUMENTS REFERENCED:\n- Reference B\nFIG:\nTEXT:\nReference B, col. 2.";
        let findings = scan_labeled_sections(raw).into_findings();
        assert_eq!(findings.foundational_claim, "Claim 1 is rejected as anticipated.");
        assert!(findings.documents_referenced.contains(&"Reference B".to_string()));
        assert_eq!(findings.documents_referenced.len(), 1);
    }

    #[test]
    fn scanner_is_idempotent_on_its_own_fallbacks() {
        let sections = scan_labeled_sections(fallbacks::FIGURES);
        assert_eq!(sections.figures, fallbacks::FIGURES);
        assert_eq!(sections.foundational_claim, fallbacks::FOUNDATIONAL_CLAIM);

        // A second pass over a fallback changes nothing.
        let again = scan_labeled_sections(&sections.figures);
        assert_eq!(again.figures, fallbacks::FIGURES);
    }

    #[test]
    fn fallback_sections_become_empty_lists() {
        let findings = scan_labeled_sections("no markers at all").into_findings();
        assert!(findings.documents_referenced.is_empty());
        assert!(findings.figures.is_empty());
        assert_eq!(findings.text, fallbacks::TEXT);
    }

    #[test]
    fn fenced_json_round_trips() {
        let raw = "```json\n{\"foundational_claim\":\"X\",\"documents_referenced\":[\"A\"],\"figures\":[],\"text\":\"Y\"}\n```";
        let findings = parse_conflict_json(raw).unwrap();
        assert_eq!(findings.foundational_claim, "X");
        assert_eq!(findings.documents_referenced, vec!["A"]);
        assert!(findings.figures.is_empty());
        assert_eq!(findings.text, "Y");
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn prose_around_the_fence_is_tolerated() {
        let raw = "Here is the result you asked for:\n```json\n{\"foundational_claim\":\"X\",\"documents_referenced\":[],\"figures\":[],\"text\":\"Y\"}\n```\nLet me know if you need more.";
        let findings = parse_conflict_json(raw).unwrap();
        assert_eq!(findings.foundational_claim, "X");
    }

    #[test]
    fn bare_json_with_leading_prose_is_tolerated() {
        let raw = "The object follows. {\"foundational_claim\":\"X\",\"documents_referenced\":[],\"figures\":[],\"text\":\"Y\"}";
        let findings = parse_conflict_json(raw).unwrap();
        assert_eq!(findings.text, "Y");
    }

    #[test]
    fn malformed_json_preserves_the_raw_reply() {
        let err = parse_conflict_json("not json at all").unwrap_err();
        let ParseError::InvalidJson { raw, .. } = err;
        assert_eq!(raw, "not json at all");
    }

    #[test]
    fn figure_reply_with_empty_figures_keeps_paragraphs() {
        let raw = "{\"figures\": [], \"paragraphs\": [\"Paragraph [0042] text.\"]}";
        let analysis = parse_figure_analysis(raw).unwrap();
        assert!(analysis.figures.is_empty());
        assert_eq!(analysis.paragraphs, vec!["Paragraph [0042] text."]);
    }

    #[test]
    fn figure_reply_parses_records() {
        let raw = "```json\n{\"figures\": [{\"number\": \"3\", \"title\": \"Housing\", \"technical_details\": \"seals\", \"importance\": \"anchors the claim\"}], \"paragraphs\": []}\n```";
        let analysis = parse_figure_analysis(raw).unwrap();
        assert_eq!(analysis.figures.len(), 1);
        assert_eq!(analysis.figures[0].number, "3");
    }

    #[test]
    fn narrative_reply_falls_back_to_unstructured_text() {
        let analysis = parse_application_analysis("The rejection is not justified because ...");
        assert!(matches!(analysis, ApplicationAnalysis::Narrative { .. }));
    }

    #[test]
    fn structured_reply_parses_to_a_report() {
        let raw = "{\"conclusion\": \"The rejection is not justified.\", \"distinguishing_features\": [\"adaptive threshold\"]}";
        match parse_application_analysis(raw) {
            ApplicationAnalysis::Structured(report) => {
                assert_eq!(report.conclusion, "The rejection is not justified.");
            }
            other => panic!("expected structured report, got {other:?}"),
        }
    }

    #[test]
    fn empty_json_object_is_treated_as_narrative() {
        let analysis = parse_application_analysis("{}");
        assert!(matches!(analysis, ApplicationAnalysis::Narrative { .. }));
    }

    #[test]
    fn statute_labels_are_applied_once() {
        let labeled = label_statutes("rejected under U.S.C 102 and U.S.C 103");
        assert_eq!(
            labeled,
            "rejected under U.S.C 102 (Lack of Novelty) and U.S.C 103 (Obviousness)"
        );
        assert_eq!(label_statutes(&labeled), labeled);
    }

    #[test]
    fn domain_expertise_reply_is_cleaned() {
        let persona = parse_domain_expertise(
            "```\n\"You are a patent attorney specializing in optical sensors.\"\n```",
        );
        assert_eq!(
            persona,
            "You are a patent attorney specializing in optical sensors."
        );
    }
}
