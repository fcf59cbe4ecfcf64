//! Prompt construction for the analysis tasks.
//!
//! Centralising every prompt here keeps the instruction templates in one
//! place and testable without a live model: each builder is a pure function
//! from its inputs to a system/user message pair. A builder never leaves a
//! gap: an absent optional input is replaced by an explicit placeholder
//! phrase.

use crate::parse::ParseStrategy;

/// System/user message pair submitted to the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Placeholder when the conflict step produced no figure identifiers.
pub const NO_FIGURES_PLACEHOLDER: &str = "No figures referenced.";
/// Placeholder when the conflict step produced no supporting text.
pub const NO_TEXT_PLACEHOLDER: &str = "No technical text found.";

const DEFAULT_ATTORNEY_PERSONA: &str =
    "You are a patent attorney analyzing the document for foundational claims and conflicts.";

const FIGURE_ANALYST_PERSONA: &str =
    "You are a technical expert analyzing figures in a document.";

const PHOSITA_PERSONA: &str = "Adopt the persona of a Person Having Ordinary Skill in the Art \
(PHOSITA). Analyze the filed application text and determine if the examiner is correct in \
rejecting the application under either U.S.C 102 (Lack of Novelty) or U.S.C 103 (Obviousness). \
Cite instances from the application as filed to justify your stance.";

const CONFLICT_JSON_SHAPE: &str = r#"{"foundational_claim": "...", "documents_referenced": ["..."], "figures": ["..."], "text": "..."}"#;

const FIGURE_JSON_SHAPE: &str = r#"{"figures": [{"number": "...", "title": "...", "technical_details": "...", "importance": "..."}], "paragraphs": ["..."]}"#;

const REBUTTAL_JSON_SHAPE: &str = r#"{"claim_key_features": ["..."], "reference_key_features": ["..."], "examiner_rationale": "...", "novelty_analysis": "...", "nonobviousness_analysis": "...", "conclusion": "...", "distinguishing_features": ["..."], "amendments": [{"feature": "...", "original_wording": "...", "proposed_wording": "..."}]}"#;

/// Ask the model to name the technical field of the office action and phrase
/// the persona used by the later stages.
pub fn domain_expertise(action_text: &str) -> PromptPair {
    let user = format!(
        "Identify the primary technical field of the following office action text.\n\n\
{action_text}\n\n\
Respond with a single sentence of at most 100 words, of the form:\n\
\"You are a patent attorney specializing in <technical field>.\"\n\
Return only that sentence, with no additional commentary."
    );

    PromptPair {
        system: "You are an expert at identifying the technical domain of patent documents."
            .to_string(),
        user,
    }
}

/// Instruct the model to extract the foundational claim, the cited
/// references, the figures, and the supporting technical text.
pub fn conflict_extraction(
    action_text: &str,
    persona: Option<&str>,
    strategy: ParseStrategy,
) -> PromptPair {
    let contract = match strategy {
        ParseStrategy::LabeledSections => "Return the output as four labeled sections, \
in this exact order and with these exact markers:\n\
FOUNDATIONAL CLAIM:\n\
DOCUMENTS REFERENCED:\n\
FIG:\n\
TEXT:"
            .to_string(),
        ParseStrategy::Json => format!(
            "Return ONLY a JSON object of this exact shape, with no commentary and no code fence:\n{CONFLICT_JSON_SHAPE}"
        ),
    };

    let user = format!(
        "Analyze the following action document text and extract the foundational claim:\n\n\
{action_text}\n\n\
Step 1: Extract the key claims from the document.\n\
Step 2: From those claims, select the single foundational claim. Method claims and system \
claims are not eligible; exactly one claim is foundational.\n\
Step 3: From the foundational claim, extract the information under U.S.C 102 and/or 103.\n\
Step 4: Extract every referenced document cited under U.S.C 102 and/or 103 against the \
foundational claim. Do not extract referenced-document data unrelated to the foundational claim.\n\
Step 5: If the foundational claim refers to the referenced documents, extract the entire \
technical content with its paragraph locations and figure references, mapped to the conflicting \
document name.\n\
{contract}"
    );

    PromptPair {
        system: persona.unwrap_or(DEFAULT_ATTORNEY_PERSONA).to_string(),
        user,
    }
}

/// Ask for per-figure records plus the paragraph text cited by the
/// foundational claim, degrading to text-only analysis without figures.
pub fn figure_analysis(
    figures: &[String],
    technical_text: &str,
    reference_text: &str,
) -> PromptPair {
    let figure_details = if figures.is_empty() {
        NO_FIGURES_PLACEHOLDER.to_string()
    } else {
        figures.join("\n")
    };
    let text_details = if technical_text.trim().is_empty() {
        NO_TEXT_PLACEHOLDER.to_string()
    } else {
        technical_text.to_string()
    };

    let user = format!(
        "Analyze the figures and technical text from the referenced document in relation to the \
foundational claim.\n\n\
Instructions:\n\n\
1. Identify Figures: for each figure referenced in the foundational claim, extract the figure \
number and title, every technical detail related to the figure as mentioned in the text, and \
the figure's importance to the foundational claim (how it supports, illustrates, or contradicts \
it).\n\
2. Extract Text from Paragraphs: from the paragraphs cited in the foundational claim, extract \
the relevant text exactly as it appears in the referenced document.\n\
3. If figures are present, follow both steps and reference the specific data or concepts \
depicted.\n\
4. If no figures are present, focus on the cited text and highlight the technical details \
essential to the foundational claim.\n\n\
Figures:\n{figure_details}\n\n\
Text:\n{text_details}\n\n\
Referenced Document Text:\n{reference_text}\n\n\
Return ONLY a JSON object of this exact shape, with no commentary and no code fence:\n{FIGURE_JSON_SHAPE}"
    );

    PromptPair {
        system: FIGURE_ANALYST_PERSONA.to_string(),
        user,
    }
}

/// Rebuttal-or-concurrence report over the application as filed.
pub fn filed_application_analysis(
    foundational_claim: &str,
    figure_analysis_text: &str,
    filed_text: &str,
    persona: Option<&str>,
) -> PromptPair {
    analysis_prompt(
        "application as filed",
        foundational_claim,
        figure_analysis_text,
        filed_text,
        persona,
    )
}

/// Same report shape over the currently pending claims.
pub fn pending_claims_analysis(
    foundational_claim: &str,
    figure_analysis_text: &str,
    pending_text: &str,
    persona: Option<&str>,
) -> PromptPair {
    analysis_prompt(
        "pending claims",
        foundational_claim,
        figure_analysis_text,
        pending_text,
        persona,
    )
}

fn analysis_prompt(
    subject: &str,
    foundational_claim: &str,
    figure_analysis_text: &str,
    subject_text: &str,
    persona: Option<&str>,
) -> PromptPair {
    let figure_analysis_text = if figure_analysis_text.trim().is_empty() {
        NO_FIGURES_PLACEHOLDER.to_string()
    } else {
        figure_analysis_text.to_string()
    };

    let user = format!(
        "Using the foundational claim for rejection and the figure analysis results below, \
analyze the {subject} and determine whether the examiner is correct in rejecting the \
application. The {subject} is the most important document: cite its text for every conclusion, \
making relevant comparisons between it and the cited claim.\n\n\
Foundational claim:\n{foundational_claim}\n\n\
Figure analysis:\n{figure_analysis_text}\n\n\
Text of the {subject}:\n{subject_text}\n\n\
Produce a detailed report covering:\n\
1. Key features of the foundational claim.\n\
2. Key features of the cited reference.\n\
3. The examiner's stated rationale for the rejection.\n\
4. Novelty analysis under U.S.C 102 (Lack of Novelty), comparing each cited instance with the \
{subject}.\n\
5. Non-obviousness analysis under U.S.C 103 (Obviousness).\n\
6. A conclusion on whether the rejection is justified.\n\
7. The distinguishing features of the {subject} over the cited reference.\n\
8. For each distinguishing feature, a proposed amendment giving the original wording and the \
proposed wording.\n\n\
Always write \"U.S.C 102 (Lack of Novelty)\" for novelty grounds and \"U.S.C 103 (Obviousness)\" \
for obviousness grounds.\n\n\
Prefer returning a JSON object of this shape (a plain-prose report is accepted when the \
analysis does not fit it):\n{REBUTTAL_JSON_SHAPE}"
    );

    let system = match persona {
        Some(p) => format!("{p} {PHOSITA_PERSONA}"),
        None => PHOSITA_PERSONA.to_string(),
    };

    PromptPair { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_labeled_contract_names_all_markers() {
        let pair = conflict_extraction("claim 1 ...", None, ParseStrategy::LabeledSections);
        for marker in [
            "FOUNDATIONAL CLAIM:",
            "DOCUMENTS REFERENCED:",
            "FIG:",
            "TEXT:",
        ] {
            assert!(pair.user.contains(marker), "missing marker {marker}");
        }
        assert_eq!(pair.system, DEFAULT_ATTORNEY_PERSONA);
    }

    #[test]
    fn conflict_json_contract_names_all_fields() {
        let pair = conflict_extraction("claim 1 ...", Some("You are a patent attorney specializing in optics."), ParseStrategy::Json);
        assert!(pair.user.contains("foundational_claim"));
        assert!(pair.user.contains("documents_referenced"));
        assert!(pair.system.contains("optics"));
    }

    #[test]
    fn figure_prompt_substitutes_placeholders() {
        let pair = figure_analysis(&[], "", "reference text");
        assert!(pair.user.contains(NO_FIGURES_PLACEHOLDER));
        assert!(pair.user.contains(NO_TEXT_PLACEHOLDER));
        assert!(pair.user.contains("reference text"));
    }

    #[test]
    fn figure_prompt_lists_identifiers_when_present() {
        let figures = vec!["FIG. 1".to_string(), "FIG. 2".to_string()];
        let pair = figure_analysis(&figures, "paragraph [0042]", "reference text");
        assert!(pair.user.contains("FIG. 1\nFIG. 2"));
        assert!(!pair.user.contains(NO_FIGURES_PLACEHOLDER));
    }

    #[test]
    fn analysis_prompt_mandates_statute_labels() {
        let pair = filed_application_analysis("claim", "figures", "filed text", None);
        assert!(pair.user.contains("U.S.C 102 (Lack of Novelty)"));
        assert!(pair.user.contains("U.S.C 103 (Obviousness)"));
        assert!(pair.system.contains("PHOSITA"));
    }

    #[test]
    fn pending_claims_prompt_targets_pending_claims() {
        let pair = pending_claims_analysis("claim", "figures", "pending text", None);
        assert!(pair.user.contains("pending claims"));
        assert!(pair.user.contains("pending text"));
    }
}
