// Office-action rebuttal pipeline stages
pub mod conflict_extraction;
pub mod domain_expertise;
pub mod figure_analysis;
pub mod filed_application;
pub mod pending_claims;

// Re-export stage implementations
pub use conflict_extraction::ConflictExtractionStage;
pub use domain_expertise::DomainExpertiseStage;
pub use figure_analysis::FigureAnalysisStage;
pub use filed_application::FiledApplicationStage;
pub use pending_claims::PendingClaimsStage;

/// Stable stage identifiers used for gating and operator triggers.
pub mod stage_ids {
    pub const DOMAIN_EXPERTISE: &str = "domain-expertise";
    pub const CONFLICT_EXTRACTION: &str = "conflict-extraction";
    pub const FIGURE_ANALYSIS: &str = "figure-analysis";
    pub const FILED_APPLICATION_ANALYSIS: &str = "filed-application-analysis";
    pub const PENDING_CLAIMS_ANALYSIS: &str = "pending-claims-analysis";
}
