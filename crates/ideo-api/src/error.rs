use axum::http::StatusCode;
use ideo_suggest::ProviderError;
use serde_json::{json, Value};
use thiserror::Error;

use crate::fetch::FetchFailure;

/// External dependency whose failure ended the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    QuotaCheck,
    UsageCommit,
}

/// Terminal outcome of a failed request. `Display` carries the internal detail
/// for logs; `public_message` is what the caller sees.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("caller identity missing or invalid")]
    Unauthenticated,
    #[error("daily quota exhausted ({used}/{limit})")]
    QuotaExceeded { used: u64, limit: u32 },
    #[error("{dependency:?} unavailable: {reason}")]
    DependencyUnavailable { dependency: Dependency, reason: String },
    #[error("no reference data: {0}")]
    NoReferenceData(FetchFailure),
    #[error("generation failed: {0}")]
    GenerationFailed(#[from] ProviderError),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DependencyUnavailable { .. }
            | Self::NoReferenceData(_)
            | Self::GenerationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::DependencyUnavailable { .. } => "dependency_unavailable",
            Self::NoReferenceData(_) => "no_reference_data",
            Self::GenerationFailed(_) => "generation_failed",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Utilisateur non authentifié.".to_string(),
            Self::QuotaExceeded { limit, .. } => {
                format!("Limite quotidienne atteinte ({limit} idées max / jour).")
            }
            Self::DependencyUnavailable {
                dependency: Dependency::QuotaCheck,
                ..
            } => "Erreur lors de la vérification du quota.".to_string(),
            Self::DependencyUnavailable {
                dependency: Dependency::UsageCommit,
                ..
            } => "Erreur lors de l'enregistrement de l'utilisation.".to_string(),
            Self::NoReferenceData(_) => "Impossible de récupérer les vidéos.".to_string(),
            Self::GenerationFailed(_) => "Erreur lors de la génération.".to_string(),
        }
    }

    /// Machine-readable extra for quota and data failures. Never carries raw
    /// store errors or caller ids.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::QuotaExceeded { used, limit } => Some(json!({ "used": used, "limit": limit })),
            Self::NoReferenceData(failure) => Some(json!({ "reason": failure.kind() })),
            _ => None,
        }
    }

    /// Refusals caused by the caller rather than by the service.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::QuotaExceeded { .. })
    }
}
