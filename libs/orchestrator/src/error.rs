use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("[orchestrator/kube]: {0}")]
    Kube(#[from] kube::Error),

    #[error("[orchestrator/http]: {0}")]
    Http(#[from] reqwest::Error),

    #[error("[orchestrator/not-found]: {0}")]
    NotFound(String),

    #[error("[orchestrator/no-node-port]: service {0} has no assigned NodePort")]
    NoNodePort(String),

    #[error("[orchestrator/readiness-timeout]: pod {0} did not become ready in time")]
    ReadinessTimeout(String),

    #[error("[orchestrator/health-probe-failed]: {0}")]
    HealthProbeFailed(String),
}

impl OrchestratorError {
    /// `NotFound` on delete is treated as success throughout the lifecycle
    /// manager (SPEC_FULL.md §9, open question c) — this lets callers
    /// distinguish that case without matching on `kube::Error` directly.
    pub fn is_not_found(&self) -> bool {
        match self {
            OrchestratorError::NotFound(_) => true,
            OrchestratorError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}
