use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaderError {
    #[error("[leader/kube]: {0}")]
    Kube(#[from] kube::Error),
}
