use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service task has exited or dropped the reply.
    #[error("bond service stopped")]
    ServiceStopped,
}
