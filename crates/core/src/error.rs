#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A configuration or sequencing invariant was broken. Treated as a
    /// programming error, never shown to the user.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}
