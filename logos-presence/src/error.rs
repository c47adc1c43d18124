//! Error kinds surfaced by the presence subsystem.
//!
//! Validation errors from `submit` and server rejections carried on acks
//! are delivered asynchronously, either to the submission's completion
//! handle or as a standalone `PresenceEvent::Error`. Reconciliation of
//! remote presence never produces an error: unusable announcements are
//! discarded.

/// Presence errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    /// Presence submitted before the document was created.
    NotCreated,
    /// The document's type cannot create or transform presence.
    UnsupportedType,
    /// The server rejected a presence submission.
    Ack(String),
    /// Submission discarded by a hard rollback.
    Rollback,
    /// A peer announcement arrived with a protocol-level error attached.
    Protocol(String),
}

impl std::fmt::Display for PresenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCreated => write!(f, "Cannot submit presence. Document has not been created"),
            Self::UnsupportedType => write!(f, "Cannot submit presence. Document's type does not support presence"),
            Self::Ack(e) => write!(f, "Presence rejected by server: {e}"),
            Self::Rollback => write!(f, "Presence submission discarded by hard rollback"),
            Self::Protocol(e) => write!(f, "Presence protocol error: {e}"),
        }
    }
}

impl std::error::Error for PresenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert!(PresenceError::NotCreated.to_string().contains("not been created"));
        assert!(PresenceError::UnsupportedType.to_string().contains("does not support presence"));
        assert_eq!(
            PresenceError::Ack("denied".into()).to_string(),
            "Presence rejected by server: denied"
        );
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(PresenceError::Rollback);
        assert!(err.to_string().contains("hard rollback"));
    }
}
