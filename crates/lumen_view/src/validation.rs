//! API key validation
//!
//! Validation is asynchronous: the coordinator hands the validator a
//! [`ValidationReply`] that may be completed on any thread, at any later
//! time. A reply dropped without completing counts as a rejection.

use std::fmt;

/// Result of checking a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Rejected(String),
}

type ReplyFn = Box<dyn FnOnce(ValidationOutcome) + Send>;

/// One-shot completion handle for a validation request
pub struct ValidationReply {
    complete: Option<ReplyFn>,
}

impl ValidationReply {
    pub fn new(complete: impl FnOnce(ValidationOutcome) + Send + 'static) -> Self {
        Self {
            complete: Some(Box::new(complete)),
        }
    }

    /// Deliver the outcome
    pub fn complete(mut self, outcome: ValidationOutcome) {
        if let Some(complete) = self.complete.take() {
            complete(outcome);
        }
    }
}

impl Drop for ValidationReply {
    fn drop(&mut self) {
        if let Some(complete) = self.complete.take() {
            log::warn!("Validation reply dropped without an outcome");
            complete(ValidationOutcome::Rejected("validator dropped the request".into()));
        }
    }
}

impl fmt::Debug for ValidationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationReply")
            .field("completed", &self.complete.is_none())
            .finish()
    }
}

/// License key validation backend
pub trait ApiKeyValidator: Send + Sync {
    /// Start validating `key`; must not block on the outcome
    fn validate(&self, key: String, reply: ValidationReply);
}

/// Validator answering from a fixed key list, synchronously
#[derive(Debug, Clone, Default)]
pub struct StaticValidator {
    accepted: Vec<String>,
}

impl StaticValidator {
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }
}

impl ApiKeyValidator for StaticValidator {
    fn validate(&self, key: String, reply: ValidationReply) {
        if self.accepted.iter().any(|k| *k == key) {
            reply.complete(ValidationOutcome::Valid);
        } else {
            reply.complete(ValidationOutcome::Rejected("unknown key".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn capture() -> (Arc<Mutex<Vec<ValidationOutcome>>>, ValidationReply) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, ValidationReply::new(move |outcome| sink.lock().push(outcome)))
    }

    #[test]
    fn test_static_validator() {
        let validator = StaticValidator::new(["good-key"]);

        let (seen, reply) = capture();
        validator.validate("good-key".into(), reply);
        assert_eq!(*seen.lock(), vec![ValidationOutcome::Valid]);

        let (seen, reply) = capture();
        validator.validate("bad-key".into(), reply);
        assert!(matches!(seen.lock()[0], ValidationOutcome::Rejected(_)));
    }

    #[test]
    fn test_dropped_reply_rejects_once() {
        let (seen, reply) = capture();
        drop(reply);
        assert_eq!(seen.lock().len(), 1);
        assert!(matches!(seen.lock()[0], ValidationOutcome::Rejected(_)));
    }

    #[test]
    fn test_completed_reply_fires_once() {
        let (seen, reply) = capture();
        reply.complete(ValidationOutcome::Valid);
        assert_eq!(seen.lock().len(), 1);
    }
}
