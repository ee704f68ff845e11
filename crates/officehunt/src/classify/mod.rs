//! Photo classification.
//!
//! Deciding whether a photo shows the target is delegated to a hosted
//! vision model behind the [`Classifier`] trait. Whatever goes wrong on the
//! way to the model, the game never blocks the player: [`fail_open`] turns
//! every classifier failure into an offline match.

mod endpoint;
mod gemini;

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture::EncodedImage;
use crate::error::{Error, Result};

pub use endpoint::EndpointClassifier;
pub use gemini::{GeminiClassifier, GenerationSettings};

/// The judgment for one captured photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Whether the photo shows the target.
    #[serde(rename = "match")]
    pub matched: bool,
    /// Whether this result was forced because the classifier failed.
    #[serde(default)]
    pub offline: bool,
    /// Why the result is offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Classification {
    /// A live positive answer.
    #[must_use]
    pub fn matched() -> Self {
        Self {
            matched: true,
            offline: false,
            reason: None,
        }
    }

    /// A live negative answer.
    #[must_use]
    pub fn rejected() -> Self {
        Self {
            matched: false,
            offline: false,
            reason: None,
        }
    }

    /// A forced match because the classifier could not answer.
    #[must_use]
    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            matched: true,
            offline: true,
            reason: Some(reason.into()),
        }
    }

    /// Interpret a model answer.
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        if parse_answer(answer) {
            Self::matched()
        } else {
            Self::rejected()
        }
    }
}

/// Something that can judge whether a photo shows a target.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// The name of this classifier (for logging).
    fn name(&self) -> &'static str;

    /// Classify `image` against a prompt fragment such as "a chair".
    ///
    /// # Errors
    ///
    /// Returns an error if the classifier cannot produce an answer. Callers
    /// normally route errors through [`fail_open`].
    async fn classify(&self, image: &EncodedImage, prompt_fragment: &str)
        -> Result<Classification>;
}

/// Build the constrained yes/no question for a prompt fragment.
#[must_use]
pub fn build_prompt(prompt_fragment: &str) -> String {
    format!(
        "Is the main object in this image {}? Reply \"yes\" or \"no\" only.",
        prompt_fragment.trim()
    )
}

/// Interpret a model answer: only a literal "yes" is a match.
#[must_use]
pub fn parse_answer(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Apply the fail-open policy to a classifier result.
///
/// Any classifier error becomes an offline match. Errors that are not
/// classifier failures are a bug at the call site and are treated the same
/// way rather than blocking the player.
#[must_use]
pub fn fail_open(classifier: &str, result: Result<Classification>) -> Classification {
    match result {
        Ok(classification) => {
            debug!(
                "{} answered match={} offline={}",
                classifier, classification.matched, classification.offline
            );
            classification
        }
        Err(e) => {
            if e.is_classifier_failure() {
                warn!("{} failed, using offline mode: {}", classifier, e);
            } else {
                warn!("Unexpected error from {}, using offline mode: {}", classifier, e);
            }
            Classification::offline(offline_reason(&e))
        }
    }
}

fn offline_reason(err: &Error) -> String {
    match err {
        Error::MissingApiKey => "No API key".to_string(),
        Error::UpstreamStatus { status } => format!("Classifier returned HTTP {status}"),
        Error::Timeout { .. } => "Classifier timed out".to_string(),
        Error::MalformedResponse(_) => "Malformed classifier response".to_string(),
        Error::Transport(_) => "Classifier unreachable".to_string(),
        other => other.to_string(),
    }
}

/// Classify and apply the fail-open policy in one step.
pub async fn classify_fail_open(
    classifier: &dyn Classifier,
    image: &EncodedImage,
    prompt_fragment: &str,
) -> Classification {
    fail_open(
        classifier.name(),
        classifier.classify(image, prompt_fragment).await,
    )
}

/// Body of a request to the local classification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Image as raw base64 or a `data:` URL.
    #[serde(default)]
    pub image: String,
    /// Prompt fragment, or a catalog item id or name.
    #[serde(rename = "itemName", alias = "item_name", default)]
    pub item_name: String,
}

/// What a [`FixedClassifier`] does on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedOutcome {
    /// Answer with this model text.
    Answer(String),
    /// Fail as if the classifier were unreachable.
    Unreachable,
    /// Fail as if the request timed out.
    Timeout,
    /// Fail with this HTTP status.
    Status(u16),
}

/// Deterministic classifier that never touches the network.
#[derive(Debug)]
pub struct FixedClassifier {
    outcome: FixedOutcome,
    calls: AtomicUsize,
}

impl FixedClassifier {
    /// Create a classifier with a fixed outcome.
    #[must_use]
    pub fn new(outcome: FixedOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer "yes".
    #[must_use]
    pub fn yes() -> Self {
        Self::new(FixedOutcome::Answer("yes".to_string()))
    }

    /// Always answer "no".
    #[must_use]
    pub fn no() -> Self {
        Self::new(FixedOutcome::Answer("no".to_string()))
    }

    /// Always fail as unreachable.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::new(FixedOutcome::Unreachable)
    }

    /// Number of classification calls made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Classifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(
        &self,
        _image: &EncodedImage,
        _prompt_fragment: &str,
    ) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            FixedOutcome::Answer(text) => Ok(Classification::from_answer(text)),
            FixedOutcome::Unreachable => Err(Error::Transport("connection refused".to_string())),
            FixedOutcome::Timeout => Err(Error::Timeout {
                operation: "classification request".to_string(),
            }),
            FixedOutcome::Status(status) => Err(Error::UpstreamStatus { status: *status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::JPEG_MIME;

    fn image() -> EncodedImage {
        EncodedImage::new(vec![0xff, 0xd8, 0xff], JPEG_MIME)
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("yes"));
        assert!(parse_answer("  YES \n"));
        assert!(parse_answer("Yes"));

        assert!(!parse_answer("no"));
        assert!(!parse_answer("yes."));
        assert!(!parse_answer("yes, it is"));
        assert!(!parse_answer(""));
        assert!(!parse_answer("maybe"));
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(
            build_prompt(" a chair "),
            "Is the main object in this image a chair? Reply \"yes\" or \"no\" only."
        );
    }

    #[test]
    fn test_fail_open_passes_answers_through() {
        assert_eq!(
            fail_open("test", Ok(Classification::rejected())),
            Classification::rejected()
        );
        assert_eq!(
            fail_open("test", Ok(Classification::matched())),
            Classification::matched()
        );
    }

    #[test]
    fn test_fail_open_matches_like_yes() {
        let errors = [
            Error::MissingApiKey,
            Error::UpstreamStatus { status: 502 },
            Error::Transport("refused".to_string()),
            Error::malformed("no candidates"),
            Error::Timeout {
                operation: "classify".to_string(),
            },
        ];
        for err in errors {
            let result = fail_open("test", Err(err));
            assert!(result.matched);
            assert!(result.offline);
            assert!(result.reason.is_some());
        }
    }

    #[test]
    fn test_fail_open_missing_key_reason() {
        let result = fail_open("test", Err(Error::MissingApiKey));
        assert_eq!(result.reason.as_deref(), Some("No API key"));
    }

    #[test]
    fn test_classification_wire_format() {
        let json = serde_json::to_value(Classification::rejected()).unwrap();
        assert_eq!(json, serde_json::json!({"match": false, "offline": false}));

        let parsed: Classification = serde_json::from_str(r#"{"match": true}"#).unwrap();
        assert_eq!(parsed, Classification::matched());
    }

    #[test]
    fn test_classify_request_aliases() {
        let camel: ClassifyRequest =
            serde_json::from_str(r#"{"image": "abc", "itemName": "a chair"}"#).unwrap();
        let snake: ClassifyRequest =
            serde_json::from_str(r#"{"image": "abc", "item_name": "a chair"}"#).unwrap();
        assert_eq!(camel, snake);

        let empty: ClassifyRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.image.is_empty());
    }

    #[tokio::test]
    async fn test_fixed_classifier_answers() {
        let yes = FixedClassifier::yes();
        assert_eq!(
            yes.classify(&image(), "a mug").await.unwrap(),
            Classification::matched()
        );

        let no = FixedClassifier::no();
        assert_eq!(
            no.classify(&image(), "a mug").await.unwrap(),
            Classification::rejected()
        );
        assert_eq!(no.calls(), 1);
    }

    #[tokio::test]
    async fn test_fixed_classifier_failures_fail_open() {
        for outcome in [
            FixedOutcome::Unreachable,
            FixedOutcome::Timeout,
            FixedOutcome::Status(500),
        ] {
            let classifier = FixedClassifier::new(outcome);
            let result = classify_fail_open(&classifier, &image(), "a chair").await;
            assert_eq!(result.matched, Classification::matched().matched);
            assert!(result.offline);
        }
    }
}
