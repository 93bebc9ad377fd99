/// Provider-agnostic boundary to the generative-AI service.
///
/// Pipelines depend on `AiCapability` only, so they can run against the Gemini client
/// in production and a scripted stub in tests.
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::AiError;

/// A cited web source attached to a grounded reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceCitation {
    /// Source URL.
    pub url: String,
    /// Page title if available.
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingResult {
    pub text: String,
    /// In the order the search capability returned them.
    pub sources: Vec<SourceCitation>,
}

#[async_trait]
pub trait AiCapability: Send + Sync {
    fn model_name(&self) -> &str;

    /// Web-search-augmented generation returning free text plus citations.
    async fn grounding_search(&self, prompt: &str) -> Result<GroundingResult, AiError>;

    /// Generation constrained to `schema`. Returns the raw JSON text; use
    /// [`structured_response`] to get a parsed and validated value.
    async fn generate_json(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String, AiError>;
}

/// A type that can be requested as a structured reply.
pub trait ResponseSchema: DeserializeOwned + JsonSchema {
    /// Checks constraints serde cannot express. Runs after deserialization.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// JSON schema for `T` in the form sent upstream.
pub fn schema_value<T: JsonSchema>() -> serde_json::Value {
    let mut value = serde_json::Value::from(schemars::schema_for!(T));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
    }
    value
}

/// Ask for a reply conforming to `T` and validate it.
///
/// Transport failures pass through unchanged; anything that parses badly or fails
/// [`ResponseSchema::validate`] becomes [`AiError::Validation`].
pub async fn structured_response<T: ResponseSchema>(
    ai: &dyn AiCapability,
    prompt: &str,
) -> Result<T, AiError> {
    let schema_name = T::schema_name().to_string();
    info!(schema = %schema_name, "requesting structured response");

    let raw = ai.generate_json(prompt, schema_value::<T>()).await?;

    let parsed = serde_json::from_str::<T>(&raw)
        .map_err(|e| e.to_string())
        .and_then(|value| value.validate().map(|()| value));

    match parsed {
        Ok(value) => {
            info!(schema = %schema_name, "structured response parsed");
            Ok(value)
        }
        Err(message) => {
            error!(schema = %schema_name, error = %message, raw_response = %raw, "structured response validation failed");
            Err(AiError::Validation {
                schema: schema_name,
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedJson(&'static str);

    #[async_trait]
    impl AiCapability for CannedJson {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn grounding_search(&self, _prompt: &str) -> Result<GroundingResult, AiError> {
            Err(AiError::EmptyResponse)
        }

        async fn generate_json(
            &self,
            _prompt: &str,
            _schema: serde_json::Value,
        ) -> Result<String, AiError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Rating {
        stars: i64,
    }

    impl ResponseSchema for Rating {
        fn validate(&self) -> Result<(), String> {
            if (1..=3).contains(&self.stars) {
                Ok(())
            } else {
                Err(format!("stars out of range: {}", self.stars))
            }
        }
    }

    #[tokio::test]
    async fn parses_conforming_reply() {
        let ai = CannedJson(r#"{"stars": 2}"#);
        let rating: Rating = structured_response(&ai, "rate it").await.unwrap();
        assert_eq!(rating.stars, 2);
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error() {
        let ai = CannedJson("not json");
        let err = structured_response::<Rating>(&ai, "rate it").await.unwrap_err();
        assert!(matches!(err, AiError::Validation { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn failed_constraint_is_validation_error() {
        let ai = CannedJson(r#"{"stars": 9}"#);
        let err = structured_response::<Rating>(&ai, "rate it").await.unwrap_err();
        match err {
            AiError::Validation { schema, message } => {
                assert_eq!(schema, "Rating");
                assert!(message.contains("out of range"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        struct Down;

        #[async_trait]
        impl AiCapability for Down {
            fn model_name(&self) -> &str {
                "down"
            }
            async fn grounding_search(&self, _prompt: &str) -> Result<GroundingResult, AiError> {
                Err(AiError::EmptyResponse)
            }
            async fn generate_json(
                &self,
                _prompt: &str,
                _schema: serde_json::Value,
            ) -> Result<String, AiError> {
                Err(AiError::EmptyResponse)
            }
        }

        let err = structured_response::<Rating>(&Down, "rate it").await.unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
    }

    #[test]
    fn schema_value_drops_meta_schema() {
        let schema = schema_value::<Rating>();
        assert!(schema.get("$schema").is_none());
        assert!(schema["properties"]["stars"].is_object());
    }
}
