//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Maximum accepted prompt size in bytes
pub const MAX_PROMPT_LENGTH: usize = 8 * 1024;

/// Maximum accepted response size in bytes
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1 MB

/// Request body for storing a response (POST /cache)
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    /// The prompt the response answers
    pub prompt: String,
    /// The model response to cache
    pub response: String,
    /// Optional TTL in seconds (uses the default if not specified)
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl PutRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(error_msg) = validate_prompt(&self.prompt) {
            return Some(error_msg);
        }
        if self.response.len() > MAX_RESPONSE_SIZE {
            return Some(format!(
                "Response exceeds maximum size of {} bytes",
                MAX_RESPONSE_SIZE
            ));
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least one second".to_string());
        }
        None
    }
}

/// Request body carrying only a prompt (POST /lookup, POST /invalidate)
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

impl PromptRequest {
    pub fn validate(&self) -> Option<String> {
        validate_prompt(&self.prompt)
    }
}

fn validate_prompt(prompt: &str) -> Option<String> {
    if prompt.trim().is_empty() {
        return Some("Prompt cannot be empty".to_string());
    }
    if prompt.len() > MAX_PROMPT_LENGTH {
        return Some(format!(
            "Prompt exceeds maximum length of {} bytes",
            MAX_PROMPT_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_deserialize() {
        let json = r#"{"prompt": "What is Rust?", "response": "A language"}"#;
        let req: PutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.prompt, "What is Rust?");
        assert_eq!(req.response, "A language");
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_put_request_with_ttl() {
        let json = r#"{"prompt": "p", "response": "r", "ttl": 60}"#;
        let req: PutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(60));
    }

    #[test]
    fn test_validate_blank_prompt() {
        let req = PromptRequest {
            prompt: "   ".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_oversized_response() {
        let req = PutRequest {
            prompt: "p".to_string(),
            response: "x".repeat(MAX_RESPONSE_SIZE + 1),
            ttl: None,
        };
        assert!(req.validate().unwrap().contains("Response"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let req = PutRequest {
            prompt: "p".to_string(),
            response: "r".to_string(),
            ttl: Some(0),
        };
        assert!(req.validate().unwrap().contains("TTL"));
    }

    #[test]
    fn test_validate_valid_request() {
        let req = PutRequest {
            prompt: "Explain LRU".to_string(),
            response: "Least recently used".to_string(),
            ttl: Some(60),
        };
        assert!(req.validate().is_none());
    }
}
