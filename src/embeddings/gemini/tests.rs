use super::*;
use crate::config::GeminiConfig;

fn test_config() -> GeminiConfig {
    GeminiConfig {
        api_key: "test-key".to_string(),
        embedding_endpoint: "http://localhost:9999/v1beta/models/test:embedContent".to_string(),
        embedding_model: "test-embedding-model".to_string(),
        embedding_dimension: 3072,
        completion_endpoint: "http://localhost:9999/v1beta/models/test:generateContent"
            .to_string(),
        timeout_seconds: 5,
    }
}

#[test]
fn client_configuration() {
    let config = test_config();
    let client = GeminiClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-embedding-model");
    assert_eq!(client.dimension, 3072);
    assert_eq!(client.endpoint.host_str(), Some("localhost"));
    assert_eq!(client.endpoint.port(), Some(9999));
}

#[test]
fn invalid_endpoint_is_rejected() {
    let config = GeminiConfig {
        embedding_endpoint: "not a url".to_string(),
        ..test_config()
    };

    assert!(GeminiClient::new(&config).is_err());
}

#[test]
fn document_request_includes_task_type_and_title() {
    let request = EmbedContentRequest {
        content: Content {
            parts: vec![Part {
                text: "some document text".to_string(),
            }],
        },
        task_type: TASK_RETRIEVAL_DOCUMENT.to_string(),
        title: Some("Some Title".to_string()),
    };

    let json = serde_json::to_value(&request).expect("Failed to serialize request");

    assert_eq!(json["taskType"], "RETRIEVAL_DOCUMENT");
    assert_eq!(json["title"], "Some Title");
    assert_eq!(json["content"]["parts"][0]["text"], "some document text");
}

#[test]
fn query_request_omits_title() {
    let request = EmbedContentRequest {
        content: Content {
            parts: vec![Part {
                text: "a question".to_string(),
            }],
        },
        task_type: TASK_RETRIEVAL_QUERY.to_string(),
        title: None,
    };

    let json = serde_json::to_value(&request).expect("Failed to serialize request");

    assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
    assert!(json.get("title").is_none());
}

#[test]
fn embedding_response_parses_values() {
    let body = r#"{"embedding":{"values":[0.25,-0.5,0.75]}}"#;

    let parsed: EmbedContentResponse =
        serde_json::from_str(body).expect("Failed to parse response");

    assert_eq!(parsed.embedding.values, vec![0.25, -0.5, 0.75]);
}
