use super::*;

#[test]
fn default_generation_config() {
    let config = GenerationConfig::default();

    assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    assert!((config.top_p - 0.95).abs() < f32::EPSILON);
    assert_eq!(config.top_k, 40);
    assert_eq!(config.max_output_tokens, 4024);
}

#[test]
fn overrides_merge_field_by_field() {
    let overrides = GenerationOverrides {
        temperature: Some(0.2),
        max_output_tokens: Some(512),
        ..GenerationOverrides::default()
    };

    let merged = overrides.apply(GenerationConfig::default());

    assert!((merged.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(merged.max_output_tokens, 512);
    // Unset fields keep their defaults
    assert!((merged.top_p - 0.95).abs() < f32::EPSILON);
    assert_eq!(merged.top_k, 40);
}

#[test]
fn generation_config_serializes_in_camel_case() {
    let json = serde_json::to_value(GenerationConfig::default())
        .expect("Failed to serialize generation config");

    assert!(json.get("topP").is_some());
    assert!(json.get("topK").is_some());
    assert!(json.get("maxOutputTokens").is_some());
    assert!(json.get("top_p").is_none());
}

#[test]
fn request_puts_the_query_after_the_context() {
    let request = GenerateContentRequest {
        contents: vec![
            ContentMessage {
                role: "user".to_string(),
                parts: vec![Part {
                    text: "Context:\nsome snippet".to_string(),
                }],
            },
            ContentMessage {
                role: "user".to_string(),
                parts: vec![Part {
                    text: "the question".to_string(),
                }],
            },
        ],
        generation_config: GenerationConfig::default(),
    };

    let json = serde_json::to_value(&request).expect("Failed to serialize request");

    let contents = json["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[1]["parts"][0]["text"], "the question");
    assert_eq!(contents[0]["role"], "user");
    assert!(json.get("generationConfig").is_some());
}

#[test]
fn response_text_extraction_shapes() {
    let full = r#"{"candidates":[{"content":{"parts":[{"text":"an answer"}]}}]}"#;
    let parsed: GenerateContentResponse =
        serde_json::from_str(full).expect("Failed to parse response");
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);
    assert_eq!(text.as_deref(), Some("an answer"));

    // Missing candidates parse cleanly rather than erroring
    let empty: GenerateContentResponse =
        serde_json::from_str("{}").expect("Failed to parse empty response");
    assert!(empty.candidates.is_empty());

    let no_text: GenerateContentResponse =
        serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#)
            .expect("Failed to parse partless response");
    let text = no_text
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);
    assert!(text.is_none());
}
