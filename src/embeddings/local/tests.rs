use super::*;

#[test]
fn unknown_model_name_is_rejected() {
    let result = LocalEmbedder::new("not-a-real-model", 768);

    match result {
        Err(RagError::Provider(message)) => {
            assert!(message.contains("not-a-real-model"));
        }
        Err(other) => panic!("expected a provider error, got {other:?}"),
        Ok(_) => panic!("expected a provider error, got a working embedder"),
    }
}

#[test]
#[ignore = "downloads model weights on first run"]
fn embeds_text_with_the_default_model() {
    let embedder =
        LocalEmbedder::new("nomic-ai/nomic-embed-text-v1.5", 768).expect("model should load");

    let vector = embedder
        .embed_document("Hello from the test suite.", Some("Greeting"))
        .expect("embedding should succeed");

    assert_eq!(vector.len(), 768);
    assert!(vector.iter().any(|v| *v != 0.0));
}
