use appforge::backends::{BackendAdapter, BackendKind};
use appforge::errors::ErrorClass;
use appforge::orchestrator::{self, rank_backends};
use appforge::sanitizer::SanitizeLimits;
use appforge::types::GenerationRequest;

use test_utils::{ScriptedBackend, ScriptedOutcome, sample_app};

fn relaxed_limits() -> SanitizeLimits {
    SanitizeLimits {
        min_chars: 50,
        min_lines: 3,
    }
}

#[tokio::test]
async fn first_success_short_circuits_the_rest() {
    let adapters: Vec<Box<dyn BackendAdapter>> = vec![
        Box::new(ScriptedBackend::new(
            BackendKind::OpenAi,
            ScriptedOutcome::TooShort,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Anthropic,
            ScriptedOutcome::Reply(sample_app()),
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Gemini,
            ScriptedOutcome::Reply(sample_app()),
        )),
    ];

    let request = GenerationRequest::new("a counter app");
    let result = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect("second backend should succeed");

    assert_eq!(result.backend, BackendKind::Anthropic);
    assert_eq!(result.model, "scripted-model");
}

#[tokio::test]
async fn short_circuit_call_counts() {
    let first = ScriptedBackend::new(BackendKind::OpenAi, ScriptedOutcome::Reply(sample_app()));
    let first_calls = first.calls.clone();
    let second = ScriptedBackend::new(BackendKind::Anthropic, ScriptedOutcome::Reply(sample_app()));
    let second_calls = second.calls.clone();
    let third = ScriptedBackend::new(BackendKind::Gemini, ScriptedOutcome::Reply(sample_app()));
    let third_calls = third.calls.clone();

    let adapters: Vec<Box<dyn BackendAdapter>> =
        vec![Box::new(first), Box::new(second), Box::new(third)];

    let request = GenerationRequest::new("a counter app");
    orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect("first backend should succeed");

    assert_eq!(first_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(third_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn ranking_prefers_credentials_then_preference_then_order() {
    let adapters: Vec<Box<dyn BackendAdapter>> = vec![
        Box::new(ScriptedBackend::without_credential(
            BackendKind::OpenAi,
            ScriptedOutcome::TooShort,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Anthropic,
            ScriptedOutcome::TooShort,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Gemini,
            ScriptedOutcome::TooShort,
        )),
    ];

    let ranked = rank_backends(&adapters, Some(BackendKind::Gemini));
    let kinds: Vec<BackendKind> = ranked.iter().map(|a| a.kind()).collect();

    // Preferred credentialed backend first, then remaining credentialed in
    // configuration order, credentialless last
    assert_eq!(
        kinds,
        vec![
            BackendKind::Gemini,
            BackendKind::Anthropic,
            BackendKind::OpenAi
        ]
    );
}

#[tokio::test]
async fn preferred_backend_is_tried_first() {
    let openai = ScriptedBackend::new(BackendKind::OpenAi, ScriptedOutcome::Reply(sample_app()));
    let openai_calls = openai.calls.clone();
    let gemini = ScriptedBackend::new(BackendKind::Gemini, ScriptedOutcome::Reply(sample_app()));

    let adapters: Vec<Box<dyn BackendAdapter>> = vec![Box::new(openai), Box::new(gemini)];

    let request =
        GenerationRequest::new("a counter app").with_preferred_backend(BackendKind::Gemini);
    let result = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect("preferred backend should succeed");

    assert_eq!(result.backend, BackendKind::Gemini);
    assert_eq!(openai_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auth_failure_does_not_stop_later_backends() {
    let adapters: Vec<Box<dyn BackendAdapter>> = vec![
        Box::new(ScriptedBackend::new(
            BackendKind::OpenAi,
            ScriptedOutcome::AuthInvalid,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Anthropic,
            ScriptedOutcome::Reply(sample_app()),
        )),
    ];

    let request = GenerationRequest::new("a counter app");
    let result = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect("second backend should rescue the request");
    assert_eq!(result.backend, BackendKind::Anthropic);
}

#[tokio::test]
async fn all_validation_failures_aggregate_to_generic_error() {
    let adapters: Vec<Box<dyn BackendAdapter>> = vec![
        Box::new(ScriptedBackend::new(
            BackendKind::OpenAi,
            ScriptedOutcome::TooShort,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Anthropic,
            ScriptedOutcome::TooShort,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Gemini,
            ScriptedOutcome::TooShort,
        )),
    ];

    let request = GenerationRequest::new("a counter app");
    let err = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect_err("all backends fail");

    assert_eq!(err.class(), ErrorClass::Generic);
    assert_eq!(err.attempts().len(), 3);
    let message = err.to_string();
    assert!(!message.contains("rate limit"));
    assert!(!message.contains("authentication"));
}

#[tokio::test]
async fn auth_failure_outranks_rate_limit_in_aggregate() {
    let adapters: Vec<Box<dyn BackendAdapter>> = vec![
        Box::new(ScriptedBackend::new(
            BackendKind::OpenAi,
            ScriptedOutcome::RateLimited,
        )),
        Box::new(ScriptedBackend::new(
            BackendKind::Anthropic,
            ScriptedOutcome::AuthInvalid,
        )),
    ];

    let request = GenerationRequest::new("a counter app");
    let err = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect_err("all backends fail");

    assert_eq!(err.class(), ErrorClass::AuthInvalid);
    assert!(err.to_string().contains("authentication failed"));
}

#[tokio::test]
async fn insufficient_reply_falls_through_to_next_backend() {
    // First backend replies, but with a stub the sanitizer rejects
    let stub = ScriptedBackend::new(
        BackendKind::OpenAi,
        ScriptedOutcome::Reply("const App = 1;".to_string()),
    );
    let good = ScriptedBackend::new(BackendKind::Anthropic, ScriptedOutcome::Reply(sample_app()));
    let good_calls = good.calls.clone();

    let adapters: Vec<Box<dyn BackendAdapter>> = vec![Box::new(stub), Box::new(good)];

    let request = GenerationRequest::new("a counter app");
    let result = orchestrator::generate(&request, &adapters, &relaxed_limits())
        .await
        .expect("second backend should be accepted");

    assert_eq!(result.backend, BackendKind::Anthropic);
    assert_eq!(good_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
