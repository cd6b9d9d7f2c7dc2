//! End-to-end relay flow: Submitter → RelayClient → relay server → stub classifier

use axum::{extract::State, routing::post, Json, Router};
use humangate::capture::CaptureState;
use humangate::config::{ClientConfig, RelayConfig};
use humangate::relay::server::serve_on;
use humangate::relay::{Relay, RelayClient, RelayState, Verdict};
use humangate::submit::{SubmitOutcome, BOT_DETECTED_MESSAGE, SERVER_ERROR_MESSAGE};
use humangate::{EnvironmentProbes, Feature, FeatureVector, FormState, RelayError, Submitter};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct Classifier {
    prediction: Value,
    delay: Duration,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn predict(State(classifier): State<Classifier>, Json(body): Json<Value>) -> Json<Value> {
    classifier.received.lock().push(body);
    tokio::time::sleep(classifier.delay).await;
    Json(json!({ "prediction": classifier.prediction }))
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Stack {
    relay_addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn start_stack(prediction: Value, delay: Duration) -> Stack {
    let received = Arc::new(Mutex::new(Vec::new()));
    let classifier = Classifier {
        prediction,
        delay,
        received: received.clone(),
    };
    let classifier_addr = spawn(
        Router::new()
            .route("/predict", post(predict))
            .with_state(classifier),
    )
    .await;

    let state = RelayState::new(&RelayConfig {
        port: 0,
        classifier_url: format!("http://{}", classifier_addr),
        classifier_timeout_secs: 1,
    })
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve_on(listener, state).await.unwrap();
    });

    Stack {
        relay_addr,
        received,
    }
}

fn client_for(stack: &Stack) -> RelayClient {
    RelayClient::new(ClientConfig {
        relay_url: format!("http://{}", stack.relay_addr),
        timeout_secs: 5,
    })
    .unwrap()
}

fn typed_session() -> CaptureState {
    let mut capture = CaptureState::new(0);
    capture.on_pointer_move(10.0, 10.0, 100);
    capture.on_pointer_move(40.0, 50.0, 150);
    capture.on_pointer_move(80.0, 80.0, 250);
    capture.on_pointer_move(120.0, 95.0, 330);
    capture.on_pointer_move(160.0, 100.0, 420);
    capture.on_key_down("u", 1_000);
    capture.on_key_down("s", 1_180);
    capture.on_key_down("Tab", 1_400);
    capture
}

fn zeros() -> FeatureVector {
    FeatureVector::try_from(vec![0.0; 20]).unwrap()
}

fn desktop() -> EnvironmentProbes {
    EnvironmentProbes {
        automation_controlled: false,
        plugin_count: 3,
        screen_width: 1440,
    }
}

#[tokio::test]
async fn test_vector_forwarded_unchanged_and_prediction_returned_verbatim() {
    let stack = start_stack(json!(0), Duration::ZERO).await;
    let vector = FeatureVector::try_from((0..20).map(|i| i as f64 * 1.5).collect::<Vec<_>>()).unwrap();

    let response: Value = reqwest::Client::new()
        .post(format!("http://{}/api/check-human", stack.relay_addr))
        .json(&json!({ "features": vector }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response, json!({ "result": 0 }));
    let received = stack.received.lock().clone();
    assert_eq!(received, vec![json!({ "features": vector.as_slice() })]);
}

#[tokio::test]
async fn test_inexact_decimal_values_reach_classifier_bit_for_bit() {
    let stack = start_stack(json!(0), Duration::ZERO).await;
    let mut values = vec![0.0; 20];
    values[Feature::MouseAvgSpeed.index()] = 251.12748825736998;
    values[Feature::AvgKeystrokeDelayMs.index()] = 183.33333333333334;
    let vector = FeatureVector::try_from(values.clone()).unwrap();

    let verdict = client_for(&stack).check(&vector).await.unwrap();
    assert_eq!(verdict, Verdict::Human);

    let received = stack.received.lock().clone();
    let forwarded: Vec<f64> = received[0]["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(forwarded, values);
}

#[tokio::test]
async fn test_human_submission_is_allowed() {
    let stack = start_stack(json!(0), Duration::ZERO).await;
    let submitter = Submitter::new(client_for(&stack));
    let mut form = FormState::new("user@example.com", "hunter2");

    let outcome = submitter
        .submit(&mut form, &typed_session(), &desktop(), 4_000)
        .await;
    assert!(outcome.is_allowed());

    let received = stack.received.lock().clone();
    let features = received[0]["features"].as_array().unwrap();
    assert_eq!(features.len(), 20);
    assert_eq!(features[Feature::TabCount.index()], json!(1.0));
    assert_eq!(features[Feature::TimeToSubmitMs.index()], json!(4000.0));
    assert_eq!(features[Feature::MovedBeforeSubmit.index()], json!(1.0));
}

#[tokio::test]
async fn test_bot_submission_is_denied() {
    let stack = start_stack(json!(1), Duration::ZERO).await;
    let submitter = Submitter::new(client_for(&stack));
    let mut form = FormState::new("user@example.com", "hunter2");

    let outcome = submitter
        .submit(&mut form, &CaptureState::new(0), &desktop(), 150)
        .await;
    assert_eq!(
        outcome,
        SubmitOutcome::Denied {
            message: BOT_DETECTED_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_slow_classifier_fails_the_attempt() {
    let stack = start_stack(json!(0), Duration::from_secs(3)).await;
    let submitter = Submitter::new(client_for(&stack));
    let mut form = FormState::new("user@example.com", "hunter2");

    let outcome = submitter
        .submit(&mut form, &typed_session(), &desktop(), 4_000)
        .await;
    assert_eq!(
        outcome,
        SubmitOutcome::Failed {
            message: SERVER_ERROR_MESSAGE.to_string()
        }
    );
    assert_eq!(form.email, "user@example.com");
    assert!(!submitter.is_in_flight());
}

#[tokio::test]
async fn test_unexpected_prediction_is_relay_failure() {
    let stack = start_stack(json!("maybe"), Duration::ZERO).await;
    let client = client_for(&stack);

    let result = client.check(&zeros()).await;
    match result {
        Err(RelayError::UnexpectedVerdict(value)) => assert_eq!(value, json!("maybe")),
        other => panic!("expected unexpected verdict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_decodes_verdicts() {
    let stack = start_stack(json!(1), Duration::ZERO).await;
    let verdict = client_for(&stack)
        .check(&zeros())
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::Bot);
}
