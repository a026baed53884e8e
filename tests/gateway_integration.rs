use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value as JsonValue};
use zali_client::{
    balance_of, classify, run, ConfirmationOptions, ContractGateway, ErrorKind, FaucetFlow,
    FaucetOptions, GatewayError, GatewayOptions, HttpGateway, JoinPlan, RetryOptions,
    TransactionRequest, TxHash, DEFAULT_TOKEN_ADDRESS,
};

const PLAYER: &str = "0x1111111111111111111111111111111111111111";
const FAUCET: &str = "0x2222222222222222222222222222222222222222";
const GAME: &str = "0x3333333333333333333333333333333333333333";

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn result(result: JsonValue) -> Self {
        Self::json(
            StatusCode::OK,
            json!({ "jsonrpc": "2.0", "id": 1, "result": result }),
        )
    }

    fn rpc_error(code: i64, message: &str) -> Self {
        Self::json(
            StatusCode::OK,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": code, "message": message }
            }),
        )
    }

    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct RecordedRequest {
    method: String,
    params: JsonValue,
    authorization: Option<String>,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn rpc_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let payload: JsonValue = serde_json::from_str(&body).unwrap_or(JsonValue::Null);
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push(RecordedRequest {
            method: payload["method"].as_str().unwrap_or_default().to_owned(),
            params: payload["params"].clone(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "no mock response available" }),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn rpc_url(&self) -> String {
        format!("{}/rpc", self.base_url)
    }

    fn gateway(&self) -> HttpGateway {
        HttpGateway::new(self.rpc_url())
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    fn methods(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.method)
            .collect()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/rpc", post(rpc_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        requests: state.requests,
        task,
    }
}

fn uint_word(value: u128) -> JsonValue {
    JsonValue::String(format!("0x{value:064x}"))
}

fn mined_receipt(hash: &str, status: &str) -> JsonValue {
    json!({
        "transactionHash": hash,
        "blockNumber": "0x1b4",
        "status": status,
        "gasUsed": "0x5208"
    })
}

fn fast_confirmation() -> ConfirmationOptions {
    ConfirmationOptions {
        poll_interval_ms: 10,
        timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn chain_id_is_parsed_and_bearer_token_is_sent() {
    let server = spawn_server(vec![MockResponse::result(json!("0xa4ec"))]).await;
    let gateway = server.gateway().with_bearer("node-token");

    let chain_id = gateway.chain_id().await.expect("chain id must decode");

    assert_eq!(chain_id, 42220);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "eth_chainId");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer node-token")
    );
}

#[tokio::test]
async fn balance_of_sends_eth_call_against_latest_block() {
    let one_cusd = 1_000_000_000_000_000_000u128;
    let server = spawn_server(vec![MockResponse::result(uint_word(one_cusd))]).await;

    let balance = balance_of(&server.gateway(), DEFAULT_TOKEN_ADDRESS, PLAYER)
        .await
        .expect("balance must decode");

    assert_eq!(balance, one_cusd);
    let requests = server.requests();
    assert_eq!(requests[0].method, "eth_call");
    assert_eq!(requests[0].params[0]["to"], json!(DEFAULT_TOKEN_ADDRESS));
    assert!(requests[0].params[0]["data"]
        .as_str()
        .is_some_and(|data| data.starts_with("0x70a08231")));
    assert_eq!(requests[0].params[1], json!("latest"));
}

#[tokio::test]
async fn wallet_rejection_is_classified_and_not_retried() {
    let server = spawn_server(vec![
        MockResponse::rpc_error(4001, "User rejected the request."),
        MockResponse::result(json!("0xshould-not-be-used")),
    ])
    .await;
    let gateway = server.gateway();
    let tx = TransactionRequest::new(PLAYER, GAME).with_data("0xd1058e59");

    let handle = run(
        move || {
            let gateway = gateway.clone();
            let tx = tx.clone();
            async move { gateway.write(&tx).await }
        },
        RetryOptions::default()
            .with_auto_retry(true)
            .with_base_delay_ms(10),
    );
    let state = handle.settled().await;

    let error = state.error.expect("rejection must settle as an error");
    assert_eq!(error.kind, ErrorKind::UserRejected);
    assert!(error.is_user_rejected());
    assert_eq!(state.retry_count, 0);
    assert_eq!(server.methods(), vec!["eth_sendTransaction"]);
}

#[tokio::test]
async fn unavailable_node_is_a_network_error_that_auto_retries() {
    let server = spawn_server(vec![
        MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "upstream unavailable" }),
        ),
        MockResponse::result(json!("0xabc")),
    ])
    .await;
    let gateway = server.gateway();
    let tx = TransactionRequest::new(PLAYER, GAME);

    let direct = {
        let server = spawn_server(vec![MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "upstream unavailable" }),
        )])
        .await;
        server.gateway().write(&tx).await.unwrap_err()
    };
    assert!(matches!(direct, GatewayError::Http { status: 503, .. }));
    assert_eq!(classify(&direct).kind, ErrorKind::NetworkError);

    let handle = run(
        move || {
            let gateway = gateway.clone();
            let tx = tx.clone();
            async move { gateway.write(&tx).await }
        },
        RetryOptions::default()
            .with_auto_retry(true)
            .with_base_delay_ms(10),
    );
    let state = handle.settled().await;

    assert!(state.is_success());
    assert_eq!(state.data, Some(TxHash("0xabc".to_owned())));
    assert_eq!(state.retry_count, 1);
    assert_eq!(server.methods().len(), 2);
}

#[tokio::test]
async fn request_timeout_classifies_as_timeout() {
    let server = spawn_server(vec![MockResponse::result(json!("0xa4ec"))
        .with_delay(Duration::from_millis(500))])
    .await;
    let gateway = server
        .gateway()
        .with_options(GatewayOptions { timeout_ms: 50 });

    let err = gateway.chain_id().await.unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(classify(&err).kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn rejected_node_credentials_are_not_a_wallet_rejection() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::UNAUTHORIZED,
        json!({ "error": "Unauthorized" }),
    )])
    .await;

    let err = server
        .gateway()
        .with_bearer("stale-token")
        .chain_id()
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Http { status: 401, .. }));
    let classified = classify(&err);
    assert_eq!(classified.kind, ErrorKind::ProviderError);
    assert!(!classified.is_user_rejected());
}

#[tokio::test]
async fn rpc_error_with_non_success_status_keeps_rpc_code() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::TOO_MANY_REQUESTS,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32005, "message": "limit exceeded" }
        }),
    )])
    .await;

    let err = server.gateway().chain_id().await.unwrap_err();

    assert!(matches!(err, GatewayError::Rpc { code: -32005, .. }));
    assert_eq!(classify(&err).kind, ErrorKind::RateLimitExceeded);
}

#[tokio::test]
async fn confirmation_polls_until_receipt_is_mined() {
    let hash = "0x5e1f";
    let server = spawn_server(vec![
        MockResponse::result(JsonValue::Null),
        MockResponse::result(JsonValue::Null),
        MockResponse::result(mined_receipt(hash, "0x1")),
    ])
    .await;

    let receipt = server
        .gateway()
        .wait_for_confirmation(&TxHash(hash.to_owned()), &fast_confirmation())
        .await
        .expect("receipt must arrive");

    assert!(receipt.success);
    assert_eq!(receipt.block_number, Some(436));
    assert_eq!(
        server.methods(),
        vec![
            "eth_getTransactionReceipt",
            "eth_getTransactionReceipt",
            "eth_getTransactionReceipt",
        ]
    );
}

#[tokio::test]
async fn reverted_receipt_classifies_as_transaction_failed() {
    let hash = "0xdead";
    let server = spawn_server(vec![MockResponse::result(mined_receipt(hash, "0x0"))]).await;

    let err = server
        .gateway()
        .wait_for_confirmation(&TxHash(hash.to_owned()), &fast_confirmation())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Reverted { .. }));
    assert_eq!(classify(&err).kind, ErrorKind::TransactionFailed);
}

#[tokio::test]
async fn faucet_claim_is_confirmed_before_join_is_sent() {
    let min_balance = 100_000_000_000_000_000u128;
    let server = spawn_server(vec![
        MockResponse::result(uint_word(0)),
        MockResponse::result(json!("0xc1a1")),
        MockResponse::result(mined_receipt("0xc1a1", "0x1")),
        MockResponse::result(uint_word(min_balance * 10)),
        MockResponse::result(json!("0x101e")),
        MockResponse::result(JsonValue::Null),
        MockResponse::result(mined_receipt("0x101e", "0x1")),
    ])
    .await;
    let gateway = server.gateway();
    let plan = JoinPlan::new(
        PLAYER,
        DEFAULT_TOKEN_ADDRESS,
        FAUCET,
        TransactionRequest::new(PLAYER, GAME).with_data("0xd1058e59"),
    );
    let options = FaucetOptions {
        confirmation: fast_confirmation(),
        balance_poll_interval_ms: 10,
        balance_timeout_ms: 2_000,
        ..FaucetOptions::default()
    };

    let outcome = FaucetFlow::new(&gateway)
        .with_options(options)
        .claim_then_join(&plan)
        .await
        .expect("claim then join must succeed");

    assert_eq!(
        outcome.claim.map(|receipt| receipt.transaction_hash),
        Some(TxHash("0xc1a1".to_owned()))
    );
    assert_eq!(outcome.balance_wei, min_balance * 10);
    assert_eq!(outcome.join.transaction_hash, TxHash("0x101e".to_owned()));
    assert_eq!(
        server.methods(),
        vec![
            "eth_call",
            "eth_sendTransaction",
            "eth_getTransactionReceipt",
            "eth_call",
            "eth_sendTransaction",
            "eth_getTransactionReceipt",
            "eth_getTransactionReceipt",
        ]
    );

    let requests = server.requests();
    assert_eq!(requests[1].params[0]["to"], json!(FAUCET));
    assert_eq!(requests[1].params[0]["data"], json!("0x4e71d92d"));
    assert_eq!(requests[4].params[0]["to"], json!(GAME));
}
