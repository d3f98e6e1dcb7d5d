use std::time::Duration;

use serde_json::json;
use sorosub_client::{
    credit::{horizon_credit_data, try_horizon_credit_data},
    error::ClientError,
    horizon::Horizon,
    rpc::{HttpRpc, SorobanRpc},
};
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ACCOUNT: &str = "GDFYJUIWYT63JQW4YCIMJTHOTHRE4W4OAUUO6JZB3PDGCQZBQGUAOJHX";
const TIMEOUT: Duration = Duration::from_secs(5);

fn rpc(server: &MockServer) -> SorobanRpc<HttpRpc> {
    SorobanRpc::new(HttpRpc::new(server.uri(), TIMEOUT).unwrap())
}

#[tokio::test]
async fn test_rpc_result_is_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "getLatestLedger"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"id": "abc", "protocolVersion": 21, "sequence": 1234}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let latest = rpc(&server).get_latest_ledger().await.unwrap();
    assert_eq!(latest.sequence, 1234);
    assert_eq!(latest.protocol_version, 21);
}

#[tokio::test]
async fn test_rpc_error_object_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "invalid hash"}
        })))
        .mount(&server)
        .await;

    let err = rpc(&server).get_transaction("00").await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc { code: -32602, ref message } if message == "invalid hash"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rpc_http_failure_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = rpc(&server).get_network().await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unfunded_account_scores_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": 404})))
        .mount(&server)
        .await;

    let horizon = Horizon::from_url(&server.uri(), TIMEOUT).unwrap();
    assert!(horizon.account(ACCOUNT).await.unwrap().is_none());

    let data = try_horizon_credit_data(&horizon, ACCOUNT).await.unwrap();
    assert_eq!(data.total_horizon_score, 0);
}

#[tokio::test]
async fn test_horizon_score_from_live_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": ACCOUNT,
            "account_id": ACCOUNT,
            "sequence": "4294967296",
            "balances": [{"asset_type": "native", "balance": "150.0000000"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}/payments")))
        .and(query_param("limit", "100"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"records": [
                {"id": "1", "type": "payment"},
                {"id": "2", "type": "path_payment_strict_send"},
                {"id": "3", "type": "create_account"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}/transactions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"records": (0..25).map(|i| json!({"id": i.to_string()})).collect::<Vec<_>>()}
        })))
        .mount(&server)
        .await;

    let horizon = Horizon::from_url(&server.uri(), TIMEOUT).unwrap();
    let data = horizon_credit_data(&horizon, ACCOUNT).await;

    assert_eq!(data.account_age_bonus, 15);
    assert_eq!(data.balance_bonus, 7);
    assert_eq!(data.payment_activity_bonus, 2);
    assert_eq!(data.transaction_bonus, 10);
    assert_eq!(data.total_horizon_score, 34);
    assert_eq!(data.inputs.transaction_count, 25);
}

#[tokio::test]
async fn test_failed_history_counts_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": ACCOUNT,
            "sequence": "20",
            "balances": [{"asset_type": "native", "balance": "1.0000000"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}/payments")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{ACCOUNT}/transactions")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let horizon = Horizon::from_url(&server.uri(), TIMEOUT).unwrap();
    let data = try_horizon_credit_data(&horizon, ACCOUNT).await.unwrap();

    assert_eq!(data.account_age_bonus, 5);
    assert_eq!(data.balance_bonus, 2);
    assert_eq!(data.payment_activity_bonus, 0);
    assert_eq!(data.transaction_bonus, 0);
    assert_eq!(data.total_horizon_score, 7);
}
