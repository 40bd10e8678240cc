//! Pangea AuthN Integration Tests
//!
//! Tests for the code exchange and token check against a mock AuthN service.

use authz_rag::auth::{AuthError, IdentityClient, PangeaIdentityClient};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_TOKEN: &str = "pcl_test";

fn create_client(mock_server: &MockServer) -> PangeaIdentityClient {
    PangeaIdentityClient::new(&mock_server.uri(), CLIENT_TOKEN).unwrap()
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_code_returns_active_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/client/userinfo"))
            .and(bearer_token(CLIENT_TOKEN))
            .and(body_json(json!({ "code": "XYZ" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Success",
                "summary": "Token retrieved",
                "result": {
                    "refresh_token": { "token": "ptr_1" },
                    "active_token": { "token": "ptu_1", "expire": "2030-01-01T00:00:00Z" }
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let token = create_client(&mock_server).exchange_code("XYZ").await.unwrap();

        assert_eq!(token.token, "ptu_1");
        assert!(token.expire.is_some());
    }

    #[tokio::test]
    async fn test_rejected_code_is_exchange_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/client/userinfo"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "ValidationError",
                "summary": "Code is invalid"
            })))
            .mount(&mock_server)
            .await;

        let result = create_client(&mock_server).exchange_code("bogus").await;

        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn test_missing_active_token_is_exchange_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/client/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Success",
                "summary": "ok",
                "result": {}
            })))
            .mount(&mock_server)
            .await;

        let result = create_client(&mock_server).exchange_code("XYZ").await;

        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn test_validate_token_reports_owner() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/client/token/check"))
            .and(bearer_token(CLIENT_TOKEN))
            .and(body_json(json!({ "token": "ptu_1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Success",
                "summary": "Token is valid",
                "result": { "owner": "alice@example.com", "identity": "pui_1" }
            })))
            .mount(&mock_server)
            .await;

        let info = create_client(&mock_server).validate_token("ptu_1").await.unwrap();

        assert_eq!(info.owner, "alice@example.com");
        assert_eq!(info.identity.as_deref(), Some("pui_1"));
    }

    #[tokio::test]
    async fn test_rejected_token_is_invalid() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/client/token/check"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "InvalidToken",
                "summary": "Token is expired"
            })))
            .mount(&mock_server)
            .await;

        let result = create_client(&mock_server).validate_token("ptu_old").await;

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_backend_error() {
        let client = PangeaIdentityClient::new("http://127.0.0.1:1", CLIENT_TOKEN).unwrap();
        let result = client.exchange_code("XYZ").await;
        assert!(matches!(result, Err(AuthError::BackendError(_))));
    }
}
