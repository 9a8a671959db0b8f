//! # Admission Webhook
//!
//! Validating admission webhook for `GithubApp` resources. On Create and
//! Update it enforces that exactly one private-key source is configured;
//! Delete is always admitted.
//!
//! TLS termination is expected in front of the listener (the webhook
//! Service routes through the deployment's certificate-bearing proxy), so
//! the handler itself speaks plain HTTP.

use crate::constants::WEBHOOK_PATH;
use crate::controller::validation::validate_key_sources;
use crate::crd::GithubApp;
use axum::routing::post;
use axum::{Json, Router};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Serve the validating webhook on the given port
pub async fn start_webhook_server(port: u16) -> Result<(), anyhow::Error> {
    let app = Router::new().route(WEBHOOK_PATH, post(validate_github_app));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("admission webhook listening on {addr}{WEBHOOK_PATH}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Validate a `GithubApp` admission review
async fn validate_github_app(
    Json(review): Json<AdmissionReview<GithubApp>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<GithubApp> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!("rejecting malformed admission review: {e}");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = AdmissionResponse::from(&request);
    let response = match admit(&request) {
        Ok(()) => response,
        Err(message) => response.deny(message),
    };

    Json(response.into_review())
}

/// Core admission decision, separated from transport for testing
fn admit(request: &AdmissionRequest<GithubApp>) -> Result<(), String> {
    use kube::core::admission::Operation;

    if matches!(request.operation, Operation::Delete) {
        return Ok(());
    }

    match request.object.as_ref() {
        Some(app) => validate_key_sources(&app.spec),
        // Nothing to validate without an object; the API server only omits
        // it on Delete
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_SOURCE_EXCLUSIVITY_RULE;

    fn review_json(spec: serde_json::Value, operation: &str) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "githubapp.samir.io", "version": "v1", "kind": "GithubApp"},
                "resource": {"group": "githubapp.samir.io", "version": "v1", "resource": "githubapps"},
                "requestKind": {"group": "githubapp.samir.io", "version": "v1", "kind": "GithubApp"},
                "requestResource": {"group": "githubapp.samir.io", "version": "v1", "resource": "githubapps"},
                "name": "my-app",
                "namespace": "default",
                "operation": operation,
                "userInfo": {"username": "admin"},
                "object": if operation == "DELETE" { serde_json::Value::Null } else {
                    serde_json::json!({
                        "apiVersion": "githubapp.samir.io/v1",
                        "kind": "GithubApp",
                        "metadata": {"name": "my-app", "namespace": "default"},
                        "spec": spec
                    })
                },
                "oldObject": null,
                "dryRun": false
            }
        })
    }

    fn request_for(spec: serde_json::Value, operation: &str) -> AdmissionRequest<GithubApp> {
        let review: AdmissionReview<GithubApp> =
            serde_json::from_value(review_json(spec, operation)).unwrap();
        review.try_into().unwrap()
    }

    #[test]
    fn admits_single_key_source() {
        let request = request_for(
            serde_json::json!({
                "appId": 857468,
                "installId": 48531286,
                "accessTokenSecret": "github-app-access-token-857468",
                "privateKeySecret": "gh-app-key-test"
            }),
            "CREATE",
        );
        assert!(admit(&request).is_ok());
    }

    #[test]
    fn denies_multiple_key_sources_with_rule_text() {
        let request = request_for(
            serde_json::json!({
                "appId": 857468,
                "installId": 48531286,
                "accessTokenSecret": "github-app-access-token-857468",
                "privateKeySecret": "gh-app-key-test",
                "googlePrivateKeySecret": "projects/p/secrets/s/versions/latest"
            }),
            "UPDATE",
        );
        assert_eq!(admit(&request).unwrap_err(), KEY_SOURCE_EXCLUSIVITY_RULE);
    }

    #[test]
    fn denies_zero_key_sources() {
        let request = request_for(
            serde_json::json!({
                "appId": 857468,
                "installId": 48531286,
                "accessTokenSecret": "github-app-access-token-857468"
            }),
            "CREATE",
        );
        assert_eq!(admit(&request).unwrap_err(), KEY_SOURCE_EXCLUSIVITY_RULE);
    }

    #[test]
    fn always_admits_delete() {
        let request = request_for(serde_json::Value::Null, "DELETE");
        assert!(admit(&request).is_ok());
    }
}
