//! # CRD Validation Tests
//!
//! Tests for all CRD elements to catch schema drift early. These validate
//! that all fields deserialize correctly and that sample resources match the
//! expected schema.

use github_app_controller::crd::GithubApp;
use kube::core::CustomResourceExt;

/// Test a GithubApp backed by a Kubernetes Secret key source
#[test]
fn test_github_app_with_kubernetes_key_source() {
    let yaml = r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
  namespace: default
spec:
  appId: 857468
  installId: 48531286
  accessTokenSecret: github-app-access-token-857468
  privateKeySecret: gh-app-key-test
"#;

    let app: GithubApp =
        serde_yaml::from_str(yaml).expect("Should deserialize GithubApp with k8s key source");

    assert_eq!(app.spec.app_id, 857_468);
    assert_eq!(app.spec.install_id, 48_531_286);
    assert_eq!(app.spec.access_token_secret, "github-app-access-token-857468");
    assert_eq!(app.spec.private_key_secret.as_deref(), Some("gh-app-key-test"));
    assert!(app.spec.google_private_key_secret.is_none());
    assert!(app.spec.vault_private_key.is_none());
    assert!(app.spec.rollout_deployment.is_none());
    assert!(app.status.is_none());
}

/// Test a GithubApp backed by GCP Secret Manager
#[test]
fn test_github_app_with_google_key_source() {
    let yaml = r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
  namespace: default
spec:
  appId: 1234
  installId: 5678
  accessTokenSecret: github-app-access-token-1234
  googlePrivateKeySecret: projects/my-project/secrets/gh-app-key/versions/latest
"#;

    let app: GithubApp =
        serde_yaml::from_str(yaml).expect("Should deserialize GithubApp with GCP key source");

    assert_eq!(
        app.spec.google_private_key_secret.as_deref(),
        Some("projects/my-project/secrets/gh-app-key/versions/latest")
    );
    assert!(app.spec.private_key_secret.is_none());
}

/// Test a GithubApp backed by Vault with rollout labels
#[test]
fn test_github_app_with_vault_key_source_and_rollout() {
    let yaml = r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
  namespace: team-a
spec:
  appId: 1234
  installId: 5678
  accessTokenSecret: github-app-access-token-1234
  vaultPrivateKey:
    mountPath: secret
    secretPath: github-apps/ci
    secretKey: privateKey
  rolloutDeployment:
    labels:
      foo: bar
      app: my-service
"#;

    let app: GithubApp =
        serde_yaml::from_str(yaml).expect("Should deserialize GithubApp with vault key source");

    let vault = app.spec.vault_private_key.expect("vaultPrivateKey should be set");
    assert_eq!(vault.mount_path, "secret");
    assert_eq!(vault.secret_path, "github-apps/ci");
    assert_eq!(vault.secret_key, "privateKey");

    let rollout = app.spec.rollout_deployment.expect("rolloutDeployment should be set");
    assert_eq!(rollout.labels.len(), 2);
    assert_eq!(rollout.labels.get("foo").map(String::as_str), Some("bar"));
    assert_eq!(
        rollout.labels.get("app").map(String::as_str),
        Some("my-service")
    );
}

/// Status fields round-trip through serde with camelCase names
#[test]
fn test_github_app_status_deserialization() {
    let yaml = r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
  namespace: default
spec:
  appId: 1234
  installId: 5678
  accessTokenSecret: github-app-access-token-1234
  privateKeySecret: gh-app-key
status:
  expiresAt: "2026-08-01T12:00:00Z"
  error: ""
"#;

    let app: GithubApp = serde_yaml::from_str(yaml).expect("Should deserialize status");
    let status = app.status.expect("status should be set");
    assert_eq!(status.expires_at.as_deref(), Some("2026-08-01T12:00:00Z"));
    assert!(status.error.is_empty());
    assert!(status.expires_at_utc().is_some());
}

/// Missing required fields are rejected
#[test]
fn test_github_app_missing_required_fields() {
    let yaml = r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
spec:
  appId: 1234
"#;

    let result: Result<GithubApp, _> = serde_yaml::from_str(yaml);
    assert!(result.is_err(), "installId and accessTokenSecret are required");
}

/// Generated CRD carries the expected identity and printer columns
#[test]
fn test_generated_crd_shape() {
    let crd = GithubApp::crd();

    assert_eq!(crd.spec.group, "githubapp.samir.io");
    assert_eq!(crd.spec.names.kind, "GithubApp");
    assert_eq!(crd.spec.names.plural, "githubapps");
    assert_eq!(crd.spec.scope, "Namespaced");

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1");
    assert!(
        version
            .subresources
            .as_ref()
            .and_then(|subresources| subresources.status.as_ref())
            .is_some(),
        "status subresource should be enabled"
    );

    let columns: Vec<String> = version
        .additional_printer_columns
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|column| column.name.clone())
        .collect();
    assert_eq!(
        columns,
        vec![
            "App ID",
            "Access Token Secret",
            "Install ID",
            "Expires At",
            "Error"
        ]
    );
}
