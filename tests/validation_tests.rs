//! # Validation Tests
//!
//! Tests for the key-source exclusivity rule as enforced on deserialized
//! resources, mirroring what an API client sees through the admission
//! webhook.

use github_app_controller::controller::validation::validate_key_sources;
use github_app_controller::crd::GithubApp;
use github_app_controller::keys::KEY_SOURCE_EXCLUSIVITY_RULE;

fn app_from_yaml(yaml: &str) -> GithubApp {
    serde_yaml::from_str(yaml).expect("test resource should deserialize")
}

#[test]
fn test_single_source_each_variant_admitted() {
    let variants = [
        "  privateKeySecret: gh-app-key-test",
        "  googlePrivateKeySecret: projects/p/secrets/s/versions/latest",
        "  vaultPrivateKey:\n    mountPath: secret\n    secretPath: apps/ci\n    secretKey: key",
    ];

    for source in variants {
        let yaml = format!(
            r#"
apiVersion: githubapp.samir.io/v1
kind: GithubApp
metadata:
  name: test-app
  namespace: default
spec:
  appId: 857468
  installId: 48531286
  accessTokenSecret: github-app-access-token-857468
{source}
"#
        );
        let app = app_from_yaml(&yaml);
        assert!(
            validate_key_sources(&app.spec).is_ok(),
            "source block should be admitted:\n{source}"
        );
    }
}

#[test]
fn test_two_sources_rejected_with_exact_message() {
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
  googlePrivateKeySecret: projects/p/secrets/s/versions/latest
"#;

    let app = app_from_yaml(yaml);
    let message = validate_key_sources(&app.spec).unwrap_err();
    assert!(
        message.contains(
            "exactly one of googlePrivateKeySecret, privateKeySecret, or vaultPrivateKey must be specified"
        ),
        "unexpected message: {message}"
    );
}

#[test]
fn test_all_three_sources_rejected() {
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
  googlePrivateKeySecret: projects/p/secrets/s/versions/latest
  vaultPrivateKey:
    mountPath: secret
    secretPath: apps/ci
    secretKey: key
"#;

    let app = app_from_yaml(yaml);
    assert_eq!(
        validate_key_sources(&app.spec).unwrap_err(),
        KEY_SOURCE_EXCLUSIVITY_RULE
    );
}

#[test]
fn test_no_source_rejected() {
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
"#;

    let app = app_from_yaml(yaml);
    assert_eq!(
        validate_key_sources(&app.spec).unwrap_err(),
        KEY_SOURCE_EXCLUSIVITY_RULE
    );
}
