//! # CRD Generator
//!
//! Generates the `GithubApp` CustomResourceDefinition YAML from the Rust
//! type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/githubapp.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use github_app_controller::crd::GithubApp;
use kube::core::CustomResourceExt;

fn main() {
    let crd = GithubApp::crd();
    print!(
        "{}",
        serde_yaml::to_string(&crd).expect("GithubApp CRD must serialize to YAML")
    );
}
