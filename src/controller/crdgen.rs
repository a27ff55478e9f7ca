//! # CRD Generator
//!
//! Prints the `ECRSecret` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/ecrsecret.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use ecr_secret_controller::ECRSecret;
use kube::CustomResourceExt;

fn main() {
    let crd = ECRSecret::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
