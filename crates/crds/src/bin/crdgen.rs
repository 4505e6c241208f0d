//! Prints the CustomResourceDefinitions as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/bases/crds.yaml`

use crds::{PrometheusExporter, PrometheusServer};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let documents = [
        serde_yaml::to_string(&PrometheusServer::crd())?,
        serde_yaml::to_string(&PrometheusExporter::crd())?,
    ];

    for document in documents {
        println!("---");
        print!("{}", document);
    }

    Ok(())
}
