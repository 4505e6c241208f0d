//! Builders for test resources.

use crds::{
    AttributeConfiguration, ClusterConfiguration, EntityConfiguration, EntityType, MetricConfiguration,
    MetricType, PrometheusExporter, PrometheusExporterSpec, PrometheusServer, PrometheusServerSpec,
    QueryConfiguration, QueryType,
};
use http::{Method, Request, Response};
use kube::client::Body;
use kube::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

pub const TEST_NAMESPACE: &str = "turbonomic";

/// A valid entity definition of `entity_type`
pub fn entity(entity_type: EntityType) -> EntityConfiguration {
    EntityConfiguration {
        entity_type,
        hosted_on_vm: true,
        metric_configs: vec![MetricConfiguration {
            metric_type: MetricType::ResponseTime,
            queries: vec![QueryConfiguration {
                query_type: QueryType::Used,
                promql: "rate(http_server_requests_seconds_sum[5m])".to_string(),
            }],
        }],
        attribute_configs: vec![AttributeConfiguration {
            name: "ip".to_string(),
            label: "instance".to_string(),
            matches: Some(r"\d{1,3}(?:\.\d{1,3}){3}".to_string()),
            as_template: None,
            is_identifier: true,
        }],
    }
}

/// A valid exporter declaring `entity_types`, labelled with `labels`
pub fn exporter(name: &str, entity_types: &[EntityType], labels: &[(&str, &str)]) -> PrometheusExporter {
    let mut exporter = PrometheusExporter::new(
        name,
        PrometheusExporterSpec {
            entity_configs: entity_types.iter().copied().map(entity).collect(),
        },
    );
    exporter.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    exporter.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    );
    exporter
}

pub fn server_spec(address: &str, clusters: Vec<ClusterConfiguration>) -> PrometheusServerSpec {
    PrometheusServerSpec {
        address: address.to_string(),
        clusters,
    }
}

pub fn server(name: &str, spec: PrometheusServerSpec) -> PrometheusServer {
    let mut server = PrometheusServer::new(name, spec);
    server.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    server
}

pub type ApiHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// A kube `Client` whose requests are answered through the returned handle
pub fn mock_client() -> (Client, ApiHandle) {
    let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, TEST_NAMESPACE), handle)
}

/// A request received by `serve_api`
#[derive(Debug)]
pub struct ApiCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiCall {
    /// The `status` object of a status patch
    pub fn status(&self) -> &Value {
        &self.body.as_ref().expect("request without body")["status"]
    }
}

/// Answers exporter LISTs with `exporters` and status PATCHes with `patched`.
///
/// Every request is forwarded to the returned channel before it is
/// answered. The channel closes once the client has been dropped.
pub fn serve_api(
    mut handle: ApiHandle,
    exporters: Vec<PrometheusExporter>,
    patched: impl Serialize,
) -> mpsc::UnboundedReceiver<ApiCall> {
    let list = json!({
        "apiVersion": "metrics.turbonomic.io/v1alpha1",
        "kind": "PrometheusExporterList",
        "metadata": {"resourceVersion": "1"},
        "items": exporters,
    });
    let patched = serde_json::to_value(patched).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some((request, send)) = handle.next_request().await {
            let method = request.method().clone();
            let path = request.uri().path().to_string();
            let bytes = request.into_body().collect_bytes().await.unwrap();
            let body = (!bytes.is_empty()).then(|| serde_json::from_slice::<Value>(&bytes).unwrap());

            let response = if method == Method::GET && path.ends_with("/prometheusexporters") {
                &list
            } else if method == Method::PATCH && path.ends_with("/status") {
                &patched
            } else {
                panic!("unexpected request {} {}", method, path);
            };
            let response = Response::builder()
                .body(Body::from(serde_json::to_vec(response).unwrap()))
                .unwrap();

            let _ = tx.send(ApiCall { method, path, body });
            send.send_response(response);
        }
    });

    rx
}

pub fn exporters_path() -> String {
    format!(
        "/apis/metrics.turbonomic.io/v1alpha1/namespaces/{}/prometheusexporters",
        TEST_NAMESPACE
    )
}

pub fn status_path(plural: &str, name: &str) -> String {
    format!(
        "/apis/metrics.turbonomic.io/v1alpha1/namespaces/{}/{}/{}/status",
        TEST_NAMESPACE, plural, name
    )
}
