use super::{expect_pods_running, pod_name_pattern, Env};
use anyhow::{ensure, Context, Result};
use log::info;
use model::{
    expect_at_least, expect_contains, expect_eq, wait_until, HttpProbe, HttpResponse, Kubectl,
};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NAMESPACE: &str = "prometheus";
const SERVER: &str = "prometheus-server";
const SERVER_LABEL: &str = "app.kubernetes.io/name=prometheus";
const NODE_EXPORTER: &str = "prometheus-prometheus-node-exporter";
const NODE_EXPORTER_LABEL: &str = "app.kubernetes.io/name=prometheus-node-exporter";
const NODE_EXPORTER_POD_PREFIX: &str = "prometheus-node-exporter";

const LOCAL_PORT: u16 = 9090;
const SERVICE_PORT: u16 = 80;
/// The tunnel gives no sign of readiness, so requests wait this long after it is started.
const TUNNEL_SETTLE: Duration = Duration::from_secs(5);
/// How far back the series query looks.
const SERIES_LOOKBACK: Duration = Duration::from_secs(5 * 60);

const NATIVE_WAIT: Duration = Duration::from_secs(240);
const LISTED_TIMEOUT: Duration = Duration::from_secs(60);
const LISTED_INTERVAL: Duration = Duration::from_secs(10);
const PODS_TIMEOUT: Duration = Duration::from_secs(120);
const PODS_INTERVAL: Duration = Duration::from_secs(15);

/// The Prometheus add-on is running on every node and serves metrics.
pub(crate) fn run(env: &Env<'_>) -> Result<()> {
    let kubectl = env.kubectl;
    server_running(kubectl)?;
    node_exporters_running(kubectl)?;

    let probe = HttpProbe::new(env.config()).context("Unable to create the HTTP probe")?;
    let forward = kubectl
        .port_forward(
            &format!("service/{}", SERVER),
            LOCAL_PORT,
            SERVICE_PORT,
            NAMESPACE,
        )
        .context("Unable to port-forward to the Prometheus server")?;
    std::thread::sleep(TUNNEL_SETTLE);
    let url = series_url(&forward.local_url(), SystemTime::now())?;
    let response = probe.get(&url);
    kubectl
        .stop_pid(forward)
        .context("Unable to stop the port-forward")?;

    expect_up_series(&response.context("Unable to query the Prometheus server")?)
}

fn server_running(kubectl: &Kubectl) -> Result<()> {
    wait_until(LISTED_TIMEOUT, LISTED_INTERVAL, || {
        let deployments = kubectl.get_deployments(NAMESPACE)?;
        expect_contains("deployments", deployments.names()?, &SERVER)
    })
    .context("The Prometheus server is not deployed")?;

    kubectl
        .wait_for_deployment(SERVER, NATIVE_WAIT, NAMESPACE)
        .context("The Prometheus server never became available")?;

    let pattern = pod_name_pattern(SERVER)?;
    wait_until(PODS_TIMEOUT, PODS_INTERVAL, || {
        let pods = kubectl.get_pods_by_label(SERVER_LABEL, NAMESPACE)?;
        expect_at_least("server pod count", pods.len(), 1)?;
        expect_pods_running(&pods, &pattern)
    })
    .context("The Prometheus server pods are not running")
}

fn node_exporters_running(kubectl: &Kubectl) -> Result<()> {
    kubectl
        .wait_for_daemon_set(NODE_EXPORTER, NATIVE_WAIT, NAMESPACE)
        .context("The node exporters were never rolled out")?;

    let pattern = pod_name_pattern(NODE_EXPORTER_POD_PREFIX)?;
    wait_until(PODS_TIMEOUT, PODS_INTERVAL, || {
        let pods = kubectl.get_pods_by_label(NODE_EXPORTER_LABEL, NAMESPACE)?;
        expect_at_least("node exporter count", pods.len(), 1)?;
        let nodes = kubectl.get_nodes()?;
        expect_at_least("node count", nodes.len(), 1)?;
        expect_eq("node exporter count", pods.len(), nodes.len())?;
        expect_pods_running(&pods, &pattern)
    })
    .context("The node exporters are not running on every node")?;
    info!("A node exporter is running on every node");
    Ok(())
}

/// `/api/v1/series` for the `up` series of the Prometheus job itself, starting
/// [`SERIES_LOOKBACK`] before `now`.
fn series_url(base: &str, now: SystemTime) -> Result<String> {
    let start = now
        .checked_sub(SERIES_LOOKBACK)
        .unwrap_or(UNIX_EPOCH)
        .duration_since(UNIX_EPOCH)
        .context("The system clock is before the epoch")?
        .as_secs();
    Ok(format!(
        "{}/api/v1/series?match%5B%5D=up%7Bjob%3D%22prometheus%22%7D&start={}",
        base, start
    ))
}

fn expect_up_series(response: &HttpResponse) -> Result<()> {
    ensure!(
        response.status == 200,
        "{} returned {}: {}",
        response.url,
        response.status,
        response.body
    );
    ensure!(
        response
            .content_type
            .as_deref()
            .unwrap_or_default()
            .contains("application/json"),
        "{} returned content type {:?}",
        response.url,
        response.content_type
    );
    let body: Value = response.json()?;
    ensure!(
        body["status"] == "success",
        "The series query did not succeed: {}",
        response.body
    );
    let series = body["data"].as_array().cloned().unwrap_or_default();
    ensure!(
        series.iter().any(|s| s["__name__"] == "up" && s["job"] == "prometheus"),
        "No 'up' series for the Prometheus job: {}",
        response.body
    );
    info!("Prometheus reports {} 'up' series", series.len());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn response(status: u16, content_type: &str, body: &str) -> HttpResponse {
        HttpResponse {
            url: "http://127.0.0.1:9090/api/v1/series".to_string(),
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn series_query() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            series_url("http://127.0.0.1:9090", now).unwrap(),
            "http://127.0.0.1:9090/api/v1/series?match%5B%5D=up%7Bjob%3D%22prometheus%22%7D\
             &start=1699999700"
        );
    }

    #[test]
    fn up_series_is_found() {
        expect_up_series(&response(
            200,
            "application/json",
            r#"{"status":"success","data":[{"__name__":"up","instance":"localhost:9090","job":"prometheus"}]}"#,
        ))
        .unwrap();
    }

    #[test]
    fn empty_or_failed_queries_are_rejected() {
        assert!(expect_up_series(&response(
            200,
            "application/json",
            r#"{"status":"success","data":[]}"#
        ))
        .is_err());
        assert!(expect_up_series(&response(503, "text/plain", "unavailable")).is_err());
        assert!(expect_up_series(&response(200, "text/html", "<html></html>")).is_err());
    }
}
