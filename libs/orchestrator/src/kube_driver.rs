use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams, PropagationPolicy};
use kube::Client;
use tracing::{debug, instrument, warn};

use crate::driver::OrchestratorDriver;
use crate::error::OrchestratorError;

/// `OrchestratorDriver` implementation backed by the Kubernetes API via
/// `kube`. One instance is the "target" cluster driver that hosts
/// elastic instances; a bare `kube::Client` built from the local
/// in-cluster config is used directly by the leader gate instead.
#[derive(Clone)]
pub struct KubeOrchestratorDriver {
    client: Client,
    namespace: String,
    http: reqwest::Client,
}

impl KubeOrchestratorDriver {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            http: reqwest::Client::new(),
        }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn delete_params_immediate() -> DeleteParams {
        DeleteParams {
            grace_period_seconds: Some(0),
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        }
    }

    async fn http_get(&self, host_ip: &str, port: i32, path: &str) -> Result<String, OrchestratorError> {
        let url = format!("http://{host_ip}:{port}{path}");
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OrchestratorError::HealthProbeFailed(format!(
                "{url} returned {}",
                resp.status()
            )));
        }
        Ok(resp.text().await?)
    }
}

fn is_pod_ready(pod: &Pod) -> bool {
    let Some(status) = &pod.status else {
        return false;
    };
    if status.phase.as_deref() != Some("Running") {
        return false;
    }
    status
        .conditions
        .as_ref()
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

#[async_trait]
impl OrchestratorDriver for KubeOrchestratorDriver {
    #[instrument(skip(self, pod), fields(pod_name = pod.metadata.name.as_deref()))]
    async fn create_pod(&self, pod: Pod) -> Result<(), OrchestratorError> {
        self.pods().create(&PostParams::default(), &pod).await?;
        Ok(())
    }

    #[instrument(skip(self, service), fields(service_name = service.metadata.name.as_deref()))]
    async fn create_service(&self, service: Service) -> Result<Service, OrchestratorError> {
        Ok(self
            .services()
            .create(&PostParams::default(), &service)
            .await?)
    }

    async fn get_pod(&self, name: &str) -> Result<Option<Pod>, OrchestratorError> {
        match self.pods().get(name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_service(&self, name: &str) -> Result<Option<Service>, OrchestratorError> {
        match self.services().get(name).await {
            Ok(svc) => Ok(Some(svc)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, OrchestratorError> {
        let params = ListParams::default().labels(label_selector);
        let list = self.pods().list(&params).await?;
        Ok(list.items)
    }

    #[instrument(skip(self))]
    async fn delete_pod(&self, name: &str) -> Result<(), OrchestratorError> {
        match self.pods().delete(name, &Self::delete_params_immediate()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!(pod_name = name, "delete_pod: already gone, treating as success");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete_service(&self, name: &str) -> Result<(), OrchestratorError> {
        match self
            .services()
            .delete(name, &Self::delete_params_immediate())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!(service_name = name, "delete_service: already gone, treating as success");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn wait_until_ready(
        &self,
        pod_name: &str,
        node_port: i32,
        timeout: Duration,
    ) -> Result<String, OrchestratorError> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(OrchestratorError::ReadinessTimeout(pod_name.to_string()));
            }
            let Some(pod) = self.get_pod(pod_name).await? else {
                return Err(OrchestratorError::NotFound(pod_name.to_string()));
            };
            if is_pod_ready(&pod) {
                if let Some(host_ip) = pod.status.as_ref().and_then(|s| s.host_ip.clone()) {
                    if self.health_probe(&host_ip, node_port).await.is_ok() {
                        return Ok(host_ip);
                    }
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    #[instrument(skip(self))]
    async fn health_probe(&self, host_ip: &str, node_port: i32) -> Result<(), OrchestratorError> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            match self.http_get(host_ip, node_port, "/healthz").await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(host_ip, node_port, attempt, "health probe attempt failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            OrchestratorError::HealthProbeFailed("no attempts were made".to_string())
        }))
    }

    async fn get_status(&self, host_ip: &str, node_port: i32) -> Result<String, OrchestratorError> {
        self.http_get(host_ip, node_port, "/getStatus").await
    }
}
