//! Tool dispatch
//!
//! Maps incoming tool requests onto resolver, orchestrator, and store
//! operations, and folds domain errors into wire error codes. A collect
//! request is tracked in the in-flight registry under its request id until
//! its invocation completes, which is what `cancel` keys on.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::JobsConfig;
use crate::domain::{Target, ToolInvocation};
use crate::id::generate_invocation_id;
use crate::orchestrator::Orchestrator;
use crate::resolver;
use crate::server::messages::{ToolError, ToolRequest, ToolResponse};
use crate::server::tools;

/// Routes tool requests to the pieces that serve them
pub struct ToolHandler {
    orchestrator: Arc<Orchestrator>,
    jobs: JobsConfig,
    /// Parent of every invocation token; cancelling it drains the server
    shutdown: CancellationToken,
    inflight: RwLock<HashMap<u64, CancellationToken>>,
}

impl ToolHandler {
    pub fn new(orchestrator: Arc<Orchestrator>, jobs: JobsConfig, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            jobs,
            shutdown,
            inflight: RwLock::new(HashMap::new()),
        }
    }

    /// Number of collect invocations currently in flight
    pub async fn inflight_count(&self) -> usize {
        self.inflight.read().await.len()
    }

    /// Handle one request to completion
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        tracing::debug!(id = request.id, tool = %request.tool, "dispatching tool request");
        match request.tool.as_str() {
            "collect" => self.collect(request).await,
            "cancel" => self.cancel(&request).await,
            "loot.list" => self.loot_list(&request),
            "tools.list" => {
                ToolResponse::success(request.id, json!({ "tools": tools::catalog() }))
            }
            "ping" => ToolResponse::success(request.id, json!({ "pong": true })),
            other => ToolResponse::error(request.id, ToolError::unknown_tool(other)),
        }
    }

    async fn collect(&self, request: ToolRequest) -> ToolResponse {
        let id = request.id;
        let invocation = ToolInvocation::new(id, &request.tool, request.args);

        let spec = match invocation.targets_spec() {
            Ok(spec) => spec,
            Err(e) => return ToolResponse::error(id, ToolError::invalid_params(e.to_string())),
        };
        let options = match invocation.collect_options(&self.jobs) {
            Ok(options) => options,
            Err(e) => return ToolResponse::error(id, ToolError::invalid_params(e.to_string())),
        };
        let targets = match resolver::resolve(&spec, self.jobs.max_targets) {
            Ok(targets) => targets,
            Err(e) => return ToolResponse::error(id, ToolError::from_domain(&e)),
        };

        let cancel = self.shutdown.child_token();
        {
            let mut inflight = self.inflight.write().await;
            if inflight.contains_key(&id) {
                return ToolResponse::error(
                    id,
                    ToolError::invalid_request(format!("request id {} is already in flight", id)),
                );
            }
            inflight.insert(id, cancel.clone());
        }

        let invocation_id = generate_invocation_id();
        let outcome = self
            .orchestrator
            .run(&invocation_id, targets, options, cancel)
            .await;

        self.inflight.write().await.remove(&id);

        match outcome {
            Ok(aggregate) => match serde_json::to_value(&aggregate) {
                Ok(value) => ToolResponse::success(id, value),
                Err(e) => ToolResponse::error(id, ToolError::internal_error(e.to_string())),
            },
            Err(e) => ToolResponse::error(id, ToolError::from_domain(&e)),
        }
    }

    async fn cancel(&self, request: &ToolRequest) -> ToolResponse {
        let target_id = match request.args.get("requestId").and_then(Value::as_u64) {
            Some(target_id) => target_id,
            None => {
                return ToolResponse::error(
                    request.id,
                    ToolError::invalid_params("missing or invalid 'requestId'"),
                );
            }
        };

        let token = self.inflight.read().await.get(&target_id).cloned();
        match token {
            Some(token) => {
                tracing::info!(request_id = target_id, "cancelling invocation");
                token.cancel();
                ToolResponse::success(
                    request.id,
                    json!({ "cancelled": true, "requestId": target_id }),
                )
            }
            None => ToolResponse::error(request.id, ToolError::unknown_request(target_id)),
        }
    }

    fn loot_list(&self, request: &ToolRequest) -> ToolResponse {
        let store = self.orchestrator.store();
        match request.args.get("target").and_then(Value::as_str) {
            Some(spec) => {
                let target = match Target::parse(spec) {
                    Ok(target) => target,
                    Err(e) => return ToolResponse::error(request.id, ToolError::from_domain(&e)),
                };
                match store.records_for(&target) {
                    Ok(records) => ToolResponse::success(
                        request.id,
                        json!({
                            "target": target,
                            "count": records.len(),
                            "records": records,
                        }),
                    ),
                    Err(e) => ToolResponse::error(request.id, ToolError::from_domain(&e)),
                }
            }
            None => match store.targets() {
                Ok(listing) => {
                    let targets: Vec<Value> = listing
                        .into_iter()
                        .map(|(target, count)| json!({ "target": target, "lootCount": count }))
                        .collect();
                    ToolResponse::success(request.id, json!({ "targets": targets }))
                }
                Err(e) => ToolResponse::error(request.id, ToolError::from_domain(&e)),
            },
        }
    }
}
