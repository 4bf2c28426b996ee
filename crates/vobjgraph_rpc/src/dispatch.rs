//! Async dispatch of store calls with a per-call deadline.
//!
//! # Invariants
//! - Every call resolves; a call that outlives its deadline resolves to a
//!   timed-out response and is never retried.
//! - A timed-out store operation may still finish on the blocking pool;
//!   its result is dropped.

use crate::config::RpcConfig;
use crate::error::{RpcError, RpcResult};
use crate::handle::StoreHandle;
use crate::protocol::{RpcEnvelope, RpcRequest, RpcResponse};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};
use vobjgraph_core::Record;

/// Routes envelopes to the store.
#[derive(Clone)]
pub struct RpcDispatcher {
    handle: StoreHandle,
    config: RpcConfig,
}

impl RpcDispatcher {
    pub fn new(handle: StoreHandle, config: RpcConfig) -> Self {
        Self { handle, config }
    }

    /// Opens the store at `config.db_path`.
    pub fn open(config: RpcConfig) -> RpcResult<Self> {
        let handle = StoreHandle::open(&config.db_path)?;
        Ok(Self::new(handle, config))
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Executes one call under the configured deadline.
    pub async fn call(&self, envelope: RpcEnvelope) -> RpcResponse {
        let method = envelope.request.method();
        run_with_deadline(
            &envelope.correlation_id,
            method,
            self.config.timeout,
            self.execute(envelope.request),
        )
        .await
    }

    /// Decodes a JSON envelope, executes it and encodes the response.
    pub async fn call_json(&self, raw: &str) -> String {
        let response = match RpcEnvelope::decode(raw) {
            Ok(envelope) => self.call(envelope).await,
            Err((correlation_id, err)) => {
                warn!(
                    "event=rpc_call module=rpc status=error correlation_id={} error_code={}",
                    correlation_id,
                    err.code()
                );
                RpcResponse::failure(correlation_id, &err)
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|err| {
            json!({
                "correlation_id": response.correlation_id,
                "ok": false,
                "result": null,
                "error": { "code": "encode", "message": err.to_string() },
                "timed_out": false,
            })
            .to_string()
        })
    }

    async fn execute(&self, request: RpcRequest) -> RpcResult<Value> {
        let max_nodes = self.config.max_nodes;
        match request {
            RpcRequest::CreateRealObject { name, record } => {
                let record = record.map(Record::new).unwrap_or_default();
                let real_id = self
                    .handle
                    .run(move |service| service.create(name, record))
                    .await?;
                Ok(json!({ "real_id": real_id }))
            }
            RpcRequest::LoadRealObject { real_id } => {
                let object = self.handle.run(move |service| service.load(real_id)).await?;
                to_json(&object)
            }
            RpcRequest::SaveRealObject { real_id, object } => {
                self.handle
                    .run(move |service| service.save(real_id, &object))
                    .await?;
                Ok(Value::Null)
            }
            RpcRequest::CopyVirtualObject { real_id } => {
                let ref_count = self
                    .handle
                    .run(move |service| service.link_to(real_id))
                    .await?;
                Ok(json!({ "real_id": real_id, "ref_count": ref_count }))
            }
            RpcRequest::CopyRealObject {
                real_id,
                max_nodes: requested,
            } => {
                let budget = requested.unwrap_or(max_nodes);
                let outcome = self
                    .handle
                    .run(move |service| service.clone_deep(real_id, budget))
                    .await?;
                to_json(&outcome)
            }
            RpcRequest::DeleteVirtualObject { real_id } => {
                let ref_count = self
                    .handle
                    .run(move |service| service.unlink_from(real_id))
                    .await?;
                Ok(json!({ "real_id": real_id, "ref_count": ref_count }))
            }
            RpcRequest::GetUnreferencedRealObjects => {
                let ids = self
                    .handle
                    .run(|service| service.list_unreferenced())
                    .await?;
                to_json(&ids)
            }
            RpcRequest::PhysicalDeleteRealObject { real_id } => {
                self.handle
                    .run(move |service| service.physical_delete(real_id))
                    .await?;
                Ok(Value::Null)
            }
            RpcRequest::RescanFilesystem => {
                let report = self.handle.run(|service| service.reconcile()).await?;
                to_json(&report)
            }
            RpcRequest::BuildReferenceGraph {
                real_id,
                max_nodes: requested,
            } => {
                let budget = requested.unwrap_or(max_nodes);
                let graph = self
                    .handle
                    .run(move |service| service.build_reference_graph(real_id, budget))
                    .await?;
                to_json(&graph)
            }
        }
    }
}

/// Races `operation` against `deadline` and folds the outcome into a
/// response.
pub async fn run_with_deadline<F>(
    correlation_id: &str,
    method: &str,
    deadline: Duration,
    operation: F,
) -> RpcResponse
where
    F: Future<Output = RpcResult<Value>>,
{
    let started_at = Instant::now();
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(result)) => {
            info!(
                "event=rpc_call module=rpc status=ok method={} correlation_id={} duration_ms={}",
                method,
                correlation_id,
                started_at.elapsed().as_millis()
            );
            RpcResponse::success(correlation_id, result)
        }
        Ok(Err(err)) => {
            warn!(
                "event=rpc_call module=rpc status=error method={} correlation_id={} error_code={} error={}",
                method,
                correlation_id,
                err.code(),
                err
            );
            RpcResponse::failure(correlation_id, &err)
        }
        Err(_) => {
            warn!(
                "event=rpc_call module=rpc status=timeout method={} correlation_id={} timeout_ms={}",
                method,
                correlation_id,
                deadline.as_millis()
            );
            RpcResponse::timed_out(correlation_id)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> RpcResult<Value> {
    serde_json::to_value(value).map_err(RpcError::from)
}
