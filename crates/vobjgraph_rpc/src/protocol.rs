//! Wire shapes for store calls.
//!
//! A request is `{"correlation_id": "...", "request": {"method": "...",
//! "params": {...}}}`; method names are kebab-case.

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vobjgraph_core::{RealId, RealObject};

/// One store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "kebab-case")]
pub enum RpcRequest {
    CreateRealObject {
        name: String,
        /// Initial record content; an empty document when absent.
        #[serde(default)]
        record: Option<String>,
    },
    LoadRealObject {
        real_id: RealId,
    },
    SaveRealObject {
        real_id: RealId,
        object: RealObject,
    },
    /// A link to `real_id` was pasted somewhere.
    CopyVirtualObject {
        real_id: RealId,
    },
    /// Deep clone.
    CopyRealObject {
        real_id: RealId,
        #[serde(default)]
        max_nodes: Option<usize>,
    },
    /// A link to `real_id` was removed.
    DeleteVirtualObject {
        real_id: RealId,
    },
    GetUnreferencedRealObjects,
    PhysicalDeleteRealObject {
        real_id: RealId,
    },
    /// Recount every `ref_count` from stored links.
    RescanFilesystem,
    BuildReferenceGraph {
        real_id: RealId,
        #[serde(default)]
        max_nodes: Option<usize>,
    },
}

impl RpcRequest {
    pub const METHODS: [&'static str; 10] = [
        "create-real-object",
        "load-real-object",
        "save-real-object",
        "copy-virtual-object",
        "copy-real-object",
        "delete-virtual-object",
        "get-unreferenced-real-objects",
        "physical-delete-real-object",
        "rescan-filesystem",
        "build-reference-graph",
    ];

    pub fn method(&self) -> &'static str {
        let index = match self {
            Self::CreateRealObject { .. } => 0,
            Self::LoadRealObject { .. } => 1,
            Self::SaveRealObject { .. } => 2,
            Self::CopyVirtualObject { .. } => 3,
            Self::CopyRealObject { .. } => 4,
            Self::DeleteVirtualObject { .. } => 5,
            Self::GetUnreferencedRealObjects => 6,
            Self::PhysicalDeleteRealObject { .. } => 7,
            Self::RescanFilesystem => 8,
            Self::BuildReferenceGraph { .. } => 9,
        };
        Self::METHODS[index]
    }
}

/// Request plus the caller's correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub correlation_id: String,
    pub request: RpcRequest,
}

impl RpcEnvelope {
    pub fn new(correlation_id: impl Into<String>, request: RpcRequest) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            request,
        }
    }

    /// Decodes an envelope, telling unknown methods apart from malformed
    /// parameters.
    ///
    /// On failure the correlation id is still returned when it could be
    /// read, so the caller can answer the right request.
    pub fn decode(raw: &str) -> Result<Self, (String, RpcError)> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| (String::new(), RpcError::from(err)))?;
        let correlation_id = value
            .get("correlation_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let method = value
            .get("request")
            .and_then(|request| request.get("method"))
            .and_then(Value::as_str);
        match method {
            Some(method) if !RpcRequest::METHODS.contains(&method) => {
                return Err((correlation_id, RpcError::UnknownMethod(method.to_string())));
            }
            None => {
                return Err((
                    correlation_id,
                    RpcError::BadPayload("missing `request.method`".to_string()),
                ));
            }
            Some(_) => {}
        }

        serde_json::from_value(value).map_err(|err| (correlation_id, RpcError::from(err)))
    }
}

/// Outcome of one call.
///
/// A timed-out call has `ok == false`, `timed_out == true` and a null
/// `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub correlation_id: String,
    pub ok: bool,
    pub result: Value,
    pub error: Option<RpcErrorBody>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: String,
    pub message: String,
}

impl RpcResponse {
    pub fn success(correlation_id: impl Into<String>, result: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ok: true,
            result,
            error: None,
            timed_out: false,
        }
    }

    pub fn failure(correlation_id: impl Into<String>, err: &RpcError) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ok: false,
            result: Value::Null,
            error: Some(RpcErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
            timed_out: false,
        }
    }

    pub fn timed_out(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ok: false,
            result: Value::Null,
            error: None,
            timed_out: true,
        }
    }
}
