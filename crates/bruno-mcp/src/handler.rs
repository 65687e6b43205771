//! Tool Handler
//!
//! Handles `tools/call` by routing to the workspace registry and the
//! collection inspector, and maps their errors onto JSON-RPC codes.

use std::path::PathBuf;
use std::sync::Arc;

use bruno_core::{
    CollectionInspector, CreateCollectionOptions, InspectError, Workspace, WorkspaceError,
    WorkspaceRegistry,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::HandlerResult;
use crate::protocol::RpcError;
use crate::tools;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterArgs {
    name: String,
    path: String,
    #[serde(default)]
    create_if_missing: bool,
}

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceArgs {
    workspace: String,
}

#[derive(Debug, Deserialize)]
struct RequestsArgs {
    workspace: String,
    collection: String,
}

#[derive(Debug, Deserialize)]
struct CreateCollectionArgs {
    workspace: String,
    name: String,
    #[serde(default)]
    overwrite: bool,
    #[serde(default)]
    ignore: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WorkspaceList {
    workspaces: Vec<Workspace>,
}

/// Executes catalogued tools against the shared registry
pub struct ToolHandler {
    registry: Arc<WorkspaceRegistry>,
    inspector: Arc<dyn CollectionInspector>,
}

impl ToolHandler {
    pub fn new(registry: Arc<WorkspaceRegistry>, inspector: Arc<dyn CollectionInspector>) -> Self {
        Self {
            registry,
            inspector,
        }
    }

    /// Handle a tool call
    pub fn call(
        &self,
        ctx: &CancellationToken,
        name: &str,
        arguments: Map<String, Value>,
    ) -> HandlerResult {
        if ctx.is_cancelled() {
            return Err(RpcError::internal("Request cancelled").with_data("tool", name));
        }

        info!("Calling tool: {}", name);

        match name {
            tools::WORKSPACE_REGISTER => {
                let args: RegisterArgs = parse_args(name, arguments)?;
                let workspace = self
                    .registry
                    .register(&args.name, &args.path, args.create_if_missing)
                    .map_err(workspace_error)?;
                to_result(workspace)
            }
            tools::WORKSPACE_GET => {
                let args: NameArgs = parse_args(name, arguments)?;
                let workspace = self.registry.get(&args.name).map_err(workspace_error)?;
                to_result(workspace)
            }
            tools::WORKSPACE_LIST => to_result(WorkspaceList {
                workspaces: self.registry.list(),
            }),
            tools::COLLECTIONS_LIST => {
                let args: WorkspaceArgs = parse_args(name, arguments)?;
                let dir = self.resolve(&args.workspace)?;
                let collections = self
                    .inspector
                    .list_collections(&dir)
                    .map_err(|e| inspect_error(e, &args.workspace))?;
                Ok(json!({
                    "workspace": args.workspace,
                    "collections": collections,
                }))
            }
            tools::COLLECTIONS_CREATE => {
                let args: CreateCollectionArgs = parse_args(name, arguments)?;
                let dir = self.resolve(&args.workspace)?;
                let options = CreateCollectionOptions {
                    overwrite: args.overwrite,
                    ignore: args.ignore,
                };
                let path = self
                    .inspector
                    .create_collection(&dir, &args.name, &options)
                    .map_err(|e| inspect_error(e, &args.workspace))?;
                Ok(json!({
                    "workspace": args.workspace,
                    "collection": args.name.trim(),
                    "path": path,
                }))
            }
            tools::REQUESTS_LIST => {
                let args: RequestsArgs = parse_args(name, arguments)?;
                let dir = self.resolve(&args.workspace)?;
                let requests = self
                    .inspector
                    .list_requests(&dir, &args.collection)
                    .map_err(|e| inspect_error(e, &args.workspace))?;
                Ok(json!({
                    "workspace": args.workspace,
                    "collection": args.collection,
                    "requests": requests,
                }))
            }
            _ => {
                warn!("Unknown tool: {}", name);
                Err(RpcError::method_not_found(format!("Unknown tool: {}", name))
                    .with_data("tool", name))
            }
        }
    }

    fn resolve(&self, workspace: &str) -> Result<PathBuf, RpcError> {
        self.registry.resolve(workspace).map_err(workspace_error)
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Map<String, Value>) -> Result<T, RpcError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| {
        RpcError::invalid_params(format!("Invalid arguments for {}: {}", tool, e))
            .with_data("tool", tool)
    })
}

fn to_result<T: Serialize>(value: T) -> HandlerResult {
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal(format!("Serialization error: {}", e)))
}

/// Invalid input and lookups map to invalid params, I/O to internal error
pub fn workspace_error(err: WorkspaceError) -> RpcError {
    let kind = match &err {
        WorkspaceError::InvalidName(_) => "invalid_name",
        WorkspaceError::InvalidPath(_) => "invalid_path",
        WorkspaceError::NotFound(_) => "not_found",
        WorkspaceError::AlreadyRegistered { .. } => "already_registered",
        WorkspaceError::Io { .. } => {
            return RpcError::internal(err.to_string()).with_data("kind", "io");
        }
    };
    RpcError::invalid_params(err.to_string()).with_data("kind", kind)
}

fn inspect_error(err: InspectError, workspace: &str) -> RpcError {
    let rpc = if err.is_invalid_input() {
        RpcError::invalid_params(err.to_string())
    } else {
        RpcError::internal(err.to_string())
    };
    rpc.with_data("workspace", workspace)
}
