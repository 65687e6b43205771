//! MCP Server
//!
//! Wires the core MCP methods into a dispatcher and serves them over stdio
//! (or any pair of async streams) using JSON-RPC 2.0.

use std::sync::Arc;

use bruno_core::{CollectionInspector, Config, FsInspector, WorkspaceRegistry};
use serde_json::{json, Map};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::codec::{decode_params, decode_params_optional};
use crate::dispatch::{Dispatcher, HandlerResult, MethodRegistry};
use crate::handler::ToolHandler;
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, ListToolsResult, Request, RpcError,
    ServerCapabilities, ServerInfo, ToolsCapability, MCP_PROTOCOL_VERSION,
};
use crate::tools::all_tools;
use crate::transport::{self, TransportConfig, TransportError};

pub const SERVER_NAME: &str = "bruno-mcp";

/// MCP server over newline-delimited JSON-RPC
pub struct Server {
    dispatcher: Dispatcher,
    transport: TransportConfig,
}

impl Server {
    pub fn new(
        config: &Config,
        registry: Arc<WorkspaceRegistry>,
        inspector: Arc<dyn CollectionInspector>,
    ) -> Self {
        let tools = Arc::new(ToolHandler::new(registry, inspector));
        let mut methods = MethodRegistry::new();
        register_core_methods(&mut methods, tools);

        Self {
            dispatcher: Dispatcher::new(methods),
            transport: TransportConfig::from(config),
        }
    }

    /// Server with an empty registry and the filesystem inspector
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(WorkspaceRegistry::new()),
            Arc::new(FsInspector::from_config(config)),
        )
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve until `reader` reaches end of input
    pub async fn serve<R, W>(
        &self,
        ctx: &CancellationToken,
        reader: R,
        writer: W,
    ) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        transport::serve(&self.dispatcher, ctx, self.transport, reader, writer).await
    }

    /// Serve on the process's stdin and stdout
    pub async fn serve_stdio(&self, ctx: &CancellationToken) -> Result<(), TransportError> {
        self.serve(ctx, tokio::io::stdin(), tokio::io::stdout()).await
    }
}

/// Register `initialize`, `tools/list`, `tools/call`, `ping` and the
/// `notifications/initialized` notification
pub fn register_core_methods(methods: &mut MethodRegistry, tools: Arc<ToolHandler>) {
    methods
        .register("initialize", |_ctx, req| handle_initialize(req))
        .register("tools/list", |_ctx, _req| handle_list_tools())
        .register("tools/call", move |ctx, req| handle_call_tool(&tools, ctx, req))
        .register("ping", |_ctx, _req| Ok(json!({})))
        .register("notifications/initialized", |_ctx, _req| {
            info!("Client initialized");
            Ok(json!({}))
        });
}

fn handle_initialize(request: &Request) -> HandlerResult {
    let params: InitializeParams = decode_params_optional(request)?;
    let client = params
        .client_info
        .as_ref()
        .and_then(|info| info.get("name"))
        .and_then(|name| name.as_str())
        .unwrap_or("unknown");
    let requested = params.protocol_version.as_deref().unwrap_or("unspecified");
    info!(
        client = %client,
        requested_protocol = %requested,
        "Initializing MCP server"
    );

    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list: true,
                call: true,
            },
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    serde_json::to_value(result)
        .map_err(|e| RpcError::internal(format!("Serialization error: {}", e)))
}

fn handle_list_tools() -> HandlerResult {
    serde_json::to_value(ListToolsResult { tools: all_tools() })
        .map_err(|e| RpcError::internal(format!("Serialization error: {}", e)))
}

fn handle_call_tool(tools: &ToolHandler, ctx: &CancellationToken, request: &Request) -> HandlerResult {
    let params: CallToolParams = decode_params(request)?;
    let Some(name) = params.tool_name() else {
        return Err(RpcError::invalid_params("Invalid params: tool name is required"));
    };
    tools.call(ctx, name, params.arguments.clone().unwrap_or_else(Map::new))
}
