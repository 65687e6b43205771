//! Method registry and dispatcher
//!
//! The registry is filled once at startup and then frozen into a
//! [`Dispatcher`]; nothing is added or removed while serving.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::protocol::{Request, RpcError};

/// What a handler produces: a result payload or an error object
pub type HandlerResult = Result<Value, RpcError>;

/// Implementation of one RPC method
pub type Handler = Arc<dyn Fn(&CancellationToken, &Request) -> HandlerResult + Send + Sync>;

/// Method name to handler table, built before serving starts
#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Handler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing any earlier registration
    pub fn register<F>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&CancellationToken, &Request) -> HandlerResult + Send + Sync + 'static,
    {
        let method = method.into();
        if self.handlers.contains_key(&method) {
            warn!("Replacing handler for method: {}", method);
        }
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

/// Routes requests to their handlers
pub struct Dispatcher {
    methods: MethodRegistry,
}

impl Dispatcher {
    pub fn new(methods: MethodRegistry) -> Self {
        Self { methods }
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Run the handler for `request.method`.
    ///
    /// A panicking handler does not take the process down: the panic is
    /// logged and the call fails with an internal error.
    pub fn dispatch(&self, ctx: &CancellationToken, request: &Request) -> HandlerResult {
        let Some(handler) = self.methods.handlers.get(&request.method) else {
            warn!("Unknown method: {}", request.method);
            return Err(
                RpcError::method_not_found(format!("Method not found: {}", request.method))
                    .with_data("method", request.method.as_str()),
            );
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, request))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(method = %request.method, "Handler panicked: {}", message);
                Err(RpcError::internal("Internal error: handler panicked")
                    .with_data("method", request.method.as_str()))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{INTERNAL_ERROR, METHOD_NOT_FOUND};
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let mut methods = MethodRegistry::new();
        methods
            .register("echo", |_ctx, req| Ok(req.params.clone().unwrap_or(Value::Null)))
            .register("fail", |_ctx, _req| Err(RpcError::invalid_params("bad")))
            .register("boom", |_ctx, _req| panic!("handler exploded"))
            .register("cancelled", |ctx, _req| Ok(json!(ctx.is_cancelled())));
        Dispatcher::new(methods)
    }

    fn request(method: &str, params: Option<Value>) -> Request {
        Request::new(Some(json!(1)), method, params)
    }

    #[test]
    fn test_method_not_found() {
        let err = dispatcher()
            .dispatch(&CancellationToken::new(), &request("nope", None))
            .unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_result_and_error_pass_through() {
        let d = dispatcher();
        let ctx = CancellationToken::new();
        assert_eq!(
            d.dispatch(&ctx, &request("echo", Some(json!({"a": 1})))).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(d.dispatch(&ctx, &request("fail", None)).unwrap_err().message, "bad");
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let d = dispatcher();
        let err = d
            .dispatch(&CancellationToken::new(), &request("boom", None))
            .unwrap_err();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["method"], json!("boom"));

        // Still usable afterwards
        assert!(d
            .dispatch(&CancellationToken::new(), &request("echo", None))
            .is_ok());
    }

    #[test]
    fn test_context_reaches_handler() {
        let d = dispatcher();
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(d.dispatch(&ctx, &request("cancelled", None)).unwrap(), json!(true));
    }

    #[test]
    fn test_registry_methods_sorted() {
        let d = dispatcher();
        assert_eq!(d.methods().methods(), vec!["boom", "cancelled", "echo", "fail"]);
    }
}
