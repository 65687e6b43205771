//! Envelope codec
//!
//! Decoding is two-phase: the line is parsed into a generic JSON value, the
//! four envelope fields are pulled out untouched, then validated in a fixed
//! order. Pulling `id` out first means a response can still echo it when a
//! later field is bad.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::{is_notification_id, Request, Response, RpcError, JSONRPC_VERSION};

/// A request that failed validation, with whatever id could be recovered
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub id: Option<Value>,
    pub error: RpcError,
}

impl DecodeError {
    fn new(id: Option<Value>, error: RpcError) -> Self {
        Self { id, error }
    }

    /// True when no id (or a `null` id) was recovered
    pub fn is_notification(&self) -> bool {
        is_notification_id(self.id.as_ref())
    }

    /// The error response to send, unless the request was a notification
    pub fn into_response(self) -> Option<Response> {
        match self.id {
            Some(id) if !id.is_null() => Some(Response::error(id, self.error)),
            _ => None,
        }
    }
}

/// Parse and validate one request line
pub fn decode(line: &[u8]) -> Result<Request, DecodeError> {
    let value: Value = serde_json::from_slice(line)
        .map_err(|e| DecodeError::new(None, RpcError::parse_error(format!("Parse error: {}", e))))?;

    let Value::Object(mut fields) = value else {
        return Err(DecodeError::new(
            None,
            RpcError::invalid_request("Invalid Request: request must be a JSON object"),
        ));
    };

    let id = fields.remove("id");
    let jsonrpc = fields.remove("jsonrpc");
    let method = fields.remove("method");
    let params = fields.remove("params");

    match jsonrpc {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        _ => {
            return Err(DecodeError::new(
                id,
                RpcError::invalid_request("Invalid Request: jsonrpc must be \"2.0\""),
            ));
        }
    }

    let method = match method {
        Some(Value::String(method)) if !method.is_empty() => method,
        None => {
            return Err(DecodeError::new(
                id,
                RpcError::invalid_request("Invalid Request: missing method"),
            ));
        }
        Some(_) => {
            return Err(DecodeError::new(
                id,
                RpcError::invalid_request("Invalid Request: method must be a non-empty string"),
            ));
        }
    };

    Ok(Request {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        method,
        params,
    })
}

/// Serialize a response as one compact line with a trailing newline
pub fn encode(response: &Response) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode params into `T`; absent params are an error
pub fn decode_params<T: DeserializeOwned>(request: &Request) -> Result<T, RpcError> {
    let params = request
        .params
        .as_ref()
        .ok_or_else(|| RpcError::invalid_params("Invalid params: missing params"))?;
    convert(params)
}

/// Decode params into `T`; absent (or `null`) params give `T::default()`
pub fn decode_params_optional<T: DeserializeOwned + Default>(
    request: &Request,
) -> Result<T, RpcError> {
    match &request.params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(params) => convert(params),
    }
}

fn convert<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    T::deserialize(params)
        .map_err(|e| RpcError::invalid_params(format!("Invalid params: malformed params: {}", e)))
}
