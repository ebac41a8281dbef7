//! Gateway error kinds and their stable user-visible result codes.
//!
//! Matching and resource-exhaustion failures are expected business outcomes:
//! they terminate the chain and surface as a structured `{code, message}`
//! body. Everything uncategorized collapses into the generic fail code so
//! clients can always distinguish routing problems from transient service
//! failures.
use serde::Serialize;
use thiserror::Error;

/// Result codes shared with clients. Codes are stable; messages are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Fail,
    Success,
    TooManyRequests,
    MetaDataError,
    RpcBodyRequired,
    RuleNotFound,
    ServiceResultError,
    ServiceTimeout,
    CannotFindUrl,
    CannotFindSelector,
}

impl ResultCode {
    pub fn code(&self) -> i32 {
        match self {
            ResultCode::Fail => -1,
            ResultCode::Success => 200,
            ResultCode::TooManyRequests => 429,
            ResultCode::MetaDataError => 430,
            ResultCode::RpcBodyRequired => 431,
            ResultCode::RuleNotFound => -102,
            ResultCode::ServiceResultError => -103,
            ResultCode::ServiceTimeout => -104,
            ResultCode::CannotFindUrl => -106,
            ResultCode::CannotFindSelector => -107,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ResultCode::Fail => "Internal exception in gateway. Please try again later!",
            ResultCode::Success => "Access to success!",
            ResultCode::TooManyRequests => {
                "You have been restricted, please try again later!"
            }
            ResultCode::MetaDataError => "Meta data error!",
            ResultCode::RpcBodyRequired => {
                "The rpc method takes parameters, please supply a JSON body!"
            }
            ResultCode::RuleNotFound => "Rule not found!",
            ResultCode::ServiceResultError => {
                "Service invocation exception, or no result is returned!"
            }
            ResultCode::ServiceTimeout => "Service call timeout!",
            ResultCode::CannotFindUrl => "Can not find url, please check your configuration!",
            ResultCode::CannotFindSelector => {
                "Can not find selector, please check your configuration!"
            }
        }
    }

    /// HTTP status the structured body travels with.
    pub fn http_status(&self) -> u16 {
        match self {
            ResultCode::Success => 200,
            ResultCode::TooManyRequests => 429,
            ResultCode::ServiceTimeout => 504,
            ResultCode::CannotFindUrl | ResultCode::ServiceResultError => 502,
            _ => 500,
        }
    }
}

/// Structured terminal body written for both successes and failures.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResult<T: Serialize> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> GatewayResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: ResultCode::Success.code(),
            message: ResultCode::Success.message().to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: ResultCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }
}

/// Semantic error kinds produced by the routing core and plugins.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Alias resolution failed: the token belongs to no supported operator.
    #[error("unsupported operator alias: {0}")]
    UnsupportedOperator(String),

    /// No enabled selector of the given plugin matched the request.
    #[error("no matching selector for plugin {plugin}")]
    NoMatchingSelector { plugin: String },

    /// A selector matched but none of its enabled rules did.
    #[error("no matching rule within selector {selector_id} of plugin {plugin}")]
    NoMatchingRule { plugin: String, selector_id: String },

    /// The pool for this selector is empty or fully unhealthy.
    #[error("no available upstream for selector {selector_id}")]
    NoAvailableUpstream { selector_id: String },

    /// The terminal HTTP stage ran without anyone resolving a target url.
    #[error("no real url resolved for path {path}")]
    RealUrlNotFound { path: String },

    /// A pushed payload or plugin config blob failed to parse.
    #[error("malformed configuration: {0}")]
    MalformedConfig(String),

    /// The chosen upstream could not be invoked.
    #[error("upstream invocation failed: {0}")]
    UpstreamInvocationFailed(String),

    /// The downstream call exceeded its deadline.
    #[error("service call timed out after {timeout_ms}ms")]
    ServiceTimeout { timeout_ms: u64 },

    /// Required RPC metadata is missing or incomplete for this route.
    #[error("metadata error for path {path}")]
    MetaDataError { path: String },

    /// The RPC method takes parameters but the request carried no body.
    #[error("rpc invocation requires a body for service {service}")]
    RpcBodyRequired { service: String },

    /// Uncategorized plugin fault. The chain terminates without retry.
    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The stable result code this error surfaces as.
    pub fn result_code(&self) -> ResultCode {
        match self {
            GatewayError::NoMatchingSelector { .. } => ResultCode::CannotFindSelector,
            GatewayError::NoMatchingRule { .. } => ResultCode::RuleNotFound,
            GatewayError::NoAvailableUpstream { .. } | GatewayError::RealUrlNotFound { .. } => {
                ResultCode::CannotFindUrl
            }
            GatewayError::UpstreamInvocationFailed(_) => ResultCode::ServiceResultError,
            GatewayError::ServiceTimeout { .. } => ResultCode::ServiceTimeout,
            GatewayError::MetaDataError { .. } => ResultCode::MetaDataError,
            GatewayError::RpcBodyRequired { .. } => ResultCode::RpcBodyRequired,
            GatewayError::UnsupportedOperator(_)
            | GatewayError::MalformedConfig(_)
            | GatewayError::Internal(_) => ResultCode::Fail,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedConfig(err.to_string())
    }
}
