//! Data model for control-plane pushed configuration.
//!
//! These types mirror the entities the admin plane publishes to every gateway
//! node: plugins, selectors, rules, RPC metadata and upstream descriptors.
//! They are intentionally serde-friendly and include defaults so that sparse
//! payloads remain valid. Gateway nodes treat all of them as read-only; the
//! only writer is the sync subscriber protocol.
use serde::{Deserialize, Serialize};

use crate::core::result::GatewayError;

/// Condition operator. `Gt` and `Lt` are representable (the admin plane knows
/// about them) but are outside the supported set, so alias resolution rejects
/// their tokens the same way it rejects arbitrary garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Match,
    Eq,
    Regex,
    Like,
    Gt,
    Lt,
}

impl Operator {
    /// The canonical wire alias for this operator.
    pub fn alias(&self) -> &'static str {
        match self {
            Operator::Match => "match",
            Operator::Eq => "=",
            Operator::Regex => "regEx",
            Operator::Like => "like",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    /// The operators a condition may currently use. `Gt`/`Lt` stay out until
    /// ordered comparison semantics land in the matching engine.
    pub fn supported() -> &'static [Operator] {
        &[Operator::Match, Operator::Eq, Operator::Regex, Operator::Like]
    }

    /// Case-insensitive alias lookup restricted to [`Operator::supported`].
    ///
    /// Tokens owned by a disabled operator (`">"`, `"<"`) fail exactly like
    /// unknown tokens.
    pub fn resolve_alias(token: &str) -> Result<Operator, GatewayError> {
        Operator::supported()
            .iter()
            .find(|op| op.alias().eq_ignore_ascii_case(token))
            .copied()
            .ok_or_else(|| GatewayError::UnsupportedOperator(token.to_string()))
    }
}

impl TryFrom<String> for Operator {
    type Error = GatewayError;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Operator::resolve_alias(&token)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.alias().to_string()
    }
}

impl Serialize for Operator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.alias())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Operator::resolve_alias(&token).map_err(serde::de::Error::custom)
    }
}

/// Where a condition reads its actual value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Uri,
    Query,
    Header,
    Host,
    Ip,
}

/// How a selector or rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    And,
    Or,
}

/// Full selectors claim every request routed to their plugin; custom
/// selectors are condition-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    Full,
    #[default]
    Custom,
}

/// One immutable match condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub operator: Operator,
    pub param_type: ParamType,
    #[serde(default)]
    pub param_name: String,
    #[serde(default)]
    pub param_value: String,
}

/// Coarse-grained route matcher owned by one plugin. The `handle` payload is
/// plugin-specific (e.g. a serialized upstream list for the divide plugin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorData {
    pub id: String,
    #[serde(default)]
    pub plugin_id: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default, rename = "type")]
    pub selector_type: SelectorType,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Fine-grained matcher inside one selector. Carries a plugin-and-rpc-type
/// specific `handle` (routing / timeout / limiter parameters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleData {
    pub id: String,
    #[serde(default)]
    pub selector_id: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Enables / disables one named chain plugin and supplies its runtime
/// configuration as an opaque JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub role: i64,
    #[serde(default)]
    pub enabled: bool,
}

/// Maps a matched route onto a non-HTTP RPC invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub context_path: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub rpc_type: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub method_name: String,
    #[serde(default)]
    pub parameter_types: String,
    #[serde(default)]
    pub rpc_ext: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Last observed health of one upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Unhealthy,
}

fn default_weight() -> i32 {
    50
}

/// One backend endpoint eligible to receive traffic for a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    pub url: String,
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default)]
    pub status: HealthStatus,
    /// Millisecond timestamp of the last control-plane update for this entry.
    #[serde(default)]
    pub timestamp: i64,
}

impl Upstream {
    pub fn healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Load balancing strategy selector carried inside rule handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoadBalanceKind {
    #[serde(rename = "roundRobin")]
    RoundRobin,
    #[serde(rename = "random")]
    #[default]
    Random,
    #[serde(rename = "hash")]
    Hash,
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Rule handle payload for HTTP load-balanced proxying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivideRuleHandle {
    #[serde(default)]
    pub load_balance: LoadBalanceKind,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(default)]
    pub retry: u32,
}

impl Default for DivideRuleHandle {
    fn default() -> Self {
        Self {
            load_balance: LoadBalanceKind::default(),
            timeout: default_timeout_ms(),
            retry: 0,
        }
    }
}

fn default_replenish_rate() -> u32 {
    1
}

fn default_burst_capacity() -> u32 {
    100
}

/// Rule handle payload for the rate limiter plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterHandle {
    #[serde(default = "default_replenish_rate")]
    pub replenish_rate: u32,
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,
}

impl Default for RateLimiterHandle {
    fn default() -> Self {
        Self {
            replenish_rate: default_replenish_rate(),
            burst_capacity: default_burst_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_operators_exclude_gt_lt() {
        let supported = Operator::supported();
        assert!(supported.contains(&Operator::Match));
        assert!(supported.contains(&Operator::Eq));
        assert!(supported.contains(&Operator::Regex));
        assert!(supported.contains(&Operator::Like));
        assert!(!supported.contains(&Operator::Gt));
        assert!(!supported.contains(&Operator::Lt));
    }

    #[test]
    fn resolve_alias_supported_tokens() {
        assert_eq!(Operator::resolve_alias("match").unwrap(), Operator::Match);
        assert_eq!(Operator::resolve_alias("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::resolve_alias("regEx").unwrap(), Operator::Regex);
        assert_eq!(Operator::resolve_alias("like").unwrap(), Operator::Like);
    }

    #[test]
    fn resolve_alias_is_case_insensitive() {
        assert_eq!(Operator::resolve_alias("REGEX").unwrap(), Operator::Regex);
        assert_eq!(Operator::resolve_alias("Match").unwrap(), Operator::Match);
    }

    #[test]
    fn resolve_alias_rejects_disabled_and_unknown_tokens() {
        for token in [">", "<", "nike"] {
            match Operator::resolve_alias(token) {
                Err(GatewayError::UnsupportedOperator(t)) => assert_eq!(t, token),
                other => panic!("expected UnsupportedOperator for {token:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn condition_round_trips_through_json() {
        let condition = Condition {
            operator: Operator::Regex,
            param_type: ParamType::Header,
            param_name: "x-tenant".to_string(),
            param_value: "^t-\\d+$".to_string(),
        };
        let json = serde_json::to_string(&condition).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, condition);
    }

    #[test]
    fn selector_defaults_are_sparse_friendly() {
        let selector: SelectorData =
            serde_json::from_str(r#"{"id":"s1","pluginName":"divide"}"#).unwrap();
        assert_eq!(selector.match_mode, MatchMode::And);
        assert_eq!(selector.selector_type, SelectorType::Custom);
        assert!(!selector.enabled);
        assert!(selector.conditions.is_empty());
    }

    #[test]
    fn upstream_defaults() {
        let upstream: Upstream = serde_json::from_str(r#"{"url":"127.0.0.1:8080"}"#).unwrap();
        assert_eq!(upstream.weight, 50);
        assert!(upstream.healthy());
    }

    #[test]
    fn divide_rule_handle_defaults() {
        let handle: DivideRuleHandle = serde_json::from_str("{}").unwrap();
        assert_eq!(handle.load_balance, LoadBalanceKind::Random);
        assert_eq!(handle.timeout, 3000);
        assert_eq!(handle.retry, 0);
    }
}
