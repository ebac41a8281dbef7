//! Two-tier selector / rule matching.
//!
//! Selectors give the coarse match for a plugin, rules refine within the
//! chosen selector. Both evaluate ordered condition lists against the request
//! with a data-driven combination mode (`and` / `or`). Candidate lists are
//! expected pre-sorted by `sort` ascending (the caches keep them that way);
//! the first match wins, which makes the tie-break deterministic: lower
//! `sort` first, then push order.
use crate::{
    config::models::{Condition, MatchMode, Operator, ParamType, RuleData, SelectorData, SelectorType},
    core::context::RequestInfo,
    utils::path_match,
};

fn actual_value(request: &RequestInfo, condition: &Condition) -> Option<String> {
    match condition.param_type {
        ParamType::Uri => Some(request.path.clone()),
        ParamType::Host => Some(request.host.clone()),
        ParamType::Ip => request.remote_ip.map(|ip| ip.to_string()),
        ParamType::Header => request.header(&condition.param_name).map(str::to_string),
        ParamType::Query => request
            .query_param(&condition.param_name)
            .map(str::to_string),
    }
}

/// Evaluate a single condition. Operators outside the supported set never
/// match; they cannot arrive via deserialization but the set is closed here
/// regardless.
pub fn judge(condition: &Condition, request: &RequestInfo) -> bool {
    let Some(actual) = actual_value(request, condition) else {
        return false;
    };
    match condition.operator {
        Operator::Match => path_match::matches(&condition.param_value, &actual),
        Operator::Eq => actual == condition.param_value,
        Operator::Regex => match regex::Regex::new(&condition.param_value) {
            Ok(re) => re.is_match(&actual),
            Err(err) => {
                tracing::warn!(pattern = %condition.param_value, %err, "invalid regex condition");
                false
            }
        },
        Operator::Like => actual.contains(&condition.param_value),
        Operator::Gt | Operator::Lt => false,
    }
}

/// Combine a condition list under the given mode. An empty list never
/// matches: a custom matcher without conditions is a configuration mistake,
/// not a catch-all.
pub fn conditions_match(conditions: &[Condition], mode: MatchMode, request: &RequestInfo) -> bool {
    if conditions.is_empty() {
        return false;
    }
    match mode {
        MatchMode::And => conditions.iter().all(|c| judge(c, request)),
        MatchMode::Or => conditions.iter().any(|c| judge(c, request)),
    }
}

/// First enabled selector claiming the request. `Full` selectors claim all
/// traffic routed to their plugin.
pub fn match_selector<'a>(
    selectors: &'a [SelectorData],
    request: &RequestInfo,
) -> Option<&'a SelectorData> {
    selectors
        .iter()
        .filter(|s| s.enabled)
        .find(|s| match s.selector_type {
            SelectorType::Full => true,
            SelectorType::Custom => conditions_match(&s.conditions, s.match_mode, request),
        })
}

/// First enabled rule within the chosen selector that matches the request.
pub fn match_rule<'a>(rules: &'a [RuleData], request: &RequestInfo) -> Option<&'a RuleData> {
    rules
        .iter()
        .filter(|r| r.enabled)
        .find(|r| conditions_match(&r.conditions, r.match_mode, request))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use http::{HeaderMap, HeaderValue, Method};

    use super::*;

    fn request(path: &str) -> RequestInfo {
        let mut headers = HeaderMap::new();
        headers.insert("x-app", HeaderValue::from_static("order-service"));
        let mut query = HashMap::new();
        query.insert("version".to_string(), "2".to_string());
        RequestInfo {
            method: Method::GET,
            path: path.to_string(),
            host: "gateway.local".to_string(),
            headers,
            query,
            remote_ip: Some("10.0.0.7".parse().unwrap()),
            body: None,
        }
    }

    fn condition(operator: Operator, param_type: ParamType, name: &str, value: &str) -> Condition {
        Condition {
            operator,
            param_type,
            param_name: name.to_string(),
            param_value: value.to_string(),
        }
    }

    fn selector(id: &str, sort: i32, conditions: Vec<Condition>) -> SelectorData {
        SelectorData {
            id: id.to_string(),
            plugin_id: "5".to_string(),
            plugin_name: "divide".to_string(),
            name: id.to_string(),
            match_mode: MatchMode::And,
            selector_type: SelectorType::Custom,
            sort,
            enabled: true,
            handle: String::new(),
            conditions,
        }
    }

    fn rule(id: &str, sort: i32, conditions: Vec<Condition>) -> RuleData {
        RuleData {
            id: id.to_string(),
            selector_id: "s1".to_string(),
            plugin_name: "divide".to_string(),
            name: id.to_string(),
            match_mode: MatchMode::And,
            sort,
            enabled: true,
            handle: String::new(),
            conditions,
        }
    }

    #[test]
    fn judge_covers_every_supported_operator() {
        let req = request("/http/order/detail");
        assert!(judge(
            &condition(Operator::Match, ParamType::Uri, "", "/http/**"),
            &req
        ));
        assert!(judge(
            &condition(Operator::Eq, ParamType::Header, "x-app", "order-service"),
            &req
        ));
        assert!(judge(
            &condition(Operator::Regex, ParamType::Query, "version", "^\\d$"),
            &req
        ));
        assert!(judge(
            &condition(Operator::Like, ParamType::Uri, "", "order"),
            &req
        ));
        assert!(judge(
            &condition(Operator::Eq, ParamType::Ip, "", "10.0.0.7"),
            &req
        ));
    }

    #[test]
    fn disabled_operators_never_match() {
        let req = request("/http/order");
        assert!(!judge(&condition(Operator::Gt, ParamType::Uri, "", "/a"), &req));
        assert!(!judge(&condition(Operator::Lt, ParamType::Uri, "", "/z"), &req));
    }

    #[test]
    fn invalid_regex_is_a_non_match_not_a_fault() {
        let req = request("/http/order");
        assert!(!judge(
            &condition(Operator::Regex, ParamType::Uri, "", "([unclosed"),
            &req
        ));
    }

    #[test]
    fn and_requires_all_conditions_or_requires_any() {
        let req = request("/http/order");
        let hit = condition(Operator::Match, ParamType::Uri, "", "/http/**");
        let miss = condition(Operator::Eq, ParamType::Host, "", "other.host");

        assert!(!conditions_match(
            &[hit.clone(), miss.clone()],
            MatchMode::And,
            &req
        ));
        assert!(conditions_match(&[hit, miss], MatchMode::Or, &req));
    }

    #[test]
    fn empty_condition_list_never_matches() {
        let req = request("/http/order");
        assert!(!conditions_match(&[], MatchMode::And, &req));
        assert!(!conditions_match(&[], MatchMode::Or, &req));
    }

    #[test]
    fn full_selector_claims_everything() {
        let mut s = selector("s-full", 10, vec![]);
        s.selector_type = SelectorType::Full;
        let req = request("/anything");
        assert_eq!(match_selector(&[s], &req).map(|s| s.id.as_str()), Some("s-full"));
    }

    #[test]
    fn disabled_selector_is_ignored() {
        let mut s = selector(
            "s1",
            10,
            vec![condition(Operator::Match, ParamType::Uri, "", "/http/**")],
        );
        s.enabled = false;
        assert!(match_selector(&[s], &request("/http/order")).is_none());
    }

    #[test]
    fn first_matching_rule_wins_in_sort_order() {
        // Both rules match; the list is pre-sorted by `sort` ascending, so
        // the lower sort value is the deterministic winner.
        let broad = rule(
            "r-broad",
            20,
            vec![condition(Operator::Match, ParamType::Uri, "", "/http/**")],
        );
        let narrow = rule(
            "r-narrow",
            10,
            vec![condition(Operator::Match, ParamType::Uri, "", "/http/order")],
        );
        let rules = [narrow, broad];
        let chosen = match_rule(&rules, &request("/http/order")).unwrap();
        assert_eq!(chosen.id, "r-narrow");
    }

    #[test]
    fn equal_sort_keeps_declaration_order() {
        let first = rule(
            "r-first",
            10,
            vec![condition(Operator::Match, ParamType::Uri, "", "/http/**")],
        );
        let second = rule(
            "r-second",
            10,
            vec![condition(Operator::Match, ParamType::Uri, "", "/http/**")],
        );
        let rules = [first, second];
        let chosen = match_rule(&rules, &request("/http/order")).unwrap();
        assert_eq!(chosen.id, "r-first");
    }

    #[test]
    fn no_rule_match_yields_none() {
        let r = rule(
            "r1",
            10,
            vec![condition(Operator::Eq, ParamType::Uri, "", "/other")],
        );
        assert!(match_rule(&[r], &request("/http/order")).is_none());
    }
}
