//! Channel URI construction rules. Channel URIs are opaque strings
//! everywhere else in this crate; parsing/rewriting is kept to this one
//! file since the on-wire framing of the log transport itself is handled
//! entirely by the agent's collaborators.
//!
//! A channel string is a leading scheme/endpoint segment followed by zero
//! or more `|key=value` parameters, e.g. `"aeron:udp|endpoint=host:port"`.
//! Both functions below treat that leading segment as opaque and only
//! rewrite the parameter list after it.

use crate::agent::ChannelUri;
use crate::messages::LogSessionId;

const LOG_SUBSCRIPTION_TAG: &str = "cluster-log";

/// Builds the subscription URI a follower uses to replay the new leader's
/// log: strip any `control` parameter from the base channel, set control
/// mode to manual, set `session-id` to the given session, and tag the
/// subscription with the cluster log-subscription tag constant.
pub fn follower_subscription_channel(base_log_channel: &str, session_id: LogSessionId) -> ChannelUri {
    let scheme = base_log_channel.split('|').next().unwrap_or("").to_string();

    let mut params: Vec<(String, String)> = base_log_channel
        .split('|')
        .skip(1)
        .filter_map(|param| {
            let mut parts = param.splitn(2, '=');
            let key = parts.next()?.to_string();
            let value = parts.next().unwrap_or("").to_string();
            if key == "control" {
                None
            } else {
                Some((key, value))
            }
        })
        .collect();

    params.retain(|(k, _)| k != "control-mode" && k != "session-id" && k != "tags");
    params.push(("control-mode".to_string(), "manual".to_string()));
    params.push(("session-id".to_string(), session_id.to_string()));
    params.push(("tags".to_string(), LOG_SUBSCRIPTION_TAG.to_string()));

    let mut uri = scheme;
    for (k, v) in params {
        uri.push('|');
        uri.push_str(&k);
        uri.push('=');
        uri.push_str(&v);
    }

    ChannelUri(uri)
}

/// Builds the URI used to add the live log destination on this member:
/// the base channel with `endpoint` set to this member's own log
/// endpoint.
pub fn live_destination_channel(base_log_channel: &str, member_endpoint: &str) -> ChannelUri {
    let scheme = base_log_channel.split('|').next().unwrap_or("").to_string();

    let mut params: Vec<(String, String)> = base_log_channel
        .split('|')
        .skip(1)
        .filter_map(|param| {
            let mut parts = param.splitn(2, '=');
            let key = parts.next()?.to_string();
            let value = parts.next().unwrap_or("").to_string();
            Some((key, value))
        })
        .collect();

    params.retain(|(k, _)| k != "endpoint");
    params.push(("endpoint".to_string(), member_endpoint.to_string()));

    let mut uri = scheme;
    for (k, v) in params {
        uri.push('|');
        uri.push_str(&k);
        uri.push('=');
        uri.push_str(&v);
    }

    ChannelUri(uri)
}
