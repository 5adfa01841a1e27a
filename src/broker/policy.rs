//! Forwarding suppression
//!
//! By default a publication is forwarded to every peer broker whose area
//! intersects its geofence. A [`ForwardingPolicy`] may veto that for
//! publications that should stay local.

use std::fmt::Debug;

use crate::protocol::{ReasonCode, Topic};

/// What the engine knows about a publication when deciding whether to forward it.
#[derive(Debug, Clone, Copy)]
pub struct ForwardContext<'a> {
    pub publisher_id: &'a str,
    pub topic: &'a Topic,
    /// Outcome of local matching, `NoMatchingSubscribers` if none was attempted.
    pub local_result: ReasonCode,
}

pub trait ForwardingPolicy: Debug + Send + Sync {
    /// Returns true to keep the publication away from peer brokers.
    fn suppress_forward(&self, ctx: &ForwardContext<'_>) -> bool;
}

/// Pure geofence-intersection forwarding.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardAll;

impl ForwardingPolicy for ForwardAll {
    fn suppress_forward(&self, _ctx: &ForwardContext<'_>) -> bool {
        false
    }
}

/// Topic-suffix conventions of the function-call layer.
///
/// - A result published by a local service node (client id starting with
///   `service_prefix` but not `root_service_prefix`) is delivered locally only.
/// - A request that already found a local subscriber is not fanned out.
#[derive(Debug, Clone)]
pub struct SuffixPolicy {
    pub request_suffix: String,
    pub result_suffix: String,
    pub service_prefix: String,
    pub root_service_prefix: String,
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self {
            request_suffix: "call".to_string(),
            result_suffix: "result".to_string(),
            service_prefix: "GeoFaaS-".to_string(),
            root_service_prefix: "GeoFaaS-Cloud".to_string(),
        }
    }
}

impl SuffixPolicy {
    fn is_local_service(&self, publisher_id: &str) -> bool {
        publisher_id.starts_with(&self.service_prefix)
            && !publisher_id.starts_with(&self.root_service_prefix)
    }
}

impl ForwardingPolicy for SuffixPolicy {
    fn suppress_forward(&self, ctx: &ForwardContext<'_>) -> bool {
        let local_result = ctx.topic.ends_with_level(&self.result_suffix)
            && self.is_local_service(ctx.publisher_id);
        let satisfied_request = ctx.topic.ends_with_level(&self.request_suffix)
            && ctx.local_result != ReasonCode::NoMatchingSubscribers;
        local_result || satisfied_request
    }
}
