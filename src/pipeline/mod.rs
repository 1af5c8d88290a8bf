//! Request Pipeline Module
//!
//! Cross-cutting request processing, declared as one ordered list of stages.
//!
//! # Stage order (outermost first)
//! `Trace → RequestId → Logging → Metrics → Recover → Timeout →
//! Authenticate → RateLimit → Cache → handler`
//!
//! Trace and request id come first so every later stage and log line can be
//! correlated. Recover sits inside Logging and Metrics, so a recovered panic
//! is still logged, counted and answered with both id headers; the stages
//! outside it do no fallible work. Authenticate runs before RateLimit and
//! Cache, so rejected callers are not counted and cache keys can include
//! the subject.
//!
//! `Router::layer` only wraps routes that already exist. Requests that match
//! no route get [`Pipeline::edge`] through the router fallback.

mod auth;
mod cache;
mod logging;
mod metrics;
mod rate_limit;
mod recover;
mod trace;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::api::AppState;

pub use auth::CurrentUser;
pub use cache::CACHE_HEADER;
pub use metrics::{record_request, REQUESTS_TOTAL, REQUEST_DURATION};
pub use rate_limit::{client_key, LIMIT_HEADER, REMAINING_HEADER};
pub use recover::install_panic_hook;
pub use trace::{TraceContext, REQUEST_ID_HEADER, TRACE_ID_HEADER};

// == Stage ==
/// One request-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Trace,
    RequestId,
    Logging,
    Metrics,
    Recover,
    Timeout,
    Authenticate,
    RateLimit,
    Cache,
}

impl Stage {
    /// Wraps every route of `router` in this stage.
    fn wrap(self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        match self {
            Stage::Trace => router.layer(from_fn(trace::trace)),
            Stage::Recover => router.layer(from_fn(recover::recover)),
            Stage::RequestId => router.layer(from_fn(trace::request_id)),
            Stage::Logging => router.layer(from_fn(logging::logging)),
            Stage::Metrics => router.layer(from_fn(metrics::metrics)),
            Stage::Timeout => router.layer(from_fn_with_state(state.clone(), recover::timeout)),
            Stage::Authenticate => {
                router.layer(from_fn_with_state(state.clone(), auth::authenticate))
            }
            Stage::RateLimit => {
                router.layer(from_fn_with_state(state.clone(), rate_limit::rate_limit))
            }
            Stage::Cache => router.layer(from_fn_with_state(state.clone(), cache::cache)),
        }
    }
}

// == Pipeline ==
/// An ordered stage list, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Stages every response gets, including unmatched routes.
    pub fn edge() -> Self {
        Self {
            stages: vec![
                Stage::Trace,
                Stage::RequestId,
                Stage::Logging,
                Stage::Metrics,
            ],
        }
    }

    /// Stages for routes open to anonymous callers.
    pub fn public() -> Self {
        Self {
            stages: vec![
                Stage::Trace,
                Stage::RequestId,
                Stage::Logging,
                Stage::Metrics,
                Stage::Recover,
                Stage::Timeout,
                Stage::RateLimit,
            ],
        }
    }

    /// Stages for routes that require a valid token.
    pub fn protected() -> Self {
        Self {
            stages: vec![
                Stage::Trace,
                Stage::RequestId,
                Stage::Logging,
                Stage::Metrics,
                Stage::Recover,
                Stage::Timeout,
                Stage::Authenticate,
                Stage::RateLimit,
                Stage::Cache,
            ],
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wraps the routes of `router` so a request meets the stages in order.
    ///
    /// Layers added later run first, so the list is applied back to front.
    pub fn apply(&self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| stage.wrap(router, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_order() {
        assert_eq!(
            Pipeline::protected().stages(),
            &[
                Stage::Trace,
                Stage::RequestId,
                Stage::Logging,
                Stage::Metrics,
                Stage::Recover,
                Stage::Timeout,
                Stage::Authenticate,
                Stage::RateLimit,
                Stage::Cache,
            ]
        );
    }

    #[test]
    fn test_public_skips_auth_and_cache() {
        let public = Pipeline::public();
        assert!(!public.stages().contains(&Stage::Authenticate));
        assert!(!public.stages().contains(&Stage::Cache));
        assert_eq!(public.stages()[0], Stage::Trace);
    }

    #[test]
    fn test_every_assembly_starts_with_the_edge() {
        let edge = Pipeline::edge();
        for pipeline in [Pipeline::public(), Pipeline::protected()] {
            assert_eq!(&pipeline.stages()[..edge.stages().len()], edge.stages());
        }
    }

    #[test]
    fn test_recover_inside_ids_and_logging() {
        let stages = Pipeline::protected();
        let position = |stage| stages.stages().iter().position(|s| *s == stage).unwrap();

        assert!(position(Stage::RequestId) < position(Stage::Recover));
        assert!(position(Stage::Logging) < position(Stage::Recover));
        assert!(position(Stage::Metrics) < position(Stage::Recover));
        assert!(position(Stage::Recover) < position(Stage::Timeout));
    }
}
