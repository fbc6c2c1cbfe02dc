//! Executor handlers and the strategy → handler registry.
//!
//! Exactly one handler may be bound per [`RemediationStrategy`]; binding
//! a second one replaces the first.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use autoheal_types::{HandlerResult, Parameters, RemediationStrategy};
use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::{debug, info};

/// Trait for carrying out one remediation action against the managed system.
///
/// Implementations must be cancel-safe: the engine drops the future when
/// the action timeout fires.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute against `target` and return a result map.
    async fn execute(&self, target: &str, parameters: &Parameters) -> HandlerResult<Parameters>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "executor"
    }
}

type ExecutorFn = dyn Fn(String, Parameters) -> BoxFuture<'static, HandlerResult<Parameters>>
    + Send
    + Sync;

/// Executor backed by an async closure.
pub struct FnExecutor {
    name: String,
    f: Box<ExecutorFn>,
}

impl FnExecutor {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(String, Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Parameters>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |target, parameters| Box::pin(f(target, parameters))),
        }
    }
}

#[async_trait]
impl ActionExecutor for FnExecutor {
    async fn execute(&self, target: &str, parameters: &Parameters) -> HandlerResult<Parameters> {
        (self.f)(target.to_string(), parameters.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Executor that succeeds immediately without side effects.
pub struct NoOpExecutor;

#[async_trait]
impl ActionExecutor for NoOpExecutor {
    async fn execute(&self, target: &str, _parameters: &Parameters) -> HandlerResult<Parameters> {
        debug!(target = %target, "No-op executing remediation action");
        Ok(Parameters::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Strategy → executor bindings.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: DashMap<RemediationStrategy, Arc<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `executor` to `strategy`, returning the handler it replaced.
    pub fn register(
        &self,
        strategy: RemediationStrategy,
        executor: Arc<dyn ActionExecutor>,
    ) -> Option<Arc<dyn ActionExecutor>> {
        info!(strategy = %strategy, executor = executor.name(), "Registering executor");
        self.executors.insert(strategy, executor)
    }

    pub fn get(&self, strategy: RemediationStrategy) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(&strategy).map(|e| e.value().clone())
    }

    pub fn contains(&self, strategy: RemediationStrategy) -> bool {
        self.executors.contains_key(&strategy)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Bound strategies in declaration order.
    pub fn strategies(&self) -> Vec<RemediationStrategy> {
        RemediationStrategy::all()
            .iter()
            .copied()
            .filter(|s| self.contains(*s))
            .collect()
    }
}
