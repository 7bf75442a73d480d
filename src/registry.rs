use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{context::JobContext, types::JobPayload};

/// A unit of work that can be dispatched by name.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// A handler that carries its own registry key.
pub trait NamedJob: JobHandler {
    const NAME: &'static str;

    /// A descriptor that dispatches to this handler.
    fn payload() -> JobPayload {
        JobPayload::new(Self::NAME)
    }
}

/// Maps job names to handlers. Filled once at startup, then shared read-only.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: JobHandler>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.insert(name, handler);
        self
    }

    pub fn define<H: NamedJob>(self, handler: H) -> Self {
        self.register(H::NAME, handler)
    }

    /// Returns the handler previously registered under `name`, if any.
    pub fn insert<H: JobHandler>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Option<Arc<dyn JobHandler>> {
        self.handlers.insert(name.into(), Arc::new(handler))
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
