//! Built-in job handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use cronrelay_core::{HandlerRegistry, RegistryError};
use cronrelay_protocols::{HandlerError, JobContext, JobHandler};

pub(crate) const MODULE: &str = "builtin";

/// Completes with its parameter as the completion status.
pub(crate) struct Echo;

#[async_trait]
impl JobHandler for Echo {
    fn module(&self) -> &str {
        MODULE
    }

    fn function(&self) -> &str {
        "echo"
    }

    async fn run(&self, ctx: JobContext) -> Result<(), HandlerError> {
        info!("echo: {}", ctx.parameter);
        let parameter = ctx.parameter.clone();
        ctx.done(Some(json!({ "echo": parameter }))).await?;
        Ok(())
    }
}

/// Completes immediately without output.
pub(crate) struct Noop;

#[async_trait]
impl JobHandler for Noop {
    fn module(&self) -> &str {
        MODULE
    }

    fn function(&self) -> &str {
        "noop"
    }

    async fn run(&self, ctx: JobContext) -> Result<(), HandlerError> {
        ctx.done(None).await?;
        Ok(())
    }
}

/// Sleeps for `parameter.ms` milliseconds, heartbeating every
/// `parameter.heartbeatMs` (default 1000), then completes.
pub(crate) struct Sleep;

#[async_trait]
impl JobHandler for Sleep {
    fn module(&self) -> &str {
        MODULE
    }

    fn function(&self) -> &str {
        "sleep"
    }

    async fn run(&self, ctx: JobContext) -> Result<(), HandlerError> {
        let total = millis(&ctx.parameter, "ms")?.unwrap_or(0);
        let beat = millis(&ctx.parameter, "heartbeatMs")?.unwrap_or(1000).max(1);

        let mut elapsed = 0;
        while elapsed < total {
            let step = beat.min(total - elapsed);
            tokio::time::sleep(Duration::from_millis(step)).await;
            elapsed += step;
            ctx.heartbeat(Some(json!({ "elapsedMs": elapsed }))).await?;
        }
        ctx.done(Some(json!({ "sleptMs": total }))).await?;
        Ok(())
    }
}

fn millis(parameter: &Value, key: &str) -> Result<Option<u64>, HandlerError> {
    match parameter.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerError::InvalidParameter(format!("{} must be a non-negative integer", key))),
    }
}

/// Register every built-in handler.
pub(crate) fn register_builtin(registry: &HandlerRegistry) -> Result<(), RegistryError> {
    let handlers: Vec<Arc<dyn JobHandler>> = vec![Arc::new(Echo), Arc::new(Noop), Arc::new(Sleep)];
    for handler in handlers {
        registry.register(handler)?;
    }
    Ok(())
}
