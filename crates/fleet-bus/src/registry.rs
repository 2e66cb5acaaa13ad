//! # Command Registry
//!
//! Maps command names to handlers. One registry per process, filled at
//! startup and frozen (wrapped in an `Arc`) before the subscriber starts.
//!
//! Worker-response handlers only make sense on main; a worker registering
//! one is a wiring mistake and is rejected.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use fleet_types::{CommandMessage, CommandName, InstanceRole, WorkerResponseMessage};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigurationError, HandlerError};

/// Reacts to a command received on the commands channel.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &CommandMessage) -> Result<(), HandlerError>;
}

/// Reacts to a worker response received on main.
#[async_trait]
pub trait WorkerResponseHandler: Send + Sync {
    async fn handle(&self, response: &WorkerResponseMessage) -> Result<(), HandlerError>;
}

struct FnCommandHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnCommandHandler<F>
where
    F: Fn(CommandMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, command: &CommandMessage) -> Result<(), HandlerError> {
        (self.0)(command.clone()).await
    }
}

/// Decodes the payload into `P` before calling the closure.
struct TypedCommandHandler<P, F> {
    handler: F,
    _payload: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, F, Fut> CommandHandler for TypedCommandHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, command: &CommandMessage) -> Result<(), HandlerError> {
        let raw = command.payload.clone().unwrap_or(Value::Null);
        let payload = serde_json::from_value::<P>(raw).map_err(|e| HandlerError::InvalidPayload {
            command: command.command,
            reason: e.to_string(),
        })?;
        (self.handler)(payload).await
    }
}

struct FnWorkerResponseHandler<F>(F);

#[async_trait]
impl<F, Fut> WorkerResponseHandler for FnWorkerResponseHandler<F>
where
    F: Fn(WorkerResponseMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, response: &WorkerResponseMessage) -> Result<(), HandlerError> {
        (self.0)(response.clone()).await
    }
}

/// Handlers of one process, keyed by command name.
pub struct CommandRegistry {
    role: InstanceRole,
    commands: HashMap<CommandName, Arc<dyn CommandHandler>>,
    worker_responses: HashMap<CommandName, Arc<dyn WorkerResponseHandler>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new(role: InstanceRole) -> Self {
        Self {
            role,
            commands: HashMap::new(),
            worker_responses: HashMap::new(),
        }
    }

    #[must_use]
    pub fn role(&self) -> InstanceRole {
        self.role
    }

    /// Register the handler for `command`.
    ///
    /// # Errors
    ///
    /// `DuplicateHandler` if one is already registered.
    pub fn register(
        &mut self,
        command: CommandName,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), ConfigurationError> {
        if self.commands.contains_key(&command) {
            return Err(ConfigurationError::DuplicateHandler {
                command,
                role: self.role,
            });
        }
        debug!(command = %command, role = %self.role, "Command handler registered");
        self.commands.insert(command, handler);
        Ok(())
    }

    /// Register a closure receiving the whole command.
    pub fn register_fn<F, Fut>(
        &mut self,
        command: CommandName,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        F: Fn(CommandMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(command, Arc::new(FnCommandHandler(handler)))
    }

    /// Register a closure receiving the payload decoded as `P`.
    ///
    /// A missing payload decodes from `null`, so `P` may be an `Option` or `()`.
    /// A payload that does not fit fails the invocation with `InvalidPayload`.
    pub fn register_typed<P, F, Fut>(
        &mut self,
        command: CommandName,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(
            command,
            Arc::new(TypedCommandHandler {
                handler,
                _payload: PhantomData,
            }),
        )
    }

    /// Register the handler for worker responses to `command`. Main only.
    ///
    /// # Errors
    ///
    /// `RoleMismatch` on a worker, `DuplicateHandler` if already registered.
    pub fn register_worker_response(
        &mut self,
        command: CommandName,
        handler: Arc<dyn WorkerResponseHandler>,
    ) -> Result<(), ConfigurationError> {
        if self.role != InstanceRole::Main {
            return Err(ConfigurationError::RoleMismatch {
                command,
                role: self.role,
            });
        }
        if self.worker_responses.contains_key(&command) {
            return Err(ConfigurationError::DuplicateHandler {
                command,
                role: self.role,
            });
        }
        debug!(command = %command, "Worker-response handler registered");
        self.worker_responses.insert(command, handler);
        Ok(())
    }

    pub fn register_worker_response_fn<F, Fut>(
        &mut self,
        command: CommandName,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        F: Fn(WorkerResponseMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register_worker_response(command, Arc::new(FnWorkerResponseHandler(handler)))
    }

    #[must_use]
    pub fn command_handler(&self, command: CommandName) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(&command).cloned()
    }

    #[must_use]
    pub fn worker_response_handler(
        &self,
        command: CommandName,
    ) -> Option<Arc<dyn WorkerResponseHandler>> {
        self.worker_responses.get(&command).cloned()
    }

    /// Commands with a handler, in wire-name order.
    #[must_use]
    pub fn registered_commands(&self) -> Vec<CommandName> {
        let mut commands: Vec<_> = self.commands.keys().copied().collect();
        commands.sort_by_key(CommandName::as_str);
        commands
    }

    /// Commands with a worker-response handler, in wire-name order.
    #[must_use]
    pub fn registered_worker_responses(&self) -> Vec<CommandName> {
        let mut commands: Vec<_> = self.worker_responses.keys().copied().collect();
        commands.sort_by_key(CommandName::as_str);
        commands
    }
}
