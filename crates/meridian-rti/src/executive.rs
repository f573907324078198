//! Federation executive: the async runtime around [`FederationExecution`].
//!
//! Each federation execution runs on its own tokio task that drains a bounded
//! command channel, so requests against one federation are serialized while
//! independent federations proceed in parallel. Callbacks are pushed to
//! per-federate unbounded outboxes owned by [`FederateSession`].
//!
//! A federate whose session is dropped, or whose outbox receiver is gone, is
//! treated as crashed and removed with the federation's automatic resign
//! action.

use std::{collections::HashMap, sync::Arc};

use meridian_core::{FederateHandle, LogicalTime, ObjectModel, RtiError};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::{
    callback::{Callback, Delivery},
    config::{ExecutiveConfig, FederationConfig},
    federation::FederationExecution,
    request::{Request, ResignAction, Response},
    storage::SaveStore,
};

type Outbox<T> = mpsc::UnboundedSender<Callback<T>>;

enum Command<T: LogicalTime> {
    Join {
        federate_type: String,
        federate_name: String,
        outbox: Outbox<T>,
        reply: oneshot::Sender<Result<FederateHandle, RtiError>>,
    },
    Request {
        federate: FederateHandle,
        request: Request<T>,
        reply: oneshot::Sender<Result<Response<T>, RtiError>>,
    },
    Disconnect {
        federate: FederateHandle,
    },
    Destroy {
        reply: oneshot::Sender<Result<(), RtiError>>,
    },
}

fn actor_gone(federation: &str) -> RtiError {
    RtiError::RtiInternal(format!("federation execution {federation} is no longer running"))
}

/// Directory of running federation executions.
pub struct Executive<T: LogicalTime, S: SaveStore> {
    config: ExecutiveConfig,
    store: S,
    federations: Arc<RwLock<HashMap<String, mpsc::Sender<Command<T>>>>>,
}

impl<T: LogicalTime, S: SaveStore> Clone for Executive<T, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            federations: Arc::clone(&self.federations),
        }
    }
}

impl<T: LogicalTime, S: SaveStore> Executive<T, S> {
    /// Create an executive with no federation executions.
    pub fn new(config: ExecutiveConfig, store: S) -> Self {
        Self { config, store, federations: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Snapshot store shared by every federation.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// `createFederationExecution` with the executive's default federation
    /// configuration.
    pub async fn create_federation_execution(
        &self,
        name: &str,
        object_model: ObjectModel,
    ) -> Result<(), RtiError> {
        let config = self.config.federation.clone();
        self.create_federation_execution_with_config(name, object_model, config).await
    }

    /// `createFederationExecution`.
    pub async fn create_federation_execution_with_config(
        &self,
        name: &str,
        object_model: ObjectModel,
        config: FederationConfig,
    ) -> Result<(), RtiError> {
        let mut federations = self.federations.write().await;
        if federations.contains_key(name) {
            return Err(RtiError::FederationExecutionAlreadyExists(name.to_string()));
        }

        let federation = FederationExecution::new(name, object_model, config, self.store.clone());
        let (commands, inbox) = mpsc::channel(self.config.command_queue_depth.max(1));
        tokio::spawn(run_federation(federation, inbox));
        federations.insert(name.to_string(), commands);

        tracing::info!(federation = %name, "Federation execution created");
        Ok(())
    }

    /// `destroyFederationExecution`. Fails while federates are joined.
    ///
    /// The directory lock is only held to look the federation up and to
    /// remove it, never while waiting on the federation's task.
    pub async fn destroy_federation_execution(&self, name: &str) -> Result<(), RtiError> {
        let commands = self
            .federations
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RtiError::FederationExecutionDoesNotExist(name.to_string()))?;

        let (reply, response) = oneshot::channel();
        if commands.send(Command::Destroy { reply }).await.is_ok() {
            response.await.map_err(|_| actor_gone(name))??;
        }

        let mut federations = self.federations.write().await;
        if !federations.get(name).is_some_and(|current| current.same_channel(&commands)) {
            return Err(RtiError::FederationExecutionDoesNotExist(name.to_string()));
        }
        federations.remove(name);
        drop(federations);

        if let Err(err) = self.store.remove_federation(name) {
            tracing::warn!(federation = %name, error = %err, "Failed to remove saved snapshots");
        }
        tracing::info!(federation = %name, "Federation execution destroyed");
        Ok(())
    }

    /// Names of running federation executions, sorted.
    pub async fn list_federation_executions(&self) -> Vec<String> {
        let mut names: Vec<_> = self.federations.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// `joinFederationExecution`.
    pub async fn join_federation_execution(
        &self,
        name: &str,
        federate_type: &str,
        federate_name: &str,
    ) -> Result<FederateSession<T>, RtiError> {
        let commands = self
            .federations
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RtiError::FederationExecutionDoesNotExist(name.to_string()))?;

        let (outbox, callbacks) = mpsc::unbounded_channel();
        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Join {
                federate_type: federate_type.to_string(),
                federate_name: federate_name.to_string(),
                outbox,
                reply,
            })
            .await
            .map_err(|_| actor_gone(name))?;
        let federate = response.await.map_err(|_| actor_gone(name))??;

        Ok(FederateSession {
            federation: name.to_string(),
            federate,
            commands,
            callbacks,
            resigned: false,
        })
    }
}

/// A joined federate's endpoint: requests in, callbacks out.
///
/// Dropping a session without resigning is treated as a crash.
pub struct FederateSession<T: LogicalTime> {
    federation: String,
    federate: FederateHandle,
    commands: mpsc::Sender<Command<T>>,
    callbacks: mpsc::UnboundedReceiver<Callback<T>>,
    resigned: bool,
}

impl<T: LogicalTime> FederateSession<T> {
    /// Handle assigned on join.
    pub fn handle(&self) -> FederateHandle {
        self.federate
    }

    /// Federation execution name.
    pub fn federation(&self) -> &str {
        &self.federation
    }

    /// Send a request and wait for its response. Callbacks the request
    /// produced are in the outbox by the time this returns.
    pub async fn request(&mut self, request: Request<T>) -> Result<Response<T>, RtiError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request { federate: self.federate, request, reply })
            .await
            .map_err(|_| actor_gone(&self.federation))?;
        let response = response.await.map_err(|_| actor_gone(&self.federation))??;

        if response == Response::Resigned {
            self.resigned = true;
        }
        Ok(response)
    }

    /// `resignFederationExecution`.
    pub async fn resign(&mut self, action: ResignAction) -> Result<(), RtiError> {
        self.request(Request::Resign(action)).await.map(|_| ())
    }

    /// Wait for the next callback. `None` once the federate has left and the
    /// outbox is drained.
    pub async fn next_callback(&mut self) -> Option<Callback<T>> {
        self.callbacks.recv().await
    }

    /// Next callback if one is ready.
    pub fn try_next_callback(&mut self) -> Option<Callback<T>> {
        self.callbacks.try_recv().ok()
    }

    /// Drain every ready callback.
    pub fn drain_callbacks(&mut self) -> Vec<Callback<T>> {
        std::iter::from_fn(|| self.try_next_callback()).collect()
    }
}

impl<T: LogicalTime> Drop for FederateSession<T> {
    fn drop(&mut self) {
        if self.resigned {
            return;
        }

        let command = Command::Disconnect { federate: self.federate };
        match self.commands.try_send(command) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {},
            Err(mpsc::error::TrySendError::Full(command)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let commands = self.commands.clone();
                    runtime.spawn(async move {
                        let _ = commands.send(command).await;
                    });
                }
            },
        }
    }
}

/// Drain commands for one federation execution until it is destroyed or
/// every handle to it is gone.
async fn run_federation<T: LogicalTime, S: SaveStore>(
    mut federation: FederationExecution<T, S>,
    mut inbox: mpsc::Receiver<Command<T>>,
) {
    let mut outboxes: HashMap<FederateHandle, Outbox<T>> = HashMap::new();

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Join { federate_type, federate_name, outbox, reply } => {
                match federation.join(federate_type, federate_name) {
                    Ok((federate, deliveries)) => {
                        outboxes.insert(federate, outbox);
                        dispatch(&mut federation, &mut outboxes, deliveries);
                        if reply.send(Ok(federate)).is_err() {
                            tracing::warn!(
                                federation = %federation.name(),
                                federate = %federate,
                                "Joiner went away before the join completed"
                            );
                            outboxes.remove(&federate);
                            let deliveries = federation.disconnect(federate);
                            dispatch(&mut federation, &mut outboxes, deliveries);
                        }
                    },
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    },
                }
            },
            Command::Request { federate, request, reply } => {
                match federation.process(federate, request) {
                    Ok(outcome) => {
                        dispatch(&mut federation, &mut outboxes, outcome.deliveries);
                        if outcome.response == Response::Resigned {
                            outboxes.remove(&federate);
                        }
                        let _ = reply.send(Ok(outcome.response));
                    },
                    Err(err) => {
                        tracing::debug!(federate = %federate, error = %err, "Request rejected");
                        let _ = reply.send(Err(err));
                    },
                }
            },
            Command::Disconnect { federate } => {
                outboxes.remove(&federate);
                let deliveries = federation.disconnect(federate);
                dispatch(&mut federation, &mut outboxes, deliveries);
            },
            Command::Destroy { reply } => {
                if federation.registry().is_empty() {
                    let _ = reply.send(Ok(()));
                    break;
                }
                let _ = reply.send(Err(RtiError::FederatesCurrentlyJoined));
            },
        }
    }

    tracing::debug!(federation = %federation.name(), "Federation execution stopped");
}

/// Push callbacks to outboxes. A closed outbox disconnects its federate,
/// whose removal may produce further callbacks.
fn dispatch<T: LogicalTime, S: SaveStore>(
    federation: &mut FederationExecution<T, S>,
    outboxes: &mut HashMap<FederateHandle, Outbox<T>>,
    mut deliveries: Vec<Delivery<T>>,
) {
    let mut crashed = Vec::new();
    loop {
        for Delivery { federate, callback } in deliveries.drain(..) {
            let closed = outboxes.get(&federate).is_some_and(|outbox| outbox.send(callback).is_err());
            if closed {
                outboxes.remove(&federate);
                crashed.push(federate);
            }
        }

        let Some(federate) = crashed.pop() else {
            break;
        };
        tracing::warn!(
            federation = %federation.name(),
            federate = %federate,
            "Federate outbox closed"
        );
        deliveries = federation.disconnect(federate);
    }
}

#[cfg(test)]
mod tests {
    use meridian_core::{Integer64Interval, Integer64Time};

    use super::*;
    use crate::{request::AdvanceKind, storage::MemorySaveStore};

    type TestExecutive = Executive<Integer64Time, MemorySaveStore>;

    fn executive() -> TestExecutive {
        Executive::new(ExecutiveConfig::default(), MemorySaveStore::new())
    }

    #[tokio::test]
    async fn create_list_destroy() {
        let exec = executive();
        exec.create_federation_execution("b", ObjectModel::default()).await.unwrap();
        exec.create_federation_execution("a", ObjectModel::default()).await.unwrap();
        assert_eq!(
            exec.create_federation_execution("a", ObjectModel::default()).await,
            Err(RtiError::FederationExecutionAlreadyExists("a".to_string()))
        );
        assert_eq!(exec.list_federation_executions().await, vec!["a", "b"]);

        exec.destroy_federation_execution("a").await.unwrap();
        assert_eq!(
            exec.destroy_federation_execution("a").await,
            Err(RtiError::FederationExecutionDoesNotExist("a".to_string()))
        );
    }

    #[tokio::test]
    async fn destroy_refused_while_joined() {
        let exec = executive();
        exec.create_federation_execution("f", ObjectModel::default()).await.unwrap();
        let mut session = exec.join_federation_execution("f", "sim", "one").await.unwrap();

        assert_eq!(
            exec.destroy_federation_execution("f").await,
            Err(RtiError::FederatesCurrentlyJoined)
        );
        session.resign(ResignAction::NoAction).await.unwrap();
        exec.destroy_federation_execution("f").await.unwrap();
    }

    #[tokio::test]
    async fn callbacks_arrive_before_response() {
        let exec = executive();
        exec.create_federation_execution("f", ObjectModel::default()).await.unwrap();
        let mut session = exec.join_federation_execution("f", "sim", "one").await.unwrap();

        session
            .request(Request::EnableTimeRegulation { lookahead: Integer64Interval::new(1) })
            .await
            .unwrap();
        session
            .request(Request::TimeAdvance { kind: AdvanceKind::TimeAdvance, time: Integer64Time::new(5) })
            .await
            .unwrap();

        assert_eq!(session.drain_callbacks(), vec![
            Callback::TimeRegulationEnabled { time: Integer64Time::new(0) },
            Callback::TimeAdvanceGrant { time: Integer64Time::new(5) },
        ]);
    }
}
