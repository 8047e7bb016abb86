/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! StateManager engine
//!
//! The manager is the single owner of the Controller state machine and the
//! update-session service. Every entry point of the service arrives here as
//! an [`SmRequest`] message on one mpsc channel, so transition requests,
//! error notifications and update-session calls are serialized by
//! construction; no guard flag can be observed mid-mutation.
//!
//! Agent instances live in the [`AgentRegistry`], which doubles as the
//! nested-machine control backend for the Controller's action executor.

use crate::action_executor::{
    ActionExecutor, ConsoleExecutionManagement, ConsoleNetworkManagement, DefaultActionExecutor,
    NestedMachineControl,
};
use crate::state_machine::StateMachine;
use crate::tables;
use crate::update_service::UpdateRequestService;
use async_trait::async_trait;
use common::statemanagement::{Category, ExecutionError, RuleTables, State, UpdateAllowed};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{oneshot, Mutex};

/// Messages consumed by the manager loop
pub enum SmRequest {
    /// Trigger-validated transition for a named machine
    StateTransition { machine: String, trigger: u32 },
    /// Execution error reported against a named machine
    ErrorNotification {
        machine: String,
        error: ExecutionError,
    },
    /// Grant or revoke the platform update permission
    SetUpdateAllowed { allowed: UpdateAllowed },
    RequestUpdateSession,
    PrepareUpdate { function_groups: Vec<String> },
    VerifyUpdate { function_groups: Vec<String> },
    PrepareRollback { function_groups: Vec<String> },
    ResetMachine,
    StopUpdateSession,
    /// Reply with the published state name of a machine, None when unknown
    QueryState {
        machine: String,
        reply: oneshot::Sender<Option<String>>,
    },
    Shutdown,
}

/// Registry of Agent state machines.
///
/// Backs the Controller's StartStateMachine/StopStateMachine actions. All
/// instances sit behind one async mutex; the Controller's action list holds
/// the lock for the duration of one nested start or stop, which keeps agent
/// lifecycles serialized with respect to each other.
pub struct AgentRegistry {
    tables: Arc<RuleTables>,
    /// Shared by all agents; agents never control other machines
    agent_executor: Arc<dyn ActionExecutor>,
    agents: Mutex<HashMap<String, StateMachine>>,
}

impl AgentRegistry {
    pub fn new(tables: Arc<RuleTables>, agent_executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            tables,
            agent_executor,
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Published state name of a registered agent
    pub async fn agent_state_name(&self, name: &str) -> Option<String> {
        let agents = self.agents.lock().await;
        agents.get(name).map(|agent| agent.current_state_name())
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.lock().await.len()
    }

    /// Dispatch a transition request to a registered agent
    pub async fn request_agent_transition(&self, name: &str, trigger: u32) -> common::Result<()> {
        let mut agents = self.agents.lock().await;
        match agents.get_mut(name) {
            Some(agent) => {
                agent.request_transition(trigger).await?;
                Ok(())
            }
            None => Err(format!("unknown state machine: {name}").into()),
        }
    }

    /// Forward an error notification to a registered agent
    pub async fn notify_agent_error(&self, name: &str, error: ExecutionError) {
        let mut agents = self.agents.lock().await;
        match agents.get_mut(name) {
            Some(agent) => agent.handle_error_notification(error).await,
            None => eprintln!("[AgentRegistry] Error for unknown machine: {name}"),
        }
    }

    /// Mark or unmark every registered agent as impacted by an update
    pub async fn set_all_impacted(&self, impacted: bool) {
        let mut agents = self.agents.lock().await;
        for agent in agents.values_mut() {
            agent.set_impacted_by_update(impacted);
        }
    }
}

#[async_trait]
impl NestedMachineControl for AgentRegistry {
    /// Create-or-start: an unknown name creates a fresh Agent instance,
    /// a known name re-places the existing one.
    async fn start_machine(&self, name: &str, initial: Option<State>) -> common::Result<()> {
        let mut agents = self.agents.lock().await;

        let agent = agents.entry(name.to_string()).or_insert_with(|| {
            StateMachine::new(
                name,
                Category::Agent,
                self.tables.clone(),
                Some(self.agent_executor.clone()),
            )
        });

        agent.start(initial.unwrap_or(State::Running)).await?;
        println!(
            "[AgentRegistry] Agent {name} started in {}",
            agent.current_state_name()
        );
        Ok(())
    }

    /// Ask the agent to stop itself, then release it from the registry.
    /// Stopping an unknown machine is not an error.
    async fn stop_machine(&self, name: &str) -> common::Result<()> {
        let mut agents = self.agents.lock().await;

        let Some(agent) = agents.get_mut(name) else {
            println!("[AgentRegistry] StopStateMachine for unknown machine: {name}");
            return Ok(());
        };

        agent.stop().await?;
        agents.remove(name);
        println!("[AgentRegistry] Agent {name} stopped and released");
        Ok(())
    }
}

/// Engine owning the Controller, the update-session service and the Agent
/// registry, driven by the request channel
pub struct StateManagerManager {
    controller: StateMachine,
    update_service: UpdateRequestService,
    agents: Arc<AgentRegistry>,
    rx: Receiver<SmRequest>,
}

impl StateManagerManager {
    /// Assemble the engine: rule tables, agent registry, Controller with a
    /// machine-controlling executor, update-session service.
    pub async fn new(rx: Receiver<SmRequest>) -> Self {
        let rule_tables = Arc::new(tables::default_tables());

        let agent_executor: Arc<dyn ActionExecutor> = Arc::new(DefaultActionExecutor::new(
            Arc::new(ConsoleExecutionManagement),
            Arc::new(ConsoleNetworkManagement),
            None,
        ));
        let agents = Arc::new(AgentRegistry::new(rule_tables.clone(), agent_executor));

        let controller_executor: Arc<dyn ActionExecutor> = Arc::new(DefaultActionExecutor::new(
            Arc::new(ConsoleExecutionManagement),
            Arc::new(ConsoleNetworkManagement),
            Some(agents.clone()),
        ));

        let settings = common::setting::get_config();
        let controller = StateMachine::new(
            &settings.machine.controller_name,
            Category::Controller,
            rule_tables,
            Some(controller_executor),
        );

        Self {
            controller,
            update_service: UpdateRequestService::new(),
            agents,
            rx,
        }
    }

    /// Validate the configured tables and start the Controller.
    ///
    /// Table findings are logged, not fatal: the resolvers fall back safely
    /// on degraded configuration. With `auto_running` set the Controller
    /// requests Running immediately after start.
    pub async fn initialize(&mut self) -> common::Result<()> {
        println!(
            "[{}] StateManagerManager initializing",
            chrono::Utc::now().to_rfc3339()
        );

        for finding in tables::validate(&tables::default_tables()) {
            eprintln!("[Manager] Table validation: {finding}");
        }

        self.controller.start(State::Initial).await?;

        if common::setting::get_config().machine.auto_running {
            println!("[Manager] auto_running set, requesting Running");
            self.controller
                .request_transition(common::statemanagement::request::GO_TO_RUNNING)
                .await?;
        }

        println!(
            "[Manager] Controller {} ready in {}",
            self.controller.name(),
            self.controller.current_state_name()
        );
        Ok(())
    }

    /// Main processing loop. Returns when the channel closes or a Shutdown
    /// request arrives; the Controller is stopped on the way out.
    pub async fn run(mut self) -> common::Result<()> {
        println!(
            "[{}] StateManagerManager processing loop started",
            chrono::Utc::now().to_rfc3339()
        );

        while let Some(request) = self.rx.recv().await {
            if let SmRequest::Shutdown = request {
                println!("[Manager] Shutdown requested");
                break;
            }
            self.dispatch(request).await;
        }

        if let Err(e) = self.controller.stop().await {
            eprintln!("[Manager] Controller stop failed during shutdown: {e}");
        }

        println!(
            "[{}] StateManagerManager processing loop stopped",
            chrono::Utc::now().to_rfc3339()
        );
        Ok(())
    }

    async fn dispatch(&mut self, request: SmRequest) {
        match request {
            SmRequest::StateTransition { machine, trigger } => {
                if machine == self.controller.name() {
                    if let Err(e) = self.controller.request_transition(trigger).await {
                        eprintln!("[Manager] Transition rejected for {machine}: {e}");
                    }
                } else if let Err(e) = self
                    .agents
                    .request_agent_transition(&machine, trigger)
                    .await
                {
                    eprintln!("[Manager] Transition rejected for {machine}: {e}");
                }
            }
            SmRequest::ErrorNotification { machine, error } => {
                if machine == self.controller.name() {
                    self.controller.handle_error_notification(error).await;
                } else {
                    self.agents.notify_agent_error(&machine, error).await;
                }
            }
            SmRequest::SetUpdateAllowed { allowed } => {
                self.update_service.set_update_allowed(allowed);
            }
            SmRequest::RequestUpdateSession => {
                if let Err(e) = self.update_service.request_update_session() {
                    eprintln!("[Manager] Update session rejected: {e}");
                }
            }
            SmRequest::PrepareUpdate { function_groups } => {
                match self
                    .update_service
                    .prepare_update(&mut self.controller, &function_groups)
                    .await
                {
                    Ok(()) => self.agents.set_all_impacted(true).await,
                    Err(e) => eprintln!("[Manager] PrepareUpdate failed: {e}"),
                }
            }
            SmRequest::VerifyUpdate { function_groups } => {
                if let Err(e) = self
                    .update_service
                    .verify_update(&mut self.controller, &function_groups)
                    .await
                {
                    eprintln!("[Manager] VerifyUpdate failed: {e}");
                }
            }
            SmRequest::PrepareRollback { function_groups } => {
                if let Err(e) = self
                    .update_service
                    .prepare_rollback(&mut self.controller, &function_groups)
                    .await
                {
                    eprintln!("[Manager] PrepareRollback failed: {e}");
                }
            }
            SmRequest::ResetMachine => {
                self.update_service.reset_machine(&mut self.controller).await;
            }
            SmRequest::StopUpdateSession => {
                match self.update_service.stop_update_session(&mut self.controller).await {
                    Ok(()) => self.agents.set_all_impacted(false).await,
                    Err(e) => eprintln!("[Manager] StopUpdateSession failed: {e}"),
                }
            }
            SmRequest::QueryState { machine, reply } => {
                let name = if machine == self.controller.name() {
                    Some(self.controller.current_state_name())
                } else {
                    self.agents.agent_state_name(&machine).await
                };
                // A dropped receiver means the asker gave up; nothing to do.
                let _ = reply.send(name);
            }
            // Consumed by run() before dispatch.
            SmRequest::Shutdown => {}
        }
    }
}
