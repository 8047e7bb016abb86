/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Action list execution
//!
//! When a state machine enters a state, the ordered action list configured
//! for that state is handed to an [`ActionExecutor`]. The executor dispatches
//! each item to a side-effecting collaborator: Execution Management for
//! function group states, Network Management for communication states, and
//! the nested-machine control for starting/stopping Agent instances.
//!
//! Execution is sequential and deterministic: no item starts before the
//! previous one completed. Every item reports an outcome; the first failure
//! stops the list and is propagated so the state machine can refuse to
//! commit the destination state.

use async_trait::async_trait;
use common::statemanagement::{ActionItem, ActionKind, NetworkState, SmError, State};
use std::sync::Arc;
use tokio::time::Duration;

// ========================================
// COLLABORATOR INTERFACES
// ========================================

/// Execution Management boundary: function group state requests
#[async_trait]
pub trait ExecutionManagementClient: Send + Sync {
    async fn set_function_group_state(
        &self,
        function_group: &str,
        state: &str,
    ) -> common::Result<()>;
}

/// Network Management boundary: communication state requests
#[async_trait]
pub trait NetworkManagementClient: Send + Sync {
    async fn set_network_state(&self, handle: &str, state: NetworkState) -> common::Result<()>;
}

/// Control boundary for nested state machines.
///
/// Only Controller-category executors carry this capability. Stopping a
/// machine asks the nested instance to shut itself down - transitioning to
/// Off first is the nested instance's own responsibility.
#[async_trait]
pub trait NestedMachineControl: Send + Sync {
    async fn start_machine(&self, name: &str, initial: Option<State>) -> common::Result<()>;
    async fn stop_machine(&self, name: &str) -> common::Result<()>;
}

// ========================================
// EXECUTOR INTERFACE
// ========================================

/// Capability interface the state machine drives on every state entry.
///
/// Backends are swappable; tests substitute recording doubles for the
/// side-effecting implementation.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute a whole action list in array order
    async fn execute_list(&self, actions: &[ActionItem]) -> Result<(), SmError>;

    /// Execute a single action item
    async fn execute_one(&self, action: &ActionItem) -> Result<(), SmError>;
}

/// True when the action kind cannot do anything without a target name
fn requires_target(kind: ActionKind) -> bool {
    !matches!(kind, ActionKind::Sync | ActionKind::Sleep)
}

// ========================================
// DEFAULT BACKEND
// ========================================

/// Executor backend dispatching to the configured collaborators.
///
/// All work is awaited in place, so the Sync barrier's outstanding-work set
/// is always empty here. A concurrent backend would dispatch collaborator
/// requests as tasks and make [`ActionKind::Sync`] a real join point; the
/// interface already permits that without touching the state machine.
pub struct DefaultActionExecutor {
    execution: Arc<dyn ExecutionManagementClient>,
    network: Arc<dyn NetworkManagementClient>,
    machines: Option<Arc<dyn NestedMachineControl>>,
}

impl DefaultActionExecutor {
    pub fn new(
        execution: Arc<dyn ExecutionManagementClient>,
        network: Arc<dyn NetworkManagementClient>,
        machines: Option<Arc<dyn NestedMachineControl>>,
    ) -> Self {
        Self {
            execution,
            network,
            machines,
        }
    }

    fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, SmError> {
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => {
                eprintln!("[ActionExecutor] Missing {what} on action item");
                Err(SmError::InvalidValue)
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for DefaultActionExecutor {
    async fn execute_list(&self, actions: &[ActionItem]) -> Result<(), SmError> {
        println!(
            "[ActionExecutor] Executing action list ({} actions)",
            actions.len()
        );

        for action in actions {
            // A target-requiring item without a target terminates the list;
            // configured lists may be shorter than their declared capacity.
            if action.target.is_none() && requires_target(action.kind) {
                println!("[ActionExecutor] Reached end of action list (terminator)");
                break;
            }

            self.execute_one(action).await?;
        }

        println!("[ActionExecutor] Action list completed");
        Ok(())
    }

    async fn execute_one(&self, action: &ActionItem) -> Result<(), SmError> {
        match action.kind {
            ActionKind::SetFunctionGroupState => {
                let target = Self::required(&action.target, "function group name")?;
                let parameter = Self::required(&action.parameter, "function group state")?;
                println!("  [Action] SetFunctionGroupState: {target} -> {parameter}");

                self.execution
                    .set_function_group_state(target, parameter)
                    .await
                    .map_err(|e| {
                        eprintln!("[ActionExecutor] SetFunctionGroupState failed: {e}");
                        SmError::OperationFailed
                    })
            }
            ActionKind::StartStateMachine => {
                let target = Self::required(&action.target, "state machine name")?;
                // An absent parameter means the default initial state; an
                // unknown state name is a configuration defect.
                let initial = match action.parameter.as_deref() {
                    Some(name) if !name.is_empty() => match State::from_str(name) {
                        Some(state) => Some(state),
                        None => {
                            eprintln!("[ActionExecutor] Unknown initial state: {name}");
                            return Err(SmError::InvalidValue);
                        }
                    },
                    _ => None,
                };
                println!(
                    "  [Action] StartStateMachine: {target} (initial state: {})",
                    initial.map(|s| s.as_str()).unwrap_or("default")
                );

                let Some(machines) = &self.machines else {
                    // Agent action lists cannot start machines; skip, not fatal.
                    eprintln!("[ActionExecutor] No nested machine control attached, skipping");
                    return Ok(());
                };
                machines.start_machine(target, initial).await.map_err(|e| {
                    eprintln!("[ActionExecutor] StartStateMachine failed: {e}");
                    SmError::OperationFailed
                })
            }
            ActionKind::StopStateMachine => {
                let target = Self::required(&action.target, "state machine name")?;
                println!("  [Action] StopStateMachine: {target}");

                let Some(machines) = &self.machines else {
                    eprintln!("[ActionExecutor] No nested machine control attached, skipping");
                    return Ok(());
                };
                machines.stop_machine(target).await.map_err(|e| {
                    eprintln!("[ActionExecutor] StopStateMachine failed: {e}");
                    SmError::OperationFailed
                })
            }
            ActionKind::Sync => {
                // Sequential backend: every previous action was awaited in
                // place, so the outstanding-work set is empty.
                println!("  [Action] Sync - all previous actions completed");
                Ok(())
            }
            ActionKind::Sleep => {
                println!("  [Action] Sleep: {}ms", action.delay_ms);
                tokio::time::sleep(Duration::from_millis(action.delay_ms)).await;
                Ok(())
            }
            ActionKind::SetNetworkState => {
                let target = Self::required(&action.target, "network handle name")?;
                let parameter = Self::required(&action.parameter, "network state")?;
                let state = NetworkState::from_str(parameter).ok_or_else(|| {
                    eprintln!("[ActionExecutor] Unknown network state: {parameter}");
                    SmError::InvalidValue
                })?;
                println!("  [Action] SetNetworkState: {target} -> {}", state.as_str());

                self.network
                    .set_network_state(target, state)
                    .await
                    .map_err(|e| {
                        eprintln!("[ActionExecutor] SetNetworkState failed: {e}");
                        SmError::OperationFailed
                    })
            }
        }
    }
}

// ========================================
// CONSOLE COLLABORATOR BACK ENDS
// ========================================

/// Execution Management stand-in that logs requests instead of performing
/// them. The real back end lives outside this service.
pub struct ConsoleExecutionManagement;

#[async_trait]
impl ExecutionManagementClient for ConsoleExecutionManagement {
    async fn set_function_group_state(
        &self,
        function_group: &str,
        state: &str,
    ) -> common::Result<()> {
        println!("[ExecutionManagement] Request: {function_group} -> {state}");
        Ok(())
    }
}

/// Network Management stand-in that logs requests
pub struct ConsoleNetworkManagement;

#[async_trait]
impl NetworkManagementClient for ConsoleNetworkManagement {
    async fn set_network_state(&self, handle: &str, state: NetworkState) -> common::Result<()> {
        println!("[NetworkManagement] Request: {handle} -> {}", state.as_str());
        Ok(())
    }
}
