/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! State machine orchestrator
//!
//! Owns the committed state and the transient flags of one Controller or
//! Agent instance, validates transition requests against the shared rule
//! tables, resolves error notifications through the recovery table, and
//! drives the action executor on every state entry.
//!
//! # Design Principles
//! - **Deterministic**: same inputs against the same tables always produce
//!   the same transitions.
//! - **Atomic commits**: a destination state is committed only after its
//!   action list completed; a failed action leaves the previous state in
//!   place and surfaces `TransitionFailed`.
//! - **Table-driven**: the instance holds no transition knowledge of its
//!   own; the category selects the rule-table partition.
//!
//! # Thread Safety
//! All mutating operations take `&mut self`; a single owner (the manager
//! loop) serializes them. The guard flags are therefore checked and mutated
//! atomically with respect to other entry points.

use crate::action_executor::ActionExecutor;
use crate::error_recovery::ErrorRecoveryTable;
use crate::transition_table::TransitionTable;
use common::statemanagement::{
    Category, ExecutionError, RuleTables, SmError, State, IN_TRANSITION_STATE_NAME,
};
use std::sync::Arc;
use tokio::sync::watch;

pub struct StateMachine {
    name: String,
    category: Category,
    current_state: State,
    is_running: bool,
    is_in_transition: bool,
    error_recovery_ongoing: bool,
    impacted_by_update: bool,

    tables: Arc<RuleTables>,
    /// Absent executor makes action-list execution a logged no-op
    executor: Option<Arc<dyn ActionExecutor>>,
    /// Publishes the current state name, including the transient
    /// "inTransition" value while an action list executes
    state_tx: watch::Sender<String>,
}

impl StateMachine {
    pub fn new(
        name: &str,
        category: Category,
        tables: Arc<RuleTables>,
        executor: Option<Arc<dyn ActionExecutor>>,
    ) -> Self {
        println!(
            "[StateMachine] Created: {} (Category: {})",
            name,
            category.as_str()
        );

        let (state_tx, _) = watch::channel(State::Initial.as_str().to_string());
        Self {
            name: name.to_string(),
            category,
            current_state: State::Initial,
            is_running: false,
            is_in_transition: false,
            error_recovery_ongoing: false,
            impacted_by_update: false,
            tables,
            executor,
            state_tx,
        }
    }

    // ========================================
    // LIFECYCLE OPERATIONS
    // ========================================

    /// Start the instance and force-place it into `target`.
    ///
    /// Marking the instance running is idempotent. The placement bypasses
    /// trigger validation: starting is an ownership decision of the caller,
    /// not a request that the transition table may refuse.
    pub async fn start(&mut self, target: State) -> Result<(), SmError> {
        println!(
            "[StateMachine] {}: Start called (target: {})",
            self.name,
            target.as_str()
        );

        self.is_running = true;
        self.transition_to(target).await
    }

    /// Stop the instance: transition to Off and clear the running flag.
    ///
    /// A stopped instance reports success without side effects, so calling
    /// this twice is equivalent to calling it once.
    pub async fn stop(&mut self) -> Result<(), SmError> {
        println!("[StateMachine] {}: Stop called", self.name);

        if !self.is_running {
            return Ok(());
        }

        self.transition_to(State::Off).await?;
        self.is_running = false;
        Ok(())
    }

    /// Validated transition entry point.
    ///
    /// Guard order matters: an instance impacted by an update session
    /// rejects before the recovery guard, and both reject before the
    /// transition table is consulted. A rejection never mutates state.
    pub async fn request_transition(&mut self, trigger: u32) -> Result<(), SmError> {
        println!(
            "[StateMachine] {}: RequestTransition (trigger: {trigger})",
            self.name
        );

        if self.impacted_by_update {
            println!("[StateMachine] {}: Rejected - update in progress", self.name);
            return Err(SmError::UpdateInProgress);
        }

        if self.error_recovery_ongoing {
            println!("[StateMachine] {}: Rejected - recovery ongoing", self.name);
            return Err(SmError::RecoveryTransitionOngoing);
        }

        let Some(next) =
            TransitionTable::next_state(&self.tables, self.current_state, trigger, self.category)
        else {
            println!(
                "[StateMachine] {}: Rejected - no transition from {} for trigger {trigger}",
                self.name,
                self.current_state.as_str()
            );
            return Err(SmError::TransitionNotAllowed);
        };

        self.transition_to(next).await
    }

    /// React to an execution error reported by health monitoring.
    ///
    /// Ignored entirely while the instance is impacted by an update session:
    /// the affected machines are expected to be non-operational and their
    /// errors carry no meaning. The recovery flag blocks any transition
    /// request racing against the recovery transition.
    pub async fn handle_error_notification(&mut self, error: ExecutionError) {
        println!(
            "[StateMachine] {}: Error notification received ({error})",
            self.name
        );

        if self.impacted_by_update {
            println!("[StateMachine] {}: Error ignored - impacted by update", self.name);
            return;
        }

        self.error_recovery_ongoing = true;

        let recovery_state =
            ErrorRecoveryTable::recover(&self.tables, self.current_state, error, self.category);

        if recovery_state == self.current_state {
            // No recovery policy for this state: non-fatal no-op, the entry
            // actions must not re-run.
            println!(
                "[StateMachine] {}: No recovery configured, staying in {}",
                self.name,
                self.current_state.as_str()
            );
            self.error_recovery_ongoing = false;
            return;
        }

        if let Err(e) = self.transition_to(recovery_state).await {
            eprintln!(
                "[StateMachine] {}: Recovery transition to {} failed: {e}",
                self.name,
                recovery_state.as_str()
            );
        }

        self.error_recovery_ongoing = false;
    }

    // ========================================
    // FLAGS AND ACCESSORS
    // ========================================

    /// Mark or unmark this instance as part of an active update session.
    /// Set by the update-session collaborator, never derived internally.
    pub fn set_impacted_by_update(&mut self, impacted: bool) {
        self.impacted_by_update = impacted;
        println!(
            "[StateMachine] {}: Impacted by update: {}",
            self.name,
            if impacted { "YES" } else { "NO" }
        );
    }

    pub fn is_impacted_by_update(&self) -> bool {
        self.impacted_by_update
    }

    /// Published state name: the reserved transient name while a
    /// transition's action list executes, else the committed state's name
    pub fn current_state_name(&self) -> String {
        if self.is_in_transition {
            IN_TRANSITION_STATE_NAME.to_string()
        } else {
            self.current_state.as_str().to_string()
        }
    }

    /// Last committed state, never the transient sentinel
    pub fn current_state(&self) -> State {
        self.current_state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_in_transition(&self) -> bool {
        self.is_in_transition
    }

    /// Subscribe to published state names. Observers see the transient
    /// "inTransition" value exactly while an action list is executing.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.state_tx.subscribe()
    }

    // ========================================
    // INTERNAL TRANSITION
    // ========================================

    /// Execute the destination state's action list, then commit.
    ///
    /// The action list must complete before the new state is committed.
    /// On failure the committed state stays untouched and the caller
    /// receives `TransitionFailed`.
    async fn transition_to(&mut self, next: State) -> Result<(), SmError> {
        println!(
            "[StateMachine] {}: Transitioning {} -> {}",
            self.name,
            self.current_state.as_str(),
            next.as_str()
        );

        self.is_in_transition = true;
        let _ = self.state_tx.send(IN_TRANSITION_STATE_NAME.to_string());

        let outcome = self.run_entry_actions(next).await;

        self.is_in_transition = false;

        match outcome {
            Ok(()) => {
                self.current_state = next;
                let _ = self.state_tx.send(next.as_str().to_string());
                println!(
                    "[StateMachine] {}: Transition completed, now in {}",
                    self.name,
                    next.as_str()
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.state_tx.send(self.current_state.as_str().to_string());
                eprintln!(
                    "[StateMachine] {}: Action list for {} failed ({e}), staying in {}",
                    self.name,
                    next.as_str(),
                    self.current_state.as_str()
                );
                Err(SmError::TransitionFailed)
            }
        }
    }

    async fn run_entry_actions(&self, next: State) -> Result<(), SmError> {
        let Some(executor) = &self.executor else {
            println!(
                "[StateMachine] {}: No action executor attached, skipping actions",
                self.name
            );
            return Ok(());
        };

        let list = self
            .tables
            .for_category(self.category)
            .action_lists
            .iter()
            .find(|list| list.state == next);

        match list {
            Some(list) => executor.execute_list(&list.items).await,
            None => {
                // Entering a state with no configured list is a no-op.
                println!(
                    "[StateMachine] {}: No action list configured for {}",
                    self.name,
                    next.as_str()
                );
                Ok(())
            }
        }
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        println!("[StateMachine] Destroyed: {}", self.name);
    }
}
