/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Core data model for State Management
//!
//! Defines the closed set of state machine states, the machine categories,
//! the record shapes of the three rule tables (transitions, error recovery,
//! action lists) and the error domain returned by the public operations.
//!
//! Rule tables are ordered, immutable lists. Order matters: the transition
//! resolver is first-match-wins and the recovery resolver remembers the
//! last-seen catch-all rule, so the table shapes here must preserve
//! insertion order.

use thiserror::Error;

// ========================================
// STATES AND CATEGORIES
// ========================================

/// Reserved state name published while a transition's action list executes.
///
/// This value must never be used as a configured state name.
pub const IN_TRANSITION_STATE_NAME: &str = "inTransition";

/// States a state machine instance can commit to.
///
/// The transient "inTransition" condition is not part of this set - it is
/// only observable through the published state name while an action list
/// is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    Off,
    Running,
    Shutdown,
    Restart,
    PrepareUpdate,
    VerifyUpdate,
    PrepareRollback,
    ContinueUpdate,
    AfterUpdate,
}

impl State {
    /// Convert State to its published string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Initial => "Initial",
            State::Off => "Off",
            State::Running => "Running",
            State::Shutdown => "Shutdown",
            State::Restart => "Restart",
            State::PrepareUpdate => "PrepareUpdate",
            State::VerifyUpdate => "VerifyUpdate",
            State::PrepareRollback => "PrepareRollback",
            State::ContinueUpdate => "ContinueUpdate",
            State::AfterUpdate => "AfterUpdate",
        }
    }

    /// Parse a configured state name
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "Initial" => Some(State::Initial),
            "Off" => Some(State::Off),
            "Running" => Some(State::Running),
            "Shutdown" => Some(State::Shutdown),
            "Restart" => Some(State::Restart),
            "PrepareUpdate" => Some(State::PrepareUpdate),
            "VerifyUpdate" => Some(State::VerifyUpdate),
            "PrepareRollback" => Some(State::PrepareRollback),
            "ContinueUpdate" => Some(State::ContinueUpdate),
            "AfterUpdate" => Some(State::AfterUpdate),
            _ => None,
        }
    }
}

/// Role of a state machine instance.
///
/// Exactly one Controller exists per machine; it manages the machine-wide
/// function group and may start/stop Agent instances. Agents manage a subset
/// of function groups and cannot control other instances. The category is
/// immutable for the lifetime of an instance and selects which rule-table
/// partition is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Controller,
    Agent,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Controller => "Controller",
            Category::Agent => "Agent",
        }
    }
}

// ========================================
// TRANSITION REQUEST VALUES
// ========================================

/// Transition request values accepted by `request_transition`.
///
/// The values are project configuration, not an enum: callers hand in a raw
/// trigger and the transition table decides whether it means anything in the
/// current state.
pub mod request {
    pub const GO_TO_RUNNING: u32 = 1;
    pub const GO_TO_SHUTDOWN: u32 = 2;
    pub const GO_TO_OFF: u32 = 3;
    pub const RESTART: u32 = 4;

    // Update session flow
    pub const PREPARE_UPDATE: u32 = 100;
    pub const VERIFY_UPDATE: u32 = 101;
    pub const PREPARE_ROLLBACK: u32 = 102;
    pub const AFTER_UPDATE: u32 = 103;
    pub const CONTINUE_UPDATE: u32 = 104;
}

// ========================================
// EXECUTION ERRORS
// ========================================

/// Execution error code reported by the health-monitoring collaborator.
pub type ExecutionError = u32;

/// Catch-all sentinel for error recovery rules.
///
/// Each recovery table entry set for a given state is expected to contain
/// exactly one rule carrying this value; it maps every error code not
/// explicitly listed for that state.
pub const EXECUTION_ERROR_ANY: ExecutionError = 0xFFFF_FFFF;

/// Well-known execution error codes
pub mod exec_error {
    pub const GENERIC: u32 = 1;
    pub const SUPERVISION: u32 = 2;
    pub const CRASH: u32 = 3;
    pub const TIMEOUT: u32 = 4;
}

// ========================================
// ERROR DOMAIN
// ========================================

/// Error codes surfaced by the public State Management operations.
///
/// Expected-failure paths always return one of these; nothing in the engine
/// panics on a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SmError {
    #[error("invalid value - not mapped in the transition request table")]
    InvalidValue,
    #[error("multiple update sessions not allowed - session already active")]
    NotAllowedMultipleUpdateSessions,
    #[error("operation canceled by newer request")]
    OperationCanceled,
    #[error("operation failed during execution")]
    OperationFailed,
    #[error("operation rejected due to State Management internal state")]
    OperationRejected,
    #[error("error recovery in progress - transition not allowed")]
    RecoveryTransitionOngoing,
    #[error("state transition failed during action list processing")]
    TransitionFailed,
    #[error("transition not allowed from current state")]
    TransitionNotAllowed,
    #[error("update session in progress - state machine is impacted by update")]
    UpdateInProgress,
}

// ========================================
// NETWORK MANAGEMENT
// ========================================

/// Communication state requested from Network Management
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// No communication should be possible
    NoCom,
    /// Full communication should be possible
    FullCom,
}

impl NetworkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkState::NoCom => "NoCom",
            NetworkState::FullCom => "FullCom",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "NoCom" => Some(NetworkState::NoCom),
            "FullCom" => Some(NetworkState::FullCom),
            _ => None,
        }
    }
}

// ========================================
// UPDATE SESSION TYPES
// ========================================

/// Outcome of the fire-and-forget reset-machine operation, published to the
/// update collaborator instead of a return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    /// No request was performed (default)
    #[default]
    Idle,
    /// Operation was requested outside of an update session
    Rejected,
    /// Processing successfully finished
    Successful,
    /// Processing failed
    Failed,
}

/// Whether an update session may be started, set by the control application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateAllowed {
    Allowed,
    #[default]
    NotAllowed,
}

// ========================================
// RULE TABLE RECORDS
// ========================================

/// One row of a transition request table: `(from, trigger) -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: State,
    pub trigger: u32,
    pub to: State,
}

/// One row of an error recovery table: `(from, error) -> to`.
///
/// `error == EXECUTION_ERROR_ANY` marks the catch-all rule for `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryRule {
    pub from: State,
    pub error: ExecutionError,
    pub to: State,
}

/// Side effect kinds an action list can request on state entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Request a function group to enter a named state
    SetFunctionGroupState,
    /// Start (or create) a nested state machine, optionally pinning its
    /// initial state. Only meaningful for Controller action lists.
    StartStateMachine,
    /// Ask a nested state machine to stop; the nested instance transitions
    /// itself to Off before being torn down.
    StopStateMachine,
    /// Barrier: wait for all previously issued actions in this list
    Sync,
    /// Suspend before the next action (afterrun delays)
    Sleep,
    /// Request a network handle communication state (FullCom / NoCom)
    SetNetworkState,
}

/// A single entry of an action list.
///
/// `target` and `parameter` are required for every kind except Sync and
/// Sleep; `delay_ms` is meaningful only for Sleep. An entry with a missing
/// target for a target-requiring kind terminates the list early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionItem {
    pub kind: ActionKind,
    pub target: Option<String>,
    pub parameter: Option<String>,
    pub delay_ms: u64,
}

impl ActionItem {
    /// Shorthand for entries that carry a target and a parameter
    pub fn with_target(kind: ActionKind, target: &str, parameter: &str) -> Self {
        Self {
            kind,
            target: Some(target.to_string()),
            parameter: Some(parameter.to_string()),
            delay_ms: 0,
        }
    }

    /// Barrier entry
    pub fn sync() -> Self {
        Self {
            kind: ActionKind::Sync,
            target: None,
            parameter: None,
            delay_ms: 0,
        }
    }

    /// Sleep entry
    pub fn sleep(delay_ms: u64) -> Self {
        Self {
            kind: ActionKind::Sleep,
            target: None,
            parameter: None,
            delay_ms,
        }
    }
}

/// Ordered action list executed when entering `state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionList {
    pub state: State,
    pub items: Vec<ActionItem>,
}

/// Rule tables of one category partition.
///
/// All three lists are read-only after construction; the engine shares them
/// across instances without locking.
#[derive(Debug, Clone, Default)]
pub struct CategoryTables {
    pub transitions: Vec<TransitionRule>,
    pub recovery: Vec<RecoveryRule>,
    pub action_lists: Vec<ActionList>,
}

/// Complete rule configuration, one partition per category
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    pub controller: CategoryTables,
    pub agent: CategoryTables,
}

impl RuleTables {
    /// Partition for the given category
    pub fn for_category(&self, category: Category) -> &CategoryTables {
        match category {
            Category::Controller => &self.controller,
            Category::Agent => &self.agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(State::from_str("Running"), Some(State::Running));
        assert_eq!(State::from_str("PrepareRollback"), Some(State::PrepareRollback));
        assert_eq!(State::from_str("inTransition"), None);
        assert_eq!(State::from_str("unknown"), None);

        assert_eq!(State::Running.as_str(), "Running");
        assert_eq!(State::AfterUpdate.as_str(), "AfterUpdate");
    }

    #[test]
    fn test_reserved_name_is_not_a_state() {
        assert!(State::from_str(IN_TRANSITION_STATE_NAME).is_none());
    }

    #[test]
    fn test_network_state_conversion() {
        assert_eq!(NetworkState::from_str("FullCom"), Some(NetworkState::FullCom));
        assert_eq!(NetworkState::from_str("NoCom"), Some(NetworkState::NoCom));
        assert_eq!(NetworkState::from_str("HalfCom"), None);
    }

    #[test]
    fn test_action_item_constructors() {
        let item = ActionItem::with_target(ActionKind::SetFunctionGroupState, "MachineFG", "Running");
        assert_eq!(item.target.as_deref(), Some("MachineFG"));
        assert_eq!(item.parameter.as_deref(), Some("Running"));
        assert_eq!(item.delay_ms, 0);

        let sync = ActionItem::sync();
        assert_eq!(sync.kind, ActionKind::Sync);
        assert!(sync.target.is_none());

        let sleep = ActionItem::sleep(250);
        assert_eq!(sleep.kind, ActionKind::Sleep);
        assert_eq!(sleep.delay_ms, 250);
    }

    #[test]
    fn test_rule_tables_category_partition() {
        let mut tables = RuleTables::default();
        tables.controller.transitions.push(TransitionRule {
            from: State::Initial,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        });

        assert_eq!(tables.for_category(Category::Controller).transitions.len(), 1);
        assert!(tables.for_category(Category::Agent).transitions.is_empty());
    }

    #[test]
    fn test_sm_error_display() {
        let message = SmError::TransitionNotAllowed.to_string();
        assert!(message.contains("not allowed"));
        assert_eq!(SmError::UpdateInProgress, SmError::UpdateInProgress);
    }
}
