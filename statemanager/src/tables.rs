/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Materialized rule tables
//!
//! In a deployed system these tables are generated from the machine
//! manifest; the engine only requires them as ordered, immutable in-memory
//! lists. This module provides the default configuration: one machine-wide
//! Controller and one Infotainment Agent.
//!
//! Table order is semantic. Transition resolution is first-match-wins and
//! recovery resolution remembers the last catch-all rule, so entries must
//! not be reordered casually.

use common::statemanagement::{
    exec_error, request, ActionItem, ActionKind, ActionList, CategoryTables, RecoveryRule,
    RuleTables, State, TransitionRule, EXECUTION_ERROR_ANY,
};

// Function group names
pub const MACHINE_FG: &str = "MachineFG";
pub const INFOTAINMENT_FG: &str = "InfotainmentFG";

// State machine instance names
pub const INFOTAINMENT_AGENT_NAME: &str = "InfotainmentAgent";

// Network handle names
pub const EXTERNAL_NETWORK: &str = "ExternalNetwork";

/// Build the default rule tables for both categories
pub fn default_tables() -> RuleTables {
    RuleTables {
        controller: controller_tables(),
        agent: agent_tables(),
    }
}

fn controller_tables() -> CategoryTables {
    let transitions = vec![
        // Normal operation flow
        TransitionRule {
            from: State::Initial,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        },
        TransitionRule {
            from: State::Running,
            trigger: request::GO_TO_SHUTDOWN,
            to: State::Shutdown,
        },
        TransitionRule {
            from: State::Running,
            trigger: request::GO_TO_OFF,
            to: State::Off,
        },
        TransitionRule {
            from: State::Shutdown,
            trigger: request::GO_TO_OFF,
            to: State::Off,
        },
        // Update flow
        TransitionRule {
            from: State::Running,
            trigger: request::PREPARE_UPDATE,
            to: State::PrepareUpdate,
        },
        TransitionRule {
            from: State::PrepareUpdate,
            trigger: request::VERIFY_UPDATE,
            to: State::VerifyUpdate,
        },
        TransitionRule {
            from: State::PrepareUpdate,
            trigger: request::RESTART,
            to: State::Restart,
        },
        TransitionRule {
            from: State::VerifyUpdate,
            trigger: request::AFTER_UPDATE,
            to: State::AfterUpdate,
        },
        TransitionRule {
            from: State::VerifyUpdate,
            trigger: request::PREPARE_ROLLBACK,
            to: State::PrepareRollback,
        },
        TransitionRule {
            from: State::PrepareRollback,
            trigger: request::AFTER_UPDATE,
            to: State::AfterUpdate,
        },
        TransitionRule {
            from: State::AfterUpdate,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        },
        // Continue update after a machine reset
        TransitionRule {
            from: State::ContinueUpdate,
            trigger: request::VERIFY_UPDATE,
            to: State::VerifyUpdate,
        },
        TransitionRule {
            from: State::ContinueUpdate,
            trigger: request::AFTER_UPDATE,
            to: State::AfterUpdate,
        },
    ];

    let recovery = vec![
        // Specific error handling
        RecoveryRule {
            from: State::Running,
            error: exec_error::CRASH,
            to: State::Restart,
        },
        RecoveryRule {
            from: State::Running,
            error: exec_error::SUPERVISION,
            to: State::Shutdown,
        },
        // Catch-all rules (mandatory per configured state)
        RecoveryRule {
            from: State::Running,
            error: EXECUTION_ERROR_ANY,
            to: State::Shutdown,
        },
        RecoveryRule {
            from: State::PrepareUpdate,
            error: EXECUTION_ERROR_ANY,
            to: State::PrepareRollback,
        },
        RecoveryRule {
            from: State::VerifyUpdate,
            error: EXECUTION_ERROR_ANY,
            to: State::PrepareRollback,
        },
    ];

    let action_lists = vec![
        ActionList {
            state: State::Initial,
            items: vec![
                ActionItem::with_target(ActionKind::SetFunctionGroupState, MACHINE_FG, "Startup"),
                ActionItem::sync(),
            ],
        },
        ActionList {
            state: State::Running,
            items: vec![
                ActionItem::with_target(ActionKind::SetFunctionGroupState, MACHINE_FG, "Running"),
                ActionItem::with_target(
                    ActionKind::StartStateMachine,
                    INFOTAINMENT_AGENT_NAME,
                    "Running",
                ),
                ActionItem::with_target(ActionKind::SetNetworkState, EXTERNAL_NETWORK, "FullCom"),
            ],
        },
        ActionList {
            state: State::Shutdown,
            items: vec![
                ActionItem {
                    kind: ActionKind::StopStateMachine,
                    target: Some(INFOTAINMENT_AGENT_NAME.to_string()),
                    parameter: None,
                    delay_ms: 0,
                },
                ActionItem::sync(),
                // Afterrun: keep the network up briefly for late traffic
                ActionItem::sleep(100),
                ActionItem::with_target(ActionKind::SetNetworkState, EXTERNAL_NETWORK, "NoCom"),
                ActionItem::sync(),
                ActionItem::with_target(ActionKind::SetFunctionGroupState, MACHINE_FG, "Shutdown"),
            ],
        },
        ActionList {
            state: State::PrepareUpdate,
            items: vec![
                ActionItem {
                    kind: ActionKind::StopStateMachine,
                    target: Some(INFOTAINMENT_AGENT_NAME.to_string()),
                    parameter: None,
                    delay_ms: 0,
                },
                ActionItem::sync(),
                ActionItem::with_target(ActionKind::SetFunctionGroupState, MACHINE_FG, "Update"),
            ],
        },
        ActionList {
            state: State::VerifyUpdate,
            items: vec![
                ActionItem::with_target(
                    ActionKind::StartStateMachine,
                    INFOTAINMENT_AGENT_NAME,
                    "VerifyUpdate",
                ),
                ActionItem::sync(),
                ActionItem::with_target(ActionKind::SetFunctionGroupState, MACHINE_FG, "Verify"),
            ],
        },
        ActionList {
            state: State::Off,
            items: vec![ActionItem::with_target(
                ActionKind::SetFunctionGroupState,
                MACHINE_FG,
                "Off",
            )],
        },
    ];

    CategoryTables {
        transitions,
        recovery,
        action_lists,
    }
}

fn agent_tables() -> CategoryTables {
    let transitions = vec![
        // Normal operation
        TransitionRule {
            from: State::Initial,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        },
        TransitionRule {
            from: State::Running,
            trigger: request::GO_TO_OFF,
            to: State::Off,
        },
        TransitionRule {
            from: State::Off,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        },
        // Update flow
        TransitionRule {
            from: State::Running,
            trigger: request::PREPARE_UPDATE,
            to: State::PrepareUpdate,
        },
        TransitionRule {
            from: State::PrepareUpdate,
            trigger: request::VERIFY_UPDATE,
            to: State::VerifyUpdate,
        },
        TransitionRule {
            from: State::VerifyUpdate,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        },
        TransitionRule {
            from: State::VerifyUpdate,
            trigger: request::PREPARE_ROLLBACK,
            to: State::PrepareRollback,
        },
        TransitionRule {
            from: State::PrepareRollback,
            trigger: request::GO_TO_OFF,
            to: State::Off,
        },
    ];

    let recovery = vec![
        RecoveryRule {
            from: State::Running,
            error: exec_error::CRASH,
            to: State::Off,
        },
        RecoveryRule {
            from: State::Running,
            error: EXECUTION_ERROR_ANY,
            to: State::Off,
        },
        RecoveryRule {
            from: State::VerifyUpdate,
            error: EXECUTION_ERROR_ANY,
            to: State::PrepareRollback,
        },
    ];

    let action_lists = vec![
        ActionList {
            state: State::Initial,
            items: vec![ActionItem::with_target(
                ActionKind::SetFunctionGroupState,
                INFOTAINMENT_FG,
                "Off",
            )],
        },
        ActionList {
            state: State::Running,
            items: vec![ActionItem::with_target(
                ActionKind::SetFunctionGroupState,
                INFOTAINMENT_FG,
                "Running",
            )],
        },
        ActionList {
            state: State::Off,
            items: vec![ActionItem::with_target(
                ActionKind::SetFunctionGroupState,
                INFOTAINMENT_FG,
                "Off",
            )],
        },
    ];

    CategoryTables {
        transitions,
        recovery,
        action_lists,
    }
}

/// Check the configuration invariants of a table set.
///
/// Returns a description per violation; the engine treats violations as
/// degraded configuration (the resolvers fall back safely), so callers log
/// the findings instead of aborting.
pub fn validate(tables: &RuleTables) -> Vec<String> {
    let mut findings = Vec::new();

    for (category, partition) in [("Controller", &tables.controller), ("Agent", &tables.agent)] {
        let mut states: Vec<State> = partition.recovery.iter().map(|r| r.from).collect();
        states.sort_by_key(|s| s.as_str());
        states.dedup();

        for state in states {
            let catch_alls = partition
                .recovery
                .iter()
                .filter(|r| r.from == state && r.error == EXECUTION_ERROR_ANY)
                .count();
            if catch_alls != 1 {
                findings.push(format!(
                    "{category}: state {} has {catch_alls} catch-all recovery rules, expected 1",
                    state.as_str()
                ));
            }
        }

        for list in &partition.action_lists {
            if list.items.is_empty() {
                findings.push(format!(
                    "{category}: empty action list configured for {}",
                    list.state.as_str()
                ));
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::statemanagement::Category;

    #[test]
    fn test_default_tables_pass_validation() {
        let findings = validate(&default_tables());
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn test_every_recovery_state_has_exactly_one_catch_all() {
        let tables = default_tables();
        for partition in [&tables.controller, &tables.agent] {
            for rule in &partition.recovery {
                let catch_alls = partition
                    .recovery
                    .iter()
                    .filter(|r| r.from == rule.from && r.error == EXECUTION_ERROR_ANY)
                    .count();
                assert_eq!(catch_alls, 1, "state {}", rule.from.as_str());
            }
        }
    }

    #[test]
    fn test_missing_catch_all_is_reported() {
        let mut tables = default_tables();
        tables
            .controller
            .recovery
            .retain(|r| !(r.from == State::Running && r.error == EXECUTION_ERROR_ANY));

        let findings = validate(&tables);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("Running"));
    }

    #[test]
    fn test_agent_tables_contain_no_machine_control_actions() {
        // Agents cannot start or stop other state machines.
        let tables = default_tables();
        for list in &tables.for_category(Category::Agent).action_lists {
            for item in &list.items {
                assert!(!matches!(
                    item.kind,
                    ActionKind::StartStateMachine | ActionKind::StopStateMachine
                ));
            }
        }
    }

    #[test]
    fn test_controller_update_path_is_fully_mapped() {
        let tables = default_tables();
        let find = |from: State, trigger: u32| {
            tables
                .controller
                .transitions
                .iter()
                .find(|r| r.from == from && r.trigger == trigger)
                .map(|r| r.to)
        };

        assert_eq!(
            find(State::Running, request::PREPARE_UPDATE),
            Some(State::PrepareUpdate)
        );
        assert_eq!(
            find(State::PrepareUpdate, request::VERIFY_UPDATE),
            Some(State::VerifyUpdate)
        );
        assert_eq!(
            find(State::VerifyUpdate, request::PREPARE_ROLLBACK),
            Some(State::PrepareRollback)
        );
        assert_eq!(
            find(State::PrepareRollback, request::AFTER_UPDATE),
            Some(State::AfterUpdate)
        );
        assert_eq!(
            find(State::AfterUpdate, request::GO_TO_RUNNING),
            Some(State::Running)
        );
    }
}
