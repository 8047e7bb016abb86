/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error recovery resolver
//!
//! Maps an execution error reported by the health-monitoring collaborator to
//! the state the machine should recover into. Resolution runs as a single
//! scan over the category's recovery rule list with a two-level tie-break:
//!
//! 1. an exact `(from, error)` match returns immediately, regardless of its
//!    position in the table;
//! 2. otherwise the last-seen catch-all rule (`EXECUTION_ERROR_ANY`) for
//!    `from` is used after the scan completes;
//! 3. with neither present the resolver returns `from` unchanged - errors in
//!    states without a configured recovery policy are non-fatal no-ops.
//!
//! The missing-catch-all case is a configuration defect; it is handled by
//! the identity fallback, never raised at runtime.

use common::statemanagement::{
    Category, ExecutionError, RuleTables, State, EXECUTION_ERROR_ANY,
};

pub struct ErrorRecoveryTable;

impl ErrorRecoveryTable {
    /// Resolve the recovery state for `(from, error)` in the category's table
    pub fn recover(
        tables: &RuleTables,
        from: State,
        error: ExecutionError,
        category: Category,
    ) -> State {
        let mut catch_all = from;

        for rule in &tables.for_category(category).recovery {
            if rule.from != from {
                continue;
            }
            if rule.error == error {
                println!(
                    "[ErrorRecovery] Exact match: state={} error={} -> {}",
                    from.as_str(),
                    error,
                    rule.to.as_str()
                );
                return rule.to;
            }
            if rule.error == EXECUTION_ERROR_ANY {
                catch_all = rule.to;
            }
        }

        println!(
            "[ErrorRecovery] No exact match for state={} error={}, recovering to {}",
            from.as_str(),
            error,
            catch_all.as_str()
        );
        catch_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::statemanagement::{exec_error, RecoveryRule};

    fn sample_tables() -> RuleTables {
        let mut tables = RuleTables::default();
        tables.controller.recovery = vec![
            // Catch-all listed before the exact rule on purpose: the exact
            // rule must still win.
            RecoveryRule {
                from: State::Running,
                error: EXECUTION_ERROR_ANY,
                to: State::Shutdown,
            },
            RecoveryRule {
                from: State::Running,
                error: exec_error::CRASH,
                to: State::Restart,
            },
            // Second catch-all for the same state: last-seen wins.
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
        tables.agent.recovery = vec![RecoveryRule {
            from: State::Running,
            error: EXECUTION_ERROR_ANY,
            to: State::Off,
        }];
        tables
    }

    #[test]
    fn test_exact_match_wins_regardless_of_position() {
        let tables = sample_tables();

        let state = ErrorRecoveryTable::recover(
            &tables,
            State::Running,
            exec_error::CRASH,
            Category::Controller,
        );
        assert_eq!(state, State::Restart);
    }

    #[test]
    fn test_last_catch_all_wins_for_unmapped_error() {
        let tables = sample_tables();

        let state =
            ErrorRecoveryTable::recover(&tables, State::Running, 0x1234_5678, Category::Controller);
        // Two ANY rules exist for Running; the later one governs.
        assert_eq!(state, State::Off);
    }

    #[test]
    fn test_catch_all_used_for_update_verification() {
        let tables = sample_tables();

        let state = ErrorRecoveryTable::recover(
            &tables,
            State::VerifyUpdate,
            exec_error::TIMEOUT,
            Category::Controller,
        );
        assert_eq!(state, State::PrepareRollback);
    }

    #[test]
    fn test_no_rule_falls_back_to_current_state() {
        let tables = sample_tables();

        let state = ErrorRecoveryTable::recover(
            &tables,
            State::AfterUpdate,
            exec_error::GENERIC,
            Category::Controller,
        );
        assert_eq!(state, State::AfterUpdate);
    }

    #[test]
    fn test_agent_partition_is_consulted_for_agents() {
        let tables = sample_tables();

        let state = ErrorRecoveryTable::recover(
            &tables,
            State::Running,
            exec_error::CRASH,
            Category::Agent,
        );
        assert_eq!(state, State::Off);

        // Agent table has no VerifyUpdate rules at all
        let state = ErrorRecoveryTable::recover(
            &tables,
            State::VerifyUpdate,
            exec_error::CRASH,
            Category::Agent,
        );
        assert_eq!(state, State::VerifyUpdate);
    }
}
