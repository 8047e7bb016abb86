/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Transition request resolver
//!
//! Pure lookup over the ordered transition rule list of one category.
//! The resolver holds no state of its own; it borrows the shared rule
//! tables owned by the engine.
//!
//! Resolution is first-match-wins: when a configuration defect lists the
//! same `(from, trigger)` pair twice, the earlier rule governs. Absence of
//! a matching rule means the request is rejected by the caller - the
//! resolver reports it as an explicit `None` instead of echoing the input
//! state back.

use common::statemanagement::{Category, RuleTables, State};

pub struct TransitionTable;

impl TransitionTable {
    /// Check whether `trigger` is mapped for `from` in the category's table
    pub fn is_allowed(tables: &RuleTables, from: State, trigger: u32, category: Category) -> bool {
        Self::next_state(tables, from, trigger, category).is_some()
    }

    /// Resolve the destination state for `(from, trigger)`.
    ///
    /// Linear scan in table order, first match wins. Returns `None` when no
    /// rule maps the pair.
    pub fn next_state(
        tables: &RuleTables,
        from: State,
        trigger: u32,
        category: Category,
    ) -> Option<State> {
        tables
            .for_category(category)
            .transitions
            .iter()
            .find(|rule| rule.from == from && rule.trigger == trigger)
            .map(|rule| rule.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::statemanagement::{request, TransitionRule};

    fn sample_tables() -> RuleTables {
        let mut tables = RuleTables::default();
        tables.controller.transitions = vec![
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
            // Duplicate pair: only the first rule above may govern
            TransitionRule {
                from: State::Running,
                trigger: request::GO_TO_SHUTDOWN,
                to: State::Off,
            },
        ];
        tables.agent.transitions = vec![TransitionRule {
            from: State::Initial,
            trigger: request::GO_TO_RUNNING,
            to: State::Running,
        }];
        tables
    }

    #[test]
    fn test_allowed_iff_rule_exists() {
        let tables = sample_tables();

        assert!(TransitionTable::is_allowed(
            &tables,
            State::Initial,
            request::GO_TO_RUNNING,
            Category::Controller
        ));
        assert!(!TransitionTable::is_allowed(
            &tables,
            State::Initial,
            request::GO_TO_OFF,
            Category::Controller
        ));
        assert!(!TransitionTable::is_allowed(
            &tables,
            State::Off,
            request::GO_TO_RUNNING,
            Category::Controller
        ));
    }

    #[test]
    fn test_next_state_returns_rule_target() {
        let tables = sample_tables();

        assert_eq!(
            TransitionTable::next_state(
                &tables,
                State::Initial,
                request::GO_TO_RUNNING,
                Category::Controller
            ),
            Some(State::Running)
        );
    }

    #[test]
    fn test_unmapped_pair_is_explicit_none() {
        let tables = sample_tables();

        assert_eq!(
            TransitionTable::next_state(&tables, State::Shutdown, 9999, Category::Controller),
            None
        );
    }

    #[test]
    fn test_first_match_wins_on_duplicate_rules() {
        let tables = sample_tables();

        // Both (Running, GO_TO_SHUTDOWN) rules exist; table order governs.
        assert_eq!(
            TransitionTable::next_state(
                &tables,
                State::Running,
                request::GO_TO_SHUTDOWN,
                Category::Controller
            ),
            Some(State::Shutdown)
        );
    }

    #[test]
    fn test_categories_are_separate_partitions() {
        let tables = sample_tables();

        assert!(TransitionTable::is_allowed(
            &tables,
            State::Initial,
            request::GO_TO_RUNNING,
            Category::Agent
        ));
        assert!(!TransitionTable::is_allowed(
            &tables,
            State::Running,
            request::GO_TO_SHUTDOWN,
            Category::Agent
        ));
    }
}
