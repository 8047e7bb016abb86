/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Update session collaborator
//!
//! Tracks the single allowed update session and drives the Controller
//! through the update flow on behalf of an update client. The service owns
//! no state machine; every call borrows the Controller, so the manager loop
//! stays the single owner of all entry points.
//!
//! While a session is active the impacted flag on the Controller shields it
//! from ordinary transition requests and error notifications. The session
//! methods are the legitimate drivers during that window, so each one lifts
//! the flag for its own trigger and re-arms it afterwards.

use crate::state_machine::StateMachine;
use common::statemanagement::{request, SmError, UpdateAllowed, UpdateStatus};

pub struct UpdateRequestService {
    session_active: bool,
    update_allowed: UpdateAllowed,
    reset_status: UpdateStatus,
}

impl Default for UpdateRequestService {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRequestService {
    pub fn new() -> Self {
        Self {
            session_active: false,
            update_allowed: UpdateAllowed::default(),
            reset_status: UpdateStatus::Idle,
        }
    }

    // ========================================
    // SESSION LIFECYCLE
    // ========================================

    /// Open the update session.
    ///
    /// Only one session may exist at a time, and the platform must have
    /// granted update permission beforehand.
    pub fn request_update_session(&mut self) -> Result<(), SmError> {
        println!("[UpdateService] RequestUpdateSession");

        if self.session_active {
            println!("[UpdateService] Rejected - session already active");
            return Err(SmError::NotAllowedMultipleUpdateSessions);
        }

        if self.update_allowed != UpdateAllowed::Allowed {
            println!("[UpdateService] Rejected - update not allowed");
            return Err(SmError::OperationRejected);
        }

        self.session_active = true;
        self.reset_status = UpdateStatus::Idle;
        println!("[UpdateService] Session opened");
        Ok(())
    }

    /// Close the update session and return the Controller to normal
    /// operation via AfterUpdate. Calling without an active session is a
    /// successful no-op.
    pub async fn stop_update_session(
        &mut self,
        controller: &mut StateMachine,
    ) -> Result<(), SmError> {
        println!("[UpdateService] StopUpdateSession");

        if !self.session_active {
            return Ok(());
        }

        controller.set_impacted_by_update(false);
        if let Err(e) = controller.request_transition(request::AFTER_UPDATE).await {
            eprintln!("[UpdateService] AfterUpdate transition failed: {e}");
        }

        self.session_active = false;
        self.reset_status = UpdateStatus::Idle;
        println!("[UpdateService] Session closed");
        Ok(())
    }

    // ========================================
    // SESSION STEPS
    // ========================================

    /// Move the Controller into PrepareUpdate and mark it impacted.
    ///
    /// The flag is armed only after the transition succeeded; the machine
    /// must still accept the PrepareUpdate trigger.
    pub async fn prepare_update(
        &mut self,
        controller: &mut StateMachine,
        function_groups: &[String],
    ) -> Result<(), SmError> {
        println!(
            "[UpdateService] PrepareUpdate ({} function groups)",
            function_groups.len()
        );
        self.session_step(controller, function_groups, request::PREPARE_UPDATE)
            .await
    }

    /// Move the Controller into VerifyUpdate
    pub async fn verify_update(
        &mut self,
        controller: &mut StateMachine,
        function_groups: &[String],
    ) -> Result<(), SmError> {
        println!(
            "[UpdateService] VerifyUpdate ({} function groups)",
            function_groups.len()
        );
        self.session_step(controller, function_groups, request::VERIFY_UPDATE)
            .await
    }

    /// Move the Controller into PrepareRollback
    pub async fn prepare_rollback(
        &mut self,
        controller: &mut StateMachine,
        function_groups: &[String],
    ) -> Result<(), SmError> {
        println!(
            "[UpdateService] PrepareRollback ({} function groups)",
            function_groups.len()
        );
        self.session_step(controller, function_groups, request::PREPARE_ROLLBACK)
            .await
    }

    /// Request a machine reset, fire-and-forget.
    ///
    /// The outcome is not returned to the caller; it is recorded in the
    /// reset-machine status field for the client to poll.
    pub async fn reset_machine(&mut self, controller: &mut StateMachine) {
        println!("[UpdateService] ResetMachine");

        if !self.session_active {
            println!("[UpdateService] ResetMachine rejected - no active session");
            self.reset_status = UpdateStatus::Rejected;
            return;
        }

        self.reset_status = match self.guarded_transition(controller, request::RESTART).await {
            Ok(()) => UpdateStatus::Successful,
            Err(_) => UpdateStatus::Failed,
        };
        println!(
            "[UpdateService] ResetMachine finished ({:?})",
            self.reset_status
        );
    }

    // ========================================
    // ACCESSORS
    // ========================================

    pub fn set_update_allowed(&mut self, allowed: UpdateAllowed) {
        println!("[UpdateService] Update allowed: {allowed:?}");
        self.update_allowed = allowed;
    }

    pub fn reset_machine_status(&self) -> UpdateStatus {
        self.reset_status
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    // ========================================
    // INTERNAL
    // ========================================

    async fn session_step(
        &mut self,
        controller: &mut StateMachine,
        function_groups: &[String],
        trigger: u32,
    ) -> Result<(), SmError> {
        if !self.session_active {
            println!("[UpdateService] Rejected - no active session");
            return Err(SmError::OperationRejected);
        }

        if function_groups.is_empty() {
            println!("[UpdateService] Rejected - empty function group list");
            return Err(SmError::InvalidValue);
        }

        self.guarded_transition(controller, trigger)
            .await
            .map_err(|e| {
                eprintln!("[UpdateService] Transition failed: {e}");
                SmError::OperationFailed
            })
    }

    /// Lift the impacted guard for the service's own trigger, re-arm it on
    /// success, restore the previous value on failure
    async fn guarded_transition(
        &self,
        controller: &mut StateMachine,
        trigger: u32,
    ) -> Result<(), SmError> {
        let was_impacted = controller.is_impacted_by_update();
        controller.set_impacted_by_update(false);

        let result = controller.request_transition(trigger).await;

        controller.set_impacted_by_update(result.is_ok() || was_impacted);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;
    use common::statemanagement::{Category, State};
    use std::sync::Arc;

    fn controller() -> StateMachine {
        StateMachine::new(
            "TestController",
            Category::Controller,
            Arc::new(tables::default_tables()),
            None,
        )
    }

    fn open_service() -> UpdateRequestService {
        let mut service = UpdateRequestService::new();
        service.set_update_allowed(UpdateAllowed::Allowed);
        service.request_update_session().unwrap();
        service
    }

    fn fgs() -> Vec<String> {
        vec!["MachineFG".to_string()]
    }

    #[test]
    fn test_session_rejected_while_update_not_allowed() {
        let mut service = UpdateRequestService::new();
        assert_eq!(
            service.request_update_session(),
            Err(SmError::OperationRejected)
        );
        assert!(!service.is_session_active());
    }

    #[test]
    fn test_second_session_is_rejected() {
        let mut service = open_service();
        assert_eq!(
            service.request_update_session(),
            Err(SmError::NotAllowedMultipleUpdateSessions)
        );
        assert!(service.is_session_active());
    }

    #[tokio::test]
    async fn test_steps_rejected_outside_a_session() {
        let mut service = UpdateRequestService::new();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        let result = service.prepare_update(&mut sm, &fgs()).await;
        assert_eq!(result, Err(SmError::OperationRejected));
        assert_eq!(sm.current_state(), State::Running);
    }

    #[tokio::test]
    async fn test_empty_function_group_list_is_invalid() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        let result = service.prepare_update(&mut sm, &[]).await;
        assert_eq!(result, Err(SmError::InvalidValue));
        assert_eq!(sm.current_state(), State::Running);
        assert!(!sm.is_impacted_by_update());
    }

    #[tokio::test]
    async fn test_prepare_update_transitions_then_marks_impacted() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.prepare_update(&mut sm, &fgs()).await.unwrap();
        assert_eq!(sm.current_state(), State::PrepareUpdate);
        assert!(sm.is_impacted_by_update());
    }

    #[tokio::test]
    async fn test_full_session_flow() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.prepare_update(&mut sm, &fgs()).await.unwrap();
        service.verify_update(&mut sm, &fgs()).await.unwrap();
        assert_eq!(sm.current_state(), State::VerifyUpdate);
        assert!(sm.is_impacted_by_update());

        service.stop_update_session(&mut sm).await.unwrap();
        assert_eq!(sm.current_state(), State::AfterUpdate);
        assert!(!sm.is_impacted_by_update());
        assert!(!service.is_session_active());
        assert_eq!(service.reset_machine_status(), UpdateStatus::Idle);
    }

    #[tokio::test]
    async fn test_rollback_path() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.prepare_update(&mut sm, &fgs()).await.unwrap();
        service.verify_update(&mut sm, &fgs()).await.unwrap();
        service.prepare_rollback(&mut sm, &fgs()).await.unwrap();
        assert_eq!(sm.current_state(), State::PrepareRollback);
        assert!(sm.is_impacted_by_update());
    }

    #[tokio::test]
    async fn test_unmapped_step_surfaces_operation_failed() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        // VerifyUpdate has no rule from Running.
        let result = service.verify_update(&mut sm, &fgs()).await;
        assert_eq!(result, Err(SmError::OperationFailed));
        assert_eq!(sm.current_state(), State::Running);
        assert!(!sm.is_impacted_by_update());
    }

    #[tokio::test]
    async fn test_failed_step_keeps_impacted_guard_armed() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.prepare_update(&mut sm, &fgs()).await.unwrap();
        // PrepareRollback has no rule from PrepareUpdate.
        let result = service.prepare_rollback(&mut sm, &fgs()).await;
        assert_eq!(result, Err(SmError::OperationFailed));
        assert_eq!(sm.current_state(), State::PrepareUpdate);
        assert!(sm.is_impacted_by_update());
    }

    #[tokio::test]
    async fn test_reset_machine_status_lifecycle() {
        let mut service = UpdateRequestService::new();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.reset_machine(&mut sm).await;
        assert_eq!(service.reset_machine_status(), UpdateStatus::Rejected);

        service.set_update_allowed(UpdateAllowed::Allowed);
        service.request_update_session().unwrap();
        assert_eq!(service.reset_machine_status(), UpdateStatus::Idle);

        service.prepare_update(&mut sm, &fgs()).await.unwrap();
        service.reset_machine(&mut sm).await;
        assert_eq!(service.reset_machine_status(), UpdateStatus::Successful);
        assert_eq!(sm.current_state(), State::Restart);
    }

    #[tokio::test]
    async fn test_reset_machine_failure_is_recorded() {
        let mut service = open_service();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        // Restart has no rule from Running.
        service.reset_machine(&mut sm).await;
        assert_eq!(service.reset_machine_status(), UpdateStatus::Failed);
        assert_eq!(sm.current_state(), State::Running);
    }

    #[tokio::test]
    async fn test_stop_without_session_is_a_no_op() {
        let mut service = UpdateRequestService::new();
        let mut sm = controller();
        sm.start(State::Running).await.unwrap();

        service.stop_update_session(&mut sm).await.unwrap();
        assert_eq!(sm.current_state(), State::Running);
        assert!(!service.is_session_active());
    }
}
