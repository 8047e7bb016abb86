/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Shared definitions for the State Management service
//!
//! This crate carries the data model used by every component of the service:
//! state machine states and categories, rule record shapes, the error domain
//! surfaced to callers, and the settings loader. It deliberately contains no
//! behavior beyond conversions - the execution logic lives in the
//! `statemanager` crate.

pub mod setting;
pub mod statemanagement;

/// Common result type used for service-level plumbing (channel wiring,
/// configuration, collaborator back ends). Engine operations with a defined
/// failure taxonomy return `Result<_, SmError>` instead.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync + 'static>>;
