/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! StateManager main entry point
//!
//! Sets up the asynchronous runtime, assembles the StateManager engine and
//! runs its processing loop until the request channel closes or a
//! termination signal arrives. All external entry points of the service
//! funnel into one mpsc channel, keeping the engine the single owner of
//! every state machine instance.

use std::env;
use tokio::sync::mpsc::{channel, Receiver, Sender};

pub mod action_executor;
pub mod error_recovery;
pub mod manager;
pub mod state_machine;
pub mod tables;
pub mod transition_table;
pub mod update_service;

use manager::SmRequest;

/// Launches the StateManagerManager in an asynchronous task.
///
/// Creates the engine, initializes the Controller, and runs the main
/// processing loop. Initialization and runtime errors are logged; the
/// function returns instead of panicking so the rest of the process can
/// shut down gracefully.
async fn launch_manager(rx: Receiver<SmRequest>) {
    // In test builds or when `STATEMANAGER_TEST_MODE` is set we
    // short-circuit heavy startup
    if cfg!(test) || env::var("STATEMANAGER_TEST_MODE").is_ok() {
        println!("Test mode: skipping StateManagerManager startup");
        return;
    }
    println!("=== StateManagerManager Starting ===");

    let mut manager = manager::StateManagerManager::new(rx).await;

    match manager.initialize().await {
        Ok(_) => {
            println!("StateManagerManager initialization completed successfully");

            if let Err(e) = manager.run().await {
                eprintln!("StateManagerManager stopped with error: {e:?}");
            } else {
                println!("StateManagerManager stopped gracefully");
            }
        }
        Err(e) => {
            eprintln!("Failed to initialize StateManagerManager: {e:?}");
            eprintln!("StateManager service cannot start - check configuration");
        }
    }

    println!("=== StateManagerManager Stopped ===");
}

/// Forwards a termination signal to the engine as a Shutdown request.
///
/// Dropping the sender afterwards lets the processing loop drain and exit
/// even when the Shutdown message could not be delivered.
async fn watch_for_shutdown(tx: Sender<SmRequest>) {
    if cfg!(test) || env::var("STATEMANAGER_TEST_MODE").is_ok() {
        println!("Test mode: skipping shutdown signal watcher");
        return;
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            println!("Termination signal received, requesting shutdown");
            if tx.send(SmRequest::Shutdown).await.is_err() {
                eprintln!("Engine already stopped, nothing to shut down");
            }
        }
        Err(e) => {
            eprintln!("Failed to listen for termination signal: {e:?}");
        }
    }
}

/// Main entry point for the StateManager service.
///
/// Wires the request channel between the signal watcher and the engine,
/// then runs both concurrently until shutdown.
#[tokio::main]
async fn main() {
    println!("========================================");
    println!("            StateManager                ");
    println!("========================================");
    println!("Starting StateManager service...");

    let settings = common::setting::get_config();
    println!(
        "Controller instance: {} (auto_running: {})",
        settings.machine.controller_name, settings.machine.auto_running
    );

    // Buffer size of 100 matches the expected burst of transition requests
    // without unbounded memory growth
    let (tx, rx) = channel::<SmRequest>(100);

    let manager_task = launch_manager(rx);
    let shutdown_task = watch_for_shutdown(tx);

    tokio::join!(manager_task, shutdown_task);

    println!("========================================");
    println!("      StateManager Service Stopped      ");
    println!("========================================");
}
