// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waygate status` command implementation.
//!
//! Reads the gateway database directly and summarizes session state and
//! the outbound queue. Works whether or not a serve process is running.

use std::io::IsTerminal;

use serde::Serialize;
use waygate_config::WaygateConfig;
use waygate_core::{SessionStatus, WaygateError};
use waygate_storage::Database;
use waygate_storage::queries::{messages, sessions};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub sessions: Vec<SessionLine>,
    pub pending_outbound: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionLine {
    pub session_id: String,
    pub name: String,
    pub status: String,
    pub phone_number: Option<String>,
    pub last_active: String,
}

/// Run the `waygate status` command.
pub async fn run_status(
    config: &WaygateConfig,
    json: bool,
    plain: bool,
) -> Result<(), WaygateError> {
    let db = Database::open(&config.storage.database_path).await?;

    let sessions = sessions::list_sessions(&db, None).await?;
    let pending = messages::pending_outbound(&db).await?;

    let report = StatusReport {
        sessions: sessions
            .iter()
            .map(|s| SessionLine {
                session_id: s.id.0.clone(),
                name: s.name.clone(),
                status: s.status.to_string(),
                phone_number: s.phone_number.clone(),
                last_active: s.last_active.clone(),
            })
            .collect(),
        pending_outbound: pending.len(),
    };
    db.close().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }
    Ok(())
}

fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  waygate status");
    println!("  {}", "-".repeat(60));

    if report.sessions.is_empty() {
        println!("    no sessions");
    }
    for line in &report.sessions {
        let status = colorize_status(&line.status, use_color);
        println!(
            "    {:<12} {:<16} {:<12} {}",
            line.session_id,
            line.name,
            status,
            line.phone_number.as_deref().unwrap_or("-")
        );
    }

    println!();
    println!("    pending outbound: {}", report.pending_outbound);
    println!();
}

fn colorize_status(status: &str, use_color: bool) -> String {
    if !use_color {
        return status.to_string();
    }
    use colored::Colorize;
    match status.parse::<SessionStatus>() {
        Ok(SessionStatus::Connected) => status.green().to_string(),
        Ok(SessionStatus::LoggedOut) | Ok(SessionStatus::Disconnected) => {
            status.red().to_string()
        }
        _ => status.yellow().to_string(),
    }
}
