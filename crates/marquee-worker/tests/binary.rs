#![cfg(unix)]

use std::process::{Command, Output};

use anyhow::Result;
use httpmock::prelude::*;
use marquee_core::WorkerOutcome;
use serde_json::json;
use uuid::Uuid;

fn worker_command() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_marquee-worker"));
    command.env_clear();
    command
}

fn terminal_outcome(output: &Output) -> Result<WorkerOutcome> {
    let stdout = String::from_utf8(output.stdout.clone())?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "stdout must carry exactly one line: {stdout:?}");
    Ok(WorkerOutcome::from_line(lines[0])?)
}

#[test]
fn invalid_invocation_still_emits_terminal_message() -> Result<()> {
    let output = worker_command().arg("--title").arg("only").output()?;
    assert!(!output.status.success());
    assert_eq!(
        terminal_outcome(&output)?,
        WorkerOutcome::error("invalid invocation")
    );
    Ok(())
}

#[test]
fn rejected_uploader_identity_reports_connect_failure() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/botUPLOADER/getMe");
        then.status(401).json_body(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        }));
    });
    let scratch = tempfile::tempdir()?;

    let output = worker_command()
        .env("UPLOADER_TOKEN", "UPLOADER")
        .env("STORAGE_CHANNEL_ID", "-100200300")
        .env("DATABASE_URL", "postgres://marquee@127.0.0.1:1/marquee")
        .env("TELEGRAM_API_URL", server.base_url())
        .env("DOWNLOAD_DIR", scratch.path())
        .env("LOG_FORMAT", "pretty")
        .args([
            "--job-id",
            &Uuid::new_v4().to_string(),
            "--requester",
            "-77",
            "--title",
            "Heat 1995",
            "--locator",
            &format!("magnet:?xt=urn:btih:{}", "e".repeat(40)),
        ])
        .current_dir(scratch.path())
        .output()?;

    assert!(!output.status.success());
    assert_eq!(
        terminal_outcome(&output)?,
        WorkerOutcome::error("connect failed: Unauthorized")
    );
    Ok(())
}
