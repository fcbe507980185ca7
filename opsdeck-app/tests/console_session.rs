#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use opsdeck_app::config::AppConfig;
use opsdeck_app::{build_service, Console};
use opsdeck_dispatch::InvocationContext;
use opsdeck_interfaces::MemoryInterface;
use opsdeck_policy::Role;
use std::sync::Arc;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> AppConfig {
    AppConfig {
        audit_log: Some(dir.path().join("audit").join("opsdeck.jsonl")),
        ..AppConfig::default()
    }
}

async fn run_session(config: &AppConfig, context: InvocationContext, lines: &[&str]) -> Arc<MemoryInterface> {
    let service = Arc::new(build_service(config).unwrap());
    let ui = Arc::new(MemoryInterface::new(lines.iter().copied()));
    Console::new(service, ui.clone(), context).run().await;
    ui
}

#[tokio::test]
async fn test_session_runs_commands_and_stops_at_exit() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let ui = run_session(
        &config,
        InvocationContext::console("dee", Role::Dc),
        &[r#"pov_create customer="Acme Corp""#, "exit", "pov_list"],
    )
    .await;

    let transcript = ui.transcript();
    assert!(transcript.starts_with("status: dee signed in as dc"));
    assert!(transcript.contains(r#"pov create --interactive --customer \"Acme Corp\""#));
    assert!(!transcript.contains("pov list"));
}

#[tokio::test]
async fn test_denials_are_shown_and_audited() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let ui = run_session(
        &config,
        InvocationContext::console("ana", Role::Analyst),
        &["scenario_deploy scenarioId=s1", "no_such_command", "pov_create Acme"],
    )
    .await;

    let errors: Vec<String> = ui.output().into_iter().filter(|l| l.starts_with("error: ")).collect();
    assert_eq!(errors.len(), 3);

    let lines = std::fs::read_to_string(config.audit_log.as_ref().unwrap()).unwrap();
    // The malformed line never reaches dispatch
    assert_eq!(lines.lines().count(), 2);
    assert!(lines.lines().all(|l| l.contains("\"allowed\":false")));
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    run_session(&config, InvocationContext::console("dee", Role::Dc), &["pov_list", "trr_list"]).await;

    let ui = run_session(
        &config,
        InvocationContext::console("dee", Role::Dc),
        &["history 5", "stats"],
    )
    .await;

    let transcript = ui.transcript();
    assert!(transcript.contains("trr_list"));
    assert!(transcript.contains("pov_list"));
    let trr = transcript.find("trr_list").unwrap();
    let pov = transcript.find("pov_list").unwrap();
    assert!(trr < pov, "history is newest first");
}

#[tokio::test]
async fn test_search_and_help_respect_role() {
    let dir = TempDir::new().unwrap();
    let ui = run_session(
        &config_in(&dir),
        InvocationContext::console("ana", Role::Analyst),
        &["search scenario", "help", "whoami"],
    )
    .await;

    let transcript = ui.transcript();
    assert!(transcript.contains("no commands match 'scenario'"));
    assert!(transcript.contains("commands available to analyst"));
    assert!(transcript.contains("ana (analyst) session"));
    assert!(transcript.contains("[local]"));
}

#[tokio::test]
async fn test_parse_errors_do_not_end_session() {
    let dir = TempDir::new().unwrap();
    let ui = run_session(
        &config_in(&dir),
        InvocationContext::console("dee", Role::Dc),
        &[r#"pov_create customer="Acme"#, "whoami"],
    )
    .await;

    let output = ui.output();
    assert!(output.iter().any(|l| l == "error: unterminated quote"));
    assert!(output.iter().any(|l| l.starts_with("dee (dc)")));
}

#[tokio::test]
async fn test_whoami_lists_role_permissions() {
    let dir = TempDir::new().unwrap();
    let analyst = run_session(
        &config_in(&dir),
        InvocationContext::console("ana", Role::Analyst),
        &["whoami"],
    )
    .await;
    let output = analyst.output();
    assert!(output.iter().any(|l| l.trim() == "scope:  assigned only"));
    assert!(output.iter().any(|l| l.trim() == "view:   none"));
    assert!(output.iter().any(|l| l.trim() == "delete: none"));

    let dc = run_session(
        &config_in(&dir),
        InvocationContext::console("dee", Role::Dc),
        &["whoami"],
    )
    .await;
    let output = dc.output();
    assert!(output.iter().any(|l| l.trim() == "create: projects, records, scenarios"));
    assert!(output.iter().any(|l| l.trim() == "update: scenarios"));

    let admin = run_session(
        &config_in(&dir),
        InvocationContext::console("root", Role::Admin),
        &["whoami"],
    )
    .await;
    let output = admin.output();
    assert!(output.iter().any(|l| l.trim() == "scope:  all projects and records"));
    assert!(output
        .iter()
        .any(|l| l.trim() == "delete: projects, records, scenarios, users, system-settings"));
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opsdeck.yaml");
    std::fs::write(
        &path,
        "audit_retention: 50\nidentity:\n  user_id: mo\n  role: manager\nexecutor:\n  command_timeout_ms: 5000\n",
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.audit_retention, 50);
    assert_eq!(config.identity.role, Role::Manager);
    assert_eq!(config.executor.command_timeout_ms, 5000);
    assert_eq!(config.executor.connect_timeout_ms, 10_000);
    assert!(config.validate().is_ok());

    let missing = AppConfig::from_file(&dir.path().join("absent.yaml")).unwrap();
    assert_eq!(missing, AppConfig::default());
}

#[test]
fn test_bad_extension_file_fails_service_build() {
    let dir = TempDir::new().unwrap();
    let extensions = dir.path().join("extra.yaml");
    std::fs::write(&extensions, "- id: help\n  name: Dup\n  description: d\n  text_form: help\n  action_name: x\n  category: system\n  required_roles: [admin]\n").unwrap();

    let config = AppConfig {
        catalog_extensions: Some(extensions),
        ..config_in(&dir)
    };
    assert!(build_service(&config).is_err());
}
