//! Human-readable rendering of plans and run reports

use idforge_provisioning::{
    Disposition, PlannedAction, ProvisionOutcome, RunPlan, RunReport, CREDENTIAL_NOT_REQUESTED,
    CREDENTIAL_NOT_RETURNED, CREDENTIAL_UNAVAILABLE,
};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

fn paint(color: &'static str, text: &str) -> String {
    if use_color() {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Print a dry-run plan
pub fn print_plan(plan: &RunPlan) {
    println!("Dry run - no changes will be made.");
    println!();

    for resource in &plan.resources {
        let symbol = match resource.action {
            PlannedAction::Create => paint(GREEN, "+"),
            PlannedAction::Adopt => paint(YELLOW, "="),
        };
        print!(
            "  {symbol} {} {}: {}",
            resource.action, resource.kind, resource.display_name
        );
        if let Some(object_id) = &resource.object_id {
            print!(" ({object_id})");
        }
        if resource.repairs_principal {
            print!(" [principal will be created]");
        }
        if resource.duplicates > 0 {
            print!(" [{} duplicate(s) ignored]", resource.duplicates);
        }
        println!();
    }

    for edge in &plan.permission_edges {
        println!("  ~ wire {edge}");
    }

    for error in &plan.errors {
        println!("  {} {error}", paint(RED, "!"));
    }

    println!();
    println!(
        "Plan: {} to create, {} to adopt, {} permission edge(s).",
        plan.count(PlannedAction::Create),
        plan.count(PlannedAction::Adopt),
        plan.permission_edges.len()
    );
}

fn print_outcome(outcome: &ProvisionOutcome, show_secrets: bool) {
    let (symbol, verb) = match outcome.disposition {
        Disposition::Created => (paint(GREEN, "✓"), "Created"),
        Disposition::Adopted => (paint(YELLOW, "="), "Adopted"),
    };
    println!(
        "  {symbol} {verb} {}: {} (appId {})",
        outcome.kind, outcome.display_name, outcome.identity.app_id
    );
    if let Some(uri) = &outcome.identifier_uri {
        println!("      identifier: {uri}");
    }
    if let Some(mode) = outcome.sso_mode {
        println!("      sso mode: {mode}");
    }
    if outcome.authorization_granted {
        println!("      admin authorization: granted");
    }
    println!(
        "      credential: {}",
        displayed_credential(&outcome.credential, show_secrets)
    );
}

const MASKED_CREDENTIAL: &str = "<minted; rerun with --show-secrets or --output>";

/// Placeholders are shown as-is, minted secrets only with `show_secrets`.
fn displayed_credential(credential: &str, show_secrets: bool) -> &str {
    let placeholder = [
        CREDENTIAL_NOT_REQUESTED,
        CREDENTIAL_UNAVAILABLE,
        CREDENTIAL_NOT_RETURNED,
    ]
    .iter()
    .any(|p| *p == credential);
    if show_secrets || placeholder {
        credential
    } else {
        MASKED_CREDENTIAL
    }
}

/// Print a run report
pub fn print_report(report: &RunReport, show_secrets: bool) {
    if !report.applications.is_empty() {
        println!("Applications:");
        for outcome in &report.applications {
            print_outcome(outcome, show_secrets);
        }
    }
    if !report.enterprise.is_empty() {
        println!("Enterprise objects:");
        for outcome in &report.enterprise {
            print_outcome(outcome, show_secrets);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  {} {warning}", paint(YELLOW, "!"));
        }
    }
    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for error in &report.errors {
            println!("  {} {error}", paint(RED, "✗"));
        }
    }

    let s = &report.summary;
    println!();
    println!(
        "Run {}: {} created, {} adopted, {} enterprise created, {} enterprise adopted, {} authorized, {} edge(s) applied, {} already satisfied.",
        report.run_id,
        s.applications_created,
        s.applications_adopted,
        s.enterprise_created,
        s.enterprise_adopted,
        s.authorizations_granted,
        s.edges_applied,
        s.edges_already_satisfied
    );
    if report.cancelled {
        println!("{}", paint(YELLOW, "Run was cancelled before completion."));
    }
}
