//! End-to-end runs of the orchestrator against an in-memory directory.

mod common;

use common::{
    graph_error, not_replicated, orchestrator, role_permission, service_unavailable, FakeDirectory,
    Op,
};
use idforge_directory::models::{AccessType, SsoMode};
use idforge_provisioning::{
    ApplicationKind, ApplicationSpec, Disposition, Orchestrator, PermissionEdge, PermissionType,
    PlannedAction, ProvisionerConfig, ProvisioningError, Topology, CREDENTIAL_NOT_REQUESTED,
    CREDENTIAL_UNAVAILABLE, TAG_CUSTOM_SSO, TAG_ENTERPRISE, TAG_ON_PREM_PROXY,
};
use tokio_util::sync::CancellationToken;

fn full_topology() -> Topology {
    let mut topology = Topology::default();
    topology.applications.push(
        ApplicationSpec::new("chat-api", ApplicationKind::Web)
            .with_scope("api.access")
            .with_redirect_uri("https://api.example.com/auth")
            .api_provider(true),
    );
    topology.applications.push(
        ApplicationSpec::new("chat-web", ApplicationKind::SinglePage)
            .with_redirect_uri("https://chat.example.com")
            .mint_credential(false),
    );
    topology.enterprise.push(
        ApplicationSpec::new("chat-sso", ApplicationKind::EnterpriseSaml)
            .with_external_url("https://sso.example.com"),
    );
    topology.enterprise.push(
        ApplicationSpec::new("chat-proxy", ApplicationKind::EnterpriseProxy)
            .with_external_url("https://proxy.example.com"),
    );
    topology
        .permission_edges
        .push(PermissionEdge::new("chat-web", "chat-api", "api.access"));
    topology
}

#[tokio::test]
async fn test_first_run_creates_everything() {
    let directory = FakeDirectory::new();
    let report = orchestrator(&directory)
        .run(&full_topology(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.summary.applications_created, 2);
    assert_eq!(report.summary.enterprise_created, 2);
    assert_eq!(report.summary.edges_applied, 1);

    let api = report.outcome("chat-api").unwrap();
    assert_eq!(api.disposition, Disposition::Created);
    assert!(api.identity.principal_id.is_some());
    assert!(api.credential.starts_with("secret-"));
    assert_eq!(
        api.identifier_uri.as_deref(),
        Some(format!("api://{}", api.identity.app_id).as_str())
    );

    let web = report.outcome("chat-web").unwrap();
    assert_eq!(web.credential, CREDENTIAL_NOT_REQUESTED);

    let created = directory.application("chat-api").unwrap();
    assert_eq!(created.sign_in_audience.as_deref(), Some("AzureADMyOrg"));
    assert!(created
        .web
        .unwrap()
        .implicit_grant_settings
        .unwrap()
        .enable_id_token_issuance);
    assert!(directory.application("chat-web").unwrap().spa.is_some());
}

#[tokio::test]
async fn test_second_run_adopts_everything() {
    let directory = FakeDirectory::new();
    let orchestrator = orchestrator(&directory);
    let topology = full_topology();

    let first = orchestrator.run(&topology, &CancellationToken::new()).await.unwrap();
    let creates = directory.calls(Op::CreateApplication);
    let principals = directory.calls(Op::CreatePrincipal);
    let updates = directory.calls(Op::UpdateApplication);

    let second = orchestrator.run(&topology, &CancellationToken::new()).await.unwrap();

    assert!(second.errors.is_empty(), "errors: {:?}", second.errors);
    assert_eq!(second.summary.applications_created, 0);
    assert_eq!(second.summary.enterprise_created, 0);
    assert_eq!(second.summary.applications_adopted, 2);
    assert_eq!(second.summary.enterprise_adopted, 2);
    assert_eq!(second.summary.edges_applied, 0);
    assert_eq!(second.summary.edges_already_satisfied, 1);
    assert_eq!(directory.calls(Op::CreateApplication), creates);
    assert_eq!(directory.calls(Op::CreatePrincipal), principals);
    assert_eq!(directory.calls(Op::UpdateApplication), updates);

    for outcome in second.outcomes() {
        let before = first.outcome(&outcome.display_name).unwrap();
        assert_eq!(outcome.identity, before.identity);
        assert_eq!(outcome.disposition, Disposition::Adopted);
    }
    assert_eq!(directory.applications_named("chat-api"), 1);
}

#[tokio::test]
async fn test_scope_edge_declares_generated_scope_once() {
    let directory = FakeDirectory::new();
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("app-a", ApplicationKind::Web));
    topology
        .applications
        .push(ApplicationSpec::new("app-b", ApplicationKind::Web).with_scope("api.access"));
    topology
        .permission_edges
        .push(PermissionEdge::new("app-a", "app-b", "api.access"));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);

    let app_b = directory.application("app-b").unwrap();
    let scope_id = app_b.scope_id("api.access").unwrap().to_string();
    let app_a = directory.application("app-a").unwrap();
    assert_eq!(app_a.required_resource_access.len(), 1);
    let entry = &app_a.required_resource_access[0];
    assert_eq!(entry.resource_app_id, app_b.app_id);
    assert_eq!(entry.resource_access.len(), 1);
    assert_eq!(entry.resource_access[0].id, scope_id);
    assert_eq!(entry.resource_access[0].access_type, AccessType::Scope);
}

#[tokio::test]
async fn test_duplicate_edges_declare_once() {
    let directory = FakeDirectory::new();
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("app-a", ApplicationKind::Web));
    topology
        .applications
        .push(ApplicationSpec::new("app-b", ApplicationKind::Web).with_scope("api.access"));
    let edge = PermissionEdge::new("app-a", "app-b", "api.access");
    topology.permission_edges = vec![edge.clone(), edge];

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.edges_applied, 1);
    assert_eq!(report.summary.edges_already_satisfied, 1);
    let app_a = directory.application("app-a").unwrap();
    assert_eq!(app_a.required_resource_access[0].resource_access.len(), 1);
}

#[tokio::test]
async fn test_failed_application_does_not_stop_the_run() {
    let directory = FakeDirectory::new();
    directory.fail_creation_of("b");
    let mut topology = Topology::default();
    for name in ["a", "b", "c"] {
        topology
            .applications
            .push(ApplicationSpec::new(name, ApplicationKind::Web));
    }

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("b: failed to create application"));
    assert_eq!(report.applications.len(), 2);
    assert!(report.outcome("a").unwrap().is_created());
    assert!(report.outcome("c").unwrap().is_created());
    assert!(report.outcome("b").is_none());
}

#[tokio::test]
async fn test_edge_to_failed_application_is_a_warning() {
    let directory = FakeDirectory::new();
    directory.fail_creation_of("app-b");
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("app-a", ApplicationKind::Web));
    topology
        .applications
        .push(ApplicationSpec::new("app-b", ApplicationKind::Web).with_scope("api.access"));
    topology
        .permission_edges
        .push(PermissionEdge::new("app-a", "app-b", "api.access"));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("app-a -> app-b") && w.contains("not provisioned")));
}

#[tokio::test]
async fn test_edge_to_unknown_scope_is_a_warning() {
    let directory = FakeDirectory::new();
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("app-a", ApplicationKind::Web));
    topology
        .applications
        .push(ApplicationSpec::new("app-b", ApplicationKind::Web));
    topology
        .permission_edges
        .push(PermissionEdge::new("app-a", "app-b", "api.missing"));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.summary.edges_applied, 0);
    assert!(report.warnings.iter().any(|w| w.contains("api.missing")));
    assert!(directory
        .application("app-a")
        .unwrap()
        .required_resource_access
        .is_empty());
}

#[tokio::test]
async fn test_role_edge_uses_target_app_role() {
    let directory = FakeDirectory::new();
    let backend = directory.seed_application("backend", &[], &["Data.Read"], true);
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("worker", ApplicationKind::Web));
    topology
        .applications
        .push(ApplicationSpec::new("backend", ApplicationKind::Web));
    let mut edge = PermissionEdge::new("worker", "backend", "Data.Read");
    edge.permission_type = PermissionType::Role;
    topology.permission_edges.push(edge);

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.edges_applied, 1);
    let worker = directory.application("worker").unwrap();
    assert_eq!(worker.required_resource_access[0].resource_app_id, backend.app_id);
    assert_eq!(
        worker.required_resource_access[0].resource_access[0].access_type,
        AccessType::Role
    );
}

#[tokio::test]
async fn test_authorization_conflict_counts_as_granted() {
    let directory = FakeDirectory::new();
    let graph = directory.seed_application("Microsoft Graph", &[], &["Application.Read.All"], true);
    directory.fail_next(
        Op::CreateRoleAssignment,
        graph_error(
            400,
            "Request_BadRequest",
            "Permission being assigned already exists on the object",
        ),
    );

    let mut topology = Topology::default();
    topology.applications.push(
        ApplicationSpec::new("bot", ApplicationKind::Web)
            .with_required_permissions(role_permission(&graph, "Application.Read.All"))
            .admin_authorization(true),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    let bot = report.outcome("bot").unwrap();
    assert!(bot.authorization_granted);
    assert!(bot.warnings.is_empty(), "warnings: {:?}", bot.warnings);
    assert_eq!(report.summary.authorizations_granted, 1);
    assert_eq!(directory.calls(Op::CreateRoleAssignment), 1);
}

#[tokio::test]
async fn test_authorization_grants_every_role() {
    let directory = FakeDirectory::new();
    let graph = directory.seed_application("Microsoft Graph", &[], &["A.Read", "B.Read"], true);

    let mut both = role_permission(&graph, "A.Read");
    both.resource_access
        .extend(role_permission(&graph, "B.Read").resource_access);

    let mut topology = Topology::default();
    topology.applications.push(
        ApplicationSpec::new("bot", ApplicationKind::Web)
            .with_required_permissions(both)
            .admin_authorization(true),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.outcome("bot").unwrap().authorization_granted);
    assert_eq!(directory.assignment_count(), 2);

    // Adopted applications are not re-authorized.
    let rerun = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!rerun.outcome("bot").unwrap().authorization_granted);
    assert_eq!(directory.calls(Op::CreateRoleAssignment), 2);
}

#[tokio::test]
async fn test_transient_authorization_failures_become_a_warning() {
    let directory = FakeDirectory::new();
    let graph = directory.seed_application("Microsoft Graph", &[], &["Application.Read.All"], true);
    for _ in 0..3 {
        directory.fail_next(Op::CreateRoleAssignment, service_unavailable());
    }

    let mut topology = Topology::default();
    topology.applications.push(
        ApplicationSpec::new("bot", ApplicationKind::Web)
            .with_required_permissions(role_permission(&graph, "Application.Read.All"))
            .admin_authorization(true),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    let bot = report.outcome("bot").unwrap();
    assert!(!bot.authorization_granted);
    assert!(bot.warnings.iter().any(|w| w.contains("after 3 attempts")));
    assert_eq!(directory.calls(Op::CreateRoleAssignment), 3);
}

#[tokio::test]
async fn test_missing_resource_principal_is_a_warning() {
    let directory = FakeDirectory::new();
    let partner = directory.seed_application("partner-api", &[], &["Partner.Write"], false);

    let mut topology = Topology::default();
    topology.applications.push(
        ApplicationSpec::new("bot", ApplicationKind::Web)
            .with_required_permissions(role_permission(&partner, "Partner.Write"))
            .admin_authorization(true),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    let bot = report.outcome("bot").unwrap();
    assert!(!bot.authorization_granted);
    assert!(bot.warnings.iter().any(|w| w.contains("has no principal")));
    assert_eq!(directory.calls(Op::CreateRoleAssignment), 0);
}

#[tokio::test]
async fn test_proxy_object_profile() {
    let directory = FakeDirectory::new();
    let mut topology = Topology::default();
    topology.enterprise.push(
        ApplicationSpec::new("intranet", ApplicationKind::EnterpriseProxy)
            .with_external_url("https://intranet.example.com"),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("intranet").unwrap();
    assert_eq!(outcome.sso_mode, Some(SsoMode::Integrated));
    assert!(outcome.identifier_uri.is_none());
    assert!(outcome.tags.iter().any(|t| t == TAG_ON_PREM_PROXY));
    assert!(outcome.tags.iter().any(|t| t == TAG_ENTERPRISE));
    assert!(!outcome.tags.iter().any(|t| t == TAG_CUSTOM_SSO));

    let application = directory.application("intranet").unwrap();
    assert!(application.identifier_uris.is_empty());
    assert_eq!(
        application.web.unwrap().redirect_uris,
        vec!["https://intranet.example.com/.auth/login/aad/callback"]
    );
    let principal = directory.principal_for(&application.app_id).unwrap();
    assert_eq!(principal.preferred_single_sign_on_mode, Some(SsoMode::Integrated));
    assert_ne!(principal.preferred_single_sign_on_mode, Some(SsoMode::Saml));
}

#[tokio::test]
async fn test_saml_object_profile() {
    let directory = FakeDirectory::new();
    let mut topology = Topology::default();
    topology.enterprise.push(
        ApplicationSpec::new("portal", ApplicationKind::EnterpriseSaml)
            .with_external_url("https://portal.example.com"),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("portal").unwrap();
    assert_eq!(outcome.sso_mode, Some(SsoMode::Saml));
    assert_eq!(outcome.identifier_uri.as_deref(), Some("https://portal.example.com"));
    assert!(outcome.tags.iter().any(|t| t == TAG_CUSTOM_SSO));
    let application = directory.application("portal").unwrap();
    assert_eq!(application.identifier_uris, vec!["https://portal.example.com"]);
}

#[tokio::test]
async fn test_saml_identifier_failure_is_a_warning() {
    let directory = FakeDirectory::new();
    directory.fail_next(
        Op::UpdateApplication,
        graph_error(
            400,
            "Request_BadRequest",
            "Values of identifierUris property must use a verified domain",
        ),
    );
    let mut topology = Topology::default();
    topology.enterprise.push(
        ApplicationSpec::new("portal", ApplicationKind::EnterpriseSaml)
            .with_external_url("https://portal.example.com"),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    let outcome = report.outcome("portal").unwrap();
    assert!(outcome.identifier_uri.is_none());
    assert!(outcome.warnings.iter().any(|w| w.contains("SAML identifier")));
}

#[tokio::test]
async fn test_principal_creation_waits_for_replication() {
    let directory = FakeDirectory::new();
    directory.fail_next(Op::CreatePrincipal, not_replicated());
    directory.fail_next(Op::CreatePrincipal, not_replicated());
    let mut topology = Topology::default();
    topology.enterprise.push(
        ApplicationSpec::new("portal", ApplicationKind::EnterpriseSaml)
            .with_external_url("https://portal.example.com"),
    );

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    assert!(report.outcome("portal").unwrap().identity.principal_id.is_some());
    assert_eq!(directory.calls(Op::CreatePrincipal), 3);
}

#[tokio::test]
async fn test_principal_failure_is_an_error() {
    let directory = FakeDirectory::new();
    directory.fail_next(
        Op::CreatePrincipal,
        graph_error(403, "Authorization_RequestDenied", "Insufficient privileges"),
    );
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("api", ApplicationKind::Web));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("create principal"));
    assert_eq!(directory.calls(Op::CreatePrincipal), 1);
}

#[tokio::test]
async fn test_credential_failure_is_a_warning() {
    let directory = FakeDirectory::new();
    directory.fail_next(Op::CreateCredential, service_unavailable());
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("api", ApplicationKind::Web));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    let outcome = report.outcome("api").unwrap();
    assert!(outcome.is_created());
    assert_eq!(outcome.credential, CREDENTIAL_UNAVAILABLE);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(report.summary.warnings, 1);
}

#[tokio::test]
async fn test_out_of_range_credential_lifetime_is_a_warning() {
    let directory = FakeDirectory::new();
    let config = ProvisionerConfig {
        credential_lifetime_days: 200_000_000,
        ..ProvisionerConfig::for_testing()
    };
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("api", ApplicationKind::Web));

    let report = Orchestrator::new(directory.clone(), config)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.errors.is_empty());
    let outcome = report.outcome("api").unwrap();
    assert!(outcome.is_created());
    assert_eq!(outcome.credential, CREDENTIAL_UNAVAILABLE);
    assert!(outcome.warnings[0].contains("out of range"));
    assert_eq!(directory.calls(Op::CreateCredential), 0);
}

#[tokio::test]
async fn test_adopting_repairs_missing_principal() {
    let directory = FakeDirectory::new();
    let existing = directory.seed_application("legacy", &[], &[], false);
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("legacy", ApplicationKind::Web).mint_credential(false));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("legacy").unwrap();
    assert_eq!(outcome.disposition, Disposition::Adopted);
    assert_eq!(outcome.identity.object_id, existing.id);
    assert!(outcome.identity.principal_id.is_some());
    assert!(outcome.warnings.iter().any(|w| w.contains("had no principal")));
    assert_eq!(directory.calls(Op::CreateApplication), 0);
    assert_eq!(directory.calls(Op::UpdateApplication), 0);
}

#[tokio::test]
async fn test_ambiguous_display_name_adopts_first() {
    let directory = FakeDirectory::new();
    let first = directory.seed_application("shared", &[], &[], true);
    directory.seed_application("shared", &[], &[], true);
    let mut topology = Topology::default();
    topology
        .applications
        .push(ApplicationSpec::new("shared", ApplicationKind::Web));

    let report = orchestrator(&directory)
        .run(&topology, &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("shared").unwrap();
    assert_eq!(outcome.identity.object_id, first.id);
    assert!(outcome.warnings.iter().any(|w| w.contains("share this display name")));
}

#[tokio::test]
async fn test_authentication_failure_aborts_run() {
    let directory = FakeDirectory::new();
    directory.reject_authentication();

    let result = orchestrator(&directory)
        .run(&full_topology(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ProvisioningError::Precondition(_))));
    assert_eq!(directory.writes(), 0);
}

#[tokio::test]
async fn test_cancelled_run_skips_remaining_resources() {
    let directory = FakeDirectory::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let topology = full_topology();

    let report = orchestrator(&directory).run(&topology, &cancel).await.unwrap();

    assert!(report.cancelled);
    assert!(report.applications.is_empty());
    assert!(report.enterprise.is_empty());
    assert_eq!(directory.writes(), 0);
    for spec in topology.specs() {
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with(&format!("{}: skipped", spec.display_name))));
    }
    assert!(report.warnings.iter().any(|w| w.contains("run cancelled")));
}

#[tokio::test]
async fn test_plan_writes_nothing() {
    let directory = FakeDirectory::new();
    let existing = directory.seed_application("chat-api", &["api.access"], &[], false);

    let plan = orchestrator(&directory).plan(&full_topology()).await.unwrap();

    assert_eq!(directory.writes(), 0);
    assert_eq!(plan.resources.len(), 4);
    assert_eq!(plan.count(PlannedAction::Adopt), 1);
    assert_eq!(plan.count(PlannedAction::Create), 3);
    let api = &plan.resources[0];
    assert_eq!(api.object_id.as_deref(), Some(existing.id.as_str()));
    assert!(api.repairs_principal);
    assert_eq!(plan.permission_edges.len(), 1);
    assert!(!plan.is_converged());
}

#[tokio::test]
async fn test_plan_after_run_is_converged() {
    let directory = FakeDirectory::new();
    let orchestrator = orchestrator(&directory);
    let topology = full_topology();
    orchestrator.run(&topology, &CancellationToken::new()).await.unwrap();

    let writes = directory.writes();
    let plan = orchestrator.plan(&topology).await.unwrap();
    assert!(plan.is_converged());
    assert_eq!(directory.writes(), writes);
}
