//! Common test utilities for idforge-provisioning integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use idforge_directory::models::{
    AccessType, ApiSettings, AppRole, AppRoleAssignment, Application, ApplicationPatch,
    NewApplication, NewPrincipal, PasswordCredential, PermissionScope, Principal,
    RequiredResourceAccess, ResourceAccess,
};
use idforge_directory::{DirectoryClient, DirectoryError, DirectoryResult};
use idforge_provisioning::{Orchestrator, ProvisionerConfig};

/// Directory operations that can be counted and failed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Authenticate,
    FindApplications,
    GetApplication,
    FindPrincipal,
    CreateApplication,
    UpdateApplication,
    CreatePrincipal,
    CreateCredential,
    CreateRoleAssignment,
}

impl Op {
    fn is_write(self) -> bool {
        matches!(
            self,
            Op::CreateApplication
                | Op::UpdateApplication
                | Op::CreatePrincipal
                | Op::CreateCredential
                | Op::CreateRoleAssignment
        )
    }
}

#[derive(Debug, Default)]
struct State {
    applications: Vec<Application>,
    principals: Vec<Principal>,
    assignments: HashSet<(String, String, String)>,
    failures: HashMap<Op, VecDeque<DirectoryError>>,
    failing_names: HashSet<String>,
    calls: HashMap<Op, u32>,
    next_id: u32,
    reject_auth: bool,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn enter(&mut self, op: Op) -> DirectoryResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// In-memory directory with Graph-like semantics.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Existing application exposing `scopes` and `roles`, optionally with a
    /// principal.
    pub fn seed_application(
        &self,
        display_name: &str,
        scopes: &[&str],
        roles: &[&str],
        with_principal: bool,
    ) -> Application {
        let mut state = self.state.lock().unwrap();
        let n = state.next_id();
        let application = Application {
            id: format!("seed-obj-{n}"),
            app_id: format!("seed-app-{n}"),
            display_name: display_name.to_string(),
            sign_in_audience: Some("AzureADMyOrg".to_string()),
            identifier_uris: Vec::new(),
            web: None,
            spa: None,
            api: Some(ApiSettings {
                oauth2_permission_scopes: scopes
                    .iter()
                    .map(|value| PermissionScope {
                        id: format!("scope-{value}-{n}"),
                        value: (*value).to_string(),
                        consent_type: "User".to_string(),
                        admin_consent_display_name: None,
                        admin_consent_description: None,
                        is_enabled: true,
                    })
                    .collect(),
            }),
            app_roles: roles
                .iter()
                .map(|value| AppRole {
                    id: format!("role-{value}-{n}"),
                    value: Some((*value).to_string()),
                    display_name: None,
                    allowed_member_types: vec!["Application".to_string()],
                    is_enabled: true,
                })
                .collect(),
            required_resource_access: Vec::new(),
        };
        if with_principal {
            state.principals.push(Principal {
                id: format!("seed-sp-{n}"),
                app_id: application.app_id.clone(),
                display_name: Some(display_name.to_string()),
                tags: Vec::new(),
                preferred_single_sign_on_mode: None,
            });
        }
        state.applications.push(application.clone());
        application
    }

    /// Records a role assignment as already present.
    pub fn seed_assignment(&self, principal_id: &str, resource_id: &str, role_id: &str) {
        self.state.lock().unwrap().assignments.insert((
            principal_id.to_string(),
            resource_id.to_string(),
            role_id.to_string(),
        ));
    }

    /// Queues `error` as the result of the next call to `op`.
    pub fn fail_next(&self, op: Op, error: DirectoryError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Every create call for `display_name` fails with a bad request.
    pub fn fail_creation_of(&self, display_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_names
            .insert(display_name.to_string());
    }

    pub fn reject_authentication(&self) {
        self.state.lock().unwrap().reject_auth = true;
    }

    pub fn calls(&self, op: Op) -> u32 {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total number of write calls, successful or not.
    pub fn writes(&self) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| op.is_write())
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn application(&self, display_name: &str) -> Option<Application> {
        self.state
            .lock()
            .unwrap()
            .applications
            .iter()
            .find(|a| a.display_name == display_name)
            .cloned()
    }

    pub fn applications_named(&self, display_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .applications
            .iter()
            .filter(|a| a.display_name == display_name)
            .count()
    }

    pub fn principal_for(&self, app_id: &str) -> Option<Principal> {
        self.state
            .lock()
            .unwrap()
            .principals
            .iter()
            .find(|p| p.app_id == app_id)
            .cloned()
    }

    pub fn assignment_count(&self) -> usize {
        self.state.lock().unwrap().assignments.len()
    }
}

pub fn graph_error(status: u16, code: &str, message: &str) -> DirectoryError {
    DirectoryError::GraphApi {
        status,
        code: code.to_string(),
        message: message.to_string(),
    }
}

pub fn not_replicated() -> DirectoryError {
    graph_error(
        400,
        "Request_BadRequest",
        "The appId of the service principal does not reference a valid application object.",
    )
}

pub fn service_unavailable() -> DirectoryError {
    graph_error(503, "ServiceUnavailable", "Service is temporarily unavailable")
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn authenticate(&self) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::Authenticate)?;
        if state.reject_auth {
            return Err(DirectoryError::Auth("invalid client secret".to_string()));
        }
        Ok(())
    }

    async fn find_applications_by_name(
        &self,
        display_name: &str,
    ) -> DirectoryResult<Vec<Application>> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::FindApplications)?;
        Ok(state
            .applications
            .iter()
            .filter(|a| a.display_name.eq_ignore_ascii_case(display_name))
            .cloned()
            .collect())
    }

    async fn get_application(&self, object_id: &str) -> DirectoryResult<Application> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::GetApplication)?;
        state
            .applications
            .iter()
            .find(|a| a.id == object_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("application {object_id}")))
    }

    async fn find_principal_by_app_id(&self, app_id: &str) -> DirectoryResult<Option<Principal>> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::FindPrincipal)?;
        Ok(state.principals.iter().find(|p| p.app_id == app_id).cloned())
    }

    async fn create_application(&self, request: &NewApplication) -> DirectoryResult<Application> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreateApplication)?;
        if state.failing_names.contains(&request.display_name) {
            return Err(graph_error(
                400,
                "Request_BadRequest",
                "Invalid value specified for property 'displayName'",
            ));
        }
        let n = state.next_id();
        let application = Application {
            id: format!("obj-{n}"),
            app_id: format!("app-{n}"),
            display_name: request.display_name.clone(),
            sign_in_audience: Some(request.sign_in_audience.clone()),
            identifier_uris: request.identifier_uris.clone(),
            web: request.web.clone(),
            spa: request.spa.clone(),
            api: request.api.clone(),
            app_roles: Vec::new(),
            required_resource_access: request.required_resource_access.clone(),
        };
        state.applications.push(application.clone());
        Ok(application)
    }

    async fn update_application(
        &self,
        object_id: &str,
        patch: &ApplicationPatch,
    ) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::UpdateApplication)?;
        let application = state
            .applications
            .iter_mut()
            .find(|a| a.id == object_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("application {object_id}")))?;
        if let Some(uris) = &patch.identifier_uris {
            application.identifier_uris = uris.clone();
        }
        if let Some(rra) = &patch.required_resource_access {
            application.required_resource_access = rra.clone();
        }
        if let Some(web) = &patch.web {
            application.web = Some(web.clone());
        }
        Ok(())
    }

    async fn create_principal(&self, request: &NewPrincipal) -> DirectoryResult<Principal> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreatePrincipal)?;
        if !state.applications.iter().any(|a| a.app_id == request.app_id) {
            return Err(not_replicated());
        }
        if state.principals.iter().any(|p| p.app_id == request.app_id) {
            return Err(graph_error(
                400,
                "Request_MultipleObjectsWithSameKeyValue",
                "Another object with the same value for property appId already exists.",
            ));
        }
        let n = state.next_id();
        let principal = Principal {
            id: format!("sp-{n}"),
            app_id: request.app_id.clone(),
            display_name: None,
            tags: request.tags.clone(),
            preferred_single_sign_on_mode: request.preferred_single_sign_on_mode,
        };
        state.principals.push(principal.clone());
        Ok(principal)
    }

    async fn create_credential(
        &self,
        object_id: &str,
        _description: &str,
        expires_at: DateTime<Utc>,
    ) -> DirectoryResult<PasswordCredential> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreateCredential)?;
        let n = state.next_id();
        Ok(PasswordCredential {
            key_id: Some(format!("key-{n}")),
            secret_text: Some(format!("secret-{object_id}-{n}")),
            end_date_time: Some(expires_at),
        })
    }

    async fn create_role_assignment(
        &self,
        principal_id: &str,
        resource_id: &str,
        role_id: &str,
    ) -> DirectoryResult<AppRoleAssignment> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreateRoleAssignment)?;
        let key = (
            principal_id.to_string(),
            resource_id.to_string(),
            role_id.to_string(),
        );
        if !state.assignments.insert(key) {
            return Err(graph_error(
                400,
                "Request_BadRequest",
                "Permission being assigned already exists on the object",
            ));
        }
        let n = state.next_id();
        Ok(AppRoleAssignment {
            id: Some(format!("assignment-{n}")),
            principal_id: principal_id.to_string(),
            resource_id: resource_id.to_string(),
            app_role_id: role_id.to_string(),
        })
    }
}

/// Declared role-type permission on `resource`.
pub fn role_permission(resource: &Application, role: &str) -> RequiredResourceAccess {
    RequiredResourceAccess {
        resource_app_id: resource.app_id.clone(),
        resource_access: vec![ResourceAccess {
            id: resource
                .role_id(role)
                .expect("seeded role")
                .to_string(),
            access_type: AccessType::Role,
        }],
    }
}

/// Orchestrator over `directory` with every delay disabled.
pub fn orchestrator(directory: &Arc<FakeDirectory>) -> Orchestrator {
    Orchestrator::new(directory.clone(), ProvisionerConfig::for_testing())
}
