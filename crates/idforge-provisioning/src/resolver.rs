//! Display-name resolution of existing directory objects.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use idforge_directory::models::{Application, Principal};
use idforge_directory::{DirectoryClient, DirectoryResult};

use crate::outcome::ResourceIdentity;

/// An application found (or created) under a display name, plus its principal.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub application: Application,
    pub principal: Option<Principal>,
    /// Additional objects sharing the display name that were ignored.
    pub duplicates: usize,
}

impl Resolution {
    #[must_use]
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(&self.application, self.principal.as_ref())
    }
}

/// Looks resources up by display name, caching answers for the run.
///
/// Once a name is resolved (or recorded after creation) every later lookup
/// returns the same identity, so one run never binds a name to two objects.
pub struct ResourceResolver {
    directory: Arc<dyn DirectoryClient>,
    cache: RwLock<HashMap<String, Option<Resolution>>>,
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver").finish_non_exhaustive()
    }
}

impl ResourceResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryClient>) -> Self {
        Self {
            directory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the object registered under `display_name`, or `None` when the
    /// directory has no exact match. Never creates anything.
    ///
    /// # Errors
    ///
    /// Propagates directory failures; failed lookups are not cached.
    #[instrument(skip(self))]
    pub async fn resolve(&self, display_name: &str) -> DirectoryResult<Option<Resolution>> {
        if let Some(cached) = self.cache.read().await.get(display_name) {
            debug!("Resolved from run cache");
            return Ok(cached.clone());
        }

        let mut matches: Vec<Application> = self
            .directory
            .find_applications_by_name(display_name)
            .await?
            .into_iter()
            .filter(|app| app.display_name == display_name)
            .collect();

        let resolution = if matches.is_empty() {
            None
        } else {
            let duplicates = matches.len() - 1;
            if duplicates > 0 {
                warn!(
                    matches = matches.len(),
                    "Display name is ambiguous, using the first match"
                );
            }
            let application = matches.swap_remove(0);
            let principal = self
                .directory
                .find_principal_by_app_id(&application.app_id)
                .await?;
            Some(Resolution {
                application,
                principal,
                duplicates,
            })
        };

        self.cache
            .write()
            .await
            .insert(display_name.to_string(), resolution.clone());
        Ok(resolution)
    }

    /// Records an object created (or repaired) during this run.
    pub async fn record(
        &self,
        display_name: &str,
        application: Application,
        principal: Option<Principal>,
    ) {
        self.cache.write().await.insert(
            display_name.to_string(),
            Some(Resolution {
                application,
                principal,
                duplicates: 0,
            }),
        );
    }

    /// Cached resolution without calling the directory.
    pub async fn cached(&self, display_name: &str) -> Option<Resolution> {
        self.cache.read().await.get(display_name).cloned().flatten()
    }
}
