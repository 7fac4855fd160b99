// Credential injection
// Holds the OAuth application credentials published from live configuration

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

const CLIENT_ID_PARAM: &str = "client_id";
const CLIENT_SECRET_PARAM: &str = "client_secret";

/// OAuth application credentials injected into every upstream query string.
#[derive(Clone, PartialEq, Eq)]
pub struct Authenticator {
    client_id: String,
    client_secret: String,
}

// Keep the secret out of logs
impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Rewrite a raw query string with the credentials set, replacing any
    /// caller-supplied `client_id` / `client_secret`.
    pub fn authenticate(&self, query: Option<&str>) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(query) = query {
            serializer.extend_pairs(
                url::form_urlencoded::parse(query.as_bytes())
                    .filter(|(key, _)| *key != CLIENT_ID_PARAM && *key != CLIENT_SECRET_PARAM),
            );
        }
        serializer
            .append_pair(CLIENT_ID_PARAM, &self.client_id)
            .append_pair(CLIENT_SECRET_PARAM, &self.client_secret)
            .finish()
    }
}

/// Credential fields from one configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsSnapshot {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl CredentialsSnapshot {
    fn authenticator(&self) -> Option<Authenticator> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let client_secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;
        Some(Authenticator::new(client_id, client_secret))
    }
}

/// Publishes the current [`Authenticator`] as an atomic snapshot.
///
/// Requests clone the `Arc` once; a later publish only affects requests that
/// have not read it yet.
#[derive(Default)]
pub struct CredentialWatcher {
    current: RwLock<Option<Arc<Authenticator>>>,
}

impl CredentialWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<Authenticator>> {
        self.current.read().await.clone()
    }

    /// Apply one configuration snapshot. Incomplete credentials are ignored and
    /// keep whatever was published before. Returns whether a new value was published.
    pub async fn observe(&self, snapshot: &CredentialsSnapshot) -> bool {
        let Some(authenticator) = snapshot.authenticator() else {
            return false;
        };
        let client_id = authenticator.client_id.clone();
        {
            let mut current = self.current.write().await;
            *current = Some(Arc::new(authenticator));
        }
        tracing::info!("GitHub credentials hot updated (client_id: {})", client_id);
        true
    }

    /// Consume snapshots until every sender is dropped.
    pub fn spawn(self: Arc<Self>, mut snapshots: mpsc::Receiver<CredentialsSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                self.observe(&snapshot).await;
            }
            tracing::debug!("Credential snapshot stream closed");
        })
    }
}
