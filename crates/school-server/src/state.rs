use school::auth::AuthService;
use school::password::PasswordHasher;
use school::relay::{HttpWorkflowClient, WorkflowClient};
use school::schedule::ScheduleService;
use school::storage::{MemoryStore, Store};
use school::token::TokenIssuer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::configuration::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub schedules: Arc<ScheduleService>,
    pub tokens: Arc<TokenIssuer>,
    pub workflow: Arc<dyn WorkflowClient>,
    /// Delay between chunks written to chat clients
    pub pacing: Duration,
    /// Parent of every chat session's cancellation token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: PasswordHasher,
        tokens: TokenIssuer,
        workflow: Arc<dyn WorkflowClient>,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(store.clone(), hasher)),
            schedules: Arc::new(ScheduleService::new(store)),
            tokens: Arc::new(tokens),
            workflow,
            pacing: Duration::ZERO,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let pacing = settings.workflow.pacing();
        let workflow = HttpWorkflowClient::new(settings.workflow.into_config())?;

        Ok(Self::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::default(),
            TokenIssuer::new(settings.jwt.into_config()),
            Arc::new(workflow),
        )
        .with_pacing(pacing))
    }
}
