//! Application state containing repositories and shared resources

use std::sync::Arc;

use crate::domain::{CatalogRepository, ClientError, TransactionRepository, UpdateBroadcaster};
use crate::infrastructure::config::Config;
use crate::infrastructure::http::ApiClient;
use crate::infrastructure::{HttpCatalogRepository, HttpTransactionRepository};
use crate::models::Session;
use crate::services::{BorrowWorkflow, Dashboard, NotifierOptions, RealtimeNotifier};

/// Application state shared by every screen
#[derive(Clone)]
pub struct AppState {
    config: Config,
    api: ApiClient,
    /// Catalog repository
    pub catalog: Arc<dyn CatalogRepository>,
    /// Borrow transaction repository
    pub transactions: Arc<dyn TransactionRepository>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(config: Config) -> Result<Self, ClientError> {
        config.validate()?;
        let api = ApiClient::new(&config)?;

        let catalog = Arc::new(HttpCatalogRepository::new(api.clone()));
        let transactions = Arc::new(HttpTransactionRepository::new(api.clone()));

        Ok(Self {
            config,
            api,
            catalog,
            transactions,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Fresh, unmounted dashboard for `session`
    pub fn dashboard(&self, session: &Session) -> Arc<Dashboard> {
        Arc::new(Dashboard::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.transactions),
            session.clone(),
        ))
    }

    /// Push subscription for `session`, not yet started
    pub fn notifier(&self, session: &Session) -> Arc<RealtimeNotifier> {
        Arc::new(RealtimeNotifier::new(
            NotifierOptions::from_config(&self.config),
            self.api.http().clone(),
            session.token.clone(),
        ))
    }

    pub fn borrow_workflow(
        &self,
        dashboard: Arc<Dashboard>,
        broadcaster: Arc<dyn UpdateBroadcaster>,
    ) -> BorrowWorkflow {
        let session = dashboard.session().clone();
        BorrowWorkflow::new(
            Arc::clone(&self.transactions),
            broadcaster,
            dashboard,
            session,
            self.config.loan_period_days,
        )
    }
}
