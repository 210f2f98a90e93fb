use std::sync::Arc;

use crate::services::{inference::InferenceClient, references::ReferenceClient};
use crate::store::JobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub inference: Arc<InferenceClient>,
    pub references: Arc<ReferenceClient>,
}

impl AppState {
    pub fn new(store: Arc<JobStore>, inference: InferenceClient, references: ReferenceClient) -> Self {
        Self {
            store,
            inference: Arc::new(inference),
            references: Arc::new(references),
        }
    }
}
