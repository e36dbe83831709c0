use std::sync::Arc;

use crate::database::Store;
use crate::workflow::WorkflowEngine;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<dyn WorkflowEngine>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { store, engine }
    }
}
