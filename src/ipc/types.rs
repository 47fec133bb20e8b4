use crate::reconciler::Reconciler;
use crate::roster::InMemoryDirectory;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub reconciler: Reconciler<InMemoryDirectory>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            reconciler: Reconciler::new(InMemoryDirectory::new()),
        }
    }
}
