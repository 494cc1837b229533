//! Data and action tools driven by the orchestrator

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::error::DomainError;
use crate::domain::scope::{ActionId, DataDomain, DomainQuery, WorkflowScope};

/// Loads one data domain for a run
#[async_trait]
pub trait DataTool: Send + Sync + Debug {
    fn domain(&self) -> DataDomain;

    /// Load the data selected by `query`. Only called after the enforcer
    /// allowed the domain for `scope`.
    async fn load(&self, scope: &WorkflowScope, query: &DomainQuery) -> Result<Value, DomainError>;
}

/// Executes one kind of action on behalf of the scope's actor
#[async_trait]
pub trait ActionTool: Send + Sync + Debug {
    fn action_id(&self) -> ActionId;

    /// Perform the action. An error is recorded on the run; it never aborts it.
    async fn execute(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError>;
}

/// Everything loaded during one Observing phase
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observation {
    data: BTreeMap<DataDomain, Value>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: DataDomain, value: Value) {
        self.data.insert(domain, value);
    }

    pub fn get(&self, domain: DataDomain) -> Option<&Value> {
        self.data.get(&domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = DataDomain> + '_ {
        self.data.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// JSON object keyed by domain name
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.data
                .iter()
                .map(|(domain, value)| (domain.as_str().to_string(), value.clone()))
                .collect(),
        )
    }
}
