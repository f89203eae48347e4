//! Operator discovery against the external registry.

use std::time::Duration;

use common::OperatorRecord;

use crate::config::ServiceConfig;
use crate::error::DiscoveryError;
use crate::services::{Service, ServiceCall, ServiceClient, ServiceSession};

pub const GET_OPERATORS_PATH: &str = "/getOperators";

/// Keeps only operators exposing a transfer endpoint, in source order.
pub fn filter_transfer_capable(operators: Vec<OperatorRecord>) -> Vec<OperatorRecord> {
    operators
        .into_iter()
        .filter(OperatorRecord::has_transfer_endpoint)
        .collect()
}

/// Read-only lookup of transfer-capable operators.
pub struct OperatorDiscovery<C: ServiceClient> {
    client: C,
    request_timeout: Duration,
}

impl<C: ServiceClient> OperatorDiscovery<C> {
    pub fn new(client: C, config: &ServiceConfig) -> Self {
        Self {
            client,
            request_timeout: config.request_timeout,
        }
    }

    /// Fetches the registry's operator list and filters it.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<OperatorRecord>, DiscoveryError> {
        metrics::counter!("operator_discovery_total").increment(1);

        let session = self.client.open_session()?;
        let response = session
            .call(
                ServiceCall::get(Service::Registry, GET_OPERATORS_PATH)
                    .timeout(self.request_timeout),
            )
            .await?;

        if !response.is_success() {
            return Err(DiscoveryError::UnexpectedStatus(response.status));
        }

        let operators: Vec<OperatorRecord> = response.json()?;
        let total = operators.len();
        let operators = filter_transfer_capable(operators);
        tracing::info!(total, retained = operators.len(), "operators fetched");

        Ok(operators)
    }
}
