// Transport selection from the resolved runtime configuration
use crate::application::transport::{TransportConnector, TransportMode};
use crate::infrastructure::config::{DashboardConfig, RuntimeConfig};
use crate::infrastructure::polling::{CommandRoutes, PollingConnector};
use crate::infrastructure::streaming::StreamingConnector;
use std::sync::Arc;

pub fn connector_for(
    runtime: &RuntimeConfig,
    config: &DashboardConfig,
    client: reqwest::Client,
) -> Arc<dyn TransportConnector> {
    match runtime.mode {
        TransportMode::Streaming => {
            Arc::new(StreamingConnector::new(runtime.streaming_url(config)))
        }
        TransportMode::Polling => Arc::new(PollingConnector::new(
            client,
            runtime.rest_base_url(config),
            runtime.polling_interval(),
            CommandRoutes::default().with_overrides(&runtime.command_paths),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_follows_runtime_mode() {
        let config = DashboardConfig::default();
        let mut runtime = RuntimeConfig::same_origin(&config);
        assert_eq!(
            connector_for(&runtime, &config, reqwest::Client::new()).mode(),
            TransportMode::Streaming
        );

        runtime.mode = TransportMode::Polling;
        let connector = connector_for(&runtime, &config, reqwest::Client::new());
        assert_eq!(connector.mode(), TransportMode::Polling);
        assert_eq!(connector.open_session().mode(), TransportMode::Polling);
    }
}
