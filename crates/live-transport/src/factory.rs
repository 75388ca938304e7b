//! 연결 클라이언트 팩토리.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use live_core::{
    AppConfig, IntersectionRef, MessageKind, SimulatorConfig, TransportConfig, TransportMode,
};

use crate::simulated::SimulatedClient;
use crate::stomp::StompClient;
use crate::traits::{ConnectionClient, ConnectionFactory, Credentials};
use crate::TransportResult;

/// STOMP 클라이언트 팩토리. 교차로의 RSU IP로 URL을 만듭니다.
pub struct StompConnectionFactory {
    config: TransportConfig,
    credentials: Credentials,
    buffer: usize,
}

impl StompConnectionFactory {
    pub fn new(config: TransportConfig, buffer: usize) -> Self {
        let credentials = Credentials::from_config(&config);
        Self {
            config,
            credentials,
            buffer,
        }
    }
}

impl ConnectionFactory for StompConnectionFactory {
    fn create(
        &self,
        intersection: &IntersectionRef,
        kind: MessageKind,
    ) -> TransportResult<Box<dyn ConnectionClient>> {
        let client = StompClient::new(
            format!("stomp-{}-{}", intersection.intersection_id, kind),
            self.config.url_for(&intersection.ip),
            self.config.ping_interval(),
            self.buffer,
        );
        Ok(Box::new(client))
    }

    fn stream_root(&self) -> &str {
        &self.config.stream_root
    }

    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }

    fn connect_timeout(&self) -> Duration {
        self.config.connect_timeout()
    }
}

/// 시뮬레이션 클라이언트 팩토리.
pub struct SimulatedConnectionFactory {
    simulator: SimulatorConfig,
    stream_root: String,
    connect_timeout: Duration,
    buffer: usize,
    seed: Option<u64>,
}

impl SimulatedConnectionFactory {
    pub fn new(simulator: SimulatorConfig, transport: &TransportConfig, buffer: usize) -> Self {
        Self {
            simulator,
            stream_root: transport.stream_root.clone(),
            connect_timeout: transport.connect_timeout(),
            buffer,
            seed: None,
        }
    }

    /// 모든 클라이언트의 난수 시드 고정.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl ConnectionFactory for SimulatedConnectionFactory {
    fn create(
        &self,
        intersection: &IntersectionRef,
        _kind: MessageKind,
    ) -> TransportResult<Box<dyn ConnectionClient>> {
        let client = SimulatedClient::new(intersection.clone(), self.simulator.clone(), self.buffer);
        let client = match self.seed {
            Some(seed) => client.with_seed(seed),
            None => client,
        };
        Ok(Box::new(client))
    }

    fn stream_root(&self) -> &str {
        &self.stream_root
    }

    fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

/// 설정의 전송 모드에 맞는 팩토리 생성.
pub fn build_factory(config: &AppConfig) -> Arc<dyn ConnectionFactory> {
    let buffer = config.channels.transport_buffer;
    match config.transport.mode {
        TransportMode::Simulated => {
            info!("Using simulated transport");
            Arc::new(SimulatedConnectionFactory::new(
                config.simulator.clone(),
                &config.transport,
                buffer,
            ))
        }
        TransportMode::Stomp => {
            info!(url_template = %config.transport.url_template, "Using STOMP transport");
            Arc::new(StompConnectionFactory::new(config.transport.clone(), buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportEvent;
    use live_core::RoadRegulatorId;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_factory_opens_stream() {
        let factory = build_factory(&AppConfig::default());
        let intersection =
            IntersectionRef::new(8802, RoadRegulatorId(-1), "10.11.81.30", -104.8830946, 39.5948212);

        let mut opened = factory.open(&intersection, MessageKind::Bsm).await.unwrap();
        assert_eq!(opened.topic.to_string(), "/live/-1/8802/bsm");
        assert!(opened.client.is_connected());

        let first = opened.events.recv().await;
        assert!(matches!(first, Some(TransportEvent::Message(_))));

        opened.client.disconnect().await.unwrap();
    }

    #[test]
    fn test_stomp_factory_builds_url_from_ip() {
        let factory = StompConnectionFactory::new(TransportConfig::default(), 16);
        let intersection =
            IntersectionRef::new(8801, RoadRegulatorId(-1), "10.11.81.29", -104.88, 39.59);

        let client = factory.create(&intersection, MessageKind::Map).unwrap();
        assert_eq!(client.name(), "stomp-8801-map");
        assert!(!client.is_connected());
        assert_eq!(factory.stream_root(), "live");
    }
}
