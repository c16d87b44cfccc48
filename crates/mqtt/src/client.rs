//! MQTT link over rumqttc, driven inline from the pipeline task.
//!
//! Unlike a long-running event-loop task, the device owns its `EventLoop`
//! directly and pumps it only when it needs something from the network:
//! `connect()` polls until CONNACK, `publish()` polls until PUBACK, and
//! `service()` gives the protocol a bounded slice of time for keep-alive
//! and inbound traffic between acquisition cycles. This keeps the whole
//! transport synchronous from the pipeline's point of view — exactly one
//! operation, and at most one in-flight publish, at any time.
//!
//! Messages arriving on the command topic are logged and otherwise ignored;
//! the core does not act on inbound traffic.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
    Transport,
};
use tracing::{debug, info, trace, warn};

use super::{
    config::{Config, TlsConfig},
    error::LinkError,
    state::LinkState,
    Link,
};

/// How long one idle `service()` call is allowed to sit on the event loop.
const SERVICE_POLL: Duration = Duration::from_millis(250);

/// Publish and command topics derived from the application namespace and
/// the farm identifier.
#[derive(Debug, Clone)]
pub struct Topics {
    /// Telemetry data is published here.
    pub data: String,

    /// Commands are observed (log-only) here.
    pub commands: String,
}

impl Topics {
    /// Builds the topic pair: `<base>/farm/<farmId>/sensor/data` and
    /// `<base>/farm/<farmId>/commands`.
    pub fn for_farm(base_topic: &str, farm_id: &str) -> Self {
        let base = base_topic.trim_end_matches('/');
        Self {
            data: format!("{base}/farm/{farm_id}/sensor/data"),
            commands: format!("{base}/farm/{farm_id}/commands"),
        }
    }
}

/// A secured MQTT session to the telemetry broker.
pub struct MqttLink {
    client: AsyncClient,
    event_loop: EventLoop,
    topics: Topics,
    state: LinkState,
    broker: String,
    connection_timeout: Duration,
    ack_timeout: Duration,
}

impl MqttLink {
    /// Builds a link from the transport configuration.
    ///
    /// Reads TLS material from disk if configured. No network traffic
    /// happens here — the session is established by the first `connect()`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::TlsMaterial`] if a configured certificate or
    /// key file cannot be read.
    pub fn from_config(
        config: &Config,
        farm_id: &str,
        device_id: &str,
    ) -> Result<Self, LinkError> {
        let client_id = config.effective_client_id(device_id);
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive));
        options.set_clean_session(true);

        if let Some(tls) = &config.tls {
            options.set_transport(Transport::Tls(build_tls(tls)?));
        }

        let (client, event_loop) = AsyncClient::new(options, 10);
        let topics = Topics::for_farm(&config.base_topic, farm_id);
        debug!(
            "MQTT link prepared: broker {}:{}, data topic '{}'",
            config.host, config.port, topics.data
        );

        Ok(Self {
            client,
            event_loop,
            topics,
            state: LinkState::Disconnected("not yet connected".into()),
            broker: format!("{}:{}", config.host, config.port),
            connection_timeout: Duration::from_secs(config.connection_timeout),
            ack_timeout: Duration::from_secs(config.ack_timeout),
        })
    }

    /// Current link state, for logging and flush decisions.
    pub fn state(&self) -> &LinkState {
        &self.state
    }

    /// The topic pair this link publishes and listens on.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Pumps the event loop until CONNACK or failure.
    async fn drive_until_connack(&mut self) -> Result<(), LinkError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        return Ok(());
                    }
                    return Err(LinkError::Refused(ack.code));
                }
                Ok(event) => self.observe(&event),
                Err(e) => return Err(LinkError::Connection(e)),
            }
        }
    }

    /// Pumps the event loop until the single in-flight publish is
    /// acknowledged.
    async fn drive_until_puback(&mut self) -> Result<(), LinkError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                Ok(event) => self.observe(&event),
                Err(e) => return Err(LinkError::Connection(e)),
            }
        }
    }

    /// Handles packets we are not waiting for. Command traffic is logged
    /// and never acted upon.
    fn observe(&mut self, event: &Event) {
        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                if publish.topic == self.topics.commands {
                    info!(
                        "command received on '{}': {}",
                        publish.topic,
                        String::from_utf8_lossy(&publish.payload)
                    );
                } else {
                    trace!("unexpected publish on '{}'", publish.topic);
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("disconnected by broker");
                self.state = LinkState::Disconnected("disconnected by broker".into());
            }
            Event::Incoming(_) | Event::Outgoing(_) => {}
        }
    }

    /// Registers the command-topic subscription after a fresh session.
    /// Best-effort: a failed subscribe never fails the connect.
    async fn subscribe_commands(&mut self) {
        match self
            .client
            .subscribe(self.topics.commands.clone(), QoS::AtLeastOnce)
            .await
        {
            Ok(()) => debug!("subscribed to '{}'", self.topics.commands),
            Err(e) => warn!("failed to subscribe to '{}': {e}", self.topics.commands),
        }
    }
}

#[async_trait::async_trait]
impl Link for MqttLink {
    async fn connect(&mut self) -> Result<(), LinkError> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = LinkState::Connecting;
        debug!("connecting to {}...", self.broker);

        match tokio::time::timeout(self.connection_timeout, self.drive_until_connack()).await {
            Ok(Ok(())) => {
                self.state = LinkState::Connected;
                info!("connected to {}", self.broker);
                self.subscribe_commands().await;
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("connect to {} failed: {e}", self.broker);
                self.state = LinkState::Disconnected(e.to_string());
                Err(e)
            }
            Err(_) => {
                let e = LinkError::ConnectTimeout(self.connection_timeout);
                warn!("connect to {} failed: {e}", self.broker);
                self.state = LinkState::Disconnected(e.to_string());
                Err(e)
            }
        }
    }

    async fn publish(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        if !self.state.is_connected() {
            return Err(LinkError::NotConnected);
        }

        self.state = LinkState::Publishing;
        if let Err(e) = self
            .client
            .publish(
                self.topics.data.clone(),
                QoS::AtLeastOnce,
                false,
                payload.to_vec(),
            )
            .await
        {
            self.state = LinkState::Disconnected(e.to_string());
            return Err(LinkError::Client(e));
        }

        match tokio::time::timeout(self.ack_timeout, self.drive_until_puback()).await {
            Ok(Ok(())) => {
                trace!("publish acknowledged on '{}'", self.topics.data);
                self.state = LinkState::Connected;
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = LinkState::Disconnected(e.to_string());
                Err(e)
            }
            Err(_) => {
                let e = LinkError::AckTimeout(self.ack_timeout);
                self.state = LinkState::Disconnected(e.to_string());
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    async fn service(&mut self) {
        if !self.state.is_connected() {
            return;
        }

        match tokio::time::timeout(SERVICE_POLL, self.event_loop.poll()).await {
            // Nothing due on the wire within the slice.
            Err(_) => {}
            Ok(Ok(event)) => self.observe(&event),
            Ok(Err(e)) => {
                warn!("link dropped while idle: {e}");
                self.state = LinkState::Disconnected(e.to_string());
            }
        }
    }
}

/// Loads the PEM material referenced by the TLS config.
fn build_tls(tls: &TlsConfig) -> Result<TlsConfiguration, LinkError> {
    let read = |path: &str| {
        std::fs::read(path).map_err(|source| LinkError::TlsMaterial {
            path: path.to_string(),
            source,
        })
    };

    let ca = read(&tls.ca_cert_path)?;
    let client_auth = match (&tls.client_cert_path, &tls.client_key_path) {
        (Some(cert), Some(key)) => Some((read(cert)?, read(key)?)),
        _ => None,
    };

    Ok(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    })
}
