//! Broker, queue and processor configuration

use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sensor::generate_sensor_id;

/// Default broker port (AMQP 0-9-1)
pub const DEFAULT_PORT: u16 = 5672;

/// Default per-queue message TTL
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_millis(30);

/// Broker connection and routing configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker host name or address
    pub host: String,

    /// Broker port
    pub port: u16,

    /// Topic exchange name
    pub exchange: String,

    /// Sender identifier used as the first routing word.
    /// A UUID is generated when unset.
    pub sender_id: Option<String>,

    pub username: String,
    pub password: String,

    /// Binding key for body subscriptions
    pub body_binding_key: String,

    /// Binding key for gesture subscriptions
    pub gesture_binding_key: String,

    /// Options for queues declared by subscriptions
    pub queue: QueueOptions,

    /// Sitting heuristic parameters
    pub sitting: SittingConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            exchange: "skeleton".into(),
            sender_id: None,
            username: "guest".into(),
            password: "guest".into(),
            body_binding_key: "*.body".into(),
            gesture_binding_key: "*.gesture".into(),
            queue: QueueOptions::default(),
            sitting: SittingConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Create a config for an exchange with default connection settings
    pub fn with_exchange(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            ..Default::default()
        }
    }

    /// Read `SKELETON_BUS_*` environment variables over the defaults
    ///
    /// Recognised: `HOST`, `PORT`, `EXCHANGE`, `SENDER_ID`, `USERNAME`,
    /// `PASSWORD`, `BODY_BINDING_KEY`, `GESTURE_BINDING_KEY`, `TTL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        if let Some(exchange) = var("EXCHANGE") {
            config.exchange = exchange;
        }
        config.sender_id = var("SENDER_ID");
        if let Some(username) = var("USERNAME") {
            config.username = username;
        }
        if let Some(password) = var("PASSWORD") {
            config.password = password;
        }
        if let Some(key) = var("BODY_BINDING_KEY") {
            config.body_binding_key = key;
        }
        if let Some(key) = var("GESTURE_BINDING_KEY") {
            config.gesture_binding_key = key;
        }
        if let Some(ttl) = var("TTL_MS") {
            let ms: u64 = ttl.parse().map_err(|_| ConfigError::InvalidTtl)?;
            config.queue.message_ttl = Some(Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the broker host and port
    pub fn broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the exchange name
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Set the sender identifier
    pub fn sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Set broker credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the body subscription binding key
    pub fn body_binding_key(mut self, key: impl Into<String>) -> Self {
        self.body_binding_key = key.into();
        self
    }

    /// Set the gesture subscription binding key
    pub fn gesture_binding_key(mut self, key: impl Into<String>) -> Self {
        self.gesture_binding_key = key.into();
        self
    }

    /// Set queue options
    pub fn queue(mut self, queue: QueueOptions) -> Self {
        self.queue = queue;
        self
    }

    /// Set sitting heuristic parameters
    pub fn sitting(mut self, sitting: SittingConfig) -> Self {
        self.sitting = sitting;
        self
    }

    /// Check required settings before anything connects
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.is_empty() {
            return Err(ConfigError::MissingExchange);
        }
        if self.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if let Some(id) = &self.sender_id {
            if id.is_empty() || id.contains(['.', '*', '#']) {
                return Err(ConfigError::InvalidSenderId(id.clone()));
            }
        }
        self.queue.validate()?;
        self.sitting.validate()
    }

    /// The configured sender id, or a freshly generated one
    pub fn resolved_sender_id(&self) -> String {
        self.sender_id.clone().unwrap_or_else(generate_sensor_id)
    }

    /// AMQP URI with credentials and the default vhost
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.username, self.password, self.host, self.port
        )
    }
}

fn var(name: &str) -> Option<String> {
    env::var(format!("SKELETON_BUS_{}", name))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Options for a subscription's broker-side queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Messages older than this are discarded before delivery (None = keep)
    pub message_ttl: Option<Duration>,

    /// Delete the queue once its consumer goes away
    pub auto_delete: bool,

    /// Queue is private to the declaring connection
    pub exclusive: bool,

    /// In-flight deliveries buffered between broker and mailbox.
    /// Oldest are dropped when the consumer lags.
    pub delivery_capacity: usize,

    /// Sleep between slot checks in `dequeue_blocking`
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            message_ttl: Some(DEFAULT_MESSAGE_TTL),
            auto_delete: true,
            exclusive: true,
            delivery_capacity: 16,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl QueueOptions {
    /// Set the message TTL
    pub fn message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = Some(ttl);
        self
    }

    /// Keep messages regardless of age
    pub fn no_ttl(mut self) -> Self {
        self.message_ttl = None;
        self
    }

    /// Set the delivery buffer capacity (at least 1)
    pub fn delivery_capacity(mut self, capacity: usize) -> Self {
        self.delivery_capacity = capacity.max(1);
        self
    }

    /// Set the blocking dequeue poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.message_ttl {
            Some(ttl) if ttl.is_zero() => Err(ConfigError::InvalidTtl),
            _ => Ok(()),
        }
    }
}

/// Sitting heuristic parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SittingConfig {
    /// Height of the sensor above the floor, in meters
    pub sensor_height: f32,

    /// Maximum knee/hip ratio difference still counted as sitting
    pub min_proportion: f32,
}

impl Default for SittingConfig {
    fn default() -> Self {
        Self {
            sensor_height: 2.0,
            min_proportion: 0.1,
        }
    }
}

impl SittingConfig {
    pub fn new(sensor_height: f32, min_proportion: f32) -> Self {
        Self {
            sensor_height,
            min_proportion,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sensor_height.is_finite() {
            return Err(ConfigError::InvalidSittingParameter("sensor_height"));
        }
        if !self.min_proportion.is_finite() || self.min_proportion <= 0.0 {
            return Err(ConfigError::InvalidSittingParameter("min_proportion"));
        }
        Ok(())
    }
}
