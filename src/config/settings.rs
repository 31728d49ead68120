use std::path::Path;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// One section per service, plus the bus, the store and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub posts: ServiceSettings,
    pub users: ServiceSettings,
    pub bus: BusSettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

/// Address a service listens on.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServiceSettings {
    pub host: String,
    pub port: u16,
}

impl ServiceSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Limits of the event bus.
///
/// `max_registrations` caps listener registrations across all topics;
/// `channel_capacity` is the number of undelivered events a single listener
/// may hold before further events are dropped for it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusSettings {
    pub max_registrations: usize,
    pub channel_capacity: usize,
}

/// `path` is a base directory; every service keeps its own sled database
/// below it, since sled locks a database to one process.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreSettings {
    pub path: String,
    pub flush_on_write: bool,
}

impl StoreSettings {
    /// Settings for the database owned by `service`, at `<path>/<service>`.
    pub fn for_service(&self, service: &str) -> StoreSettings {
        StoreSettings {
            path: Path::new(&self.path).join(service).to_string_lossy().into_owned(),
            flush_on_write: self.flush_on_write,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub posts: Option<PartialServiceSettings>,
    pub users: Option<PartialServiceSettings>,
    pub bus: Option<PartialBusSettings>,
    pub store: Option<PartialStoreSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServiceSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBusSettings {
    pub max_registrations: Option<usize>,
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
    pub flush_on_write: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialServiceSettings {
    fn merge(self, default: ServiceSettings) -> ServiceSettings {
        ServiceSettings {
            host: self.host.unwrap_or(default.host),
            port: self.port.unwrap_or(default.port),
        }
    }
}

impl PartialSettings {
    /// Overlay whatever was specified on top of `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let bus = self.bus.unwrap_or_default();
        let store = self.store.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            posts: self.posts.unwrap_or_default().merge(default.posts),
            users: self.users.unwrap_or_default().merge(default.users),
            bus: BusSettings {
                max_registrations: bus
                    .max_registrations
                    .unwrap_or(default.bus.max_registrations),
                channel_capacity: bus
                    .channel_capacity
                    .unwrap_or(default.bus.channel_capacity),
            },
            store: StoreSettings {
                path: store.path.unwrap_or(default.store.path),
                flush_on_write: store.flush_on_write.unwrap_or(default.store.flush_on_write),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            posts: ServiceSettings {
                host: "127.0.0.1".to_string(),
                port: 4002,
            },
            users: ServiceSettings {
                host: "127.0.0.1".to_string(),
                port: 4001,
            },
            bus: BusSettings::default(),
            store: StoreSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            max_registrations: 1024,
            channel_capacity: 64,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "postbus_db".to_string(),
            flush_on_write: true,
        }
    }
}
