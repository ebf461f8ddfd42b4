use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

/// Configuration for the flow endpoint service.
///
/// Only non-secret settings live in the config file; the app secret and the
/// private key passphrase come from the environment at startup.
#[derive(Debug, Deserialize)]
pub struct FlowServiceConfig {
    /// Address and port the service binds to.
    pub service_bind_address: String,

    /// Path to the passphrase-protected PEM private key file. Ignored when
    /// the key material is provided directly through the environment.
    pub private_key_path: Option<String>,

    /// Token expected in the platform's webhook verification handshake.
    pub webhook_verify_token: String,
}

impl FlowServiceConfig {
    /// Creates a new `FlowServiceConfig` instance from a configuration file.
    ///
    /// # Arguments
    ///
    /// * `config_file_path` - Path to the configuration file. The file should
    ///   be in a format supported by the `config` crate (e.g., YAML, JSON,
    ///   TOML) and contain a "flowgate_service" section with the required
    ///   configuration fields.
    ///
    /// # Panics
    ///
    /// This method will panic if:
    /// * The configuration file cannot be read or parsed
    /// * The "flowgate_service" section is missing from the configuration
    /// * The configuration format doesn't match the expected structure
    pub fn from_file_path<P: AsRef<Path>>(config_file_path: P) -> Self {
        let builder = Config::builder()
            .add_source(File::with_name(config_file_path.as_ref().to_str().unwrap()))
            .add_source(
                config::Environment::with_prefix("FLOWGATE_SERVICE")
                    .keep_prefix(true)
                    .separator("__"),
            );
        let config = builder
            .build()
            .expect("Failed to generate flowgate-service configuration file");
        config
            .get::<Self>("flowgate_service")
            .expect("Failed to generate configuration instance")
    }
}
