//! Broker connection settings shared by the producer and the DLQ consumer.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use rdkafka::config::ClientConfig;
use serde::{Deserialize, Serialize};
use crate::error::{ConsoleError, Result};

pub const DEFAULT_CLIENT_ID: &str = "kconsole";
pub const DEFAULT_SASL_MECHANISM: &str = "PLAIN";

// ---------- SecurityProtocol ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    Tls,
    SaslPlain,
    SaslTls,
}

impl SecurityProtocol {
    pub fn requires_tls(self) -> bool {
        matches!(self, SecurityProtocol::Tls | SecurityProtocol::SaslTls)
    }

    pub fn requires_sasl(self) -> bool {
        matches!(self, SecurityProtocol::SaslPlain | SecurityProtocol::SaslTls)
    }

    /// Value of librdkafka's `security.protocol`.
    pub fn wire_name(self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Tls => "ssl",
            SecurityProtocol::SaslPlain => "sasl_plaintext",
            SecurityProtocol::SaslTls => "sasl_ssl",
        }
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Tls => "tls",
            SecurityProtocol::SaslPlain => "sasl-plain",
            SecurityProtocol::SaslTls => "sasl-tls",
        };
        f.write_str(name)
    }
}

impl FromStr for SecurityProtocol {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "" | "plaintext" => Ok(SecurityProtocol::Plaintext),
            "tls" | "ssl" => Ok(SecurityProtocol::Tls),
            "sasl-plain" | "sasl-plaintext" => Ok(SecurityProtocol::SaslPlain),
            "sasl-tls" | "sasl-ssl" => Ok(SecurityProtocol::SaslTls),
            _ => Err(ConsoleError::Configuration(format!(
                "unknown security protocol '{}'; expected one of: plaintext, tls, sasl-plain, sasl-tls",
                s
            ))),
        }
    }
}

// ---------- ConnectionConfig ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub bootstrap_servers: Vec<String>,
    pub protocol: SecurityProtocol,
    pub ssl_ca_location: Option<PathBuf>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub sasl_mechanism: String,
    pub client_id: String,
}

impl ConnectionConfig {
    /// Accepts a comma separated bootstrap list (`host1:9092,host2:9092`).
    pub fn new(bootstrap: &str) -> Self {
        Self {
            bootstrap_servers: bootstrap
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            protocol: SecurityProtocol::Plaintext,
            ssl_ca_location: None,
            sasl_username: None,
            sasl_password: None,
            sasl_mechanism: DEFAULT_SASL_MECHANISM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    pub fn with_protocol(mut self, protocol: SecurityProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_sasl(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.sasl_username = Some(username.into());
        self.sasl_password = Some(password.into());
        self
    }

    pub fn with_ca_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_location = Some(path.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn bootstrap(&self) -> String {
        self.bootstrap_servers.join(",")
    }

    fn ca_location(&self) -> Option<&PathBuf> {
        self.ssl_ca_location.as_ref().filter(|p| !p.as_os_str().is_empty())
    }

    /// Checks the credential invariants without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.is_empty() {
            return Err(ConsoleError::Configuration("bootstrap server list is empty".to_string()));
        }

        if self.protocol.requires_sasl() {
            let user_ok = self.sasl_username.as_deref().is_some_and(|u| !u.trim().is_empty());
            let pass_ok = self.sasl_password.as_deref().is_some_and(|p| !p.is_empty());
            if !(user_ok && pass_ok) {
                return Err(ConsoleError::Configuration(format!(
                    "{} requires both SASL username and password",
                    self.protocol
                )));
            }
        }

        // An empty CA path means the system trust store; a given one must resolve.
        if self.protocol.requires_tls() {
            if let Some(ca) = self.ca_location() {
                if !ca.exists() {
                    return Err(ConsoleError::Configuration(format!(
                        "TLS CA certificate not found at {}",
                        ca.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Base librdkafka settings shared by producer and consumer.
    pub fn client_config(&self) -> ClientConfig {
        let mut conf = ClientConfig::new();
        conf.set("bootstrap.servers", self.bootstrap())
            .set("client.id", &self.client_id)
            .set("client.dns.lookup", "use_all_dns_ips")
            .set("security.protocol", self.protocol.wire_name());

        if self.protocol.requires_tls() {
            if let Some(ca) = self.ca_location() {
                conf.set("ssl.ca.location", ca.to_string_lossy().to_string());
            }
        }

        if self.protocol.requires_sasl() {
            conf.set("sasl.mechanism", &self.sasl_mechanism);
            if let Some(user) = &self.sasl_username {
                conf.set("sasl.username", user);
            }
            if let Some(pass) = &self.sasl_password {
                conf.set("sasl.password", pass);
            }
        }

        conf
    }
}
