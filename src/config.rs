//! Server configuration from command-line flags.
//!
//! Supported flags: `--port <int>` (default 6379), `--dir <path>` and
//! `--dbfilename <name>` for the snapshot file, and `--replicaof
//! "<host> <port>"` (a single space-separated string) to run as a replica.
//! The configuration is immutable after startup.

use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 6379;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("unknown command line flag: {0}")]
    UnknownFlag(String),
    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),
    #[error("invalid port flag value")]
    InvalidPort,
    #[error("invalid master address")]
    InvalidMasterAddress,
    #[error("invalid master port")]
    InvalidMasterPort,
}

/// The role this node plays in a primary/replica pair.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Role {
    Primary,
    Replica,
}

impl Role {
    /// The wire name used by INFO; replicas report as "slave" to match the
    /// Redis convention.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "master",
            Role::Replica => "slave",
        }
    }
}

/// Endpoint of the primary this node replicates from.
#[derive(Debug, PartialEq, Clone)]
pub struct MasterEndpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
    pub replica_of: Option<MasterEndpoint>,
}

impl ServerConfig {
    /// Builds a configuration from command-line arguments, skipping the
    /// program name.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut iter = args.into_iter().skip(1);
        let mut config = ServerConfig {
            port: DEFAULT_PORT,
            dir: None,
            dbfilename: None,
            replica_of: None,
        };

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                    config.port = validate_port(&value, CliError::InvalidPort)?;
                }
                "--dir" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                    config.dir = Some(value);
                }
                "--dbfilename" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                    config.dbfilename = Some(value);
                }
                "--replicaof" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                    config.replica_of = Some(validate_master_address(&value)?);
                }
                _ => return Err(CliError::UnknownFlag(arg)),
            }
        }

        Ok(config)
    }

    pub fn role(&self) -> Role {
        if self.replica_of.is_some() {
            Role::Replica
        } else {
            Role::Primary
        }
    }

    pub fn is_primary(&self) -> bool {
        self.role() == Role::Primary
    }

    /// Path of the snapshot file, when one is configured. GET and KEYS read
    /// the snapshot instead of the live store iff this is `Some`.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.dbfilename.as_ref().map(|name| {
            let mut path = PathBuf::from(self.dir.as_deref().unwrap_or(""));
            path.push(name);
            path
        })
    }
}

fn validate_port(port: &str, error: CliError) -> Result<u16, CliError> {
    let port_number = port.parse::<u16>().map_err(|_| error.clone())?;

    if port_number == 0 {
        return Err(error);
    }

    Ok(port_number)
}

/// Validates a `"host port"` master address; the host may be an IPv4
/// address or a hostname.
fn validate_master_address(master_address: &str) -> Result<MasterEndpoint, CliError> {
    let ipv4_regex = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$")
        .map_err(|_| CliError::InvalidMasterAddress)?;
    let hostname_regex =
        Regex::new(r"^[a-zA-Z0-9\-\.]+$").map_err(|_| CliError::InvalidMasterAddress)?;

    let split_address = master_address.split_whitespace().collect::<Vec<&str>>();

    if split_address.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let host = split_address[0];

    let valid_host = if let Some(caps) = ipv4_regex.captures(host) {
        caps.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname_regex.is_match(host)
    };

    if !valid_host {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = validate_port(split_address[1], CliError::InvalidMasterPort)?;

    Ok(MasterEndpoint {
        host: host.to_string(),
        port,
    })
}
