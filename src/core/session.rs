//! Purpose: Session configuration handed to a transport on connect.
//! Exports: `SessionConfig`, `Version`, `AuthProtocol`, `PrivProtocol`, `SecurityLevel`,
//!          `UsmSecurity`, `split_target`.
//! Role: Validated, explicit replacement for mutable per-session protocol state.
//! Role: Round-trip tuning (timeouts, retries, bulk sizes) belongs to each transport, not here.
//! Invariants: Privacy without authentication never validates.
//! Invariants: Targets always resolve to a host and a port (161 when omitted).
use crate::core::error::Error;
use std::fmt;

pub const DEFAULT_PORT: u16 = 161;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Version {
    V1,
    V2c,
    V3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthProtocol {
    NoAuth,
    Md5,
    Sha,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrivProtocol {
    NoPriv,
    Des,
    Aes,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SecurityLevel::NoAuthNoPriv => "noAuthNoPriv",
            SecurityLevel::AuthNoPriv => "authNoPriv",
            SecurityLevel::AuthPriv => "authPriv",
        };
        f.write_str(label)
    }
}

/// User-based security parameters for v3 sessions.
#[derive(Clone, Eq, PartialEq)]
pub struct UsmSecurity {
    pub user_name: String,
    pub auth_protocol: AuthProtocol,
    pub auth_passphrase: String,
    pub priv_protocol: PrivProtocol,
    pub priv_passphrase: String,
}

impl fmt::Debug for UsmSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsmSecurity")
            .field("user_name", &self.user_name)
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_protocol", &self.priv_protocol)
            .finish_non_exhaustive()
    }
}

impl UsmSecurity {
    /// Builds parameters from `protocol:passphrase` strings; empty strings mean none.
    pub fn parse(user_name: &str, auth: &str, privacy: &str) -> Result<Self, Error> {
        let (auth_protocol, auth_passphrase) = parse_auth(auth)?;
        let (priv_protocol, priv_passphrase) = parse_priv(privacy)?;
        let security = Self {
            user_name: user_name.to_string(),
            auth_protocol,
            auth_passphrase,
            priv_protocol,
            priv_passphrase,
        };
        security.level()?;
        Ok(security)
    }

    pub fn level(&self) -> Result<SecurityLevel, Error> {
        match (self.auth_protocol, self.priv_protocol) {
            (AuthProtocol::NoAuth, PrivProtocol::NoPriv) => Ok(SecurityLevel::NoAuthNoPriv),
            (AuthProtocol::NoAuth, _) => Err(Error::usage("privacy given with no authentication")
                .with_hint("Pass an auth protocol and passphrase, e.g. sha:secret.")),
            (_, PrivProtocol::NoPriv) => Ok(SecurityLevel::AuthNoPriv),
            (_, _) => Ok(SecurityLevel::AuthPriv),
        }
    }
}

fn split_secret<'a>(text: &'a str, what: &str) -> Result<(&'a str, String), Error> {
    match text.split_once(':') {
        Some((protocol, passphrase)) => Ok((protocol, passphrase.to_string())),
        None if text.is_empty() => Ok(("", String::new())),
        None => Err(Error::usage(format!("{what} password given with no protocol"))
            .with_hint("Use the form <protocol>:<passphrase>.")),
    }
}

fn parse_auth(text: &str) -> Result<(AuthProtocol, String), Error> {
    let (protocol, passphrase) = split_secret(text, "authentication")?;
    let protocol = match protocol.to_ascii_lowercase().as_str() {
        "md5" => AuthProtocol::Md5,
        "sha" => AuthProtocol::Sha,
        "" if text.is_empty() => AuthProtocol::NoAuth,
        other => {
            return Err(Error::usage(format!(
                "authentication password given with invalid protocol: {other:?}"
            ))
            .with_hint("Supported: md5, sha."));
        }
    };
    Ok((protocol, passphrase))
}

fn parse_priv(text: &str) -> Result<(PrivProtocol, String), Error> {
    let (protocol, passphrase) = split_secret(text, "privacy")?;
    let protocol = match protocol.to_ascii_lowercase().as_str() {
        "aes" => PrivProtocol::Aes,
        "des" => PrivProtocol::Des,
        "" if text.is_empty() => PrivProtocol::NoPriv,
        other => {
            return Err(Error::usage(format!(
                "privacy password given with invalid protocol: {other:?}"
            ))
            .with_hint("Supported: aes, des."));
        }
    };
    Ok((protocol, passphrase))
}

/// Splits `host[:port]` (IPv6 hosts in brackets); the port may be a service name.
pub fn split_target(target: &str) -> Result<(String, u16), Error> {
    let target = target.trim();
    if target.is_empty() {
        return Err(Error::usage("target is empty"));
    }
    if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::usage(format!("missing ']' in target {target:?}")))?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), lookup_port(port)?)),
            None if after.is_empty() => Ok((host.to_string(), DEFAULT_PORT)),
            None => Err(Error::usage(format!("unexpected text after ']' in {target:?}"))),
        };
    }
    match target.rsplit_once(':') {
        // bare IPv6 literal without brackets
        Some((host, _)) if host.contains(':') => Ok((target.to_string(), DEFAULT_PORT)),
        Some((host, port)) => Ok((host.to_string(), lookup_port(port)?)),
        None => Ok((target.to_string(), DEFAULT_PORT)),
    }
}

fn lookup_port(port: &str) -> Result<u16, Error> {
    match port {
        "snmp" => Ok(161),
        "snmptrap" => Ok(162),
        _ => port.parse::<u16>().map_err(|err| {
            Error::usage(format!("unknown port {port:?}")).with_source(err)
        }),
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub version: Version,
    pub community: String,
    pub security: Option<UsmSecurity>,
}

impl SessionConfig {
    fn base(target: &str, version: Version) -> Result<Self, Error> {
        let (host, port) = split_target(target)?;
        Ok(Self {
            host,
            port,
            version,
            community: String::new(),
            security: None,
        })
    }

    pub fn v1(target: &str, community: &str) -> Result<Self, Error> {
        let mut config = Self::base(target, Version::V1)?;
        config.community = community.to_string();
        Ok(config)
    }

    pub fn v2c(target: &str, community: &str) -> Result<Self, Error> {
        let mut config = Self::base(target, Version::V2c)?;
        config.community = community.to_string();
        Ok(config)
    }

    pub fn v3(target: &str, user_name: &str, auth: &str, privacy: &str) -> Result<Self, Error> {
        let mut config = Self::base(target, Version::V3)?;
        config.security = Some(UsmSecurity::parse(user_name, auth, privacy)?);
        Ok(config)
    }

    pub fn security_level(&self) -> Result<SecurityLevel, Error> {
        match &self.security {
            Some(security) => security.level(),
            None => Ok(SecurityLevel::NoAuthNoPriv),
        }
    }

    pub fn set_target(&mut self, target: &str) -> Result<(), Error> {
        let (host, port) = split_target(target)?;
        self.host = host;
        self.port = port;
        Ok(())
    }

    pub fn set_security(&mut self, user_name: &str, auth: &str, privacy: &str) -> Result<(), Error> {
        self.security = Some(UsmSecurity::parse(user_name, auth, privacy)?);
        Ok(())
    }

    pub fn set_community(&mut self, community: &str) {
        self.community = community.to_string();
    }

    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
