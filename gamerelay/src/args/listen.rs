use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use gamerelay_proto::version::GameVersion;

use super::ListenSpec;

#[derive(Debug, PartialEq, Eq)]
pub enum ListenSpecErrorType {
    UnexpectedEnd(String),
    MissingVersion(String, String),
    InvalidPort(String, String),
    InvalidVersion(String, String),
    InvalidDestination(String, String),
}

impl fmt::Display for ListenSpecErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected PORT:VERSION[:DESTINATION] after {arg}"),
            Self::MissingVersion(arg, arg2) => write!(f, "Missing game version after {arg}: {arg2}"),
            Self::InvalidPort(arg, port) => write!(f, "Invalid port number after {arg}: {port}"),
            Self::InvalidVersion(arg, version) => write!(f, "Unknown game version after {arg}: {version}"),
            Self::InvalidDestination(arg, dest) => write!(f, "Invalid destination address after {arg}: {dest}"),
        }
    }
}

/// Parses a `PORT:VERSION[:DESTINATION]` argument. The destination may be a domain name, in which
/// case the first address it resolves to is used.
pub(super) fn parse_listen_spec_arg(arg: String, maybe_arg2: Option<String>) -> Result<ListenSpec, ListenSpecErrorType> {
    let arg2 = match maybe_arg2 {
        Some(value) => value,
        None => return Err(ListenSpecErrorType::UnexpectedEnd(arg)),
    };

    let mut parts = arg2.splitn(3, ':');
    let port_str = parts.next().unwrap_or_default();
    let version_str = match parts.next() {
        Some(s) if !s.is_empty() => s,
        _ => return Err(ListenSpecErrorType::MissingVersion(arg, arg2)),
    };
    let destination_str = parts.next();

    let port = match port_str.parse::<u16>() {
        Ok(port) => port,
        Err(_) => return Err(ListenSpecErrorType::InvalidPort(arg, port_str.to_string())),
    };

    let version = match version_str.parse::<GameVersion>() {
        Ok(version) => version,
        Err(_) => return Err(ListenSpecErrorType::InvalidVersion(arg, version_str.to_string())),
    };

    let default_destination = match destination_str {
        None => None,
        Some(dest) => Some(resolve_destination(dest).ok_or_else(|| ListenSpecErrorType::InvalidDestination(arg, dest.to_string()))?),
    };

    Ok(ListenSpec::new(port, version, default_destination))
}

fn resolve_destination(dest: &str) -> Option<SocketAddr> {
    if let Ok(address) = dest.parse::<SocketAddr>() {
        return Some(address);
    }

    dest.to_socket_addrs().ok()?.next()
}

#[derive(Debug, PartialEq, Eq)]
pub enum TimeoutErrorType {
    UnexpectedEnd(String),
    InvalidValue(String, String),
}

impl fmt::Display for TimeoutErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected a number of seconds after {arg}"),
            Self::InvalidValue(arg, arg2) => write!(f, "Invalid number of seconds after {arg}: {arg2}"),
        }
    }
}

pub(super) fn parse_timeout_arg(arg: String, maybe_arg2: Option<String>) -> Result<Duration, TimeoutErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(TimeoutErrorType::UnexpectedEnd(arg)),
    };

    match arg2.parse::<u64>() {
        Ok(secs) if secs != 0 => Ok(Duration::from_secs(secs)),
        _ => Err(TimeoutErrorType::InvalidValue(arg, arg2)),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use super::*;

    fn parse(s: &str) -> Result<ListenSpec, ListenSpecErrorType> {
        parse_listen_spec_arg("--listen".to_string(), Some(s.to_string()))
    }

    #[test]
    fn test_listen_spec_without_destination() {
        assert_eq!(parse("9100:gc"), Ok(ListenSpec::new(9100, GameVersion::Gc, None)));
    }

    #[test]
    fn test_listen_spec_with_destination() {
        let destination = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 9000));
        assert_eq!(parse("5100:BB:10.0.0.7:9000"), Ok(ListenSpec::new(5100, GameVersion::Bb, Some(destination))));
    }

    #[test]
    fn test_listen_spec_ipv6_destination() {
        let spec = parse("9000:dc:[::1]:9001").unwrap();
        assert_eq!(spec.default_destination, Some("[::1]:9001".parse().unwrap()));
    }

    #[test]
    fn test_listen_spec_errors() {
        assert_eq!(
            parse_listen_spec_arg("--listen".to_string(), None),
            Err(ListenSpecErrorType::UnexpectedEnd("--listen".to_string()))
        );
        assert!(matches!(parse("9100"), Err(ListenSpecErrorType::MissingVersion(_, _))));
        assert!(matches!(parse("70000:gc"), Err(ListenSpecErrorType::InvalidPort(_, _))));
        assert!(matches!(parse("9100:xbox"), Err(ListenSpecErrorType::InvalidVersion(_, _))));
        assert!(matches!(parse("9100:pc:not an address"), Err(ListenSpecErrorType::InvalidDestination(_, _))));
    }

    #[test]
    fn test_timeout() {
        assert_eq!(parse_timeout_arg("-t".to_string(), Some("30".to_string())), Ok(Duration::from_secs(30)));
        assert!(parse_timeout_arg("-t".to_string(), Some("0".to_string())).is_err());
        assert!(parse_timeout_arg("-t".to_string(), Some("soon".to_string())).is_err());
    }
}
