use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

use super::error::{Result, RunError};

/// Fully resolved, backend-submittable description of a container to start.
///
/// Built once per invocation by [`super::options::RunOptions::into_launch_request`]
/// and moved into [`super::service::ContainerService::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLaunchRequest {
    /// User-supplied name, or a generated one when `--name` was not given
    pub id: String,
    pub image: String,
    pub command: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub labels: IndexMap<String, String>,
    pub env: IndexMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub cpus: f64,
    pub memory: Option<MemoryQuantity>,
    pub restart_policy: RestartPolicy,
    pub domain_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        };
        f.write_str(s)
    }
}

/// One published port. `host_port` of `None` lets the backend pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Parse `[HOST_IP:][HOST_PORT:]CONTAINER_PORT[/PROTO]`.
    ///
    /// Ranges (`8000-8001:80-81`) expand to one mapping per port; host and
    /// container ranges must have the same length.
    pub fn parse_spec(spec: &str) -> Result<Vec<PortMapping>> {
        let invalid = |msg: &str| RunError::validation("publish", format!("{}: {}", spec, msg));

        let (addr, protocol) = match spec.rsplit_once('/') {
            Some((addr, proto)) => {
                let protocol = match proto.to_ascii_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    "sctp" => Protocol::Sctp,
                    _ => return Err(invalid("unknown protocol")),
                };
                (addr, protocol)
            }
            None => (spec, Protocol::Tcp),
        };

        // Bracketed IPv6 host address: [::1]:8080:80
        let (host_ip, rest) = if let Some(stripped) = addr.strip_prefix('[') {
            let (ip, rest) = stripped
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            let rest = rest
                .strip_prefix(':')
                .ok_or_else(|| invalid("expected ':' after host address"))?;
            (Some(ip.to_string()), rest)
        } else {
            (None, addr)
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (host_ip, host, container) = match (host_ip, parts.as_slice()) {
            (None, [container]) => (None, None, *container),
            (None, [host, container]) => (None, Some(*host), *container),
            (None, [ip, host, container]) => (Some(ip.to_string()), Some(*host), *container),
            (Some(ip), [host, container]) => (Some(ip), Some(*host), *container),
            _ => return Err(invalid("expected [HOST_IP:][HOST_PORT:]CONTAINER_PORT")),
        };
        let host_ip = host_ip.filter(|ip| !ip.is_empty());
        let host = host.filter(|h| !h.is_empty());

        let (c_start, c_end) = parse_port_range(container).map_err(|e| invalid(e.as_str()))?;
        let host_range = host
            .map(|h| parse_port_range(h).map_err(|e| invalid(e.as_str())))
            .transpose()?;

        if let Some((h_start, h_end)) = host_range {
            if h_end - h_start != c_end - c_start {
                return Err(invalid("host and container port ranges differ in length"));
            }
        }

        Ok((0..=(c_end - c_start))
            .map(|offset| PortMapping {
                host_ip: host_ip.clone(),
                host_port: host_range.map(|(h_start, _)| h_start + offset),
                container_port: c_start + offset,
                protocol,
            })
            .collect())
    }
}

fn parse_port_range(s: &str) -> std::result::Result<(u16, u16), String> {
    let parse_one = |p: &str| -> std::result::Result<u16, String> {
        match p.parse::<u16>() {
            Ok(0) | Err(_) => Err(format!("invalid port '{}'", p)),
            Ok(port) => Ok(port),
        }
    };

    match s.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse_one(start)?, parse_one(end)?);
            if start > end {
                return Err(format!("invalid port range '{}'", s));
            }
            Ok((start, end))
        }
        None => {
            let port = parse_one(s)?;
            Ok((port, port))
        }
    }
}

/// A volume or bind mount: `SOURCE[:TARGET][:ro|rw]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: String,
    pub target: Option<String>,
    pub read_only: bool,
}

impl FromStr for VolumeMount {
    type Err = RunError;

    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |msg: &str| RunError::validation("volume", format!("{}: {}", spec, msg));

        let parse_mode = |mode: &str| match mode {
            "ro" => Ok(true),
            "rw" => Ok(false),
            _ => Err(invalid("mode must be 'ro' or 'rw'")),
        };

        let parts: Vec<&str> = spec.split(':').collect();
        let (source, target, read_only) = match parts.as_slice() {
            [source] => (*source, None, false),
            [source, mode @ ("ro" | "rw")] => (*source, None, parse_mode(*mode)?),
            [source, target] => (*source, Some(*target), false),
            [source, target, mode] => (*source, Some(*target), parse_mode(*mode)?),
            _ => return Err(invalid("expected SOURCE[:TARGET][:ro|rw]")),
        };

        if source.is_empty() {
            return Err(invalid("source is empty"));
        }
        if let Some(target) = target {
            if !target.starts_with('/') {
                return Err(invalid("target must be an absolute path"));
            }
        }

        Ok(Self {
            source: source.to_string(),
            target: target.map(str::to_string),
            read_only,
        })
    }
}

/// What the backend does when the container exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    #[default]
    None,
    Always,
    OnFailure,
}

impl RestartPolicy {
    pub const ACCEPTED: &'static [&'static str] = &["none", "no", "always", "any", "on-failure"];
}

impl FromStr for RestartPolicy {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "none" | "no" => Ok(Self::None),
            "always" | "any" => Ok(Self::Always),
            "on-failure" => Ok(Self::OnFailure),
            other => Err(RunError::validation(
                "restart",
                format!(
                    "unknown restart policy '{}' (expected one of: {})",
                    other,
                    Self::ACCEPTED.join(", ")
                ),
            )),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Always => "always",
            Self::OnFailure => "on-failure",
        };
        f.write_str(s)
    }
}

/// A memory limit in bytes, parsed from strings like `512m`, `1.5g`, `2GiB`.
///
/// Units are binary (`1k` = 1024 bytes) and case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryQuantity(u64);

impl MemoryQuantity {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for MemoryQuantity {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |msg: &str| RunError::validation("memory", format!("'{}': {}", s, msg));

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let value: f64 = number.parse().map_err(|_| invalid("not a number"))?;
        let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "ki" | "kib" => 1 << 10,
            "m" | "mb" | "mi" | "mib" => 1 << 20,
            "g" | "gb" | "gi" | "gib" => 1 << 30,
            "t" | "tb" | "ti" | "tib" => 1 << 40,
            _ => return Err(invalid("unknown unit")),
        };

        let bytes = value * multiplier as f64;
        if !bytes.is_finite() || bytes < 1.0 {
            return Err(invalid("quantity must be positive"));
        }
        if bytes > u64::MAX as f64 {
            return Err(invalid("quantity too large"));
        }
        Ok(Self(bytes as u64))
    }
}

impl fmt::Display for MemoryQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 4] = [(1 << 40, "TiB"), (1 << 30, "GiB"), (1 << 20, "MiB"), (1 << 10, "KiB")];
        for (size, unit) in UNITS {
            if self.0 >= size && self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, unit);
            }
        }
        write!(f, "{}B", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_container_only() {
        let ports = PortMapping::parse_spec("80").unwrap();
        assert_eq!(
            ports,
            vec![PortMapping {
                host_ip: None,
                host_port: None,
                container_port: 80,
                protocol: Protocol::Tcp,
            }]
        );
    }

    #[test]
    fn test_port_host_and_container() {
        let ports = PortMapping::parse_spec("8080:80").unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].host_port, Some(8080));
        assert_eq!(ports[0].container_port, 80);
    }

    #[test]
    fn test_port_with_ip_and_protocol() {
        let ports = PortMapping::parse_spec("127.0.0.1:5353:53/udp").unwrap();
        assert_eq!(ports[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[0].host_port, Some(5353));
        assert_eq!(ports[0].protocol, Protocol::Udp);
    }

    #[test]
    fn test_port_ip_with_empty_host_port() {
        let ports = PortMapping::parse_spec("127.0.0.1::80").unwrap();
        assert_eq!(ports[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[0].host_port, None);
    }

    #[test]
    fn test_port_ipv6_host() {
        let ports = PortMapping::parse_spec("[::1]:8080:80").unwrap();
        assert_eq!(ports[0].host_ip.as_deref(), Some("::1"));
        assert_eq!(ports[0].host_port, Some(8080));
    }

    #[test]
    fn test_port_range_expands_in_order() {
        let ports = PortMapping::parse_spec("8000-8002:80-82").unwrap();
        let pairs: Vec<(Option<u16>, u16)> = ports
            .iter()
            .map(|p| (p.host_port, p.container_port))
            .collect();
        assert_eq!(pairs, vec![(Some(8000), 80), (Some(8001), 81), (Some(8002), 82)]);
    }

    #[test]
    fn test_port_rejects_bad_specs() {
        for spec in ["", "abc", "0", "70000", "80/icmp", "1:2:3:4", "8000-8001:80", "90-80", "[::1"] {
            assert!(
                matches!(PortMapping::parse_spec(spec), Err(RunError::Validation { field: "publish", .. })),
                "expected {:?} to be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_volume_forms() {
        let v: VolumeMount = "data".parse().unwrap();
        assert_eq!((v.source.as_str(), v.target, v.read_only), ("data", None, false));

        let v: VolumeMount = "./src:/app:ro".parse().unwrap();
        assert_eq!(v.source, "./src");
        assert_eq!(v.target.as_deref(), Some("/app"));
        assert!(v.read_only);

        let v: VolumeMount = "share:ro".parse().unwrap();
        assert_eq!(v.target, None);
        assert!(v.read_only);
    }

    #[test]
    fn test_volume_rejects_relative_target_and_bad_mode() {
        assert!("src:app".parse::<VolumeMount>().is_err());
        assert!("src:/app:rx".parse::<VolumeMount>().is_err());
        assert!(":/app".parse::<VolumeMount>().is_err());
        assert!("a:/b:ro:extra".parse::<VolumeMount>().is_err());
    }

    #[test]
    fn test_restart_policy_aliases() {
        assert_eq!("no".parse::<RestartPolicy>().unwrap(), RestartPolicy::None);
        assert_eq!("none".parse::<RestartPolicy>().unwrap(), RestartPolicy::None);
        assert_eq!("any".parse::<RestartPolicy>().unwrap(), RestartPolicy::Always);
        assert_eq!("on-failure".parse::<RestartPolicy>().unwrap(), RestartPolicy::OnFailure);
        assert!("sometimes".parse::<RestartPolicy>().is_err());
    }

    #[test]
    fn test_memory_units() {
        assert_eq!("512m".parse::<MemoryQuantity>().unwrap().bytes(), 512 * 1024 * 1024);
        assert_eq!("1G".parse::<MemoryQuantity>().unwrap().bytes(), 1 << 30);
        assert_eq!("1.5GiB".parse::<MemoryQuantity>().unwrap().bytes(), 3 << 29);
        assert_eq!("4096".parse::<MemoryQuantity>().unwrap().bytes(), 4096);
    }

    #[test]
    fn test_memory_rejects_invalid() {
        for s in ["", "0", "0m", "-1g", "ten", "5x", "1.2.3m"] {
            assert!(s.parse::<MemoryQuantity>().is_err(), "expected {:?} to be rejected", s);
        }
    }

    #[test]
    fn test_memory_display() {
        assert_eq!("512m".parse::<MemoryQuantity>().unwrap().to_string(), "512MiB");
        assert_eq!("1000".parse::<MemoryQuantity>().unwrap().to_string(), "1000B");
    }
}
