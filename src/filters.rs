//! IP address filters available to recipe templates.
//!
//! `*_strict` filters fail rendering on invalid input, the lenient ones hand the
//! input back unchanged, and `is_*` filters answer with a boolean.

use minijinja::{Environment, Error, ErrorKind};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// An address with a prefix length, e.g. `10.0.0.1/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInterface {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl IpInterface {
    fn max_prefix(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// Parses `addr`, `addr/len` or, for IPv4, `addr/netmask` and `addr/hostmask`.
    pub fn parse(value: &str) -> Option<Self> {
        let (addr, prefix) = match value.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (value, None),
        };
        let addr: IpAddr = addr.parse().ok()?;
        let prefix = match prefix {
            Some(prefix) => parse_prefix(&addr, prefix)?,
            None => Self::max_prefix(&addr),
        };
        Some(Self { addr, prefix })
    }

    /// True when no bits are set past the prefix.
    pub fn is_network(&self) -> bool {
        match self.addr {
            IpAddr::V4(addr) => {
                let host = u32::MAX.checked_shr(u32::from(self.prefix)).unwrap_or(0);
                u32::from(addr) & host == 0
            }
            IpAddr::V6(addr) => {
                let host = u128::MAX.checked_shr(u32::from(self.prefix)).unwrap_or(0);
                u128::from(addr) & host == 0
            }
        }
    }
}

impl fmt::Display for IpInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

fn parse_prefix(addr: &IpAddr, text: &str) -> Option<u8> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let len: u32 = text.parse().ok()?;
        return (len <= u32::from(IpInterface::max_prefix(addr))).then_some(len as u8);
    }

    let IpAddr::V4(_) = addr else {
        return None;
    };
    let mask = u32::from(text.parse::<Ipv4Addr>().ok()?);
    if mask.leading_ones() + mask.trailing_zeros() == 32 {
        return Some(mask.leading_ones() as u8);
    }
    let inverted = !mask;
    if inverted.leading_ones() + inverted.trailing_zeros() == 32 {
        return Some(inverted.leading_ones() as u8);
    }
    None
}

fn parse_network(value: &str) -> Option<IpInterface> {
    IpInterface::parse(value).filter(IpInterface::is_network)
}

fn invalid(value: &str, kind: &str) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("'{}' does not appear to be an IPv4 or IPv6 {}", value, kind),
    )
}

pub fn ip_address_strict(value: String) -> Result<String, Error> {
    value
        .parse::<IpAddr>()
        .map(|addr| addr.to_string())
        .map_err(|_| invalid(&value, "address"))
}

pub fn ip_network_strict(value: String) -> Result<String, Error> {
    parse_network(&value).map(|net| net.to_string()).ok_or_else(|| invalid(&value, "network"))
}

pub fn ip_interface_strict(value: String) -> Result<String, Error> {
    IpInterface::parse(&value)
        .map(|iface| iface.to_string())
        .ok_or_else(|| invalid(&value, "interface"))
}

pub fn ip_address(value: String) -> String {
    value.parse::<IpAddr>().map(|addr| addr.to_string()).unwrap_or(value)
}

pub fn ip_network(value: String) -> String {
    parse_network(&value).map(|net| net.to_string()).unwrap_or(value)
}

pub fn ip_interface(value: String) -> String {
    IpInterface::parse(&value).map(|iface| iface.to_string()).unwrap_or(value)
}

pub fn is_ip_address(value: String) -> bool {
    value.parse::<IpAddr>().is_ok()
}

pub fn is_ip_network(value: String) -> bool {
    parse_network(&value).is_some()
}

pub fn is_ip_interface(value: String) -> bool {
    IpInterface::parse(&value).is_some()
}

/// Registers every IP filter on `env`.
pub fn add_ip_filters(env: &mut Environment<'_>) {
    env.add_filter("ip_address_strict", ip_address_strict);
    env.add_filter("ip_network_strict", ip_network_strict);
    env.add_filter("ip_interface_strict", ip_interface_strict);
    env.add_filter("ip_address", ip_address);
    env.add_filter("ip_network", ip_network);
    env.add_filter("ip_interface", ip_interface);
    env.add_filter("is_ip_address", is_ip_address);
    env.add_filter("is_ip_network", is_ip_network);
    env.add_filter("is_ip_interface", is_ip_interface);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses() {
        assert_eq!(ip_address("2001:DB8:0:0::1".into()), "2001:db8::1");
        assert_eq!(ip_address("192.168.0.1".into()), "192.168.0.1");
        assert_eq!(ip_address("not-an-ip".into()), "not-an-ip");
        assert!(ip_address_strict("300.1.1.1".into()).is_err());
        assert!(is_ip_address("::1".into()));
        assert!(!is_ip_address("10.0.0.0/8".into()));
    }

    #[test]
    fn test_networks() {
        assert_eq!(ip_network("10.0.0.0/8".into()), "10.0.0.0/8");
        assert_eq!(ip_network("10.0.0.0/255.255.255.0".into()), "10.0.0.0/24");
        assert_eq!(ip_network("10.0.0.0/0.0.0.255".into()), "10.0.0.0/24");
        assert_eq!(ip_network("10.0.0.1".into()), "10.0.0.1/32");
        assert_eq!(ip_network("2001:db8::/32".into()), "2001:db8::/32");
        // Host bits set.
        assert_eq!(ip_network("10.0.0.1/24".into()), "10.0.0.1/24");
        assert!(ip_network_strict("10.0.0.1/24".into()).is_err());
        assert!(!is_ip_network("10.0.0.0/33".into()));
        assert!(is_ip_network("0.0.0.0/0".into()));
    }

    #[test]
    fn test_interfaces() {
        assert_eq!(ip_interface("10.0.0.1/24".into()), "10.0.0.1/24");
        assert_eq!(ip_interface("10.0.0.1".into()), "10.0.0.1/32");
        assert_eq!(ip_interface("fe80::1/64".into()), "fe80::1/64");
        assert_eq!(ip_interface("10.0.0.1/abc".into()), "10.0.0.1/abc");
        assert!(ip_interface_strict("10.0.0.1/-1".into()).is_err());
        assert!(is_ip_interface("10.0.0.1/255.255.0.0".into()));
        assert!(!is_ip_interface("10.0.0.1/255.0.255.0".into()));
    }

    #[test]
    fn test_filters_in_templates() {
        let mut env = Environment::new();
        add_ip_filters(&mut env);
        let rendered = env
            .render_str(
                "{{ a | ip_address }} {{ b | is_ip_network }} {{ c | ip_interface }}",
                minijinja::context! { a => "::0001", b => "10.1.0.0/16", c => "bad" },
            )
            .unwrap();
        assert_eq!(rendered, "::1 True bad");

        let err = env.render_str("{{ 'x' | ip_address_strict }}", minijinja::context! {});
        assert!(err.is_err());
    }
}
