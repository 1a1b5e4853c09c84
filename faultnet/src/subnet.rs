// Faultnet: Emulating Multi-AS Networks for Distributed Fault Diagnosis
// Copyright (C) 2024  Faultnet Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! IPv4 addressing and subnet allocation utilities.

use crate::{Error, Result};

use std::collections::BTreeSet;
use std::fmt;

/// IP Address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpAddr {
    /// Address
    pub addr: String,
    /// Network Mask
    pub mask: u32,
}

impl IpAddr {
    /// Create a new IP addr
    pub fn new(addr: impl Into<String>, mask: u32) -> Self {
        Self { addr: addr.into(), mask }
    }

    /// represent mask as xxx.xxx.xxx.xxx
    ///
    /// ```
    /// # use faultnet::IpAddr;
    /// let addr = IpAddr::new("10.100.22.5", 17);
    /// assert_eq!(addr.repr_mask(), "255.255.128.0");
    /// ```
    pub fn repr_mask(&self) -> String {
        let x: i32 = self.mask as i32;
        format!(
            "{}.{}.{}.{}",
            Self::partial_mask(x),
            Self::partial_mask(x - 8),
            Self::partial_mask(x - 16),
            Self::partial_mask(x - 24),
        )
    }

    fn partial_mask(x: i32) -> u8 {
        if x <= 0 {
            0
        } else if x >= 8 {
            255
        } else {
            !(0xffu8 >> x)
        }
    }

    /// Get the address parts of the IP address
    ///
    /// ```
    /// # use faultnet::IpAddr;
    /// let addr = IpAddr::new("10.100.22.5", 17);
    /// assert_eq!(addr.addr_parts().unwrap(), [10, 100, 22, 5]);
    /// ```
    pub fn addr_parts(&self) -> Result<[u8; 4]> {
        parse_octets(&self.addr)
    }

    /// Get the address, masked with the mask.
    ///
    /// ```
    /// # use faultnet::IpAddr;
    /// let addr = IpAddr::new("10.100.22.5", 16);
    /// assert_eq!(addr.get_network().unwrap(), IpAddr::new("10.100.0.0", 16));
    /// ```
    pub fn get_network(&self) -> Result<IpAddr> {
        let parts = self.addr_parts()?;
        let addr = u32::from_be_bytes(parts);
        let mask = prefix_to_mask(self.mask);
        let masked = (addr & mask).to_be_bytes();
        Ok(Self::new(
            format!("{}.{}.{}.{}", masked[0], masked[1], masked[2], masked[3]),
            self.mask,
        ))
    }

    /// create an IP address from a string of the shape X.X.X.X/X
    ///
    /// ```
    /// # use faultnet::IpAddr;
    /// let addr = IpAddr::try_from_str("10.100.22.5/17").unwrap();
    /// assert_eq!(addr, IpAddr::new("10.100.22.5", 17));
    /// ```
    pub fn try_from_str(s: impl AsRef<str>) -> Result<Self> {
        let parts = s.as_ref().split('/').collect::<Vec<_>>();
        if parts.len() != 2 {
            return Err(Error::InvalidAddress(s.as_ref().to_string()));
        }
        let octets = parse_octets(parts[0])?;
        let mask: u32 = parts[1]
            .parse()
            .map_err(|_| Error::InvalidAddress(s.as_ref().to_string()))?;
        Ok(Self::new(
            format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]),
            mask,
        ))
    }
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

/// Derive a MAC address from an IPv4 address: the locally-administered prefix `aa:aa` followed by
/// the four address octets, byte for byte. Deterministic, so that forwarding-table fixtures can
/// predict every MAC in the topology.
///
/// ```
/// # use faultnet::ip_to_mac;
/// assert_eq!(ip_to_mac("10.0.0.1").unwrap(), "aa:aa:0a:00:00:01");
/// ```
pub fn ip_to_mac(ip: &str) -> Result<String> {
    let p = parse_octets(ip)?;
    Ok(format!("aa:aa:{:02x}:{:02x}:{:02x}:{:02x}", p[0], p[1], p[2], p[3]))
}

fn parse_octets(ip: &str) -> Result<[u8; 4]> {
    let err = || Error::InvalidAddress(ip.to_string());
    let parts = ip.split('.').collect::<Vec<_>>();
    if parts.len() != 4 {
        return Err(err());
    }
    Ok([
        parts[0].parse().map_err(|_| err())?,
        parts[1].parse().map_err(|_| err())?,
        parts[2].parse().map_err(|_| err())?,
        parts[3].parse().map_err(|_| err())?,
    ])
}

fn prefix_to_mask(prefix: u32) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix.min(32))
    }
}

/// # Subnet allocator
///
/// Hands out host addresses of an IPv4 prefix sequentially, skipping addresses that were assigned
/// explicitly. Each link of the topology gets its own subnet, and the MAC address of every
/// endpoint is derived from its IP with [`ip_to_mac`].
#[derive(Debug, Clone, PartialEq)]
pub struct Subnet {
    network: u32,
    prefix_len: u32,
    used: BTreeSet<u32>,
}

impl Subnet {
    /// Create a new subnet from the network address and the prefix length
    pub fn new(ip: impl AsRef<str>, prefix_len: u32) -> Result<Self> {
        let octets = parse_octets(ip.as_ref())?;
        let network = u32::from_be_bytes(octets) & prefix_to_mask(prefix_len);
        Ok(Self { network, prefix_len, used: BTreeSet::new() })
    }

    /// Allocate the next free host address of the subnet
    pub fn allocate(&mut self) -> Result<IpAddr> {
        let max_hosts = (1u64 << (32 - self.prefix_len)) - 1;
        let mut host: u32 = 1;
        while self.used.contains(&host) {
            host += 1;
            if u64::from(host) >= max_hosts {
                return Err(Error::SubnetExhausted(self.network_prefix()));
            }
        }
        self.used.insert(host);
        Ok(self.host_addr(host))
    }

    /// Assign a specific host address, marking it as used
    pub fn assign(&mut self, ip: impl AsRef<str>) -> Result<IpAddr> {
        let addr = u32::from_be_bytes(parse_octets(ip.as_ref())?);
        if addr & prefix_to_mask(self.prefix_len) != self.network {
            return Err(Error::AddressOutsideSubnet {
                addr: ip.as_ref().to_string(),
                subnet: self.network_prefix(),
            });
        }
        let host = addr & !prefix_to_mask(self.prefix_len);
        self.used.insert(host);
        Ok(self.host_addr(host))
    }

    /// Returns true if the given address lies inside the subnet
    pub fn contains(&self, ip: impl AsRef<str>) -> bool {
        match parse_octets(ip.as_ref()) {
            Ok(octets) => {
                u32::from_be_bytes(octets) & prefix_to_mask(self.prefix_len) == self.network
            }
            Err(_) => false,
        }
    }

    /// The network prefix in `a.b.c.d/len` notation
    pub fn network_prefix(&self) -> String {
        let p = self.network.to_be_bytes();
        format!("{}.{}.{}.{}/{}", p[0], p[1], p[2], p[3], self.prefix_len)
    }

    fn host_addr(&self, host: u32) -> IpAddr {
        let p = (self.network | host).to_be_bytes();
        IpAddr::new(format!("{}.{}.{}.{}", p[0], p[1], p[2], p[3]), self.prefix_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repr_mask() {
        assert_eq!(&IpAddr::new("", 4).repr_mask(), "240.0.0.0");
        assert_eq!(&IpAddr::new("", 11).repr_mask(), "255.224.0.0");
        assert_eq!(&IpAddr::new("", 15).repr_mask(), "255.254.0.0");
        assert_eq!(&IpAddr::new("", 24).repr_mask(), "255.255.255.0");
        assert_eq!(&IpAddr::new("", 25).repr_mask(), "255.255.255.128");
    }

    #[test]
    fn mac_derivation() {
        assert_eq!(ip_to_mac("10.0.0.1").unwrap(), "aa:aa:0a:00:00:01");
        assert_eq!(ip_to_mac("192.168.19.4").unwrap(), "aa:aa:c0:a8:13:04");
        assert!(ip_to_mac("10.0.0").is_err());
    }

    #[test]
    fn sequential_allocation() {
        let mut snet = Subnet::new("10.3.0.0", 24).unwrap();
        assert_eq!(snet.allocate().unwrap(), IpAddr::new("10.3.0.1", 24));
        assert_eq!(snet.allocate().unwrap(), IpAddr::new("10.3.0.2", 24));
        assert_eq!(snet.network_prefix(), "10.3.0.0/24");
    }

    #[test]
    fn explicit_assignment_is_skipped() {
        let mut snet = Subnet::new("10.0.0.0", 24).unwrap();
        snet.assign("10.0.0.1").unwrap();
        snet.assign("10.0.0.2").unwrap();
        assert_eq!(snet.allocate().unwrap(), IpAddr::new("10.0.0.3", 24));
    }

    #[test]
    fn assignment_outside_subnet() {
        let mut snet = Subnet::new("10.0.0.0", 24).unwrap();
        assert!(snet.assign("10.0.1.1").is_err());
        assert!(snet.contains("10.0.0.17"));
        assert!(!snet.contains("10.0.1.17"));
    }
}
