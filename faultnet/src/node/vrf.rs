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

//! VRF, VNI and bridge-domain bookkeeping of a single node.

use crate::intf::DEFAULT_VRF;
use crate::{Error, Result};

use std::collections::BTreeMap;

/// Reserved VRF identifier of the default VRF
pub const DEFAULT_VRF_ID: u32 = 0;

/// How [`VrfModel`] treats a second registration of an existing VRF or L3 VNI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Replace the previous registration and report [`Outcome::Replaced`]
    Allow,
    /// Fail with [`Error::VrfExists`] or [`Error::L3VniExists`]
    Reject,
}

impl Default for OverwritePolicy {
    fn default() -> Self {
        Self::Allow
    }
}

/// Result of a registration that may overwrite earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The entry was new
    Added,
    /// An existing entry was replaced
    Replaced,
}

/// The VNIs associated with one VRF: at most one L3 VNI for routed overlay traffic, and any
/// number of L2 VNIs for bridged overlays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VniSet {
    /// L3 VNI of the VRF, if any
    pub l3: Option<u32>,
    /// L2 VNIs of the VRF, in registration order
    pub l2: Vec<u32>,
}

/// # VRF Model
///
/// Tracks the VRFs of a node, the kernel routing tables mapped to them, the VNIs each VRF owns,
/// and bridge-domain membership of interfaces. The model is pure bookkeeping; the kernel
/// commands realizing it are issued by the node.
///
/// A fresh model holds the default VRF with id 0, and maps the kernel main and local tables
/// (254, 255) to it.
#[derive(Debug, Clone, PartialEq)]
pub struct VrfModel {
    policy: OverwritePolicy,
    vrf_ids: BTreeMap<String, u32>,
    table_vrf: BTreeMap<u32, u32>,
    vnis: BTreeMap<String, VniSet>,
    bd_members: BTreeMap<u32, Vec<String>>,
}

impl Default for VrfModel {
    fn default() -> Self {
        Self::new(OverwritePolicy::default())
    }
}

impl VrfModel {
    /// Create a model holding only the default VRF
    pub fn new(policy: OverwritePolicy) -> Self {
        let mut vrf_ids = BTreeMap::new();
        vrf_ids.insert(DEFAULT_VRF.to_string(), DEFAULT_VRF_ID);
        let mut table_vrf = BTreeMap::new();
        table_vrf.insert(254, DEFAULT_VRF_ID);
        table_vrf.insert(255, DEFAULT_VRF_ID);
        let mut vnis = BTreeMap::new();
        vnis.insert(DEFAULT_VRF.to_string(), VniSet::default());
        Self { policy, vrf_ids, table_vrf, vnis, bd_members: BTreeMap::new() }
    }

    /// Register a VRF with its id and kernel routing table.
    pub fn add_vrf(&mut self, name: &str, vrf_id: u32, table: u32) -> Result<Outcome> {
        let outcome = match self.vrf_ids.get(name) {
            Some(_) if self.policy == OverwritePolicy::Reject => {
                return Err(Error::VrfExists(name.to_string()))
            }
            Some(_) => Outcome::Replaced,
            None => Outcome::Added,
        };
        self.vrf_ids.insert(name.to_string(), vrf_id);
        self.table_vrf.insert(table, vrf_id);
        self.vnis.entry(name.to_string()).or_default();
        Ok(outcome)
    }

    /// Associate an L3 VNI with a VRF. At most one L3 VNI per VRF; the last registration wins
    /// under [`OverwritePolicy::Allow`].
    pub fn add_l3_vni(&mut self, vrf: &str, vni: u32) -> Result<Outcome> {
        self.ensure_vni_free(vrf, vni)?;
        let set = self.vnis.get_mut(vrf).ok_or_else(|| Error::UnknownVrf(vrf.to_string()))?;
        let outcome = match set.l3 {
            Some(old) if self.policy == OverwritePolicy::Reject => {
                return Err(Error::L3VniExists { vrf: vrf.to_string(), vni: old })
            }
            Some(_) => Outcome::Replaced,
            None => Outcome::Added,
        };
        set.l3 = Some(vni);
        Ok(outcome)
    }

    /// Associate an additional L2 VNI with a VRF. Registering the same L2 VNI on the same VRF
    /// twice is a no-op.
    pub fn add_l2_vni(&mut self, vrf: &str, vni: u32) -> Result<()> {
        self.ensure_vni_free(vrf, vni)?;
        let set = self.vnis.get_mut(vrf).ok_or_else(|| Error::UnknownVrf(vrf.to_string()))?;
        if !set.l2.contains(&vni) {
            set.l2.push(vni);
        }
        Ok(())
    }

    fn ensure_vni_free(&self, vrf: &str, vni: u32) -> Result<()> {
        for (owner, set) in self.vnis.iter() {
            if owner == vrf {
                continue;
            }
            if set.l3 == Some(vni) || set.l2.contains(&vni) {
                return Err(Error::VniInUse { vni, vrf: owner.clone() });
            }
        }
        Ok(())
    }

    /// Attach an interface to a bridge domain. An interface belongs to at most one bridge domain;
    /// re-attaching moves it, and the previous domain index is returned.
    pub fn attach(&mut self, bdi: u32, intf: &str) -> Result<Option<u32>> {
        if !self.vnis.values().any(|s| s.l2.contains(&bdi)) {
            return Err(Error::UnknownBridgeDomain(bdi));
        }
        let mut previous = None;
        for (old_bdi, members) in self.bd_members.iter_mut() {
            if let Some(pos) = members.iter().position(|m| m == intf) {
                members.remove(pos);
                previous = Some(*old_bdi);
                break;
            }
        }
        self.bd_members.entry(bdi).or_default().push(intf.to_string());
        Ok(previous)
    }

    /// Member interfaces of a bridge domain, in attachment order
    pub fn members(&self, bdi: u32) -> &[String] {
        self.bd_members.get(&bdi).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All bridge domains with members, by ascending index
    pub fn bridge_domains(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.bd_members.iter().map(|(bdi, m)| (*bdi, m.as_slice()))
    }

    /// Returns true if the VRF is registered
    pub fn contains(&self, vrf: &str) -> bool {
        self.vrf_ids.contains_key(vrf)
    }

    /// Numeric id of a VRF
    pub fn vrf_id(&self, vrf: &str) -> Result<u32> {
        self.vrf_ids.get(vrf).copied().ok_or_else(|| Error::UnknownVrf(vrf.to_string()))
    }

    /// The VNIs of a VRF
    pub fn vnis(&self, vrf: &str) -> Result<&VniSet> {
        self.vnis.get(vrf).ok_or_else(|| Error::UnknownVrf(vrf.to_string()))
    }

    /// All VRFs with their VNI sets, by ascending VRF name
    pub fn iter_vnis(&self) -> impl Iterator<Item = (&str, &VniSet)> {
        self.vnis.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Kernel table to VRF id mapping, by ascending table number
    pub fn table_vrf(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.table_vrf.iter().map(|(t, v)| (*t, *v))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_model_holds_default_vrf() {
        let m = VrfModel::default();
        assert!(m.contains(DEFAULT_VRF));
        assert_eq!(m.vrf_id(DEFAULT_VRF).unwrap(), 0);
        let tables: Vec<_> = m.table_vrf().collect();
        assert_eq!(tables, vec![(254, 0), (255, 0)]);
    }

    #[test]
    fn last_l3_vni_wins() {
        let mut m = VrfModel::default();
        m.add_vrf("red", 1, 10).unwrap();
        assert_eq!(m.add_l3_vni("red", 4000).unwrap(), Outcome::Added);
        assert_eq!(m.add_l3_vni("red", 4001).unwrap(), Outcome::Replaced);
        assert_eq!(m.vnis("red").unwrap().l3, Some(4001));
    }

    #[test]
    fn reject_policy_refuses_overwrites() {
        let mut m = VrfModel::new(OverwritePolicy::Reject);
        m.add_vrf("red", 1, 10).unwrap();
        m.add_l3_vni("red", 4000).unwrap();
        assert!(matches!(m.add_vrf("red", 2, 11), Err(Error::VrfExists(_))));
        assert!(matches!(
            m.add_l3_vni("red", 4001),
            Err(Error::L3VniExists { vni: 4000, .. })
        ));
    }

    #[test]
    fn vni_cannot_serve_two_vrfs() {
        let mut m = VrfModel::default();
        m.add_vrf("red", 1, 10).unwrap();
        m.add_vrf("blue", 2, 11).unwrap();
        m.add_l2_vni("red", 100).unwrap();
        assert!(matches!(
            m.add_l2_vni("blue", 100),
            Err(Error::VniInUse { vni: 100, .. })
        ));
        assert!(matches!(
            m.add_l3_vni("blue", 100),
            Err(Error::VniInUse { vni: 100, .. })
        ));
    }

    #[test]
    fn duplicate_l2_vni_is_noop() {
        let mut m = VrfModel::default();
        m.add_vrf("red", 1, 10).unwrap();
        m.add_l2_vni("red", 100).unwrap();
        m.add_l2_vni("red", 100).unwrap();
        assert_eq!(m.vnis("red").unwrap().l2, vec![100]);
    }

    #[test]
    fn reattach_moves_the_interface() {
        let mut m = VrfModel::default();
        m.add_vrf("red", 1, 10).unwrap();
        m.add_l2_vni("red", 100).unwrap();
        m.add_l2_vni("red", 200).unwrap();
        assert_eq!(m.attach(100, "eth0").unwrap(), None);
        assert_eq!(m.attach(100, "eth1").unwrap(), None);
        assert_eq!(m.attach(200, "eth0").unwrap(), Some(100));
        assert_eq!(m.members(100), &["eth1".to_string()]);
        assert_eq!(m.members(200), &["eth0".to_string()]);
    }

    #[test]
    fn attach_requires_known_bridge_domain() {
        let mut m = VrfModel::default();
        assert!(matches!(m.attach(999, "eth0"), Err(Error::UnknownBridgeDomain(999))));
    }
}
