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

//! Node startup sequencer.
//!
//! Starting a node with the forwarding capability runs through a fixed sequence of stages:
//! wiring the internal control/data-plane interface pairs, launching the forwarding engine,
//! installing the forwarding tables, and starting the control-plane agents. Each stage checks
//! its precondition and refuses to run out of order. Retries against the forwarding engine are
//! bounded; exhausting them moves the node to the terminal [`Stage::Failed`].

use crate::node::{tables, Node};
use crate::{Error, Result};

use log::*;
use std::fmt;
use std::thread::sleep;
use std::time::Duration;

/// Startup stage of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Topology construction finished, nothing started yet
    Configured,
    /// Internal control/data-plane interface pairs are wired
    InterfacesWired,
    /// The forwarding engine process is running
    ForwardingEngineLaunched,
    /// All forwarding-table batches were accepted
    TablesInstalled,
    /// Route mediator and switch agent signalled readiness
    ControlPlaneStarted,
    /// Startup complete
    Running,
    /// A stage exhausted its retries; the node is unusable
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Configured => "configured",
            Stage::InterfacesWired => "interfaces wired",
            Stage::ForwardingEngineLaunched => "forwarding engine launched",
            Stage::TablesInstalled => "tables installed",
            Stage::ControlPlaneStarted => "control plane started",
            Stage::Running => "running",
            Stage::Failed => "failed",
        })
    }
}

/// Bounded retry policy for operations against the forwarding engine and the readiness markers
/// of the control-plane agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up
    pub max_attempts: usize,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 20, backoff: Duration::from_secs(1) }
    }
}

impl Node {
    /// Run the complete startup sequence. One-shot; calling it on a node that already ran is a
    /// stage-precondition error.
    pub fn start(&mut self) -> Result<()> {
        if self.forwarding.is_some() {
            self.wire_interfaces()?;
            self.launch_forwarding_engine()?;
            self.install_tables()?;
            self.start_control_plane()?;
        }
        self.finish_start()
    }

    fn expect_stage(&self, expected: Stage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(Error::StageOrder { node: self.name.clone(), expected, found: self.stage })
        }
    }

    /// Wire the two internal veth pairs connecting the forwarding engine to the kernel control
    /// plane: dp-egress/cp-ingress carries punted traffic up, dp-ingress/cp-egress carries
    /// locally originated traffic down (via routing table 252, selected by firewall mark 0x8).
    pub fn wire_interfaces(&mut self) -> Result<()> {
        self.expect_stage(Stage::Configured)?;
        debug!("[{}] wiring control/data-plane interface pairs", self.name);

        self.backing.exec("ip link add dp-egress type veth peer name cp-ingress")?;
        self.backing.exec("ip link set dp-egress address aa:00:00:00:00:01")?;
        self.backing.exec("ip link set cp-ingress address aa:00:00:00:00:02")?;
        self.backing.exec("ifconfig dp-egress up 127.0.1.1/24")?;
        self.backing.exec("ifconfig cp-ingress up 127.0.1.2/24")?;
        self.backing.exec("iptables -t filter -A OUTPUT -p all -o dp-egress -j DROP")?;
        self.backing.exec("iptables -t filter -A OUTPUT -p all -o cp-ingress -j DROP")?;

        self.backing.exec("ip link add dp-ingress type veth peer name cp-egress")?;
        self.backing.exec("ip link set dp-ingress address aa:00:00:00:00:03")?;
        self.backing.exec("ip link set cp-egress address aa:00:00:00:00:04")?;
        self.backing.exec("ifconfig dp-ingress up 127.0.1.3/24")?;
        self.backing.exec("ifconfig cp-egress up 127.0.1.4/24")?;
        self.backing.exec("iptables -t filter -A INPUT -p all -i dp-ingress -j DROP")?;
        self.backing.exec("iptables -t filter -A INPUT -p all -i cp-egress -j DROP")?;

        for intf in &["dp-egress", "cp-ingress", "dp-ingress", "cp-egress"] {
            self.backing.exec(&format!("ethtool --offload {} rx off", intf))?;
            self.backing.exec(&format!("ethtool --offload {} tx off", intf))?;
        }

        self.backing.exec("sysctl net.ipv4.conf.all.rp_filter=0")?;
        self.backing.exec("sysctl net.ipv4.conf.cp-ingress.rp_filter=0")?;
        self.backing.exec("ifconfig cp-ingress down; ifconfig cp-ingress up")?;
        self.backing.exec("sysctl net.ipv4.ip_forward=0")?;

        // locally originated packets are marked and steered into the engine via table 252
        self.backing.exec("ip route add default via 127.0.1.3 dev cp-egress table 252")?;
        self.backing.exec("ip rule add fwmark 0x8 table 252")?;
        self.backing.exec("arp -s -i cp-egress 127.0.1.3 aa:00:00:00:00:03")?;

        self.stage = Stage::InterfacesWired;
        Ok(())
    }

    /// Launch the forwarding engine, binding every effective interface plus the two CPU ports,
    /// and copy the control-plane agent binaries into the container.
    pub fn launch_forwarding_engine(&mut self) -> Result<()> {
        self.expect_stage(Stage::InterfacesWired)?;
        let fwd = self.forwarding()?;

        let mut args = vec![fwd.target_path.clone()];
        for (port, intf) in self.registry.effective() {
            args.push("-i".to_string());
            args.push(format!("{}@{}", port, intf.name));
        }
        args.push("-i".to_string());
        args.push(format!("{}@dp-egress", fwd.cpu_input_port));
        args.push("-i".to_string());
        args.push(format!("{}@dp-ingress", fwd.cpu_output_port));
        if let Some(pcap) = &fwd.pcap_dump {
            args.push("--pcap".to_string());
            args.push(pcap.clone());
        }
        if let Some(port) = fwd.thrift_port {
            args.push("--thrift-port".to_string());
            args.push(port.to_string());
        }
        if fwd.nanomsg {
            args.push("--nanolog".to_string());
            args.push("ipc:///tmp/bm-log.ipc".to_string());
        }
        if fwd.enable_debugger {
            args.push("--debugger".to_string());
        }
        if fwd.log_console {
            args.push("--log-console".to_string());
        }
        args.push("--log-level".to_string());
        args.push(fwd.log_level.clone());
        args.push("/tmp/running.json".to_string());

        // kernel must not see traffic the engine owns; let routing-protocol multicast through
        let iptables: Vec<String> = self
            .registry
            .effective()
            .flat_map(|(_, intf)| {
                vec![
                    format!("iptables -t filter -A INPUT -p ospf -i {} -j ACCEPT", intf.name),
                    format!(
                        "iptables -t filter -A INPUT -p all ! -d 224.0.0.0/4 -i {} -j DROP",
                        intf.name
                    ),
                    format!("iptables -t filter -A FORWARD -p all -i {} -j DROP", intf.name),
                    format!(
                        "iptables -t mangle -A OUTPUT -p all -o {} -j MARK --set-mark 0x8",
                        intf.name
                    ),
                ]
            })
            .collect();
        for cmd in iptables {
            self.backing.exec(&cmd)?;
        }

        let fwd = self.forwarding()?;
        self.backing.copy_file(&fwd.pipeline_json, "/tmp/running.json")?;
        let copies: Vec<(std::path::PathBuf, &str)> = vec![
            (fwd.mediator.clone(), "/tmp/rt_mediator"),
            (fwd.runtime_api.clone(), "/tmp/runtime_API.py"),
            (fwd.switch_agent.clone(), "/tmp/switch_agent"),
            (fwd.packet_injector.clone(), "/tmp/packet_injector"),
            (fwd.bgp_adv_modifier.clone(), "/bgp_adv_modifier"),
        ]
        .into_iter()
        .filter_map(|(local, remote)| local.map(|l| (l, remote)))
        .collect();
        for (local, remote) in copies {
            self.backing.copy_file(&local, remote)?;
        }

        info!("[{}] starting forwarding engine: {}", self.name, args.join(" "));
        self.backing.exec_background(&format!("{} >/tmp/p4bm.log 2>&1", args.join(" ")))?;

        self.stage = Stage::ForwardingEngineLaunched;
        Ok(())
    }

    /// Materialize the forwarding tables and feed them to the engine's administration tool. Each
    /// batch is retried until the tool acknowledges it, bounded by the retry policy; exhausting
    /// the attempts moves the node to [`Stage::Failed`].
    pub fn install_tables(&mut self) -> Result<()> {
        self.expect_stage(Stage::ForwardingEngineLaunched)?;
        let fwd = self.forwarding()?;
        let workdir = fwd.workdir.clone();
        let retry = fwd.retry;

        let startup = tables::render_startup(
            &self.loopback,
            &self.registry,
            &self.vrfs,
            fwd.cpu_input_port,
            fwd.cpu_output_port,
        )?;
        let files = vec![
            ("Startup", startup, "/tmp/Startup_cmds"),
            ("Subnet", tables::render_subnet(&self.subnet_entries), "/tmp/Subnet_cmds"),
            ("ACL", tables::render_acl(&self.acl), "/tmp/ACL_cmds"),
            ("TableVrfDict", tables::render_table_vrf(&self.vrfs), "/tmp/TableVrfDict"),
            ("IntfPortDict", tables::render_intf_port(&self.registry), "/tmp/IntfPortDict"),
        ];
        for (category, content, remote) in files.iter() {
            let local = workdir.join(format!("{}-{}.txt", category, self.name));
            std::fs::write(&local, content)?;
            self.backing.copy_file(&local, remote)?;
            if let Err(e) = std::fs::remove_file(&local) {
                warn!("[{}] cannot remove {}: {}", self.name, local.display(), e);
            }
        }

        let batches =
            [("Startup", "/tmp/Startup_cmds"), ("Subnet", "/tmp/Subnet_cmds"), ("ACL", "/tmp/ACL_cmds")];
        for (category, remote) in batches.iter().copied() {
            self.install_batch(category, remote, &retry)?;
        }

        self.stage = Stage::TablesInstalled;
        Ok(())
    }

    fn install_batch(&mut self, category: &str, remote: &str, retry: &RetryPolicy) -> Result<()> {
        let cmd = format!("python3 /tmp/runtime_API.py < {}", remote);
        let mut last_output = String::new();
        for attempt in 1..=retry.max_attempts {
            last_output = self.backing.exec(&cmd)?;
            if last_output.contains(tables::ACK_TOKEN) {
                debug!("[{}] {} batch accepted (attempt {})", self.name, category, attempt);
                return Ok(());
            }
            trace!("[{}] {} batch not acknowledged yet (attempt {})", self.name, category, attempt);
            if attempt < retry.max_attempts {
                sleep(retry.backoff);
            }
        }
        self.stage = Stage::Failed;
        Err(Error::TableInstall {
            node: self.name.clone(),
            table: category.to_string(),
            attempts: retry.max_attempts,
            last_output: extract_error_line(&last_output),
        })
    }

    /// Start the route mediator and the switch agent, blocking on the readiness marker of each
    /// with the bounded retry policy.
    pub fn start_control_plane(&mut self) -> Result<()> {
        self.expect_stage(Stage::TablesInstalled)?;
        let fwd = self.forwarding()?;
        let retry = fwd.retry;
        let total_ports = self.registry.len();
        let (mediator, switch_agent) = (fwd.mediator.is_some(), fwd.switch_agent.is_some());

        if mediator || switch_agent {
            let admin = self
                .admin
                .as_ref()
                .ok_or_else(|| Error::MissingAdminConfig(self.name.clone()))?
                .clone();

            if mediator {
                self.backing.exec_background(&format!(
                    "python3 /tmp/rt_mediator --log-file /tmp/rt_mediator.log \
                     --report-server-ip {} --report-server-port {} \
                     --table-vrf-file /tmp/TableVrfDict --intf-port-file /tmp/IntfPortDict \
                     > /rt_mediator.out",
                    admin.ip, admin.port
                ))?;
                self.await_marker("rt_mediator", "/rt_mediator_init_succ", &retry)?;
            }

            if switch_agent {
                self.backing.exec_background(&format!(
                    "python3 /tmp/switch_agent --log-file /tmp/switch_agent.log \
                     --report-server-ip {} --report-server-port {} --port-num {} \
                     > /switch_agent.out",
                    admin.ip, admin.port, total_ports
                ))?;
                self.await_marker("switch_agent", "/switch_agent_init_succ", &retry)?;
            }
        }

        self.stage = Stage::ControlPlaneStarted;
        Ok(())
    }

    fn await_marker(&mut self, agent: &str, marker: &str, retry: &RetryPolicy) -> Result<()> {
        for attempt in 1..=retry.max_attempts {
            if self.backing.exec(&format!("cat {}", marker))?.trim() == "1" {
                debug!("[{}] {} is ready", self.name, agent);
                return Ok(());
            }
            if attempt < retry.max_attempts {
                sleep(retry.backoff);
            }
        }
        self.stage = Stage::Failed;
        Err(Error::AgentTimeout {
            node: self.name.clone(),
            agent: agent.to_string(),
            marker: marker.to_string(),
        })
    }

    /// Final stage: generic container bring-up (services, NIC offloading, baseline traffic
    /// shaping), then the routing-suite configuration and its daemons. Nodes without the
    /// forwarding capability enter here directly from [`Stage::Configured`].
    pub fn finish_start(&mut self) -> Result<()> {
        if self.forwarding.is_some() {
            self.expect_stage(Stage::ControlPlaneStarted)?;
        } else {
            self.expect_stage(Stage::Configured)?;
        }

        self.backing.exec("service ssh start")?;
        let offload: Vec<String> = self
            .registry
            .iter()
            .flat_map(|(_, intf)| {
                vec![
                    format!("ethtool --offload {} rx off", intf.name),
                    format!("ethtool --offload {} tx off", intf.name),
                ]
            })
            .collect();
        for cmd in offload {
            self.backing.exec(&cmd)?;
        }
        self.backing.exec("iptables -t mangle -A OUTPUT -p icmp -j TOS --set-tos 0x00")?;

        if let Some(routing) = self.routing.clone() {
            let root = routing.config_root();
            self.write_remote_file(&routing.render_daemons_file(), &format!("{}/daemons", root))?;
            self.write_remote_file(
                &routing.render_general(&self.name),
                &format!("{}/{}.conf", root, routing.software()),
            )?;
            let protocols: Vec<_> = routing.enabled_protocols().collect();
            for protocol in protocols {
                self.write_remote_file(
                    &routing.render_protocol(protocol),
                    &format!("{}/{}.conf", root, protocol.daemon()),
                )?;
            }

            self.backing.exec("sysctl net.ipv4.conf.all.rp_filter=0")?;
            self.backing.exec("route del default")?;
            info!("[{}] starting {} daemons", self.name, routing.software());
            self.backing.exec(&format!("/etc/init.d/{} start", routing.software()))?;
        }

        self.stage = Stage::Running;
        Ok(())
    }

    fn write_remote_file(&self, content: &str, path: &str) -> Result<()> {
        let escaped = content.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
        self.backing.exec(&format!("echo -e \"{}\" > {}", escaped, path)).map(|_| ())
    }
}

fn extract_error_line(output: &str) -> String {
    match regex::Regex::new(r"(?im)^.*error.*$") {
        Ok(re) => match re.find(output) {
            Some(m) => m.as_str().trim().to_string(),
            None => output.trim().to_string(),
        },
        Err(_) => output.trim().to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::container::mock::MockRuntime;
    use crate::container::ContainerBacking;
    use crate::intf::Intf;
    use crate::node::{AdminConfig, ForwardingConfig};
    use crate::subnet::IpAddr;

    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn pipeline() -> PathBuf {
        let path = std::env::temp_dir().join("faultnet-test-pipeline.json");
        std::fs::write(&path, "{}").unwrap();
        path
    }

    fn fast_retry(max_attempts: usize) -> RetryPolicy {
        RetryPolicy { max_attempts, backoff: Duration::from_secs(0) }
    }

    fn p4_node(mock: MockRuntime) -> Node {
        let backing = ContainerBacking::new(Box::new(mock), "mn.r1", 4242);
        let mut fwd = ForwardingConfig::new(pipeline());
        fwd.mediator = Some(PathBuf::from("/opt/rt_mediator"));
        fwd.runtime_api = Some(PathBuf::from("/opt/runtime_API.py"));
        fwd.switch_agent = Some(PathBuf::from("/opt/switch_agent"));
        fwd.workdir = std::env::temp_dir();
        fwd.retry = fast_retry(3);
        let mut node = Node::new("r1", backing).unwrap().with_forwarding(fwd).unwrap();
        node.set_admin_config(AdminConfig::new("192.168.0.1", 9000));
        node.registry.add(
            Intf::with_addr("r1-eth1", IpAddr::new("10.0.1.1", 24), "aa:aa:0a:00:01:01"),
            None,
        );
        node
    }

    fn ready(mock: &MockRuntime) {
        mock.script("runtime_API.py", vec!["RuntimeCmd"]);
        mock.script("cat /rt_mediator_init_succ", vec!["1"]);
        mock.script("cat /switch_agent_init_succ", vec!["1"]);
    }

    fn entries(log: &Rc<RefCell<Vec<String>>>, prefix: &str) -> Vec<String> {
        log.borrow().iter().filter(|l| l.starts_with(prefix)).cloned().collect()
    }

    #[test]
    fn full_startup_reaches_running() {
        let (mock, log) = MockRuntime::new();
        ready(&mock);
        let mut node = p4_node(mock);
        node.start().unwrap();
        assert_eq!(node.stage(), Stage::Running);

        let log = log.borrow();
        // wiring comes first, engine launch after, batches last
        let wire = log.iter().position(|l| l.contains("dp-egress type veth")).unwrap();
        let launch = log.iter().position(|l| l.starts_with("spawn simple_switch")).unwrap();
        let install = log.iter().position(|l| l.contains("< /tmp/Startup_cmds")).unwrap();
        let mediator = log.iter().position(|l| l.contains("/tmp/rt_mediator ")).unwrap();
        assert!(wire < launch && launch < install && install < mediator);
    }

    #[test]
    fn engine_argv_binds_every_port() {
        let (mock, log) = MockRuntime::new();
        ready(&mock);
        let mut node = p4_node(mock);
        node.start().unwrap();
        let spawn = entries(&log, "spawn simple_switch").remove(0);
        assert!(spawn.contains("-i 1@r1-eth1"));
        assert!(spawn.contains("-i 80@dp-egress"));
        assert!(spawn.contains("-i 81@dp-ingress"));
        assert!(spawn.contains("--log-level trace"));
        assert!(spawn.contains("/tmp/running.json"));
        assert!(spawn.ends_with(">/tmp/p4bm.log 2>&1"));
    }

    #[test]
    fn all_five_files_are_copied() {
        let (mock, log) = MockRuntime::new();
        ready(&mock);
        let mut node = p4_node(mock);
        node.start().unwrap();
        let copies = entries(&log, "copy");
        for remote in
            &["/tmp/Startup_cmds", "/tmp/Subnet_cmds", "/tmp/ACL_cmds", "/tmp/TableVrfDict", "/tmp/IntfPortDict"]
        {
            assert!(copies.iter().any(|c| c.ends_with(remote)), "missing copy of {}", remote);
        }
    }

    #[test]
    fn rejected_batch_escalates_to_failed() {
        let (mock, _) = MockRuntime::new();
        mock.script("runtime_API.py", vec!["Invalid table name: SrcMac_RW"]);
        let mut node = p4_node(mock);
        let err = node.start().unwrap_err();
        match err {
            Error::TableInstall { table, attempts, .. } => {
                assert_eq!(table, "Startup");
                assert_eq!(attempts, 3);
            }
            e => panic!("unexpected error: {}", e),
        }
        assert_eq!(node.stage(), Stage::Failed);
    }

    #[test]
    fn batch_retry_succeeds_on_second_attempt() {
        let (mock, log) = MockRuntime::new();
        mock.script("< /tmp/Startup_cmds", vec!["transient", "RuntimeCmd"]);
        mock.script("< /tmp/Subnet_cmds", vec!["RuntimeCmd"]);
        mock.script("< /tmp/ACL_cmds", vec!["RuntimeCmd"]);
        mock.script("cat /rt_mediator_init_succ", vec!["1"]);
        mock.script("cat /switch_agent_init_succ", vec!["1"]);
        let mut node = p4_node(mock);
        node.start().unwrap();
        let startup_runs: Vec<_> = entries(&log, "exec python3 /tmp/runtime_API.py < /tmp/Startup_cmds");
        assert_eq!(startup_runs.len(), 2);
    }

    #[test]
    fn missing_readiness_marker_times_out() {
        let (mock, _) = MockRuntime::new();
        mock.script("runtime_API.py", vec!["RuntimeCmd"]);
        mock.script("cat /rt_mediator_init_succ", vec![""]);
        let mut node = p4_node(mock);
        let err = node.start().unwrap_err();
        assert!(matches!(err, Error::AgentTimeout { ref agent, .. } if agent == "rt_mediator"));
        assert_eq!(node.stage(), Stage::Failed);
    }

    #[test]
    fn missing_admin_config_is_an_error() {
        let (mock, _) = MockRuntime::new();
        mock.script("runtime_API.py", vec!["RuntimeCmd"]);
        let mut node = p4_node(mock);
        node.admin = None;
        assert!(matches!(node.start(), Err(Error::MissingAdminConfig(_))));
    }

    #[test]
    fn second_start_is_a_stage_error() {
        let (mock, _) = MockRuntime::new();
        ready(&mock);
        let mut node = p4_node(mock);
        node.start().unwrap();
        assert!(matches!(
            node.start(),
            Err(Error::StageOrder { expected: Stage::Configured, found: Stage::Running, .. })
        ));
    }

    #[test]
    fn stages_refuse_to_run_out_of_order() {
        let (mock, _) = MockRuntime::new();
        let mut node = p4_node(mock);
        assert!(matches!(
            node.install_tables(),
            Err(Error::StageOrder { expected: Stage::ForwardingEngineLaunched, .. })
        ));
    }

    #[test]
    fn plain_router_starts_daemons_directly() {
        let (mock, log) = MockRuntime::new();
        let backing = ContainerBacking::new(Box::new(mock), "mn.r2", 4243);
        let mut routing = crate::node::RoutingConfig::new("frr");
        routing.add(Some(crate::node::Protocol::Bgpd), "router bgp 65001");
        let mut node = Node::new("r2", backing).unwrap().with_routing(routing).unwrap();
        node.start().unwrap();
        assert_eq!(node.stage(), Stage::Running);
        let log = log.borrow();
        assert!(log.iter().any(|l| l.contains("> /etc/frr/daemons")));
        assert!(log.iter().any(|l| l.contains("> /etc/frr/bgpd.conf")));
        assert!(log.iter().any(|l| l.contains("exec /etc/init.d/frr start")));
        assert!(!log.iter().any(|l| l.contains("dp-egress")));
    }

    #[test]
    fn generic_bring_up_runs_for_every_node() {
        let (mock, log) = MockRuntime::new();
        let backing = ContainerBacking::new(Box::new(mock), "mn.r3", 4244);
        let mut node = Node::new("r3", backing).unwrap();
        node.registry.add(
            Intf::with_addr("r3-eth1", IpAddr::new("10.0.3.1", 24), "aa:aa:0a:00:03:01"),
            None,
        );
        node.start().unwrap();
        let log = log.borrow();
        assert!(log.iter().any(|l| l == "exec service ssh start"));
        assert!(log.iter().any(|l| l == "exec ethtool --offload r3-eth1 rx off"));
        assert!(log.iter().any(|l| l == "exec ethtool --offload r3-eth1 tx off"));
        assert!(log
            .iter()
            .any(|l| l == "exec iptables -t mangle -A OUTPUT -p icmp -j TOS --set-tos 0x00"));
    }

    #[test]
    fn no_backoff_sleep_after_the_final_attempt() {
        let (mock, _) = MockRuntime::new();
        mock.script("runtime_API.py", vec!["nope"]);
        let mut node = p4_node(mock);
        if let Some(fwd) = node.forwarding.as_mut() {
            fwd.retry = RetryPolicy { max_attempts: 1, backoff: Duration::from_millis(200) };
        }
        let started = std::time::Instant::now();
        assert!(node.start().is_err());
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn error_line_extraction() {
        let output = "RuntimeCmd: \nInvalid Error: table Foo\nbye";
        assert_eq!(extract_error_line(output), "Invalid Error: table Foo");
        assert_eq!(extract_error_line("  just output  "), "just output");
    }
}
