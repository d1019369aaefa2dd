// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(clippy::unwrap_used)]

use config::TopologyConfig;
use controller::model::{
    Bridge, ETHERTYPE_ARP, FlowAction, NatTarget, PortDevice, PortRange, ResourceKind, Router,
    RuleAction, TenantId, VifId,
};
use controller::{ControllerClient, InMemoryController};
use ipnet::{IpNet, Ipv4Net};
use mac_address::MacAddress;
use midonet_topology::naming::tags::{OS_FLOATING_IP_ID, OS_SG_RULE_ID, OS_TENANT_ROUTER_SNAT};
use midonet_topology::naming::{router_chain_names, sg_label, vif_chain_names};
use midonet_topology::request::{
    DeviceOwner, ExternalGateway, FloatingIp, FloatingIpId, NetworkRequest, NetworkUpdate,
    PortRequest, Protocol, RouterInterface, RouterRequest, RuleSource, SecurityGroup,
    SecurityGroupId, SecurityGroupRule, SecurityGroupRuleId, SubnetRequest, VifFilterRequest,
};
use midonet_topology::{Orchestrator, TopologyError};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing_test::traced_test;

fn orchestrator() -> (Arc<InMemoryController>, Orchestrator<InMemoryController>) {
    let client = Arc::new(InMemoryController::new());
    let orchestrator = Orchestrator::new(client.clone(), Arc::new(TopologyConfig::default()));
    (client, orchestrator)
}

fn provider_tenant() -> TenantId {
    TenantId::from("mido_provider")
}

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x02, 0, 0, 0, 0, last])
}

async fn network_with_subnet(orchestrator: &Orchestrator<InMemoryController>, cidr: &str) -> Bridge {
    let bridge = orchestrator
        .create_network(&NetworkRequest::new("t1", "net1"))
        .await
        .unwrap();
    orchestrator
        .create_subnet(&SubnetRequest {
            network: bridge.id,
            cidr: IpNet::V4(net(cidr)),
            gateway_ip: None,
            external: false,
        })
        .await
        .unwrap();
    bridge
}

/// A router of tenant `t1` with its gateway set, and the provider router.
async fn router_with_gateway(orchestrator: &Orchestrator<InMemoryController>) -> (Router, Router) {
    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let provider = orchestrator
        .locator()
        .get_or_create_provider_router(&provider_tenant())
        .await
        .unwrap()
        .into_resource();
    orchestrator
        .set_router_gateway(
            &TenantId::from("t1"),
            router.id,
            &ExternalGateway {
                gateway_ip: Ipv4Addr::new(203, 0, 113, 2),
            },
        )
        .await
        .unwrap();
    (router, provider)
}

fn floating_ip(router: &Router) -> FloatingIp {
    FloatingIp {
        id: FloatingIpId(42),
        tenant_id: TenantId::from("t1"),
        router: router.id,
        floating_ip: Ipv4Addr::new(203, 0, 113, 5),
        fixed_ip: Ipv4Addr::new(10, 0, 0, 7),
    }
}

fn security_group(id: u64, name: &str) -> SecurityGroup {
    SecurityGroup {
        id: SecurityGroupId(id),
        tenant_id: TenantId::from("t1"),
        name: name.to_string(),
    }
}

#[tokio::test]
#[traced_test]
async fn networks_are_renamed_but_never_disabled() {
    let (client, orchestrator) = orchestrator();
    let bridge = orchestrator
        .create_network(&NetworkRequest {
            tenant_id: TenantId::from("t1"),
            name: "net1".to_string(),
            admin_state_up: false,
        })
        .await
        .unwrap();
    assert_eq!(orchestrator.get_network(bridge.id).await.unwrap(), bridge);

    let renamed = orchestrator
        .update_network(
            bridge.id,
            &NetworkUpdate {
                name: Some("net2".to_string()),
                admin_state_up: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "net2");
    assert_eq!(client.get_bridge(bridge.id).await.unwrap().name, "net2");

    let err = orchestrator
        .update_network(
            bridge.id,
            &NetworkUpdate {
                name: None,
                admin_state_up: Some(false),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::UnsupportedConfiguration(_)));

    orchestrator.delete_network(bridge.id).await.unwrap();
    let err = orchestrator.get_network(bridge.id).await.unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ResourceNotFound {
            kind: ResourceKind::Bridge,
            ..
        }
    ));
}

#[tokio::test]
#[traced_test]
async fn a_network_has_a_single_subnet() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let subnets = client.list_dhcp_subnets(bridge.id).await.unwrap();
    assert_eq!(subnets.len(), 1);
    assert_eq!(subnets[0].default_gateway, Ipv4Addr::new(10, 0, 0, 1));

    let creates = client.create_count();
    let request = |cidr: IpNet| SubnetRequest {
        network: bridge.id,
        cidr,
        gateway_ip: None,
        external: false,
    };
    orchestrator
        .create_subnet(&request(IpNet::V4(net("10.0.0.0/24"))))
        .await
        .unwrap();
    assert_eq!(client.create_count(), creates);

    let err = orchestrator
        .create_subnet(&request(IpNet::V4(net("10.1.0.0/24"))))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::UnsupportedConfiguration(_)));
    let err = orchestrator
        .create_subnet(&request("2001:db8::/64".parse().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::UnsupportedConfiguration(_)));
    assert_eq!(client.list_dhcp_subnets(bridge.id).await.unwrap().len(), 1);

    orchestrator
        .verify_subnet(bridge.id, net("10.0.0.0/24"))
        .await
        .unwrap();
    let err = orchestrator
        .verify_subnet(bridge.id, net("10.1.0.0/24"))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::OutOfSync(_)));
}

#[tokio::test]
#[traced_test]
async fn gateway_outside_the_subnet_is_refused() {
    let (client, orchestrator) = orchestrator();
    let bridge = orchestrator
        .create_network(&NetworkRequest::new("t1", "net1"))
        .await
        .unwrap();
    let err = orchestrator
        .create_subnet(&SubnetRequest {
            network: bridge.id,
            cidr: IpNet::V4(net("10.0.0.0/24")),
            gateway_ip: Some(Ipv4Addr::new(10, 0, 1, 1)),
            external: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::UnsupportedConfiguration(_)));
    assert!(client.list_dhcp_subnets(bridge.id).await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn external_subnet_teardown_is_symmetric() {
    let (client, orchestrator) = orchestrator();
    let provider = orchestrator
        .locator()
        .get_or_create_provider_router(&provider_tenant())
        .await
        .unwrap()
        .into_resource();
    let bridge = orchestrator
        .create_network(&NetworkRequest::new("admin", "public"))
        .await
        .unwrap();
    let before = client.snapshot();

    let request = SubnetRequest {
        network: bridge.id,
        cidr: IpNet::V4(net("203.0.113.0/24")),
        gateway_ip: None,
        external: true,
    };
    orchestrator.create_subnet(&request).await.unwrap();
    let ports = client.list_router_ports(provider.id).await.unwrap();
    assert_eq!(ports.len(), 1);
    assert!(ports[0].has_address(Ipv4Addr::new(203, 0, 113, 1), net("203.0.113.0/24")));
    let routes = client.list_routes(provider.id).await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].dst, net("203.0.113.0/24"));
    assert_eq!(routes[0].next_hop_port, Some(ports[0].id));

    // re-running finds the link and the route
    let creates = client.create_count();
    orchestrator.create_subnet(&request).await.unwrap();
    assert_eq!(client.create_count(), creates);

    let report = orchestrator
        .delete_subnet(bridge.id, net("203.0.113.0/24"), true)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(client.snapshot(), before);
}

#[tokio::test]
#[traced_test]
async fn ports_are_classified_by_owner() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let request = |owner: DeviceOwner, fixed_ip: Option<Ipv4Addr>| PortRequest {
        network: bridge.id,
        tenant_id: TenantId::from("t1"),
        mac: mac(7),
        fixed_ip,
        device_owner: owner,
    };

    let compute = orchestrator
        .create_port(&request(
            DeviceOwner::parse("compute:nova"),
            Some(Ipv4Addr::new(10, 0, 0, 7)),
        ))
        .await
        .unwrap();
    assert!(compute.is_exterior());
    let hosts = client
        .list_dhcp_hosts(bridge.id, net("10.0.0.0/24"))
        .await
        .unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].mac, mac(7));
    assert_eq!(hosts[0].ip, Ipv4Addr::new(10, 0, 0, 7));

    let interface = orchestrator
        .create_port(&request(DeviceOwner::parse("network:router_interface"), None))
        .await
        .unwrap();
    assert!(interface.is_interior());
    let dhcp = orchestrator
        .create_port(&request(DeviceOwner::parse("network:dhcp"), None))
        .await
        .unwrap();
    assert!(dhcp.is_exterior());
    assert_eq!(
        client
            .list_dhcp_hosts(bridge.id, net("10.0.0.0/24"))
            .await
            .unwrap()
            .len(),
        1
    );

    let err = orchestrator
        .create_port(&request(DeviceOwner::parse("compute:nova"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::UnsupportedConfiguration(_)));

    let report = orchestrator
        .delete_port(bridge.id, compute.id, mac(7), Some(Ipv4Addr::new(10, 0, 0, 7)))
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert!(
        client
            .list_dhcp_hosts(bridge.id, net("10.0.0.0/24"))
            .await
            .unwrap()
            .is_empty()
    );
    let again = orchestrator
        .delete_port(bridge.id, compute.id, mac(7), Some(Ipv4Addr::new(10, 0, 0, 7)))
        .await
        .unwrap();
    assert!(!again.is_clean());
    let report = orchestrator
        .delete_port(bridge.id, dhcp.id, mac(7), None)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
}

#[tokio::test]
#[traced_test]
async fn leases_are_matched_on_mac_and_address() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let port = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: TenantId::from("t1"),
            mac: mac(7),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 7)),
            device_owner: DeviceOwner::parse("compute:nova"),
        })
        .await
        .unwrap();

    let report = orchestrator
        .delete_port(bridge.id, port.id, mac(7), Some(Ipv4Addr::new(10, 0, 0, 8)))
        .await
        .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].kind, ResourceKind::DhcpHost);
    let hosts = client
        .list_dhcp_hosts(bridge.id, net("10.0.0.0/24"))
        .await
        .unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].ip, Ipv4Addr::new(10, 0, 0, 7));
}

#[tokio::test]
#[traced_test]
async fn failed_lease_takes_the_port_back() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    client.fail_next_create(ResourceKind::DhcpHost);

    let err = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: TenantId::from("t1"),
            mac: mac(7),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 7)),
            device_owner: DeviceOwner::parse("compute:nova"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::RemoteTransportFailure(_)));
    assert!(client.list_bridge_ports(bridge.id).await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn vifs_are_attached_to_exterior_ports_only() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let port = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: TenantId::from("t1"),
            mac: mac(7),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 7)),
            device_owner: DeviceOwner::parse("compute:nova"),
        })
        .await
        .unwrap();
    let vif = VifId::new();
    orchestrator.attach_vif(port.id, vif).await.unwrap();
    assert_eq!(client.get_port(port.id).await.unwrap().vif_id, Some(vif));
    orchestrator.detach_vif(port.id).await.unwrap();
    assert_eq!(client.get_port(port.id).await.unwrap().vif_id, None);

    let interior = client
        .create_bridge_port(bridge.id, &controller::model::PortSpec::interior())
        .await
        .unwrap();
    let err = orchestrator.attach_vif(interior.id, vif).await.unwrap_err();
    assert!(matches!(err, TopologyError::Rejected { .. }));
}

#[tokio::test]
#[traced_test]
async fn routers_get_chains_and_metadata() {
    let (client, orchestrator) = orchestrator();
    let config = TopologyConfig::default();
    let metadata = orchestrator
        .locator()
        .ensure_metadata_devices(&provider_tenant())
        .await
        .unwrap();
    let before = client.snapshot();

    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let chains = orchestrator
        .locator()
        .get_router_chains(&TenantId::from("t1"), router.id)
        .await
        .unwrap();
    let names = router_chain_names(router.id);
    assert_eq!(chains.inbound.name, names.inbound);
    assert_eq!(chains.outbound.name, names.outbound);
    assert_eq!(router.inbound_filter_id, Some(chains.inbound.id));
    assert_eq!(router.outbound_filter_id, Some(chains.outbound.id));

    let ports = client.list_router_ports(router.id).await.unwrap();
    assert_eq!(ports.len(), 1);
    let link = config.metadata.tenant_link;
    assert!(ports[0].has_address(link.tenant_address, link.network));
    let peer = client.get_port(ports[0].peer_id.unwrap()).await.unwrap();
    assert_eq!(peer.device, PortDevice::Router(metadata.router.resource().id));
    let routes = client.list_routes(router.id).await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].dst, Ipv4Net::from(config.metadata.service_address));

    let report = orchestrator
        .delete_router(&TenantId::from("t1"), router.id)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(client.snapshot(), before);
}

#[tokio::test]
#[traced_test]
async fn gateway_teardown_is_symmetric() {
    let (client, orchestrator) = orchestrator();
    let config = TopologyConfig::default();
    let tenant = TenantId::from("t1");
    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let provider = orchestrator
        .locator()
        .get_or_create_provider_router(&provider_tenant())
        .await
        .unwrap()
        .into_resource();
    let before = client.snapshot();

    let gateway = ExternalGateway {
        gateway_ip: Ipv4Addr::new(203, 0, 113, 2),
    };
    let port = orchestrator
        .set_router_gateway(&tenant, router.id, &gateway)
        .await
        .unwrap();
    let link = config.gateway_link;
    assert!(port.has_address(link.tenant_address, link.network));
    let peer = client.get_port(port.peer_id.unwrap()).await.unwrap();
    assert_eq!(peer.device, PortDevice::Router(provider.id));
    let provider_routes = client.list_routes(provider.id).await.unwrap();
    assert!(
        provider_routes
            .iter()
            .any(|r| r.dst == net("203.0.113.2/32") && r.next_hop_port == Some(peer.id))
    );
    let routes = client.list_routes(router.id).await.unwrap();
    assert!(
        routes
            .iter()
            .any(|r| r.dst == net("0.0.0.0/0") && r.next_hop_port == Some(port.id))
    );

    let chains = orchestrator
        .locator()
        .get_router_chains(&tenant, router.id)
        .await
        .unwrap();
    let tag = router.id.to_string();
    let inbound = client.list_rules(chains.inbound.id).await.unwrap();
    let outbound = client.list_rules(chains.outbound.id).await.unwrap();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].action, RuleAction::RevSnat);
    assert!(inbound[0].is_tagged(OS_TENANT_ROUTER_SNAT, &tag));
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].action, RuleAction::Snat);
    assert_eq!(outbound[0].matches.out_ports, vec![port.id]);
    assert_eq!(
        outbound[0].nat_targets,
        vec![NatTarget::address(gateway.gateway_ip).with_ports(1, 65535)]
    );

    let creates = client.create_count();
    let again = orchestrator
        .set_router_gateway(&tenant, router.id, &gateway)
        .await
        .unwrap();
    assert_eq!(again.id, port.id);
    assert_eq!(client.create_count(), creates);

    let report = orchestrator
        .clear_router_gateway(&tenant, router.id)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(client.snapshot(), before);

    let again = orchestrator
        .clear_router_gateway(&tenant, router.id)
        .await
        .unwrap();
    assert!(!again.is_clean());
    assert_eq!(client.snapshot(), before);
}

#[tokio::test]
#[traced_test]
async fn router_interface_teardown_is_symmetric() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let bridge_port = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: TenantId::from("t1"),
            mac: mac(1),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
            device_owner: DeviceOwner::RouterInterface,
        })
        .await
        .unwrap();
    let before = client.snapshot();

    let interface = RouterInterface {
        router: router.id,
        bridge_port: bridge_port.id,
        subnet: net("10.0.0.0/24"),
        gateway_ip: Ipv4Addr::new(10, 0, 0, 1),
    };
    let router_port = orchestrator.add_router_interface(&interface).await.unwrap();
    assert_eq!(router_port.peer_id, Some(bridge_port.id));
    assert!(router_port.has_address(Ipv4Addr::new(10, 0, 0, 1), net("10.0.0.0/24")));
    let routes = client.list_routes(router.id).await.unwrap();
    assert!(
        routes
            .iter()
            .any(|r| r.dst == net("10.0.0.0/24") && r.next_hop_port == Some(router_port.id))
    );

    let creates = client.create_count();
    let again = orchestrator.add_router_interface(&interface).await.unwrap();
    assert_eq!(again.id, router_port.id);
    assert_eq!(client.create_count(), creates);

    let report = orchestrator
        .remove_router_interface(router.id, bridge_port.id)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(client.snapshot(), before);
}

#[tokio::test]
#[traced_test]
async fn floating_ip_needs_a_gateway() {
    let (_, orchestrator) = orchestrator();
    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let err = orchestrator
        .associate_floating_ip(&floating_ip(&router))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ResourceNotFound {
            kind: ResourceKind::Port,
            ..
        }
    ));
}

#[tokio::test]
#[traced_test]
async fn floating_ip_is_translated_both_ways() {
    let (client, orchestrator) = orchestrator();
    let (router, provider) = router_with_gateway(&orchestrator).await;
    let before = client.snapshot();
    let fip = floating_ip(&router);

    orchestrator.associate_floating_ip(&fip).await.unwrap();

    let routes = client.list_routes(provider.id).await.unwrap();
    let route = routes
        .iter()
        .find(|r| r.dst == net("203.0.113.5/32"))
        .unwrap();
    let towards = client.get_port(route.next_hop_port.unwrap()).await.unwrap();
    let peer = client.get_port(towards.peer_id.unwrap()).await.unwrap();
    assert_eq!(peer.device, PortDevice::Router(router.id));

    let chains = orchestrator
        .locator()
        .get_router_chains(&fip.tenant_id, router.id)
        .await
        .unwrap();
    let inbound = client.list_rules(chains.inbound.id).await.unwrap();
    let dnat = &inbound[0];
    assert_eq!(dnat.position, 1);
    assert_eq!(dnat.action, RuleAction::Dnat);
    assert_eq!(dnat.flow_action, Some(FlowAction::Accept));
    assert_eq!(dnat.matches.nw_dst, Some(net("203.0.113.5/32")));
    assert_eq!(dnat.nat_targets, vec![NatTarget::address(fip.fixed_ip)]);
    assert!(dnat.is_tagged(OS_FLOATING_IP_ID, "42"));
    let outbound = client.list_rules(chains.outbound.id).await.unwrap();
    let snat = &outbound[0];
    assert_eq!(snat.action, RuleAction::Snat);
    assert_eq!(snat.matches.nw_src, Some(net("10.0.0.7/32")));
    assert_eq!(snat.nat_targets, vec![NatTarget::address(fip.floating_ip)]);
    assert!(snat.is_tagged(OS_FLOATING_IP_ID, "42"));

    // associating again changes nothing
    let creates = client.create_count();
    orchestrator.associate_floating_ip(&fip).await.unwrap();
    assert_eq!(client.create_count(), creates);

    let report = orchestrator.disassociate_floating_ip(&fip).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(client.snapshot(), before);

    let again = orchestrator.disassociate_floating_ip(&fip).await.unwrap();
    assert_eq!(again.skipped.len(), 3);
    assert_eq!(client.snapshot(), before);
}

#[tokio::test]
#[traced_test]
async fn security_group_rules_are_found_by_tag() {
    let (client, orchestrator) = orchestrator();
    let tenant = TenantId::from("t1");
    let group = security_group(1, "sg1");
    let devices = orchestrator.create_security_group(&group).await.unwrap();
    assert_eq!(devices.chain.name, sg_label(group.id, "sg1"));
    assert_eq!(devices.port_group.name, sg_label(group.id, "sg1"));

    let rule = SecurityGroupRule {
        id: SecurityGroupRuleId(100),
        parent: group.clone(),
        protocol: Protocol::Tcp,
        from_port: 80,
        to_port: 80,
        source: RuleSource::Cidr(net("10.0.0.0/24")),
    };
    orchestrator.create_security_group_rule(&rule).await.unwrap();

    let rules = client.list_rules(devices.chain.id).await.unwrap();
    assert_eq!(rules.len(), 1);
    let created = &rules[0];
    assert_eq!(created.action, RuleAction::Accept);
    assert_eq!(created.matches.nw_proto, Some(6));
    assert_eq!(created.matches.tp_dst, Some(PortRange::new(80, 80)));
    assert_eq!(created.matches.nw_src, Some(net("10.0.0.0/24")));
    assert_eq!(created.matches.port_group, None);
    assert!(created.is_tagged(OS_SG_RULE_ID, "100"));

    let found = orchestrator
        .find_rules_by_tag(&tenant, OS_SG_RULE_ID, "100")
        .await
        .unwrap();
    assert_eq!(found, vec![created.clone()]);

    let deleted = orchestrator
        .delete_security_group_rule(&tenant, rule.id)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(client.list_rules(devices.chain.id).await.unwrap().is_empty());
    assert!(
        orchestrator
            .find_rules_by_tag(&tenant, OS_SG_RULE_ID, "100")
            .await
            .unwrap()
            .is_empty()
    );
    let err = orchestrator
        .delete_security_group_rule(&tenant, rule.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ResourceNotFound {
            kind: ResourceKind::Rule,
            ..
        }
    ));
}

#[tokio::test]
#[traced_test]
async fn group_sources_match_the_group_members() {
    let (client, orchestrator) = orchestrator();
    let web = security_group(1, "web");
    let db = security_group(2, "db");
    orchestrator.create_security_group(&web).await.unwrap();
    let db_devices = orchestrator.create_security_group(&db).await.unwrap();

    let rule = SecurityGroupRule {
        id: SecurityGroupRuleId(7),
        parent: db.clone(),
        protocol: Protocol::Tcp,
        from_port: 5432,
        to_port: 5432,
        source: RuleSource::Group(web.clone()),
    };
    let missing = SecurityGroupRule {
        source: RuleSource::Group(security_group(3, "gone")),
        ..rule.clone()
    };
    let err = orchestrator
        .create_security_group_rule(&missing)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ResourceNotFound {
            kind: ResourceKind::PortGroup,
            ..
        }
    ));

    let created = orchestrator.create_security_group_rule(&rule).await.unwrap();
    let web_group = orchestrator
        .locator()
        .get_named::<controller::model::PortGroup>(&controller::model::NamedSpec::new(
            "t1",
            sg_label(web.id, "web"),
        ))
        .await
        .unwrap();
    assert_eq!(created.matches.port_group, Some(web_group.id));
    assert_eq!(created.matches.nw_src, None);
    assert_eq!(created.chain_id, db_devices.chain.id);

    let report = orchestrator.delete_security_group(&db).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
    let chains = client.list_chains(&TenantId::from("t1")).await.unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].name, sg_label(web.id, "web"));
    let groups = client.list_port_groups(&TenantId::from("t1")).await.unwrap();
    assert_eq!(groups.len(), 1);
}

#[tokio::test]
#[traced_test]
async fn vif_filters_are_ordered_and_exclusive() {
    let (client, orchestrator) = orchestrator();
    let tenant = TenantId::from("t1");
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let port = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: tenant.clone(),
            mac: mac(7),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 7)),
            device_owner: DeviceOwner::parse("compute:nova"),
        })
        .await
        .unwrap();
    let groups = vec![security_group(0, "default"), security_group(1, "web")];
    let mut devices = Vec::new();
    for group in &groups {
        devices.push(orchestrator.create_security_group(group).await.unwrap());
    }

    let vif = VifId::new();
    let request = VifFilterRequest {
        tenant_id: tenant.clone(),
        vif_id: vif,
        port: port.id,
        mac: mac(7),
        ip: Ipv4Addr::new(10, 0, 0, 7),
        subnet: net("10.0.0.0/24"),
        security_groups: groups,
    };
    let chains = orchestrator.prepare_vif_filter(&request).await.unwrap();
    let names = vif_chain_names(vif);
    assert_eq!(chains.inbound.name, names.inbound);
    assert_eq!(chains.outbound.name, names.outbound);

    let ingress = client.list_rules(chains.inbound.id).await.unwrap();
    assert_eq!(ingress.len(), 3);
    assert_eq!(ingress[0].matches.dl_src, Some(mac(7)));
    assert!(ingress[0].matches.inv_dl_src);
    assert!(ingress[2].matches.match_forward_flow);

    let egress = client.list_rules(chains.outbound.id).await.unwrap();
    let actions: Vec<RuleAction> = egress.iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            RuleAction::Accept,
            RuleAction::Jump,
            RuleAction::Jump,
            RuleAction::Accept,
            RuleAction::Drop,
        ]
    );
    assert_eq!(egress[0].matches.nw_src, Some(net("10.0.0.0/24")));
    assert_eq!(egress[1].jump_chain_id, Some(devices[0].chain.id));
    assert_eq!(egress[2].jump_chain_id, Some(devices[1].chain.id));
    assert!(egress[3].matches.match_return_flow);
    assert_eq!(egress[4].matches.dl_type, Some(ETHERTYPE_ARP));
    assert!(egress[4].matches.inv_dl_type);

    let filtered = client.get_port(port.id).await.unwrap();
    assert_eq!(filtered.inbound_filter_id, Some(chains.inbound.id));
    assert_eq!(filtered.outbound_filter_id, Some(chains.outbound.id));
    assert_eq!(
        filtered.port_group_ids,
        vec![devices[0].port_group.id, devices[1].port_group.id]
    );

    let err = orchestrator.prepare_vif_filter(&request).await.unwrap_err();
    assert!(matches!(
        err,
        TopologyError::AlreadyExists {
            kind: ResourceKind::Chain,
            ..
        }
    ));

    let report = orchestrator.unfilter_vif(&tenant, vif, port.id).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
    let unfiltered = client.get_port(port.id).await.unwrap();
    assert_eq!(unfiltered.inbound_filter_id, None);
    assert_eq!(unfiltered.outbound_filter_id, None);
    assert!(unfiltered.port_group_ids.is_empty());
    let remaining = client.list_chains(&tenant).await.unwrap();
    assert!(remaining.iter().all(|c| !names.contains(&c.name)));
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
#[traced_test]
async fn unfiltering_a_deleted_port_still_drops_the_chains() {
    let (client, orchestrator) = orchestrator();
    let tenant = TenantId::from("t1");
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let port = client
        .create_bridge_port(bridge.id, &controller::model::PortSpec::exterior())
        .await
        .unwrap();
    let vif = VifId::new();
    orchestrator
        .prepare_vif_filter(&VifFilterRequest {
            tenant_id: tenant.clone(),
            vif_id: vif,
            port: port.id,
            mac: mac(9),
            ip: Ipv4Addr::new(10, 0, 0, 9),
            subnet: net("10.0.0.0/24"),
            security_groups: Vec::new(),
        })
        .await
        .unwrap();
    client.delete_port(port.id).await.unwrap();

    let report = orchestrator.unfilter_vif(&tenant, vif, port.id).await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].kind, ResourceKind::Port);
    assert!(client.list_chains(&tenant).await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn new_gateway_address_replaces_the_old_translation() {
    let (client, orchestrator) = orchestrator();
    let (router, provider) = router_with_gateway(&orchestrator).await;
    let fip = floating_ip(&router);
    orchestrator.associate_floating_ip(&fip).await.unwrap();

    let gateway = ExternalGateway {
        gateway_ip: Ipv4Addr::new(203, 0, 113, 3),
    };
    let port = orchestrator
        .set_router_gateway(&fip.tenant_id, router.id, &gateway)
        .await
        .unwrap();

    let dsts: Vec<_> = client
        .list_routes(provider.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.dst)
        .collect();
    assert!(!dsts.contains(&net("203.0.113.2/32")));
    assert!(dsts.contains(&net("203.0.113.3/32")));
    assert!(dsts.contains(&net("203.0.113.5/32")));

    let chains = orchestrator
        .locator()
        .get_router_chains(&fip.tenant_id, router.id)
        .await
        .unwrap();
    let tag = router.id.to_string();
    for chain in [chains.inbound.id, chains.outbound.id] {
        let rules = client.list_rules(chain).await.unwrap();
        let snat: Vec<_> = rules
            .iter()
            .filter(|r| r.is_tagged(OS_TENANT_ROUTER_SNAT, &tag))
            .collect();
        assert_eq!(snat.len(), 1);
        assert_eq!(rules.iter().filter(|r| r.is_tagged(OS_FLOATING_IP_ID, "42")).count(), 1);
    }
    let outbound = client.list_rules(chains.outbound.id).await.unwrap();
    let snat = outbound
        .iter()
        .find(|r| r.is_tagged(OS_TENANT_ROUTER_SNAT, &tag))
        .unwrap();
    assert_eq!(snat.matches.out_ports, vec![port.id]);
    assert_eq!(
        snat.nat_targets,
        vec![NatTarget::address(gateway.gateway_ip).with_ports(1, 65535)]
    );
}

#[tokio::test]
#[traced_test]
async fn deleted_router_leaves_interface_ports_to_their_network() {
    let (client, orchestrator) = orchestrator();
    let bridge = network_with_subnet(&orchestrator, "10.0.0.0/24").await;
    let router = orchestrator
        .create_router(&RouterRequest::new("t1", "r1"))
        .await
        .unwrap();
    let bridge_port = orchestrator
        .create_port(&PortRequest {
            network: bridge.id,
            tenant_id: TenantId::from("t1"),
            mac: mac(1),
            fixed_ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
            device_owner: DeviceOwner::RouterInterface,
        })
        .await
        .unwrap();
    orchestrator
        .add_router_interface(&RouterInterface {
            router: router.id,
            bridge_port: bridge_port.id,
            subnet: net("10.0.0.0/24"),
            gateway_ip: Ipv4Addr::new(10, 0, 0, 1),
        })
        .await
        .unwrap();

    let report = orchestrator
        .delete_router(&TenantId::from("t1"), router.id)
        .await
        .unwrap();
    assert!(report.is_clean(), "{report:?}");
    let kept = client.get_port(bridge_port.id).await.unwrap();
    assert_eq!(kept.peer_id, None);
    assert!(client.get_router(router.id).await.unwrap_err().is_not_found());
}
