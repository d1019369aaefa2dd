// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The interface through which every controller object is read and written.

use crate::errors::ClientError;
use crate::model::{
    Bridge, BridgeId, BridgeSpec, Chain, ChainId, ChainSpec, DhcpHost, DhcpSubnet, DhcpSubnetSpec,
    HostId, HostInterfacePort, Port, PortGroup, PortGroupId, PortGroupSpec, PortId, PortSpec,
    Route, RouteId, RouteSpec, Router, RouterId, RouterSpec, Rule, RuleId, RuleSpec, TenantId,
};
use ipnet::Ipv4Net;
use mac_address::MacAddress;

/// Result of a controller call.
pub type ClientResult<T> = Result<T, ClientError>;

/// A connection to a MidoNet controller.
///
/// Every call is a single remote operation, and none of them is transactional with any other.
/// Callers which need "find or create" semantics must build them on top (see
/// `rekon::ensure`).
///
/// Deleting an object which is already gone fails with [`ClientError::NotFound`].
pub trait ControllerClient: Send + Sync {
    /* routers */
    fn create_router(&self, spec: &RouterSpec) -> impl Future<Output = ClientResult<Router>> + Send;
    fn get_router(&self, id: RouterId) -> impl Future<Output = ClientResult<Router>> + Send;
    fn list_routers(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = ClientResult<Vec<Router>>> + Send;
    /// Store the mutable fields (name and filters) of `router`.
    fn update_router(&self, router: &Router) -> impl Future<Output = ClientResult<()>> + Send;
    /// Delete a router along with its ports and routes.
    ///
    /// Rejected while any of its ports is linked.
    fn delete_router(&self, id: RouterId) -> impl Future<Output = ClientResult<()>> + Send;

    /* bridges */
    fn create_bridge(&self, spec: &BridgeSpec) -> impl Future<Output = ClientResult<Bridge>> + Send;
    fn get_bridge(&self, id: BridgeId) -> impl Future<Output = ClientResult<Bridge>> + Send;
    fn list_bridges(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = ClientResult<Vec<Bridge>>> + Send;
    fn update_bridge(&self, bridge: &Bridge) -> impl Future<Output = ClientResult<()>> + Send;
    /// Delete a bridge along with its ports and DHCP configuration.
    ///
    /// Rejected while any of its ports is linked.
    fn delete_bridge(&self, id: BridgeId) -> impl Future<Output = ClientResult<()>> + Send;

    /* ports */
    fn create_router_port(
        &self,
        router: RouterId,
        spec: &PortSpec,
    ) -> impl Future<Output = ClientResult<Port>> + Send;
    fn create_bridge_port(
        &self,
        bridge: BridgeId,
        spec: &PortSpec,
    ) -> impl Future<Output = ClientResult<Port>> + Send;
    fn get_port(&self, id: PortId) -> impl Future<Output = ClientResult<Port>> + Send;
    fn list_router_ports(
        &self,
        router: RouterId,
    ) -> impl Future<Output = ClientResult<Vec<Port>>> + Send;
    fn list_bridge_ports(
        &self,
        bridge: BridgeId,
    ) -> impl Future<Output = ClientResult<Vec<Port>>> + Send;
    /// Store the filters, port group memberships and VIF binding of `port`.
    ///
    /// Links are changed with [`ControllerClient::link_ports`] only.
    fn update_port(&self, port: &Port) -> impl Future<Output = ClientResult<()>> + Send;
    /// Delete a port. Rejected while the port is linked.
    fn delete_port(&self, id: PortId) -> impl Future<Output = ClientResult<()>> + Send;
    /// Link two unlinked interior ports.
    fn link_ports(&self, a: PortId, b: PortId) -> impl Future<Output = ClientResult<()>> + Send;
    /// Break the link of `port`, if any.
    fn unlink_port(&self, port: PortId) -> impl Future<Output = ClientResult<()>> + Send;

    /* routes */
    fn create_route(
        &self,
        router: RouterId,
        spec: &RouteSpec,
    ) -> impl Future<Output = ClientResult<Route>> + Send;
    fn list_routes(&self, router: RouterId)
    -> impl Future<Output = ClientResult<Vec<Route>>> + Send;
    fn delete_route(&self, id: RouteId) -> impl Future<Output = ClientResult<()>> + Send;

    /* chains and rules */
    fn create_chain(&self, spec: &ChainSpec) -> impl Future<Output = ClientResult<Chain>> + Send;
    fn get_chain(&self, id: ChainId) -> impl Future<Output = ClientResult<Chain>> + Send;
    fn list_chains(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = ClientResult<Vec<Chain>>> + Send;
    /// Delete a chain and its rules, clearing every filter slot which referenced it.
    fn delete_chain(&self, id: ChainId) -> impl Future<Output = ClientResult<()>> + Send;
    /// Add a rule. Rules at and after the requested position shift down by one.
    fn create_rule(
        &self,
        chain: ChainId,
        spec: &RuleSpec,
    ) -> impl Future<Output = ClientResult<Rule>> + Send;
    /// The rules of `chain`, in evaluation order.
    fn list_rules(&self, chain: ChainId) -> impl Future<Output = ClientResult<Vec<Rule>>> + Send;
    fn delete_rule(&self, id: RuleId) -> impl Future<Output = ClientResult<()>> + Send;

    /* port groups */
    fn create_port_group(
        &self,
        spec: &PortGroupSpec,
    ) -> impl Future<Output = ClientResult<PortGroup>> + Send;
    fn list_port_groups(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = ClientResult<Vec<PortGroup>>> + Send;
    /// Delete a port group, dropping it from the membership of every port.
    fn delete_port_group(&self, id: PortGroupId) -> impl Future<Output = ClientResult<()>> + Send;

    /* dhcp */
    fn create_dhcp_subnet(
        &self,
        bridge: BridgeId,
        spec: &DhcpSubnetSpec,
    ) -> impl Future<Output = ClientResult<DhcpSubnet>> + Send;
    fn list_dhcp_subnets(
        &self,
        bridge: BridgeId,
    ) -> impl Future<Output = ClientResult<Vec<DhcpSubnet>>> + Send;
    fn delete_dhcp_subnet(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
    ) -> impl Future<Output = ClientResult<()>> + Send;
    fn create_dhcp_host(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        host: &DhcpHost,
    ) -> impl Future<Output = ClientResult<DhcpHost>> + Send;
    fn list_dhcp_hosts(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
    ) -> impl Future<Output = ClientResult<Vec<DhcpHost>>> + Send;
    fn delete_dhcp_host(
        &self,
        bridge: BridgeId,
        prefix: Ipv4Net,
        mac: MacAddress,
    ) -> impl Future<Output = ClientResult<()>> + Send;

    /* hosts */
    /// Bind an exterior port to the interface `interface` of `host`.
    fn bind_host_interface(
        &self,
        host: HostId,
        port: PortId,
        interface: &str,
    ) -> impl Future<Output = ClientResult<HostInterfacePort>> + Send;
    fn list_host_interface_ports(
        &self,
        host: HostId,
    ) -> impl Future<Output = ClientResult<Vec<HostInterfacePort>>> + Send;
}
