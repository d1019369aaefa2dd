// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Floating IPs: a route on the provider router plus a static NAT pair on the tenant router.

use crate::errors::{CleanupReport, TopologyError, TopologyResult};
use crate::lifecycle::Orchestrator;
use crate::links::links_towards;
use crate::naming::tags::OS_FLOATING_IP_ID;
use crate::request::FloatingIp;
use crate::synth::floating_ip_rules;
use controller::client::ControllerClient;
use controller::model::{PortDevice, ResourceKind, RouteSpec};
use ipnet::Ipv4Net;
use tracing::info;

impl<C: ControllerClient> Orchestrator<C> {
    /// Route the floating IP to its router and translate it to the fixed IP.
    ///
    /// The router must have its filter chains and a gateway to the provider router.
    #[tracing::instrument(skip(self))]
    pub async fn associate_floating_ip(&self, fip: &FloatingIp) -> TopologyResult<()> {
        let chains = self.locator.get_router_chains(&fip.tenant_id, fip.router).await?;
        let provider = self
            .locator
            .get_or_create_provider_router(&self.provider_tenant())
            .await?
            .into_resource();

        let Some((provider_port, _)) = links_towards(
            self.client.as_ref(),
            PortDevice::Router(provider.id),
            PortDevice::Router(fip.router),
        )
        .await?
        .into_iter()
        .next() else {
            return Err(TopologyError::not_found(
                ResourceKind::Port,
                format!("provider router port towards router {}", fip.router),
            ));
        };

        self.ensure_route(
            provider.id,
            &RouteSpec::via_port(Ipv4Net::from(fip.floating_ip), provider_port.id),
        )
        .await?;

        let nat = floating_ip_rules(fip);
        self.ensure_rule(chains.inbound.id, &nat.inbound).await?;
        self.ensure_rule(chains.outbound.id, &nat.outbound).await?;
        info!(
            "Floating IP {} of router {} maps to {}",
            fip.floating_ip, fip.router, fip.fixed_ip
        );
        Ok(())
    }

    /// Undo [`Orchestrator::associate_floating_ip`]. Running it twice is harmless: the second
    /// run only reports what it did not find.
    #[tracing::instrument(skip(self))]
    pub async fn disassociate_floating_ip(&self, fip: &FloatingIp) -> TopologyResult<CleanupReport> {
        let client = self.client.as_ref();
        let mut report = CleanupReport::new();
        let host = Ipv4Net::from(fip.floating_ip);

        match self.locator.find_provider_router(&self.provider_tenant()).await? {
            Some(provider) => {
                let routes = client.list_routes(provider.id).await?;
                let mut deleted = 0;
                for route in routes.iter().filter(|r| r.dst == host) {
                    if report
                        .tolerate("delete floating IP route", client.delete_route(route.id).await)?
                        .is_some()
                    {
                        deleted += 1;
                    }
                }
                if deleted == 0 {
                    report.absent("delete floating IP route", ResourceKind::Route, host);
                }
            }
            None => report.absent(
                "delete floating IP route",
                ResourceKind::Router,
                &self.config.provider.router_name,
            ),
        }

        match self.locator.get_router_chains(&fip.tenant_id, fip.router).await {
            Ok(chains) => {
                let tag = fip.id.to_string();
                for chain in [chains.inbound.id, chains.outbound.id] {
                    self.delete_tagged_rules(chain, OS_FLOATING_IP_ID, &tag, &mut report)
                        .await?;
                }
            }
            Err(TopologyError::ResourceNotFound { kind, id }) => {
                report.absent("delete floating IP rules", kind, id);
            }
            Err(e) => return Err(e),
        }
        Ok(report)
    }
}
