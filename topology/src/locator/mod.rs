// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Find-or-create of the infrastructure devices: the provider router, the metadata router and
//! bridge, tenant routers, router filter chains and the fake uplink.
//!
//! Every step searches before it creates, so a sequence interrupted half way through is
//! completed, not duplicated, by the next call.

mod devices;
mod metadata;
mod routers;
mod uplink;

pub use devices::TenantRouter;
pub use metadata::MetadataDevices;
pub use routers::RouterChains;
pub use uplink::{FAKE_UPLINK_ADDRESS, FAKE_UPLINK_GATEWAY, FAKE_UPLINK_NETWORK};

use crate::errors::{DuplicateResourceWarning, TopologyError, TopologyResult};
use config::TopologyConfig;
use controller::client::ControllerClient;
use controller::model::{Bridge, Chain, NamedSpec, PortGroup, ResourceKind, Router};
use rekon::{Create, Locate, Located};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// `Manager` carries what the `rekon` trait implementations need: a controller client and the
/// configuration.
///
/// The `PhantomData<R>` selects which kind of resource (`R`) is being reconciled, allowing one
/// implementation of each `rekon` trait per kind.
#[derive(Debug)]
pub struct Manager<C, R: ?Sized> {
    client: Arc<C>,
    config: Arc<TopologyConfig>,
    _marker: PhantomData<R>,
}

impl<C, R: ?Sized> Clone for Manager<C, R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<C, R: ?Sized> Manager<C, R> {
    #[must_use]
    pub fn new(client: Arc<C>, config: Arc<TopologyConfig>) -> Self {
        Manager {
            client,
            config,
            _marker: PhantomData,
        }
    }
}

/// Convenience method for reducing syntactic noise when creating ephemeral `Manager` structs.
pub fn manager_of<C, T: ?Sized>(other: impl Into<Manager<C, T>>) -> Manager<C, T> {
    other.into()
}

impl<C, T: ?Sized, U: ?Sized> From<&Manager<C, T>> for Manager<C, U> {
    fn from(manager: &Manager<C, T>) -> Self {
        Self::new(manager.client.clone(), manager.config.clone())
    }
}

/// Objects located by `(tenant, name)`.
pub trait Named {
    const KIND: ResourceKind;
    fn name(&self) -> &str;
    fn id_string(&self) -> String;
}

macro_rules! named {
    ($ty:ty, $kind:expr) => {
        impl Named for $ty {
            const KIND: ResourceKind = $kind;
            fn name(&self) -> &str {
                &self.name
            }
            fn id_string(&self) -> String {
                self.id.to_string()
            }
        }
    };
}

named!(Router, ResourceKind::Router);
named!(Bridge, ResourceKind::Bridge);
named!(Chain, ResourceKind::Chain);
named!(PortGroup, ResourceKind::PortGroup);

/// Log and return a warning if `located` came with duplicates.
pub fn duplicate_warning<T: Named>(located: &Located<T>) -> Option<DuplicateResourceWarning> {
    let duplicates = located.duplicates();
    if duplicates.is_empty() {
        return None;
    }
    let kept = located.resource();
    let warning = DuplicateResourceWarning {
        kind: T::KIND,
        name: kept.name().to_string(),
        kept: kept.id_string(),
        duplicates: duplicates.iter().map(Named::id_string).collect(),
    };
    warn!(
        "Found {} duplicate(s) of {} '{}': keeping {}, ignoring {:?}",
        warning.duplicates.len(),
        warning.kind,
        warning.name,
        warning.kept,
        warning.duplicates
    );
    Some(warning)
}

/// Entry point of the find-or-create logic.
#[derive(Debug)]
pub struct Locator<C> {
    client: Arc<C>,
    config: Arc<TopologyConfig>,
}

impl<C> Clone for Locator<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: ControllerClient> Locator<C> {
    #[must_use]
    pub fn new(client: Arc<C>, config: Arc<TopologyConfig>) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn manager<R: ?Sized>(&self) -> Manager<C, R> {
        Manager::new(self.client.clone(), self.config.clone())
    }

    /// Find the `R` named by `spec`, creating it if there is none.
    pub async fn ensure_named<R>(&self, spec: &NamedSpec) -> TopologyResult<Located<R>>
    where
        R: Named,
        Manager<C, R>: Locate<Requirement = NamedSpec, Resource = R, Error = TopologyError>
            + Create<Requirement = NamedSpec, Outcome = TopologyResult<R>>,
    {
        let located = rekon::ensure(&self.manager::<R>(), spec).await?;
        duplicate_warning(&located);
        Ok(located)
    }

    /// Find the `R` named by `spec`, if any.
    pub async fn find_named<R>(&self, spec: &NamedSpec) -> TopologyResult<Option<R>>
    where
        R: Named,
        Manager<C, R>: Locate<Requirement = NamedSpec, Resource = R, Error = TopologyError>,
    {
        let mut found = self.manager::<R>().locate(spec).await?.into_iter();
        Ok(found.next().map(|resource| {
            let located = Located::Found {
                resource,
                duplicates: found.collect(),
            };
            duplicate_warning(&located);
            located.into_resource()
        }))
    }

    /// Like [`Locator::find_named`], but a missing object is an error.
    pub async fn get_named<R>(&self, spec: &NamedSpec) -> TopologyResult<R>
    where
        R: Named,
        Manager<C, R>: Locate<Requirement = NamedSpec, Resource = R, Error = TopologyError>,
    {
        self.find_named(spec)
            .await?
            .ok_or_else(|| TopologyError::not_found(R::KIND, format!("'{}'", spec.name)))
    }
}
