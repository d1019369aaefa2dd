// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Find-or-create and teardown contracts for resources held by an external system.
//!
//! The motivating use case is a remote SDN controller which owns every object of a virtual
//! topology.
//! The caller only ever holds identifiers, so "does this already exist?" must always be answered
//! by asking the controller, and "make it exist" must never create a second copy of something a
//! previous (possibly crashed) run already created.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

/// `Locate` is implemented by whatever is able to search an external system for resources which
/// satisfy a `Requirement`.
pub trait Locate {
    /// The data describing what is being looked for.
    ///
    /// For example, when looking for the provider router the `Requirement` would be the id of the
    /// tenant owning it, while the name is fixed by configuration.
    type Requirement: ?Sized + Sync;

    /// The handle of an extant resource.
    type Resource: Send;

    /// The error returned when the search itself fails.
    type Error: Send;

    /// Search for every resource satisfying the requirement.
    ///
    /// # Contract
    ///
    /// Implementations must not mutate the state of the external system.
    /// An empty list means "not found"; more than one element means a duplicate slipped past a
    /// previous find-or-create (see [`Located::duplicates`]).
    fn locate(
        &self,
        requirement: &Self::Requirement,
    ) -> impl Future<Output = Result<Vec<Self::Resource>, Self::Error>> + Send;
}

/// `Create` is implemented by an object able to create an external resource in service of a
/// `Requirement`.
pub trait Create {
    /// The data required to create the resource.
    type Requirement: ?Sized + Sync;

    /// `Outcome` includes any data returned by the `create` operation.
    /// Often this is `Result<Resource, SomeErrorType>`.
    type Outcome;

    /// Create a resource in service of a requirement.
    fn create(
        &self,
        requirement: &Self::Requirement,
    ) -> impl Future<Output = Self::Outcome> + Send;
}

/// `Remove` is implemented by an object able to remove an externally observed resource.
///
/// Removal is the inverse of whatever [`Create`] (or [`ensure`]) did: applying it after a
/// create should leave the external system as it was before the create.
pub trait Remove {
    /// The handle of the resource to remove.
    type Observation: ?Sized + Sync;

    /// `Outcome` includes any data returned by the `remove` operation.
    type Outcome;

    /// Remove an observed external resource.
    fn remove(
        &self,
        observation: &Self::Observation,
    ) -> impl Future<Output = Self::Outcome> + Send;
}

/// The outcome of a find-or-create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Located<T> {
    /// The resource already existed.
    Found {
        /// The resource which was picked.
        resource: T,
        /// Other resources which satisfied the same requirement.
        ///
        /// These are the garbage left by racing find-or-create calls.
        duplicates: Vec<T>,
    },
    /// The resource did not exist and was created.
    Created(T),
}

impl<T> Located<T> {
    /// The located resource.
    #[must_use]
    pub fn resource(&self) -> &T {
        match self {
            Located::Found { resource, .. } | Located::Created(resource) => resource,
        }
    }

    /// Consume `self`, returning the located resource.
    #[must_use]
    pub fn into_resource(self) -> T {
        match self {
            Located::Found { resource, .. } | Located::Created(resource) => resource,
        }
    }

    /// True if the resource had to be created.
    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, Located::Created(_))
    }

    /// Resources which satisfied the same requirement as the located one.
    #[must_use]
    pub fn duplicates(&self) -> &[T] {
        match self {
            Located::Found { duplicates, .. } => duplicates,
            Located::Created(_) => &[],
        }
    }

    /// Apply `f` to the located resource (and any duplicates), preserving how it was located.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Located<U> {
        match self {
            Located::Found {
                resource,
                duplicates,
            } => Located::Found {
                resource: f(resource),
                duplicates: duplicates.into_iter().map(f).collect(),
            },
            Located::Created(resource) => Located::Created(f(resource)),
        }
    }
}

/// Search for a resource satisfying `requirement`, creating it only if none was found.
///
/// This is a read-then-maybe-write sequence, not a transaction.
/// Two callers racing on the same requirement may both observe "absent" and both create.
/// The loser's copy is then reported by later calls through [`Located::duplicates`].
///
/// # Errors
///
/// Returns whatever error the search or the creation returned.
pub async fn ensure<H>(
    handle: &H,
    requirement: &<H as Locate>::Requirement,
) -> Result<Located<<H as Locate>::Resource>, <H as Locate>::Error>
where
    H: Locate
        + Create<
            Requirement = <H as Locate>::Requirement,
            Outcome = Result<<H as Locate>::Resource, <H as Locate>::Error>,
        >,
{
    let mut found = handle.locate(requirement).await?.into_iter();
    match found.next() {
        Some(resource) => Ok(Located::Found {
            resource,
            duplicates: found.collect(),
        }),
        None => Ok(Located::Created(handle.create(requirement).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Create, Locate, Located, ensure};
    use std::sync::Mutex;

    /// A toy "external system" holding named things.
    #[derive(Default)]
    struct Registry {
        names: Mutex<Vec<(u32, String)>>,
    }

    impl Locate for Registry {
        type Requirement = str;
        type Resource = u32;
        type Error = ();

        async fn locate(&self, requirement: &str) -> Result<Vec<u32>, ()> {
            let names = self.names.lock().map_err(|_| ())?;
            Ok(names
                .iter()
                .filter(|(_, name)| name == requirement)
                .map(|(id, _)| *id)
                .collect())
        }
    }

    impl Create for Registry {
        type Requirement = str;
        type Outcome = Result<u32, ()>;

        async fn create(&self, requirement: &str) -> Result<u32, ()> {
            let mut names = self.names.lock().map_err(|_| ())?;
            let id = u32::try_from(names.len()).map_err(|_| ())?;
            names.push((id, requirement.to_string()));
            Ok(id)
        }
    }

    #[tokio::test]
    async fn ensure_creates_once() {
        let registry = Registry::default();
        let first = ensure(&registry, "router").await.unwrap();
        assert!(first.was_created());
        let second = ensure(&registry, "router").await.unwrap();
        assert!(!second.was_created());
        assert_eq!(first.resource(), second.resource());
        assert_eq!(registry.names.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ensure_reports_duplicates() {
        let registry = Registry::default();
        registry.create("bridge").await.unwrap();
        registry.create("bridge").await.unwrap();
        let located = ensure(&registry, "bridge").await.unwrap();
        assert_eq!(
            located,
            Located::Found {
                resource: 0,
                duplicates: vec![1]
            }
        );
        assert_eq!(located.duplicates(), &[1]);
        assert_eq!(located.map(|id| id + 10).into_resource(), 10);
    }
}
