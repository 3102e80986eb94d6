//! Scope - identifies one logical live feed.

use std::fmt;

use crate::domain::foundation::{ResourceId, ValidationError};

/// `(topic namespace, feed name, resource id)` naming one live feed,
/// e.g. `("websocket_live", "live", 42)` for a gym's live occupancy.
///
/// The resource id is optional because screens often know which feed they
/// want before the id has loaded. An unresolved scope never opens a
/// transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    namespace: String,
    feed: String,
    resource: Option<ResourceId>,
}

impl Scope {
    /// Creates a scope, validating that namespace and feed are path segments.
    pub fn new(
        namespace: impl Into<String>,
        feed: impl Into<String>,
        resource: impl Into<Option<ResourceId>>,
    ) -> Result<Self, ValidationError> {
        let namespace = namespace.into();
        let feed = feed.into();
        validate_segment("namespace", &namespace)?;
        validate_segment("feed", &feed)?;
        Ok(Self {
            namespace,
            feed,
            resource: resource.into(),
        })
    }

    /// Creates a scope whose resource id has not loaded yet.
    pub fn unresolved(
        namespace: impl Into<String>,
        feed: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(namespace, feed, None)
    }

    /// Returns the same feed bound to `resource`.
    pub fn with_resource(&self, resource: ResourceId) -> Self {
        Self {
            namespace: self.namespace.clone(),
            feed: self.feed.clone(),
            resource: Some(resource),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn resource(&self) -> Option<&ResourceId> {
        self.resource.as_ref()
    }

    /// True once the resource id is known.
    pub fn is_resolved(&self) -> bool {
        self.resource.is_some()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{}/{}/{}", self.namespace, self.feed, resource),
            None => write!(f, "{}/{}/<unresolved>", self.namespace, self.feed),
        }
    }
}

fn validate_segment(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    if value.contains(['/', '?', '#']) {
        return Err(ValidationError::invalid_format(
            field,
            "must be a single path segment",
        ));
    }
    Ok(())
}
