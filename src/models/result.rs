use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{DiscoveryError, ThingTypeUid, ThingUid};

/// Review state of a discovery result within the inbox workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryResultFlag {
    /// Freshly discovered, not yet reviewed by an operator
    New,
    /// Dismissed by an operator; automatic processing for this thing is suppressed
    Ignored,
}

/// One immutable snapshot of a candidate thing found by a discovery process.
///
/// A result is a value: once constructed it never changes. State changes
/// (flag transitions, property updates on re-discovery) produce a replacement
/// record with the same thing UID, via [`DiscoveryResult::with_flag`] or
/// [`DiscoveryResult::merged_with`].
///
/// Two results describe the *same thing* when their thing UIDs match (see
/// [`DiscoveryResult::same_entity`]); full structural equality additionally
/// compares type, binding, properties, flag, label, and bridge, and is what
/// `==` implements. Identity drives merging; structural equality drives
/// change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    thing_uid: ThingUid,
    thing_type_uid: ThingTypeUid,
    binding_id: String,
    properties: HashMap<String, Value>,
    flag: DiscoveryResultFlag,
    label: String,
    bridge_uid: Option<ThingUid>,
}

impl DiscoveryResult {
    /// Create a fully populated discovery result.
    ///
    /// This is the pipeline-facing constructor and accepts any flag.
    /// Discovery services must use [`DiscoveryResultBuilder`] instead, which
    /// always produces [`DiscoveryResultFlag::New`].
    ///
    /// Fails with [`DiscoveryError::InvalidArgument`] when `binding_id` is
    /// empty or does not match the leading segment of `thing_uid`, or when
    /// `thing_type_uid` belongs to a different binding.
    pub fn new(
        thing_uid: ThingUid,
        thing_type_uid: ThingTypeUid,
        binding_id: impl Into<String>,
        properties: HashMap<String, Value>,
        flag: DiscoveryResultFlag,
        label: impl Into<String>,
        bridge_uid: Option<ThingUid>,
    ) -> Result<Self, DiscoveryError> {
        let binding_id = binding_id.into();

        if binding_id.trim().is_empty() {
            return Err(DiscoveryError::InvalidArgument {
                field: "binding_id",
                reason: "must not be empty".to_string(),
            });
        }
        if binding_id != thing_uid.binding_id() {
            return Err(DiscoveryError::InvalidArgument {
                field: "binding_id",
                reason: format!(
                    "'{}' does not match the binding ID of thing UID '{}'",
                    binding_id, thing_uid
                ),
            });
        }
        if thing_type_uid.binding_id() != thing_uid.binding_id() {
            return Err(DiscoveryError::InvalidArgument {
                field: "thing_type_uid",
                reason: format!(
                    "'{}' belongs to a different binding than thing UID '{}'",
                    thing_type_uid, thing_uid
                ),
            });
        }

        Ok(Self {
            thing_uid,
            thing_type_uid,
            binding_id,
            properties,
            flag,
            label: label.into(),
            bridge_uid,
        })
    }

    /// Unique, stable UID of the discovered thing
    pub fn thing_uid(&self) -> &ThingUid {
        &self.thing_uid
    }

    /// Type of the discovered thing
    pub fn thing_type_uid(&self) -> &ThingTypeUid {
        &self.thing_type_uid
    }

    /// Binding ID of the discovery source that produced this result
    pub fn binding_id(&self) -> &str {
        &self.binding_id
    }

    /// Properties that become part of the thing once the result is accepted.
    /// The returned view is read-only; the record itself never changes.
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// Review state of this result
    pub fn flag(&self) -> DiscoveryResultFlag {
        self.flag
    }

    /// Human readable label; may be empty
    pub fn label(&self) -> &str {
        &self.label
    }

    /// UID of the bridge this thing communicates through, if any
    pub fn bridge_uid(&self) -> Option<&ThingUid> {
        self.bridge_uid.as_ref()
    }

    /// Replacement record with the given flag and everything else unchanged.
    ///
    /// Flag transitions are pipeline-driven: the inbox calls this on explicit
    /// operator action, never a discovery service.
    pub fn with_flag(&self, flag: DiscoveryResultFlag) -> Self {
        let mut replacement = self.clone();
        replacement.flag = flag;
        replacement
    }

    /// Combine this result with a newer discovery of the same thing.
    ///
    /// The replacement record adopts the incoming result's properties, label,
    /// bridge, and thing type (the newer scan's data wins for everything that
    /// can legitimately change) and preserves this result's flag unless the
    /// incoming flag explicitly requests a transition. A re-discovery always
    /// carries [`DiscoveryResultFlag::New`], so an operator's `Ignored` flag
    /// survives re-discovery.
    ///
    /// Fails with [`DiscoveryError::IdentityMismatch`] when the thing UIDs
    /// differ; merging is only defined for the same logical thing.
    pub fn merged_with(&self, incoming: &DiscoveryResult) -> Result<Self, DiscoveryError> {
        if !self.same_entity(incoming) {
            return Err(DiscoveryError::IdentityMismatch {
                existing: self.thing_uid.clone(),
                incoming: incoming.thing_uid.clone(),
            });
        }

        let flag = if incoming.flag == DiscoveryResultFlag::New {
            self.flag
        } else {
            incoming.flag
        };

        Ok(Self {
            thing_uid: self.thing_uid.clone(),
            thing_type_uid: incoming.thing_type_uid.clone(),
            binding_id: self.binding_id.clone(),
            properties: incoming.properties.clone(),
            flag,
            label: incoming.label.clone(),
            bridge_uid: incoming.bridge_uid.clone(),
        })
    }

    /// Whether the other result describes the same thing (UID identity only)
    pub fn same_entity(&self, other: &DiscoveryResult) -> bool {
        self.thing_uid == other.thing_uid
    }
}

/// Builder for discovery results, the construction API for discovery services.
///
/// The binding ID is derived from the thing UID and the flag is always
/// [`DiscoveryResultFlag::New`]: a discovery service cannot mark a thing as
/// ignored, only the inbox can.
#[derive(Debug, Clone)]
pub struct DiscoveryResultBuilder {
    thing_uid: ThingUid,
    thing_type_uid: ThingTypeUid,
    properties: HashMap<String, Value>,
    label: String,
    bridge_uid: Option<ThingUid>,
}

impl DiscoveryResultBuilder {
    /// Start a result for the given thing
    pub fn new(thing_uid: ThingUid, thing_type_uid: ThingTypeUid) -> Self {
        Self {
            thing_uid,
            thing_type_uid,
            properties: HashMap::new(),
            label: String::new(),
            bridge_uid: None,
        }
    }

    /// Add a single property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replace all properties
    pub fn with_properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Set the human readable label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Attach the thing to a bridge
    pub fn with_bridge(mut self, bridge_uid: ThingUid) -> Self {
        self.bridge_uid = Some(bridge_uid);
        self
    }

    /// Build the result, validating binding consistency
    pub fn build(self) -> Result<DiscoveryResult, DiscoveryError> {
        let binding_id = self.thing_uid.binding_id().to_string();
        DiscoveryResult::new(
            self.thing_uid,
            self.thing_type_uid,
            binding_id,
            self.properties,
            DiscoveryResultFlag::New,
            self.label,
            self.bridge_uid,
        )
    }
}
