use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::DiscoveryError;

/// Separator between UID segments
pub const UID_SEPARATOR: char = ':';

/// Unique identifier of a concrete thing.
///
/// A thing UID consists of at least two colon-separated segments; the leading
/// segment is the binding ID of the protocol integration the thing belongs to,
/// e.g. `zwave:node12`. The UID must be stable: it must never be built from
/// data that can change between discoveries (such as an IP address), so that
/// a thing which disappears and is discovered again yields the same UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingUid(String);

impl ThingUid {
    /// Create a thing UID from its string form
    pub fn new(uid: impl Into<String>) -> Result<Self, DiscoveryError> {
        let uid = uid.into();
        validate_uid(&uid, "thing_uid")?;
        Ok(Self(uid))
    }

    /// String form of the UID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Binding ID this UID belongs to (the leading segment)
    pub fn binding_id(&self) -> &str {
        leading_segment(&self.0)
    }

    /// All segments of the UID in order
    pub fn segments(&self) -> Vec<&str> {
        self.0.split(UID_SEPARATOR).collect()
    }
}

impl fmt::Display for ThingUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ThingUid {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of a thing type.
///
/// A thing type UID names the category of a thing (typically a product or
/// model identifier, e.g. `zwave:sensor`), not a concrete instance. Distinct
/// things of the same type share this value. Syntax is the same as for
/// [`ThingUid`]: the leading segment is the binding ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingTypeUid(String);

impl ThingTypeUid {
    /// Create a thing type UID from its string form
    pub fn new(uid: impl Into<String>) -> Result<Self, DiscoveryError> {
        let uid = uid.into();
        validate_uid(&uid, "thing_type_uid")?;
        Ok(Self(uid))
    }

    /// String form of the UID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Binding ID this type belongs to (the leading segment)
    pub fn binding_id(&self) -> &str {
        leading_segment(&self.0)
    }
}

impl fmt::Display for ThingTypeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ThingTypeUid {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn leading_segment(uid: &str) -> &str {
    uid.split(UID_SEPARATOR).next().unwrap_or("")
}

fn validate_uid(uid: &str, field: &'static str) -> Result<(), DiscoveryError> {
    if uid.trim().is_empty() {
        return Err(DiscoveryError::InvalidArgument {
            field,
            reason: "must not be empty".to_string(),
        });
    }

    let segments: Vec<&str> = uid.split(UID_SEPARATOR).collect();
    if segments.len() < 2 {
        return Err(DiscoveryError::InvalidArgument {
            field,
            reason: format!(
                "'{}' must contain a binding ID and at least one more segment",
                uid
            ),
        });
    }

    for segment in segments {
        if segment.is_empty() || !is_valid_segment(segment) {
            return Err(DiscoveryError::InvalidArgument {
                field,
                reason: format!(
                    "segment '{}' in '{}' must contain only alphanumeric characters, hyphens, and underscores",
                    segment, uid
                ),
            });
        }
    }

    Ok(())
}

fn is_valid_segment(segment: &str) -> bool {
    segment
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thing_uid_creation() {
        let uid = ThingUid::new("zwave:node12").unwrap();
        assert_eq!(uid.as_str(), "zwave:node12");
        assert_eq!(uid.binding_id(), "zwave");
        assert_eq!(uid.segments(), vec!["zwave", "node12"]);
    }

    #[test]
    fn test_thing_uid_with_bridge_segment() {
        let uid = ThingUid::new("hue:bulb:bridge1:lamp-3").unwrap();
        assert_eq!(uid.binding_id(), "hue");
        assert_eq!(uid.segments().len(), 4);
    }

    #[test]
    fn test_empty_uid_rejected() {
        let result = ThingUid::new("");
        assert!(matches!(
            result,
            Err(DiscoveryError::InvalidArgument { field: "thing_uid", .. })
        ));
    }

    #[test]
    fn test_single_segment_uid_rejected() {
        assert!(ThingUid::new("zwave").is_err());
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(ThingUid::new("zwave:").is_err());
        assert!(ThingUid::new(":node12").is_err());
        assert!(ThingUid::new("zwave::node12").is_err());
    }

    #[test]
    fn test_invalid_characters_rejected() {
        assert!(ThingUid::new("zwave:node 12").is_err());
        assert!(ThingUid::new("zwave:node#12").is_err());
    }

    #[test]
    fn test_thing_type_uid_creation() {
        let uid = ThingTypeUid::new("zwave:sensor").unwrap();
        assert_eq!(uid.as_str(), "zwave:sensor");
        assert_eq!(uid.binding_id(), "zwave");
    }

    #[test]
    fn test_empty_thing_type_uid_rejected() {
        let result = ThingTypeUid::new("");
        assert!(matches!(
            result,
            Err(DiscoveryError::InvalidArgument { field: "thing_type_uid", .. })
        ));
    }

    #[test]
    fn test_display_and_from_str_round_trip() {
        let uid: ThingUid = "zigbee:dimmer_a7".parse().unwrap();
        assert_eq!(uid.to_string(), "zigbee:dimmer_a7");
    }

    #[test]
    fn test_uid_serializes_as_plain_string() {
        let uid = ThingUid::new("zwave:node12").unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"zwave:node12\"");

        let back: ThingUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }

    #[test]
    fn test_uids_usable_as_map_keys() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ThingUid::new("zwave:node12").unwrap(), 1);
        assert_eq!(map.get(&ThingUid::new("zwave:node12").unwrap()), Some(&1));
    }
}
