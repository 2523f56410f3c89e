//! Remote entity model and classification
//!
//! Home Assistant exposes every device as an entity whose id carries its
//! domain (`light.kitchen`, `switch.fan`). The domain decides which control
//! object the entity becomes on the surface.

use serde::{Deserialize, Serialize};

/// Domain handled as a fader (mute + brightness)
pub const LIGHT_DOMAIN: &str = "light";
/// Domain handled as a button (on/off)
pub const SWITCH_DOMAIN: &str = "switch";

/// State string Home Assistant reports for an entity that is on
const STATE_ON: &str = "on";

/// Kind of control object an entity maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Continuous control (lights)
    Fader,
    /// Discrete on/off control (switches)
    Button,
    /// Not represented on the surface
    Ignore,
}

impl std::fmt::Display for ControlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlKind::Fader => write!(f, "fader"),
            ControlKind::Button => write!(f, "button"),
            ControlKind::Ignore => write!(f, "ignored"),
        }
    }
}

/// Extract the domain of an entity id (everything before the first `.`)
pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or(entity_id)
}

/// Classify an entity id into the control kind it is presented as
pub fn classify(entity_id: &str) -> ControlKind {
    match domain_of(entity_id) {
        LIGHT_DOMAIN => ControlKind::Fader,
        SWITCH_DOMAIN => ControlKind::Button,
        _ => ControlKind::Ignore,
    }
}

/// Entity attributes the bridge cares about
///
/// Home Assistant sends many more; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// Raw brightness (0-255), only present on lights that are on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

/// A single entity as reported by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: EntityAttributes,
}

impl RemoteEntity {
    /// Build an entity with a bare on/off state
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: EntityAttributes::default(),
        }
    }

    /// Attach a friendly name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.attributes.friendly_name = Some(name.into());
        self
    }

    /// Attach a raw 0-255 brightness
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.attributes.brightness = Some(brightness);
        self
    }

    pub fn id(&self) -> &str {
        &self.entity_id
    }

    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    /// Name shown on the surface, falls back to the entity id
    pub fn display_name(&self) -> &str {
        self.attributes
            .friendly_name
            .as_deref()
            .unwrap_or(&self.entity_id)
    }

    /// Whether the hub reports the entity as on
    ///
    /// Anything other than `"on"` (off, unavailable, unknown) counts as off.
    pub fn is_on(&self) -> bool {
        self.state == STATE_ON
    }

    /// Brightness as a 0-100 percentage, if reported
    pub fn brightness_pct(&self) -> Option<u8> {
        self.attributes
            .brightness
            .map(|b| ((b as f32) * 100.0 / 255.0).round() as u8)
    }

    pub fn kind(&self) -> ControlKind {
        classify(&self.entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_known_domains() {
        assert_eq!(classify("light.kitchen"), ControlKind::Fader);
        assert_eq!(classify("switch.fan"), ControlKind::Button);
        assert_eq!(classify("sensor.temperature"), ControlKind::Ignore);
        assert_eq!(classify("media_player.tv"), ControlKind::Ignore);
    }

    #[test]
    fn test_classify_uses_full_domain() {
        // Only the exact domain counts, not a prefix match on the id
        assert_eq!(classify("lightning.strike"), ControlKind::Ignore);
        assert_eq!(classify("switches.bank"), ControlKind::Ignore);
        assert_eq!(classify("light"), ControlKind::Fader);
        assert_eq!(classify(""), ControlKind::Ignore);
    }

    #[test]
    fn test_entity_helpers() {
        let entity = RemoteEntity::new("light.desk", "on")
            .with_name("Desk Lamp")
            .with_brightness(255);

        assert_eq!(entity.domain(), "light");
        assert_eq!(entity.display_name(), "Desk Lamp");
        assert!(entity.is_on());
        assert_eq!(entity.brightness_pct(), Some(100));
        assert_eq!(entity.kind(), ControlKind::Fader);

        let unnamed = RemoteEntity::new("switch.pump", "unavailable");
        assert_eq!(unnamed.display_name(), "switch.pump");
        assert!(!unnamed.is_on());
        assert_eq!(unnamed.brightness_pct(), None);
    }

    #[test]
    fn test_entity_deserializes_hass_payload() {
        let json = r#"{
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {
                "friendly_name": "Kitchen",
                "brightness": 128,
                "color_mode": "brightness",
                "supported_color_modes": ["brightness"]
            },
            "last_changed": "2024-01-01T00:00:00+00:00"
        }"#;

        let entity: RemoteEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id(), "light.kitchen");
        assert_eq!(entity.display_name(), "Kitchen");
        assert_eq!(entity.brightness_pct(), Some(50));
    }

    proptest! {
        #[test]
        fn prop_lights_are_faders(suffix in "[a-z0-9_.]{0,24}") {
            prop_assert_eq!(classify(&format!("light.{}", suffix)), ControlKind::Fader);
        }

        #[test]
        fn prop_switches_are_buttons(suffix in "[a-z0-9_.]{0,24}") {
            prop_assert_eq!(classify(&format!("switch.{}", suffix)), ControlKind::Button);
        }

        #[test]
        fn prop_classify_is_total_and_pure(id in "\\PC{0,32}") {
            let first = classify(&id);
            prop_assert_eq!(first, classify(&id));
            let expected = match domain_of(&id) {
                "light" => ControlKind::Fader,
                "switch" => ControlKind::Button,
                _ => ControlKind::Ignore,
            };
            prop_assert_eq!(first, expected);
        }
    }
}
