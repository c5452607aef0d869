use serde::{Deserialize, Serialize};

/// Declared device kind of a connection within a session. Anything a client
/// sends that is not `mobile` or `display` lands in the `Unknown` bucket.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Mobile,
    Display,
    #[default]
    Unknown,
}

impl DeviceRole {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("mobile") => DeviceRole::Mobile,
            Some("display") => DeviceRole::Display,
            _ => DeviceRole::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Mobile => "mobile",
            DeviceRole::Display => "display",
            DeviceRole::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role() {
        let role = DeviceRole::default();
        assert_eq!(role, DeviceRole::Unknown);
    }

    #[test]
    fn parse_known_roles() {
        assert_eq!(DeviceRole::parse(Some("mobile")), DeviceRole::Mobile);
        assert_eq!(DeviceRole::parse(Some("display")), DeviceRole::Display);
    }

    #[test]
    fn parse_coerces_unrecognized_to_unknown() {
        assert_eq!(DeviceRole::parse(Some("tablet")), DeviceRole::Unknown);
        assert_eq!(DeviceRole::parse(None), DeviceRole::Unknown);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DeviceRole::Mobile).unwrap(),
            r#""mobile""#
        );
        assert_eq!(
            serde_json::to_string(&DeviceRole::Unknown).unwrap(),
            r#""unknown""#
        );
    }
}
