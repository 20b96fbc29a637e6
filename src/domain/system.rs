//! Scanner systems (feeds) that can be subscribed to.

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// A named scanner feed, selected by its short name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub short_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_active: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub call_avg: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Body of `GET /systems`
#[derive(Debug, Clone, Deserialize)]
pub struct SystemsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub systems: Vec<System>,
}

/// Find a system by short name (case-sensitive, as upstream URLs are)
pub fn find_system<'a>(systems: &'a [System], short_name: &str) -> Option<&'a System> {
    systems.iter().find(|s| s.short_name == short_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systems_response_parsing() {
        let json = r#"{
            "success": true,
            "systems": [
                {"name": "Metro Fire", "shortName": "metrofire", "systemType": "p25",
                 "city": "Springfield", "state": "IL", "active": true, "callAvg": 3.5},
                {"name": "County", "shortName": "county"}
            ]
        }"#;

        let parsed: SystemsResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.systems.len(), 2);
        assert_eq!(parsed.systems[0].short_name, "metrofire");
        assert_eq!(parsed.systems[0].call_avg, 3.5);
        assert!(!parsed.systems[1].active);

        assert!(find_system(&parsed.systems, "county").is_some());
        assert!(find_system(&parsed.systems, "County").is_none());
    }

    #[test]
    fn test_system_null_fields() {
        let json = r#"{"success": true, "systems": [
            {"name": null, "shortName": "county", "city": null, "active": null, "callAvg": null}
        ]}"#;

        let parsed: SystemsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.systems[0].short_name, "county");
        assert!(parsed.systems[0].name.is_empty());
        assert!(!parsed.systems[0].active);
        assert_eq!(parsed.systems[0].call_avg, 0.0);
    }
}
