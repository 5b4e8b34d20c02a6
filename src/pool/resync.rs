use super::store::dedup;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Zone key for instances without zone information.
pub const UNKNOWN_ZONE: &str = "unknown";

/// Only endpoints with this URI scheme take part in selection.
pub const REST_SCHEME: &str = "rest";

/// Treat JSON `null` the same as a missing field.
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Directory instance record. Only the fields resync consumes are modelled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// URIs in `scheme://host:port` form.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub endpoints: Vec<String>,

    #[serde(default)]
    pub data_center_info: Option<DataCenterInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataCenterInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub region: String,

    #[serde(rename = "availableZone", alias = "availabilityZone", default)]
    pub availability_zone: String,
}

impl Instance {
    pub fn zone(&self) -> &str {
        match &self.data_center_info {
            Some(dc) if !dc.availability_zone.is_empty() => &dc.availability_zone,
            _ => UNKNOWN_ZONE,
        }
    }

    /// The `host:port` of this instance's `rest` endpoint. If several are
    /// listed the last one wins.
    pub fn rest_endpoint(&self) -> Option<String> {
        let mut found = None;
        for uri in &self.endpoints {
            let url = match reqwest::Url::parse(uri) {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!("pool: resync: skipping endpoint, uri={}, error={}", uri, e);
                    continue;
                }
            };
            if url.scheme() != REST_SCHEME {
                continue;
            }
            let host = match url.host_str() {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };
            found = Some(match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            });
        }
        found
    }
}

/// Group each instance's `rest` endpoint by zone. Zones iterate in name order.
pub fn group_by_zone(instances: &[Instance]) -> BTreeMap<String, Vec<String>> {
    let mut zones: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for instance in instances {
        if let Some(ep) = instance.rest_endpoint() {
            zones.entry(instance.zone().to_string()).or_default().push(ep);
        }
    }
    zones
}

/// New SameAz / DiffAz members. `None` leaves that tier untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneAssignment {
    pub same_az: Option<Vec<String>>,
    pub diff_az: Option<Vec<String>>,
}

/// Classify zone groups against the Default tier.
///
/// A group sharing at least one address with `default` is the same zone as
/// the pool owner, whatever the directory calls it. Everything else is a
/// different zone. When more than one group lands in a bucket the one that
/// comes last wins.
pub fn classify(zones: &BTreeMap<String, Vec<String>>, default: &[String]) -> ZoneAssignment {
    let local: HashSet<&str> = default.iter().map(String::as_str).collect();
    let mut assignment = ZoneAssignment::default();
    let mut same_zone: Option<&str> = None;
    let mut diff_zone: Option<&str> = None;

    for (zone, addrs) in zones {
        let addrs = dedup(addrs);
        if addrs.iter().any(|a| local.contains(a.as_str())) {
            if let Some(prev) = same_zone.replace(zone) {
                tracing::warn!(
                    "pool: resync: multiple zones classified as same az, overwritten={}, kept={}",
                    prev,
                    zone
                );
            }
            tracing::info!("pool: resync: same az endpoints, zone={}, endpoints={:?}", zone, addrs);
            assignment.same_az = Some(addrs);
        } else {
            if let Some(prev) = diff_zone.replace(zone) {
                tracing::warn!(
                    "pool: resync: multiple zones classified as diff az, overwritten={}, kept={}",
                    prev,
                    zone
                );
            }
            tracing::info!("pool: resync: diff az endpoints, zone={}, endpoints={:?}", zone, addrs);
            assignment.diff_az = Some(addrs);
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(endpoints: &[&str], az: Option<&str>) -> Instance {
        Instance {
            endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            data_center_info: az.map(|az| DataCenterInfo {
                name: "engine".to_string(),
                region: "cn".to_string(),
                availability_zone: az.to_string(),
            }),
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rest_endpoint_extraction() {
        let i = inst(&["rest://192.168.1.1:30100", "grpc://192.168.1.1:30101"], None);
        assert_eq!(i.rest_endpoint().as_deref(), Some("192.168.1.1:30100"));
    }

    #[test]
    fn test_rest_endpoint_ignores_query() {
        let i = inst(&["rest://10.0.0.1:30100?sslEnabled=true"], None);
        assert_eq!(i.rest_endpoint().as_deref(), Some("10.0.0.1:30100"));
    }

    #[test]
    fn test_rest_endpoint_last_wins() {
        let i = inst(&["rest://10.0.0.1:1", "rest://10.0.0.2:2"], None);
        assert_eq!(i.rest_endpoint().as_deref(), Some("10.0.0.2:2"));
    }

    #[test]
    fn test_rest_endpoint_missing() {
        assert!(inst(&["grpc://10.0.0.1:1"], None).rest_endpoint().is_none());
        assert!(inst(&["not a uri"], None).rest_endpoint().is_none());
        assert!(inst(&[], None).rest_endpoint().is_none());
    }

    #[test]
    fn test_zone_falls_back_to_unknown() {
        assert_eq!(inst(&[], None).zone(), UNKNOWN_ZONE);
        assert_eq!(inst(&[], Some("")).zone(), UNKNOWN_ZONE);
        assert_eq!(inst(&[], Some("az1")).zone(), "az1");
    }

    #[test]
    fn test_group_by_zone() {
        let zones = group_by_zone(&[
            inst(&["rest://10.0.1.1:30100"], Some("az1")),
            inst(&["rest://10.0.1.2:30100"], Some("az1")),
            inst(&["grpc://10.0.2.1:30101"], Some("az2")),
            inst(&["rest://10.0.3.1:30100"], None),
        ]);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones["az1"], strings(&["10.0.1.1:30100", "10.0.1.2:30100"]));
        assert_eq!(zones[UNKNOWN_ZONE], strings(&["10.0.3.1:30100"]));
    }

    #[test]
    fn test_group_by_zone_empty() {
        assert!(group_by_zone(&[]).is_empty());
        assert!(group_by_zone(&[inst(&["grpc://10.0.0.1:1"], Some("az1"))]).is_empty());
    }

    #[test]
    fn test_classify_by_overlap() {
        let default = strings(&["192.168.2.1:30100", "192.168.2.3:30100"]);
        let mut zones = BTreeMap::new();
        zones.insert(
            "az1".to_string(),
            strings(&["192.168.1.1:30100", "192.168.1.2:30100"]),
        );
        zones.insert(
            "az2".to_string(),
            strings(&["192.168.2.1:30100", "192.168.2.2:30100", "192.168.2.1:30100"]),
        );

        let got = classify(&zones, &default);
        assert_eq!(
            got.same_az,
            Some(strings(&["192.168.2.1:30100", "192.168.2.2:30100"]))
        );
        assert_eq!(
            got.diff_az,
            Some(strings(&["192.168.1.1:30100", "192.168.1.2:30100"]))
        );
    }

    #[test]
    fn test_classify_last_zone_wins_per_bucket() {
        let mut zones = BTreeMap::new();
        zones.insert("az1".to_string(), strings(&["10.0.1.1:1"]));
        zones.insert("az3".to_string(), strings(&["10.0.3.1:1"]));

        let got = classify(&zones, &[]);
        assert_eq!(got.same_az, None);
        assert_eq!(got.diff_az, Some(strings(&["10.0.3.1:1"])));
    }

    #[test]
    fn test_instance_decodes_directory_json() {
        let json = r#"{
            "endpoints": ["rest://10.0.0.1:30100"],
            "dataCenterInfo": {"name": "dc", "region": "cn", "availableZone": "az1"}
        }"#;
        let i: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(i.zone(), "az1");

        let alias = r#"{"endpoints": null, "dataCenterInfo": {"availabilityZone": "az9"}}"#;
        let i: Instance = serde_json::from_str(alias).unwrap();
        assert!(i.endpoints.is_empty());
        assert_eq!(i.zone(), "az9");
    }
}
