use maxminddb::geoip2::Country;
use maxminddb::Reader;

use crate::error::RtbError;

/// Resolves a client IP to an ISO country code via a MaxMind GeoLite2
/// Country database. An unparseable IP or a miss both resolve to an empty
/// string rather than an error — GeoIP is advisory, not load-bearing
/// (§6 "GeoIP in").
pub struct GeoIp {
    reader: Option<Reader<Vec<u8>>>,
}

impl GeoIp {
    pub fn load(path: &str) -> Result<Self, RtbError> {
        if path.is_empty() {
            return Ok(GeoIp { reader: None });
        }
        let reader = Reader::open_readfile(path).map_err(|e| {
            tracing::warn!("geoip database unavailable at {path}, country lookups disabled: {e}");
            e
        });
        Ok(GeoIp {
            reader: reader.ok(),
        })
    }

    pub fn country_code(&self, ip: &str) -> String {
        let Some(reader) = &self.reader else {
            return String::new();
        };
        let Ok(addr) = ip.parse::<std::net::IpAddr>() else {
            return String::new();
        };
        match reader.lookup::<Country>(addr) {
            Ok(Some(country)) => country
                .country
                .and_then(|c| c.iso_code)
                .map(str::to_string)
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_path_disables_lookup() {
        let geoip = GeoIp::load("").unwrap();
        assert_eq!(geoip.country_code("8.8.8.8"), "");
    }

    #[test]
    fn unparseable_ip_resolves_to_empty_country() {
        let geoip = GeoIp::load("").unwrap();
        assert_eq!(geoip.country_code("not-an-ip"), "");
    }
}
