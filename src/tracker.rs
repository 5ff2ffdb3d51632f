use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::models::inventory::{AdType, InventoryRecord};
use crate::models::request::ParsedRequest;

/// Click/impression URLs plus the bundle fields the wire response needs,
/// for one selected creative at slot `index` (§4.5).
pub struct TrackerUrls {
    pub click_url: String,
    pub impression_url: String,
}

pub fn creative_token(request_id: &str, index: usize) -> String {
    format!("{request_id}-{index}")
}

fn price_value(raw_price: &str) -> f64 {
    raw_price.parse::<f64>().unwrap_or(0.0) / 1_000_000.0
}

/// Builds the per-network "bigtree" callback payload (§4.5).
fn callback_payload(req: &ParsedRequest, record: &InventoryRecord, index: usize) -> String {
    let price = price_value(&record.price);
    let ad_type = record.ad_type();
    let token = creative_token(&req.id, index);

    if ad_type == AdType::Bigtree6 {
        let p2 = format!(
            "5_2_{}_{}_{}_{}_{}_{}_{}_{}",
            req.cid, ad_type.as_str(), req.cc, req.hp, req.p, req.c, req.client_version, token
        );
        return format!(
            "s2={}&s3={}&s4={}&s5=c7caa578-763f-44de-8673-8f1bfbb3c3c8&s1=",
            record.package_name, price, p2
        );
    }

    let p1 = format!(
        "5_1_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}",
        req.cid,
        req.cc,
        ad_type.as_str(),
        req.hp,
        req.p,
        req.c,
        req.client_version,
        record.package_name,
        price,
        token
    );

    match ad_type {
        AdType::Bigtree1 => format!("subid1={p1}&subid2=&subid3=&m.gaid="),
        AdType::Bigtree2 => format!("p1=subid1&v1={p1}&p2=subid2&v2=&p3=subid3&v3="),
        AdType::Bigtree3 => format!("postback={}", urlencoding::encode(&BASE64.encode(&p1))),
        AdType::Bigtree4 => format!("aff_sub={p1}&aff_sub2=&aff_sub3=&aff_sub5="),
        AdType::Bigtree5 => format!("cv1n=subid1&cv1v={p1}&cv2n=subid2&cv2v=&cv3n=subid3&cv3v="),
        AdType::Bigtree7 => format!("clickId={p1}"),
        AdType::Bigtree8 => format!("q={p1}"),
        AdType::Bigtree9 => format!("aff_sub={p1}&aff_sub2=&aff_sub3=&aff_sub4=9-1"),
        AdType::Bigtree10 => format!("dv1={p1}&dv2=&dv3="),
        AdType::Bigtree6 => unreachable!("handled above"),
        AdType::Other => String::new(),
    }
}

/// Builds the click and impression tracker URLs for one selected
/// creative (§4.5).
pub fn build_tracker_urls(
    req: &ParsedRequest,
    record: &InventoryRecord,
    index: usize,
    click_address: &str,
    callback_address: &str,
) -> TrackerUrls {
    let token = creative_token(&req.id, index);
    let payload = callback_payload(req, record, index);
    let final_url = format!("{}&{}", record.click_url, payload);
    let click_url = format!(
        "http://{click_address}/click?final_url={}&param={token}",
        urlencoding::encode(&final_url)
    );
    let impression_url = format!("http://{callback_address}/impression?param={token}");
    TrackerUrls {
        click_url,
        impression_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::InventoryRecord;

    fn record(ad_type: &str) -> InventoryRecord {
        InventoryRecord {
            id: 1,
            ad_id: 777,
            package_name: "com.example.app".to_string(),
            icon_url: String::new(),
            label: "Example".to_string(),
            click_url: "http://advertiser/click".to_string(),
            price: "360000".to_string(),
            max_os: String::new(),
            min_os: String::new(),
            banner_url: String::new(),
            country: "US".to_string(),
            ad_type_raw: ad_type.to_string(),
            status: "online".to_string(),
            model_sign1: 9,
            extensions: String::new(),
            min_os_num: 0,
            max_os_num: 999_999,
            frequency: 0,
        }
    }

    fn request() -> ParsedRequest {
        ParsedRequest {
            id: "req-id".to_string(),
            cid: "user1".to_string(),
            cc: "US".to_string(),
            hp: "com.host".to_string(),
            p: "8-2".to_string(),
            c: "100000".to_string(),
            client_version: "134".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn bigtree3_postback_round_trips_through_base64_and_url_encoding() {
        let req = request();
        let rec = record("bigtree3");
        let payload = callback_payload(&req, &rec, 0);
        let postback = payload.strip_prefix("postback=").unwrap();
        let decoded_b64 = urlencoding::decode(postback).unwrap().into_owned();
        let decoded = BASE64.decode(decoded_b64.as_bytes()).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        let expected_p1 = format!(
            "5_1_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}",
            req.cid, req.cc, "bigtree3", req.hp, req.p, req.c, req.client_version,
            rec.package_name, 0.36, creative_token(&req.id, 0)
        );
        assert_eq!(decoded, expected_p1);
    }

    #[test]
    fn unknown_ad_type_yields_empty_payload() {
        let req = request();
        let rec = record("bigtree99");
        assert_eq!(callback_payload(&req, &rec, 0), "");
    }

    #[test]
    fn bigtree1_wraps_subid_params() {
        let req = request();
        let rec = record("bigtree1");
        let payload = callback_payload(&req, &rec, 3);
        assert!(payload.starts_with("subid1=5_1_"));
        assert!(payload.ends_with("&subid2=&subid3=&m.gaid="));
    }

    #[test]
    fn price_is_scaled_by_one_million() {
        assert_eq!(price_value("360000"), 0.36);
        assert_eq!(price_value("not-a-number"), 0.0);
    }
}
