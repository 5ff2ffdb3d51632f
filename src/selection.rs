use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::blocklist::BlockList;
use crate::inventory_loader::CountryBucket;
use crate::models::inventory::InventoryRecord;
use crate::models::request::ParsedRequest;

/// Filters candidates and picks up to `count` creatives via one of two
/// strategies, chosen by a traffic split (§4.4).
pub struct SelectionEngine {
    traffic_random: i32,
    frequency_cap: i64,
}

impl SelectionEngine {
    pub fn new(traffic_random: i32, frequency_cap: i64) -> Self {
        SelectionEngine {
            traffic_random,
            frequency_cap,
        }
    }

    fn passes_filters(
        &self,
        record: &InventoryRecord,
        frequency: i64,
        os_version_num: i64,
        blocklist: &BlockList,
        carrier: &str,
    ) -> bool {
        os_version_num >= record.min_os_num
            && os_version_num <= record.max_os_num
            && frequency <= self.frequency_cap
            && !blocklist.is_blocked(&record.package_name, carrier)
    }

    /// Runs the traffic split and dispatches to the chosen strategy,
    /// tagging `req.adgroup` accordingly (§4.4).
    pub fn select(
        &self,
        req: &mut ParsedRequest,
        bucket: &CountryBucket,
        frequencies: &[i64],
        blocklist: &BlockList,
        count: usize,
    ) -> Vec<InventoryRecord> {
        let roll = rand::rng().random_range(0..100);
        if roll < self.traffic_random {
            self.select_random(req, bucket, frequencies, blocklist, count)
        } else {
            self.select_ranked(req, bucket, frequencies, blocklist, count)
        }
    }

    /// Ranked strategy: walk `bucket` in its pre-sorted order, emitting a
    /// passing record only if its package differs from the last emitted
    /// one (adjacent dedup), until `count` are chosen (§4.4).
    fn select_ranked(
        &self,
        req: &mut ParsedRequest,
        bucket: &CountryBucket,
        frequencies: &[i64],
        blocklist: &BlockList,
        count: usize,
    ) -> Vec<InventoryRecord> {
        req.adgroup = "4".to_string();
        let carrier = req.carrier();
        let mut selected = Vec::new();
        let mut last_package: Option<&str> = None;
        for (record, &frequency) in bucket.iter().zip(frequencies.iter()) {
            if !self.passes_filters(record, frequency, req.os_version_num, blocklist, &carrier) {
                continue;
            }
            if last_package == Some(record.package_name.as_str()) {
                continue;
            }
            last_package = Some(record.package_name.as_str());
            let mut chosen = record.clone();
            chosen.frequency = frequency;
            selected.push(chosen);
            if selected.len() >= count {
                break;
            }
        }
        selected
    }

    /// Random strategy: walk a random permutation of indices, keeping a
    /// set of already-emitted packages, until `count` unique-package
    /// records are chosen (§4.4).
    fn select_random(
        &self,
        req: &mut ParsedRequest,
        bucket: &CountryBucket,
        frequencies: &[i64],
        blocklist: &BlockList,
        count: usize,
    ) -> Vec<InventoryRecord> {
        req.adgroup = "1".to_string();
        let carrier = req.carrier();
        let mut order: Vec<usize> = (0..bucket.len()).collect();
        order.shuffle(&mut rand::rng());

        let mut seen_packages: HashSet<&str> = HashSet::new();
        let mut selected = Vec::new();
        for index in order {
            let record = &bucket[index];
            let frequency = frequencies[index];
            if !self.passes_filters(record, frequency, req.os_version_num, blocklist, &carrier) {
                continue;
            }
            if !seen_packages.insert(record.package_name.as_str()) {
                continue;
            }
            let mut chosen = record.clone();
            chosen.frequency = frequency;
            selected.push(chosen);
            if selected.len() >= count {
                break;
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(package: &str, min_os: i64, max_os: i64) -> InventoryRecord {
        InventoryRecord {
            id: 1,
            ad_id: 1,
            package_name: package.to_string(),
            icon_url: String::new(),
            label: String::new(),
            click_url: String::new(),
            price: "0".to_string(),
            max_os: String::new(),
            min_os: String::new(),
            banner_url: String::new(),
            country: "US".to_string(),
            ad_type_raw: "bigtree1".to_string(),
            status: "online".to_string(),
            model_sign1: 0,
            extensions: String::new(),
            min_os_num: min_os,
            max_os_num: max_os,
            frequency: 0,
        }
    }

    fn base_request() -> ParsedRequest {
        ParsedRequest {
            id: "r1".to_string(),
            os_version_num: 0,
            limit: 5,
            ..Default::default()
        }
    }

    #[test]
    fn ranked_strategy_dedups_adjacent_same_package_s1() {
        let bucket = vec![
            record("A", 0, 999),
            record("A", 0, 999),
            record("B", 0, 999),
        ];
        let frequencies = vec![0, 0, 0];
        let engine = SelectionEngine::new(0, 100);
        let blocklist = BlockList::load("");
        let mut req = base_request();
        let selected = engine.select_ranked(&mut req, &bucket, &frequencies, &blocklist, 5);
        let packages: Vec<&str> = selected.iter().map(|r| r.package_name.as_str()).collect();
        assert_eq!(packages, vec!["A", "B"]);
        assert_eq!(req.adgroup, "4");
    }

    #[test]
    fn ranked_strategy_excludes_over_frequency_cap_s2() {
        let bucket = vec![
            record("A", 0, 999),
            record("A", 0, 999),
            record("B", 0, 999),
        ];
        let frequencies = vec![5, 5, 0];
        let engine = SelectionEngine::new(0, 0);
        let blocklist = BlockList::load("");
        let mut req = base_request();
        let selected = engine.select_ranked(&mut req, &bucket, &frequencies, &blocklist, 5);
        let packages: Vec<&str> = selected.iter().map(|r| r.package_name.as_str()).collect();
        assert_eq!(packages, vec!["B"]);
    }

    #[test]
    fn os_version_filter_excludes_out_of_range_records() {
        let bucket = vec![record("A", 100, 200)];
        let frequencies = vec![0];
        let engine = SelectionEngine::new(0, 100);
        let blocklist = BlockList::load("");
        let mut req = base_request();
        req.os_version_num = 50;
        let selected = engine.select_ranked(&mut req, &bucket, &frequencies, &blocklist, 5);
        assert!(selected.is_empty());
    }

    #[test]
    fn random_strategy_never_emits_duplicate_packages() {
        let bucket = vec![
            record("A", 0, 999),
            record("A", 0, 999),
            record("B", 0, 999),
            record("C", 0, 999),
        ];
        let frequencies = vec![0, 0, 0, 0];
        let engine = SelectionEngine::new(100, 100);
        let blocklist = BlockList::load("");
        let mut req = base_request();
        let selected = engine.select_random(&mut req, &bucket, &frequencies, &blocklist, 10);
        let mut packages: Vec<&str> = selected.iter().map(|r| r.package_name.as_str()).collect();
        let before_dedup_len = packages.len();
        packages.sort();
        packages.dedup();
        assert_eq!(packages.len(), before_dedup_len);
        assert_eq!(req.adgroup, "1");
    }
}
