use std::sync::Arc;

use chrono::Utc;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::event::EventKind;
use crate::models::inventory::InventoryRecord;
use crate::models::request::ParsedRequest;
use crate::utils::{hive_hash, nan_if_empty};

/// Topic names for the four event kinds (§6 "Configuration").
#[derive(Debug, Clone)]
pub struct Topics {
    pub request: String,
    pub impression: String,
    pub click: String,
    pub conversion: String,
}

impl Topics {
    fn for_kind(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Request => &self.request,
            EventKind::Impression => &self.impression,
            EventKind::Click => &self.click,
            EventKind::Conversion => &self.conversion,
        }
    }
}

/// Fire-and-forget publisher to the message bus, plus an optional local
/// model-training data sink (§4.7). When `kafka_enable` is false the
/// producer is simply absent and every publish no-ops, mirroring the
/// original's `KafkaWrapper` early-return.
pub struct EventEmitter {
    producer: Option<FutureProducer>,
    topics: Topics,
    model_data: Option<Arc<ModelDataWriter>>,
}

impl EventEmitter {
    pub fn new(enable: bool, brokers: &str, topics: Topics, model_data_dir: &str) -> anyhow::Result<Self> {
        let producer = if enable {
            Some(
                ClientConfig::new()
                    .set("bootstrap.servers", brokers)
                    .set("message.timeout.ms", "5000")
                    .create()?,
            )
        } else {
            None
        };
        let model_data = if model_data_dir.is_empty() {
            None
        } else {
            Some(Arc::new(ModelDataWriter::new(model_data_dir)))
        };
        Ok(EventEmitter {
            producer,
            topics,
            model_data,
        })
    }

    fn publish(&self, topic: &str, message: String) {
        let Some(producer) = self.producer.clone() else {
            return;
        };
        let topic = topic.to_string();
        tokio::spawn(async move {
            let record = FutureRecord::to(&topic).payload(&message).key("");
            if let Err((e, _)) = producer.send(record, std::time::Duration::from_secs(0)).await {
                tracing::warn!("kafka publish to {topic} failed: {e}");
            }
        });
    }

    /// Emits the request record (§4.7) produced right after `/request`
    /// responds.
    pub fn emit_request(&self, req: &ParsedRequest) {
        let record = request_record(req);
        self.publish(&self.topics.request, record);
    }

    /// Emits an impression/click/conversion event record, plus an optional
    /// model-data JSON line (§4.7). `price` is only meaningful for
    /// conversions.
    pub fn emit_event(&self, req: &ParsedRequest, creative: &InventoryRecord, kind: EventKind, price: f64) {
        let record = event_record(req, creative, kind, price);
        self.publish(self.topics.for_kind(kind), record);

        if let Some(writer) = &self.model_data {
            let writer = writer.clone();
            let line = model_data_line(req, creative, kind);
            tokio::spawn(async move {
                if let Err(e) = writer.append(&line).await {
                    tracing::warn!("model-data write failed: {e}");
                }
            });
        }
    }
}

/// `ts, placement_id, carrier, country_code, os_version, client_version,
/// network, adgroup, 1, len(creatives)` (§4.7).
fn request_record(req: &ParsedRequest) -> String {
    let ts = Utc::now().timestamp();
    [
        ts.to_string(),
        nan_if_empty(&req.placement_id),
        nan_if_empty(&req.carrier()),
        nan_if_empty(&req.country_code),
        nan_if_empty(&req.os_version),
        nan_if_empty(&req.client_version),
        nan_if_empty(&req.network),
        nan_if_empty(&req.adgroup),
        "1".to_string(),
        req.creatives.len().to_string(),
    ]
    .join("\t")
}

/// `ts, placement_id, ad_type, hive_hash(icon_url), package_name, carrier,
/// country_code, os_version, client_version, network, adgroup, IS_IMP,
/// IS_CLK, IS_CVN, price_if_conversion` (§4.7).
fn event_record(req: &ParsedRequest, creative: &InventoryRecord, kind: EventKind, price: f64) -> String {
    let ts = Utc::now().timestamp();
    let (is_imp, is_clk, is_cvn) = kind.flags();
    let price_field = if matches!(kind, EventKind::Conversion) {
        price.to_string()
    } else {
        "0".to_string()
    };
    [
        ts.to_string(),
        nan_if_empty(&req.placement_id),
        nan_if_empty(creative.ad_type().as_str()),
        hive_hash(&creative.icon_url).to_string(),
        nan_if_empty(&creative.package_name),
        nan_if_empty(&req.carrier()),
        nan_if_empty(&req.country_code),
        nan_if_empty(&req.os_version),
        nan_if_empty(&req.client_version),
        nan_if_empty(&req.network),
        nan_if_empty(&req.adgroup),
        is_imp.to_string(),
        is_clk.to_string(),
        is_cvn.to_string(),
        price_field,
    ]
    .join("\t")
}

#[derive(Debug, Serialize)]
struct ModelDataRecord<'a> {
    connection_type: &'a str,
    c: &'a str,
    user_id: &'a str,
    ip_lib: Option<()>,
    language: &'a str,
    #[serde(rename = "P")]
    p: &'a str,
    cc: &'a str,
    ip: &'a str,
    hp: &'a str,
    adgroup_id: &'a str,
    selected_creative: &'a InventoryRecord,
    adunit_id: &'a str,
    os_version: &'a str,
    carrier: String,
    limit: i64,
    timestamp: i64,
    request_id: &'a str,
    app_version: &'a str,
    event: &'a str,
}

fn model_data_line(req: &ParsedRequest, creative: &InventoryRecord, kind: EventKind) -> String {
    let record = ModelDataRecord {
        connection_type: &req.network,
        c: &req.c,
        user_id: &req.cid,
        ip_lib: None,
        language: &req.l,
        p: &req.p,
        cc: &req.cc,
        ip: &req.ip,
        hp: &req.hp,
        adgroup_id: &req.adgroup,
        selected_creative: creative,
        adunit_id: &req.placement_id,
        os_version: &req.os_version,
        carrier: req.carrier(),
        limit: req.limit,
        timestamp: Utc::now().timestamp(),
        request_id: &req.id,
        app_version: &req.client_version,
        event: kind.as_str(),
    };
    serde_json::to_string(&record).unwrap_or_default()
}

/// Appends one JSON line per event to `<dir>/model.save`, rotating the
/// file once a day by renaming the previous day's file aside (§4.7, §6
/// "Model-data file").
struct ModelDataWriter {
    dir: String,
    state: Mutex<Option<chrono::NaiveDate>>,
}

impl ModelDataWriter {
    fn new(dir: &str) -> Self {
        ModelDataWriter {
            dir: dir.to_string(),
            state: Mutex::new(None),
        }
    }

    fn path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.dir).join("model.save")
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let today = Utc::now().date_naive();
        let mut state = self.state.lock().await;
        if let Some(last_day) = *state {
            if last_day != today {
                let path = self.path();
                if tokio::fs::metadata(&path).await.is_ok() {
                    let rotated = std::path::Path::new(&self.dir).join(format!("model.save.{last_day}"));
                    let _ = tokio::fs::rename(&path, rotated).await;
                }
            }
        }
        *state = Some(today);
        drop(state);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ParsedRequest {
        ParsedRequest {
            id: "req1".to_string(),
            placement_id: "8".to_string(),
            m: "72402,x".to_string(),
            country_code: "BR".to_string(),
            os_version: "4.3".to_string(),
            client_version: "134".to_string(),
            network: "9".to_string(),
            adgroup: "4".to_string(),
            ..Default::default()
        }
    }

    fn sample_creative() -> InventoryRecord {
        InventoryRecord {
            id: 1,
            ad_id: 777,
            package_name: "com.machinezone.gow".to_string(),
            icon_url: "http://icon".to_string(),
            label: "Game".to_string(),
            click_url: "http://click".to_string(),
            price: "360000".to_string(),
            max_os: String::new(),
            min_os: String::new(),
            banner_url: String::new(),
            country: "BR".to_string(),
            ad_type_raw: "bigtree4".to_string(),
            status: "online".to_string(),
            model_sign1: 1256253024,
            extensions: "{}".to_string(),
            min_os_num: 0,
            max_os_num: 999_999,
            frequency: 0,
        }
    }

    #[test]
    fn request_record_has_ten_tab_separated_fields() {
        let req = sample_request();
        let record = request_record(&req);
        let fields: Vec<&str> = record.split('\t').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[1], "8");
        assert_eq!(fields[2], "72402");
        assert_eq!(fields[7], "4");
    }

    #[test]
    fn event_record_impression_sets_is_imp_only() {
        let req = sample_request();
        let creative = sample_creative();
        let record = event_record(&req, &creative, EventKind::Impression, 0.0);
        let fields: Vec<&str> = record.split('\t').collect();
        assert_eq!(fields.len(), 15);
        assert_eq!(fields[11], "1");
        assert_eq!(fields[12], "0");
        assert_eq!(fields[13], "0");
        assert_eq!(fields[14], "0");
    }

    #[test]
    fn event_record_conversion_carries_price() {
        let req = sample_request();
        let creative = sample_creative();
        let record = event_record(&req, &creative, EventKind::Conversion, 1.5);
        let fields: Vec<&str> = record.split('\t').collect();
        assert_eq!(fields[13], "1");
        assert_eq!(fields[14], "1.5");
    }

    #[test]
    fn empty_fields_render_as_nan() {
        let mut req = sample_request();
        req.network = String::new();
        let record = request_record(&req);
        let fields: Vec<&str> = record.split('\t').collect();
        assert_eq!(fields[6], "NAN");
    }

    #[tokio::test]
    async fn model_data_writer_appends_lines_to_model_save() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("rtb_lite_model_data_{}", std::process::id()));
        let writer = ModelDataWriter::new(dir.to_str().unwrap());
        writer.append("{\"a\":1}").await.unwrap();
        writer.append("{\"a\":2}").await.unwrap();
        let contents = tokio::fs::read_to_string(dir.join("model.save")).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
