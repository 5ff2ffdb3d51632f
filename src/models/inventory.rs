use serde::{Deserialize, Serialize};

/// The fixed ad-type enum backing the "bigtree" tracker payload formats
/// (§4.5). `Other` covers anything not in the known set so that a new
/// `ad_type` value in the database never aborts loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdType {
    #[serde(rename = "bigtree1")]
    Bigtree1,
    #[serde(rename = "bigtree2")]
    Bigtree2,
    #[serde(rename = "bigtree3")]
    Bigtree3,
    #[serde(rename = "bigtree4")]
    Bigtree4,
    #[serde(rename = "bigtree5")]
    Bigtree5,
    #[serde(rename = "bigtree6")]
    Bigtree6,
    #[serde(rename = "bigtree7")]
    Bigtree7,
    #[serde(rename = "bigtree8")]
    Bigtree8,
    #[serde(rename = "bigtree9")]
    Bigtree9,
    #[serde(rename = "bigtree10")]
    Bigtree10,
    #[serde(other)]
    Other,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Bigtree1 => "bigtree1",
            AdType::Bigtree2 => "bigtree2",
            AdType::Bigtree3 => "bigtree3",
            AdType::Bigtree4 => "bigtree4",
            AdType::Bigtree5 => "bigtree5",
            AdType::Bigtree6 => "bigtree6",
            AdType::Bigtree7 => "bigtree7",
            AdType::Bigtree8 => "bigtree8",
            AdType::Bigtree9 => "bigtree9",
            AdType::Bigtree10 => "bigtree10",
            AdType::Other => "",
        }
    }

    pub fn parse(raw: &str) -> AdType {
        match raw {
            "bigtree1" => AdType::Bigtree1,
            "bigtree2" => AdType::Bigtree2,
            "bigtree3" => AdType::Bigtree3,
            "bigtree4" => AdType::Bigtree4,
            "bigtree5" => AdType::Bigtree5,
            "bigtree6" => AdType::Bigtree6,
            "bigtree7" => AdType::Bigtree7,
            "bigtree8" => AdType::Bigtree8,
            "bigtree9" => AdType::Bigtree9,
            "bigtree10" => AdType::Bigtree10,
            _ => AdType::Other,
        }
    }
}

/// One creative row, as projected from the `inventory` table by the
/// 18-column `SELECT` in §4.2. Augmented post-load with `frequency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: i64,
    pub ad_id: i64,
    pub package_name: String,
    pub icon_url: String,
    pub label: String,
    pub click_url: String,
    pub price: String,
    pub max_os: String,
    pub min_os: String,
    pub banner_url: String,
    pub country: String,
    #[serde(rename = "ad_type")]
    pub ad_type_raw: String,
    pub status: String,
    pub model_sign1: i64,
    pub extensions: String,
    pub min_os_num: i64,
    pub max_os_num: i64,

    /// Current per-user counter for this ad, filled in by the frequency
    /// augmentation step (§4.4) — absent from the SQL row itself.
    #[serde(default)]
    pub frequency: i64,
}

impl InventoryRecord {
    pub fn ad_type(&self) -> AdType {
        AdType::parse(&self.ad_type_raw)
    }
}

/// The raw row shape returned by `sqlx` for the fixed 18-column projection
/// in §4.2 — kept separate from `InventoryRecord` because `sqlx::FromRow`
/// wants plain column-ordered fields, not the derived `frequency`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRow {
    pub id: i64,
    pub ad_id: i64,
    pub package_name: String,
    pub icon_url: String,
    pub label: String,
    pub click_url: String,
    pub price: String,
    pub max_os: String,
    pub min_os: String,
    pub banner_url: String,
    pub country: String,
    pub ad_type: String,
    pub status: String,
    pub model_sign1: i64,
    pub extensions: String,
    pub min_os_num: i64,
    pub max_os_num: i64,
    #[sqlx(default)]
    pub ts: Option<chrono::NaiveDateTime>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            id: row.id,
            ad_id: row.ad_id,
            package_name: row.package_name,
            icon_url: row.icon_url,
            label: row.label,
            click_url: row.click_url,
            price: row.price,
            max_os: row.max_os,
            min_os: row.min_os,
            banner_url: row.banner_url,
            country: row.country,
            ad_type_raw: row.ad_type,
            status: row.status,
            model_sign1: row.model_sign1,
            extensions: row.extensions,
            min_os_num: row.min_os_num,
            max_os_num: row.max_os_num,
            frequency: 0,
        }
    }
}
