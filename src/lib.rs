pub mod blocklist;
pub mod config;
pub mod context_store;
pub mod error;
pub mod events;
pub mod frequency;
pub mod geoip;
pub mod handlers;
pub mod inventory_cache;
pub mod inventory_loader;
pub mod models;
pub mod profiler;
pub mod rank_table;
pub mod selection;
pub mod tracker;
pub mod utils;

use std::sync::Arc;

use crate::blocklist::BlockList;
use crate::config::RtbConfig;
use crate::context_store::ContextStore;
use crate::events::EventEmitter;
use crate::frequency::FrequencyClient;
use crate::geoip::GeoIp;
use crate::inventory_cache::InventoryCache;
use crate::profiler::Profiler;
use crate::rank_table::RankTable;
use crate::selection::SelectionEngine;

/// Everything a handler needs, assembled once at startup and cloned
/// (cheaply — every field is an `Arc` or otherwise shared) into each
/// request (§4.9).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RtbConfig>,
    pub cache: Arc<InventoryCache>,
    pub rank_table: Arc<RankTable>,
    pub selection: Arc<SelectionEngine>,
    pub frequency: FrequencyClient,
    pub context_store: ContextStore,
    pub events: Arc<EventEmitter>,
    pub geoip: Arc<GeoIp>,
    pub blocklist: Arc<BlockList>,
    pub profiler: Profiler,
}
