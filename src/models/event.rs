/// Which stage of the funnel produced an event record (§3 "Event kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Request,
    Impression,
    Click,
    Conversion,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Request => "request",
            EventKind::Impression => "impression",
            EventKind::Click => "click",
            EventKind::Conversion => "conversion",
        }
    }

    /// The `(IS_IMP, IS_CLK, IS_CVN)` triple used in the tab-delimited
    /// event record (§4.7). `Request` never reaches this path.
    pub fn flags(&self) -> (u8, u8, u8) {
        match self {
            EventKind::Request => (0, 0, 0),
            EventKind::Impression => (1, 0, 0),
            EventKind::Click => (0, 1, 0),
            EventKind::Conversion => (0, 0, 1),
        }
    }
}
