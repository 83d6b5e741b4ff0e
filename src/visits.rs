//! Hit recorder
//!
//! Turns a qualifying page view into a [`Hit`] and hands it to the visit
//! store. Recording is best effort: a storage failure is logged and the page
//! is served anyway.

use axum::http::HeaderMap;
use chrono::{Local, NaiveDate, Utc};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::config::DayClock;
use crate::db::{Database, Hit};

/// Derive the visitor key for a request.
///
/// The first entry of `X-Forwarded-For` wins, else the socket address. The
/// header is client-controlled unless a trusted proxy overwrites it, so a
/// directly exposed server can be fed arbitrary keys.
pub fn visitor_key(headers: &HeaderMap, fallback: &SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(ips) = forwarded.to_str() {
            if let Some(first_ip) = ips.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    fallback.ip().to_string()
}

/// Strip trailing slashes so `/verbs/` and `/verbs` count as one page
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Current calendar day on the configured clock
pub fn today(clock: DayClock) -> NaiveDate {
    match clock {
        DayClock::Local => Local::now().date_naive(),
        DayClock::Utc => Utc::now().date_naive(),
    }
}

#[derive(Clone)]
pub struct HitRecorder {
    db: Database,
    clock: DayClock,
}

impl HitRecorder {
    pub fn new(db: Database, clock: DayClock) -> Self {
        Self { db, clock }
    }

    pub fn today(&self) -> NaiveDate {
        today(self.clock)
    }

    /// Record a view of `path`. Never fails; errors end up in the log.
    pub async fn record_view(&self, headers: &HeaderMap, addr: &SocketAddr, path: &str) {
        let hit = Hit::new(self.today(), visitor_key(headers, addr), normalize_path(path));

        match self.db.record(&hit).await {
            Ok(true) => debug!("Recorded visit {} {} {}", hit.day, hit.visitor_key, hit.path),
            Ok(false) => {}
            Err(e) => warn!("Failed to record visit to {}: {}", hit.path, e),
        }
    }
}
