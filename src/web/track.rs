//! Conversion tracking and crawler-facing endpoints.
//!
//! - `GET  /px.gif?goal_id=&e=&value=` — conversion pixel; records the
//!   conversion and returns a 1×1 transparent GIF. The GIF is returned even
//!   when recording fails so the embedding page never sees a broken image.
//! - `POST /hooks/conversion` — server-to-server conversion webhook with a
//!   JSON ack.
//! - `GET  /sitemap.xml` — urlset of the public marketing pages.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde::Deserialize;

use crate::store::{self, Conversion};

use super::AppState;

/// A 1×1 transparent GIF (43 bytes), the classic tracking pixel.
const PIXEL_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // "GIF89a"
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1x1, global color table
    0x00, 0x00, 0x00, 0xff, 0xff, 0xff, // palette: black, white
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // graphic control, transparent
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // image data
    0x3b, // trailer
];

/// Public pages listed in the sitemap.
const PUBLIC_PAGES: &[&str] = &["/", "/pricing", "/features", "/blog"];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/px.gif", get(get_pixel))
        .route("/hooks/conversion", post(post_conversion))
        .route("/sitemap.xml", get(get_sitemap))
}

/// Query parameters for the conversion pixel.
#[derive(Debug, Deserialize)]
pub struct PixelQuery {
    pub goal_id: String,
    /// Event reference (deduplication key chosen by the embedding page).
    pub e: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Body of `POST /hooks/conversion`.
#[derive(Debug, Deserialize)]
pub struct ConversionHook {
    pub goal_id: String,
    pub event_ref: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub link_id: Option<String>,
}

/// `GET /px.gif` — record a conversion and return the pixel.
///
/// Recording failures are logged but never surfaced: the response is always
/// the GIF with a no-store cache policy.
async fn get_pixel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PixelQuery>,
) -> impl IntoResponse {
    let conversion = Conversion {
        id: None,
        timestamp: String::new(),
        goal_id: params.goal_id,
        event_ref: params.e,
        value: params.value,
        link_id: None,
        source: "pixel".to_string(),
    };

    match state.db.get() {
        Ok(conn) => {
            if let Err(e) = store::insert_conversion(&conn, &conversion) {
                tracing::warn!("Pixel conversion not recorded: {}", e);
            }
        }
        Err(e) => tracing::warn!("Pixel conversion not recorded: {}", e),
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        PIXEL_GIF.to_vec(),
    )
}

/// `POST /hooks/conversion` — record a conversion and return a JSON ack.
async fn post_conversion(
    State(state): State<Arc<AppState>>,
    Json(hook): Json<ConversionHook>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    let conversion = Conversion {
        id: None,
        timestamp: String::new(),
        goal_id: hook.goal_id,
        event_ref: hook.event_ref,
        value: hook.value,
        link_id: hook.link_id,
        source: "webhook".to_string(),
    };

    match store::insert_conversion(&conn, &conversion) {
        Ok(id) => Json(serde_json::json!({"status": "ok", "id": id})).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /sitemap.xml` — urlset of the public pages.
async fn get_sitemap(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let base = state.site_url.trim_end_matches('/');
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for page in PUBLIC_PAGES {
        xml.push_str(&format!("  <url><loc>{}{}</loc></url>\n", base, page));
    }
    xml.push_str("</urlset>\n");

    ([(header::CONTENT_TYPE, "application/xml")], xml)
}
