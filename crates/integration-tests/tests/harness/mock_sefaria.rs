//! Mock Sefaria backend returning canned corpus payloads

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock corpus API with predictable fixtures
pub struct MockSefaria {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    texts_count: AtomicU32,
    search_count: AtomicU32,
    related_count: AtomicU32,
    calendars_count: AtomicU32,
}

impl MockSefaria {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            texts_count: AtomicU32::new(0),
            search_count: AtomicU32::new(0),
            related_count: AtomicU32::new(0),
            calendars_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/api/v3/texts/{reference}", routing::get(handle_texts))
            .route("/api/search/text/_search", routing::post(handle_search))
            .route("/api/related/{reference}", routing::get(handle_related))
            .route("/api/calendars", routing::get(handle_calendars))
            .route("/api/find-refs", routing::post(handle_find_refs))
            .route("/api/v2/topics/{slug}", routing::get(handle_topic))
            .route("/api/sheets/{id}", routing::get(handle_sheet))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the gateway's `sefaria_api_base`
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn texts_count(&self) -> u32 {
        self.state.texts_count.load(Ordering::Relaxed)
    }

    pub fn search_count(&self) -> u32 {
        self.state.search_count.load(Ordering::Relaxed)
    }

    pub fn related_count(&self) -> u32 {
        self.state.related_count.load(Ordering::Relaxed)
    }

    pub fn calendars_count(&self) -> u32 {
        self.state.calendars_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockSefaria {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn known_text(reference: &str) -> Option<Value> {
    let (canonical, he_ref, english, hebrew) = match reference {
        "Yoma 85b" => (
            "Yoma 85b",
            "יומא פ״ה ב",
            json!(["And one who saves a single life is as if he saved an entire world."]),
            json!(["וכל המקיים נפש אחת מישראל"]),
        ),
        "Genesis 1:1" => (
            "Genesis 1:1",
            "בראשית א׳:א׳",
            json!([["In the beginning God created", "the heavens and the earth."]]),
            json!(["בראשית ברא אלהים את השמים ואת הארץ"]),
        ),
        "Exodus 3:14" => (
            "Exodus 3:14",
            "שמות ג׳:י״ד",
            json!(["And God said to Moses: I will be what I will be."]),
            json!(["ויאמר אלהים אל משה"]),
        ),
        "Shulchan Arukh, Orach Chayim 263" => (
            "Shulchan Arukh, Orach Chayim 263",
            "שולחן ערוך, אורח חיים רס״ג",
            json!(["One should be careful to light Shabbat candles. Both men and women are obligated."]),
            json!(["יהא זהיר לעשות נר יפה"]),
        ),
        "Rashi on Genesis 1:1:1" => (
            "Rashi on Genesis 1:1:1",
            "רש״י על בראשית",
            json!(["In the beginning. Rabbi Yitzchak said the Torah should have begun from This month."]),
            json!(["בראשית. אמר רבי יצחק"]),
        ),
        "Tosafot on Yoma 85b" => (
            "Tosafot on Yoma 85b",
            "תוספות על יומא",
            json!(["Tosafot discuss how saving a life overrides the Shabbat."]),
            json!(["פיקוח נפש דוחה שבת"]),
        ),
        _ => return None,
    };

    Some(json!({
        "ref": canonical,
        "heRef": he_ref,
        "versions": [
            {"language": "en", "versionTitle": "Test English Edition", "text": english},
            {"language": "he", "versionTitle": "Test Hebrew Edition", "text": hebrew},
        ],
    }))
}

async fn handle_texts(
    State(state): State<Arc<MockState>>,
    Path(reference): Path<String>,
) -> impl IntoResponse {
    state.texts_count.fetch_add(1, Ordering::Relaxed);
    match known_text(&reference) {
        Some(body) => Json(body).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Ref not found"}))).into_response(),
    }
}

async fn handle_search(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.search_count.fetch_add(1, Ordering::Relaxed);
    let raw = body.to_string();

    let hits = if raw.contains("פיקוח נפש") || raw.contains("pikuach") {
        json!([{
            "_id": "Yoma 85b",
            "_source": {"ref": "Yoma 85b"},
            "highlight": {"naive_lemmatizer": ["<b>פיקוח נפש</b> דוחה את השבת"]},
        }])
    } else if raw.contains("candle") {
        json!([
            {"_id": "Shabbat 21b", "_source": {"ref": "Shabbat 21b"}},
            {"_id": "Shabbat 21b (dup)", "_source": {"ref": "Shabbat 21b"}},
        ])
    } else {
        json!([])
    };

    Json(json!({"hits": {"hits": hits}}))
}

async fn handle_related(
    State(state): State<Arc<MockState>>,
    Path(reference): Path<String>,
) -> Json<Value> {
    state.related_count.fetch_add(1, Ordering::Relaxed);

    if reference == "Yoma 85b" {
        Json(json!({
            "links": [
                {"sourceRef": "Rashi on Genesis 1:1:1", "category": "Commentary", "type": "commentary",
                 "collectiveTitle": {"en": "Rashi"}, "pr": 4.0, "views": 2000.0, "numDatasource": 1.0},
                {"sourceRef": "Tosafot on Yoma 85b", "category": "Commentary", "type": "commentary",
                 "collectiveTitle": {"en": "Tosafot"}, "pr": 6.0, "views": 1000.0, "numDatasource": 1.0},
                {"sourceRef": "Mishneh Torah, Shabbat 2:1", "category": "Halakhah",
                 "pr": 3.0, "views": 500.0, "numDatasource": 2.0},
            ],
            "sheets": [
                {"id": 101, "title": "Saving a Life", "views": 900},
                {"id": 101, "title": "Saving a Life (dup)", "views": 900},
                {"id": 102, "title": "Shabbat and Danger", "views": 400},
            ],
            "topics": [
                {"topic": "pikuach-nefesh", "title": {"en": "Pikuach Nefesh"}},
                {"topic": "pikuach-nefesh", "title": {"en": "Pikuach Nefesh"}},
                {"topic": "shabbat", "title": {"en": "Shabbat"}},
            ],
        }))
    } else {
        Json(json!({"links": [], "sheets": [], "topics": []}))
    }
}

async fn handle_calendars(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.calendars_count.fetch_add(1, Ordering::Relaxed);
    Json(json!({
        "date": "2025-01-01",
        "calendar_items": [
            {
                "title": {"en": "Parashat Hashavua", "he": "פרשת השבוע"},
                "displayValue": {"en": "Vayigash", "he": "ויגש"},
                "ref": "Genesis 44:18-47:27",
                "url": "Genesis.44.18-47.27",
                "extraDetails": {"aliyot": ["Genesis 44:18-30", "Genesis 44:31-45:7"]},
            },
            {
                "title": {"en": "Haftarah", "he": "הפטרה"},
                "displayValue": {"en": "Ezekiel 37:15-28"},
                "ref": "Ezekiel 37:15-28",
                "url": "Ezekiel.37.15-28",
            },
            {
                "title": {"en": "Daf Yomi", "he": "דף יומי"},
                "displayValue": {"en": "Sanhedrin 57"},
                "ref": "Sanhedrin 57",
                "url": "Sanhedrin.57",
            },
            {
                "title": {"en": "Daily Mishnah", "he": "משנה יומית"},
                "displayValue": {"en": "Oktzin 2:9-10"},
                "ref": "Mishnah Oktzin 2:9",
                "url": "Mishnah_Oktzin.2.9",
            },
            {
                "title": {"en": "Chanukah", "he": "חנוכה"},
                "displayValue": {"en": "Day 3"},
                "category": "Chanukah",
            },
        ],
    }))
}

async fn handle_find_refs(Json(body): Json<Value>) -> Json<Value> {
    let text = body
        .get("text")
        .and_then(|t| t.get("body"))
        .and_then(|b| b.as_str())
        .unwrap_or_default();

    let mut results = Vec::new();
    if let Some(position) = text.find("Genesis 1:1") {
        results.push(json!({
            "refs": ["Genesis 1:1"],
            "text": "Genesis 1:1",
            "startChar": position,
            "endChar": position + 11,
        }));
    }
    if text.contains("Exodus 3:14") {
        results.push(json!({"bestRef": "Exodus 3:14", "heRef": "שמות ג׳:י״ד"}));
    }

    Json(json!({"body": {"results": results}}))
}

async fn handle_topic(Path(slug): Path<String>) -> impl IntoResponse {
    if slug == "pikuach-nefesh" {
        Json(json!({
            "slug": "pikuach-nefesh",
            "refs": [
                {"ref": "Sheet 101", "is_sheet": true},
                {"ref": "Sheet 102", "is_sheet": true},
                {"ref": "Yoma 85b", "is_sheet": false},
            ],
        }))
        .into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "topic not found"}))).into_response()
    }
}

async fn handle_sheet(Path(id): Path<String>) -> impl IntoResponse {
    let Ok(numeric) = id.parse::<i64>() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad id"}))).into_response();
    };
    Json(json!({
        "id": numeric,
        "title": format!("Test Sheet {numeric}"),
        "summary": "A sheet about saving a life.",
        "sources": [
            {"ref": "Yoma 85b", "text": {"en": "Saving a life overrides Shabbat.", "he": "פיקוח נפש"}},
            {"outsideText": "A teacher's note on the passage."},
        ],
    }))
    .into_response()
}
