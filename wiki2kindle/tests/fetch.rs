//! Fetcher against a mock MediaWiki API.
//!
//! The HTTP client is blocking, so every fetch runs on a blocking thread.

use serde_json::json;
use url::Url;
use wiki2kindle::{Article, FetchError, Section, WikiFetcher};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEJAS_URL: &str = "https://en.wikipedia.org/wiki/HAL_Tejas";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake image data";

fn endpoint(server: &MockServer) -> Url {
    Url::parse(&format!("{}/w/api.php", server.uri())).unwrap()
}

async fn fetch(server: &MockServer, url: &str, images: bool) -> Result<Article, FetchError> {
    let endpoint = endpoint(server);
    let url = url.to_string();
    tokio::task::spawn_blocking(move || {
        WikiFetcher::new()?
            .with_api_endpoint(endpoint)
            .with_images(images)
            .fetch(&url)
    })
    .await
    .unwrap()
}

async fn mount_query(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_tejas(server: &MockServer) {
    mount_query(
        server,
        json!({
            "batchcomplete": true,
            "query": {
                "normalized": [{ "fromencoded": false, "from": "HAL Tejas", "to": "HAL Tejas" }],
                "pages": [{
                    "pageid": 1001,
                    "ns": 0,
                    "title": "HAL Tejas",
                    "pagelanguage": "en",
                    "lastrevid": 555,
                    "revisions": [{ "revid": 555, "parentid": 554, "timestamp": "2024-05-01T12:30:00Z" }]
                }]
            }
        }),
    )
    .await;

    let html = format!(
        r#"<div class="mw-content-ltr mw-parser-output" lang="en" dir="ltr">
<p>The <b>HAL Tejas</b> is an Indian light combat aircraft.<sup class="reference">[1]</sup></p>
<div class="mw-heading mw-heading2"><h2 id="Development">Development</h2></div>
<figure typeof="mw:File/Thumb"><a href="/wiki/File:Tejas.png"><img src="{uri}/img/tejas.png" width="220" /></a><figcaption>Tejas in flight</figcaption></figure>
<p>Development began in the 1980s.</p>
<div class="mw-heading mw-heading2"><h2 id="Variants">Variants</h2></div>
<ul><li>Tejas Mk1</li><li>Tejas Mk2</li></ul>
<div class="mw-heading mw-heading2"><h2 id="References">References</h2></div>
<p>Ignored.</p>
</div>"#,
        uri = server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "parse"))
        .and(query_param("oldid", "555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "parse": { "title": "HAL Tejas", "pageid": 1001, "revid": 555, "text": html }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_article_with_sections_in_source_order() {
    let server = MockServer::start().await;
    mount_tejas(&server).await;
    Mock::given(method("GET"))
        .and(path("/img/tejas.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let article = fetch(&server, TEJAS_URL, true).await.unwrap();

    assert_eq!(article.title, "HAL Tejas");
    assert_eq!(article.lang, "en");
    assert_eq!(article.revision, 555);
    assert_eq!(article.url.as_str(), TEJAS_URL);
    assert_eq!(
        article.last_modified.to_rfc3339(),
        "2024-05-01T12:30:00+00:00"
    );

    let kinds: Vec<String> = article
        .sections
        .iter()
        .map(|s| match s {
            Section::Heading { text, .. } => format!("h:{}", text),
            Section::Paragraph(text) => format!("p:{}", text),
            Section::ListItem(text) => format!("li:{}", text),
            Section::Image(image) => format!("img:{}", image.caption.clone().unwrap_or_default()),
            other => format!("{:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "p:The HAL Tejas is an Indian light combat aircraft.",
            "h:Development",
            "img:Tejas in flight",
            "p:Development began in the 1980s.",
            "h:Variants",
            "li:Tejas Mk1",
            "li:Tejas Mk2",
        ]
    );

    let image = article.images().next().unwrap();
    assert_eq!(image.media_type, "image/png");
    assert_eq!(image.data, PNG);
}

#[tokio::test]
async fn failed_image_download_is_skipped() {
    let server = MockServer::start().await;
    mount_tejas(&server).await;
    Mock::given(method("GET"))
        .and(path("/img/tejas.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let article = fetch(&server, TEJAS_URL, true).await.unwrap();

    assert_eq!(article.images().count(), 0);
    assert!(article
        .sections
        .contains(&Section::Paragraph("Development began in the 1980s.".into())));
}

#[tokio::test]
async fn images_are_not_requested_when_disabled() {
    let server = MockServer::start().await;
    mount_tejas(&server).await;
    Mock::given(method("GET"))
        .and(path("/img/tejas.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let article = fetch(&server, TEJAS_URL, false).await.unwrap();
    assert_eq!(article.images().count(), 0);
}

#[tokio::test]
async fn missing_article_is_not_found() {
    let server = MockServer::start().await;
    mount_query(
        &server,
        json!({
            "batchcomplete": true,
            "query": { "pages": [{ "ns": 0, "title": "No such plane", "missing": true }] }
        }),
    )
    .await;

    let err = fetch(&server, "https://en.wikipedia.org/wiki/No_such_plane", true)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound(title) if title == "No such plane"));
}

#[tokio::test]
async fn invalid_title_is_reported() {
    let server = MockServer::start().await;
    mount_query(
        &server,
        json!({
            "query": { "pages": [{
                "title": "Talk:",
                "invalidreason": "The requested page title is empty or contains only the name of a namespace.",
                "invalid": true
            }] }
        }),
    )
    .await;

    let err = fetch(&server, "https://en.wikipedia.org/wiki/Talk:", true)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidTitle { .. }));
}

#[tokio::test]
async fn api_error_object_is_surfaced() {
    let server = MockServer::start().await;
    mount_query(
        &server,
        json!({ "error": { "code": "maxlag", "info": "Waiting for a database server" } }),
    )
    .await;

    let err = fetch(&server, TEJAS_URL, true).await.unwrap_err();
    assert!(matches!(err, FetchError::Api { code, .. } if code == "maxlag"));
}

#[tokio::test]
async fn server_error_status_fails_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetch(&server, TEJAS_URL, true).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Status { status, .. } if status.as_u16() == 503
    ));
}

#[tokio::test]
async fn malformed_url_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = fetch(&server, "definitely not a url", true).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl { .. }));
}
