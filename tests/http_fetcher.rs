//! Integration tests for the reqwest-backed fetcher against a local server

#![cfg(feature = "http")]

use domsnap::resource::embed::embed_resources;
use domsnap::resource::{EmbedContext, HttpFetcher, ResourceBody};
use domsnap::{CaptureOptions, Error, ResourceFetcher};
use std::sync::{Arc, Once};
use tiny_http::{Header, Response, Server};

static INIT: Once = Once::new();

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18093").unwrap();
            for request in server.incoming_requests() {
                let path = request.url().split('?').next().unwrap_or("").to_string();
                let _ = match path.as_str() {
                    "/img.png" => request.respond(
                        Response::from_data(PNG_BYTES)
                            .with_header("Content-Type: image/png".parse::<Header>().unwrap()),
                    ),
                    "/style.css" => request.respond(
                        Response::from_string("p { background: url(img.png) }")
                            .with_header("Content-Type: text/css".parse::<Header>().unwrap()),
                    ),
                    "/ua" => {
                        let ua = request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("User-Agent"))
                            .map(|h| h.value.to_string())
                            .unwrap_or_default();
                        request.respond(Response::from_string(ua))
                    }
                    _ => request.respond(Response::from_string("not found").with_status_code(404)),
                };
            }
        });
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18093".to_string()
}

#[tokio::test]
async fn fetches_bytes_and_content_type() {
    let base = start_test_server();
    let res = HttpFetcher::new().fetch(&format!("{}/img.png", base)).await.unwrap();
    assert_eq!(res.body, ResourceBody::Bytes(PNG_BYTES.to_vec()));
    assert_eq!(res.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn error_statuses_are_failures() {
    let base = start_test_server();
    let err = HttpFetcher::new().fetch(&format!("{}/nope.png", base)).await.unwrap_err();
    assert!(matches!(err, Error::NetworkError(_)));
}

#[tokio::test]
async fn user_agent_is_sent() {
    let base = start_test_server();
    let res = HttpFetcher::new()
        .with_user_agent("domsnap-test/1.0")
        .fetch(&format!("{}/ua", base))
        .await
        .unwrap();
    assert_eq!(res.to_text().unwrap(), "domsnap-test/1.0");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let base = start_test_server();
    let err = HttpFetcher::new()
        .with_max_size(4)
        .fetch(&format!("{}/img.png", base))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds"));
}

#[tokio::test]
async fn data_and_file_urls_are_served_locally() {
    let fetcher = HttpFetcher::new();
    let res = fetcher.fetch("data:text/plain;base64,aGk=").await.unwrap();
    assert_eq!(res.to_text().unwrap(), "hi");

    let path = std::env::temp_dir().join("domsnap-http-fetcher-test.svg");
    std::fs::write(&path, "<svg/>").unwrap();
    let res = fetcher.fetch(&format!("file://{}", path.display())).await.unwrap();
    assert_eq!(res.to_text().unwrap(), "<svg/>");
    assert_eq!(res.content_type.as_deref(), Some("image/svg+xml"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn stylesheet_references_embed_over_http() {
    let base = start_test_server();
    let options = CaptureOptions::default();
    let ctx = EmbedContext::new(Arc::new(HttpFetcher::new()), &options);

    let sheet = format!("{}/style.css", base);
    let css = ctx.fetch_text(&sheet).await.unwrap();
    let out = embed_resources(&css, Some(sheet.as_str()), &ctx).await.unwrap();
    assert_eq!(out, "p { background: url(data:image/png;base64,iVBORw0KGgpmYWtl) }");
}
