use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    results::{IndexInfo, ResultItem, SearchResponse},
    upload::{MediaFile, MediaKind},
};

use super::{backend::SearchBackend, errors::SearchError};

pub struct RemoteBackend {
    remote_addr: String,
    client: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(addr: &str) -> RemoteBackend {
        let remote_addr = addr.strip_suffix("/").unwrap_or(addr).to_string();

        RemoteBackend {
            remote_addr,
            client: reqwest::Client::new(),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        log::info!("GET {}{}", self.remote_addr, url);
        self.client.get(format!("{}{}", self.remote_addr, url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        log::info!("POST {}{}", self.remote_addr, url);
        self.client.post(format!("{}{}", self.remote_addr, url))
    }
}

/// Error body of a non-2xx response.
#[derive(Deserialize, Debug, Clone)]
struct ErrorResponse {
    detail: Option<String>,
}

async fn handle_response<T>(response: reqwest::Response) -> Result<T, SearchError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|body| body.detail);
        return Err(SearchError::status(status.as_u16(), detail));
    }

    serde_json::from_str::<T>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        SearchError::Backend(format!("malformed response: {err}"))
    })
}

#[async_trait]
impl SearchBackend for RemoteBackend {
    async fn index_info(&self) -> Result<IndexInfo, SearchError> {
        let resp = self.get("/api/index/info").send().await?;
        handle_response(resp).await
    }

    async fn search_text(&self, query: &str) -> Result<Vec<ResultItem>, SearchError> {
        let resp = self
            .post("/api/search/text")
            .json(&json!({ "query": query }))
            .send()
            .await?;

        Ok(handle_response::<SearchResponse>(resp).await?.into_items())
    }

    async fn search_media(
        &self,
        kind: MediaKind,
        file: &MediaFile,
    ) -> Result<Vec<ResultItem>, SearchError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .post(&format!("/api/search/{}", kind.endpoint()))
            .multipart(form)
            .send()
            .await?;

        Ok(handle_response::<SearchResponse>(resp).await?.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image_hit(name: &str, score: f64) -> serde_json::Value {
        json!({
            "score": score,
            "metadata": {
                "s3_file_name": name,
                "s3_public_url": format!("https://cdn.example.com/{name}"),
                "s3_file_path": "images/",
                "file_type": "image",
                "segment": null,
                "start_offset_sec": null,
                "end_offset_sec": null,
                "interval_sec": null
            }
        })
    }

    #[tokio::test]
    async fn test_search_text_posts_query() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/search/text"))
            .and(body_json(json!({ "query": "Stripes" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [image_hit("a.png", 0.9), image_hit("b.png", 0.7)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(&format!("{}/", server.uri()));
        let items = backend.search_text("Stripes").await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].file_name, "a.png");
        assert_eq!(items[1].score, 0.7);
    }

    #[tokio::test]
    async fn test_error_detail_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/search/text"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "detail": "index unavailable" })),
            )
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(&server.uri());
        let err = backend.search_text("Stripes").await.unwrap_err();

        match &err {
            SearchError::Transport { status, detail, .. } => {
                assert_eq!(*status, Some(500));
                assert_eq!(detail.as_deref(), Some("index unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.user_message(), "Oops! index unavailable");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/index/info"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(&server.uri());
        let err = backend.index_info().await.unwrap_err();
        assert_eq!(err.user_message(), "Oops! Unexpected error.");
    }

    #[tokio::test]
    async fn test_index_info() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/index/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total_vectors": 4213 })))
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(&server.uri());
        assert_eq!(backend.index_info().await.unwrap().total_vectors, 4213);
    }

    #[tokio::test]
    async fn test_search_media_uses_kind_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/search/video"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = RemoteBackend::new(&server.uri());
        let file = MediaFile::new("clip.mp4", "video/mp4", vec![0u8; 16]);
        let items = backend.search_media(MediaKind::Video, &file).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // nothing listens on port 9 (discard)
        let backend = RemoteBackend::new("http://127.0.0.1:9");
        let err = backend.search_text("Clouds").await.unwrap_err();
        assert_eq!(err.user_message(), "Oops! An unexpected error occurred.");
    }
}
