use serde::{Deserialize, Serialize};

/// Kind of media a ranked hit points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Text,
}

impl MediaType {
    fn from_wire(file_type: Option<&str>) -> Self {
        match file_type {
            Some("video") => MediaType::Video,
            Some("text") => MediaType::Text,
            Some("image") => MediaType::Image,
            other => {
                if let Some(other) = other {
                    log::debug!("unknown file_type {other:?}, treating as image");
                }
                MediaType::Image
            }
        }
    }
}

/// One ranked hit returned by the backend. Never mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultItem {
    pub score: f64,
    pub media_type: MediaType,
    pub source_url: String,
    pub file_name: String,
    pub file_path: String,
    pub start_offset_sec: f64,
    pub end_offset_sec: f64,
    pub interval_sec: f64,
    pub segment: f64,
}

impl ResultItem {
    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    /// Media-fragment url positioned at the clip this hit represents.
    pub fn clip_url(&self) -> String {
        if !self.is_video() {
            return self.source_url.clone();
        }

        format!(
            "{}#t={},{}",
            self.source_url, self.start_offset_sec, self.end_offset_sec
        )
    }
}

/// `{ "results": [...] }` body shared by the text and media search endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<WireResult>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireResult {
    pub score: f64,
    #[serde(default)]
    pub metadata: WireMetadata,
}

/// Index metadata as the backend forwards it. Any field may be null.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireMetadata {
    pub s3_file_name: Option<String>,
    pub s3_public_url: Option<String>,
    pub s3_file_path: Option<String>,
    pub file_type: Option<String>,
    pub start_offset_sec: Option<f64>,
    pub end_offset_sec: Option<f64>,
    pub interval_sec: Option<f64>,
    pub segment: Option<f64>,
}

impl From<WireResult> for ResultItem {
    fn from(wire: WireResult) -> Self {
        let meta = wire.metadata;
        ResultItem {
            score: wire.score,
            media_type: MediaType::from_wire(meta.file_type.as_deref()),
            source_url: meta.s3_public_url.unwrap_or_default(),
            file_name: meta.s3_file_name.unwrap_or_default(),
            file_path: meta.s3_file_path.unwrap_or_default(),
            start_offset_sec: meta.start_offset_sec.unwrap_or_default(),
            end_offset_sec: meta.end_offset_sec.unwrap_or_default(),
            interval_sec: meta.interval_sec.unwrap_or_default(),
            segment: meta.segment.unwrap_or_default(),
        }
    }
}

impl SearchResponse {
    pub fn into_items(self) -> Vec<ResultItem> {
        self.results.into_iter().map(ResultItem::from).collect()
    }
}

/// `GET /api/index/info`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexInfo {
    pub total_vectors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_result_from_wire() {
        let body = serde_json::json!({
            "results": [{
                "score": 0.82,
                "metadata": {
                    "s3_file_name": "socks.mp4",
                    "s3_public_url": "https://cdn.example.com/socks.mp4",
                    "s3_file_path": "videos/",
                    "file_type": "video",
                    "start_offset_sec": 12,
                    "end_offset_sec": 18,
                    "interval_sec": 6,
                    "segment": 3
                }
            }]
        });

        let items = serde_json::from_value::<SearchResponse>(body)
            .unwrap()
            .into_items();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert!(item.is_video());
        assert_eq!(item.start_offset_sec, 12.0);
        assert_eq!(item.file_name, "socks.mp4");
        assert_eq!(item.clip_url(), "https://cdn.example.com/socks.mp4#t=12,18");
    }

    #[test]
    fn test_null_metadata_defaults() {
        let body = serde_json::json!({
            "results": [{
                "score": 0.5,
                "metadata": {
                    "s3_file_name": "a.png",
                    "s3_public_url": "https://cdn.example.com/a.png",
                    "s3_file_path": null,
                    "file_type": null,
                    "segment": null,
                    "start_offset_sec": null,
                    "end_offset_sec": null,
                    "interval_sec": null
                }
            }]
        });

        let items = serde_json::from_value::<SearchResponse>(body)
            .unwrap()
            .into_items();

        assert_eq!(items[0].media_type, MediaType::Image);
        assert_eq!(items[0].file_path, "");
        assert_eq!(items[0].start_offset_sec, 0.0);
        assert_eq!(items[0].clip_url(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_missing_results_is_empty() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.into_items().is_empty());
    }
}
