//! Image resolution and download.
//!
//! Turns raw markup references into stored [`ImageRecord`]s: absolutize the
//! source URL, fetch the bytes, write them under the article's images
//! directory. Knows nothing about which strategy found a reference.

use std::path::Path;

use tracing::debug;
use url::Url;

use crate::models::ImageRecord;
use crate::scrapers::HttpClient;
use crate::storage;

use super::RawImageRef;

pub struct ImageResolver<'a> {
    client: &'a HttpClient,
}

impl<'a> ImageResolver<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    /// Resolve a markup `src` against the page URL.
    ///
    /// Protocol-relative references get `https:`, inline `data:` payloads
    /// are dropped, everything else joins against the page URL.
    pub fn absolutize(page_url: &str, src: &str) -> Option<String> {
        let src = src.trim();
        if src.is_empty() || src.starts_with("data:") {
            return None;
        }
        if let Some(rest) = src.strip_prefix("//") {
            return Some(format!("https://{}", rest));
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return Some(src.to_string());
        }
        let base = Url::parse(page_url).ok()?;
        base.join(src).ok().map(|u| u.to_string())
    }

    /// Download every new reference into `images_dir`, appending records.
    ///
    /// References whose absolutized URL already appears in `records` are
    /// skipped, and indices continue from the current record count so
    /// filenames never collide within one article. Returns error notes for
    /// references that could not be fetched or written.
    pub async fn download_into(
        &self,
        page_url: &str,
        refs: &[RawImageRef],
        images_dir: &Path,
        records: &mut Vec<ImageRecord>,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        if refs.is_empty() {
            return errors;
        }

        if let Err(e) = tokio::fs::create_dir_all(images_dir).await {
            errors.push(format!(
                "could not create images dir {}: {}",
                images_dir.display(),
                e
            ));
            return errors;
        }

        for image_ref in refs {
            let Some(source_url) = Self::absolutize(page_url, &image_ref.src) else {
                continue;
            };
            if records.iter().any(|r| r.source_url == source_url) {
                continue;
            }

            let index = records.len();
            let filename = storage::image_filename(index, &source_url);
            let local_path = images_dir.join(&filename);

            let bytes = match self.client.get_bytes(&source_url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    errors.push(format!("image download failed for {}: {}", source_url, e));
                    continue;
                }
            };
            if let Err(e) = tokio::fs::write(&local_path, &bytes).await {
                errors.push(format!(
                    "image write failed for {}: {}",
                    local_path.display(),
                    e
                ));
                continue;
            }

            debug!("Downloaded image {} ({} bytes)", filename, bytes.len());
            records.push(ImageRecord {
                source_url,
                local_path: Some(local_path),
                alt_text: image_ref.alt.clone(),
                caption: image_ref.caption.clone(),
                index,
                approx_position: image_ref.position,
                container_kind: image_ref.container.clone(),
                file_size: Some(bytes.len() as u64),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://blog.example.com/posts/2024/launch";

    #[test]
    fn test_absolutize_relative() {
        assert_eq!(
            ImageResolver::absolutize(PAGE, "/img/a.png"),
            Some("https://blog.example.com/img/a.png".to_string())
        );
        assert_eq!(
            ImageResolver::absolutize(PAGE, "hero.jpg"),
            Some("https://blog.example.com/posts/2024/hero.jpg".to_string())
        );
    }

    #[test]
    fn test_absolutize_protocol_relative() {
        assert_eq!(
            ImageResolver::absolutize(PAGE, "//cdn.example.com/a.png"),
            Some("https://cdn.example.com/a.png".to_string())
        );
    }

    #[test]
    fn test_absolutize_absolute_passthrough() {
        assert_eq!(
            ImageResolver::absolutize(PAGE, "http://other.example.com/b.gif"),
            Some("http://other.example.com/b.gif".to_string())
        );
    }

    #[test]
    fn test_absolutize_drops_data_uris() {
        assert_eq!(
            ImageResolver::absolutize(PAGE, "data:image/png;base64,iVBORw0KGgo="),
            None
        );
        assert_eq!(ImageResolver::absolutize(PAGE, "   "), None);
    }

    #[tokio::test]
    async fn test_download_skips_already_resolved_urls() {
        use crate::scrapers::DEFAULT_USER_AGENT;
        use std::time::Duration;
        use tempfile::tempdir;

        let client = HttpClient::new(DEFAULT_USER_AGENT, Duration::from_secs(1), Duration::ZERO);
        let resolver = ImageResolver::new(&client);
        let dir = tempdir().unwrap();

        // A and B were already resolved by the winning strategy.
        let mut records: Vec<ImageRecord> = ["a", "b"]
            .iter()
            .enumerate()
            .map(|(i, name)| ImageRecord {
                source_url: format!("http://127.0.0.1:9/{}.png", name),
                local_path: None,
                alt_text: String::new(),
                caption: String::new(),
                index: i,
                approx_position: i,
                container_kind: "div".to_string(),
                file_size: None,
            })
            .collect();

        let raw = |name: &str, pos: usize| RawImageRef {
            src: format!("http://127.0.0.1:9/{}.png", name),
            alt: String::new(),
            caption: String::new(),
            position: pos,
            container: "div".to_string(),
        };
        let refs = vec![raw("a", 0), raw("b", 1), raw("c", 2)];

        let errors = resolver
            .download_into(PAGE, &refs, dir.path(), &mut records)
            .await;

        // Only C was attempted; nothing listens there, so it errors.
        assert_eq!(records.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("c.png"));
    }
}
