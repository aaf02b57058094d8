use std::path::Path;

use chrono::Utc;
use log::{error, warn};
use serde_json::Value;

use crate::app::config::CloudinaryConfig;

/// Adapter for the remote image store (Cloudinary-compatible API).
///
/// Uploads push a local temp file to a fixed folder and hand back the durable
/// `secure_url`; the temp file is removed afterwards whether or not the
/// upload succeeded. Deletions are best-effort: failures are logged and never
/// propagated, a broken cleanup must not block the entity mutation it rides
/// along with.
#[derive(Clone)]
pub struct MediaStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

/// Derives the storage public id from a delivery URL: the part after
/// `/upload/`, minus the `v<digits>/` version segment and the file extension.
/// Returns `None` for URLs that never came from the store (for example the
/// default placeholders), which deletion then skips.
pub fn extract_public_id(url: &str) -> Option<String> {
    let after = url.split("/upload/").nth(1)?;

    let rest = match after.split_once('/') {
        Some((first, tail))
            if first.len() > 1
                && first.starts_with('v')
                && first[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            tail
        }
        _ => after,
    };

    let public_id = match rest.rsplit_once('.') {
        Some((head, _)) => head,
        None => rest,
    };

    if public_id.is_empty() {
        None
    } else {
        Some(public_id.to_string())
    }
}

impl MediaStore {
    pub fn new(config: CloudinaryConfig) -> MediaStore {
        MediaStore {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// SHA-256 request signature: parameters sorted by name, joined as
    /// `k=v&...`, with the api secret appended.
    fn signature(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort();

        let joined = sorted
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        sha256::digest(format!("{}{}", joined, self.config.api_secret))
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{}",
            self.config.cloud_name, action
        )
    }

    /// Pushes a local temp file to the store and returns its durable URL.
    /// The temp file is always removed. Returns `None` on any failure, the
    /// caller decides whether that is fatal.
    pub async fn upload(&self, local_path: &Path) -> Option<String> {
        let result = self.try_upload(local_path).await;

        if let Err(err) = std::fs::remove_file(local_path) {
            warn!("failed to remove temp upload {:?}: {}", local_path, err);
        }

        match result {
            Ok(url) => Some(url),
            Err(msg) => {
                error!("image upload failed: {}", msg);
                None
            }
        }
    }

    async fn try_upload(&self, local_path: &Path) -> Result<String, String> {
        let bytes = std::fs::read(local_path).map_err(|err| err.to_string())?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.signature(&[("folder", &self.config.folder), ("timestamp", &timestamp)]);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let resp = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("remote store returned {}", resp.status()));
        }

        let body: Value = resp.json().await.map_err(|err| err.to_string())?;
        body.get("secure_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "upload response missing secure_url".to_string())
    }

    /// Requests deletion of a previously stored image. Swallows every
    /// failure, logging only.
    pub async fn delete(&self, url: &str) {
        let public_id = match extract_public_id(url) {
            Some(public_id) => public_id,
            None => return,
        };

        let timestamp = Utc::now().timestamp().to_string();
        let signature =
            self.signature(&[("public_id", &public_id), ("timestamp", &timestamp)]);

        let params = [
            ("public_id", public_id.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        match self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
        {
            Ok(resp) if !resp.status().is_success() => {
                warn!(
                    "image delete for {} returned {}",
                    public_id,
                    resp.status()
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!("image delete for {} failed: {}", public_id, err);
            }
        }
    }
}
