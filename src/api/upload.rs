//! Product image upload through a presigned URL (/upload-url)

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::client::StoreClient;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTicket {
    upload_url: String,
    public_url: String,
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Content type for an image file name, if it is one the backend accepts.
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    match extension(file_name).as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Apply the backend's extension and MIME checks before asking for a URL.
pub fn validate_image(file_name: &str, content_type: &str) -> Result<()> {
    let ext = extension(file_name);
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "File type '.{}' is not allowed. Use: jpg, png, webp, or gif.",
            ext
        );
    }
    if !ALLOWED_MIME_TYPES.contains(&content_type.to_lowercase().as_str()) {
        bail!("MIME type '{}' is not allowed.", content_type);
    }
    Ok(())
}

/// Upload an image file and print the public URL to store on a product (admin)
pub async fn upload_image(client: &StoreClient, path: &Path, content_type: Option<&str>) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Image path has no usable file name")?;
    let content_type = match content_type {
        Some(ct) => ct,
        None => guess_content_type(file_name)
            .with_context(|| format!("Cannot tell the image type of {}", file_name))?,
    };
    validate_image(file_name, content_type)?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let body = serde_json::json!({ "fileName": file_name, "fileType": content_type });
    let ticket: UploadTicket = client.post("/upload-url", &body, true).await?;

    client.put_object(&ticket.upload_url, content_type, bytes).await?;

    println!("{}", ticket.public_url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("wallet.JPG"), Some("image/jpeg"));
        assert_eq!(guess_content_type("a.b.webp"), Some("image/webp"));
        assert_eq!(guess_content_type("notes.txt"), None);
        assert_eq!(guess_content_type("noext"), None);
    }

    #[test]
    fn test_validate_image() {
        assert!(validate_image("lamp.png", "image/png").is_ok());
        assert!(validate_image("lamp.PNG", "IMAGE/PNG").is_ok());

        let err = validate_image("lamp.svg", "image/svg+xml").unwrap_err();
        assert!(err.to_string().contains("'.svg' is not allowed"));

        let err = validate_image("lamp.png", "text/plain").unwrap_err();
        assert!(err.to_string().contains("MIME type 'text/plain'"));
    }
}
