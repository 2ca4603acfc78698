//! Repository file contents

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use github_models::{ContentFile, PutContentRequest, PutContentResponse};

use crate::errors::LauncherError;
use crate::github::client::GitHubClient;

/// A text file read from a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Blob SHA, required to update the file
    pub sha: String,
    pub text: String,
}

impl GitHubClient {
    /// Read a text file on `branch`, `None` when it does not exist
    pub async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<RemoteFile>, LauncherError> {
        let url_path = format!(
            "/repos/{}/{}/contents/{}?ref={}",
            owner,
            repo,
            path,
            encode_query(branch)
        );
        let file: Option<ContentFile> = self.get(&url_path).await?;
        file.map(decode_file).transpose()
    }

    /// Create (`sha` unset) or replace (`sha` of the current blob) a file on `branch`
    #[allow(clippy::too_many_arguments)]
    pub async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
        message: &str,
        text: &str,
        sha: Option<&str>,
    ) -> Result<(), LauncherError> {
        let url_path = format!("/repos/{}/{}/contents/{}", owner, repo, path);
        let body = PutContentRequest {
            message: message.to_string(),
            content: STANDARD.encode(text.as_bytes()),
            branch: branch.to_string(),
            sha: sha.map(str::to_string),
        };
        let _: PutContentResponse = self.put(&url_path, &body).await?.ok_or_else(|| {
            LauncherError::NotFound(format!("Branch {} of {}/{} not found", branch, owner, repo))
        })?;
        Ok(())
    }
}

fn decode_file(file: ContentFile) -> Result<RemoteFile, LauncherError> {
    let encoded: String = file
        .content
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let text = match file.encoding.as_deref() {
        Some("base64") | None => {
            let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                LauncherError::Internal(format!("Invalid base64 in {}: {}", file.path, e))
            })?;
            String::from_utf8(bytes).map_err(|_| {
                LauncherError::ValidationError(format!("{} is not a UTF-8 text file", file.path))
            })?
        }
        Some(other) => {
            return Err(LauncherError::Internal(format!(
                "Unsupported encoding '{}' for {}",
                other, file.path
            )))
        }
    };

    Ok(RemoteFile {
        sha: file.sha,
        text,
    })
}

pub(crate) fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
