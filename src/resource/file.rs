use super::{ResourceClient, ResourceError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const FILE_SCHEME: &str = "file://";

/// Reads `file://` urls from the local filesystem. Headers are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileClient;

fn local_path(url: &str) -> Result<&str, ResourceError> {
    url.strip_prefix(FILE_SCHEME)
        .ok_or_else(|| ResourceError::Unsupported(url.to_string()))
}

#[async_trait]
impl ResourceClient for FileClient {
    async fn get(
        &self,
        url: &str,
        _headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        Ok(tokio::fs::read(local_path(url)?).await?)
    }

    async fn get_range(
        &self,
        url: &str,
        offset: u64,
        length: usize,
        _headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        let mut file = tokio::fs::File::open(local_path(url)?).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut bytes = vec![0; length];
        file.read_exact(&mut bytes).await?;
        Ok(bytes)
    }
}
