use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Movie,
    Episode,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Episode => "episode",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for ItemType {
    fn type_info() -> <sqlx::Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ItemType {
    fn decode(
        value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match raw {
            "movie" => Ok(ItemType::Movie),
            "episode" => Ok(ItemType::Episode),
            other => Err(format!("unknown item_type {other}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ItemType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    Download,
    Stream,
}

impl DownloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadType::Download => "download",
            DownloadType::Stream => "stream",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for DownloadType {
    fn type_info() -> <sqlx::Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DownloadType {
    fn decode(
        value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match raw {
            "download" => Ok(DownloadType::Download),
            "stream" => Ok(DownloadType::Stream),
            other => Err(format!("unknown download_type {other}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DownloadType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Connecting,
    Downloading,
    Complete,
    Failed,
    Removed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Connecting => "connecting",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Complete => "complete",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Removed => "removed",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for DownloadStatus {
    fn type_info() -> <sqlx::Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DownloadStatus {
    fn decode(
        value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match raw {
            "queued" => Ok(DownloadStatus::Queued),
            "connecting" => Ok(DownloadStatus::Connecting),
            "downloading" => Ok(DownloadStatus::Downloading),
            "complete" => Ok(DownloadStatus::Complete),
            "failed" => Ok(DownloadStatus::Failed),
            "removed" => Ok(DownloadStatus::Removed),
            other => Err(format!("unknown download status {other}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DownloadStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Download {
    pub id: String,
    pub item_type: ItemType,
    pub quality: String,
    pub download_type: DownloadType,
    pub status: DownloadStatus,
    pub progress: f64,
    pub speed: Option<i64>,
    pub time_remaining: Option<i64>,
    pub num_peers: Option<i64>,
    pub updated_at: i64,
}

impl Download {
    pub fn new(id: impl Into<String>, item_type: ItemType, quality: impl Into<String>, download_type: DownloadType) -> Self {
        Self {
            id: id.into(),
            item_type,
            quality: quality.into(),
            download_type,
            status: DownloadStatus::Queued,
            progress: 0.0,
            speed: None,
            time_remaining: None,
            num_peers: None,
            updated_at: super::now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentOption {
    pub quality: String,
    pub url: String,
    pub seeds: i64,
    pub peers: i64,
    pub size: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub torrents: String,
    pub download_status: Option<String>,
    pub downloading: bool,
    pub download_complete: bool,
    pub downloaded_on: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Episode {
    pub id: String,
    pub show_title: String,
    pub title: String,
    pub torrents: String,
    pub download_status: Option<String>,
    pub downloading: bool,
    pub download_complete: bool,
    pub downloaded_on: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Movie(Movie),
    Episode(Episode),
}

/// Patch applied to a parent `Movie`/`Episode`'s embedded `download` sub-document.
#[derive(Debug, Clone, Default)]
pub struct DownloadSubDocPatch {
    pub download_status: Option<DownloadStatus>,
    pub downloading: Option<bool>,
    pub download_complete: Option<bool>,
    pub downloaded_on: Option<i64>,
}
