//! FirestoreDocumentStore - Firestore REST v1 を Document Store として使う
//!
//! - `get_document` → `GET  .../documents/{collection}/{key}`（404 は NotFound）
//! - `get_fields`   → 同じ GET に `mask.fieldPaths={field}` を付けて、必要なフィールドだけ読む
//! - `merge_update` → `PATCH .../documents/{collection}/{key}?updateMask.fieldPaths={field}&currentDocument.exists=true`
//!
//! `updateMask` に含めたフィールドだけが書き換わるので、他のフィールドは残ります。
//! `currentDocument.exists=true` により、消えたドキュメントを PATCH で作り直すことはありません。

mod auth;
mod wire;

pub use self::auth::{DATASTORE_SCOPE, FirestoreAuth};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::{Document, FieldValue, Key};
use crate::ports::{DocumentStore, DocumentStoreError};

use self::auth::TokenSource;
use self::wire::{ErrorBody, WireDocument, WireValue, WritePatch, decode_fields, quote_field_path};

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";

/// Firestore の接続設定
#[derive(Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    /// `https://firestore.googleapis.com/v1` またはエミュレータの `http://host:port/v1`
    pub base_url: String,
    pub auth: FirestoreAuth,
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// 本番の Firestore（token は Application Default Credentials から取得）
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: FirestoreAuth::ApplicationDefault,
            timeout: Duration::from_secs(30),
        }
    }

    /// エミュレータ（`FIRESTORE_EMULATOR_HOST` の値を渡す）
    pub fn emulator(project_id: impl Into<String>, host: &str) -> Self {
        Self {
            base_url: format!("http://{}/v1", host.trim_end_matches('/')),
            auth: FirestoreAuth::Emulator,
            ..Self::new(project_id)
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_auth(mut self, auth: FirestoreAuth) -> Self {
        self.auth = auth;
        self
    }

    fn database_path(&self) -> DatabasePath {
        DatabasePath {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            project_id: self.project_id.clone(),
            database: self.database.clone(),
        }
    }
}

/// `{base}/projects/{p}/databases/{db}` までの固定部分
#[derive(Debug, Clone)]
struct DatabasePath {
    base_url: String,
    project_id: String,
    database: String,
}

impl DatabasePath {
    /// `.../documents/{collection}/{key}` の URL（各セグメントは percent-encode）
    fn document_url(&self, collection: &str, key: &Key) -> String {
        let collection_path = collection
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/projects/{}/databases/{}/documents/{}/{}",
            self.base_url,
            urlencoding::encode(&self.project_id),
            urlencoding::encode(&self.database),
            collection_path,
            urlencoding::encode(key.as_str()),
        )
    }

    /// GET の URL。`fields` が空でなければ read mask を付ける
    fn get_url(&self, collection: &str, key: &Key, fields: &[&str]) -> String {
        let url = self.document_url(collection, key);
        if fields.is_empty() {
            return url;
        }
        let mask = fields
            .iter()
            .map(|f| {
                format!(
                    "mask.fieldPaths={}",
                    urlencoding::encode(&quote_field_path(f))
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{url}?{mask}")
    }

    fn patch_url(&self, collection: &str, key: &Key, field: &str) -> String {
        format!(
            "{}?updateMask.fieldPaths={}&currentDocument.exists=true",
            self.document_url(collection, key),
            urlencoding::encode(&quote_field_path(field)),
        )
    }
}

/// FirestoreDocumentStore は本番用の Document Store
pub struct FirestoreDocumentStore {
    path: DatabasePath,
    http: reqwest::Client,
    tokens: TokenSource,
}

impl FirestoreDocumentStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, DocumentStoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DocumentStoreError::Store(format!("http client: {e}")))?;
        Ok(Self {
            path: config.database_path(),
            http,
            tokens: TokenSource::new(config.auth),
        })
    }

    async fn error_from(response: reqwest::Response, action: &str) -> DocumentStoreError {
        let status = response.status();
        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => format!("{} {}", body.error.status, body.error.message),
            Err(_) => String::from("(no error body)"),
        };
        DocumentStoreError::Store(format!("{action} returned {status}: {}", detail.trim()))
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &Key,
        fields: &[&str],
    ) -> Result<Document, DocumentStoreError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(self.path.get_url(collection, key, fields))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DocumentStoreError::Store(format!("get {collection}/{key}: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DocumentStoreError::NotFound {
                collection: collection.to_string(),
                key: key.clone(),
            }),
            status if status.is_success() => {
                let doc: WireDocument = response.json().await.map_err(|e| {
                    DocumentStoreError::Store(format!("decode {collection}/{key}: {e}"))
                })?;
                let fields = decode_fields(doc.fields).map_err(|e| {
                    DocumentStoreError::Store(format!("decode {collection}/{key}: {e}"))
                })?;
                Ok(Document {
                    key: key.clone(),
                    fields,
                })
            }
            _ => Err(Self::error_from(response, &format!("get {collection}/{key}")).await),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        key: &Key,
    ) -> Result<Document, DocumentStoreError> {
        self.fetch(collection, key, &[]).await
    }

    async fn get_fields(
        &self,
        collection: &str,
        key: &Key,
        fields: &[&str],
    ) -> Result<Document, DocumentStoreError> {
        self.fetch(collection, key, fields).await
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &Key,
        field: &str,
        value: FieldValue,
    ) -> Result<(), DocumentStoreError> {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), WireValue::from_field(&value));

        let token = self.tokens.token().await?;
        let response = self
            .http
            .patch(self.path.patch_url(collection, key, field))
            .bearer_auth(token)
            .json(&WritePatch { fields })
            .send()
            .await
            .map_err(|e| DocumentStoreError::Store(format!("patch {collection}/{key}: {e}")))?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(response, &format!("patch {collection}/{key}")).await)
    }
}
