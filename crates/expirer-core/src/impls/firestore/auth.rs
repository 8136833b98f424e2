//! Firestore へのリクエストに付ける bearer token
//!
//! # 取得元
//! - **Static**: `--access-token` で渡されたもの（`gcloud auth print-access-token` など）
//! - **ApplicationDefault**: `gcp_auth` による Application Default Credentials
//!   （`GOOGLE_APPLICATION_CREDENTIALS` の service account key、gcloud のユーザー認証、
//!   Cloud Run / GCE のメタデータサーバーの順に探す。token のキャッシュと更新も gcp_auth 任せ）
//! - **Emulator**: エミュレータは固定の `owner` を受け付ける

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::ports::DocumentStoreError;

/// Firestore のデータ読み書きに必要な OAuth scope
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// FirestoreAuth は token の取得方法
pub enum FirestoreAuth {
    Static(String),
    ApplicationDefault,
    Emulator,
}

impl std::fmt::Debug for FirestoreAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirestoreAuth::Static(_) => f.write_str("Static(<redacted>)"),
            FirestoreAuth::ApplicationDefault => f.write_str("ApplicationDefault"),
            FirestoreAuth::Emulator => f.write_str("Emulator"),
        }
    }
}

/// TokenSource は FirestoreAuth に従って token を返す
///
/// ADC の provider は最初の呼び出しで 1 回だけ探す（見つからなければ毎回エラー）。
pub(crate) struct TokenSource {
    auth: FirestoreAuth,
    provider: OnceCell<Arc<dyn gcp_auth::TokenProvider>>,
}

impl TokenSource {
    pub(crate) fn new(auth: FirestoreAuth) -> Self {
        Self {
            auth,
            provider: OnceCell::new(),
        }
    }

    pub(crate) async fn token(&self) -> Result<String, DocumentStoreError> {
        match &self.auth {
            FirestoreAuth::Static(token) => Ok(token.clone()),
            FirestoreAuth::Emulator => Ok("owner".to_string()),
            FirestoreAuth::ApplicationDefault => {
                let provider = self
                    .provider
                    .get_or_try_init(|| async {
                        let provider = gcp_auth::provider().await?;
                        tracing::debug!("resolved application default credentials");
                        Ok::<_, gcp_auth::Error>(provider)
                    })
                    .await
                    .map_err(|e| DocumentStoreError::Store(format!("credentials: {e}")))?;

                let token = provider
                    .token(&[DATASTORE_SCOPE])
                    .await
                    .map_err(|e| DocumentStoreError::Store(format!("access token: {e}")))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}
