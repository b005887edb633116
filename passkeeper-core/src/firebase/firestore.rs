use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::http::{kebab_case, read_json, ApiError, Request};
use super::{FirebaseConfig, FirebaseIdentity};
use crate::{
    format_timestamp, parse_timestamp, CredentialRecord, DocumentStore, PassKeeperError,
    PassKeeperResult, PinState, RecordDraft, RecordUpdate, Timestamp,
};

/// Collection holding one document per credential.
const COLLECTION: &str = "passwords";

mod field {
    pub const OWNER: &str = "userId";
    pub const PURPOSE: &str = "purpose";
    pub const ACCOUNT: &str = "account";
    pub const SECRET: &str = "password";
    pub const IS_PINNED: &str = "isPinned";
    pub const PINNED_AT: &str = "pinnedAt";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// A Firestore typed value, in its REST JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Value {
    StringValue(String),
    BooleanValue(bool),
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    NullValue(()),
}

impl Value {
    fn string(value: &str) -> Self {
        Self::StringValue(value.to_string())
    }

    /// Times are written as ISO strings, matching what the mobile app stores.
    fn time(timestamp: Timestamp) -> PassKeeperResult<Self> {
        format_timestamp(timestamp)
            .map(Self::StringValue)
            .ok_or_else(|| PassKeeperError::Serialization {
                error: format!("timestamp {timestamp} out of range"),
            })
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(value) => Some(value),
            _ => None,
        }
    }

    const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::BooleanValue(value) => Some(*value),
            _ => None,
        }
    }

    /// Accepts ISO strings, native timestamps and epoch milliseconds.
    fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::StringValue(value) | Self::TimestampValue(value) => parse_timestamp(value),
            Self::IntegerValue(value) => value.parse().ok(),
            _ => None,
        }
    }
}

type Fields = BTreeMap<String, Value>;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default)]
    fields: Fields,
}

impl Document {
    /// Last segment of the resource name.
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn into_record(self) -> CredentialRecord {
        let id = self.id().to_string();
        let fields = self.fields;
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let time = |key: &str| fields.get(key).and_then(Value::as_timestamp);

        let created_at = time(field::CREATED_AT).unwrap_or_else(|| {
            log::warn!("document {id} has no readable {}", field::CREATED_AT);
            0
        });
        CredentialRecord {
            owner_id: text(field::OWNER),
            purpose: text(field::PURPOSE),
            account: text(field::ACCOUNT),
            secret: text(field::SECRET),
            is_pinned: fields
                .get(field::IS_PINNED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            pinned_at: time(field::PINNED_AT),
            created_at,
            updated_at: time(field::UPDATED_AT).unwrap_or(created_at),
            id,
        }
    }
}

fn draft_fields(draft: &RecordDraft) -> PassKeeperResult<Fields> {
    let pinned_at = match draft.pinned_at {
        Some(at) => Value::time(at)?,
        None => Value::NullValue(()),
    };
    Ok(BTreeMap::from([
        (field::OWNER.to_string(), Value::string(&draft.owner_id)),
        (field::PURPOSE.to_string(), Value::string(&draft.purpose)),
        (field::ACCOUNT.to_string(), Value::string(&draft.account)),
        (field::SECRET.to_string(), Value::string(&draft.secret)),
        (field::IS_PINNED.to_string(), Value::BooleanValue(draft.is_pinned)),
        (field::PINNED_AT.to_string(), pinned_at),
        (field::CREATED_AT.to_string(), Value::time(draft.created_at)?),
        (field::UPDATED_AT.to_string(), Value::time(draft.updated_at)?),
    ]))
}

fn update_fields(update: &RecordUpdate) -> PassKeeperResult<Fields> {
    let mut fields = Fields::new();
    for (key, value) in [
        (field::PURPOSE, &update.purpose),
        (field::ACCOUNT, &update.account),
        (field::SECRET, &update.secret),
    ] {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::string(value));
        }
    }
    match update.pin {
        Some(PinState::Pinned { at }) => {
            fields.insert(field::IS_PINNED.to_string(), Value::BooleanValue(true));
            fields.insert(field::PINNED_AT.to_string(), Value::time(at)?);
        }
        Some(PinState::Unpinned) => {
            fields.insert(field::IS_PINNED.to_string(), Value::BooleanValue(false));
            fields.insert(field::PINNED_AT.to_string(), Value::NullValue(()));
        }
        None => {}
    }
    fields.insert(field::UPDATED_AT.to_string(), Value::time(update.updated_at)?);
    Ok(fields)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    document: Option<Document>,
}

fn reject(error: ApiError) -> PassKeeperError {
    let code = if error.status.is_empty() {
        "unknown".to_string()
    } else {
        kebab_case(&error.status)
    };
    PassKeeperError::store(code, error.message)
}

/// Cloud Firestore over the v1 REST API, authorized with the ID token of a
/// [`FirebaseIdentity`] session.
#[derive(uniffi::Object)]
pub struct FirestoreStore {
    config: FirebaseConfig,
    identity: Arc<FirebaseIdentity>,
    request: Request,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("project_id", &self.config.project_id)
            .finish_non_exhaustive()
    }
}

impl FirestoreStore {
    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> PassKeeperResult<reqwest::Response> {
        let id_token = self.identity.id_token().await?;
        self.request
            .handle(builder.bearer_auth(id_token.expose_secret()))
            .await
    }

    fn document_url(&self, id: &str) -> String {
        self.config.firestore_url(&format!("/{COLLECTION}/{id}"))
    }
}

#[uniffi::export]
impl FirestoreStore {
    /// Creates a store for the project in `config`, authorized by `identity`.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(config: FirebaseConfig, identity: Arc<FirebaseIdentity>) -> Self {
        Self {
            config,
            identity,
            request: Request::new(),
        }
    }

    /// This store as a [`DocumentStore`] for [`crate::CredentialVault`].
    #[must_use]
    pub fn as_document_store(self: Arc<Self>) -> Arc<dyn DocumentStore> {
        self
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn create(&self, draft: RecordDraft) -> PassKeeperResult<String> {
        let body = Document {
            name: String::new(),
            fields: draft_fields(&draft)?,
        };
        let url = self.config.firestore_url(&format!("/{COLLECTION}"));
        let response = self.authorized(self.request.post(&url).json(&body)).await?;
        let created: Document = read_json(response, reject).await?;
        Ok(created.id().to_string())
    }

    async fn query_by_owner(&self, owner_id: String) -> PassKeeperResult<Vec<CredentialRecord>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": COLLECTION }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field::OWNER },
                        "op": "EQUAL",
                        "value": Value::string(&owner_id),
                    }
                }
            }
        });
        let url = format!("{}:runQuery", self.config.firestore_url(""));
        let response = self.authorized(self.request.post(&url).json(&body)).await?;
        let results: Vec<QueryResult> = read_json(response, reject).await?;
        Ok(results
            .into_iter()
            .filter_map(|result| result.document)
            .map(Document::into_record)
            .collect())
    }

    async fn update(&self, id: String, update: RecordUpdate) -> PassKeeperResult<()> {
        let fields = update_fields(&update)?;
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let builder = self
            .request
            .patch(&self.document_url(&id))
            .query(&query)
            .json(&json!({ "fields": &fields }));
        let response = self.authorized(builder).await?;
        let _: Document = read_json(response, reject).await?;
        Ok(())
    }

    async fn delete(&self, id: String) -> PassKeeperResult<()> {
        let response = self
            .authorized(self.request.delete(&self.document_url(&id)))
            .await?;
        let _: serde_json::Value = read_json(response, reject).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdentityProvider;
    use mockito::Matcher;

    const DOCUMENTS: &str = "/v1/projects/demo/databases/\\(default\\)/documents";

    async fn signed_in(server: &mut mockito::Server) -> Arc<FirebaseIdentity> {
        server
            .mock("POST", Matcher::Regex("^/v1/accounts:signInWithPassword".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "localId": "uid-1",
                    "email": "mei@example.com",
                    "idToken": "id-token-1",
                    "refreshToken": "refresh-1",
                    "expiresIn": "3600"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let identity = Arc::new(FirebaseIdentity::new(FirebaseConfig::for_mock_server(
            &server.url(),
        )));
        identity
            .sign_in("mei@example.com".to_string(), "secret1".to_string())
            .await
            .unwrap();
        identity
    }

    fn store(server: &mockito::Server, identity: Arc<FirebaseIdentity>) -> FirestoreStore {
        FirestoreStore::new(FirebaseConfig::for_mock_server(&server.url()), identity)
    }

    fn stored_document(id: &str, pinned_at: serde_json::Value) -> serde_json::Value {
        json!({
            "name": format!("projects/demo/databases/(default)/documents/passwords/{id}"),
            "fields": {
                "userId": { "stringValue": "uid-1" },
                "purpose": { "stringValue": "mail" },
                "account": { "stringValue": "mei@example.com" },
                "password": { "stringValue": "hunter2" },
                "isPinned": { "booleanValue": !pinned_at.is_null() },
                "pinnedAt": if pinned_at.is_null() { json!({ "nullValue": null }) } else { pinned_at },
                "createdAt": { "stringValue": "2024-05-01T08:00:00.000Z" },
                "updatedAt": { "stringValue": "2024-05-01T08:00:00.000Z" }
            },
            "createTime": "2024-05-01T08:00:00.100000Z",
            "updateTime": "2024-05-01T08:00:00.100000Z"
        })
    }

    #[tokio::test]
    async fn test_create_posts_all_fields() {
        let mut server = mockito::Server::new_async().await;
        let identity = signed_in(&mut server).await;
        let mock = server
            .mock("POST", Matcher::Regex(format!("^{DOCUMENTS}/passwords$")))
            .match_header("authorization", "Bearer id-token-1")
            .match_body(Matcher::Json(json!({
                "fields": {
                    "userId": { "stringValue": "uid-1" },
                    "purpose": { "stringValue": "mail" },
                    "account": { "stringValue": "mei@example.com" },
                    "password": { "stringValue": "hunter2" },
                    "isPinned": { "booleanValue": false },
                    "pinnedAt": { "nullValue": null },
                    "createdAt": { "stringValue": "2024-05-01T08:00:00.000Z" },
                    "updatedAt": { "stringValue": "2024-05-01T08:00:00.000Z" }
                }
            })))
            .with_status(200)
            .with_body(stored_document("abc123", serde_json::Value::Null).to_string())
            .create_async()
            .await;

        let draft = RecordDraft {
            owner_id: "uid-1".to_string(),
            purpose: "mail".to_string(),
            account: "mei@example.com".to_string(),
            secret: "hunter2".to_string(),
            is_pinned: false,
            pinned_at: None,
            created_at: 1_714_550_400_000,
            updated_at: 1_714_550_400_000,
        };
        let id = store(&server, identity).create(draft).await.unwrap();
        mock.assert_async().await;
        assert_eq!(id, "abc123");
    }

    #[tokio::test]
    async fn test_query_filters_by_owner_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let identity = signed_in(&mut server).await;
        let mock = server
            .mock("POST", Matcher::Regex(format!("^{DOCUMENTS}:runQuery")))
            .match_body(Matcher::PartialJson(json!({
                "structuredQuery": {
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "userId" },
                            "op": "EQUAL",
                            "value": { "stringValue": "uid-1" }
                        }
                    }
                }
            })))
            .with_status(200)
            .with_body(
                json!([
                    { "document": stored_document("a", serde_json::Value::Null), "readTime": "2024-05-02T00:00:00Z" },
                    {
                        "document": stored_document("b", json!({ "stringValue": "2024-05-01T09:00:00.000Z" })),
                        "readTime": "2024-05-02T00:00:00Z"
                    }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let records = store(&server, identity)
            .query_by_owner("uid-1".to_string())
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].secret, "hunter2");
        assert!(!records[0].is_pinned);
        assert_eq!(records[0].pinned_at, None);
        assert_eq!(records[0].created_at, 1_714_550_400_000);
        assert!(records[1].is_pinned);
        assert_eq!(records[1].pinned_at, Some(1_714_554_000_000));
        assert!(records.iter().all(CredentialRecord::pin_invariant_holds));
    }

    #[tokio::test]
    async fn test_empty_query_result() {
        let mut server = mockito::Server::new_async().await;
        let identity = signed_in(&mut server).await;
        server
            .mock("POST", Matcher::Regex(format!("^{DOCUMENTS}:runQuery")))
            .with_status(200)
            .with_body(json!([{ "readTime": "2024-05-02T00:00:00Z" }]).to_string())
            .create_async()
            .await;

        let records = store(&server, identity)
            .query_by_owner("uid-1".to_string())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unpin_clears_pinned_at_with_field_mask() {
        let mut server = mockito::Server::new_async().await;
        let identity = signed_in(&mut server).await;
        let mock = server
            .mock("PATCH", Matcher::Regex(format!("^{DOCUMENTS}/passwords/b")))
            // The mask repeats one key, so match the raw query string.
            .match_query(Matcher::AllOf(
                ["isPinned", "pinnedAt", "updatedAt"]
                    .into_iter()
                    .map(|field| {
                        Matcher::Regex(format!(r"(^|&)updateMask\.fieldPaths={field}(&|$)"))
                    })
                    .chain([Matcher::Regex(
                        r"(^|&)currentDocument\.exists=true(&|$)".to_string(),
                    )])
                    .collect(),
            ))
            .match_body(Matcher::Json(json!({
                "fields": {
                    "isPinned": { "booleanValue": false },
                    "pinnedAt": { "nullValue": null },
                    "updatedAt": { "stringValue": "2024-05-01T08:00:00.000Z" }
                }
            })))
            .with_status(200)
            .with_body(stored_document("b", serde_json::Value::Null).to_string())
            .create_async()
            .await;

        store(&server, identity)
            .update("b".to_string(), RecordUpdate::toggle_pin(true, 1_714_550_400_000))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_store_status_becomes_kebab_code() {
        let mut server = mockito::Server::new_async().await;
        let identity = signed_in(&mut server).await;
        server
            .mock("DELETE", Matcher::Regex(format!("^{DOCUMENTS}/passwords/x")))
            .with_status(403)
            .with_body(
                json!({
                    "error": {
                        "code": 403,
                        "message": "Missing or insufficient permissions.",
                        "status": "PERMISSION_DENIED"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = store(&server, identity)
            .delete("x".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PassKeeperError::Store { code, message }
                if code == "permission-denied" && message == "Missing or insufficient permissions."
        ));
    }

    #[tokio::test]
    async fn test_requires_session() {
        let server = mockito::Server::new_async().await;
        let identity = Arc::new(FirebaseIdentity::new(FirebaseConfig::for_mock_server(
            &server.url(),
        )));
        let err = store(&server, identity)
            .query_by_owner("uid-1".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PassKeeperError::NotSignedIn));
    }

    #[test]
    fn test_legacy_integer_timestamps_decode() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/demo/databases/(default)/documents/passwords/old",
            "fields": {
                "userId": { "stringValue": "uid-1" },
                "isPinned": { "booleanValue": true },
                "pinnedAt": { "integerValue": "1714550400000" },
                "createdAt": { "timestampValue": "2024-05-01T08:00:00Z" }
            }
        }))
        .unwrap();
        let record = document.into_record();
        assert_eq!(record.id, "old");
        assert_eq!(record.pinned_at, Some(1_714_550_400_000));
        assert_eq!(record.updated_at, record.created_at);
        assert_eq!(record.purpose, "");
    }
}
