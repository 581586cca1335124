use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, json};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{
        CheckedProgressRow, IssueEntity, MembershipEntity, ProgressEntity, RoomEntity,
        ScriptEntity, ScriptLineEntity, UserEntity,
    },
    storage::StorageResult,
    store::Store,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchDocument, FindResponse, KIND_ISSUE, KIND_LINE, KIND_MEMBERSHIP,
        KIND_PROGRESS, KIND_ROOM, KIND_SCRIPT, KIND_USER, issue_doc_id, line_doc_id,
        membership_doc_id, progress_doc_id, room_doc_id, script_doc_id, user_doc_id,
    },
};

const MAX_WRITE_ATTEMPTS: u32 = 3;
const FIND_LIMIT: usize = 10_000;

#[derive(Clone)]
pub struct CouchStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Write a document, returning `false` when CouchDB reports a revision conflict.
    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<bool>
    where
        T: Serialize,
    {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: document.id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: document.id.clone(),
                status: other,
            }),
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<bool> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Run a Mango query and decode every returned document.
    async fn find_documents<T>(&self, selector: Value) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        const FIND: &str = "_find";
        let response = self
            .request(Method::POST, FIND)
            .json(&json!({ "selector": selector, "limit": FIND_LIMIT }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: FIND.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let payload =
            response
                .json::<FindResponse>()
                .await
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: FIND.to_string(),
                    source,
                })?;

        payload
            .docs
            .into_iter()
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: FIND.to_string(),
                    source,
                })
            })
            .collect()
    }

    /// Fetch several documents by id in one round-trip, skipping missing ones.
    async fn fetch_documents<T>(&self, doc_ids: Vec<String>) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .request(Method::POST, ALL_DOCS)
            .query(&[("include_docs", "true")])
            .json(&json!({ "keys": doc_ids }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc.filter(|doc| !doc.is_null()) {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Insert or replace a document, retrying when a concurrent writer bumped the revision.
    async fn upsert<T>(&self, doc_id: String, kind: &str, body: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let rev = self
                .get_document::<T>(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let document = CouchDocument::new(doc_id.clone(), kind, body.clone(), rev);
            if self.put_document(&document).await? {
                return Ok(());
            }
            debug!(doc_id = %doc_id, "revision conflict on upsert; retrying");
        }

        Err(CouchDaoError::Conflict {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Read-modify-write an existing document.
    ///
    /// `apply` returns whether the body changed; unchanged documents are not written back.
    /// Returns the document body as persisted, or `None` when it does not exist.
    async fn modify<T, F>(&self, doc_id: String, mut apply: F) -> CouchResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> bool,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(mut document) = self.get_document::<T>(&doc_id).await? else {
                return Ok(None);
            };
            if !apply(&mut document.body) {
                return Ok(Some(document.body));
            }
            if self.put_document(&document).await? {
                return Ok(Some(document.body));
            }
            debug!(doc_id = %doc_id, "revision conflict on update; retrying");
        }

        Err(CouchDaoError::Conflict {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn script_line_ids(&self, script_id: Uuid) -> CouchResult<Vec<Uuid>> {
        Ok(self
            .get_document::<ScriptEntity>(&script_doc_id(script_id))
            .await?
            .map(|doc| doc.body.lines.iter().map(|line| line.id).collect())
            .unwrap_or_default())
    }
}

impl Store for CouchStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(user_doc_id(user.id), KIND_USER, user)
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.get_document::<UserEntity>(&user_doc_id(id)).await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn insert_script(&self, script: ScriptEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for line in &script.lines {
                store
                    .upsert(line_doc_id(line.id), KIND_LINE, line.clone())
                    .await?;
            }
            store
                .upsert(script_doc_id(script.id), KIND_SCRIPT, script)
                .await
                .map_err(Into::into)
        })
    }

    fn find_script(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScriptEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<ScriptEntity>(&script_doc_id(id))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn find_script_line(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScriptLineEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<ScriptLineEntity>(&line_doc_id(id))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(room_doc_id(room.id), KIND_ROOM, room)
                .await
                .map_err(Into::into)
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.get_document::<RoomEntity>(&room_doc_id(id)).await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn upsert_membership(
        &self,
        membership: MembershipEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = membership_doc_id(membership.room_id, membership.user_id);
            store
                .upsert(doc_id, KIND_MEMBERSHIP, membership)
                .await
                .map_err(Into::into)
        })
    }

    fn find_membership(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<MembershipEntity>(&membership_doc_id(room_id, user_id))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn list_user_memberships(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .find_documents::<MembershipEntity>(
                    json!({ "kind": KIND_MEMBERSHIP, "user_id": user_id }),
                )
                .await?;
            Ok(docs.into_iter().map(|doc| doc.body).collect())
        })
    }

    fn upsert_progress(&self, progress: ProgressEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = progress_doc_id(progress.user_id, progress.line_id);
            store
                .upsert(doc_id, KIND_PROGRESS, progress)
                .await
                .map_err(Into::into)
        })
    }

    fn find_progress(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<ProgressEntity>(&progress_doc_id(user_id, line_id))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn list_user_progress(
        &self,
        user_id: Uuid,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_ids = store
                .script_line_ids(script_id)
                .await?
                .into_iter()
                .map(|line_id| progress_doc_id(user_id, line_id))
                .collect();
            let docs = store.fetch_documents::<ProgressEntity>(doc_ids).await?;
            Ok(docs.into_iter().map(|doc| doc.body).collect())
        })
    }

    fn list_checked_progress(
        &self,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<CheckedProgressRow>>> {
        let store = self.clone();
        Box::pin(async move {
            let line_ids = store.script_line_ids(script_id).await?;
            if line_ids.is_empty() {
                return Ok(Vec::new());
            }

            let progress = store
                .find_documents::<ProgressEntity>(json!({
                    "kind": KIND_PROGRESS,
                    "is_checked": true,
                    "line_id": { "$in": line_ids },
                }))
                .await?;

            let mut user_ids = progress
                .iter()
                .map(|doc| doc.body.user_id)
                .collect::<Vec<_>>();
            user_ids.sort();
            user_ids.dedup();
            let users = store
                .fetch_documents::<UserEntity>(user_ids.into_iter().map(user_doc_id).collect())
                .await?
                .into_iter()
                .map(|doc| (doc.body.id, doc.body))
                .collect::<HashMap<_, _>>();

            Ok(progress
                .into_iter()
                .map(|doc| CheckedProgressRow {
                    user: users.get(&doc.body.user_id).cloned(),
                })
                .collect())
        })
    }

    fn insert_issue(&self, issue: IssueEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchDocument::new(issue_doc_id(issue.id), KIND_ISSUE, issue, None);
            if store.put_document(&document).await? {
                Ok(())
            } else {
                Err(CouchDaoError::Conflict {
                    doc_id: document.id,
                    attempts: 1,
                }
                .into())
            }
        })
    }

    fn find_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.get_document::<IssueEntity>(&issue_doc_id(id)).await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn list_issues(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<IssueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut issues = store
                .find_documents::<IssueEntity>(json!({ "kind": KIND_ISSUE, "room_id": room_id }))
                .await?
                .into_iter()
                .map(|doc| doc.body)
                .collect::<Vec<_>>();
            issues.sort_by(|a, b| {
                a.script_line_ref
                    .cmp(&b.script_line_ref)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            Ok(issues)
        })
    }

    fn update_issue_status(
        &self,
        id: Uuid,
        status: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .modify::<IssueEntity, _>(issue_doc_id(id), |issue| {
                    issue.status = Some(status.clone());
                    true
                })
                .await
                .map_err(Into::into)
        })
    }

    fn link_issue_ticket(
        &self,
        id: Uuid,
        ticket_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .modify::<IssueEntity, _>(issue_doc_id(id), |issue| {
                    if issue.ticket_key.is_some() {
                        return false;
                    }
                    issue.ticket_key = Some(ticket_key.clone());
                    true
                })
                .await
                .map_err(Into::into)
        })
    }

    fn delete_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = issue_doc_id(id);
            for _ in 0..MAX_WRITE_ATTEMPTS {
                let Some(document) = store.get_document::<IssueEntity>(&doc_id).await? else {
                    return Ok(None);
                };
                let rev = document.rev.unwrap_or_default();
                if store.delete_document(&doc_id, &rev).await? {
                    return Ok(Some(document.body));
                }
            }
            Err(CouchDaoError::Conflict {
                doc_id,
                attempts: MAX_WRITE_ATTEMPTS,
            }
            .into())
        })
    }
}
