use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    models::{FinishedEntryEntity, SlotRowEntity, StudentEntity, TimerRecordEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchFinishedDocument, CouchSlotDocument, CouchStudentDocument,
        CouchTimerDocument, END_SUFFIX, FINISHED_PREFIX, RevDocument, SLOT_PREFIX, STUDENT_PREFIX,
        TIMER_PREFIX, finished_doc_id, slot_doc_id, timer_doc_id,
    },
};

/// Session store backed by a CouchDB database, one document per row.
#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSessionStore {
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

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
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

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
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
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    /// Delete a document by id, fetching the current revision first. A
    /// document that is already gone counts as deleted.
    async fn delete_document(&self, doc_id: &str) -> CouchResult<()> {
        let Some(existing) = self.get_document::<RevDocument>(doc_id).await? else {
            return Ok(());
        };

        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", existing.rev.as_str())])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
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
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn list_doc_ids(&self, prefix: &str) -> CouchResult<Vec<String>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
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

        Ok(payload.rows.into_iter().map(|row| row.id).collect())
    }
}

impl SessionStore for CouchSessionStore {
    fn list_students(&self) -> BoxFuture<'static, StorageResult<Vec<StudentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchStudentDocument>(STUDENT_PREFIX)
                .await?;
            let students = docs
                .into_iter()
                .map(StudentEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(students)
        })
    }

    fn save_slot(&self, slot: SlotRowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = slot_doc_id(slot.index);
            let mut doc = CouchSlotDocument::from((slot, None));
            if let Some(existing) = store.get_document::<RevDocument>(&doc_id).await? {
                doc.rev = Some(existing.rev);
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn list_slots(&self) -> BoxFuture<'static, StorageResult<Vec<SlotRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchSlotDocument>(SLOT_PREFIX)
                .await?;
            let slots = docs
                .into_iter()
                .map(SlotRowEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(slots)
        })
    }

    fn save_timer(&self, timer: TimerRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = timer_doc_id(timer.occupant_id);
            let mut doc = CouchTimerDocument::from((timer, None));
            if let Some(existing) = store.get_document::<RevDocument>(&doc_id).await? {
                doc.rev = Some(existing.rev);
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn delete_timer(&self, occupant_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_document(&timer_doc_id(occupant_id))
                .await
                .map_err(Into::into)
        })
    }

    fn list_timers(&self) -> BoxFuture<'static, StorageResult<Vec<TimerRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchTimerDocument>(TIMER_PREFIX)
                .await?;
            let timers = docs
                .into_iter()
                .map(TimerRecordEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(timers)
        })
    }

    fn save_finished(&self, entry: FinishedEntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = finished_doc_id(entry.student.id);
            let mut doc = CouchFinishedDocument::from((entry, None));
            if let Some(existing) = store.get_document::<RevDocument>(&doc_id).await? {
                doc.rev = Some(existing.rev);
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn list_finished(&self) -> BoxFuture<'static, StorageResult<Vec<FinishedEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchFinishedDocument>(FINISHED_PREFIX)
                .await?;
            Ok(docs.into_iter().map(FinishedEntryEntity::from).collect())
        })
    }

    fn clear_session(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for prefix in [SLOT_PREFIX, TIMER_PREFIX, FINISHED_PREFIX] {
                let doc_ids = store.list_doc_ids(prefix).await?;
                for doc_id in doc_ids {
                    store.delete_document(&doc_id).await?;
                }
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
