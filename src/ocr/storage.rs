//! Object storage used as the staging area for asynchronous recognition.

use std::sync::Arc;

use serde::Deserialize;

use super::AcquisitionError;
use crate::google::{truncate_body, GoogleAuth};

/// Minimal object-store surface (allows mocking).
pub trait ObjectStore: Send + Sync {
    fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), AcquisitionError>;

    /// Names of all objects whose name starts with `prefix`.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, AcquisitionError>;

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, AcquisitionError>;

    fn delete(&self, bucket: &str, name: &str) -> Result<(), AcquisitionError>;
}

/// Temporary objects owned for the duration of one recognition job.
///
/// Every tracked object is deleted when the guard drops, on success and
/// on every early return. Delete failures are logged and swallowed.
pub struct TempObjects {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    names: Vec<String>,
}

impl TempObjects {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            names: Vec::new(),
        }
    }

    pub fn track(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Drop for TempObjects {
    fn drop(&mut self) {
        for name in self.names.drain(..) {
            if let Err(e) = self.store.delete(&self.bucket, &name) {
                tracing::warn!(bucket = %self.bucket, object = %name, error = %e, "Temporary object cleanup failed");
            }
        }
    }
}

// ──────────────────────────────────────────────
// Cloud Storage JSON API
// ──────────────────────────────────────────────

const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";

pub struct GcsObjectStore {
    base_url: String,
    auth: GoogleAuth,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectEntry {
    name: String,
}

impl GcsObjectStore {
    pub fn new(auth: GoogleAuth, timeout_secs: u64) -> Result<Self, AcquisitionError> {
        Self::with_base_url(DEFAULT_STORAGE_URL, auth, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        auth: GoogleAuth,
        timeout_secs: u64,
    ) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AcquisitionError::Storage(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            client,
        })
    }

    fn objects_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/b/{}/o", self.base_url, bucket)
    }

    /// URL of a single object; the name is percent-encoded as one segment.
    fn object_url(&self, bucket: &str, name: &str) -> Result<reqwest::Url, AcquisitionError> {
        let mut url = reqwest::Url::parse(&self.objects_url(bucket))
            .map_err(|e| AcquisitionError::Config(format!("invalid storage URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AcquisitionError::Config("storage URL cannot take a path".into()))?
            .push(name);
        Ok(url)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, AcquisitionError> {
        let response = self
            .auth
            .apply(request)
            .send()
            .map_err(|e| AcquisitionError::Storage(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(AcquisitionError::Storage(format!(
            "status {}: {}",
            status.as_u16(),
            truncate_body(body)
        )))
    }
}

impl ObjectStore for GcsObjectStore {
    fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), AcquisitionError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, bucket);
        let request = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        self.send(request)?;
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, AcquisitionError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(self.objects_url(bucket))
                .query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ObjectList = self
                .send(request)?
                .json()
                .map_err(|e| AcquisitionError::Storage(format!("invalid object list: {e}")))?;
            names.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(names),
            }
        }
    }

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, AcquisitionError> {
        let url = self.object_url(bucket, name)?;
        let response = self.send(self.client.get(url).query(&[("alt", "media")]))?;
        let bytes = response
            .bytes()
            .map_err(|e| AcquisitionError::Storage(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn delete(&self, bucket: &str, name: &str) -> Result<(), AcquisitionError> {
        let url = self.object_url(bucket, name)?;
        self.send(self.client.delete(url))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory object store that records deletions.
    #[derive(Default)]
    pub(crate) struct MemoryObjectStore {
        pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub deleted: Mutex<Vec<String>>,
        pub fail_deletes: bool,
        pub fail_lists: bool,
    }

    impl ObjectStore for MemoryObjectStore {
        fn upload(&self, _: &str, name: &str, bytes: &[u8], _: &str) -> Result<(), AcquisitionError> {
            self.objects.lock().unwrap().insert(name.to_string(), bytes.to_vec());
            Ok(())
        }

        fn list(&self, _: &str, prefix: &str) -> Result<Vec<String>, AcquisitionError> {
            if self.fail_lists {
                return Err(AcquisitionError::Storage("list refused".into()));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn download(&self, _: &str, name: &str) -> Result<Vec<u8>, AcquisitionError> {
            self.objects
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| AcquisitionError::Storage(format!("no such object: {name}")))
        }

        fn delete(&self, _: &str, name: &str) -> Result<(), AcquisitionError> {
            self.deleted.lock().unwrap().push(name.to_string());
            if self.fail_deletes {
                return Err(AcquisitionError::Storage("delete refused".into()));
            }
            self.objects.lock().unwrap().remove(name);
            Ok(())
        }
    }

    #[test]
    fn guard_deletes_tracked_objects_on_drop() {
        let store = Arc::new(MemoryObjectStore::default());
        store.upload("b", "uploads/a.pdf", b"pdf", "application/pdf").unwrap();
        store.upload("b", "out/a/output-1.json", b"{}", "application/json").unwrap();
        {
            let mut guard = TempObjects::new(store.clone(), "b");
            guard.track("uploads/a.pdf");
            guard.track("out/a/output-1.json");
            guard.track("uploads/a.pdf");
            assert_eq!(guard.len(), 2);
        }
        assert!(store.objects.lock().unwrap().is_empty());
        assert_eq!(store.deleted.lock().unwrap().len(), 2);
    }

    #[test]
    fn guard_swallows_delete_failures() {
        let store = Arc::new(MemoryObjectStore {
            fail_deletes: true,
            ..Default::default()
        });
        {
            let mut guard = TempObjects::new(store.clone(), "b");
            guard.track("x");
            guard.track("y");
        }
        // Both deletes attempted even though the first failed.
        assert_eq!(*store.deleted.lock().unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn object_url_encodes_name_as_one_segment() {
        let store = GcsObjectStore::with_base_url("http://localhost:1/", GoogleAuth::Anonymous, 5).unwrap();
        let url = store.object_url("bucket", "vision-out/abc/output-1-to-2.json").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1/storage/v1/b/bucket/o/vision-out%2Fabc%2Foutput-1-to-2.json"
        );
    }
}
