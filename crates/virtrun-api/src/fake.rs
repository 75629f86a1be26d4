// crates/virtrun-api/src/fake.rs
// ============================================================================
// Module: In-Memory Cluster
// Description: In-process implementation of the facade traits.
// Purpose: Let harness and system tests script cluster behavior directly.
// Dependencies: crate::interfaces, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! [`FakeCluster`] keeps all objects in process and exposes mutation handles
//! so tests can script phase transitions, logs, results, admission
//! rejections, and transient fetch faults. The facade half behaves like the
//! real cluster: same error taxonomy, same create/update/delete semantics,
//! watch events over a broadcast channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::ClientError;
use crate::interfaces::Cluster;
use crate::interfaces::ClusterObject;
use crate::interfaces::Patch;
use crate::interfaces::PatchType;
use crate::interfaces::ResourceOps;
use crate::interfaces::WatchEvent;
use crate::interfaces::WatchStream;
use crate::meta::ResourceKind;
use crate::meta::Selector;
use crate::resources::Run;
use crate::resources::VirtualMachine;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity of the per-kind watch broadcast channel.
const WATCH_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Object Store
// ============================================================================

/// Admission hook applied before create calls are accepted.
type AdmissionHook<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Per-kind object store with watch fan-out and fault injection.
struct Store<T: ClusterObject> {
    objects: Mutex<BTreeMap<(String, String), T>>,
    events: broadcast::Sender<WatchEvent<T>>,
    admission: Mutex<Option<AdmissionHook<T>>>,
    transient_get_faults: AtomicU64,
    name_seq: AtomicU64,
}

impl<T: ClusterObject> Store<T> {
    fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            objects: Mutex::new(BTreeMap::new()),
            events,
            admission: Mutex::new(None),
            transient_get_faults: AtomicU64::new(0),
            name_seq: AtomicU64::new(0),
        }
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), T>> {
        // Mutex poisoning cannot outlive a test process in a useful way.
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: WatchEvent<T>) {
        // Nobody watching is fine.
        let _ = self.events.send(event);
    }

    fn take_transient_fault(&self) -> bool {
        self.transient_get_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    fn mutate(
        &self,
        namespace: &str,
        name: &str,
        apply: impl FnOnce(&mut T),
    ) -> Result<(), ClientError> {
        let mut objects = self.lock_objects();
        let key = (namespace.to_string(), name.to_string());
        let Some(object) = objects.get_mut(&key) else {
            return Err(ClientError::not_found(T::KIND.plural(), namespace, name));
        };
        apply(object);
        let updated = object.clone();
        drop(objects);
        self.emit(WatchEvent::Modified(updated));
        Ok(())
    }
}

#[async_trait]
impl<T: ClusterObject> ResourceOps<T> for Store<T> {
    async fn get(&self, namespace: &str, name: &str) -> Result<T, ClientError> {
        if self.take_transient_fault() {
            return Err(ClientError::Transient {
                detail: "injected fault".to_string(),
            });
        }
        let objects = self.lock_objects();
        objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::not_found(T::KIND.plural(), namespace, name))
    }

    async fn list(&self, namespace: &str, selector: &Selector) -> Result<Vec<T>, ClientError> {
        let objects = self.lock_objects();
        Ok(objects
            .iter()
            .filter(|((ns, _), object)| {
                ns == namespace && selector.matches(&object.meta().labels)
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn watch(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<WatchStream<T>, ClientError> {
        let namespace = namespace.to_string();
        let selector = selector.clone();
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(move |item| {
            match item {
                Ok(event) => {
                    let keep = {
                        let object = match &event {
                            WatchEvent::Added(object)
                            | WatchEvent::Modified(object)
                            | WatchEvent::Deleted(object) => object,
                        };
                        let meta = object.meta();
                        meta.namespace == namespace && selector.matches(&meta.labels)
                    };
                    keep.then_some(Ok(event))
                }
                Err(err) => Some(Err(ClientError::Transient {
                    detail: format!("watch lagged: {err}"),
                })),
            }
        });
        Ok(Box::pin(stream))
    }

    async fn create(&self, object: &T) -> Result<T, ClientError> {
        {
            let admission = match self.admission.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(hook) = admission.as_ref() {
                hook(object).map_err(|reason| ClientError::AdmissionRejected {
                    reason,
                })?;
            }
        }
        let mut created = object.clone();
        if created.meta().name.is_empty() {
            let seq = self.name_seq.fetch_add(1, Ordering::SeqCst);
            created.meta_mut().name = format!("{}-{seq}", T::KIND.plural());
        }
        let key = (created.meta().namespace.clone(), created.meta().name.clone());
        let mut objects = self.lock_objects();
        if objects.contains_key(&key) {
            return Err(ClientError::Conflict {
                name: key.1,
                message: "object already exists".to_string(),
            });
        }
        objects.insert(key, created.clone());
        drop(objects);
        self.emit(WatchEvent::Added(created.clone()));
        Ok(created)
    }

    async fn update(&self, object: &T) -> Result<T, ClientError> {
        let meta = object.meta();
        let key = (meta.namespace.clone(), meta.name.clone());
        let mut objects = self.lock_objects();
        if !objects.contains_key(&key) {
            return Err(ClientError::not_found(T::KIND.plural(), &meta.namespace, &meta.name));
        }
        objects.insert(key, object.clone());
        drop(objects);
        self.emit(WatchEvent::Modified(object.clone()));
        Ok(object.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.lock_objects();
        let Some(removed) = objects.remove(&key) else {
            return Err(ClientError::not_found(T::KIND.plural(), namespace, name));
        };
        drop(objects);
        self.emit(WatchEvent::Deleted(removed));
        Ok(())
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Patch) -> Result<T, ClientError> {
        if patch.patch_type != PatchType::Merge {
            return Err(ClientError::Api {
                status: 415,
                message: "fake cluster supports merge patches only".to_string(),
            });
        }
        let mut objects = self.lock_objects();
        let key = (namespace.to_string(), name.to_string());
        let Some(object) = objects.get_mut(&key) else {
            return Err(ClientError::not_found(T::KIND.plural(), namespace, name));
        };
        let mut value = serde_json::to_value(&*object).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("serialize for patch: {err}"),
        })?;
        merge_value(&mut value, &patch.body);
        let patched: T = serde_json::from_value(value).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("malformed patch result: {err}"),
        })?;
        *object = patched.clone();
        drop(objects);
        self.emit(WatchEvent::Modified(patched.clone()));
        Ok(patched)
    }
}

/// RFC 7386 merge of `patch` into `target`.
fn merge_value(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (serde_json::Value::Object(target_map), serde_json::Value::Object(patch_map)) =
        (&mut *target, patch)
    {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_value(target_map.entry(key.clone()).or_insert(serde_json::Value::Null), value);
            }
        }
    } else {
        *target = patch.clone();
    }
}

// ============================================================================
// SECTION: Fake Cluster
// ============================================================================

/// In-memory cluster facade with scripting handles.
#[derive(Clone)]
pub struct FakeCluster {
    runs: Arc<Store<Run>>,
    vms: Arc<Store<VirtualMachine>>,
    logs: Arc<Mutex<BTreeMap<(String, String), String>>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Store::new()),
            vms: Arc::new(Store::new()),
            logs: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Installs an admission hook for run creation.
    pub fn set_run_admission(
        &self,
        hook: impl Fn(&Run) -> Result<(), String> + Send + Sync + 'static,
    ) {
        let mut admission = match self.runs.admission.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *admission = Some(Box::new(hook));
    }

    /// Installs an admission hook for VM creation.
    pub fn set_vm_admission(
        &self,
        hook: impl Fn(&VirtualMachine) -> Result<(), String> + Send + Sync + 'static,
    ) {
        let mut admission = match self.vms.admission.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *admission = Some(Box::new(hook));
    }

    /// Makes the next `count` run/VM gets fail with a transient error.
    pub fn inject_transient_get_faults(&self, kind: ResourceKind, count: u64) {
        match kind {
            ResourceKind::Run => self.runs.transient_get_faults.store(count, Ordering::SeqCst),
            ResourceKind::VirtualMachine => {
                self.vms.transient_get_faults.store(count, Ordering::SeqCst);
            }
        }
    }

    /// Mutates a stored run in place, emitting a watch event.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the run does not exist.
    pub fn update_run(
        &self,
        namespace: &str,
        name: &str,
        apply: impl FnOnce(&mut Run),
    ) -> Result<(), ClientError> {
        self.runs.mutate(namespace, name, apply)
    }

    /// Mutates a stored VM in place, emitting a watch event.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the VM does not exist.
    pub fn update_vm(
        &self,
        namespace: &str,
        name: &str,
        apply: impl FnOnce(&mut VirtualMachine),
    ) -> Result<(), ClientError> {
        self.vms.mutate(namespace, name, apply)
    }

    /// Appends text to a run's captured log.
    pub fn append_run_log(&self, namespace: &str, name: &str, text: &str) {
        let mut logs = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        logs.entry((namespace.to_string(), name.to_string()))
            .or_default()
            .push_str(text);
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    fn runs(&self) -> &dyn ResourceOps<Run> {
        self.runs.as_ref()
    }

    fn vms(&self) -> &dyn ResourceOps<VirtualMachine> {
        self.vms.as_ref()
    }

    async fn run_logs(&self, namespace: &str, name: &str) -> Result<String, ClientError> {
        // The run must exist even when it has produced no output yet.
        let _ = self.runs.get(namespace, name).await?;
        let logs = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(logs.get(&(namespace.to_string(), name.to_string())).cloned().unwrap_or_default())
    }
}
