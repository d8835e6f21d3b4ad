//! In-process implementation of the native collaboration surface.
//!
//! [`LoopbackPlatform`] keeps real handle tables for wait primitives, wait
//! registrations, event registrations, queued records, native memory and
//! certificate stores, so every acquisition and release made by the bridge
//! is observable through [`LoopbackPlatform::stats`]. Records are injected
//! with [`LoopbackPlatform::post_event`], and any native call can be made to
//! fail once with [`LoopbackPlatform::fail_next`].
//!
//! Wait callbacks run either on a shared multi-threaded tokio runtime that
//! plays the role of the OS wait pool ([`LoopbackPlatform::with_wait_pool`]),
//! or only when the owner calls [`LoopbackPlatform::pump`]
//! ([`LoopbackPlatform::manual`]).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::platform::{
    CollabPlatform, DataHandle, EventHandle, EventPoll, MemHandle, NativeResult,
    RegistrationHandle, StoreHandle, WaitCallback, WaitHandle,
};
use super::types::{
    CRYPT_E_BAD_ENCODE, E_HANDLE, E_INVALIDARG, E_MORE_DATA, E_OUTOFMEMORY, EventRegistration,
    HResult, NativeBlob, NativeEventData,
};

/// Access denied; returned when writing to a read-only store.
const E_ACCESSDENIED: HResult = 0x8007_0005_u32 as i32;

/// Leading bytes of a serialized loopback certificate store.
const STORE_MAGIC: &[u8; 4] = b"LBCS";

/// Native calls that can be made to fail with [`LoopbackPlatform::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    /// `startup`.
    Startup,
    /// `create_event`.
    CreateEvent,
    /// `register_wait`.
    RegisterWait,
    /// `register_event`.
    RegisterEvent,
    /// `get_event_data`.
    GetEventData,
    /// `unregister_event`.
    UnregisterEvent,
    /// `alloc`.
    Alloc,
    /// `open_store_in_memory`.
    OpenStoreInMemory,
    /// `open_store_from_blob`.
    OpenStoreFromBlob,
    /// `add_certificate`.
    AddCertificate,
    /// `save_store_to_memory`.
    SaveStore,
}

/// Call counters and live handle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    /// Number of `startup` calls.
    pub startup_calls: u32,
    /// Number of `register_wait` calls.
    pub register_wait_calls: u32,
    /// Number of `register_event` calls.
    pub register_event_calls: u32,
    /// Number of `unregister_event` calls.
    pub unregister_event_calls: u32,
    /// Number of `get_event_data` calls.
    pub get_event_data_calls: u32,
    /// Number of store opens, in memory or from a blob.
    pub store_opens: u32,
    /// Release calls made with a handle that was not live.
    pub invalid_releases: u32,
    /// Open wait primitives.
    pub live_events: usize,
    /// Active wait registrations.
    pub live_waits: usize,
    /// Active event registrations.
    pub live_registrations: usize,
    /// Records dequeued or queued but not yet freed.
    pub live_records: usize,
    /// Native allocations not yet freed.
    pub live_memory: usize,
    /// Open certificate stores.
    pub live_stores: usize,
}

struct EventEntry {
    notify: Arc<Notify>,
    signaled: bool,
}

enum WaitEntry {
    Pooled(JoinHandle<()>),
    Manual {
        event: EventHandle,
        callback: WaitCallback,
    },
}

struct RegistrationEntry {
    event: EventHandle,
    filters: Vec<EventRegistration>,
    queue: VecDeque<DataHandle>,
}

impl RegistrationEntry {
    fn accepts(&self, data: &NativeEventData) -> bool {
        let subject = data.subject_id();
        self.filters.iter().any(|filter| {
            filter.event_type == data.event_type
                && filter.instance.is_none_or(|id| Some(id) == subject)
        })
    }
}

struct StoreEntry {
    certificates: Vec<Vec<u8>>,
    read_only: bool,
}

#[derive(Default)]
struct LoopbackState {
    next_handle: u64,
    counters: LoopbackStats,
    events: HashMap<EventHandle, EventEntry>,
    waits: HashMap<WaitHandle, WaitEntry>,
    registrations: HashMap<RegistrationHandle, RegistrationEntry>,
    records: HashMap<DataHandle, NativeEventData>,
    memory: HashMap<MemHandle, Vec<u8>>,
    stores: HashMap<StoreHandle, StoreEntry>,
    faults: HashMap<NativeOp, VecDeque<HResult>>,
}

impl LoopbackState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_fault(&mut self, op: NativeOp) -> NativeResult<()> {
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(code) => {
                tracing::debug!(?op, code, "injected native failure");
                Err(code)
            }
            None => Ok(()),
        }
    }

    fn insert_memory(&mut self, bytes: Vec<u8>) -> MemHandle {
        let handle = MemHandle(self.next());
        self.memory.insert(handle, bytes);
        handle
    }

    fn read_blob(&self, blob: &NativeBlob) -> NativeResult<Vec<u8>> {
        self.memory
            .get(&blob.pb_data)
            .and_then(|bytes| bytes.get(..blob.cb_data as usize))
            .map(<[u8]>::to_vec)
            .ok_or(E_INVALIDARG)
    }

    fn free_record(&mut self, handle: DataHandle) {
        if let Some(mut record) = self.records.remove(&handle) {
            for blob in record.blobs_mut() {
                self.memory.remove(&blob.pb_data);
            }
        }
    }
}

/// In-process native collaboration subsystem.
pub struct LoopbackPlatform {
    state: Mutex<LoopbackState>,
    pool: Option<Runtime>,
}

impl LoopbackPlatform {
    /// Creates a platform whose wait callbacks only run from [`Self::pump`].
    #[must_use]
    pub fn manual() -> Self {
        Self {
            state: Mutex::new(LoopbackState::default()),
            pool: None,
        }
    }

    /// Creates a platform whose wait callbacks run on a shared pool of
    /// `threads` worker threads.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while starting the pool threads.
    pub fn with_wait_pool(threads: usize) -> io::Result<Self> {
        let pool = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name("collab-wait")
            .enable_all()
            .build()?;
        Ok(Self {
            state: Mutex::new(LoopbackState::default()),
            pool: Some(pool),
        })
    }

    /// Returns `true` when callbacks run on the wait pool.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Makes the next call of `op` fail with `code`. Calls queue up.
    pub fn fail_next(&self, op: NativeOp, code: HResult) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(code);
    }

    /// Returns call counters and live handle counts.
    #[must_use]
    pub fn stats(&self) -> LoopbackStats {
        let st = self.state.lock();
        LoopbackStats {
            live_events: st.events.len(),
            live_waits: st.waits.len(),
            live_registrations: st.registrations.len(),
            live_records: st.records.len(),
            live_memory: st.memory.len(),
            live_stores: st.stores.len(),
            ..st.counters
        }
    }

    /// Signals a wait primitive.
    ///
    /// # Errors
    ///
    /// Returns `E_HANDLE` for an unknown primitive.
    pub fn set_event(&self, event: EventHandle) -> NativeResult<()> {
        let notify = {
            let mut st = self.state.lock();
            let entry = st.events.get_mut(&event).ok_or(E_HANDLE)?;
            entry.signaled = true;
            Arc::clone(&entry.notify)
        };
        if self.pool.is_some() {
            notify.notify_one();
        }
        Ok(())
    }

    /// Queues a copy of `data` on every registration that accepts it and
    /// signals their wait primitives. Buffers referenced by `data` are copied;
    /// the caller keeps ownership of the originals.
    ///
    /// Returns the number of registrations the record was queued on.
    ///
    /// # Errors
    ///
    /// Returns `E_INVALIDARG` if a blob in `data` does not point at live
    /// native memory.
    pub fn post_event(&self, data: &NativeEventData) -> NativeResult<usize> {
        let signals = {
            let mut st = self.state.lock();
            let mut template = data.clone();
            let payloads = template
                .blobs_mut()
                .into_iter()
                .map(|blob| {
                    if blob.is_empty() {
                        Ok(None)
                    } else {
                        st.read_blob(blob).map(Some)
                    }
                })
                .collect::<NativeResult<Vec<_>>>()?;

            let targets: Vec<(RegistrationHandle, EventHandle)> = st
                .registrations
                .iter()
                .filter(|(_, entry)| entry.accepts(data))
                .map(|(handle, entry)| (*handle, entry.event))
                .collect();

            for (registration, _) in &targets {
                let mut copy = template.clone();
                for (blob, payload) in copy.blobs_mut().into_iter().zip(&payloads) {
                    if let Some(bytes) = payload {
                        blob.pb_data = st.insert_memory(bytes.clone());
                    }
                }
                let handle = DataHandle(st.next());
                st.records.insert(handle, copy);
                if let Some(entry) = st.registrations.get_mut(registration) {
                    entry.queue.push_back(handle);
                }
            }
            targets
        };

        tracing::debug!(
            event_type = ?data.event_type,
            registrations = signals.len(),
            "loopback record posted"
        );
        for (_, event) in &signals {
            self.set_event(*event)?;
        }
        Ok(signals.len())
    }

    /// Runs, on the calling thread, the callback of every manual wait whose
    /// primitive is signaled, resetting the primitive first. Returns the
    /// number of callbacks run.
    pub fn pump(&self) -> usize {
        let fired: Vec<WaitCallback> = {
            let mut st = self.state.lock();
            let LoopbackState { events, waits, .. } = &mut *st;
            let mut fired = Vec::new();
            for entry in waits.values() {
                if let WaitEntry::Manual { event, callback } = entry
                    && let Some(primitive) = events.get_mut(event)
                    && primitive.signaled
                {
                    primitive.signaled = false;
                    fired.push(Arc::clone(callback));
                }
            }
            fired
        };
        for callback in &fired {
            callback();
        }
        fired.len()
    }

    /// Returns the number of records waiting on a registration.
    #[must_use]
    pub fn queued(&self, registration: RegistrationHandle) -> usize {
        self.state
            .lock()
            .registrations
            .get(&registration)
            .map_or(0, |entry| entry.queue.len())
    }
}

impl Drop for LoopbackPlatform {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown_background();
        }
    }
}

impl fmt::Debug for LoopbackPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackPlatform")
            .field("pooled", &self.is_pooled())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_wait(notify: Arc<Notify>, callback: WaitCallback) {
    loop {
        notify.notified().await;
        let callback = Arc::clone(&callback);
        if let Err(err) = tokio::task::spawn_blocking(move || callback()).await {
            tracing::warn!(error = %err, "wait callback did not complete");
        }
    }
}

impl CollabPlatform for LoopbackPlatform {
    fn startup(&self, version: u16) -> NativeResult<()> {
        let mut st = self.state.lock();
        st.counters.startup_calls += 1;
        st.check_fault(NativeOp::Startup)?;
        tracing::debug!(version, "loopback collaboration subsystem started");
        Ok(())
    }

    fn create_event(&self) -> NativeResult<EventHandle> {
        let mut st = self.state.lock();
        st.check_fault(NativeOp::CreateEvent)?;
        let handle = EventHandle(st.next());
        st.events.insert(
            handle,
            EventEntry {
                notify: Arc::new(Notify::new()),
                signaled: false,
            },
        );
        Ok(handle)
    }

    fn close_event(&self, event: EventHandle) -> NativeResult<()> {
        let mut st = self.state.lock();
        if st.events.remove(&event).is_some() {
            Ok(())
        } else {
            st.counters.invalid_releases += 1;
            Err(E_HANDLE)
        }
    }

    fn register_wait(
        &self,
        event: EventHandle,
        callback: WaitCallback,
    ) -> NativeResult<WaitHandle> {
        let mut st = self.state.lock();
        st.counters.register_wait_calls += 1;
        st.check_fault(NativeOp::RegisterWait)?;
        let notify = st
            .events
            .get(&event)
            .map(|entry| Arc::clone(&entry.notify))
            .ok_or(E_HANDLE)?;
        let entry = match &self.pool {
            Some(pool) => WaitEntry::Pooled(pool.spawn(run_wait(notify, callback))),
            None => WaitEntry::Manual { event, callback },
        };
        let handle = WaitHandle(st.next());
        st.waits.insert(handle, entry);
        Ok(handle)
    }

    fn unregister_wait(&self, wait: WaitHandle) -> NativeResult<()> {
        let mut st = self.state.lock();
        match st.waits.remove(&wait) {
            Some(WaitEntry::Pooled(task)) => {
                task.abort();
                Ok(())
            }
            Some(WaitEntry::Manual { .. }) => Ok(()),
            None => {
                st.counters.invalid_releases += 1;
                Err(E_HANDLE)
            }
        }
    }

    fn register_event(
        &self,
        event: EventHandle,
        registrations: &[EventRegistration],
    ) -> NativeResult<RegistrationHandle> {
        let mut st = self.state.lock();
        st.counters.register_event_calls += 1;
        st.check_fault(NativeOp::RegisterEvent)?;
        if registrations.is_empty() {
            return Err(E_INVALIDARG);
        }
        if !st.events.contains_key(&event) {
            return Err(E_HANDLE);
        }
        let handle = RegistrationHandle(st.next());
        st.registrations.insert(
            handle,
            RegistrationEntry {
                event,
                filters: registrations.to_vec(),
                queue: VecDeque::new(),
            },
        );
        Ok(handle)
    }

    fn get_event_data(&self, registration: RegistrationHandle) -> NativeResult<EventPoll> {
        let mut st = self.state.lock();
        st.counters.get_event_data_calls += 1;
        st.check_fault(NativeOp::GetEventData)?;
        let entry = st.registrations.get_mut(&registration).ok_or(E_HANDLE)?;
        Ok(entry
            .queue
            .pop_front()
            .map_or(EventPoll::NoMoreData, EventPoll::Record))
    }

    fn event_record(&self, data: DataHandle) -> NativeResult<NativeEventData> {
        self.state
            .lock()
            .records
            .get(&data)
            .cloned()
            .ok_or(E_HANDLE)
    }

    fn free_data(&self, data: DataHandle) {
        self.state.lock().free_record(data);
    }

    fn unregister_event(&self, registration: RegistrationHandle) -> NativeResult<()> {
        let mut st = self.state.lock();
        st.counters.unregister_event_calls += 1;
        st.check_fault(NativeOp::UnregisterEvent)?;
        let Some(entry) = st.registrations.remove(&registration) else {
            st.counters.invalid_releases += 1;
            return Err(E_HANDLE);
        };
        for record in entry.queue {
            st.free_record(record);
        }
        Ok(())
    }

    fn alloc(&self, len: u32) -> NativeResult<MemHandle> {
        let mut st = self.state.lock();
        st.check_fault(NativeOp::Alloc)?;
        let size = usize::try_from(len).map_err(|_| E_OUTOFMEMORY)?;
        Ok(st.insert_memory(vec![0; size]))
    }

    fn free(&self, mem: MemHandle) {
        self.state.lock().memory.remove(&mem);
    }

    fn read_memory(&self, mem: MemHandle, len: u32) -> NativeResult<Vec<u8>> {
        self.state.lock().read_blob(&NativeBlob {
            cb_data: len,
            pb_data: mem,
        })
    }

    fn write_memory(&self, mem: MemHandle, bytes: &[u8]) -> NativeResult<()> {
        let mut st = self.state.lock();
        let target = st
            .memory
            .get_mut(&mem)
            .and_then(|buf| buf.get_mut(..bytes.len()))
            .ok_or(E_INVALIDARG)?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn open_store_in_memory(&self) -> NativeResult<StoreHandle> {
        let mut st = self.state.lock();
        st.counters.store_opens += 1;
        st.check_fault(NativeOp::OpenStoreInMemory)?;
        let handle = StoreHandle(st.next());
        st.stores.insert(
            handle,
            StoreEntry {
                certificates: Vec::new(),
                read_only: false,
            },
        );
        Ok(handle)
    }

    fn open_store_from_blob(&self, blob: &NativeBlob) -> NativeResult<StoreHandle> {
        let mut st = self.state.lock();
        st.counters.store_opens += 1;
        st.check_fault(NativeOp::OpenStoreFromBlob)?;
        let bytes = st.read_blob(blob)?;
        let certificates = decode_store(&bytes).ok_or(CRYPT_E_BAD_ENCODE)?;
        let handle = StoreHandle(st.next());
        st.stores.insert(
            handle,
            StoreEntry {
                certificates,
                read_only: true,
            },
        );
        Ok(handle)
    }

    fn add_certificate(&self, store: StoreHandle, der: &[u8]) -> NativeResult<()> {
        let mut st = self.state.lock();
        st.check_fault(NativeOp::AddCertificate)?;
        let entry = st.stores.get_mut(&store).ok_or(E_HANDLE)?;
        if entry.read_only {
            return Err(E_ACCESSDENIED);
        }
        if der.is_empty() {
            return Err(CRYPT_E_BAD_ENCODE);
        }
        entry.certificates.push(der.to_vec());
        Ok(())
    }

    fn save_store_to_memory(
        &self,
        store: StoreHandle,
        target: Option<(MemHandle, u32)>,
    ) -> NativeResult<u32> {
        let mut st = self.state.lock();
        st.check_fault(NativeOp::SaveStore)?;
        let bytes = encode_store(&st.stores.get(&store).ok_or(E_HANDLE)?.certificates);
        let size = u32::try_from(bytes.len()).map_err(|_| E_OUTOFMEMORY)?;
        let Some((mem, capacity)) = target else {
            return Ok(size);
        };
        if capacity < size {
            return Err(E_MORE_DATA);
        }
        let buffer = st
            .memory
            .get_mut(&mem)
            .and_then(|buf| buf.get_mut(..bytes.len()))
            .ok_or(E_INVALIDARG)?;
        buffer.copy_from_slice(&bytes);
        Ok(size)
    }

    fn first_certificate(&self, store: StoreHandle) -> NativeResult<Option<Vec<u8>>> {
        let st = self.state.lock();
        let entry = st.stores.get(&store).ok_or(E_HANDLE)?;
        Ok(entry.certificates.first().cloned())
    }

    fn close_store(&self, store: StoreHandle) {
        let mut st = self.state.lock();
        if st.stores.remove(&store).is_none() {
            st.counters.invalid_releases += 1;
        }
    }
}

/// Serializes a list of certificates: magic, count, then length-prefixed
/// DER entries, all integers little-endian.
fn encode_store(certificates: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = certificates.iter().map(|c| 4 + c.len()).sum();
    let mut out = Vec::with_capacity(8 + body);
    out.extend_from_slice(STORE_MAGIC);
    out.extend_from_slice(&(certificates.len() as u32).to_le_bytes());
    for certificate in certificates {
        out.extend_from_slice(&(certificate.len() as u32).to_le_bytes());
        out.extend_from_slice(certificate);
    }
    out
}

fn decode_store(bytes: &[u8]) -> Option<Vec<Vec<u8>>> {
    let body = bytes.strip_prefix(STORE_MAGIC.as_slice())?;
    let (count, mut rest) = take_u32(body)?;
    let mut certificates = Vec::new();
    for _ in 0..count {
        let (len, tail) = take_u32(rest)?;
        let (certificate, tail) = tail.split_at_checked(len as usize)?;
        certificates.push(certificate.to_vec());
        rest = tail;
    }
    rest.is_empty().then_some(certificates)
}

fn take_u32(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let (head, rest) = bytes.split_first_chunk::<4>()?;
    Some((u32::from_le_bytes(*head), rest))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::native::types::{
        CollabEventType, NativeApplication, NativeEventPayload, NativeGuid, change_type,
    };

    fn registration(event_type: CollabEventType) -> EventRegistration {
        EventRegistration {
            event_type,
            instance: None,
        }
    }

    fn application_record(id: NativeGuid, data: NativeBlob) -> NativeEventData {
        NativeEventData {
            event_type: CollabEventType::EndPointApplicationChanged,
            payload: NativeEventPayload::ApplicationChanged {
                contact: None,
                endpoint: None,
                change_type: change_type::UPDATED,
                application: Some(NativeApplication {
                    id,
                    data,
                    description: None,
                }),
            },
        }
    }

    #[test]
    fn store_format_round_trips() {
        let certificates = vec![vec![1, 2, 3], vec![], vec![9; 40]];
        let encoded = encode_store(&certificates);
        assert_eq!(decode_store(&encoded), Some(certificates));
        assert_eq!(decode_store(b"nope"), None);
        let Some((_, truncated)) = encoded.split_last() else {
            panic!("encoded store is empty");
        };
        assert_eq!(decode_store(truncated), None);
    }

    #[test]
    fn post_event_queues_only_on_matching_registrations() {
        let platform = LoopbackPlatform::manual();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let Ok(apps) = platform.register_event(
            event,
            &[registration(CollabEventType::EndPointApplicationChanged)],
        ) else {
            panic!("register_event failed");
        };
        let Ok(objects) =
            platform.register_event(event, &[registration(CollabEventType::EndPointObjectChanged)])
        else {
            panic!("register_event failed");
        };

        let posted = platform.post_event(&application_record(NativeGuid::default(), NativeBlob::EMPTY));
        assert_eq!(posted, Ok(1));
        assert_eq!(platform.queued(apps), 1);
        assert_eq!(platform.queued(objects), 0);
    }

    #[test]
    fn instance_registration_filters_by_subject() {
        let platform = LoopbackPlatform::manual();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let wanted = NativeGuid {
            data1: 42,
            ..NativeGuid::default()
        };
        let Ok(reg) = platform.register_event(
            event,
            &[EventRegistration {
                event_type: CollabEventType::EndPointApplicationChanged,
                instance: Some(wanted),
            }],
        ) else {
            panic!("register_event failed");
        };

        let other = NativeGuid {
            data1: 7,
            ..NativeGuid::default()
        };
        assert_eq!(platform.post_event(&application_record(other, NativeBlob::EMPTY)), Ok(0));
        assert_eq!(platform.post_event(&application_record(wanted, NativeBlob::EMPTY)), Ok(1));
        assert_eq!(platform.queued(reg), 1);
    }

    #[test]
    fn queued_record_owns_a_copy_of_its_blobs() {
        let platform = LoopbackPlatform::manual();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let Ok(reg) = platform.register_event(
            event,
            &[registration(CollabEventType::EndPointApplicationChanged)],
        ) else {
            panic!("register_event failed");
        };
        let Ok(mem) = platform.alloc(3) else {
            panic!("alloc failed");
        };
        assert_eq!(platform.write_memory(mem, &[7, 8, 9]), Ok(()));
        let blob = NativeBlob {
            cb_data: 3,
            pb_data: mem,
        };
        assert_eq!(platform.post_event(&application_record(NativeGuid::default(), blob)), Ok(1));
        platform.free(mem);

        let Ok(EventPoll::Record(data)) = platform.get_event_data(reg) else {
            panic!("expected a record");
        };
        let Ok(record) = platform.event_record(data) else {
            panic!("record missing");
        };
        let NativeEventPayload::ApplicationChanged {
            application: Some(app),
            ..
        } = record.payload
        else {
            panic!("unexpected payload");
        };
        assert_eq!(platform.read_memory(app.data.pb_data, 3), Ok(vec![7, 8, 9]));

        platform.free_data(data);
        let stats = platform.stats();
        assert_eq!(stats.live_records, 0);
        assert_eq!(stats.live_memory, 0);
        assert_eq!(platform.get_event_data(reg), Ok(EventPoll::NoMoreData));
    }

    #[test]
    fn unregister_event_frees_pending_records() {
        let platform = LoopbackPlatform::manual();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let Ok(reg) = platform.register_event(
            event,
            &[registration(CollabEventType::EndPointApplicationChanged)],
        ) else {
            panic!("register_event failed");
        };
        let _ = platform.post_event(&application_record(NativeGuid::default(), NativeBlob::EMPTY));
        assert_eq!(platform.stats().live_records, 1);
        assert_eq!(platform.unregister_event(reg), Ok(()));
        assert_eq!(platform.stats().live_records, 0);
        assert_eq!(platform.unregister_event(reg), Err(E_HANDLE));
        assert_eq!(platform.stats().invalid_releases, 1);
    }

    #[test]
    fn pump_runs_signaled_manual_waits_once() {
        let platform = LoopbackPlatform::manual();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let Ok(_wait) = platform.register_wait(
            event,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ) else {
            panic!("register_wait failed");
        };

        assert_eq!(platform.pump(), 0);
        assert_eq!(platform.set_event(event), Ok(()));
        assert_eq!(platform.set_event(event), Ok(()));
        assert_eq!(platform.pump(), 1);
        assert_eq!(platform.pump(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pooled_wait_runs_callback_on_signal() {
        let Ok(platform) = LoopbackPlatform::with_wait_pool(2) else {
            panic!("pool failed to start");
        };
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let (tx, rx) = std::sync::mpsc::channel();
        let Ok(wait) = platform.register_wait(
            event,
            Arc::new(move || {
                let _ = tx.send(());
            }),
        ) else {
            panic!("register_wait failed");
        };
        assert_eq!(platform.set_event(event), Ok(()));
        assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok());
        assert_eq!(platform.unregister_wait(wait), Ok(()));
        assert_eq!(platform.stats().live_waits, 0);
    }

    #[test]
    fn injected_faults_fire_once() {
        let platform = LoopbackPlatform::manual();
        platform.fail_next(NativeOp::CreateEvent, E_OUTOFMEMORY);
        assert_eq!(platform.create_event(), Err(E_OUTOFMEMORY));
        assert!(platform.create_event().is_ok());
    }

    #[test]
    fn read_only_store_rejects_additions() {
        let platform = LoopbackPlatform::manual();
        let Ok(store) = platform.open_store_in_memory() else {
            panic!("open failed");
        };
        assert_eq!(platform.add_certificate(store, &[1, 2]), Ok(()));
        let Ok(size) = platform.save_store_to_memory(store, None) else {
            panic!("size query failed");
        };
        let Ok(mem) = platform.alloc(size) else {
            panic!("alloc failed");
        };
        assert_eq!(
            platform.save_store_to_memory(store, Some((mem, size - 1))),
            Err(E_MORE_DATA)
        );
        assert_eq!(platform.save_store_to_memory(store, Some((mem, size))), Ok(size));
        platform.close_store(store);

        let blob = NativeBlob {
            cb_data: size,
            pb_data: mem,
        };
        let Ok(view) = platform.open_store_from_blob(&blob) else {
            panic!("open from blob failed");
        };
        assert_eq!(platform.first_certificate(view), Ok(Some(vec![1, 2])));
        assert_eq!(platform.add_certificate(view, &[3]), Err(E_ACCESSDENIED));
        platform.close_store(view);
        assert_eq!(platform.stats().live_stores, 0);
    }
}
