//! Owning wrappers around native handles.
//!
//! [`OwnedHandle`] owns one long-lived handle (wait primitive, wait
//! registration, event registration) and releases it exactly once: either
//! explicitly through [`OwnedHandle::release`] or on drop. The tri-state
//! [`HandleState`] makes a second release of the same value a no-op.
//!
//! [`ScopedData`], [`ScopedStore`] and [`NativeBuffer`] cover the short-lived
//! acquisitions made by the drain loop and the credential codec.

use std::fmt;
use std::mem;
use std::sync::Arc;

use super::platform::{
    CollabPlatform, DataHandle, EventHandle, MemHandle, NativeResult, RegistrationHandle,
    StoreHandle, WaitHandle,
};

/// A handle kind that can be released through the platform.
pub trait Releasable: Copy + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Releases `handle`.
    ///
    /// # Errors
    ///
    /// Returns the native status code of the release call.
    fn release(platform: &dyn CollabPlatform, handle: Self) -> NativeResult<()>;
}

impl Releasable for EventHandle {
    fn release(platform: &dyn CollabPlatform, handle: Self) -> NativeResult<()> {
        platform.close_event(handle)
    }
}

impl Releasable for WaitHandle {
    fn release(platform: &dyn CollabPlatform, handle: Self) -> NativeResult<()> {
        platform.unregister_wait(handle)
    }
}

impl Releasable for RegistrationHandle {
    fn release(platform: &dyn CollabPlatform, handle: Self) -> NativeResult<()> {
        platform.unregister_event(handle)
    }
}

/// Lifecycle of an owned handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState<H> {
    /// No handle has been acquired yet.
    Unregistered,
    /// The handle is live and owned.
    Active(H),
    /// The handle was released; it must never be released again.
    Released,
}

/// Exclusive owner of a native handle.
pub struct OwnedHandle<H: Releasable> {
    platform: Arc<dyn CollabPlatform>,
    state: HandleState<H>,
}

impl<H: Releasable> OwnedHandle<H> {
    /// Creates an owner that holds nothing yet.
    #[must_use]
    pub fn unregistered(platform: Arc<dyn CollabPlatform>) -> Self {
        Self {
            platform,
            state: HandleState::Unregistered,
        }
    }

    /// Takes ownership of a freshly acquired handle.
    #[must_use]
    pub fn active(platform: Arc<dyn CollabPlatform>, handle: H) -> Self {
        Self {
            platform,
            state: HandleState::Active(handle),
        }
    }

    /// Returns the live handle, if any.
    #[must_use]
    pub fn get(&self) -> Option<H> {
        match self.state {
            HandleState::Active(handle) => Some(handle),
            HandleState::Unregistered | HandleState::Released => None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> HandleState<H> {
        self.state
    }

    /// Returns `true` while the handle is live.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.get().is_some()
    }

    /// Releases the handle if it is live. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the status code of the native release call. The handle is
    /// considered released even when the call fails.
    pub fn release(&mut self) -> NativeResult<()> {
        match mem::replace(&mut self.state, HandleState::Released) {
            HandleState::Active(handle) => {
                tracing::trace!(%handle, "releasing native handle");
                H::release(&*self.platform, handle)
            }
            HandleState::Unregistered => {
                self.state = HandleState::Unregistered;
                Ok(())
            }
            HandleState::Released => Ok(()),
        }
    }
}

impl<H: Releasable> Drop for OwnedHandle<H> {
    fn drop(&mut self) {
        let handle = self.get();
        if let Err(code) = self.release() {
            tracing::warn!(?handle, code, "native handle release failed on drop");
        }
    }
}

impl<H: Releasable> fmt::Debug for OwnedHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A dequeued native event record, freed when the guard goes out of scope.
pub struct ScopedData<'a> {
    platform: &'a dyn CollabPlatform,
    handle: DataHandle,
}

impl<'a> ScopedData<'a> {
    /// Takes ownership of a record returned by `get_event_data`.
    #[must_use]
    pub fn new(platform: &'a dyn CollabPlatform, handle: DataHandle) -> Self {
        Self { platform, handle }
    }

    /// Returns the record handle.
    #[must_use]
    pub fn handle(&self) -> DataHandle {
        self.handle
    }
}

impl Drop for ScopedData<'_> {
    fn drop(&mut self) {
        self.platform.free_data(self.handle);
    }
}

impl fmt::Debug for ScopedData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedData").field(&self.handle).finish()
    }
}

/// An open certificate store, closed when the guard goes out of scope.
pub struct ScopedStore<'a> {
    platform: &'a dyn CollabPlatform,
    handle: StoreHandle,
}

impl<'a> ScopedStore<'a> {
    /// Takes ownership of an open store.
    #[must_use]
    pub fn new(platform: &'a dyn CollabPlatform, handle: StoreHandle) -> Self {
        Self { platform, handle }
    }

    /// Returns the store handle.
    #[must_use]
    pub fn handle(&self) -> StoreHandle {
        self.handle
    }
}

impl Drop for ScopedStore<'_> {
    fn drop(&mut self) {
        self.platform.close_store(self.handle);
    }
}

impl fmt::Debug for ScopedStore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedStore").field(&self.handle).finish()
    }
}

/// Native memory owned by the caller of an encode operation.
///
/// The memory stays allocated for as long as the value lives, so any
/// [`super::NativeBlob`] pointing into it stays valid. Ownership can be
/// handed to the native side with [`NativeBuffer::into_raw`].
pub struct NativeBuffer {
    platform: Arc<dyn CollabPlatform>,
    mem: Option<MemHandle>,
    len: u32,
}

impl NativeBuffer {
    /// Allocates `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns the status code of the failed allocation.
    pub fn alloc(platform: &Arc<dyn CollabPlatform>, len: u32) -> NativeResult<Self> {
        let mem = platform.alloc(len)?;
        Ok(Self {
            platform: Arc::clone(platform),
            mem: Some(mem),
            len,
        })
    }

    /// Returns the memory handle.
    #[must_use]
    pub fn handle(&self) -> MemHandle {
        self.mem.unwrap_or(MemHandle::NULL)
    }

    /// Returns the allocation size in bytes.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns `true` for a zero-sized allocation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gives up ownership without freeing the memory.
    #[must_use]
    pub fn into_raw(mut self) -> MemHandle {
        self.mem.take().unwrap_or(MemHandle::NULL)
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if let Some(mem) = self.mem.take() {
            self.platform.free(mem);
        }
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("mem", &self.mem)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::native::LoopbackPlatform;

    fn platform() -> (Arc<LoopbackPlatform>, Arc<dyn CollabPlatform>) {
        let loopback = Arc::new(LoopbackPlatform::manual());
        let dyn_platform: Arc<dyn CollabPlatform> = Arc::clone(&loopback) as Arc<dyn CollabPlatform>;
        (loopback, dyn_platform)
    }

    #[test]
    fn owned_handle_releases_once() {
        let (loopback, platform) = platform();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        let mut owned = OwnedHandle::active(Arc::clone(&platform), event);
        assert!(owned.is_valid());
        assert_eq!(loopback.stats().live_events, 1);

        assert_eq!(owned.release(), Ok(()));
        assert_eq!(owned.state(), HandleState::Released);
        assert_eq!(loopback.stats().live_events, 0);

        // Neither an explicit second release nor the drop touches the
        // native side again.
        assert_eq!(owned.release(), Ok(()));
        drop(owned);
        assert_eq!(loopback.stats().invalid_releases, 0);
    }

    #[test]
    fn unregistered_handle_stays_unregistered() {
        let (_loopback, platform) = platform();
        let mut owned: OwnedHandle<RegistrationHandle> = OwnedHandle::unregistered(platform);
        assert_eq!(owned.release(), Ok(()));
        assert_eq!(owned.state(), HandleState::Unregistered);
        assert!(owned.get().is_none());
    }

    #[test]
    fn drop_releases_active_handle() {
        let (loopback, platform) = platform();
        let Ok(event) = platform.create_event() else {
            panic!("create_event failed");
        };
        {
            let _owned = OwnedHandle::active(Arc::clone(&platform), event);
        }
        assert_eq!(loopback.stats().live_events, 0);
    }

    #[test]
    fn native_buffer_frees_unless_released_to_native() {
        let (loopback, platform) = platform();
        let Ok(buffer) = NativeBuffer::alloc(&platform, 8) else {
            panic!("alloc failed");
        };
        assert_eq!(buffer.len(), 8);
        assert_eq!(loopback.stats().live_memory, 1);
        drop(buffer);
        assert_eq!(loopback.stats().live_memory, 0);

        let Ok(buffer) = NativeBuffer::alloc(&platform, 4) else {
            panic!("alloc failed");
        };
        let raw = buffer.into_raw();
        assert!(!raw.is_null());
        assert_eq!(loopback.stats().live_memory, 1);
        platform.free(raw);
        assert_eq!(loopback.stats().live_memory, 0);
    }

    #[test]
    fn scoped_store_closes_on_drop() {
        let (loopback, platform) = platform();
        let Ok(store) = platform.open_store_in_memory() else {
            panic!("open failed");
        };
        {
            let guard = ScopedStore::new(&*platform, store);
            assert_eq!(guard.handle(), store);
            assert_eq!(loopback.stats().live_stores, 1);
        }
        assert_eq!(loopback.stats().live_stores, 0);
    }
}
