// Core sessions
//
// A `CoreSession` owns a loaded core together with the handle it issued.
// The handle is released exactly once: by `release`, or on drop.

use crate::bridge::BufferBridge;
use crate::core::{CoreError, CoreHandle, CoreModule};

/// A live core session
pub struct CoreSession {
    core: Box<dyn CoreModule>,
    handle: CoreHandle,
    released: bool,
}

impl CoreSession {
    pub fn handle(&self) -> CoreHandle {
        self.handle
    }

    pub fn core(&self) -> &dyn CoreModule {
        self.core.as_ref()
    }

    pub fn core_mut(&mut self) -> &mut dyn CoreModule {
        self.core.as_mut()
    }

    /// Release the handle now and report the result
    pub fn release(mut self) -> Result<(), CoreError> {
        self.released = true;
        self.core.release_session(self.handle)
    }
}

impl Drop for CoreSession {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.core.release_session(self.handle);
        }
    }
}

impl std::fmt::Debug for CoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreSession")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish()
    }
}

/// Copy the ROM and save image into the core and start a session
///
/// The staging buffers are freed again once the core has taken its copy,
/// whether or not the session was created.
///
/// # Errors
///
/// Allocation, trap and rejection errors from the core; nothing is retried
pub fn open_session(
    mut core: Box<dyn CoreModule>,
    rom: &[u8],
    save: Option<&[u8]>,
) -> Result<CoreSession, CoreError> {
    let mut bridge = BufferBridge::new(core.as_mut());
    let rom_buffer = bridge.alloc_with(rom)?;
    let save_buffer = match save {
        Some(bytes) => match bridge.alloc_with(bytes) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                let _ = bridge.free(rom_buffer);
                return Err(e);
            }
        },
        None => None,
    };

    let result = core.initialize_session(
        rom_buffer.region(),
        save_buffer.as_ref().map(|b| b.region()),
    );

    let mut bridge = BufferBridge::new(core.as_mut());
    let _ = bridge.free(rom_buffer);
    if let Some(buffer) = save_buffer {
        let _ = bridge.free(buffer);
    }

    let handle = result?;
    Ok(CoreSession {
        core,
        handle,
        released: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Ptr, StepEvents};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Calls {
        allocs: Vec<usize>,
        frees: Vec<Ptr>,
        inits: Vec<(Vec<u8>, Option<Vec<u8>>)>,
        releases: Vec<u32>,
    }

    struct LoggingCore {
        memory: Vec<u8>,
        next: Ptr,
        reject_alloc_over: usize,
        reject_session: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl LoggingCore {
        fn new(calls: Arc<Mutex<Calls>>) -> Self {
            Self {
                memory: vec![0u8; 1024],
                next: 8,
                reject_alloc_over: usize::MAX,
                reject_session: false,
                calls,
            }
        }
    }

    impl CoreModule for LoggingCore {
        fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError> {
            if size > self.reject_alloc_over {
                return Err(CoreError::AllocationFailed { size });
            }
            self.calls.lock().unwrap().allocs.push(size);
            let ptr = self.next;
            self.next += size as Ptr;
            Ok(ptr)
        }

        fn free(&mut self, ptr: Ptr) -> Result<(), CoreError> {
            self.calls.lock().unwrap().frees.push(ptr);
            Ok(())
        }

        fn initialize_session(
            &mut self,
            rom: (Ptr, usize),
            save: Option<(Ptr, usize)>,
        ) -> Result<CoreHandle, CoreError> {
            let read = |(ptr, len): (Ptr, usize)| self.memory[ptr as usize..ptr as usize + len].to_vec();
            let record = (read(rom), save.map(read));
            self.calls.lock().unwrap().inits.push(record);
            if self.reject_session {
                return Err(CoreError::SessionRejected);
            }
            Ok(CoreHandle(3))
        }

        fn release_session(&mut self, handle: CoreHandle) -> Result<(), CoreError> {
            self.calls.lock().unwrap().releases.push(handle.0);
            Ok(())
        }

        fn step(&mut self, _handle: CoreHandle, _target: u64) -> Result<StepEvents, CoreError> {
            Ok(StepEvents::TICKS_REACHED)
        }

        fn current_cycle_count(&mut self, _handle: CoreHandle) -> Result<u64, CoreError> {
            Ok(0)
        }

        fn frame_buffer_pointer(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
            Ok(0)
        }

        fn set_input_mask(&mut self, _handle: CoreHandle, _mask: u32) -> Result<(), CoreError> {
            Ok(())
        }

        fn export_save(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
            Ok(0)
        }

        fn flush_audio(&mut self, _handle: CoreHandle) -> Result<usize, CoreError> {
            Ok(0)
        }

        fn audio_buffer_pointer(&mut self) -> Result<Ptr, CoreError> {
            Ok(0)
        }

        fn memory(&self) -> &[u8] {
            &self.memory
        }

        fn memory_mut(&mut self) -> &mut [u8] {
            &mut self.memory
        }
    }

    #[test]
    fn test_open_session_copies_rom_and_save() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let core = Box::new(LoggingCore::new(Arc::clone(&calls)));

        let session = open_session(core, &[1, 2, 3], Some(&[9, 9])).unwrap();
        assert_eq!(session.handle(), CoreHandle(3));

        let calls_now = calls.lock().unwrap();
        assert_eq!(calls_now.allocs, vec![3, 2]);
        assert_eq!(calls_now.inits, vec![(vec![1, 2, 3], Some(vec![9, 9]))]);
        // staging buffers are freed after initialisation
        assert_eq!(calls_now.frees, vec![8, 11]);
    }

    #[test]
    fn test_session_released_once_on_drop() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let core = Box::new(LoggingCore::new(Arc::clone(&calls)));
        let session = open_session(core, &[1], None).unwrap();
        drop(session);
        assert_eq!(calls.lock().unwrap().releases, vec![3]);
    }

    #[test]
    fn test_explicit_release_is_not_repeated() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let core = Box::new(LoggingCore::new(Arc::clone(&calls)));
        let session = open_session(core, &[1], None).unwrap();
        session.release().unwrap();
        assert_eq!(calls.lock().unwrap().releases, vec![3]);
    }

    #[test]
    fn test_allocation_failure_is_propagated() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut core = LoggingCore::new(Arc::clone(&calls));
        core.reject_alloc_over = 4;

        let result = open_session(Box::new(core), &[0; 16], None);
        assert_eq!(result.err(), Some(CoreError::AllocationFailed { size: 16 }));
        assert!(calls.lock().unwrap().inits.is_empty());
    }

    #[test]
    fn test_save_allocation_failure_frees_rom() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut core = LoggingCore::new(Arc::clone(&calls));
        core.reject_alloc_over = 4;

        let result = open_session(Box::new(core), &[0; 4], Some(&[0; 8]));
        assert!(result.is_err());
        let calls_now = calls.lock().unwrap();
        assert_eq!(calls_now.frees, vec![8]);
        assert!(calls_now.inits.is_empty());
    }

    #[test]
    fn test_rejected_session_frees_buffers() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut core = LoggingCore::new(Arc::clone(&calls));
        core.reject_session = true;

        let result = open_session(Box::new(core), &[1, 2], None);
        assert_eq!(result.err(), Some(CoreError::SessionRejected));
        let calls_now = calls.lock().unwrap();
        assert_eq!(calls_now.frees, vec![8]);
        assert!(calls_now.releases.is_empty());
    }
}
