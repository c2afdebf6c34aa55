use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::ComputeBackend;
use crate::status::{Status, StatusSink};

use super::{
    build, extract_options, KernelError, KernelOption, OptionMap, OptionSnapshot, RestoreReport,
};

/// A built program plus state that lives exactly as long as it.
pub(super) struct KernelInstance<P> {
    pub(super) program: P,
    /// Group size derived from the device on first dispatch.
    pub(super) local_size: Option<[u32; 2]>,
}

pub(super) struct Slot<P> {
    pub(super) instance: Option<KernelInstance<P>>,
    /// Ticket of the build (or disposal) that produced `instance`.
    ticket: u64,
}

/// A kernel program that can be rebuilt in place while other threads
/// dispatch it.
///
/// The program slot is guarded by one mutex shared by dispatch, rebuild and
/// disposal. Compilation itself runs outside that lock; only the swap of the
/// finished program happens under it. An empty slot (failed build, disposed)
/// turns dispatch into a no-op.
pub struct CompiledKernel<B: ComputeBackend> {
    backend: Arc<B>,
    sources: Arc<[String]>,
    options: Mutex<OptionMap>,
    slot: Mutex<Slot<B::Program>>,
    next_ticket: AtomicU64,
    status: Arc<dyn StatusSink>,
}

impl<B: ComputeBackend> CompiledKernel<B> {
    /// Extracts the declared options from `sources` and builds the kernel with
    /// their source defaults.
    ///
    /// Fails if that first build fails; the error has already been reported
    /// to `status`.
    pub fn create(
        backend: Arc<B>,
        sources: Vec<String>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self, KernelError> {
        let options = extract_options(&sources);
        log::debug!("kernel declares {} option(s)", options.len());

        let program = build(&*backend, &sources, &options, &*status)?;

        Ok(Self {
            backend,
            sources: sources.into(),
            options: Mutex::new(options),
            slot: Mutex::new(Slot {
                instance: Some(KernelInstance {
                    program,
                    local_size: None,
                }),
                ticket: 0,
            }),
            next_ticket: AtomicU64::new(1),
            status,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn status(&self) -> &Arc<dyn StatusSink> {
        &self.status
    }

    /// Whether a program is currently installed.
    pub fn is_built(&self) -> bool {
        self.lock_slot().instance.is_some()
    }

    /// Group size cached by the installed program, if it has dispatched yet.
    pub fn cached_local_size(&self) -> Option<[u32; 2]> {
        self.lock_slot().instance.as_ref().and_then(|i| i.local_size)
    }

    /// All declared options, declaration order.
    pub fn options(&self) -> Vec<KernelOption> {
        self.lock_options().iter().cloned().collect()
    }

    pub fn option(&self, key: &str) -> Option<KernelOption> {
        self.lock_options().get(key).cloned()
    }

    /// Overrides option `key`. Takes effect on the next [`rebuild`](Self::rebuild).
    pub fn set_option(&self, key: &str, value: &str) -> Result<(), KernelError> {
        self.lock_options().set(key, value)
    }

    /// Drops the override of `key`, falling back to the source default.
    pub fn reset_option(&self, key: &str) -> Result<(), KernelError> {
        self.lock_options().reset(key)
    }

    /// Current option values for persistence.
    pub fn serialize(&self) -> OptionSnapshot {
        self.lock_options().snapshot()
    }

    /// Loads persisted option values.
    ///
    /// Keys this kernel does not declare are reported as warnings and
    /// skipped; the returned report tells the caller whether that happened.
    pub fn restore(&self, snapshot: &OptionSnapshot) -> RestoreReport {
        let report = self.lock_options().restore(snapshot);
        for key in &report.unknown {
            self.status.report(Status::Warning(&format!(
                "option {key} was invalid (was the snapshot saved for another kernel?)"
            )));
        }
        report
    }

    /// Rebuilds from the kernel sources with the current options.
    ///
    /// On success the new program replaces the old one. On failure the slot is
    /// emptied and dispatch becomes a no-op until a later rebuild succeeds. A
    /// rebuild that finishes after a newer rebuild (or disposal) has already
    /// been installed is discarded.
    pub fn rebuild(&self) -> Result<(), KernelError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let options = self.lock_options().clone();

        let built = build(&*self.backend, &self.sources, &options, &*self.status);

        let mut slot = self.lock_slot();
        if ticket < slot.ticket {
            log::debug!("discarding stale kernel rebuild #{ticket}");
            return built.map(drop);
        }
        slot.ticket = ticket;
        match built {
            Ok(program) => {
                slot.instance = Some(KernelInstance {
                    program,
                    local_size: None,
                });
                log::info!("kernel rebuilt");
                Ok(())
            }
            Err(err) => {
                slot.instance = None;
                Err(err)
            }
        }
    }

    /// Releases the program. Later dispatches are no-ops; in-flight rebuilds
    /// started before this call are discarded.
    pub fn dispose(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.lock_slot();
        slot.ticket = slot.ticket.max(ticket);
        slot.instance = None;
    }

    pub(super) fn lock_slot(&self) -> MutexGuard<'_, Slot<B::Program>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_options(&self) -> MutexGuard<'_, OptionMap> {
        self.options.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
