//! In-memory compute backend and status sink for driving the kernel core
//! without a GPU.

#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use clam_engine::backend::{Compilation, ComputeBackend, DeviceError, KernelArgs};
use clam_engine::kernel::LaunchGeometry;
use clam_engine::status::{Status, StatusSink};

/// Program handle: remembers the option string it was built with.
#[derive(Debug)]
pub struct MockProgram {
    pub options: String,
}

#[derive(Debug)]
pub struct MockBuffer {
    pub texels: usize,
}

#[derive(Debug)]
pub struct MockQueue;

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub options: String,
    pub words: Vec<u32>,
    pub local: [u32; 2],
    pub global: [u32; 2],
    pub offset: [u32; 2],
}

#[derive(Debug, Default, Clone)]
pub struct Log {
    /// Option string of every compile, in call order.
    pub compiles: Vec<String>,
    pub dispatches: Vec<Dispatch>,
    pub buffers: Vec<usize>,
    pub queues: usize,
    pub readbacks: usize,
    pub finishes: usize,
    pub group_queries: usize,
}

struct Gate {
    options: String,
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Records every call. Sources containing `#error` (or options containing
/// `=fail`) fail to build; sources containing `#warning` build with a
/// warning log.
pub struct RecordingBackend {
    pub devices: usize,
    pub max_group: u64,
    pub buffer_limit: usize,
    /// Readback returns this pattern repeated over the buffer.
    pub pattern: Vec<[f32; 4]>,
    log: Mutex<Log>,
    gate: Mutex<Option<Gate>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            devices: 1,
            max_group: 256,
            buffer_limit: usize::MAX,
            pattern: vec![[0.5, 0.5, 0.5, 1.0]],
            log: Mutex::new(Log::default()),
            gate: Mutex::new(None),
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_buffer_limit(mut self, texels: usize) -> Self {
        self.buffer_limit = texels;
        self
    }

    pub fn with_pattern(mut self, pattern: Vec<[f32; 4]>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }

    /// Makes the next compile with exactly `options` block until the returned
    /// sender fires. The receiver fires once that compile has started.
    pub fn block_compile(&self, options: &str) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            options: options.to_string(),
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    fn wait_at_gate(&self, options: &str) {
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            match slot.as_ref() {
                Some(g) if g.options == options => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }
    }
}

impl ComputeBackend for RecordingBackend {
    type Program = MockProgram;
    type Buffer = MockBuffer;
    type Queue = MockQueue;

    fn device_count(&self) -> usize {
        self.devices
    }

    fn max_group_size(&self, _queue: &MockQueue) -> u64 {
        self.log().group_queries += 1;
        self.max_group
    }

    fn compile(
        &self,
        sources: &[String],
        options: &str,
        _entry_point: &str,
    ) -> Compilation<MockProgram> {
        self.log().compiles.push(options.to_string());
        self.wait_at_gate(options);

        if options.contains("=fail") || sources.iter().any(|s| s.contains("#error")) {
            return Compilation::Failed {
                log: "error: kernel rejected".to_string(),
            };
        }
        let log = if sources.iter().any(|s| s.contains("#warning")) {
            "  warning: unused variable\n".to_string()
        } else {
            String::new()
        };
        Compilation::Built {
            program: MockProgram {
                options: options.to_string(),
            },
            log,
        }
    }

    fn create_queue(&self) -> Result<MockQueue, DeviceError> {
        self.log().queues += 1;
        Ok(MockQueue)
    }

    fn create_buffer(&self, texels: usize) -> Result<MockBuffer, DeviceError> {
        if texels > self.buffer_limit {
            return Err(DeviceError::BufferTooLarge {
                requested: texels as u64 * 16,
                limit: self.buffer_limit as u64 * 16,
            });
        }
        self.log().buffers.push(texels);
        Ok(MockBuffer { texels })
    }

    fn enqueue(
        &self,
        _queue: &MockQueue,
        program: &mut MockProgram,
        _buffer: &MockBuffer,
        args: &KernelArgs,
        geometry: &LaunchGeometry<2>,
        offset: [u32; 2],
    ) -> Result<(), DeviceError> {
        let words = args.words()?;
        self.log().dispatches.push(Dispatch {
            options: program.options.clone(),
            words,
            local: geometry.local,
            global: geometry.global,
            offset,
        });
        Ok(())
    }

    fn read_buffer(
        &self,
        _queue: &MockQueue,
        buffer: &MockBuffer,
    ) -> Result<Vec<[f32; 4]>, DeviceError> {
        self.log().readbacks += 1;
        Ok(self.pattern.iter().copied().cycle().take(buffer.texels).collect())
    }

    fn finish(&self, _queue: &MockQueue) -> Result<(), DeviceError> {
        self.log().finishes += 1;
        Ok(())
    }
}

/// Owned copy of a [`Status`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Info(String),
    Progress(u32),
    Alert(String),
    Warning(String),
}

#[derive(Debug, Default)]
pub struct RecordingStatus {
    reports: Mutex<Vec<Recorded>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Recorded> {
        self.reports.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u32> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Warning(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Alert(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Info(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for RecordingStatus {
    fn report(&self, status: Status<'_>) {
        let recorded = match status {
            Status::Info(text) => Recorded::Info(text.to_string()),
            Status::Progress(p) => Recorded::Progress(p),
            Status::Alert(text) => Recorded::Alert(text.to_string()),
            Status::Warning(text) => Recorded::Warning(text.to_string()),
        };
        self.reports.lock().unwrap().push(recorded);
    }
}
