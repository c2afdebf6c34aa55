use crate::backend::{Compilation, ComputeBackend};
use crate::status::{Status, StatusSink};

use super::{KernelError, OptionMap};

/// Entry point every kernel must define.
pub const ENTRY_POINT: &str = "Main";

/// Compiles `sources` with the overridden `options` as defines.
///
/// Build problems are reported to `status` as well as returned, so an
/// interactive caller can simply keep its previous kernel. Only a
/// multi-device backend is a hard precondition failure.
pub fn build<B: ComputeBackend>(
    backend: &B,
    sources: &[String],
    options: &OptionMap,
    status: &dyn StatusSink,
) -> Result<B::Program, KernelError> {
    let devices = backend.device_count();
    if devices > 1 {
        return Err(KernelError::MultiDeviceAmbiguity { devices });
    }

    if let Some(bad) = options.invalid_define() {
        let err = KernelError::InvalidOptionSyntax {
            key: bad.key.clone(),
            value: bad.value.clone(),
        };
        status.report(Status::Alert(&err.to_string()));
        return Err(err);
    }

    let flags = options.define_flags();
    log::debug!("building kernel from {} source(s) with `{flags}`", sources.len());

    match backend.compile(sources, &flags, ENTRY_POINT) {
        Compilation::Built { program, log } => {
            let log = log.trim();
            if !log.is_empty() {
                status.report(Status::Warning(log));
            }
            Ok(program)
        }
        Compilation::Failed { log } => {
            status.report(Status::Alert(&log));
            Err(KernelError::BuildFailure { log })
        }
    }
}
