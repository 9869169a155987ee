//! Rebuilding the registry after a restart.

use std::sync::Arc;

use convirt_common::error::Result;
use convirt_runtime::discovery;

use crate::context::DomainContext;
use crate::descriptor_file::DescriptorFile;
use crate::domain::Domain;

/// Recovers every live unit that has a saved descriptor.
///
/// Units without a descriptor and units already bound to a registered
/// domain are skipped. A unit that fails to recover is logged and skipped
/// so the others still come back.
///
/// # Errors
///
/// Returns an error if the live units cannot be listed or the registry
/// lock is poisoned.
pub fn recover_all(ctx: &DomainContext) -> Result<Vec<Arc<Domain>>> {
    let runtime_ids = discovery::get_all(&ctx.repo)?;
    tracing::debug!(count = runtime_ids.len(), "discovered live units");

    let mut recovered = Vec::new();
    for runtime_id in runtime_ids {
        if ctx.registry.find_by_runtime(&runtime_id)?.is_some() {
            tracing::debug!(runtime_id = %runtime_id, "unit already bound, skipping");
            continue;
        }
        let file = DescriptorFile::new(&ctx.config.run_dir, &runtime_id);
        if !file.exists() {
            tracing::warn!(runtime_id = %runtime_id, "no saved descriptor for live unit");
            continue;
        }
        let descriptor = match file.load() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(runtime_id = %runtime_id, error = %e, "cannot read saved descriptor");
                continue;
            }
        };
        match Domain::recover(runtime_id.clone(), descriptor, ctx) {
            Ok(domain) => recovered.push(domain),
            Err(e) => {
                tracing::error!(runtime_id = %runtime_id, error = %e, "failed to recover unit");
            }
        }
    }
    tracing::info!(count = recovered.len(), "recovery complete");
    Ok(recovered)
}
