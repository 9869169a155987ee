//! rkt backend.
//!
//! `rkt run` stays in the foreground, so the pod lives exactly as long as
//! the transient unit. The pod UUID rkt assigns is saved in the runtime
//! directory and reported as the runtime name.

use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::BackendKind;

use super::{Backend, UnitContext};
use crate::descriptor::DomainSpec;

/// File inside the runtime directory receiving the pod UUID.
pub const POD_UUID_FILE: &str = "pod.uuid";

/// Network used when the descriptor names no bridge.
const DEFAULT_NETWORK: &str = "default";

/// Backend launching rkt pods.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rkt;

impl Backend for Rkt {
    const KIND: BackendKind = BackendKind::Rkt;
    const EXECUTABLE: &'static str = "rkt";

    fn command_line(
        &self,
        program: String,
        ctx: &UnitContext<'_>,
        spec: &DomainSpec,
    ) -> Result<Vec<String>> {
        let image = spec
            .image
            .as_deref()
            .ok_or_else(|| ConvirtError::config(format!("domain {} has no image", spec.vm_id)))?;

        let mut cmd = vec![
            program,
            "--insecure-options=image".to_string(),
            "run".to_string(),
            format!(
                "--uuid-file-save={}",
                ctx.run_dir.join(POD_UUID_FILE).display()
            ),
            format!(
                "--net={}",
                spec.bridge.as_deref().unwrap_or(DEFAULT_NETWORK)
            ),
            image.to_string(),
        ];
        if let Some(kib) = spec.memory_kib {
            cmd.push(format!("--memory={kib}Ki"));
        }
        cmd.push(format!("--cpu={}", spec.vcpus));
        Ok(cmd)
    }

    fn runtime_name(&self, ctx: &UnitContext<'_>) -> Option<String> {
        std::fs::read_to_string(ctx.run_dir.join(POD_UUID_FILE))
            .ok()
            .map(|uuid| uuid.trim().to_string())
            .filter(|uuid| !uuid.is_empty())
    }
}
