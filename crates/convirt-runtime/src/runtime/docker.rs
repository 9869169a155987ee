//! Docker backend.
//!
//! Runs `docker run` in the foreground of the transient unit so systemd
//! supervises the client and accounts its resources.

use convirt_common::constants::UNIT_PREFIX;
use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::BackendKind;

use super::{Backend, UnitContext};
use crate::descriptor::DomainSpec;

/// Backend launching Docker containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Docker;

impl Docker {
    fn container_name(ctx: &UnitContext<'_>) -> String {
        format!("{UNIT_PREFIX}-{}", ctx.runtime_id)
    }
}

impl Backend for Docker {
    const KIND: BackendKind = BackendKind::Docker;
    const EXECUTABLE: &'static str = "docker";

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
            "run".to_string(),
            "--rm".to_string(),
            format!("--name={}", Self::container_name(ctx)),
        ];
        if let Some(kib) = spec.memory_kib {
            cmd.push(format!("--memory={kib}k"));
        }
        cmd.push(format!("--cpus={}", spec.vcpus));
        if let Some(bridge) = &spec.bridge {
            cmd.push(format!("--network={bridge}"));
        }
        cmd.push(image.to_string());
        Ok(cmd)
    }

    fn runtime_name(&self, ctx: &UnitContext<'_>) -> Option<String> {
        Some(Self::container_name(ctx))
    }
}
