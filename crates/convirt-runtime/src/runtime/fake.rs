//! Placeholder backend whose workload only sleeps.
//!
//! Goes through the real runner, so it exercises the whole systemd path
//! without any container engine installed.

use convirt_common::error::Result;
use convirt_common::types::BackendKind;

use super::{Backend, UnitContext};
use crate::descriptor::DomainSpec;

/// Backend running `sleep infinity` in place of a container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fake;

impl Backend for Fake {
    const KIND: BackendKind = BackendKind::Fake;
    const EXECUTABLE: &'static str = "sleep";

    fn command_line(
        &self,
        program: String,
        _ctx: &UnitContext<'_>,
        _spec: &DomainSpec,
    ) -> Result<Vec<String>> {
        Ok(vec![program, "infinity".to_string()])
    }

    fn runtime_name(&self, ctx: &UnitContext<'_>) -> Option<String> {
        Some(ctx.unit_name.to_string())
    }
}
