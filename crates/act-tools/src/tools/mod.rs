//! The tool catalogue.
//!
//! Pass-through browser tools map one-to-one onto bridge commands; the
//! composed tools layer assertions, visual regression, and session handling
//! on top of one or more commands.

pub mod assertions;
pub mod browser;
pub mod network;
pub mod session_ctl;
pub mod visual;

use std::sync::Arc;

use anyhow::Result;

use crate::context::ToolContext;
use crate::registry::ToolRegistry;

/// Build the full agent-visible catalogue against the shared context.
pub fn build_registry(ctx: &Arc<ToolContext>) -> Result<ToolRegistry> {
    let registry = ToolRegistry::new();
    browser::register(&registry, ctx)?;
    assertions::register(&registry, ctx)?;
    visual::register(&registry, ctx)?;
    network::register(&registry, ctx)?;
    session_ctl::register(&registry, ctx)?;
    Ok(registry)
}
