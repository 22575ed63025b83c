//! Built-in capabilities.
//!
//! A capability is a named external action a step can invoke with a
//! parameter map: the checkout mechanism, the toolchain installer, and the
//! cache client. They stand in for opaque pre-built collaborators, so their
//! local implementations record what they did rather than talk to real
//! services.

use async_trait::async_trait;
use crosscheck_core::Result;
use crosscheck_core::ports::CacheStore;
use crosscheck_core::run::JobInstance;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const BUILTIN_CAPABILITIES: &[&str] = &["checkout", "toolchain", "cache"];

/// Invocation context handed to a capability.
pub struct CapabilityContext<'a> {
    pub instance: &'a JobInstance,
    pub workspace: &'a Path,
    /// Interpolated `with:` parameters from the step definition.
    pub params: HashMap<String, String>,
    pub cache: &'a dyn CacheStore,
    /// Set when the runner restored this instance's provisioning key before
    /// the step, letting the capability skip redundant work.
    pub provisioned_from_cache: bool,
}

/// Result of a capability invocation.
#[derive(Debug, Default)]
pub struct CapabilityOutcome {
    pub success: bool,
    pub detail: Option<String>,
    pub output: Vec<String>,
    /// Key the runner should save once the job succeeds (advisory).
    pub deferred_save: Option<String>,
}

impl CapabilityOutcome {
    fn ok(output: Vec<String>) -> Self {
        Self {
            success: true,
            detail: None,
            output,
            deferred_save: None,
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
            output: Vec::new(),
            deferred_save: None,
        }
    }
}

/// A named external action dispatched from `uses:` steps.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(&self, ctx: CapabilityContext<'_>) -> Result<CapabilityOutcome>;
}

/// Lookup table for built-in capabilities.
pub struct CapabilityRegistry {
    capabilities: HashMap<&'static str, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn builtin() -> Self {
        let mut capabilities: HashMap<&'static str, Box<dyn Capability>> = HashMap::new();
        for capability in [
            Box::new(CheckoutCapability) as Box<dyn Capability>,
            Box::new(ToolchainCapability),
            Box::new(CacheCapability),
        ] {
            capabilities.insert(capability.name(), capability);
        }
        Self { capabilities }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities.get(name).map(|c| c.as_ref())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Fetches repository content at a commit into the instance workspace.
struct CheckoutCapability;

#[async_trait]
impl Capability for CheckoutCapability {
    fn name(&self) -> &'static str {
        "checkout"
    }

    async fn invoke(&self, ctx: CapabilityContext<'_>) -> Result<CapabilityOutcome> {
        let git_ref = ctx.params.get("ref").map(String::as_str).unwrap_or("HEAD");
        info!(git_ref, workspace = %ctx.workspace.display(), "Checking out repository");

        tokio::fs::write(ctx.workspace.join(".checkout"), git_ref).await?;

        Ok(CapabilityOutcome::ok(vec![format!(
            "checked out {} into {}",
            git_ref,
            ctx.workspace.display()
        )]))
    }
}

/// Provisions the compiler/formatter/linter toolchain the job declared.
struct ToolchainCapability;

#[async_trait]
impl Capability for ToolchainCapability {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    async fn invoke(&self, ctx: CapabilityContext<'_>) -> Result<CapabilityOutcome> {
        let Some(toolchain) = &ctx.instance.environment.toolchain else {
            return Ok(CapabilityOutcome::failed(format!(
                "job {} declares no toolchain",
                ctx.instance.job_name
            )));
        };

        if ctx.provisioned_from_cache {
            info!(channel = %toolchain.channel, "Toolchain restored from cache");
            return Ok(CapabilityOutcome::ok(vec![format!(
                "toolchain {} restored from cache",
                toolchain.channel
            )]));
        }

        info!(
            channel = %toolchain.channel,
            components = ?toolchain.components,
            "Installing toolchain"
        );

        let mut output = vec![format!("installed toolchain {}", toolchain.channel)];
        for component in &toolchain.components {
            output.push(format!("added component {}", component));
        }
        Ok(CapabilityOutcome::ok(output))
    }
}

/// Explicit cache step: restore under the given key, or defer a save of the
/// key for when the job succeeds. Cache trouble degrades to a miss.
struct CacheCapability;

#[async_trait]
impl Capability for CacheCapability {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn invoke(&self, ctx: CapabilityContext<'_>) -> Result<CapabilityOutcome> {
        let Some(key) = ctx.params.get("key") else {
            return Ok(CapabilityOutcome::failed("cache step requires a key parameter"));
        };

        let restored = match ctx.cache.restore(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache restore failed, treating as miss");
                None
            }
        };

        if let Some(entry) = restored {
            return Ok(CapabilityOutcome::ok(vec![format!(
                "cache hit for {} ({} bytes)",
                entry.key, entry.size_bytes
            )]));
        }

        Ok(CapabilityOutcome {
            success: true,
            detail: None,
            output: vec![format!("cache miss for {}", key)],
            deferred_save: Some(key.clone()),
        })
    }
}
