//! Resource registry: longest-prefix provider routing plus the
//! in-memory reference provider (`spec.md` §4.5).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::context::{RegistryInfo, RequestContext};
use crate::error::{CoreError, CoreResult};

use super::common::{new_execution_info, Counters, RegistryMetrics};

/// Contents of a resource, returned by [`ResourceProvider::read`].
#[derive(Debug, Clone)]
pub struct ResourceContent {
    /// The resource's canonical URI.
    pub uri: String,
    /// MIME type of `text`.
    pub mime_type: String,
    /// The resource body.
    pub text: String,
}

/// A single page of resource listings.
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    /// The resources on this page.
    pub items: Vec<ResourceDescriptor>,
    /// Opaque cursor for the next page, absent on the final page.
    pub next_cursor: Option<String>,
}

/// Lightweight descriptor for a listed resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    /// The resource's URI.
    pub uri: String,
    /// Human-readable name, if any.
    pub name: Option<String>,
}

/// A provider backing some subset of resource URIs, registered under
/// a `uriPattern` prefix.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Read the resource at `uri`, which is guaranteed to start with
    /// this provider's registered prefix.
    async fn read(&self, uri: &str) -> CoreResult<ResourceContent>;

    /// List this provider's resources, honoring `cursor` if given.
    async fn list(&self, cursor: Option<&str>) -> CoreResult<ResourcePage>;
}

/// In-memory reference [`ResourceProvider`] (`spec.md` §4.5): fixed
/// page size 50, cursor is the next start index as a decimal string,
/// the final page omits `nextCursor`.
pub struct InMemoryResourceProvider {
    entries: Vec<ResourceContent>,
}

const PAGE_SIZE: usize = 50;

impl InMemoryResourceProvider {
    /// Build a provider serving exactly `entries`, in the given order.
    pub fn new(entries: Vec<ResourceContent>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl ResourceProvider for InMemoryResourceProvider {
    async fn read(&self, uri: &str) -> CoreResult<ResourceContent> {
        self.entries
            .iter()
            .find(|entry| entry.uri == uri)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Resource", uri))
    }

    async fn list(&self, cursor: Option<&str>) -> CoreResult<ResourcePage> {
        let start: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| CoreError::InvalidParams(format!("Invalid cursor '{c}'")))?,
            None => 0,
        };
        let end = (start + PAGE_SIZE).min(self.entries.len());
        let items = self.entries[start.min(self.entries.len())..end]
            .iter()
            .map(|e| ResourceDescriptor {
                uri: e.uri.clone(),
                name: None,
            })
            .collect();
        let next_cursor = (end < self.entries.len()).then(|| end.to_string());
        Ok(ResourcePage { items, next_cursor })
    }
}

/// Registry of URI-pattern-routed resource providers (`spec.md` §4.5).
pub struct ResourceRegistry {
    providers: DashMap<String, Arc<dyn ResourceProvider>>,
    counters: Counters,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("len", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl ResourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Register a provider under `uri_pattern`, rejecting duplicates.
    pub fn register(
        &self,
        uri_pattern: impl Into<String>,
        provider: Arc<dyn ResourceProvider>,
    ) -> CoreResult<()> {
        let uri_pattern = uri_pattern.into();
        if self.providers.contains_key(&uri_pattern) {
            return Err(CoreError::already_registered("Resource provider", &uri_pattern));
        }
        self.providers.insert(uri_pattern, provider);
        Ok(())
    }

    /// Remove a provider by its exact registered pattern.
    pub fn unregister(&self, uri_pattern: &str) -> CoreResult<()> {
        self.providers
            .remove(uri_pattern)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("Resource provider", uri_pattern))
    }

    /// Remove every registered provider.
    pub fn clear(&self) {
        self.providers.clear();
    }

    /// True iff at least one provider is registered (`spec.md` §4.3 dynamic capability).
    pub fn is_present(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Current success/failure counters.
    pub fn metrics(&self) -> RegistryMetrics {
        self.counters.snapshot()
    }

    /// Find the provider whose registered pattern is an exact match,
    /// or else the longest prefix of `uri` (`spec.md` §4.5).
    fn find_provider(&self, uri: &str) -> Option<Arc<dyn ResourceProvider>> {
        if let Some(exact) = self.providers.get(uri) {
            return Some(Arc::clone(&exact));
        }
        self.providers
            .iter()
            .filter(|entry| uri.starts_with(entry.key().as_str()))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Read a resource by URI, routing through the longest matching prefix.
    pub async fn get(&self, uri: &str, ctx: &mut RequestContext) -> CoreResult<ResourceContent> {
        let result = self.get_inner(uri, ctx).await;
        match &result {
            Ok(_) => self.counters.record_success(),
            Err(_) => self.counters.record_failure(),
        }
        result
    }

    async fn get_inner(
        &self,
        uri: &str,
        ctx: &mut RequestContext,
    ) -> CoreResult<ResourceContent> {
        let provider = self
            .find_provider(uri)
            .ok_or_else(|| CoreError::NotFound(format!("No provider found for resource '{uri}'")))?;

        ctx.registry = Some(RegistryInfo {
            kind: "resource",
            metadata: serde_json::json!({"uri": uri})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });
        ctx.execution = Some(new_execution_info("resource", uri));

        provider.read(uri).await
    }

    /// List resources across every provider, absorbing (logging, not
    /// propagating) per-provider errors (`spec.md` §4.5).
    pub async fn list(&self, cursor: Option<&str>) -> Vec<ResourceDescriptor> {
        let mut items = Vec::new();
        let providers: Vec<_> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (pattern, provider) in providers {
            match provider.list(cursor).await {
                Ok(page) => items.extend(page.items),
                Err(err) => warn!(pattern = %pattern, error = %err, "resource provider list failed"),
            }
        }
        items
    }

    /// Wrap a [`ResourceContent`] as the `resources/read` wire shape
    /// (`spec.md` §4.7): `{contents:[{uri, mimeType, text}]}`'s element.
    pub fn as_wire_value(content: &ResourceContent) -> Value {
        serde_json::json!({
            "uri": content.uri,
            "mimeType": content.mime_type,
            "text": content.text,
        })
    }
}
