//! Resource tags

use super::ResourceContext;
use crate::error::{DriverError, Result, Step};
use machineflow_cloud::Tag;

/// Parse one `key=value` tag; the value may be empty, the key may not
pub fn parse_tag(s: &str) -> Result<Tag> {
    let invalid = || {
        DriverError::InvalidConfig(format!(
            "the tag '{}' does not have the right syntax 'key=value'",
            s
        ))
    };

    let mut parts = s.split('=');
    let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if key.is_empty() {
        return Err(invalid());
    }

    Ok(Tag::new(key, value))
}

/// Parse a comma-separated list of tags, ignoring empty entries
pub fn parse_tags(list: &str) -> Result<Vec<Tag>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_tag)
        .collect()
}

/// Apply `tags` to a resource in a single call
pub async fn add_tags(ctx: &ResourceContext, resource_id: &str, tags: &[Tag]) -> Result<()> {
    if tags.is_empty() {
        tracing::debug!("Skipping because there are no tags to add");
        return Ok(());
    }

    tracing::debug!("Adding {} tag(s) to {}", tags.len(), resource_id);
    let ids = [resource_id.to_string()];
    ctx.call(Step::CreateTags, || ctx.api.create_tags(&ids, tags))
        .await
}

pub async fn add_tag(ctx: &ResourceContext, resource_id: &str, key: &str, value: &str) -> Result<()> {
    add_tags(ctx, resource_id, &[Tag::new(key, value)]).await
}
