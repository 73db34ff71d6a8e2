//! Query command implementation.
//!
//! Loads an entity snapshot and runs a filter against it.

use std::path::PathBuf;

use caldav_query::{
    Entity, MemoryStore, PropertyId, QueryCoordinator, RetrievalScope, StandardPropertyIndex,
};
use tracing::debug;

use super::{read_filter, CommandContext, Result};

/// Options for the query command.
#[derive(Debug)]
pub struct QueryOptions {
    /// Filter file.
    pub filter: PathBuf,
    /// Entity snapshot file.
    pub snapshot: PathBuf,
    /// Collections to search; empty means all.
    pub collections: Vec<String>,
    /// Include nested collections.
    pub recursive: bool,
}

/// Executes the query command.
///
/// # Errors
///
/// Returns an error if the filter or snapshot cannot be loaded, or if the
/// query fails.
pub async fn execute(ctx: &CommandContext, opts: &QueryOptions) -> Result<()> {
    let config = ctx.load_config()?;
    let filter = read_filter(&opts.filter)?;
    let store = MemoryStore::load(&opts.snapshot).await?;
    let total = store.len();
    debug!(entities = total, "snapshot loaded");

    let scope = RetrievalScope {
        collections: opts.collections.clone(),
        recursive: opts.recursive,
    };
    let coordinator = QueryCoordinator::new(store, StandardPropertyIndex::new(), config);
    let found = coordinator.run_query(&filter, &scope).await?;

    if ctx.verbose {
        eprintln!("Matched {} of {} entities", found.len(), total);
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        print!("{}", format_entities(&found));
    }
    Ok(())
}

/// Formats matched entities as one line each.
pub fn format_entities(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return "No matching entities.\n".to_string();
    }

    let mut out = String::new();
    for entity in entities {
        let summary = entity
            .component
            .property(PropertyId::Summary)
            .map(|p| p.value.as_str())
            .unwrap_or("");
        out.push_str(&format!(
            "{:<9} {}  {}\n",
            entity.kind().component_name(),
            entity.href,
            summary
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use caldav_query::{Component, EntityKind, Property};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_format_no_entities() {
        assert_eq!(format_entities(&[]), "No matching entities.\n");
    }

    #[test]
    fn test_format_entities() {
        let entities = vec![
            Entity::new(
                "/cal/1.ics",
                "/cal/",
                Component::new(EntityKind::Event)
                    .with_property(Property::new(PropertyId::Summary, "Standup")),
            ),
            Entity::new("/cal/2.ics", "/cal/", Component::new(EntityKind::Todo)),
        ];
        assert_eq!(
            format_entities(&entities),
            "VEVENT    /cal/1.ics  Standup\nVTODO     /cal/2.ics  \n"
        );
    }

    #[tokio::test]
    async fn test_execute_runs_query() {
        let dir = tempdir().unwrap();
        let filter = dir.path().join("filter.json");
        let snapshot = dir.path().join("snapshot.json");
        let config = dir.path().join("config.toml");
        fs::write(
            &filter,
            r#"{"name":"comp-filter","attributes":{"name":"VCALENDAR"},
                "children":[{"name":"comp-filter","attributes":{"name":"VTODO"}}]}"#,
        )
        .unwrap();
        let entities = vec![
            Entity::new("/cal/1.ics", "/cal/", Component::new(EntityKind::Event)),
            Entity::new("/cal/2.ics", "/cal/", Component::new(EntityKind::Todo)),
        ];
        fs::write(&snapshot, serde_json::to_string(&entities).unwrap()).unwrap();

        let ctx = CommandContext {
            json_output: true,
            verbose: false,
            config_path: Some(config),
        };
        let opts = QueryOptions {
            filter,
            snapshot,
            collections: vec!["/cal/".to_string()],
            recursive: false,
        };
        execute(&ctx, &opts).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_missing_snapshot() {
        let dir = tempdir().unwrap();
        let filter = dir.path().join("filter.json");
        fs::write(&filter, r#"{"name":"comp-filter","attributes":{"name":"VCALENDAR"}}"#)
            .unwrap();

        let ctx = CommandContext {
            json_output: false,
            verbose: false,
            config_path: Some(dir.path().join("config.toml")),
        };
        let opts = QueryOptions {
            filter,
            snapshot: dir.path().join("missing.json"),
            collections: Vec::new(),
            recursive: false,
        };
        let err = execute(&ctx, &opts).await.unwrap_err();
        assert!(!err.is_client_error());
    }
}
