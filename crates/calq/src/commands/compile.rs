//! Compile command implementation.
//!
//! Shows what a filter compiles to: the predicate pushed down to the store
//! and the prop-filters left for post-filtering.

use std::path::PathBuf;

use caldav_query::filter::{EventQuery, FilterCompiler};
use caldav_query::StandardPropertyIndex;

use super::{read_filter, CommandContext, Result};

/// Options for the compile command.
#[derive(Debug)]
pub struct CompileOptions {
    /// Filter file to compile.
    pub filter: PathBuf,
}

/// Executes the compile command.
///
/// # Errors
///
/// Returns an error if the filter cannot be read or does not compile.
pub fn execute(ctx: &CommandContext, opts: &CompileOptions) -> Result<()> {
    let config = ctx.load_config()?;
    let filter = read_filter(&opts.filter)?;

    let index = StandardPropertyIndex::new();
    let query = FilterCompiler::new(&index)
        .with_mode(config.post_filter.mode)
        .with_floating_tz(config.time_range.floating_timezone.as_deref())
        .compile(&filter)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&query)?);
    } else {
        print!("{}", format_query(&query));
    }
    Ok(())
}

/// Formats a compiled query for terminal output.
pub fn format_query(query: &EventQuery) -> String {
    let mut out = String::new();

    match &query.root {
        Some(root) => out.push_str(&format!("Predicate: {root:?}\n")),
        None => out.push_str("Predicate: (match all)\n"),
    }

    let kinds: Vec<&str> = query.kinds.iter().map(|k| k.component_name()).collect();
    if !kinds.is_empty() {
        out.push_str(&format!("Components: {}\n", kinds.join(", ")));
    }

    if let Some(residual) = &query.residual {
        out.push_str(&format!("Residual: {residual:?}\n"));
    }

    if query.post_filter_required {
        out.push_str("Post-filter:\n");
        for (kind, groups) in &query.deferred {
            for group in groups {
                let names: Vec<&str> = group.filters.iter().map(|f| f.name.as_str()).collect();
                out.push_str(&format!(
                    "  {} ({:?}): {}\n",
                    kind.component_name(),
                    group.test,
                    names.join(", ")
                ));
            }
        }
    } else {
        out.push_str("Post-filter: none\n");
    }

    out
}
