//! Output formatting for query results.
//!
//! Two formats: human-oriented colored text, and JSON. The JSON shape of
//! each result is the serialized result record itself; that shape is the
//! external contract.

use colored::*;
use serde::Serialize;

use crate::model::Confidence;
use crate::query::{
    AuditResult, CallersResult, CatchMatchKind, CatchesResult, EntrypointsResult, EscapesResult,
    ExceptionsResult, RaisesResult, RoutesToResult, StatsResult, StubsListResult, SubclassesResult,
    TraceNode, TraceResult,
};

/// Serialize any result record as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn location(file: &str, line: usize) -> String {
    format!("{}:{}", file, line).dimmed().to_string()
}

fn confidence_tag(confidence: Confidence) -> ColoredString {
    match confidence {
        Confidence::High => "high".green(),
        Confidence::Medium => "medium".yellow(),
        Confidence::Low => "low".red(),
    }
}

pub fn print_raises(result: &RaisesResult) {
    if result.include_subclasses && result.types_searched.len() > 1 {
        println!(
            "Raise sites for {} (including {} subclasses):",
            result.exception_type.bold(),
            result.types_searched.len() - 1
        );
    } else {
        println!("Raise sites for {}:", result.exception_type.bold());
    }

    if result.matches.is_empty() {
        println!("  none found");
        return;
    }
    for site in &result.matches {
        let marker = if site.is_reraise {
            " (re-raise)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} in {}{}",
            site.exception_type.red(),
            location(&site.file, site.line),
            site.function.qualified(),
            marker
        );
    }
    println!();
    println!("{} raise site(s)", result.matches.len());
}

pub fn print_catches(result: &CatchesResult) {
    println!("Catch sites for {}:", result.exception_type.bold());

    if result.matches.is_empty() && result.global_handlers.is_empty() {
        println!("  none found");
        return;
    }

    for m in &result.matches {
        let direction = match m.kind {
            CatchMatchKind::Exact => "catches it directly".to_string(),
            CatchMatchKind::CatchesBase => format!("via base class {}", m.matched_type),
            CatchMatchKind::CatchesAll => "catch-all handler".to_string(),
        };
        println!(
            "  {} in {} ({})",
            location(&m.site.file, m.site.line),
            m.site.function.qualified(),
            direction.dimmed()
        );
    }

    if !result.global_handlers.is_empty() {
        println!();
        println!("Global handlers:");
        for handler in &result.global_handlers {
            println!(
                "  {} {} handles {}",
                location(&handler.file, handler.line),
                handler.handler_function.bold(),
                handler.handled_type
            );
        }
    }
}

pub fn print_callers(result: &CallersResult) {
    println!("Callers of {}:", result.function.bold());
    if result.callers.is_empty() {
        println!("  none found");
        return;
    }
    for caller in &result.callers {
        let kind = if caller.resolution.is_heuristic() {
            format!(" [{}]", caller.resolution).yellow().to_string()
        } else {
            String::new()
        };
        println!("  {}{}", caller.caller, kind);
    }
    println!();
    println!("{} caller(s) ({} mode)", result.callers.len(), result.mode);
}

pub fn print_escapes(result: &EscapesResult) {
    println!(
        "Exceptions escaping {} ({} mode):",
        result.function.bold(),
        result.mode
    );
    if result.escapes.is_empty() {
        println!("  {}", "nothing escapes".green());
        return;
    }

    for escape in &result.escapes {
        println!(
            "  {} [{}]",
            escape.exception.red().bold(),
            confidence_tag(escape.confidence)
        );
        if let Some(evidence) = &escape.evidence {
            println!(
                "    raised at {}",
                location(&evidence.origin_file, evidence.origin_line)
            );
            for hop in &evidence.path {
                println!(
                    "    {} {} -> {} [{}]",
                    "via".dimmed(),
                    hop.caller,
                    hop.callee,
                    hop.resolution
                );
            }
        }
    }
}

pub fn print_trace(result: &TraceResult) {
    println!("Trace from {}:", result.function.bold());
    match &result.root {
        None => println!("  (nothing to trace)"),
        Some(root) => print_trace_node(root, 0),
    }
    if !result.escaping.is_empty() {
        println!();
        println!(
            "Escaping: {}",
            result
                .escaping
                .iter()
                .map(|e| e.red().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn print_trace_node(node: &TraceNode, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    if node.cycle {
        println!("{}{} {}", indent, node.function, "…(see above)".dimmed());
        return;
    }

    let mut annotations = Vec::new();
    if !node.direct_raises.is_empty() {
        annotations.push(format!("raises {}", node.direct_raises.join(", ")).red().to_string());
    }
    if !node.escapes.is_empty() {
        annotations.push(format!("escapes {}", node.escapes.join(", ")).dimmed().to_string());
    }
    let suffix = if annotations.is_empty() {
        String::new()
    } else {
        format!("  [{}]", annotations.join("; "))
    };

    println!("{}{}{}", indent, node.function.bold(), suffix);
    for child in &node.calls {
        print_trace_node(child, depth + 1);
    }
}

pub fn print_exceptions(result: &ExceptionsResult) {
    println!("Exception classes:");
    if result.classes.is_empty() {
        println!("  none defined in the scanned tree");
        return;
    }
    for class in &result.classes {
        let root_marker = if class.is_root {
            " (root)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} ({}) {}{}",
            class.name.bold(),
            class.bases.join(", "),
            location(&class.file, class.line),
            root_marker
        );
    }
}

pub fn print_subclasses(result: &SubclassesResult) {
    match (&result.base_file, result.base_line) {
        (Some(file), Some(line)) => println!(
            "Subclasses of {} ({}):",
            result.class_name.bold(),
            location(file, line)
        ),
        _ => println!("Subclasses of {}:", result.class_name.bold()),
    }

    if result.subclasses.is_empty() {
        println!("  none found");
        return;
    }
    for sub in &result.subclasses {
        match (&sub.file, sub.line) {
            (Some(file), Some(line)) => println!("  {} {}", sub.name, location(file, line)),
            _ => println!("  {} {}", sub.name, "(external)".dimmed()),
        }
    }
}

pub fn print_stats(result: &StatsResult) {
    println!("Codebase statistics:");
    println!("  functions:         {}", result.functions);
    println!("  classes:           {}", result.classes);
    println!("  exception classes: {}", result.exception_classes);
    println!("  raise sites:       {}", result.raise_sites);
    println!("  catch sites:       {}", result.catch_sites);
    println!("  call sites:        {}", result.call_sites);
    println!("  imports:           {}", result.imports);
    println!(
        "  entrypoints:       {} ({} HTTP routes, {} CLI scripts)",
        result.entrypoints, result.http_routes, result.cli_scripts
    );
    println!("  global handlers:   {}", result.global_handlers);
    if !result.detected_frameworks.is_empty() {
        println!("  frameworks:        {}", result.detected_frameworks.join(", "));
    }
    if let Some(cache) = &result.cache {
        println!(
            "  cache:             {} entries, {} bytes",
            cache.entries, cache.size_bytes
        );
    }
}

pub fn print_entrypoints(result: &EntrypointsResult) {
    if let Some(framework) = &result.framework {
        println!("Entrypoints ({}):", framework.bold());
    } else {
        println!("Entrypoints:");
    }

    if !result.http_routes.is_empty() {
        println!("  HTTP routes:");
        for ep in &result.http_routes {
            let method = ep.metadata.get("method").map(|m| m.as_str()).unwrap_or("GET");
            let path = ep.metadata.get("path").map(|p| p.as_str()).unwrap_or("?");
            println!(
                "    {} {} -> {} {}",
                method.bold(),
                path,
                ep.function,
                location(&ep.file, ep.line)
            );
        }
    }
    if !result.cli_scripts.is_empty() {
        println!("  CLI scripts:");
        for ep in &result.cli_scripts {
            println!("    {}", location(&ep.file, ep.line));
        }
    }
    if !result.other.is_empty() {
        println!("  Other:");
        for ep in &result.other {
            println!("    {} {}", ep.function, location(&ep.file, ep.line));
        }
    }

    let total = result.http_routes.len() + result.cli_scripts.len() + result.other.len();
    if total == 0 {
        println!("  none found");
    }
}

pub fn print_audit(result: &AuditResult) {
    println!(
        "Audit ({}): {} entrypoint(s), {} clean",
        result.framework.bold(),
        result.total_entrypoints,
        result.clean_count
    );

    for entry in &result.entries {
        if !entry.has_uncaught() {
            continue;
        }
        let ep = &entry.entrypoint;
        let label = match (ep.metadata.get("method"), ep.metadata.get("path")) {
            (Some(method), Some(path)) => format!("{} {}", method, path),
            _ => ep.function.clone(),
        };
        println!();
        println!("  {} {} {}", "✗".red(), label.bold(), location(&ep.file, ep.line));

        for uncaught in &entry.buckets.uncaught {
            let origin = match (&uncaught.origin_file, uncaught.origin_line) {
                (Some(file), Some(line)) => format!(" raised at {}", location(file, line)),
                _ => String::new(),
            };
            println!(
                "      uncaught {} [{}]{}",
                uncaught.exception.red(),
                confidence_tag(uncaught.confidence),
                origin
            );
        }
        for (exception, response) in &entry.buckets.framework_handled {
            println!("      {} {} -> {}", "handled".green(), exception, response);
        }
        for (exception, handler) in &entry.buckets.caught_by_global {
            println!("      {} {} by {}", "caught".green(), exception, handler);
        }
    }

    println!();
    if result.has_uncaught() {
        let failing = result.total_entrypoints - result.clean_count;
        println!(
            "{}: {} entrypoint(s) with uncaught exceptions",
            "FAIL".red().bold(),
            failing
        );
    } else {
        println!("{}: all entrypoints handled", "PASS".green().bold());
    }
}

pub fn print_routes_to(result: &RoutesToResult) {
    println!(
        "Routes reaching {} ({}):",
        result.exception_type.bold(),
        result.framework
    );
    if result.routes.is_empty() {
        println!("  none");
        return;
    }
    for route in &result.routes {
        let ep = &route.entrypoint;
        let label = match (ep.metadata.get("method"), ep.metadata.get("path")) {
            (Some(method), Some(path)) => format!("{} {}", method, path),
            _ => ep.function.clone(),
        };
        println!(
            "  {} {} via {}",
            label.bold(),
            location(&ep.file, ep.line),
            route.matched.join(", ").red()
        );
    }
}

pub fn print_stubs_list(result: &StubsListResult) {
    println!("Registered stubs:");
    if result.modules.is_empty() {
        println!("  none");
        return;
    }
    for module in &result.modules {
        println!("  {}:", module.module.bold());
        for (function, exceptions) in &module.functions {
            println!("    {} -> {}", function, exceptions.join(", "));
        }
    }
}
