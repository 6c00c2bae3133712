//! `shadegen validate`: build and finalize a graph, report its shape.

use anyhow::{Context, Result};
use shadegen_gen::{create_graph, ScopeKind, ShaderGraph};

use super::Request;

fn scope_label(kind: ScopeKind) -> &'static str {
    match kind {
        ScopeKind::Global => "global",
        ScopeKind::Single => "branch",
        ScopeKind::Multiple => "branches",
        ScopeKind::Unknown => "unused",
    }
}

fn report(graph: &ShaderGraph) -> Vec<String> {
    graph
        .ordered_nodes()
        .enumerate()
        .map(|(index, node)| {
            format!(
                "  {:>3}. {:<24} {:<16} {}",
                index + 1,
                node.name,
                node.category,
                scope_label(node.scope.kind)
            )
        })
        .collect()
}

/// Fails on any generation error, cycles included.
pub fn run(request: &Request) -> Result<()> {
    let (doc, mut ctx) = request.prepare()?;
    let graph = create_graph(&doc, &request.element, &request.element, &mut ctx)
        .with_context(|| format!("validating '{}' for {}", request.element, ctx.target()))?;

    println!(
        "'{}' is valid for {}: {} nodes, {} inputs, {} outputs",
        request.element,
        ctx.target(),
        graph.node_count(),
        graph.input_sockets().len(),
        graph.output_sockets().len()
    );
    for line in report(&graph) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_document;

    #[test]
    fn constant_graph_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_document(dir.path());
        run(&Request::new(&doc, "out", "slang")).unwrap();
    }

    #[test]
    fn unknown_element_fails() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_document(dir.path());
        let err = run(&Request::new(&doc, "missing", "glsl")).unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
    }
}
