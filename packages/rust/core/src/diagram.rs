//! Mermaid flowchart for a pipeline.

use pluqqy_shared::{ComponentType, Pipeline, Settings};

/// Build a `flowchart TD` with one subgraph per non-empty section, chained in
/// section order and ending at the output file.
///
/// `name_of` maps a canonical component path to its display name.
pub fn pipeline_diagram(
    pipeline: &Pipeline,
    settings: &Settings,
    output_name: &str,
    name_of: impl Fn(&str) -> String,
) -> String {
    let mut lines = vec![
        "flowchart TD".to_string(),
        format!("    pipeline([\"{}\"])", escape(&pipeline.name)),
    ];
    let mut chain: Vec<&'static str> = vec!["pipeline"];

    let mut node = 0;
    for t in settings.section_order() {
        let members: Vec<_> = pipeline
            .components
            .iter()
            .filter(|c| c.component_type == t)
            .collect();
        if members.is_empty() {
            continue;
        }
        let id = section_id(t);
        lines.push(format!("    subgraph {id}[\"{}\"]", escape(settings.heading_for(t))));
        let mut previous: Option<usize> = None;
        for c in members {
            node += 1;
            lines.push(format!(
                "        c{node}[\"{}\"]",
                escape(&name_of(c.canonical_path()))
            ));
            if let Some(p) = previous {
                lines.push(format!("        c{p} --> c{node}"));
            }
            previous = Some(node);
        }
        lines.push("    end".to_string());
        chain.push(id);
    }

    lines.push(format!("    output[/\"{}\"/]", escape(output_name)));
    chain.push("output");
    lines.push(format!("    {}", chain.join(" --> ")));
    lines.join("\n") + "\n"
}

/// Wrap a mermaid definition in a standalone HTML page.
pub fn diagram_html(title: &str, mermaid: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script type="module">
import mermaid from "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs";
mermaid.initialize({{ startOnLoad: true, theme: "dark" }});
</script>
<style>body {{ background: #1e1e1e; color: #ddd; font-family: sans-serif; }}</style>
</head>
<body>
<h1>{title}</h1>
<pre class="mermaid">
{mermaid}</pre>
</body>
</html>
"#,
        title = html_escape(title),
        mermaid = html_escape(mermaid),
    )
}

fn section_id(t: ComponentType) -> &'static str {
    match t {
        ComponentType::Rules => "rules",
        ComponentType::Context => "contexts",
        ComponentType::Prompt => "prompts",
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "#quot;")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
