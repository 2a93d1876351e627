//! Plotly figure of a knowledge graph.
//!
//! The figure is plain JSON (`{"data": [...], "layout": {...}}`) so the
//! browser can hand it straight to `Plotly.newPlot`.

use serde_json::{Value, json};

use crate::context::cell_text;
use crate::graph::KnowledgeGraph;
use crate::layout::SpringLayout;

const BACKGROUND: &str = "#2D2A2E";
const NODE_COLOR: &str = "#66D9EF";
const EDGE_COLOR: &str = "#A6E22E";
const TEXT_COLOR: &str = "#F8F8F2";
const FONT_FAMILY: &str = "Courier New, monospace";

/// Marker size by degree: hubs are drawn larger.
#[must_use]
pub const fn node_size(degree: usize) -> u32 {
    match degree {
        0..5 => 20,
        5..10 => 35,
        _ => 65,
    }
}

/// Build the figure for `kg` with the default spring layout.
#[must_use]
pub fn visualize_graph(kg: &KnowledgeGraph) -> Value {
    visualize_graph_with(kg, &SpringLayout::default())
}

#[must_use]
pub fn visualize_graph_with(kg: &KnowledgeGraph, layout: &SpringLayout) -> Value {
    let pos = layout.positions(kg.graph());

    let mut edge_x: Vec<Value> = Vec::new();
    let mut edge_y: Vec<Value> = Vec::new();
    let mut edge_text: Vec<Value> = Vec::new();
    for (source, target, attributes) in kg.edges() {
        let description = attributes.get("description").map(cell_text).unwrap_or_default();
        edge_x.extend([json!(pos[source][0]), json!(pos[target][0]), Value::Null]);
        edge_y.extend([json!(pos[source][1]), json!(pos[target][1]), Value::Null]);
        edge_text.extend([json!(description), json!(description), Value::Null]);
    }

    let degrees: Vec<usize> = kg
        .graph()
        .node_indices()
        .map(|idx| kg.degree_of(idx))
        .collect();
    let names: Vec<&str> = kg.node_names().collect();

    let edge_trace = json!({
        "type": "scatter",
        "x": edge_x,
        "y": edge_y,
        "mode": "lines",
        "line": { "width": 0.5, "color": EDGE_COLOR },
        "hoverinfo": "text",
        "text": edge_text,
    });

    let node_trace = json!({
        "type": "scatter",
        "x": pos.iter().map(|p| p[0]).collect::<Vec<_>>(),
        "y": pos.iter().map(|p| p[1]).collect::<Vec<_>>(),
        "mode": "markers+text",
        "text": names,
        "hoverinfo": "text",
        "textposition": "top center",
        "textfont": { "family": FONT_FAMILY, "size": 12, "color": TEXT_COLOR },
        "marker": {
            "showscale": true,
            "colorscale": [[0, NODE_COLOR], [1, NODE_COLOR]],
            "color": degrees,
            "size": degrees.iter().map(|d| node_size(*d)).collect::<Vec<_>>(),
            "line": { "width": 2 },
            "colorbar": {
                "thickness": 15,
                "title": { "text": "Node Connections", "side": "right" },
                "xanchor": "left",
            },
        },
    });

    let hidden_axis = json!({ "showgrid": false, "zeroline": false, "showticklabels": false });
    json!({
        "data": [edge_trace, node_trace],
        "layout": {
            "showlegend": false,
            "hovermode": "closest",
            "margin": { "b": 20, "l": 5, "r": 5, "t": 40 },
            "xaxis": hidden_axis,
            "yaxis": hidden_axis,
            "plot_bgcolor": BACKGROUND,
            "paper_bgcolor": BACKGROUND,
            "font": { "family": FONT_FAMILY, "color": TEXT_COLOR },
            "autosize": true,
        },
    })
}
