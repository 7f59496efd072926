// Append-only shelf placement for new canvas nodes

use crate::graph::{GraphNode, NodeKind, Position};

/// Vertical distance between stacked nodes in one column
pub const NODE_SPACING: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub x: f64,
    pub top: f64,
}

/// Each node kind owns one fixed column
pub fn column_for(kind: NodeKind) -> Column {
    match kind {
        NodeKind::Domain => Column { x: 400.0, top: 50.0 },
        NodeKind::Subdomain => Column { x: 50.0, top: 200.0 },
        NodeKind::Nmap => Column { x: 650.0, top: 200.0 },
        NodeKind::Pathfinder => Column { x: 900.0, top: 200.0 },
    }
}

/// Position for a new node of `kind`: the top of its column, or one spacing
/// below the lowest node already in that column.
pub fn next_position(nodes: &[GraphNode], kind: NodeKind) -> Position {
    let column = column_for(kind);
    let lowest = nodes
        .iter()
        .filter(|n| column_for(n.kind) == column)
        .map(|n| n.position.y)
        .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))));

    match lowest {
        Some(y) => Position {
            x: column.x,
            y: (y + NODE_SPACING).max(column.top),
        },
        None => Position {
            x: column.x,
            y: column.top,
        },
    }
}
