// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the pure helpers for tests and scripting
pub use handlers::{
    ScanOptions, build_tool_config, parse_port_list, parse_ports_range, parse_status_list,
    render_graph_summary, render_notice, render_result,
};
