use flowcanvas::geometry::coords::GraphVector;
use flowcanvas::model::{Connection, Node, NodeId, Port};
use flowcanvas::Editor;
use std::time::Instant;

// Rows of nodes chained left to right, so every node carries two connections.
fn build_chain_grid(editor: &mut Editor, nodes: usize) {
    let cols = 100usize;
    for i in 0..nodes {
        let (c, r) = (i % cols, i / cols);
        let n = Node::new(format!("n{}", i), c as f64 * 160.0, r as f64 * 100.0, 120.0, 60.0)
            .with_port(Port::input("in"))
            .with_port(Port::output("out"));
        if editor.add_node(n).is_err() {
            return;
        }
        if c > 0 {
            let conn = Connection::new(format!("c{}", i), (format!("n{}", i - 1), "out"), (format!("n{}", i), "in"));
            let _ = editor.add_connection(conn);
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() { return 0.0; }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len()-1)]
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut nodes = 5000usize;
    let mut moves = 1000usize;
    let mut assert_ms: Option<f64> = None;
    for a in &args[1..] {
        if let Some(val)=a.strip_prefix("--nodes=") { if let Ok(v)=val.parse() { nodes=v; } }
        else if let Some(val)=a.strip_prefix("--moves=") { if let Ok(v)=val.parse() { moves=v; } }
        else if let Some(val)=a.strip_prefix("--assert-ms=") { if let Ok(v)=val.parse() { assert_ms=Some(v); } }
    }

    let mut ed = Editor::default();
    build_chain_grid(&mut ed, nodes);
    let version_before = ed.spatial_version();

    // Drag a node from the middle of the grid with several others selected.
    let primary = format!("n{}", nodes / 2);
    let others: Vec<NodeId> = (0..8).map(|k| format!("n{}", (nodes / 2 + k * 7) % nodes.max(1)).into()).collect();
    ed.select_nodes(&others, false);
    if let Err(e) = ed.start_node_drag(&primary) {
        eprintln!("could not start drag: {}", e);
        std::process::exit(2);
    }

    let mut times_ms: Vec<f64> = Vec::with_capacity(moves);
    let start_all = Instant::now();
    for k in 0..moves {
        let d = GraphVector::new(if k % 2 == 0 { 3.0 } else { -1.0 }, 1.5);
        let t0 = Instant::now();
        let _ = ed.move_node_drag(d);
        let _ = ed.visible_nodes();
        times_ms.push(t0.elapsed().as_secs_f64() * 1000.0);
    }
    let version_mid = ed.spatial_version();
    let t_end = Instant::now();
    let _ = ed.end_node_drag();
    let end_ms = t_end.elapsed().as_secs_f64() * 1000.0;
    let dur_all = start_all.elapsed().as_secs_f64() * 1000.0;

    times_ms.sort_by(|a,b| a.total_cmp(b));
    let med = percentile(&times_ms, 0.5);
    let p90 = percentile(&times_ms, 0.9);
    let p99 = percentile(&times_ms, 0.99);
    println!(
        "nodes={} moves={} index_bumps_during_drag={} index_bumps_total={} total_ms={:.3} end_ms={:.3} median_ms={:.4} p90_ms={:.4} p99_ms={:.4}",
        nodes, moves, version_mid - version_before, ed.spatial_version() - version_before, dur_all, end_ms, med, p90, p99
    );
    if let Some(th) = assert_ms { if med > th { eprintln!("FAIL: median {:.4} ms > threshold {:.3} ms", med, th); std::process::exit(1); } }
}
