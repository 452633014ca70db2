use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use btree_core::{Error, Id, Item, NaturalOrder, Node, NodeRepository, Result, SequentialIdGenerator, StoreDescriptor, Tree};

/// Minimal in-memory repository for the standalone benchmark binary. Kept
/// self-contained here rather than pulled from `btree-test-support`, which is
/// a dev-dependency and unavailable to a plain `cargo run --bin`.
#[derive(Default)]
struct MemoryRepo {
    nodes: HashMap<Id, Node<u64, u64>>,
}

impl NodeRepository<u64, u64> for MemoryRepo {
    fn get(&mut self, id: Id) -> Result<Option<Node<u64, u64>>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn add(&mut self, node: &Node<u64, u64>) -> Result<()> {
        self.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn update(&mut self, node: &Node<u64, u64>) -> Result<()> {
        if !self.nodes.contains_key(&node.id()) {
            return Err(Error::repository(format!("update of unknown node {}", node.id())));
        }
        self.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn remove(&mut self, id: Id) -> Result<()> {
        self.nodes.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct NoopTracker;

impl btree_core::ItemActionTracker<u64, u64> for NoopTracker {
    fn add(&mut self, _item: &Item<u64, u64>) -> Result<()> {
        Ok(())
    }
    fn get(&mut self, _item: &Item<u64, u64>) -> Result<()> {
        Ok(())
    }
    fn update(&mut self, _item: &Item<u64, u64>) -> Result<()> {
        Ok(())
    }
    fn remove(&mut self, _item: &Item<u64, u64>) -> Result<()> {
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct Output {
    implementation: &'static str,
    storage: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
struct Extra {
    slot_length: usize,
    count: u64,
}

fn main() {
    let mut count: u64 = 2_000;
    let mut slot_length: usize = 64;
    let mut out_file: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            count = val.parse().unwrap_or(count);
        } else if let Some(val) = arg.strip_prefix("--slot-length=") {
            slot_length = val.parse().unwrap_or(slot_length);
        } else if let Some(val) = arg.strip_prefix("--out=") {
            out_file = Some(PathBuf::from(val));
        }
    }

    let descriptor = StoreDescriptor::new(slot_length, true, true, true).unwrap();
    let mut tree = Tree::new(descriptor, MemoryRepo::default(), NoopTracker, SequentialIdGenerator::default(), NaturalOrder).unwrap();

    let start = Instant::now();
    for i in 0..count {
        tree.add(i, Some(i)).unwrap();
    }
    for i in (0..count).step_by(2) {
        tree.remove(i).unwrap();
    }
    for i in (1..count).step_by(2) {
        tree.find(i, false).unwrap();
    }
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let total_ops = count + (count / 2) + (count / 2);

    let output = Output {
        implementation: "btree-core-memory",
        storage: "memory",
        workload: format!("add-remove-find-{count}"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        name: format!("add-remove-find-{count}"),
        total_ops,
        duration_ms,
        ops_per_sec: if duration_ms > 0.0 { (total_ops as f64) / duration_ms * 1000.0 } else { f64::INFINITY },
        extra: Extra { slot_length, count },
        source_file: out_file.as_ref().map(|p| p.display().to_string()),
    };

    let json = serde_json::to_string_pretty(&output).expect("serialize");
    if let Some(path) = out_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdirs");
        }
        fs::write(&path, &json).expect("write output");
    }
    println!("{json}");
}
