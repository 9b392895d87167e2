//! Log every node created, named and updated, through a global plugin.
//!
//! Run with `cargo run --example global_logging`.

use std::sync::Arc;

use ripple_core::graph::Node;
use ripple_core::reactive::{Plugin, Runtime, Signal};

struct ConsoleLogger;

impl Plugin for ConsoleLogger {
    fn created(&self, node: &Node) {
        println!("created {}", node.label());
    }

    fn named(&self, node: &Node) {
        println!("named   {}", node.label());
    }

    fn updated(&self, node: &Node) {
        println!("updated {} (version {})", node.label(), node.version());
    }
}

fn main() {
    let _logger = Runtime::register_plugin(Arc::new(ConsoleLogger));

    let x = Signal::new(1).with_name("x");
    let y = (&x + 2).with_name("y");
    let z = (&x - &y).with_name("z");

    x.set(19);
    x.set(2);
    println!("z = {}", z.get());

    x.set(12);
    println!("y = {}, z = {}", y.get(), z.get());
}
