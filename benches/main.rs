#![allow(
    missing_docs,
    clippy::missing_docs_in_private_items,
    unused_results,
    clippy::unwrap_used
)]


use criterion::Criterion;

fn main() {
    store::benches();
    Criterion::default().configure_from_args().final_summary();
}
