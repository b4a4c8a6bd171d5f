//! Dry run example
//!
//! Previews how a tree would be split without writing anything, using a
//! small budget and an in-memory store to inspect the packed text.

use concatext::{Config, MemoryStore, Pipeline, TokenizerKind};

fn main() -> anyhow::Result<()> {
    let config = Config::builder()
        .root_dir("./src")
        .max_tokens(5_000)
        .tokenizer(TokenizerKind::Simple)
        .ignore_patterns(vec!["*.lock".to_string()])
        .dry_run(true)
        .build()?;

    let mut store = MemoryStore::new();
    let stats = Pipeline::new(config)?.run_with_store(&mut store)?;

    println!("Would have generated {} output files:", stats.records.len());
    for (record, (_, content)) in stats.records.iter().zip(store.artifacts()) {
        let first_line = content.lines().next().unwrap_or_default();
        println!(
            "  {:<20} {:>7} tokens  {:>3} files  starts with {:?}",
            record.filename, record.token_count, record.source_file_count, first_line
        );
    }

    Ok(())
}
