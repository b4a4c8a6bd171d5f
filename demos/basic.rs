//! Basic example of using concatext as a library
//!
//! Packs `./src` into `./export/src_01.txt`, `./export/src_02.txt`, ...

use concatext::{Config, Pipeline};

fn main() -> anyhow::Result<()> {
    let config = Config::builder()
        .root_dir("./src")
        .output_dir("./export")
        .build()?;

    let stats = Pipeline::new(config)?.run()?;

    print!("{}", stats.render_summary());

    println!(
        "✓ Packed {} files into {} output files",
        stats.total_source_files(),
        stats.records.len()
    );

    Ok(())
}
