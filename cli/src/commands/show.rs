use std::path::Path;

use anyhow::{Context, Result};
use resdec::{Decompiler, TableSummary};
use resdec_arsc::DecodeOptions;

pub(crate) fn command_show(path: &Path, json: bool, options: DecodeOptions) -> Result<()> {
    let table = Decompiler::new(options)
        .decode_file(path)
        .with_context(|| format!("got error while parsing: {:?}", path))?;

    let summary = TableSummary::from(&table);

    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    for package in &summary.packages {
        let marker = if package.is_main { " (main)" } else { "" };
        println!(
            "package 0x{:02x} {}{}: {} specs",
            package.id, package.name, marker, package.spec_count
        );
        for type_spec in &package.types {
            println!(
                "    {:>3} {:<12} {:>5}/{:<5} entries, {} config(s), {} file(s)",
                type_spec.id,
                type_spec.name,
                type_spec.spec_count,
                type_spec.entry_count,
                type_spec.configs.len(),
                type_spec.file_resources,
            );
        }
    }

    if summary.incomplete {
        println!("note: decode was cancelled before the last chunk");
    }

    Ok(())
}
