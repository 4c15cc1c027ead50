use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use resdec::Decompiler;
use resdec_arsc::DecodeOptions;

pub(crate) fn command_decode(path: &Path, output: &Path, options: DecodeOptions) -> Result<()> {
    let decompiler = Decompiler::new(options);
    let summary = decompiler
        .decompile(path, output)
        .with_context(|| format!("got error while decompiling: {:?}", path))?;

    for file in &summary.written {
        println!("{}", file.display());
    }

    if let Some(err) = summary.first_error {
        warn!("decompiled with unresolved references, first: {}", err);
        anyhow::bail!("completed with decode errors");
    }

    Ok(())
}
