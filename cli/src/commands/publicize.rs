use std::path::Path;

use anyhow::{Context, Result};
use resdec::Decompiler;
use resdec_arsc::DecodeOptions;

pub(crate) fn command_publicize(
    path: &Path,
    output: Option<&Path>,
    options: DecodeOptions,
) -> Result<()> {
    Decompiler::new(options)
        .publicize_file(path, output)
        .with_context(|| format!("got error while publicizing: {:?}", path))?;

    println!("{}", output.unwrap_or(path).display());
    Ok(())
}
