use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, info};
use resdec_arsc::{ArscError, DecodeOptions, Decoder, Emitter, ResourceTable, publicize};

use crate::errors::DecompilerError;

/// Result of one decompile run.
#[derive(Debug)]
pub struct DecompileSummary {
    /// Files written under the output directory, in emission order.
    pub written: Vec<PathBuf>,
    /// First non-fatal resolution failure, for callers that want to signal
    /// a degraded run.
    pub first_error: Option<ArscError>,
}

/// Drives one decode/emit session over a `resources.arsc` file.
pub struct Decompiler {
    options: DecodeOptions,
}

impl Decompiler {
    pub fn new(options: DecodeOptions) -> Decompiler {
        Decompiler { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Read and decode a resource table from disk.
    pub fn decode_file(&self, path: &Path) -> Result<ResourceTable, DecompilerError> {
        let file = fs::File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;

        if input.is_empty() {
            return Err(DecompilerError::InvalidInput("got empty file"));
        }

        self.decode_bytes(&input)
    }

    pub fn decode_bytes(&self, input: &[u8]) -> Result<ResourceTable, DecompilerError> {
        let table = Decoder::new(self.options).decode(input)?;
        debug!("decoded {} package(s)", table.package_count());
        Ok(table)
    }

    /// Decode `arsc_path` and write `res/values*/…` documents plus
    /// `res/values/public.xml` under `out_dir`.
    pub fn decompile(
        &self,
        arsc_path: &Path,
        out_dir: &Path,
    ) -> Result<DecompileSummary, DecompilerError> {
        let table = self.decode_file(arsc_path)?;
        self.emit(&table, out_dir)
    }

    /// Emit the XML tree for an already-decoded table.
    pub fn emit(
        &self,
        table: &ResourceTable,
        out_dir: &Path,
    ) -> Result<DecompileSummary, DecompilerError> {
        let res_dir = out_dir.join("res");
        let mut written = Vec::new();

        let mut emitter = Emitter::new(table);

        let public = emitter.public_xml()?;
        let public_path = res_dir.join("values").join("public.xml");
        write_file(&public_path, public.as_bytes())?;
        written.push(public_path);

        for document in emitter.values_documents()? {
            let path = res_dir.join(&document.path);
            write_file(&path, document.content.as_bytes())?;
            written.push(path);
        }

        info!("emitted {} value document(s)", written.len());

        Ok(DecompileSummary {
            written,
            first_error: emitter.first_error(),
        })
    }

    /// Flip the public flag on every spec of `arsc_path`, writing the
    /// patched table to `output` (or back in place). All other bytes are
    /// preserved exactly.
    pub fn publicize_file(
        &self,
        arsc_path: &Path,
        output: Option<&Path>,
    ) -> Result<(), DecompilerError> {
        let mut data = fs::read(arsc_path)?;
        if data.is_empty() {
            return Err(DecompilerError::InvalidInput("got empty file"));
        }

        // a decode pass surfaces the flag regions to patch
        let table = Decoder::new(self.options).decode(&data)?;
        let regions = table.flag_regions();
        publicize(&mut data, &regions)?;

        fs::write(output.unwrap_or(arsc_path), &data)?;
        info!("publicized {} flag region(s)", regions.len());
        Ok(())
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), DecompilerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}
