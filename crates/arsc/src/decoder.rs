use log::{debug, warn};
use winnow::error::ErrMode;
use winnow::stream::Stream;

use crate::errors::ArscError;
use crate::model::{
    Bag, FlagRegion, LibraryEntry, Overlayable, OverlayablePolicy, Package, ResSpec, ResourceId,
    ResourceTable, SpecOrigin, StagedAlias, TypeSpec, Value,
};
use crate::session::{CancelFn, DecodeOptions, Session};
use crate::structs::chunk::{
    ByteSource, ChunkHeader, ChunkType, skip_chunk_body, skip_header_padding,
};
use crate::structs::string_pool::StringPool;
use crate::structs::table_chunks::{
    Entry, EntryData, LibraryChunk, OverlayableChunk, OverlayablePolicyChunk, PackageHeader,
    StagedAliasChunk, TableHeader, TypeChunk, TypeSpecChunk,
};
use crate::structs::value::{RawValue, decode_value};

/// Packages never chosen as "main" when others are present.
const FRAMEWORK_PACKAGE_NAMES: [&str; 2] = ["android", "com.htc"];

/// Decodes a `resources.arsc` stream into a [`ResourceTable`].
///
/// One decoder drives one session; independent sessions may run in
/// parallel, nothing here is shared.
pub struct Decoder<'a> {
    session: Session<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(options: DecodeOptions) -> Decoder<'a> {
        Decoder {
            session: Session::new(options),
        }
    }

    /// Attach a cancellation predicate, polled between chunks.
    pub fn with_cancel(options: DecodeOptions, cancel: &'a CancelFn<'a>) -> Decoder<'a> {
        Decoder {
            session: Session::with_cancel(options, cancel),
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.session.options
    }

    /// Decode a complete resource table from `data`.
    pub fn decode(&self, data: &[u8]) -> Result<ResourceTable, ArscError> {
        let source = ByteSource::new(data);
        let mut input = data;

        if data.len() < ChunkHeader::size_of() + 4 {
            return Err(ArscError::IoFailure("table header"));
        }

        let table_header = TableHeader::parse(&mut input)
            .map_err(|_| ArscError::IoFailure("table header"))?;
        skip_header_padding(&table_header.header, ChunkHeader::size_of() + 4, &mut input)?;

        if table_header.header.kind != ChunkType::Table {
            let err = self
                .session
                .recover(ArscError::UnknownChunkType(table_header.header.kind.code()))?;
            warn!("input does not start with a table chunk: {}", err);
        }
        if table_header.package_count == 0 {
            warn!("table declares no resource packages");
        }

        // the global pool holds every value string in the table
        let checkpoint = input.checkpoint();
        let global_pool = match StringPool::parse(&mut input, self.session.lenient()) {
            Ok(pool) => pool,
            Err(_) if self.session.lenient() => {
                input.reset(&checkpoint);
                let header = ChunkHeader::parse(&mut input)
                    .map_err(|_| ArscError::IoFailure("global string pool"))?;
                skip_chunk_body(&header, &mut input)?;
                warn!("global string pool unreadable, continuing with an empty one");
                StringPool::default()
            }
            Err(_) => return Err(ArscError::IoFailure("global string pool")),
        };

        let mut packages: Vec<Package> = Vec::new();
        let mut incomplete = false;

        loop {
            if self.session.cancelled() {
                if !self.session.lenient() {
                    return Err(ArscError::Cancelled);
                }
                incomplete = true;
                break;
            }
            if input.is_empty() {
                break;
            }

            if !self.session.lenient() {
                source.check_alignment(input)?;
            }

            let checkpoint = input.checkpoint();
            let header = match ChunkHeader::parse(&mut input) {
                Ok(header) => header,
                Err(ErrMode::Backtrack(_)) | Err(ErrMode::Incomplete(_)) => break,
                Err(_) => return Err(ArscError::IoFailure("chunk header")),
            };

            if let Err(err) = source.check_chunk(&header, input) {
                self.session.recover(err)?;
                warn!("truncated trailing chunk, stopping");
                break;
            }

            match header.kind {
                ChunkType::TablePackage => {
                    input.reset(&checkpoint);
                    let package =
                        self.decode_package(&source, &mut input, &global_pool, &mut incomplete)?;
                    packages.push(package);
                    if incomplete {
                        break;
                    }
                }
                other => {
                    let err = self.session.recover(ArscError::UnknownChunkType(other.code()))?;
                    warn!("skipping unexpected chunk: {}", err);
                    skip_chunk_body(&header, &mut input)?;
                }
            }
        }

        let main_ids = if self.session.options.analysis_mode {
            packages.iter().map(|p| p.id).collect()
        } else {
            select_main_packages(&packages)
        };

        let mut table = ResourceTable::new();
        table.incomplete = incomplete;
        for package in packages {
            let is_main = main_ids.contains(&package.id);
            if let Err(err) = table.add_package(package, is_main) {
                self.session.recover(err.clone())?;
                warn!("dropping duplicate package: {}", err);
            }
        }

        Ok(table)
    }

    fn decode_package(
        &self,
        source: &ByteSource,
        input: &mut &[u8],
        global_pool: &StringPool,
        incomplete: &mut bool,
    ) -> Result<Package, ArscError> {
        let package_start = source.offset(input);

        let header = ChunkHeader::parse(input).map_err(|_| ArscError::IoFailure("package header"))?;
        let package_header = PackageHeader::parse(header, input)
            .map_err(|_| ArscError::IoFailure("package header"))?;

        let id = package_header.id as u8;
        if id == 0 && !self.session.options.shared_library {
            let err = self.session.recover(ArscError::UnsupportedFeature(
                "package id 0 requires the shared_library option",
            ))?;
            warn!("{}", err);
        }

        debug!(
            "package 0x{:02x} '{}' at offset 0x{:x}",
            id, package_header.name, package_start
        );

        let mut package = Package::new(id, package_header.name.clone());

        // the type and key symbol pools sit at offsets from the package start
        self.seek_to(source, input, package_start, package_header.type_strings_offset)?;
        package.type_strings = StringPool::parse(input, self.session.lenient())
            .map_err(|_| ArscError::IoFailure("type string pool"))?;

        self.seek_to(source, input, package_start, package_header.key_strings_offset)?;
        package.key_strings = StringPool::parse(input, self.session.lenient())
            .map_err(|_| ArscError::IoFailure("key string pool"))?;

        let package_end = package_start + package_header.header.size as usize;

        while source.offset(input) < package_end && !input.is_empty() {
            if self.session.cancelled() {
                if !self.session.lenient() {
                    return Err(ArscError::Cancelled);
                }
                *incomplete = true;
                return Ok(package);
            }

            if !self.session.lenient() {
                source.check_alignment(input)?;
            }

            let chunk_start = source.offset(input);
            let checkpoint = input.checkpoint();
            let header = match ChunkHeader::parse(input) {
                // the next package begins; hand control back
                Ok(h) if h.kind == ChunkType::TablePackage => {
                    input.reset(&checkpoint);
                    break;
                }
                Ok(h) => h,
                Err(ErrMode::Backtrack(_)) | Err(ErrMode::Incomplete(_)) => break,
                Err(_) => return Err(ArscError::IoFailure("chunk header")),
            };

            if let Err(err) = source.check_chunk(&header, input) {
                self.session.recover(err)?;
                warn!("truncated chunk inside package, stopping");
                break;
            }

            match header.kind {
                ChunkType::TableTypeSpec => {
                    let abs = source.offset(input);
                    match TypeSpecChunk::parse(header, input, abs) {
                        Ok(chunk) => self.apply_type_spec(&mut package, chunk)?,
                        Err(_) => {
                            self.session.recover(ArscError::IoFailure("type spec chunk"))?;
                            input.reset(&checkpoint);
                            let _ = ChunkHeader::parse(input);
                            skip_chunk_body(&header, input)?;
                        }
                    }
                }
                ChunkType::TableType => {
                    if let Some(err) = check_config_claim(&header, input) {
                        self.session.recover(err)?;
                        warn!("skipping type chunk with oversized config");
                        skip_chunk_body(&header, input)?;
                        continue;
                    }
                    match TypeChunk::parse(header, input) {
                        Ok(chunk) => self.apply_type(&mut package, chunk, global_pool)?,
                        Err(_) => {
                            self.session.recover(ArscError::IoFailure("type chunk"))?;
                            input.reset(&checkpoint);
                            let _ = ChunkHeader::parse(input);
                            skip_chunk_body(&header, input)?;
                        }
                    }
                }
                ChunkType::TableLibrary => {
                    let chunk = LibraryChunk::parse(input)
                        .map_err(|_| ArscError::IoFailure("library chunk"))?;
                    for (lib_id, lib_name) in chunk.entries {
                        package.libraries.push(LibraryEntry {
                            package_id: lib_id as u8,
                            package_name: lib_name,
                        });
                    }
                }
                ChunkType::TableStagedAlias => {
                    let chunk = StagedAliasChunk::parse(input)
                        .map_err(|_| ArscError::IoFailure("staged alias chunk"))?;
                    for (staged, finalized) in chunk.entries {
                        package.staged_aliases.push(StagedAlias {
                            staged_id: ResourceId(staged),
                            finalized_id: ResourceId(finalized),
                        });
                    }
                }
                ChunkType::TableOverlayable => {
                    let chunk = OverlayableChunk::parse(input)
                        .map_err(|_| ArscError::IoFailure("overlayable chunk"))?;
                    package.overlayables.push(Overlayable {
                        name: chunk.name,
                        actor: chunk.actor,
                        policies: Vec::new(),
                    });
                }
                ChunkType::TableOverlayablePolicy => {
                    let chunk = OverlayablePolicyChunk::parse(input)
                        .map_err(|_| ArscError::IoFailure("overlayable policy chunk"))?;
                    let policy = OverlayablePolicy {
                        flags: chunk.policy_flags,
                        entries: chunk.entries.into_iter().map(ResourceId).collect(),
                    };
                    match package.overlayables.last_mut() {
                        Some(overlayable) => overlayable.policies.push(policy),
                        None => package.overlayables.push(Overlayable {
                            policies: vec![policy],
                            ..Overlayable::default()
                        }),
                    }
                }
                other => {
                    let err = self.session.recover(ArscError::UnknownChunkType(other.code()))?;
                    warn!("skipping unknown chunk inside package: {}", err);
                    skip_chunk_body(&header, input)?;
                }
            }

            // land exactly on the declared chunk boundary, whatever the
            // parser left unread
            snap_to(source, input, chunk_start + header.size as usize);
        }

        // same for the package itself before the next top-level chunk
        snap_to(source, input, package_end);

        Ok(package)
    }

    /// Advance to `package_start + offset`, tolerating gaps the header
    /// declared but never rewinding.
    fn seek_to(
        &self,
        source: &ByteSource,
        input: &mut &[u8],
        package_start: usize,
        offset: u32,
    ) -> Result<(), ArscError> {
        let target = package_start + offset as usize;
        let current = source.offset(input);
        if target < current {
            return Err(ArscError::IoFailure("string pool offset rewinds"));
        }
        let gap = target - current;
        if gap > input.len() {
            return Err(ArscError::IoFailure("string pool offset"));
        }
        *input = &input[gap..];
        Ok(())
    }

    fn apply_type_spec(
        &self,
        package: &mut Package,
        chunk: TypeSpecChunk,
    ) -> Result<(), ArscError> {
        if chunk.id == 0 {
            self.session.recover(ArscError::UnknownTypeId(0))?;
            warn!("type spec with reserved id 0, skipped");
            return Ok(());
        }

        package.flag_regions.push(FlagRegion {
            offset: chunk.flags_offset,
            count: chunk.flags.len(),
        });

        let name = self.type_name(package, chunk.id)?;
        match package.type_spec_mut(chunk.id) {
            // repeated spec chunks for one type merge their masks
            Some(existing) => existing.merge_flags(&chunk.flags),
            None => {
                let mut spec = TypeSpec::new(chunk.id, name, chunk.entry_count as usize);
                spec.merge_flags(&chunk.flags);
                package.insert_type_spec(spec);
            }
        }

        Ok(())
    }

    fn apply_type(
        &self,
        package: &mut Package,
        chunk: TypeChunk,
        global_pool: &StringPool,
    ) -> Result<(), ArscError> {
        if chunk.id == 0 {
            self.session.recover(ArscError::UnknownTypeId(0))?;
            warn!("type chunk with reserved id 0, skipped");
            return Ok(());
        }

        if chunk.is_sparse() && !self.session.options.sparse_resources {
            debug!(
                "sparse type chunk for type {} without the sparse_resources hint",
                chunk.id
            );
        }

        if package.type_spec(chunk.id).is_none() {
            // a type chunk before (or without) its spec chunk
            self.session.recover(ArscError::UnknownTypeId(chunk.id))?;
            let name = self.type_name(package, chunk.id)?;
            warn!("type chunk for undeclared type {}, spec created", chunk.id);
            package.insert_type_spec(TypeSpec::new(chunk.id, name, chunk.entry_count as usize));
        }

        let package_id = package.id;
        for (entry_index, entry) in &chunk.entries {
            let id = ResourceId::new(package_id, chunk.id, *entry_index);

            let entry_count = package
                .type_spec(chunk.id)
                .map_or(0, TypeSpec::entry_count);
            if *entry_index as usize >= entry_count {
                self.session.recover(ArscError::UnknownResourceId(id.0))?;
                warn!("entry {} outside declared entry count, skipped", id);
                continue;
            }

            let name = self.spec_name(package, chunk.id, id, entry)?;
            let value = self.decode_entry_value(entry, global_pool);

            let Some(type_spec) = package.type_spec_mut(chunk.id) else {
                continue;
            };
            let spec = match type_spec.spec_mut(*entry_index) {
                Some(spec) => spec,
                None => {
                    let (name, origin) = name;
                    type_spec.insert_spec(ResSpec::new(id, name, origin))
                }
            };

            spec.add_resource(chunk.config.clone(), value, self.session.options.overwrite)?;
        }

        Ok(())
    }

    /// Resolve a type name, synthesizing a placeholder when the symbol pool
    /// has no entry (referential failure, recoverable in lenient mode).
    fn type_name(&self, package: &Package, type_id: u8) -> Result<String, ArscError> {
        match package.type_strings.get_checked(type_id as u32 - 1) {
            Ok(name) => Ok(name.to_owned()),
            Err(err) => {
                self.session.recover(err)?;
                Ok(format!("APKTOOL_DUMMY_{:02x}", type_id))
            }
        }
    }

    /// Resolve an entry's key name, applying the dummy/duplicate synthesis
    /// rules.
    fn spec_name(
        &self,
        package: &Package,
        type_id: u8,
        id: ResourceId,
        entry: &Entry,
    ) -> Result<(String, SpecOrigin), ArscError> {
        let raw = match package.key_strings.get_checked(entry.key_index) {
            Ok(name) => name,
            Err(err) => {
                self.session.recover(err)?;
                ""
            }
        };

        if raw.is_empty() {
            return Ok((format!("APKTOOL_DUMMYVAL_0x{:08x}", id.0), SpecOrigin::SynthesizedDummy));
        }

        let taken = package
            .type_spec(type_id)
            .is_some_and(|t| t.specs().any(|s| s.id != id && s.name() == raw));
        if taken {
            let type_name = package
                .type_spec(type_id)
                .map_or("", |t| t.name.as_str())
                .to_owned();
            return Ok((
                format!("APKTOOL_DUPLICATE_{}_0x{:08x}", type_name, id.0),
                SpecOrigin::SynthesizedDuplicate,
            ));
        }

        Ok((raw.to_owned(), SpecOrigin::Decoded))
    }

    fn decode_entry_value(&self, entry: &Entry, global_pool: &StringPool) -> Value {
        match &entry.data {
            EntryData::Simple(raw) => decode_value(raw, global_pool),
            EntryData::Compact { data_type, data } => {
                decode_value(&RawValue::new(*data_type, *data), global_pool)
            }
            EntryData::Bag { parent, items } => Value::Bag(Bag {
                parent: ResourceId(*parent),
                entries: items
                    .iter()
                    .map(|(name, raw)| (ResourceId(*name), decode_value(raw, global_pool)))
                    .collect(),
            }),
        }
    }
}

/// Advance `input` to absolute offset `target` if it lies ahead and within
/// bounds; parsers that overran or undershot a declared chunk size otherwise
/// leave the position as-is.
fn snap_to(source: &ByteSource, input: &mut &[u8], target: usize) {
    let current = source.offset(input);
    if target > current {
        let gap = target - current;
        if gap <= input.len() {
            *input = &input[gap..];
        }
    }
}

/// Peek a type chunk's config size field and reject claims that overrun the
/// chunk. The config block starts 12 bytes into the type header body.
fn check_config_claim(header: &ChunkHeader, input: &[u8]) -> Option<ArscError> {
    let claimed = input
        .get(12..16)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))?;
    let available = header.content_size() as usize;
    if claimed as usize > available {
        return Some(ArscError::InvalidConfig { claimed, available });
    }
    None
}

/// Pick the packages emitters should treat as "main".
///
/// Framework packages (`android`, `com.htc`) are skipped, the package with
/// the most specs wins among the rest, and the first package is the
/// fallback when nothing else qualifies. No package-count special cases.
fn select_main_packages(packages: &[Package]) -> Vec<u8> {
    let mut best: Option<&Package> = None;
    for package in packages {
        if FRAMEWORK_PACKAGE_NAMES.contains(&package.name.as_str()) {
            continue;
        }
        let better = best.is_none_or(|b| package.spec_count() > b.spec_count());
        if better {
            best = Some(package);
        }
    }

    best.or_else(|| packages.first())
        .map(|p| vec![p.id])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::config::ResConfig;
    use crate::testutil::*;

    #[test]
    fn single_package_minimal_table() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        assert_eq!(table.package_count(), 1);

        let main = table.main_package().unwrap();
        assert_eq!(main.name, "com.example");
        assert_eq!(main.id, 0x7f);

        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        assert_eq!(spec.name(), "app_name");
        assert_eq!(spec.origin, SpecOrigin::Decoded);
        let value = spec.resource(&ResConfig::default()).unwrap();
        assert!(matches!(value, Value::Text(s) if s.text == "Hello"));
    }

    #[test]
    fn multi_config_string_gets_two_entries() {
        let mut fr = ResConfig::default();
        fr.language = *b"fr";

        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello"))]);
                p.configured_type("string", fr.clone(), &[("app_name", text("Bonjour"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        assert_eq!(spec.configured().len(), 2);
        assert_eq!(spec.configured()[0].config, ResConfig::default());
        assert_eq!(spec.configured()[1].config, fr);
        assert!(matches!(
            spec.resource(&fr),
            Some(Value::Text(s)) if s.text == "Bonjour"
        ));
    }

    #[test]
    fn framework_package_is_not_main() {
        let arsc = ArscBuilder::new()
            .package(0x01, "android", |p| {
                p.simple_type("string", &[("cancel", text("Cancel")), ("ok", text("OK"))]);
            })
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        assert_eq!(table.package_count(), 2);
        let main = table.list_main_packages();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].name, "com.example");
        assert_eq!(main[0].id, 0x7f);
    }

    #[test]
    fn all_framework_packages_fall_back_to_first() {
        let arsc = ArscBuilder::new()
            .package(0x01, "android", |p| {
                p.simple_type("string", &[("ok", text("OK"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        assert_eq!(table.main_package().unwrap().name, "android");
    }

    #[test]
    fn duplicate_spec_names_synthesize_distinct_ones() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("foo", text("first")), ("foo", text("second"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let first = table.get_spec(ResourceId(0x7f010000)).unwrap();
        let second = table.get_spec(ResourceId(0x7f010001)).unwrap();

        assert_eq!(first.name(), "foo");
        assert_eq!(first.origin, SpecOrigin::Decoded);
        assert_eq!(second.name(), "APKTOOL_DUPLICATE_string_0x7f010001");
        assert_eq!(second.origin, SpecOrigin::SynthesizedDuplicate);
    }

    #[test]
    fn anonymous_spec_gets_dummy_name() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("", text("ghost"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        assert_eq!(spec.name(), "APKTOOL_DUMMYVAL_0x7f010000");
        assert_eq!(spec.origin, SpecOrigin::SynthesizedDummy);
    }

    #[test]
    fn sparse_type_populates_listed_indices_only() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.sparse_type(
                    "string",
                    64,
                    &[(2, "two", text("2")), (7, "seven", text("7")), (42, "answer", text("42"))],
                );
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let package = table.main_package().unwrap();
        let type_spec = package.type_spec(1).unwrap();

        assert_eq!(type_spec.entry_count(), 64);
        assert_eq!(type_spec.spec_count(), 3);
        for idx in [2u16, 7, 42] {
            assert!(type_spec.spec(idx).is_some(), "index {} missing", idx);
        }
        assert!(type_spec.spec(3).is_none());
        assert!(type_spec.spec(63).is_none());
    }

    #[test]
    fn empty_sparse_index_decodes_like_an_absent_dense_chunk() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.sparse_type("string", 8, &[]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let type_spec = table.main_package().unwrap().type_spec(1).unwrap();
        assert_eq!(type_spec.entry_count(), 8);
        assert_eq!(type_spec.spec_count(), 0);
    }

    #[test]
    fn empty_type_chunk_produces_no_specs() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let package = table.main_package().unwrap();
        assert_eq!(package.spec_count(), 0);
    }

    #[test]
    fn bag_entries_preserve_child_order() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type(
                    "style",
                    &[(
                        "AppTheme",
                        bag(
                            0x01030005,
                            &[(0x01010098, dec(1)), (0x01010095, dec(2)), (0x01010030, dec(3))],
                        ),
                    )],
                );
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        let Some(Value::Bag(decoded)) = spec.default_resource() else {
            panic!("expected bag value");
        };

        assert_eq!(decoded.parent, ResourceId(0x01030005));
        let names: Vec<u32> = decoded.entries.iter().map(|(id, _)| id.0).collect();
        assert_eq!(names, vec![0x01010098, 0x01010095, 0x01010030]);
    }

    #[test]
    fn duplicate_resource_is_fatal_without_overwrite() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("one"))]);
                p.simple_type_repeat("string", &[("app_name", text("two"))]);
            })
            .build();

        let err = Decoder::new(DecodeOptions::default())
            .decode(&arsc)
            .unwrap_err();
        assert!(matches!(err, ArscError::DuplicateResource { id: 0x7f010000, .. }));

        let options = DecodeOptions {
            overwrite: true,
            ..DecodeOptions::default()
        };
        let table = Decoder::new(options).decode(&arsc).unwrap();
        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        assert!(matches!(
            spec.default_resource(),
            Some(Value::Text(s)) if s.text == "two"
        ));
    }

    #[test]
    fn unknown_trailing_chunk_fails_strict_and_skips_lenient() {
        let mut arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello"))]);
            })
            .build();
        // append a well-formed chunk of unknown type 0x0042
        arsc.extend_from_slice(&0x0042u16.to_le_bytes());
        arsc.extend_from_slice(&8u16.to_le_bytes());
        arsc.extend_from_slice(&12u32.to_le_bytes());
        arsc.extend_from_slice(&[0u8; 4]);

        let err = Decoder::new(DecodeOptions::default())
            .decode(&arsc)
            .unwrap_err();
        assert_eq!(err, ArscError::UnknownChunkType(0x0042));

        let options = DecodeOptions {
            keep_broken: true,
            ..DecodeOptions::default()
        };
        let table = Decoder::new(options).decode(&arsc).unwrap();
        assert_eq!(table.package_count(), 1);
    }

    #[test]
    fn cancellation_is_cooperative() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello"))]);
            })
            .build();

        let cancel = || true;

        let err = Decoder::with_cancel(DecodeOptions::default(), &cancel)
            .decode(&arsc)
            .unwrap_err();
        assert_eq!(err, ArscError::Cancelled);

        let options = DecodeOptions {
            keep_broken: true,
            ..DecodeOptions::default()
        };
        let table = Decoder::with_cancel(options, &cancel).decode(&arsc).unwrap();
        assert!(table.incomplete);
    }

    #[test]
    fn decoded_config_canonical_form_round_trips() {
        let mut de = ResConfig::default();
        de.language = *b"de";
        de.density = 480;
        de.sdk_version = 21;

        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.configured_type("string", de, &[("app_name", text("Hallo"))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        let spec = table.get_spec(ResourceId(0x7f010000)).unwrap();
        let config = &spec.configured()[0].config;
        let reparsed: ResConfig = config.qualifiers().parse().unwrap();
        assert_eq!(&reparsed, config);
    }

    #[test]
    fn spec_ids_match_their_owning_package_and_type() {
        let arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("a", text("a")), ("b", text("b"))]);
                p.simple_type("color", &[("accent", color(0xff00ff00))]);
            })
            .build();

        let table = Decoder::new(DecodeOptions::default()).decode(&arsc).unwrap();
        for package in table.packages() {
            for type_spec in package.type_specs() {
                for spec in type_spec.specs() {
                    assert_eq!(spec.id.package_id(), package.id);
                    assert_eq!(spec.id.type_id(), type_spec.id);
                }
            }
        }
    }
}
