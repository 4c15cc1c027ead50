//! Byte-level fixtures: assemble small, well-formed `resources.arsc` blobs
//! and string pool chunks for the decoder tests.

use crate::structs::config::ResConfig;
use crate::structs::string_pool::StyleSpan;
use crate::structs::value::{RawValue, value_type};

/// A value to place into a fixture entry.
#[derive(Debug, Clone)]
pub(crate) enum TestValue {
    Str(String),
    Dec(u32),
    Color(u32),
    Reference(u32),
    Bag {
        parent: u32,
        items: Vec<(u32, TestValue)>,
    },
}

pub(crate) fn text(s: &str) -> TestValue {
    TestValue::Str(s.to_owned())
}

pub(crate) fn dec(v: u32) -> TestValue {
    TestValue::Dec(v)
}

pub(crate) fn color(argb: u32) -> TestValue {
    TestValue::Color(argb)
}

pub(crate) fn reference(id: u32) -> TestValue {
    TestValue::Reference(id)
}

pub(crate) fn bag(parent: u32, items: &[(u32, TestValue)]) -> TestValue {
    TestValue::Bag {
        parent,
        items: items.to_vec(),
    }
}

enum TypeItem {
    Spec {
        type_name: String,
        entry_count: u32,
    },
    Chunk {
        type_name: String,
        config: ResConfig,
        sparse: bool,
        entry_count: u32,
        entries: Vec<(u16, String, TestValue)>,
    },
}

pub(crate) struct PackageFixture {
    id: u8,
    name: String,
    items: Vec<TypeItem>,
}

impl PackageFixture {
    fn has_spec_for(&self, type_name: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, TypeItem::Spec { type_name: n, .. } if n == type_name))
    }

    /// Declare a type and one default-config chunk with entries at indices
    /// `0..n`.
    pub(crate) fn simple_type(&mut self, type_name: &str, entries: &[(&str, TestValue)]) {
        self.configured_type(type_name, ResConfig::default(), entries);
    }

    /// Like [`Self::simple_type`] but for a given configuration.
    pub(crate) fn configured_type(
        &mut self,
        type_name: &str,
        config: ResConfig,
        entries: &[(&str, TestValue)],
    ) {
        if !self.has_spec_for(type_name) {
            self.items.push(TypeItem::Spec {
                type_name: type_name.to_owned(),
                entry_count: entries.len() as u32,
            });
        }
        self.push_chunk(type_name, config, entries);
    }

    /// A second chunk for an already-declared type, same config; used to
    /// provoke duplicate-resource handling.
    pub(crate) fn simple_type_repeat(&mut self, type_name: &str, entries: &[(&str, TestValue)]) {
        self.push_chunk(type_name, ResConfig::default(), entries);
    }

    fn push_chunk(&mut self, type_name: &str, config: ResConfig, entries: &[(&str, TestValue)]) {
        self.items.push(TypeItem::Chunk {
            type_name: type_name.to_owned(),
            config,
            sparse: false,
            entry_count: entries.len() as u32,
            entries: entries
                .iter()
                .enumerate()
                .map(|(i, (key, value))| (i as u16, (*key).to_owned(), value.clone()))
                .collect(),
        });
    }

    /// Declare a type of `entry_count` slots and one sparse chunk holding
    /// only the listed `(index, key, value)` entries.
    pub(crate) fn sparse_type(
        &mut self,
        type_name: &str,
        entry_count: u32,
        entries: &[(u16, &str, TestValue)],
    ) {
        self.items.push(TypeItem::Spec {
            type_name: type_name.to_owned(),
            entry_count,
        });
        self.items.push(TypeItem::Chunk {
            type_name: type_name.to_owned(),
            config: ResConfig::default(),
            sparse: true,
            entry_count: entries.len() as u32,
            entries: entries
                .iter()
                .map(|(i, key, value)| (*i, (*key).to_owned(), value.clone()))
                .collect(),
        });
    }
}

#[derive(Default)]
pub(crate) struct ArscBuilder {
    packages: Vec<PackageFixture>,
}

impl ArscBuilder {
    pub(crate) fn new() -> ArscBuilder {
        ArscBuilder::default()
    }

    pub(crate) fn package(
        mut self,
        id: u8,
        name: &str,
        fill: impl FnOnce(&mut PackageFixture),
    ) -> ArscBuilder {
        let mut package = PackageFixture {
            id,
            name: name.to_owned(),
            items: Vec::new(),
        };
        fill(&mut package);
        self.packages.push(package);
        self
    }

    /// Serialize the whole table.
    pub(crate) fn build(self) -> Vec<u8> {
        let mut globals = Interner::default();
        for package in &self.packages {
            for item in &package.items {
                if let TypeItem::Chunk { entries, .. } = item {
                    for (_, _, value) in entries {
                        collect_strings(value, &mut globals);
                    }
                }
            }
        }

        let global_pool = pool_utf8(&globals.as_strs());

        let mut package_bytes = Vec::new();
        for package in &self.packages {
            package_bytes.extend_from_slice(&build_package(package, &globals));
        }

        let total = 12 + global_pool.len() + package_bytes.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&0x0002u16.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(self.packages.len() as u32).to_le_bytes());
        out.extend_from_slice(&global_pool);
        out.extend_from_slice(&package_bytes);
        out
    }
}

#[derive(Default)]
struct Interner {
    strings: Vec<String>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(i) = self.strings.iter().position(|existing| existing == s) {
            return i as u32;
        }
        self.strings.push(s.to_owned());
        (self.strings.len() - 1) as u32
    }

    fn index_of(&self, s: &str) -> u32 {
        self.strings
            .iter()
            .position(|existing| existing == s)
            .map(|i| i as u32)
            .unwrap_or(u32::MAX)
    }

    fn as_strs(&self) -> Vec<&str> {
        self.strings.iter().map(String::as_str).collect()
    }
}

fn collect_strings(value: &TestValue, globals: &mut Interner) {
    match value {
        TestValue::Str(s) => {
            globals.intern(s);
        }
        TestValue::Bag { items, .. } => {
            for (_, item) in items {
                collect_strings(item, globals);
            }
        }
        _ => {}
    }
}

fn raw_value(value: &TestValue, globals: &Interner) -> RawValue {
    match value {
        TestValue::Str(s) => RawValue::new(value_type::STRING, globals.index_of(s)),
        TestValue::Dec(v) => RawValue::new(value_type::INT_DEC, *v),
        TestValue::Color(argb) => RawValue::new(value_type::INT_COLOR_ARGB8, *argb),
        TestValue::Reference(id) => RawValue::new(value_type::REFERENCE, *id),
        TestValue::Bag { .. } => unreachable!("bags are serialized as map entries"),
    }
}

fn build_package(package: &PackageFixture, globals: &Interner) -> Vec<u8> {
    // type and key symbol pools, in order of first use
    let mut types = Interner::default();
    let mut keys = Interner::default();
    for item in &package.items {
        match item {
            TypeItem::Spec { type_name, .. } => {
                types.intern(type_name);
            }
            TypeItem::Chunk {
                type_name, entries, ..
            } => {
                types.intern(type_name);
                for (_, key, _) in entries {
                    keys.intern(key);
                }
            }
        }
    }

    let type_pool = pool_utf8(&types.as_strs());
    let key_pool = pool_utf8(&keys.as_strs());

    let mut body = Vec::new();
    for item in &package.items {
        match item {
            TypeItem::Spec {
                type_name,
                entry_count,
            } => {
                let type_id = (types.index_of(type_name) + 1) as u8;
                body.extend_from_slice(&0x0202u16.to_le_bytes());
                body.extend_from_slice(&16u16.to_le_bytes());
                body.extend_from_slice(&(16 + 4 * entry_count).to_le_bytes());
                body.push(type_id);
                body.push(0); // res0
                body.extend_from_slice(&0u16.to_le_bytes()); // types_count
                body.extend_from_slice(&entry_count.to_le_bytes());
                for _ in 0..*entry_count {
                    body.extend_from_slice(&0u32.to_le_bytes());
                }
            }
            TypeItem::Chunk {
                type_name,
                config,
                sparse,
                entry_count,
                entries,
            } => {
                let type_id = (types.index_of(type_name) + 1) as u8;
                body.extend_from_slice(&build_type_chunk(
                    type_id,
                    config,
                    *sparse,
                    *entry_count,
                    entries,
                    globals,
                    &keys,
                ));
            }
        }
    }

    let header_size = 8 + 4 + 256 + 4 * 5; // 288, with type_id_offset
    let total = header_size + type_pool.len() + key_pool.len() + body.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0x0200u16.to_le_bytes());
    out.extend_from_slice(&(header_size as u16).to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(package.id as u32).to_le_bytes());

    let mut name = [0u8; 256];
    for (i, unit) in package.name.encode_utf16().take(127).enumerate() {
        name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&name);

    out.extend_from_slice(&(header_size as u32).to_le_bytes()); // type strings
    out.extend_from_slice(&0u32.to_le_bytes()); // last public type
    out.extend_from_slice(&((header_size + type_pool.len()) as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // last public key
    out.extend_from_slice(&0u32.to_le_bytes()); // type id offset
    out.extend_from_slice(&type_pool);
    out.extend_from_slice(&key_pool);
    out.extend_from_slice(&body);
    out
}

fn build_type_chunk(
    type_id: u8,
    config: &ResConfig,
    sparse: bool,
    entry_count: u32,
    entries: &[(u16, String, TestValue)],
    globals: &Interner,
    keys: &Interner,
) -> Vec<u8> {
    let config_block = config_bytes(config);
    let header_size = 8 + 12 + config_block.len(); // 84 for the 64-byte config

    // serialize entries, remembering each one's offset in the region
    let mut region = Vec::new();
    let mut offsets = Vec::with_capacity(entries.len());
    for (index, key, value) in entries {
        offsets.push((*index, region.len() as u32));
        let key_index = keys.index_of(key);
        match value {
            TestValue::Bag { parent, items } => {
                region.extend_from_slice(&16u16.to_le_bytes());
                region.extend_from_slice(&0x0001u16.to_le_bytes()); // FLAG_COMPLEX
                region.extend_from_slice(&key_index.to_le_bytes());
                region.extend_from_slice(&parent.to_le_bytes());
                region.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for (name, item) in items {
                    region.extend_from_slice(&name.to_le_bytes());
                    raw_value(item, globals).write(&mut region);
                }
            }
            simple => {
                region.extend_from_slice(&8u16.to_le_bytes());
                region.extend_from_slice(&0u16.to_le_bytes());
                region.extend_from_slice(&key_index.to_le_bytes());
                raw_value(simple, globals).write(&mut region);
            }
        }
    }

    let index_size = if sparse {
        4 * entries.len()
    } else {
        4 * entry_count as usize
    };
    let entries_start = header_size + index_size;
    let total = entries_start + region.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0x0201u16.to_le_bytes());
    out.extend_from_slice(&(header_size as u16).to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.push(type_id);
    out.push(if sparse { 0x01 } else { 0x00 });
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&(entries_start as u32).to_le_bytes());
    out.extend_from_slice(&config_block);

    if sparse {
        for (index, offset) in &offsets {
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(&((offset / 4) as u16).to_le_bytes());
        }
    } else {
        let mut dense = vec![u32::MAX; entry_count as usize];
        for (index, offset) in &offsets {
            dense[*index as usize] = *offset;
        }
        for offset in dense {
            out.extend_from_slice(&offset.to_le_bytes());
        }
    }

    out.extend_from_slice(&region);
    out
}

/// Serialize a config into the canonical 64-byte block.
pub(crate) fn config_bytes(config: &ResConfig) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&64u32.to_le_bytes());
    out.extend_from_slice(&config.mcc.to_le_bytes());
    out.extend_from_slice(&config.mnc.to_le_bytes());
    out.extend_from_slice(&config.language);
    out.extend_from_slice(&config.country);
    out.push(config.orientation);
    out.push(config.touchscreen);
    out.extend_from_slice(&config.density.to_le_bytes());
    out.push(config.keyboard);
    out.push(config.navigation);
    out.push(config.input_flags);
    out.push(config.grammatical_inflection);
    out.extend_from_slice(&config.screen_width.to_le_bytes());
    out.extend_from_slice(&config.screen_height.to_le_bytes());
    out.extend_from_slice(&config.sdk_version.to_le_bytes());
    out.extend_from_slice(&config.minor_version.to_le_bytes());
    out.push(config.screen_layout);
    out.push(config.ui_mode);
    out.extend_from_slice(&config.smallest_screen_width_dp.to_le_bytes());
    out.extend_from_slice(&config.screen_width_dp.to_le_bytes());
    out.extend_from_slice(&config.screen_height_dp.to_le_bytes());
    out.extend_from_slice(&config.locale_script);
    out.extend_from_slice(&config.locale_variant);
    out.push(config.screen_layout2);
    out.push(config.color_mode);
    out.extend_from_slice(&0u16.to_le_bytes()); // pad
    out.push(0); // locale_script_was_computed
    out.extend_from_slice(&config.locale_numbering_system);
    out.extend_from_slice(&[0u8; 3]); // end padding
    out
}

/// Serialize a UTF-8 string pool chunk without styles.
pub(crate) fn pool_utf8(strings: &[&str]) -> Vec<u8> {
    pool_utf8_styled(strings, &[])
}

/// Serialize a UTF-8 string pool chunk; `styles` pairs a string index with
/// its span list and must target a prefix of the strings.
pub(crate) fn pool_utf8_styled(strings: &[&str], styles: &[(usize, &[StyleSpan])]) -> Vec<u8> {
    let style_count = styles.iter().map(|(i, _)| i + 1).max().unwrap_or(0);

    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(data.len() as u32);
        let chars = s.chars().count();
        assert!(chars < 0x80 && s.len() < 0x80, "fixture strings stay short");
        data.push(chars as u8);
        data.push(s.len() as u8);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let mut style_data = Vec::new();
    let mut style_offsets = Vec::with_capacity(style_count);
    for i in 0..style_count {
        style_offsets.push(style_data.len() as u32);
        if let Some((_, spans)) = styles.iter().find(|(idx, _)| *idx == i) {
            for span in *spans {
                style_data.extend_from_slice(&span.tag.to_le_bytes());
                style_data.extend_from_slice(&span.first.to_le_bytes());
                style_data.extend_from_slice(&span.last.to_le_bytes());
            }
        }
        style_data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    }

    let header = 28 + 4 * strings.len() + 4 * style_count;
    let strings_start = header;
    let styles_start = if style_count > 0 {
        strings_start + data.len()
    } else {
        0
    };
    let total = header + data.len() + style_data.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&28u16.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&(style_count as u32).to_le_bytes());
    out.extend_from_slice(&(1u32 << 8).to_le_bytes()); // UTF-8 flag
    out.extend_from_slice(&(strings_start as u32).to_le_bytes());
    out.extend_from_slice(&(styles_start as u32).to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    for offset in &style_offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&data);
    out.extend_from_slice(&style_data);
    out
}

/// Serialize a UTF-16 string pool chunk without styles.
pub(crate) fn pool_utf16(strings: &[&str]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(data.len() as u32);
        let units: Vec<u16> = s.encode_utf16().collect();
        assert!(units.len() < 0x8000, "fixture strings stay short");
        data.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in &units {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let header = 28 + 4 * strings.len();
    let total = header + data.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&28u16.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // style count
    out.extend_from_slice(&0u32.to_le_bytes()); // flags: UTF-16, unsorted
    out.extend_from_slice(&(header as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&data);
    out
}
