use std::borrow::Cow;
use std::fmt;

use ahash::AHashMap;

use crate::errors::ArscError;
use crate::structs::config::ResConfig;
use crate::structs::string_pool::StringPool;

/// A 32-bit resource identifier: `package(8) | type(8) | entry(16)`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn new(package: u8, type_id: u8, entry: u16) -> ResourceId {
        ResourceId((package as u32) << 24 | (type_id as u32) << 16 | entry as u32)
    }

    #[inline(always)]
    pub fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline(always)]
    pub fn type_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline(always)]
    pub fn entry_id(self) -> u16 {
        self.0 as u16
    }

    /// Ids with a zero package or type field cannot name a table entry.
    pub fn is_valid(self) -> bool {
        self.package_id() != 0 && self.type_id() != 0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId(0x{:08x})", self.0)
    }
}

/// Rendering width of a decoded color literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Argb8,
    Rgb8,
    Argb4,
    Rgb4,
}

/// A style span resolved against the pool: markup tag plus the inclusive
/// character range it wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// `b`, `i`, or `tag;attr=value;…` form.
    pub tag: String,
    pub first: u32,
    pub last: u32,
}

/// A pool string together with its inline markup spans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledString {
    pub text: String,
    pub spans: Vec<TextSpan>,
}

impl StyledString {
    pub fn plain(text: impl Into<String>) -> StyledString {
        StyledString {
            text: text.into(),
            spans: Vec::new(),
        }
    }
}

/// A decoded resource value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Undefined entry
    Null,
    /// Explicitly empty entry
    Empty,
    /// Reference to another resource (`@type/name`)
    Reference(ResourceId),
    /// Attribute reference (`?attr/name`)
    Attribute(ResourceId),
    /// In-document string, possibly styled
    Text(StyledString),
    /// Pool string naming a file inside the package (`res/…`)
    FileRef(String),
    Float(f32),
    /// Packed dimension (`24dip`), raw complex encoding
    Dimension(u32),
    /// Packed fraction (`50%`), raw complex encoding
    Fraction(u32),
    IntDec(i32),
    IntHex(u32),
    Bool(bool),
    Color(ColorFormat, u32),
    /// Unknown type code, carried through for forward compatibility
    Raw { type_code: u8, data: u32 },
    /// Compound value: style, array or plurals
    Bag(Bag),
}

impl Value {
    /// True when this value belongs in a `values*/*.xml` document rather
    /// than a file in the resource tree.
    pub fn is_in_document(&self) -> bool {
        !matches!(self, Value::FileRef(_))
    }
}

/// A compound value: the parent reference plus ordered `(name, value)`
/// children. Child order is the order the binary declared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bag {
    pub parent: ResourceId,
    pub entries: Vec<(ResourceId, Value)>,
}

/// How a spec's name came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecOrigin {
    /// Name decoded from the key string pool
    #[default]
    Decoded,
    /// Entry had no usable name; a placeholder was synthesized
    SynthesizedDummy,
    /// Name collided with an earlier spec of the same type
    SynthesizedDuplicate,
}

impl SpecOrigin {
    pub fn is_synthetic(self) -> bool {
        self != SpecOrigin::Decoded
    }
}

/// One per-configuration value of a spec.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredValue {
    pub config: ResConfig,
    pub value: Value,
}

/// The logical identity of a named resource: one id, zero or more
/// per-configuration values in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResSpec {
    pub id: ResourceId,
    name: String,
    pub origin: SpecOrigin,
    configured: Vec<ConfiguredValue>,
}

impl ResSpec {
    pub fn new(id: ResourceId, name: String, origin: SpecOrigin) -> ResSpec {
        ResSpec {
            id,
            name,
            origin,
            configured: Vec::new(),
        }
    }

    /// The decoded (or synthesized) name as stored.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as emitted into XML. Double quotes render as `q`; the stored
    /// name is untouched.
    pub fn display_name(&self) -> Cow<'_, str> {
        if self.name.contains('"') {
            Cow::Owned(self.name.replace('"', "q"))
        } else {
            Cow::Borrowed(self.name.as_str())
        }
    }

    /// Attach a value for `config`. At most one value per distinct config;
    /// a second one is an error unless `overwrite` is set.
    pub fn add_resource(
        &mut self,
        config: ResConfig,
        value: Value,
        overwrite: bool,
    ) -> Result<(), ArscError> {
        if let Some(existing) = self.configured.iter_mut().find(|cv| cv.config == config) {
            if !overwrite {
                return Err(ArscError::DuplicateResource {
                    id: self.id.0,
                    config: config.to_string(),
                });
            }
            existing.value = value;
            return Ok(());
        }

        self.configured.push(ConfiguredValue { config, value });
        Ok(())
    }

    pub fn resource(&self, config: &ResConfig) -> Option<&Value> {
        self.configured
            .iter()
            .find(|cv| cv.config == *config)
            .map(|cv| &cv.value)
    }

    /// Default-config value if present, else the first configured one.
    pub fn default_resource(&self) -> Option<&Value> {
        self.resource(&ResConfig::default())
            .or_else(|| self.configured.first().map(|cv| &cv.value))
    }

    /// Per-configuration values in insertion order.
    pub fn configured(&self) -> &[ConfiguredValue] {
        &self.configured
    }

    pub fn is_empty(&self) -> bool {
        self.configured.is_empty()
    }
}

/// All specs of one resource type within a package, indexed by entry id.
#[derive(Debug, Default)]
pub struct TypeSpec {
    pub id: u8,
    pub name: String,
    /// Per-entry configuration-change masks (the publicizable flag words).
    pub flags: Vec<u32>,
    specs: Vec<Option<ResSpec>>,
}

impl TypeSpec {
    pub fn new(id: u8, name: String, entry_count: usize) -> TypeSpec {
        TypeSpec {
            id,
            name,
            flags: vec![0; entry_count],
            specs: (0..entry_count).map(|_| None).collect(),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.specs.len()
    }

    /// Grow to cover entries from later chunks that declare a larger count.
    pub fn ensure_entry_count(&mut self, entry_count: usize) {
        if entry_count > self.specs.len() {
            self.specs.resize_with(entry_count, || None);
            self.flags.resize(entry_count, 0);
        }
    }

    /// OR later spec-chunk masks into the existing ones.
    pub fn merge_flags(&mut self, flags: &[u32]) {
        self.ensure_entry_count(flags.len());
        for (slot, &mask) in self.flags.iter_mut().zip(flags) {
            *slot |= mask;
        }
    }

    pub fn spec(&self, entry: u16) -> Option<&ResSpec> {
        self.specs.get(entry as usize).and_then(Option::as_ref)
    }

    pub fn spec_mut(&mut self, entry: u16) -> Option<&mut ResSpec> {
        self.specs.get_mut(entry as usize).and_then(Option::as_mut)
    }

    pub fn insert_spec(&mut self, spec: ResSpec) -> &mut ResSpec {
        let entry = spec.id.entry_id() as usize;
        self.ensure_entry_count(entry + 1);
        self.specs[entry].insert(spec)
    }

    /// Present specs in entry order.
    pub fn specs(&self) -> impl Iterator<Item = &ResSpec> {
        self.specs.iter().filter_map(Option::as_ref)
    }

    pub fn spec_count(&self) -> usize {
        self.specs.iter().filter(|s| s.is_some()).count()
    }
}

/// A shared-library mapping carried by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub package_id: u8,
    pub package_name: String,
}

/// A staged (pre-finalized) id alias. Recorded, never consulted during
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedAlias {
    pub staged_id: ResourceId,
    pub finalized_id: ResourceId,
}

/// A set of resources declared overlayable, with its policy constraints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overlayable {
    pub name: String,
    pub actor: String,
    pub policies: Vec<OverlayablePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayablePolicy {
    pub flags: u32,
    pub entries: Vec<ResourceId>,
}

/// A publicizable run of entry-flag words in the raw input:
/// `count` u32 values starting at absolute `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRegion {
    pub offset: usize,
    pub count: usize,
}

/// One resource package: a namespace of typed specs plus its symbol pools.
#[derive(Debug, Default)]
pub struct Package {
    pub id: u8,
    pub name: String,
    pub type_strings: StringPool,
    pub key_strings: StringPool,
    type_specs: Vec<TypeSpec>,
    type_index: AHashMap<u8, usize>,
    pub libraries: Vec<LibraryEntry>,
    pub staged_aliases: Vec<StagedAlias>,
    pub overlayables: Vec<Overlayable>,
    pub flag_regions: Vec<FlagRegion>,
}

impl Package {
    pub fn new(id: u8, name: String) -> Package {
        Package {
            id,
            name,
            ..Package::default()
        }
    }

    pub fn type_spec(&self, type_id: u8) -> Option<&TypeSpec> {
        self.type_index.get(&type_id).map(|&i| &self.type_specs[i])
    }

    pub fn type_spec_mut(&mut self, type_id: u8) -> Option<&mut TypeSpec> {
        self.type_index
            .get(&type_id)
            .map(|&i| &mut self.type_specs[i])
    }

    /// Insert a new type spec; chunks seen earlier win the slot.
    pub fn insert_type_spec(&mut self, spec: TypeSpec) -> &mut TypeSpec {
        let index = match self.type_index.get(&spec.id) {
            Some(&i) => i,
            None => {
                self.type_index.insert(spec.id, self.type_specs.len());
                self.type_specs.push(spec);
                self.type_specs.len() - 1
            }
        };
        &mut self.type_specs[index]
    }

    /// Type specs in the order their chunks appeared.
    pub fn type_specs(&self) -> impl Iterator<Item = &TypeSpec> {
        self.type_specs.iter()
    }

    pub fn get_spec(&self, id: ResourceId) -> Option<&ResSpec> {
        if id.package_id() != self.id {
            return None;
        }
        self.type_spec(id.type_id())?.spec(id.entry_id())
    }

    /// Total number of specs across all types.
    pub fn spec_count(&self) -> usize {
        self.type_specs.iter().map(TypeSpec::spec_count).sum()
    }
}

/// The decoded resource table: packages keyed by id, with a designated
/// "main" subset the emitters walk.
#[derive(Debug, Default)]
pub struct ResourceTable {
    packages: Vec<Package>,
    package_index: AHashMap<u8, usize>,
    main: Vec<usize>,
    current_package: Option<usize>,
    /// Set when a lenient decode was cancelled before the last chunk.
    pub incomplete: bool,
}

impl ResourceTable {
    pub fn new() -> ResourceTable {
        ResourceTable::default()
    }

    /// Insert a package. Ids are unique within a table; a second package
    /// with the same id is rejected.
    pub fn add_package(&mut self, package: Package, is_main: bool) -> Result<(), ArscError> {
        if self.package_index.contains_key(&package.id) {
            return Err(ArscError::DuplicateResource {
                id: (package.id as u32) << 24,
                config: format!("package '{}'", package.name),
            });
        }

        let index = self.packages.len();
        self.package_index.insert(package.id, index);
        self.packages.push(package);
        if is_main {
            self.main.push(index);
        }
        Ok(())
    }

    pub fn mark_main(&mut self, id: u8) {
        if let Some(&index) = self.package_index.get(&id)
            && !self.main.contains(&index)
        {
            self.main.push(index);
        }
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn get_package_by_id(&self, id: u8) -> Option<&Package> {
        self.package_index.get(&id).map(|&i| &self.packages[i])
    }

    pub fn get_package_by_name(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Main packages in insertion order.
    pub fn list_main_packages(&self) -> Vec<&Package> {
        self.main.iter().map(|&i| &self.packages[i]).collect()
    }

    pub fn main_package(&self) -> Option<&Package> {
        self.main.first().map(|&i| &self.packages[i])
    }

    /// Select the package whose pools attribute decoding consults.
    pub fn set_current_package(&mut self, id: u8) -> bool {
        match self.package_index.get(&id) {
            Some(&i) => {
                self.current_package = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn current_package(&self) -> Option<&Package> {
        self.current_package
            .or_else(|| self.main.first().copied())
            .map(|i| &self.packages[i])
    }

    pub fn get_spec(&self, id: ResourceId) -> Option<&ResSpec> {
        self.get_package_by_id(id.package_id())?.get_spec(id)
    }

    /// Every publicizable flag region across all packages, in input order.
    pub fn flag_regions(&self) -> Vec<FlagRegion> {
        self.packages
            .iter()
            .flat_map(|p| p.flag_regions.iter().copied())
            .collect()
    }
}
