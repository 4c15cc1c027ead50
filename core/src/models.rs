use resdec_arsc::{ResourceTable, Value};
use serde::Serialize;

/// JSON-friendly view of a decoded table, for tooling consumers.
#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub packages: Vec<PackageSummary>,
    pub incomplete: bool,
}

#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub id: u8,
    pub name: String,
    pub is_main: bool,
    pub spec_count: usize,
    pub types: Vec<TypeSummary>,
}

#[derive(Debug, Serialize)]
pub struct TypeSummary {
    pub id: u8,
    pub name: String,
    pub entry_count: usize,
    pub spec_count: usize,
    /// Qualifier strings seen across this type's resources, first-seen order.
    pub configs: Vec<String>,
    pub file_resources: usize,
}

impl TableSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&ResourceTable> for TableSummary {
    fn from(table: &ResourceTable) -> TableSummary {
        let main_ids: Vec<u8> = table.list_main_packages().iter().map(|p| p.id).collect();

        let packages = table
            .packages()
            .map(|package| {
                let types = package
                    .type_specs()
                    .map(|type_spec| {
                        let mut configs: Vec<String> = Vec::new();
                        let mut file_resources = 0;
                        for spec in type_spec.specs() {
                            for configured in spec.configured() {
                                let qualifiers = configured.config.to_string();
                                if !configs.contains(&qualifiers) {
                                    configs.push(qualifiers);
                                }
                                if matches!(configured.value, Value::FileRef(_)) {
                                    file_resources += 1;
                                }
                            }
                        }

                        TypeSummary {
                            id: type_spec.id,
                            name: type_spec.name.clone(),
                            entry_count: type_spec.entry_count(),
                            spec_count: type_spec.spec_count(),
                            configs,
                            file_resources,
                        }
                    })
                    .collect();

                PackageSummary {
                    id: package.id,
                    name: package.name.clone(),
                    is_main: main_ids.contains(&package.id),
                    spec_count: package.spec_count(),
                    types,
                }
            })
            .collect();

        TableSummary {
            packages,
            incomplete: table.incomplete,
        }
    }
}
