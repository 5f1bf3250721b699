/// Field names shared by the source and target document schemas.
pub mod fields {
    /// Primary key of molecule records and foreign key of property records.
    pub const MOLECULE_ID: &str = "molecule_id";
    /// Primary key of task records and the entry-level foreign id.
    pub const TASK_ID: &str = "task_id";
    /// Group key field present on every document kind.
    pub const FORMULA_ALPHABETICAL: &str = "formula_alphabetical";
    /// Soft-delete flag on molecule records.
    pub const DEPRECATED: &str = "deprecated";
    /// Sub-category field of property records.
    pub const SOLVENT: &str = "solvent";
    /// Combined level-of-theory and solvent field of property records.
    pub const LOT_SOLVENT: &str = "lot_solvent";
    /// Primary key of property records.
    pub const PROPERTY_ID: &str = "property_id";
    /// Raw calculation input; only tasks carrying it can seed a property.
    pub const ORIG: &str = "orig";
    /// Last-modified timestamp field.
    pub const LAST_UPDATED: &str = "last_updated";
    /// Task ids aggregated into a molecule record.
    pub const TASK_IDS: &str = "task_ids";
    /// Task lifecycle state field.
    pub const STATE: &str = "state";
    /// Build timestamp stamped onto every committed property record.
    pub const BUILD_TIMESTAMP: &str = "_bt";
}

/// Constants used by incremental builders.
pub mod builder {
    use super::fields;

    /// Composite key used when upserting property records.
    pub const TARGET_KEY_FIELDS: [&str; 2] = [fields::MOLECULE_ID, fields::SOLVENT];
    /// Indexes requested on the task store.
    pub const TASK_INDEXES: [&str; 4] = [
        fields::TASK_ID,
        fields::LAST_UPDATED,
        fields::STATE,
        fields::FORMULA_ALPHABETICAL,
    ];
    /// Indexes requested on the molecule store.
    pub const MOLECULE_INDEXES: [&str; 4] = [
        fields::MOLECULE_ID,
        fields::LAST_UPDATED,
        fields::TASK_IDS,
        fields::FORMULA_ALPHABETICAL,
    ];
    /// Indexes requested on every property store.
    pub const PROPERTY_INDEXES: [&str; 7] = [
        fields::MOLECULE_ID,
        fields::TASK_ID,
        fields::SOLVENT,
        fields::LOT_SOLVENT,
        fields::PROPERTY_ID,
        fields::LAST_UPDATED,
        fields::FORMULA_ALPHABETICAL,
    ];
    /// Number of processed groups buffered before a target commit.
    pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 100;
}

/// Constants used by the level-of-theory scorer defaults.
pub mod lot {
    /// Density functionals, best first.
    pub const DEFAULT_FUNCTIONALS: [&str; 7] = [
        "wB97M-V",
        "wB97X-V",
        "wB97X-D3",
        "wB97X-D",
        "M06-2X",
        "B3LYP",
        "PBE",
    ];
    /// Basis sets, best first.
    pub const DEFAULT_BASIS_SETS: [&str; 6] = [
        "def2-QZVPPD",
        "def2-TZVPPD",
        "def2-TZVPD",
        "def2-TZVP",
        "def2-SVPD",
        "6-31g*",
    ];
    /// Implicit solvent models, best first.
    pub const DEFAULT_SOLVENT_MODELS: [&str; 4] = ["VACUUM", "SMD", "PCM", "CPCM"];
    /// Separator between level-of-theory components.
    pub const COMPONENT_SEPARATOR: char = '/';
}

/// Constants used by file-store persistence and wire encoding.
pub mod file_store {
    /// Key used for file-store global metadata.
    pub const META_KEY: &[u8] = b"__meta__";
    /// Key holding the insertion-ordered list of live document slots.
    pub const SLOTS_KEY: &[u8] = b"__slots__";
    /// Key holding the persisted advisory index list.
    pub const INDEXES_KEY: &[u8] = b"__indexes__";
    /// Key prefix for document payloads.
    pub const DOC_PREFIX: &[u8] = b"doc:";
    /// Tombstone marker byte for removed documents.
    pub const DOC_TOMBSTONE: u8 = b'-';
    /// Version tag for JSON document payloads.
    pub const DOC_RECORD_VERSION: u8 = 1;
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Version tag for file-store metadata compatibility checks.
    pub const STORE_VERSION: u8 = 1;
    /// Separator joining composite key values into a slot name.
    pub const SLOT_SEPARATOR: char = '\u{1f}';
    /// Default directory for persisted store files.
    pub const DEFAULT_STORE_DIR: &str = ".propforge_store";
    /// Default filename suffix for persisted store files.
    pub const STORE_FILE_EXTENSION: &str = "bin";
}
