/// Identifier of an aggregated molecule record.
/// Example: `b9ba54febc77d2a9177accf4605767db-C1Li2O3-1-2`
pub type MoleculeId = String;
/// Partition key grouping molecule and property records for independent processing.
/// Example: `C1 Li2 O3`
pub type GroupKey = String;
/// Solvent environment tag used as the per-molecule sub-category.
/// Examples: `NONE`, `SOLVENT=WATER`, `DIELECTRIC=18,500;N=1,415`
pub type SolventTag = String;
/// Identifier of a derived property document.
/// Example: `b9ba54febc77d2a9177accf4605767db-C1Li2O3-1-2-orbitals-NONE`
pub type PropertyId = String;
/// Document field name or dotted field path.
/// Examples: `molecule_id`, `output.nbo`, `orig.rem.run_nbo6`
pub type FieldName = String;
/// Raw level-of-theory descriptor.
/// Example: `wB97X-V/def2-TZVPPD/SMD(SOLVENT=WATER)`
pub type LevelOfTheoryText = String;
/// Warning/log message text.
/// Examples: `task lookup missed`, `[propforge:builder] group 'C1 O2' failed: ...`
pub type LogMessage = String;
