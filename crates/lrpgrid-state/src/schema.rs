//! Store paths for lrpgrid records.

const ACTUAL_LRP_SCHEMA_ROOT: &str = "/v1/actual";

/// Path of the actual LRP record for `(process_guid, index)`.
pub fn actual_lrp_schema_path(process_guid: &str, index: u32) -> String {
    format!("{ACTUAL_LRP_SCHEMA_ROOT}/{process_guid}/{index}")
}

/// Prefix shared by every actual LRP of a process guid.
pub fn actual_lrp_process_dir(process_guid: &str) -> String {
    format!("{ACTUAL_LRP_SCHEMA_ROOT}/{process_guid}/")
}
