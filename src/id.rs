use uuid::Uuid;

/// Time-ordered ids so insertion order survives index scans.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}
