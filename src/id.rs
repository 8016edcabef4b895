use uuid::Uuid;

pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Short random token for object keys.
pub fn random_suffix() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..8].to_string()
}
