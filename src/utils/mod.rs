pub mod time;

/// Generates a 21 character url-safe id.
pub fn longid() -> String {
    nanoid::nanoid!()
}

