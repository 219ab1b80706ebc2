/// Caller-supplied process target: a numeric PID or an executable base name.
///
/// The kind is decided once at parse time, not re-derived by every
/// operation that consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Exact PID lookup.
    Pid(u32),
    /// Case-insensitive exact match on the executable base name.
    Name(String),
}

impl Target {
    /// Parse a descriptor string.
    ///
    /// Input that is entirely ASCII digits is a PID, anything else an image
    /// name. Empty input means "no target" and yields `None`; it resolves to
    /// zero matches downstream, it is not an error.
    pub fn parse(descriptor: &str) -> Option<Self> {
        if descriptor.is_empty() {
            return None;
        }
        if descriptor.bytes().all(|b| b.is_ascii_digit()) {
            // Digits that overflow a u32 cannot be a live PID; fall through
            // and treat them as a (never-matching) name.
            if let Ok(pid) = descriptor.parse::<u32>() {
                return Some(Target::Pid(pid));
            }
        }
        Some(Target::Name(descriptor.to_string()))
    }
}
