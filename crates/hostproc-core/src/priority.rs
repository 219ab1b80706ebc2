use serde::{Deserialize, Serialize};

/// OS priority classes addressable through `set_priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityClass {
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl PriorityClass {
    /// Map the single-letter codes of the classic interface.
    ///
    /// `L B N A H R`, case-insensitive. Anything else is a validation
    /// failure for the caller, never a crash.
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'L' => Some(PriorityClass::Idle),
            'B' => Some(PriorityClass::BelowNormal),
            'N' => Some(PriorityClass::Normal),
            'A' => Some(PriorityClass::AboveNormal),
            'H' => Some(PriorityClass::High),
            'R' => Some(PriorityClass::Realtime),
            _ => None,
        }
    }

    /// Nice level this class maps onto where priorities are nice values.
    pub fn nice_level(self) -> i32 {
        match self {
            PriorityClass::Idle => 19,
            PriorityClass::BelowNormal => 10,
            PriorityClass::Normal => 0,
            PriorityClass::AboveNormal => -5,
            PriorityClass::High => -10,
            PriorityClass::Realtime => -20,
        }
    }
}
