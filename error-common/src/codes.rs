// Error codes implementation
// Standardized error codes reported in CareSense failure responses

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
}

pub mod knowledge_base {
    pub const UNAVAILABLE: &str = "KB_2001";
}

pub mod imaging {
    pub const ANALYSIS_FAILED: &str = "IMAGING_3001";
    pub const TIMEOUT: &str = "IMAGING_3002";
}

pub mod configuration {
    pub const INVALID: &str = "CONFIG_4001";
}

pub mod internal {
    pub const UNEXPECTED: &str = "INTERNAL_5001";
}
