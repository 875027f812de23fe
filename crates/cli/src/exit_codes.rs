//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes `gridcalc` returns.
//! Scripts wrapping the binary rely on these values.
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | General error (I/O failure writing output, etc.)   |
//! | 2    | Usage error (bad arguments, unreadable script)     |
//! | 3    | At least one script line failed                    |
//! | 4    | Config file unreadable or invalid                  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable input file.
pub const EXIT_USAGE: u8 = 2;

/// Script error - the run finished but one or more lines were rejected.
pub const EXIT_SCRIPT: u8 = 3;

/// Config error - the config file exists but cannot be read or parsed.
pub const EXIT_CONFIG: u8 = 4;
