//! Subcommand handlers.
//!
//! Each file in this module corresponds to one user-facing command:
//!
//! | File          | Invocation                | Description                          |
//! |---------------|---------------------------|--------------------------------------|
//! | `init.rs`     | `billing-backup init`     | Scaffold a `billing.toml`            |
//! | `run.rs`      | `billing-backup`          | Dump the database, write the script  |

pub mod init;
pub mod run;
