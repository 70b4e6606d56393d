//! Common infrastructure for meshroute daemons.
//!
//! - [`error`]: the [`RouteMgrError`] type shared by every crate
//! - [`shell`]: safe shell command execution with proper quoting
//!
//! # Example
//!
//! ```ignore
//! use meshroute_common::{
//!     shell::{self, SYSCTL_CMD},
//!     RouteMgrResult,
//! };
//!
//! async fn enable_forwarding() -> RouteMgrResult<()> {
//!     let cmd = format!("{} -w net.ipv4.ip_forward=1", SYSCTL_CMD);
//!     shell::exec_or_throw(&cmd).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod shell;

pub use error::{RouteMgrError, RouteMgrResult};
