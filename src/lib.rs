//! A demonstration of the LDAP Password Modify extended operation.
//!
//! The crate drives a single password change against a directory server,
//! using the [`ldap3`](https://docs.rs/ldap3) client for everything on the
//! wire. What it adds on top is the plumbing of a small command line tool:
//!
//! * argument parsing into an immutable configuration ([`config`]);
//! * a connection seam which can be replaced in tests ([`conn`]);
//! * classification of every way a run can end ([`result::Outcome`]);
//! * delivery of transport and protocol failures to interested
//!   listeners ([`event`]);
//! * the final "has completed processing" line ([`report`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::io;
//! use std::sync::Arc;
//!
//! use ldap3_passmod::{ExceptionBus, LdapConnector, LogListener, PasswordModifyTool};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = Arc::new(ExceptionBus::new());
//!     bus.register(Some(Arc::new(LogListener)));
//!     let mut tool = PasswordModifyTool::new(LdapConnector, bus);
//!     let rc = tool
//!         .run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
//!         .await;
//!     std::process::exit(rc.exit_status());
//! }
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod conn;
pub mod event;
pub mod passmod;
pub mod report;
pub mod result;
mod tool;

pub use config::{Invocation, ToolConfig};
pub use conn::{Connector, LdapConnector, Session};
pub use event::{ExceptionBus, ExceptionEvent, ExceptionListener, LogListener};
pub use passmod::{ChangeError, ChangePassword, PASSMOD_OID};
pub use report::{report, CompletedProcessing};
pub use result::{Disposition, Error, Outcome, ResultCode};
pub use tool::{PasswordModifyTool, ToolState, TOOL_DESCRIPTION, TOOL_NAME};
