//! The password modify tool.
//!
//! A run goes through the states of [`ToolState`] in order, and any failure
//! jumps straight to [`ToolState::Reported`]. Nothing is retried here; the
//! completion message is written exactly once per run.

use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

use ldap3::result::LdapError;

use crate::config::{self, Invocation, ToolConfig};
use crate::conn::{Connector, Session};
use crate::event::{ExceptionBus, ExceptionEvent};
use crate::passmod::{ChangeError, ChangePassword};
use crate::report::report;
use crate::result::{Disposition, Outcome, ResultCode};

/// The name of the tool, used in messages.
pub const TOOL_NAME: &str = "PasswordModifyExtendedOperationDemo";

/// The description of the tool, used in help and log messages.
pub const TOOL_DESCRIPTION: &str = "Demonstrates the use of the password modify extended \
    operation by changing the existing password specified by the --bindPassword command \
    line argument to the password specified by the --newPassword command line argument.";

/// Stages of a tool run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolState {
    Init,
    ArgsParsed,
    Connected,
    RequestSent,
    Reported,
}

/// Password modify tool driver.
pub struct PasswordModifyTool<C> {
    connector: C,
    bus: Arc<ExceptionBus>,
    state: ToolState,
}

impl<C: Connector> PasswordModifyTool<C> {
    pub fn new(connector: C, bus: Arc<ExceptionBus>) -> Self {
        PasswordModifyTool {
            connector,
            bus,
            state: ToolState::Init,
        }
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    fn advance(&mut self, state: ToolState) {
        debug!("{}: {:?} -> {:?}", TOOL_NAME, self.state, state);
        self.state = state;
    }

    /// Parse `args`, run the tool and write the completion message.
    ///
    /// Returns the result code which should become the exit status.
    pub async fn run<I, T>(&mut self, args: I, out: &mut dyn Write, err: &mut dyn Write) -> ResultCode
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.state = ToolState::Init;
        let outcome = match config::parse_args(TOOL_NAME, args) {
            Ok(Invocation::Run(config)) => {
                self.advance(ToolState::ArgsParsed);
                self.execute(&config, out, err).await
            }
            Ok(Invocation::Display(text)) => {
                if let Err(e) = out.write_all(text.as_bytes()) {
                    warn!("unable to write usage text: {}", e);
                }
                Outcome::Success {
                    generated_password: None,
                }
            }
            Err(e) => {
                if let Err(e) = writeln!(err, "{}", e) {
                    warn!("unable to write error message: {}", e);
                }
                Outcome::ConfigurationError {
                    message: e.to_string(),
                }
            }
        };
        let code = outcome.result_code();
        if let Err(e) = report(code, TOOL_NAME, Some(&mut *out), Some(&mut *err)) {
            warn!("unable to write completion message: {}", e);
        }
        self.advance(ToolState::Reported);
        code
    }

    /// Connect, change the password and close the connection.
    pub async fn execute(
        &mut self,
        config: &ToolConfig,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Outcome {
        info!("{}", TOOL_DESCRIPTION);
        let mut session = match self.connector.connect(config).await {
            Ok(session) => session,
            Err(e) => {
                let outcome = Outcome::ConnectionError {
                    code: ResultCode::from(&e),
                    message: e.to_string(),
                };
                self.dispatch(&outcome, None, e);
                return outcome;
            }
        };
        self.advance(ToolState::Connected);

        let outcome = self.change_password(config, session.as_mut(), err).await;
        if let Outcome::Success {
            generated_password: Some(ref pw),
        } = outcome
        {
            if let Err(e) = writeln!(out, "generated password: {}", pw) {
                warn!("unable to write generated password: {}", e);
            }
        }

        if let Err(e) = session.unbind().await {
            warn!("error closing connection to {}: {}", session.url(), e);
        }
        outcome
    }

    async fn change_password(
        &mut self,
        config: &ToolConfig,
        session: &mut dyn Session,
        err: &mut dyn Write,
    ) -> Outcome {
        let url = session.url().to_owned();
        self.advance(ToolState::RequestSent);
        let res = ChangePassword::new(session)
            .change(
                config.bind_dn(),
                config.bind_password(),
                config.new_password(),
                config.response_timeout(),
            )
            .await;
        match res {
            Ok(generated_password) => Outcome::Success { generated_password },
            Err(ChangeError::Ldap(e)) => {
                let outcome = Outcome::ProtocolFailure {
                    code: ResultCode::from(&e),
                    message: e.to_string(),
                };
                self.dispatch(&outcome, Some(&url), e);
                let line = format!(
                    "{} failed to change password at server {}; result from server was {}.",
                    TOOL_NAME,
                    url,
                    outcome.result_code()
                );
                if let Err(e) = writeln!(err, "{}", line) {
                    warn!("unable to write error message: {}", e);
                }
                outcome
            }
            Err(ChangeError::Unsupported(oid)) => {
                info!("{} does not support extended operation {}", url, oid);
                Outcome::UnsupportedFeature {
                    oid: oid.to_owned(),
                }
            }
            Err(ChangeError::Rejected(res)) => Outcome::OperationFailure {
                code: ResultCode(res.rc),
                text: res.text,
            },
            Err(ChangeError::Decoding(msg)) => {
                warn!("{}: {}", url, msg);
                Outcome::OperationFailure {
                    code: ResultCode::DECODING_ERROR,
                    text: msg.to_owned(),
                }
            }
        }
    }

    fn dispatch(&self, outcome: &Outcome, connection: Option<&str>, error: LdapError) {
        if outcome.disposition() == Disposition::Publish {
            self.bus
                .publish(&ExceptionEvent::new(TOOL_NAME, connection, error));
        }
    }
}
