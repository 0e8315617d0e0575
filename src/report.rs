//! Completion message for a finished tool run.

use std::io::Write;

use crate::result::{Error, ResultCode, Result};

/// Final status line of a tool invocation.
///
/// The line is written to the normal output channel if the result code
/// is `success`, and to the error channel otherwise.
#[derive(Clone, Debug)]
pub struct CompletedProcessing<'a> {
    tool: &'a str,
    result_code: ResultCode,
}

impl<'a> CompletedProcessing<'a> {
    /// The tool name must not be empty.
    pub fn new(tool: &'a str, result_code: ResultCode) -> Result<Self> {
        if tool.is_empty() {
            return Err(Error::InvalidArgument("tool name"));
        }
        Ok(CompletedProcessing { tool, result_code })
    }

    pub fn message(&self) -> String {
        format!(
            "{} has completed processing, the result code was: {}",
            self.tool, self.result_code
        )
    }

    /// Write the message to the channel selected by the result code.
    ///
    /// Both channels must be present, even though only one is written to.
    pub fn display_message(
        &self,
        out: Option<&mut dyn Write>,
        err: Option<&mut dyn Write>,
    ) -> Result<()> {
        let (out, err) = match (out, err) {
            (Some(out), Some(err)) => (out, err),
            (None, _) => return Err(Error::InvalidArgument("output channel")),
            (_, None) => return Err(Error::InvalidArgument("error channel")),
        };
        let channel: &mut dyn Write = if self.result_code.is_success() { out } else { err };
        writeln!(channel, "{}", self.message())?;
        channel.flush()?;
        Ok(())
    }
}

/// Validate the arguments and write the completion message in one step.
pub fn report(
    result_code: ResultCode,
    tool: &str,
    out: Option<&mut dyn Write>,
    err: Option<&mut dyn Write>,
) -> Result<()> {
    CompletedProcessing::new(tool, result_code)?.display_message(out, err)
}
