//! Command line surface and the resolved tool configuration.
//!
//! [`Args`] is what the user typed; [`ToolConfig`] is the validated,
//! immutable result. Only the latter is seen by the rest of the crate.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use ldap3::LdapConnSettings;
use url::Url;

use crate::result::{Error, Result};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(version, about, disable_help_flag = true)]
pub struct Args {
    /// The IP address or resolvable name to use to connect to the directory server.
    #[arg(short = 'h', long = "hostname", value_name = "host", default_value = "localhost")]
    pub hostname: String,

    /// The port to use to connect to the directory server.
    #[arg(short = 'p', long = "port", value_name = "port", default_value_t = 389)]
    pub port: u16,

    /// The DN to use to bind to the directory server when performing simple authentication.
    #[arg(short = 'D', long = "bindDN", value_name = "dn")]
    pub bind_dn: Option<String>,

    /// The password to use to bind to the directory server.
    #[arg(short = 'w', long = "bindPassword", value_name = "password")]
    pub bind_password: Option<String>,

    /// The path to the file containing the bind password.
    #[arg(short = 'j', long = "bindPasswordFile", value_name = "path")]
    pub bind_password_file: Option<PathBuf>,

    /// Use SSL when communicating with the directory server.
    #[arg(short = 'Z', long = "useSSL")]
    pub use_ssl: bool,

    /// Use StartTLS when communicating with the directory server.
    #[arg(short = 'q', long = "useStartTLS")]
    pub use_start_tls: bool,

    /// Trust any certificate presented by the directory server.
    #[arg(short = 'X', long = "trustAll")]
    pub trust_all: bool,

    /// Maximum time in milliseconds for a connection attempt; zero means no limit.
    #[arg(
        long = "connectTimeoutMillis",
        value_name = "connect-timeout-millis-integer",
        default_value_t = 10_000
    )]
    pub connect_timeout_millis: u64,

    /// Maximum time in milliseconds an operation may block; zero or less means no limit.
    #[arg(
        long = "maxResponseTimeMillis",
        value_name = "max-response-time-in-milliseconds",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub max_response_time_millis: i64,

    /// The new password. If absent, the server must generate a new password
    /// and return it in the response.
    #[arg(short = 'n', long = "newPassword", value_name = "new-password")]
    pub new_password: Option<String>,

    /// Display usage information for this program.
    #[arg(short = 'H', long = "help", action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Result of command line parsing.
#[derive(Debug)]
pub enum Invocation {
    /// Run the tool with this configuration.
    Run(ToolConfig),
    /// Help or version text was requested; print it and stop.
    Display(String),
}

/// Validated tool configuration.
#[derive(Clone)]
pub struct ToolConfig {
    bind_dn: String,
    bind_password: String,
    use_ssl: bool,
    use_start_tls: bool,
    trust_all: bool,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    new_password: Option<String>,
    url: String,
}

// Passwords stay out of debug output.
impl std::fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ToolConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("use_start_tls", &self.use_start_tls)
            .field("trust_all", &self.trust_all)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("new_password", &self.new_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Parse the command line, `args[0]` being the program name.
pub fn parse_args<I, T>(tool_name: &str, args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(args) {
        Ok(args) => ToolConfig::from_args(tool_name, args).map(Invocation::Run),
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                Ok(Invocation::Display(e.render().to_string()))
            }
            _ => Err(Error::Config(e.render().to_string())),
        },
    }
}

impl ToolConfig {
    pub fn from_args(tool_name: &str, args: Args) -> Result<Self> {
        let bind_dn = match args.bind_dn {
            Some(dn) if !dn.trim().is_empty() => dn,
            _ => {
                return Err(Error::Config(format!(
                    "No bindDN was specified on the command line. {} requires a valid bindDN. \
                     Use '--bindDN DN' to specify the bind DN or use '--help'.",
                    tool_name
                )))
            }
        };
        let bind_password = match (args.bind_password, args.bind_password_file) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(String::from(
                    "--bindPassword and --bindPasswordFile cannot be used together",
                )))
            }
            (Some(pw), None) => pw,
            (None, Some(path)) => read_password_file(&path)?,
            (None, None) => {
                return Err(Error::Config(String::from(
                    "a bind password is required: use --bindPassword or --bindPasswordFile",
                )))
            }
        };
        if args.use_ssl && args.use_start_tls {
            return Err(Error::Config(String::from(
                "--useSSL and --useStartTLS cannot be used together",
            )));
        }
        if matches!(args.new_password, Some(ref pw) if pw.is_empty()) {
            return Err(Error::Config(String::from(
                "the value of --newPassword must not be empty",
            )));
        }
        let scheme = if args.use_ssl { "ldaps" } else { "ldap" };
        let url = Url::parse(&format!("{}://{}:{}", scheme, args.hostname, args.port))
            .map_err(|e| Error::Config(format!("invalid hostname {:?}: {}", args.hostname, e)))?;
        let url = url.as_str().trim_end_matches('/').to_owned();
        let connect_timeout = match args.connect_timeout_millis {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let response_timeout = match args.max_response_time_millis {
            ms if ms <= 0 => None,
            ms => Some(Duration::from_millis(ms.unsigned_abs())),
        };
        Ok(ToolConfig {
            bind_dn,
            bind_password,
            use_ssl: args.use_ssl,
            use_start_tls: args.use_start_tls,
            trust_all: args.trust_all,
            connect_timeout,
            response_timeout,
            new_password: args.new_password,
            url,
        })
    }

    /// Server URL, `ldap://host:port` or `ldaps://host:port`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    pub fn bind_password(&self) -> &str {
        &self.bind_password
    }

    pub fn new_password(&self) -> Option<&str> {
        self.new_password.as_deref()
    }

    pub fn uses_ssl(&self) -> bool {
        self.use_ssl
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// Connection settings for the protocol library.
    pub fn settings(&self) -> LdapConnSettings {
        let mut settings = LdapConnSettings::new()
            .set_starttls(self.use_start_tls)
            .set_no_tls_verify(self.trust_all);
        if let Some(timeout) = self.connect_timeout {
            settings = settings.set_conn_timeout(timeout);
        }
        settings
    }
}

fn read_password_file(path: &PathBuf) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "unable to read bind password file {}: {}",
            path.display(),
            e
        ))
    })?;
    let password = content.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(Error::Config(format!(
            "bind password file {} is empty",
            path.display()
        )));
    }
    Ok(password)
}
