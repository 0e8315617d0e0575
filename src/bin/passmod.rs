// Changes the bind user's password with the Password Modify extended
// operation. Without --newPassword the server is asked to generate one.
//
//   passmod --hostname ldap.example.com --port 389 \
//       --bindDN uid=user,ou=People,dc=example,dc=com \
//       --bindPassword existingPassword --newPassword newPassword
//
// Set RUST_LOG=debug to follow the run.

use std::io;
use std::sync::Arc;

use ldap3_passmod::{ExceptionBus, LdapConnector, LogListener, PasswordModifyTool};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let bus = Arc::new(ExceptionBus::new());
    bus.register(Some(Arc::new(LogListener)));
    let mut tool = PasswordModifyTool::new(LdapConnector, bus);
    let (mut out, mut err) = (io::stdout(), io::stderr());
    let rc = tool.run(std::env::args_os(), &mut out, &mut err).await;
    std::process::exit(rc.exit_status());
}
