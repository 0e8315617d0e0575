//! Directory connections.
//!
//! The tool never talks to `ldap3` directly; it goes through the
//! [`Connector`] and [`Session`] traits, so that the orchestration can be
//! exercised against an in-memory directory. [`LdapConnector`] is the real
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::exop::PasswordModify;
use ldap3::result::{ExopResult, Result};
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry};

use crate::config::ToolConfig;

const SUPPORTED_EXTENSION: &str = "supportedExtension";

/// Source of authenticated directory sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to the configured server and bind with the
    /// configured credentials. A failed bind is a failed connection.
    async fn connect(&self, config: &ToolConfig) -> Result<Box<dyn Session>>;
}

/// An open, bound connection, exclusively owned by one user.
#[async_trait]
pub trait Session: Send {
    /// URL of the server this session is connected to.
    fn url(&self) -> &str;

    /// OIDs of the extended operations advertised in the root DSE.
    async fn supported_extensions(&mut self) -> Result<Vec<String>>;

    /// Send a Password Modify extended request.
    async fn password_modify(
        &mut self,
        req: PasswordModify<'_>,
        timeout: Option<Duration>,
    ) -> Result<ExopResult>;

    /// Terminate the session.
    async fn unbind(&mut self) -> Result<()>;
}

/// Connector backed by the `ldap3` async client.
#[derive(Clone, Copy, Debug, Default)]
pub struct LdapConnector;

#[async_trait]
impl Connector for LdapConnector {
    async fn connect(&self, config: &ToolConfig) -> Result<Box<dyn Session>> {
        debug!("connecting to {}", config.url());
        let (conn, mut ldap) = LdapConnAsync::with_settings(config.settings(), config.url()).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });
        debug!("binding as {}", config.bind_dn());
        ldap.simple_bind(config.bind_dn(), config.bind_password())
            .await?
            .success()?;
        info!("connected to {} as {}", config.url(), config.bind_dn());
        Ok(Box::new(LdapSession {
            ldap,
            url: config.url().to_owned(),
        }))
    }
}

struct LdapSession {
    ldap: Ldap,
    url: String,
}

#[async_trait]
impl Session for LdapSession {
    fn url(&self) -> &str {
        &self.url
    }

    async fn supported_extensions(&mut self) -> Result<Vec<String>> {
        let (rs, _res) = self
            .ldap
            .search("", Scope::Base, "(objectClass=*)", vec![SUPPORTED_EXTENSION])
            .await?
            .success()?;
        let mut oids = vec![];
        for entry in rs {
            let entry = SearchEntry::construct(entry);
            for (attr, vals) in entry.attrs {
                if attr.eq_ignore_ascii_case(SUPPORTED_EXTENSION) {
                    oids.extend(vals);
                }
            }
        }
        Ok(oids)
    }

    async fn password_modify(
        &mut self,
        req: PasswordModify<'_>,
        timeout: Option<Duration>,
    ) -> Result<ExopResult> {
        if let Some(timeout) = timeout {
            self.ldap.with_timeout(timeout);
        }
        self.ldap.extended(req).await
    }

    async fn unbind(&mut self) -> Result<()> {
        self.ldap.unbind().await
    }
}
