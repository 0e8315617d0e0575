//! Password change through the Password Modify extended operation
//! ([RFC 3062](https://tools.ietf.org/html/rfc3062)).

use std::time::Duration;

use ldap3::asn1::{parse_tag, TagClass};
use ldap3::exop::PasswordModify;
use ldap3::result::{LdapError, LdapResult};
use thiserror::Error;

use crate::conn::Session;

/// OID of the Password Modify extended operation.
pub const PASSMOD_OID: &str = "1.3.6.1.4.1.4203.1.11.1";

/// Ways a password change can fail.
#[derive(Debug, Error)]
pub enum ChangeError {
    /// The server doesn't list the operation among its supported extensions.
    #[error("the server does not support the password modify extended operation ({0})")]
    Unsupported(&'static str),
    /// The library couldn't complete the exchange.
    #[error("password modify request failed: {0}")]
    Ldap(#[from] LdapError),
    /// The server processed the request and returned a non-success result.
    #[error("password modify rejected: {0}")]
    Rejected(LdapResult),
    /// The server returned a response value which isn't a valid
    /// `PasswdModifyResponseValue`.
    #[error("undecodable password modify response: {0}")]
    Decoding(&'static str),
}

/// Extract `genPasswd` from a `PasswdModifyResponseValue`.
///
/// The field is optional, so a well-formed empty sequence yields `None`.
fn generated_password(val: &[u8]) -> Result<Option<String>, ChangeError> {
    let tag = match parse_tag(val) {
        Ok((_, tag)) => tag,
        Err(_) => return Err(ChangeError::Decoding("malformed response value")),
    };
    let elems = tag
        .match_class(TagClass::Universal)
        .and_then(|t| t.match_id(16))
        .and_then(|t| t.expect_constructed())
        .ok_or(ChangeError::Decoding("response value is not a sequence"))?;
    for elem in elems {
        if let Some(elem) = elem.match_class(TagClass::Context).and_then(|t| t.match_id(0)) {
            let gen_pass = elem
                .expect_primitive()
                .ok_or(ChangeError::Decoding("genPasswd is not primitive"))?;
            return String::from_utf8(gen_pass)
                .map(Some)
                .map_err(|_| ChangeError::Decoding("genPasswd is not UTF-8"));
        }
    }
    Ok(None)
}

/// Password changing service bound to one session.
pub struct ChangePassword<'a> {
    session: &'a mut dyn Session,
}

impl<'a> ChangePassword<'a> {
    pub fn new(session: &'a mut dyn Session) -> Self {
        ChangePassword { session }
    }

    /// Change the password of `user_id` from `old_pass` to `new_pass`.
    ///
    /// If `new_pass` is `None`, the server is asked to generate a password,
    /// which is returned on success. The root DSE is consulted first, and a
    /// server which doesn't advertise the operation isn't sent the request.
    pub async fn change(
        &mut self,
        user_id: &str,
        old_pass: &str,
        new_pass: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, ChangeError> {
        let supported = self.session.supported_extensions().await?;
        if !supported.iter().any(|oid| oid == PASSMOD_OID) {
            return Err(ChangeError::Unsupported(PASSMOD_OID));
        }
        let req = PasswordModify {
            user_id: Some(user_id),
            old_pass: Some(old_pass),
            new_pass,
        };
        debug!(
            "sending password modify for {} ({} new password)",
            user_id,
            if new_pass.is_some() { "client supplied" } else { "server generated" }
        );
        let res = self.session.password_modify(req, timeout).await?;
        if res.1.rc != 0 {
            return Err(ChangeError::Rejected(res.1));
        }
        match res.0.val {
            Some(ref val) if new_pass.is_none() => generated_password(val),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io;

    use async_trait::async_trait;
    use ldap3::exop::Exop;
    use ldap3::result::{ExopResult, Result};

    struct Canned {
        extensions: Vec<String>,
        rc: u32,
        val: Option<Vec<u8>>,
        fail: bool,
        sent: Vec<(Option<String>, Option<String>)>,
    }

    impl Canned {
        fn new(extensions: &[&str]) -> Self {
            Canned {
                extensions: extensions.iter().map(|s| s.to_string()).collect(),
                rc: 0,
                val: None,
                fail: false,
                sent: vec![],
            }
        }
    }

    #[async_trait]
    impl Session for Canned {
        fn url(&self) -> &str {
            "ldap://canned:389"
        }

        async fn supported_extensions(&mut self) -> Result<Vec<String>> {
            Ok(self.extensions.clone())
        }

        async fn password_modify(
            &mut self,
            req: PasswordModify<'_>,
            _timeout: Option<Duration>,
        ) -> Result<ExopResult> {
            self.sent.push((
                req.user_id.map(str::to_owned),
                req.new_pass.map(str::to_owned),
            ));
            if self.fail {
                return Err(LdapError::from(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection reset",
                )));
            }
            Ok(ExopResult(
                Exop {
                    name: None,
                    val: self.val.clone(),
                },
                LdapResult {
                    rc: self.rc,
                    matched: String::new(),
                    text: String::from("password policy"),
                    refs: vec![],
                    ctrls: vec![],
                },
            ))
        }

        async fn unbind(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unsupported_is_not_sent() {
        let mut s = Canned::new(&["1.3.6.1.4.1.4203.1.11.3"]);
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", Some("new"), None)
            .await;
        assert!(matches!(res, Err(ChangeError::Unsupported(PASSMOD_OID))));
        assert!(s.sent.is_empty());
    }

    #[tokio::test]
    async fn client_supplied_password() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", Some("new"), None)
            .await
            .expect("change");
        assert_eq!(res, None);
        assert_eq!(
            s.sent,
            vec![(Some(String::from("cn=me")), Some(String::from("new")))]
        );
    }

    #[tokio::test]
    async fn server_generated_password() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        // SEQUENCE { [0] "s3cret" }
        s.val = Some(vec![0x30, 0x08, 0x80, 0x06, b's', b'3', b'c', b'r', b'e', b't']);
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", None, None)
            .await
            .expect("change");
        assert_eq!(res.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn empty_response_sequence_has_no_password() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        s.val = Some(vec![0x30, 0x00]);
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", None, None)
            .await
            .expect("change");
        assert_eq!(res, None);
    }

    #[tokio::test]
    async fn invalid_utf8_password_is_decoding_error() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        // SEQUENCE { [0] ff fe }
        s.val = Some(vec![0x30, 0x04, 0x80, 0x02, 0xff, 0xfe]);
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", None, None)
            .await;
        assert!(matches!(res, Err(ChangeError::Decoding(_))));
    }

    #[test]
    fn garbage_response_value() {
        assert!(matches!(
            generated_password(&[0x04, 0x01, b'x']),
            Err(ChangeError::Decoding(_))
        ));
        assert!(matches!(
            generated_password(&[0x30, 0x05, 0x80]),
            Err(ChangeError::Decoding(_))
        ));
    }

    #[tokio::test]
    async fn rejection_keeps_server_code() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        s.rc = 19;
        match ChangePassword::new(&mut s)
            .change("cn=me", "old", Some("new"), None)
            .await
        {
            Err(ChangeError::Rejected(res)) => assert_eq!(res.rc, 19),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_ldap_error() {
        let mut s = Canned::new(&[PASSMOD_OID]);
        s.fail = true;
        let res = ChangePassword::new(&mut s)
            .change("cn=me", "old", Some("new"), None)
            .await;
        assert!(matches!(res, Err(ChangeError::Ldap(LdapError::Io { .. }))));
    }
}
