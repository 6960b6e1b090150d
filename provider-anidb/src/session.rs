//! `AUTH` / `LOGOUT` wire text and reply classification.

use core_runtime::config::{ClientIdentity, Credentials};

use crate::codec::{self, encode_value};

/// Result of an `AUTH` exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    Accepted {
        token: String,
        /// `201`: a newer client version is available
        new_version_available: bool,
    },
    Rejected { reason: String },
    Banned { reason: Option<String> },
    Transient { reason: String },
}

/// Renders the `AUTH` request.
pub fn render_auth(credentials: &Credentials, client: &ClientIdentity) -> String {
    format!(
        "AUTH user={}&pass={}&protover={}&client={}&clientver={}&enc=UTF8",
        encode_value(&credentials.username),
        encode_value(&credentials.password),
        client.protocol_version,
        encode_value(&client.name),
        client.version
    )
}

/// Classifies an `AUTH` reply.
pub fn parse_auth(code: u16, body: &str) -> AuthReply {
    match code {
        codec::LOGIN_ACCEPTED | codec::LOGIN_ACCEPTED_NEW_VERSION => {
            match codec::message(body).split_whitespace().next() {
                Some(token) => AuthReply::Accepted {
                    token: token.to_string(),
                    new_version_available: code == codec::LOGIN_ACCEPTED_NEW_VERSION,
                },
                None => AuthReply::Transient {
                    reason: "login accepted without session key".to_string(),
                },
            }
        }
        codec::LOGIN_FAILED => AuthReply::Rejected {
            reason: "invalid username or password".to_string(),
        },
        codec::CLIENT_VERSION_OUTDATED => AuthReply::Rejected {
            reason: "client version outdated".to_string(),
        },
        codec::CLIENT_BANNED => AuthReply::Banned {
            reason: Some(format!("client banned: {}", codec::message(body))),
        },
        codec::BANNED => AuthReply::Banned {
            reason: codec::ban_reason(body),
        },
        _ => AuthReply::Transient {
            reason: format!("unexpected login reply {}: {}", code, codec::message(body)),
        },
    }
}

/// Renders `LOGOUT` for the given session key.
pub fn render_logout(token: &str) -> String {
    codec::append_session("LOGOUT", token)
}

/// `203 LOGGED OUT` and `403 NOT LOGGED IN` both mean the session is gone.
pub fn logout_accepted(code: u16) -> bool {
    matches!(code, codec::LOGGED_OUT | codec::NOT_LOGGED_IN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_auth() {
        let credentials = Credentials::new("alice", "p&ss");
        let client = ClientIdentity::default();

        assert_eq!(
            render_auth(&credentials, &client),
            "AUTH user=alice&pass=p&amp;ss&protover=3&client=anisync&clientver=1&enc=UTF8"
        );
    }

    #[test]
    fn test_parse_auth_accepted() {
        assert_eq!(
            parse_auth(200, "Xk3Qp LOGIN ACCEPTED"),
            AuthReply::Accepted {
                token: "Xk3Qp".to_string(),
                new_version_available: false
            }
        );
        assert!(matches!(
            parse_auth(201, "Xk3Qp LOGIN ACCEPTED - NEW VERSION AVAILABLE"),
            AuthReply::Accepted {
                new_version_available: true,
                ..
            }
        ));
        assert!(matches!(parse_auth(200, ""), AuthReply::Transient { .. }));
    }

    #[test]
    fn test_parse_auth_failures() {
        assert!(matches!(parse_auth(500, "LOGIN FAILED"), AuthReply::Rejected { .. }));
        assert!(matches!(
            parse_auth(503, "CLIENT VERSION OUTDATED"),
            AuthReply::Rejected { .. }
        ));
        assert!(matches!(parse_auth(504, "CLIENT BANNED - spam"), AuthReply::Banned { .. }));
        assert_eq!(
            parse_auth(555, "BANNED\nflooding"),
            AuthReply::Banned {
                reason: Some("flooding".to_string())
            }
        );
        assert!(matches!(parse_auth(601, "OUT OF SERVICE"), AuthReply::Transient { .. }));
    }

    #[test]
    fn test_logout() {
        assert_eq!(render_logout("Xk3Qp"), "LOGOUT s=Xk3Qp");
        assert!(logout_accepted(203));
        assert!(logout_accepted(403));
        assert!(!logout_accepted(501));
    }
}
