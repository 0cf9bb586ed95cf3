// src/identity.rs

use git2::Signature;

use crate::error::SinkError;
use crate::model::UserRecord;
use crate::run::RunAccumulator;
use crate::sink::Sink;

/// Username given to identities with neither a name nor an email
pub const UNKNOWN_USERNAME: &str = "unknown";

/// Canonicalizes a raw identity.
///
/// The display name wins when present and the email becomes an alias;
/// otherwise the email itself is the username. Both are lower-cased.
pub fn resolve(name: &str, email: &str) -> UserRecord {
    let name = name.trim();
    let email = email.trim();

    if !name.is_empty() {
        let mut user = UserRecord::new(name.to_lowercase());
        if !email.is_empty() {
            user.aliases.insert(email.to_lowercase());
        }
        user
    } else if !email.is_empty() {
        UserRecord::new(email.to_lowercase())
    } else {
        UserRecord::new(UNKNOWN_USERNAME)
    }
}

pub fn resolve_signature(sig: &Signature<'_>) -> UserRecord {
    resolve(
        &String::from_utf8_lossy(sig.name_bytes()),
        &String::from_utf8_lossy(sig.email_bytes()),
    )
}

/// Resolves `sig`, merges it into the run and forwards it if the run changed.
/// Forwarding happens under the run's user lock, so the sink sees alias sets grow in order.
/// Returns the canonical username.
pub fn register(
    sig: &Signature<'_>,
    run: &RunAccumulator,
    sink: Option<&dyn Sink>,
) -> Result<String, SinkError> {
    let user = resolve_signature(sig);
    let username = user.username.clone();

    run.register_user(user, |merged| match sink {
        Some(sink) => sink.persist_user(merged),
        None => Ok(()),
    })?;
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_wins_and_email_becomes_alias() {
        let user = resolve("Jane Doe", "Jane.Doe@Example.COM");
        assert_eq!(user.username, "jane doe");
        assert_eq!(
            user.aliases.into_iter().collect::<Vec<_>>(),
            vec!["jane.doe@example.com".to_string()]
        );
    }

    #[test]
    fn email_only_identity_has_no_alias() {
        let user = resolve("", "Bot@CI.example");
        assert_eq!(user.username, "bot@ci.example");
        assert!(user.aliases.is_empty());
    }

    #[test]
    fn empty_identity_resolves_to_placeholder() {
        let user = resolve("  ", "");
        assert_eq!(user.username, UNKNOWN_USERNAME);
        assert!(user.aliases.is_empty());
    }

    #[test]
    fn signature_bytes_are_decoded() {
        let sig = Signature::now("Zoë", "zoe@example.com").unwrap();
        assert_eq!(resolve_signature(&sig).username, "zoë");
    }
}
