//! Actor and change-source classification.

use activity_core::{Actor, ActorType, ChangeSource};

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";
const SYSTEM_PREFIX: &str = "system:";

/// Classify the acting identity from its username.
///
/// `system:serviceaccount:<ns>:<sa>` identities classify as service
/// accounts, other `system:` identities as controllers, everything else as
/// a user. A user's email is taken from the explicit attribute when
/// present, otherwise from an email-shaped username.
pub fn classify_actor(username: &str, uid: &str, email: Option<&str>) -> Actor {
    if username.is_empty() {
        return Actor {
            actor_type: ActorType::Unknown,
            name: String::new(),
            email: None,
            uid: uid.to_string(),
        };
    }

    if let Some(rest) = username.strip_prefix(SERVICE_ACCOUNT_PREFIX) {
        // `<namespace>:<name>`; a malformed remainder falls through to the
        // controller branch below via the plain system: prefix.
        if let Some((_namespace, name)) = rest.split_once(':') {
            return Actor {
                actor_type: ActorType::ServiceAccount,
                name: name.to_string(),
                email: None,
                uid: uid.to_string(),
            };
        }
    }

    if let Some(component) = username.strip_prefix(SYSTEM_PREFIX) {
        return Actor {
            actor_type: ActorType::Controller,
            name: component.rsplit(':').next().unwrap_or(component).to_string(),
            email: None,
            uid: uid.to_string(),
        };
    }

    let email = email
        .map(str::to_string)
        .or_else(|| username.contains('@').then(|| username.to_string()));
    Actor {
        actor_type: ActorType::User,
        name: username.to_string(),
        email,
        uid: uid.to_string(),
    }
}

/// `human` iff the actor is a user whose username is not a `system:`
/// identity; service accounts, controllers and anonymous callers are
/// `system`.
pub fn change_source(actor: &Actor, username: &str) -> ChangeSource {
    if actor.actor_type == ActorType::User && !username.starts_with(SYSTEM_PREFIX) {
        ChangeSource::Human
    } else {
        ChangeSource::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_classification() {
        let actor = classify_actor("system:serviceaccount:kube-system:default", "u-1", None);
        assert_eq!(actor.actor_type, ActorType::ServiceAccount);
        assert_eq!(actor.name, "default");
        assert_eq!(actor.uid, "u-1");
        assert_eq!(change_source(&actor, "system:serviceaccount:kube-system:default"),
                   ChangeSource::System);
    }

    #[test]
    fn controller_classification_takes_trailing_component() {
        let actor = classify_actor("system:kube-controller-manager", "u-2", None);
        assert_eq!(actor.actor_type, ActorType::Controller);
        assert_eq!(actor.name, "kube-controller-manager");
        assert_eq!(change_source(&actor, "system:kube-controller-manager"), ChangeSource::System);
    }

    #[test]
    fn user_classification_with_email_username() {
        let actor = classify_actor("jane@example.com", "u-42", None);
        assert_eq!(actor.actor_type, ActorType::User);
        assert_eq!(actor.name, "jane@example.com");
        assert_eq!(actor.email.as_deref(), Some("jane@example.com"));
        assert_eq!(change_source(&actor, "jane@example.com"), ChangeSource::Human);
    }

    #[test]
    fn explicit_email_attribute_wins() {
        let actor = classify_actor("jane", "u-42", Some("jane@corp.example"));
        assert_eq!(actor.email.as_deref(), Some("jane@corp.example"));
    }

    #[test]
    fn empty_username_is_unknown_and_system() {
        let actor = classify_actor("", "u-0", None);
        assert_eq!(actor.actor_type, ActorType::Unknown);
        assert_eq!(change_source(&actor, ""), ChangeSource::System);
    }
}
