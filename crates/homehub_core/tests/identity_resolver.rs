use homehub_core::db::open_db_in_memory;
use homehub_core::{
    CredentialError, IdentityError, IdentityResolver, JwtVerifier, SqliteMembershipStore,
    TokenVerifier,
};
use std::cell::Cell;

const SECRET: &str = "resolver-secret";

struct CountingVerifier {
    inner: JwtVerifier,
    calls: Cell<usize>,
}

impl TokenVerifier for CountingVerifier {
    fn verify(&self, token: &str) -> Result<String, CredentialError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.verify(token)
    }
}

fn token_for(email: &str) -> String {
    JwtVerifier::new(SECRET).issue(email).unwrap()
}

#[test]
fn resolves_registered_principal() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);
    let family = store.register_family("F1").unwrap();
    store
        .register_principal("a@fam1.com", Some(family.family_id))
        .unwrap();

    let resolver = IdentityResolver::new("Bearer", JwtVerifier::new(SECRET));
    let credential = format!("Bearer {}", token_for("a@fam1.com"));
    let principal = resolver.resolve(Some(&credential), &store).unwrap();
    assert_eq!(principal.email, "a@fam1.com");
    assert_eq!(principal.family_id, Some(family.family_id));
}

#[test]
fn malformed_credentials_never_reach_the_verifier() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);
    let verifier = CountingVerifier {
        inner: JwtVerifier::new(SECRET),
        calls: Cell::new(0),
    };
    let resolver = IdentityResolver::new("Bearer", &verifier);

    let bare_token = token_for("a@fam1.com");
    for credential in [None, Some(""), Some(bare_token.as_str()), Some("Bearer")] {
        let err = resolver.resolve(credential, &store).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredential(_)));
    }
    assert_eq!(verifier.calls.get(), 0);
}

#[test]
fn tampered_token_is_invalid_credential() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);
    store.register_principal("a@fam1.com", None).unwrap();

    let resolver = IdentityResolver::new("Bearer", JwtVerifier::new(SECRET));
    let forged = JwtVerifier::new("someone-else").issue("a@fam1.com").unwrap();
    let err = resolver
        .resolve(Some(&format!("Bearer {forged}")), &store)
        .unwrap_err();
    assert!(matches!(
        err,
        IdentityError::InvalidCredential(CredentialError::Rejected(_))
    ));
}

#[test]
fn verified_but_unregistered_identity_is_unknown_principal() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);

    let resolver = IdentityResolver::new("Bearer", JwtVerifier::new(SECRET));
    let credential = format!("Bearer {}", token_for("ghost@fam9.com"));
    let err = resolver.resolve(Some(&credential), &store).unwrap_err();
    assert!(matches!(err, IdentityError::UnknownPrincipal(email) if email == "ghost@fam9.com"));
}

#[test]
fn custom_scheme_is_honoured() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteMembershipStore::new(&conn);
    store.register_principal("a@fam1.com", None).unwrap();

    let resolver = IdentityResolver::new("Token", JwtVerifier::new(SECRET));
    let token = token_for("a@fam1.com");
    assert!(resolver
        .resolve(Some(&format!("Token {token}")), &store)
        .is_ok());
    assert!(resolver
        .resolve(Some(&format!("Bearer {token}")), &store)
        .is_err());
}
