use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sa_kubeconfig::{
    AmbientConnectionResolver, ConnectionFacts, ContractViolationError, Error,
    InvalidRequestError, IssuanceError, MintConfig, Minter, ResolutionError, ResolvedConnection,
    TokenIssuer, TokenRequestCaller, TokenRequestSpec, TokenStatus,
};

#[derive(Clone, Debug)]
enum Reply {
    Token(TokenStatus),
    Timeout,
    Forbidden,
}

#[derive(Clone, Debug)]
struct FakeCaller {
    reply: Reply,
    calls: Arc<AtomicUsize>,
}

impl FakeCaller {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn returning_token(token: &str) -> Self {
        Self::new(Reply::Token(TokenStatus {
            token: token.to_owned(),
            expiration_timestamp: Some("2026-10-15T13:00:00Z".to_owned()),
        }))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRequestCaller for FakeCaller {
    async fn create_token(&self, _request: &TokenRequestSpec) -> Result<TokenStatus, IssuanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Token(status) => Ok(status.clone()),
            Reply::Timeout => Err(IssuanceError::Timeout("deadline elapsed".into())),
            Reply::Forbidden => Err(IssuanceError::Rejected {
                status: 403,
                reason: Some("Forbidden".to_owned()),
                message: "cannot create resource \"serviceaccounts/token\"".to_owned(),
            }),
        }
    }
}

#[derive(Debug)]
struct FakeResolver {
    facts: Result<ConnectionFacts, ()>,
    caller: FakeCaller,
}

impl FakeResolver {
    fn new(caller: FakeCaller) -> Self {
        let facts =
            ConnectionFacts::new("https://10.0.0.1:6443", b"CA-BYTES".to_vec(), "prod").unwrap();
        Self {
            facts: Ok(facts),
            caller,
        }
    }

    fn unresolvable(caller: FakeCaller) -> Self {
        Self { facts: Err(()), caller }
    }
}

impl AmbientConnectionResolver for FakeResolver {
    type Caller = FakeCaller;

    fn resolve(&self) -> Result<ResolvedConnection<FakeCaller>, ResolutionError> {
        match &self.facts {
            Ok(facts) => Ok(ResolvedConnection::new(facts.clone(), self.caller.clone())),
            Err(()) => Err(ResolutionError::NoCurrentContext),
        }
    }
}

fn config() -> MintConfig {
    MintConfig::new("build-bot", "ci").with_audiences(["vault"])
}

#[tokio::test]
async fn test_mint_composes_single_triple() {
    let caller = FakeCaller::returning_token("tok-123");
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let profile = minter.mint(&config()).await.unwrap();

    assert_eq!(profile.cluster().name, "prod");
    assert_eq!(profile.cluster().cluster.server, "https://10.0.0.1:6443");
    assert_eq!(profile.cluster().cluster.certificate_authority_data, "Q0EtQllURVM=");
    assert_eq!(profile.context().name, "prod");
    assert_eq!(profile.context().context.cluster, "prod");
    assert_eq!(profile.context().context.user, "build-bot");
    assert_eq!(profile.user().name, "build-bot");
    assert_eq!(profile.user().user.token, "tok-123");
    assert_eq!(profile.current_context(), "prod");
    assert_eq!(caller.calls(), 1);
}

#[tokio::test]
async fn test_mint_uses_identity_label_override() {
    let minter = Minter::new(FakeResolver::new(FakeCaller::returning_token("tok-123")));

    let profile = minter
        .mint(&config().with_identity_label("ci-runner"))
        .await
        .unwrap();

    assert_eq!(profile.user().name, "ci-runner");
    assert_eq!(profile.context().context.user, "ci-runner");
}

#[tokio::test]
async fn test_mint_without_audiences_never_dispatches() {
    let caller = FakeCaller::returning_token("tok-123");
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let err = minter
        .mint(&MintConfig::new("build-bot", "ci"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidRequest(InvalidRequestError::NoAudiences)
    ));
    assert_eq!(caller.calls(), 0);
}

#[tokio::test]
async fn test_invalid_requests_never_dispatch() {
    let caller = FakeCaller::returning_token("tok-123");
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let invalid = [
        MintConfig::new("", "ci").with_audiences(["vault"]),
        MintConfig::new("build-bot", "").with_audiences(["vault"]),
        MintConfig::new("Build_Bot", "ci").with_audiences(["vault"]),
        config().with_audiences(["vault", "vault"]),
        config().with_audiences([""]),
        config().with_expiration_seconds(0),
        config().with_expiration_seconds(-60),
    ];
    for config in &invalid {
        let err = minter.mint(config).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "{config:?}: {err}");
    }

    assert_eq!(caller.calls(), 0);
}

#[tokio::test]
async fn test_mint_timeout_aborts_before_compose() {
    let caller = FakeCaller::new(Reply::Timeout);
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let err = minter.mint(&config()).await.unwrap_err();

    match err {
        Error::Issuance(issuance) => assert!(issuance.is_timeout()),
        other => panic!("expected an issuance error, got {other:?}"),
    }
    assert_eq!(caller.calls(), 1);
}

#[tokio::test]
async fn test_mint_rejection_is_not_retried() {
    let caller = FakeCaller::new(Reply::Forbidden);
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let err = minter.mint(&config()).await.unwrap_err();

    match err {
        Error::Issuance(issuance) => assert!(issuance.is_unauthorized()),
        other => panic!("expected an issuance error, got {other:?}"),
    }
    assert_eq!(caller.calls(), 1);
}

#[tokio::test]
async fn test_mint_empty_token_is_contract_violation() {
    let caller = FakeCaller::returning_token("");
    let minter = Minter::new(FakeResolver::new(caller.clone()));

    let err = minter.mint(&config()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::ContractViolation(ContractViolationError::EmptyToken)
    ));
    assert_eq!(caller.calls(), 1);
}

#[tokio::test]
async fn test_mint_resolution_failure_never_dispatches() {
    let caller = FakeCaller::returning_token("tok-123");
    let minter = Minter::new(FakeResolver::unresolvable(caller.clone()));

    let err = minter.mint(&config()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Resolution(ResolutionError::NoCurrentContext)
    ));
    assert_eq!(caller.calls(), 0);
}

#[tokio::test]
async fn test_issuer_dispatches_once_per_issue() {
    let caller = FakeCaller::returning_token("tok-123");
    let resolver = FakeResolver::new(caller.clone());
    let connection = resolver.resolve().unwrap();
    let spec = TokenRequestSpec::new("build-bot", "ci", ["vault", "api"], 600);

    let issuer = TokenIssuer::new();
    let first = issuer.issue(&connection, &spec).await.unwrap();
    let second = issuer.issue(&connection, &spec).await.unwrap();

    assert_eq!(first.value(), "tok-123");
    assert_eq!(first, second);
    assert!(first.expires_at().is_some());
    assert_eq!(caller.calls(), 2);
}

#[tokio::test]
async fn test_mint_is_repeatable() {
    let minter = Minter::new(FakeResolver::new(FakeCaller::returning_token("tok-123")));

    let first = minter.mint(&config()).await.unwrap();
    let second = minter.mint(&config()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
}
