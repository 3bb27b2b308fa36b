use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use portcullis::{
    DenyReason, FixedClock, InMemoryFailureLog, InMemoryUserRepository, LoginVerdict, NoopMailer,
    Portcullis, RateLimitConfig, UserRepository, UserRole,
};

const IP: &str = "10.0.0.1";

fn portcullis_with_clock() -> (
    Portcullis<InMemoryUserRepository, InMemoryFailureLog, NoopMailer>,
    Arc<InMemoryUserRepository>,
    Arc<FixedClock>,
) {
    let users = Arc::new(InMemoryUserRepository::new());
    let clock = Arc::new(FixedClock::default());
    let portcullis = Portcullis::builder(
        users.clone(),
        Arc::new(InMemoryFailureLog::new()),
        Arc::new(NoopMailer),
    )
    .clock(clock.clone())
    .rate_limit(RateLimitConfig {
        window: Duration::seconds(300),
        max_attempts: 5,
    })
    .build();
    (portcullis, users, clock)
}

#[tokio::test]
async fn test_register_then_login() {
    let (portcullis, _users, _clock) = portcullis_with_clock();

    let user = portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();
    assert_eq!(user.email, "alice@example.com");

    let verdict = portcullis
        .login("alice@example.com", "password123", IP)
        .await
        .unwrap();
    match verdict {
        LoginVerdict::Authenticated(logged_in) => assert_eq!(logged_in.id, user.id),
        other => panic!("expected authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_deny_identically() {
    let (portcullis, _users, _clock) = portcullis_with_clock();
    portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();

    let wrong = portcullis
        .login("alice@example.com", "password124", IP)
        .await
        .unwrap();
    let unknown = portcullis
        .login("nobody@example.com", "password123", IP)
        .await
        .unwrap();

    assert!(matches!(
        wrong,
        LoginVerdict::Denied(DenyReason::InvalidCredentials)
    ));
    assert!(matches!(
        unknown,
        LoginVerdict::Denied(DenyReason::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_five_failures_block_the_source() {
    let (portcullis, _users, clock) = portcullis_with_clock();
    portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();

    // Four failures inside a minute: still open
    for _ in 0..4 {
        let verdict = portcullis
            .login("alice@example.com", "bad password", IP)
            .await
            .unwrap();
        assert!(matches!(
            verdict,
            LoginVerdict::Denied(DenyReason::InvalidCredentials)
        ));
        clock.advance(Duration::seconds(15));
    }

    // The fifth flips the source to throttled
    portcullis
        .login("alice@example.com", "bad password", IP)
        .await
        .unwrap();

    let verdict = portcullis
        .login("alice@example.com", "password123", IP)
        .await
        .unwrap();
    match verdict {
        LoginVerdict::Denied(DenyReason::RateLimited {
            retry_after_seconds,
        }) => {
            // 60 seconds elapsed since the oldest of the five failures
            assert_eq!(retry_after_seconds, 240);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    // Once the window has aged out, the correct password works again
    clock.advance(Duration::seconds(241));
    let verdict = portcullis
        .login("alice@example.com", "password123", IP)
        .await
        .unwrap();
    assert!(matches!(verdict, LoginVerdict::Authenticated(_)));
}

#[tokio::test]
async fn test_throttle_is_per_source() {
    let (portcullis, _users, _clock) = portcullis_with_clock();
    portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();

    for _ in 0..5 {
        portcullis
            .login("alice@example.com", "bad password", IP)
            .await
            .unwrap();
    }

    let from_elsewhere = portcullis
        .login("alice@example.com", "password123", "198.51.100.4")
        .await
        .unwrap();
    assert!(matches!(from_elsewhere, LoginVerdict::Authenticated(_)));
}

#[tokio::test]
async fn test_blocked_account_denied_until_reset() {
    let (portcullis, users, _clock) = portcullis_with_clock();
    let user = portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();

    // Administratively block the account out-of-band
    let mut blocked = users.find_by_id(&user.id).await.unwrap().unwrap();
    blocked.blocked = true;
    users.save(&blocked).await.unwrap();

    // Even the correct password is turned away, with the distinct reason
    let verdict = portcullis
        .login("alice@example.com", "password123", IP)
        .await
        .unwrap();
    assert!(matches!(verdict, LoginVerdict::Denied(DenyReason::Blocked)));

    portcullis.reset_login_state(&user.id).await.unwrap();
    let verdict = portcullis
        .login("alice@example.com", "password123", IP)
        .await
        .unwrap();
    assert!(matches!(verdict, LoginVerdict::Authenticated(_)));
}

/// The absent-user path burns a dummy hash verification so that response
/// time does not reveal whether an email exists. Bounds are generous: the
/// point is catching a missing dummy verification (an order-of-magnitude
/// gap), not micro-benchmarking.
#[tokio::test]
async fn test_unknown_email_timing_matches_wrong_password() {
    let (portcullis, _users, _clock) = portcullis_with_clock();
    portcullis
        .register_user("alice@example.com", "password123", None, UserRole::Member)
        .await
        .unwrap();

    // Warm up the lazily computed reference hash
    portcullis
        .login("warmup@example.com", "password123", "192.0.2.1")
        .await
        .unwrap();

    let rounds = 5;

    let start = Instant::now();
    for _ in 0..rounds {
        portcullis
            .login("nobody@example.com", "password123", "192.0.2.2")
            .await
            .unwrap();
    }
    let unknown_elapsed = start.elapsed();

    let start = Instant::now();
    for _ in 0..rounds {
        portcullis
            .login("alice@example.com", "wrong password", "192.0.2.3")
            .await
            .unwrap();
    }
    let wrong_elapsed = start.elapsed();

    let ratio = unknown_elapsed.as_secs_f64() / wrong_elapsed.as_secs_f64();
    assert!(
        (0.2..=5.0).contains(&ratio),
        "timing ratio {ratio:.2} outside bounds: unknown={unknown_elapsed:?} wrong={wrong_elapsed:?}"
    );
}
